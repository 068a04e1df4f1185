//! # gatekeep - ACL-gated gRPC front end with audit streams
//!
//! Every incoming call is checked against an access-control list keyed by the
//! caller's `consumer` metadata. Authorized calls are recorded as audit
//! [`Event`]s and fanned out to the two administrative streams:
//!
//! - **Logging**: every event, as it happens.
//! - **Statistics**: per-interval call counts by method and by consumer.
//!
//! ## Core Concepts
//!
//! - **ACL**: consumer → method patterns; `/*` suffix is a prefix match
//! - **Listener**: one admin stream's single-slot event channel
//! - **Registry**: owns all listeners and broadcasts under one lock
//! - **StatWindow**: counters accumulated over one interval
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tokio_util::sync::CancellationToken;
//!
//! let token = CancellationToken::new();
//! gatekeep::start(
//!     token.clone(),
//!     "127.0.0.1:8082",
//!     r#"{"logger": ["/gatekeep.Admin/Logging"], "biz_admin": ["/gatekeep.Biz/*"]}"#,
//! )
//! .await?;
//!
//! // ... later
//! token.cancel();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod acl;
pub mod config;
pub mod error;
pub mod event;
pub mod monitor;
pub mod service;
pub mod telemetry;
pub mod transport;

// Re-export primary types at crate root for convenience
pub use acl::{AccessControl, AclRule, StaticAcl};
pub use error::{AuthError, ConfigError, GatekeepError, GatekeepResult, TransportError};
pub use event::{Event, StatWindow};
pub use monitor::{Listener, ListenerId, ListenerRegistry};
pub use service::{start, Gatekeeper};
