//! gRPC transport layer for gatekeep.
//!
//! Hosts the two services declared in `proto/gatekeep.proto`: the business
//! service `Biz`, whose handlers do nothing, and the `Admin` observation
//! service streaming audit events and statistics windows. Authorization and
//! auditing happen in the [`interceptor`] layer wrapped around both.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::error::status_from_error;
use crate::event::{Event, StatWindow};
use crate::monitor::{
    run_log_subscriber, run_stat_subscriber, stat_period, ListenerRegistry, LISTENER_SLOT_DEPTH,
};

/// Call interception: consumer authentication, ACL check and audit broadcast.
pub mod interceptor;

pub use interceptor::{AuditLayer, AuditService};

#[allow(missing_docs)]
pub mod proto {
    tonic::include_proto!("gatekeep");
}

use proto::admin_server::{Admin, AdminServer};
use proto::biz_server::{Biz, BizServer};

impl From<Event> for proto::Event {
    fn from(e: Event) -> Self {
        Self {
            timestamp: e.timestamp,
            consumer: e.consumer,
            method: e.method,
            host: e.host,
        }
    }
}

impl From<StatWindow> for proto::Stat {
    fn from(w: StatWindow) -> Self {
        Self {
            timestamp: w.timestamp,
            by_method: w.by_method,
            by_consumer: w.by_consumer,
        }
    }
}

/// Business service. Every call returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct BizServiceImpl;

impl BizServiceImpl {
    /// Wrap in the generated tonic server.
    #[must_use]
    pub fn into_server(self) -> BizServer<Self> {
        BizServer::new(self)
    }
}

#[tonic::async_trait]
impl Biz for BizServiceImpl {
    async fn check(&self, _: Request<proto::Nothing>) -> Result<Response<proto::Nothing>, Status> {
        Ok(Response::new(proto::Nothing::default()))
    }

    async fn add(&self, _: Request<proto::Nothing>) -> Result<Response<proto::Nothing>, Status> {
        Ok(Response::new(proto::Nothing::default()))
    }

    async fn test(&self, _: Request<proto::Nothing>) -> Result<Response<proto::Nothing>, Status> {
        Ok(Response::new(proto::Nothing::default()))
    }
}

/// Admin observation service backed by the listener registry.
#[derive(Debug, Clone)]
pub struct AdminServiceImpl {
    registry: Arc<ListenerRegistry>,
}

impl AdminServiceImpl {
    /// Create a service registering listeners in `registry`.
    #[must_use]
    pub fn new(registry: Arc<ListenerRegistry>) -> Self {
        Self { registry }
    }

    /// Wrap in the generated tonic server.
    #[must_use]
    pub fn into_server(self) -> AdminServer<Self> {
        AdminServer::new(self)
    }
}

#[tonic::async_trait]
impl Admin for AdminServiceImpl {
    type LoggingStream = ReceiverStream<Result<proto::Event, Status>>;

    async fn logging(
        &self,
        _request: Request<proto::Nothing>,
    ) -> Result<Response<Self::LoggingStream>, Status> {
        let listener = self.registry.register().await;
        let id = listener.id();

        let (tx, rx) = mpsc::channel(LISTENER_SLOT_DEPTH);
        tokio::spawn(async move {
            if let Err(e) = run_log_subscriber(listener, tx, |event| Ok(event.into())).await {
                debug!(listener = %id, error = %e, "logging stream ended");
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    type StatisticsStream = ReceiverStream<Result<proto::Stat, Status>>;

    async fn statistics(
        &self,
        request: Request<proto::StatInterval>,
    ) -> Result<Response<Self::StatisticsStream>, Status> {
        let period = stat_period(request.into_inner().interval_seconds).map_err(status_from_error)?;
        let listener = self.registry.register().await;
        let id = listener.id();

        let (tx, rx) = mpsc::channel(LISTENER_SLOT_DEPTH);
        tokio::spawn(async move {
            if let Err(e) = run_stat_subscriber(listener, period, tx, |w| Ok(w.into())).await {
                debug!(listener = %id, error = %e, "statistics stream ended");
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

pub use proto::admin_client::AdminClient;
pub use proto::biz_client::BizClient;
