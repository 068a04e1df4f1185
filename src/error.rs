//! Error types for gatekeep.
//!
//! Errors are strongly typed using thiserror, one enum per concern, wrapped
//! by the top-level [`GatekeepError`]. Per-call failures are converted to a
//! gRPC [`tonic::Status`] at the transport boundary by [`status_from_error`].

use thiserror::Error;
use tonic::Status;

/// Startup configuration errors. Any of these prevents the service from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The ACL document is not an object mapping consumers to pattern lists.
    #[error("Invalid ACL configuration: {reason}")]
    InvalidAcl {
        /// Parser message.
        reason: String,
    },

    /// A method pattern failed to compile.
    #[error("Invalid ACL pattern '{pattern}' for consumer '{consumer}': {reason}")]
    InvalidPattern {
        /// Consumer owning the pattern.
        consumer: String,
        /// Pattern as written in the ACL.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// The listen address is empty or malformed.
    #[error("Invalid listen address '{addr}': {reason}")]
    InvalidAddress {
        /// Address as given.
        addr: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Resolving or binding the listen address failed.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address as given.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// A command-line flag was given without its value.
    #[error("Argument '{arg}' requires a value")]
    MissingValue {
        /// The flag.
        arg: String,
    },

    /// An unrecognized command-line argument.
    #[error("Unknown argument: {arg}")]
    UnknownArgument {
        /// The argument as given.
        arg: String,
    },

    /// No ACL source was given.
    #[error("No ACL configured (use --acl, --acl-file or GATEKEEP_ACL)")]
    MissingAcl,

    /// Reading a configuration file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Per-call authentication and authorization failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The call carries no `consumer` metadata.
    #[error("no consumer")]
    MissingConsumer,

    /// The call carries more than one `consumer` value.
    #[error("expected exactly one consumer, got {count}")]
    DuplicateConsumer {
        /// Number of values found.
        count: usize,
    },

    /// The `consumer` value is not printable ASCII.
    #[error("consumer metadata is not valid ASCII")]
    InvalidConsumer,

    /// The ACL does not allow this consumer to call this method.
    #[error("permission denied for consumer '{consumer}' on {method}")]
    PermissionDenied {
        /// Caller identity.
        consumer: String,
        /// Requested method path.
        method: String,
    },
}

/// Failures delivering records to an observation stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The receiving side of the stream is gone.
    #[error("Stream closed by peer: {stream}")]
    StreamClosed {
        /// Stream kind.
        stream: String,
    },
}

/// Top-level error type for gatekeep.
#[derive(Debug, Error)]
pub enum GatekeepError {
    /// Startup configuration failure.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Per-call authentication failure.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Stream delivery failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A request field is out of range.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable reason.
        message: String,
    },

    /// Unexpected server-side failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable reason.
        message: String,
    },
}

impl GatekeepError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is an authentication error.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for gatekeep operations.
pub type GatekeepResult<T> = Result<T, GatekeepError>;

/// Map an error onto the gRPC status returned to the caller.
#[must_use]
pub fn status_from_error(err: GatekeepError) -> Status {
    match err {
        GatekeepError::Auth(a) => Status::unauthenticated(a.to_string()),
        GatekeepError::InvalidArgument { message } => Status::invalid_argument(message),
        GatekeepError::Transport(t) => Status::unavailable(t.to_string()),
        GatekeepError::Config(c) => Status::failed_precondition(c.to_string()),
        GatekeepError::Internal { message } => Status::internal(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_config_error_invalid_acl() {
        let err = ConfigError::InvalidAcl {
            reason: "expected an object".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Invalid ACL"));
        assert!(msg.contains("expected an object"));
    }

    #[test]
    fn test_config_error_argument_messages() {
        let missing = ConfigError::MissingValue {
            arg: "--listen".to_string(),
        };
        assert!(format!("{missing}").contains("--listen"));

        let unknown = ConfigError::UnknownArgument {
            arg: "--bogus".to_string(),
        };
        assert!(format!("{unknown}").contains("--bogus"));

        let pattern = ConfigError::InvalidPattern {
            consumer: "bob".to_string(),
            pattern: "/x".to_string(),
            reason: "too big".to_string(),
        };
        let msg = format!("{pattern}");
        assert!(msg.contains("bob") && msg.contains("/x"));

        assert!(format!("{}", ConfigError::MissingAcl).contains("GATEKEEP_ACL"));
    }

    #[test]
    fn test_auth_error_duplicate() {
        let err = AuthError::DuplicateConsumer { count: 2 };
        assert!(format!("{err}").contains('2'));
    }

    #[test]
    fn test_gatekeep_error_from_auth() {
        let err: GatekeepError = AuthError::MissingConsumer.into();
        assert!(err.is_auth());
        assert!(!err.is_internal());
    }

    #[test]
    fn test_gatekeep_error_from_config() {
        let err: GatekeepError = ConfigError::MissingAcl.into();
        assert!(err.is_config());
    }

    #[test]
    fn test_gatekeep_error_from_transport() {
        let err: GatekeepError = TransportError::StreamClosed {
            stream: "logging".to_string(),
        }
        .into();
        assert!(err.is_transport());
    }

    #[test]
    fn test_status_codes() {
        let denied = status_from_error(
            AuthError::PermissionDenied {
                consumer: "eve".to_string(),
                method: "/gatekeep.Biz/Check".to_string(),
            }
            .into(),
        );
        assert_eq!(denied.code(), Code::Unauthenticated);

        let internal = status_from_error(GatekeepError::internal("can not get peer"));
        assert_eq!(internal.code(), Code::Internal);
        assert_eq!(internal.message(), "can not get peer");

        let bad = status_from_error(GatekeepError::invalid_argument("interval must be positive"));
        assert_eq!(bad.code(), Code::InvalidArgument);
    }
}
