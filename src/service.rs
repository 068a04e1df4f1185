//! Service lifecycle: bind, serve, and shut down on cancellation.
//!
//! Only configuration problems (a malformed ACL, an address that cannot be
//! bound) are reported to the caller. Once [`Gatekeeper::spawn`] returns, the
//! server runs on background tasks until the cancellation token fires; then
//! it stops accepting connections, every admin stream is terminated through
//! [`ListenerRegistry::stop`], and the server drains.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{info, warn};

use crate::acl::{AccessControl, StaticAcl};
use crate::error::{ConfigError, GatekeepResult};
use crate::monitor::ListenerRegistry;
use crate::transport::{AdminServiceImpl, AuditLayer, BizServiceImpl};

/// A bound, not yet running, gatekeep server.
pub struct Gatekeeper {
    listener: TcpListener,
    local_addr: SocketAddr,
    checker: Arc<dyn AccessControl>,
    registry: Arc<ListenerRegistry>,
}

impl Gatekeeper {
    /// Compile the JSON ACL and bind `listen_addr`.
    pub async fn bind(listen_addr: &str, acl_json: &str) -> GatekeepResult<Self> {
        let acl = StaticAcl::from_json(acl_json)?;
        Self::bind_with(listen_addr, Arc::new(acl)).await
    }

    /// Bind `listen_addr` and gate calls with an arbitrary checker.
    pub async fn bind_with(
        listen_addr: &str,
        checker: Arc<dyn AccessControl>,
    ) -> GatekeepResult<Self> {
        if listen_addr.trim().is_empty() {
            return Err(ConfigError::InvalidAddress {
                addr: listen_addr.to_string(),
                reason: "address is empty".to_string(),
            }
            .into());
        }

        let bind_err = |source| ConfigError::Bind {
            addr: listen_addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(listen_addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        Ok(Self {
            listener,
            local_addr,
            checker,
            registry: Arc::new(ListenerRegistry::new()),
        })
    }

    /// The bound address (resolves port 0).
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The registry feeding the admin streams.
    #[must_use]
    pub fn registry(&self) -> Arc<ListenerRegistry> {
        Arc::clone(&self.registry)
    }

    /// Start serving in the background.
    ///
    /// The returned handle completes once shutdown has finished.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        let Self {
            listener,
            local_addr,
            checker,
            registry,
        } = self;

        let router = Server::builder()
            .layer(AuditLayer::new(checker, Arc::clone(&registry)))
            .add_service(BizServiceImpl.into_server())
            .add_service(AdminServiceImpl::new(Arc::clone(&registry)).into_server());

        let incoming = TcpListenerStream::new(listener);
        let server = tokio::spawn(
            router.serve_with_incoming_shutdown(incoming, token.clone().cancelled_owned()),
        );
        info!(addr = %local_addr, "gatekeep listening");

        tokio::spawn(async move {
            token.cancelled().await;
            info!(addr = %local_addr, "shutdown requested");

            registry.stop().await;

            match server.await {
                Ok(Ok(())) => info!(addr = %local_addr, "server stopped"),
                Ok(Err(e)) => warn!(error = %e, "server exited with error"),
                Err(e) => warn!(error = %e, "server task failed"),
            }
        })
    }
}

/// Bind and start the service, returning as soon as it is running.
///
/// Errors are limited to configuration and bind failures. Cancel `token` to
/// stop the service; cancelling again has no effect.
pub async fn start(token: CancellationToken, listen_addr: &str, acl_json: &str) -> GatekeepResult<()> {
    let gatekeeper = Gatekeeper::bind(listen_addr, acl_json).await?;
    drop(gatekeeper.spawn(token));
    Ok(())
}
