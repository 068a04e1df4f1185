//! Authorization and audit middleware.
//!
//! [`AuditLayer`] wraps the whole tonic router, so it runs in front of every
//! call, unary or streaming. For each request it:
//!
//! 1. reads the single `consumer` metadata entry,
//! 2. checks `(consumer, request path)` against the ACL,
//! 3. broadcasts an audit [`Event`] and waits for the broadcast to finish,
//! 4. only then hands the request to the wrapped service.
//!
//! A failed check answers with a gRPC error status directly; the handler is
//! never reached and no event is recorded.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tonic::body::BoxBody;
use tonic::transport::server::TcpConnectInfo;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::acl::AccessControl;
use crate::error::{status_from_error, AuthError, GatekeepError, GatekeepResult};
use crate::event::Event;
use crate::monitor::ListenerRegistry;

/// Metadata key carrying the caller's identity.
pub const CONSUMER_KEY: &str = "consumer";

/// Layer applying [`AuditService`] to every call.
#[derive(Clone)]
pub struct AuditLayer {
    checker: Arc<dyn AccessControl>,
    registry: Arc<ListenerRegistry>,
}

impl AuditLayer {
    /// Create a layer checking calls against `checker` and auditing into `registry`.
    #[must_use]
    pub fn new(checker: Arc<dyn AccessControl>, registry: Arc<ListenerRegistry>) -> Self {
        Self { checker, registry }
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = AuditService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditService {
            inner,
            checker: Arc::clone(&self.checker),
            registry: Arc::clone(&self.registry),
        }
    }
}

/// Service authorizing and auditing each call before delegating to `inner`.
#[derive(Clone)]
pub struct AuditService<S> {
    inner: S,
    checker: Arc<dyn AccessControl>,
    registry: Arc<ListenerRegistry>,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for AuditService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        // The clone may not be ready; keep the instance poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let checker = Arc::clone(&self.checker);
        let registry = Arc::clone(&self.registry);

        Box::pin(async move {
            let event = match authorize(checker.as_ref(), &req) {
                Ok(event) => event,
                Err(err) => return Ok(status_from_error(err).into_http()),
            };

            let delivered = registry.broadcast(&event).await;
            debug!(
                consumer = %event.consumer,
                method = %event.method,
                listeners = delivered,
                "call audited"
            );

            inner.call(req).await
        })
    }
}

/// Extract the single consumer identity from request metadata.
pub fn consumer_from_headers(headers: &http::HeaderMap) -> Result<String, AuthError> {
    let mut values = headers.get_all(CONSUMER_KEY).iter();
    let first = values.next().ok_or(AuthError::MissingConsumer)?;
    let extra = values.count();
    if extra > 0 {
        return Err(AuthError::DuplicateConsumer { count: extra + 1 });
    }
    first
        .to_str()
        .map(str::to_string)
        .map_err(|_| AuthError::InvalidConsumer)
}

fn remote_addr<B>(req: &http::Request<B>) -> Option<SocketAddr> {
    req.extensions()
        .get::<TcpConnectInfo>()
        .and_then(TcpConnectInfo::remote_addr)
}

/// Authorize `req` and build its audit event.
pub fn authorize<B>(checker: &dyn AccessControl, req: &http::Request<B>) -> GatekeepResult<Event> {
    let method = req.uri().path();
    let consumer = consumer_from_headers(req.headers()).inspect_err(|e| {
        warn!(method, error = %e, "rejected call without usable consumer");
    })?;

    if !checker.check(&consumer, method) {
        warn!(consumer = %consumer, method, "permission denied");
        return Err(AuthError::PermissionDenied {
            consumer,
            method: method.to_string(),
        }
        .into());
    }

    let host = remote_addr(req).ok_or_else(|| GatekeepError::internal("can not get peer"))?;
    Ok(Event::now(consumer, method, host.to_string()))
}
