use super::{Handler, Middleware};
use crate::error::OperationCanceled;
use crate::request::RestRequest;
use crate::result::{Failure, RestResponse};
use crate::runtime_config::RuntimeConfig;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn, Instrument};

/// Deadline for the rest of the pipeline.
///
/// When the deadline passes first, the request's cancellation token is
/// fired and the caller receives `Failure::Error(OperationCanceled)`. The
/// work itself is not aborted: it keeps running on its own task and is
/// expected to observe the token.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutMiddleware {
    timeout: Duration,
}

impl TimeoutMiddleware {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.request_timeout())
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Middleware for TimeoutMiddleware {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(TimeoutHandler {
            timeout: self.timeout,
            next,
        })
    }
}

struct TimeoutHandler {
    timeout: Duration,
    next: Arc<dyn Handler>,
}

impl Handler for TimeoutHandler {
    fn handle(&self, request: RestRequest) -> BoxFuture<'static, RestResponse> {
        let timeout = self.timeout;
        let token = request.cancellation().clone();
        let request_id = request.request_id();
        let work = tokio::spawn(self.next.handle(request).in_current_span());
        async move {
            match tokio::time::timeout(timeout, work).await {
                Ok(Ok(response)) => response,
                Ok(Err(join_error)) => {
                    error!(request_id = %request_id, error = %join_error, "Request task failed");
                    Failure::error(anyhow::anyhow!("request task failed: {join_error}")).to_response()
                }
                Err(_elapsed) => {
                    token.cancel();
                    warn!(
                        request_id = %request_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Request timed out, cancellation signalled"
                    );
                    Failure::error(OperationCanceled).to_response()
                }
            }
        }
        .boxed()
    }
}
