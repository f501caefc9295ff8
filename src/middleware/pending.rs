use super::{Handler, Middleware};
use crate::jobs::JobStore;
use crate::request::RestRequest;
use crate::result::{RestResponse, RestResult};
use crate::runtime_config::RuntimeConfig;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Instrument};

/// Turns slow requests into background jobs.
///
/// The rest of the pipeline gets `max_wait` to answer. After that the work
/// is handed to the [`JobStore`] and the caller receives `Pending(job)`
/// while the work carries on to completion.
#[derive(Clone)]
pub struct PendingMiddleware {
    max_wait: Duration,
    store: Arc<dyn JobStore>,
}

impl PendingMiddleware {
    #[must_use]
    pub fn new(max_wait: Duration, store: Arc<dyn JobStore>) -> Self {
        Self { max_wait, store }
    }

    #[must_use]
    pub fn from_config(config: &RuntimeConfig, store: Arc<dyn JobStore>) -> Self {
        Self::new(config.pending_max_wait(), store)
    }
}

impl Middleware for PendingMiddleware {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(PendingHandler {
            max_wait: self.max_wait,
            store: Arc::clone(&self.store),
            next,
        })
    }
}

struct PendingHandler {
    max_wait: Duration,
    store: Arc<dyn JobStore>,
    next: Arc<dyn Handler>,
}

impl Handler for PendingHandler {
    fn handle(&self, request: RestRequest) -> BoxFuture<'static, RestResponse> {
        let max_wait = self.max_wait;
        let store = Arc::clone(&self.store);
        let request_id = request.request_id();
        let work = self.next.handle(request).shared();
        // keeps the work moving while nobody awaits it
        tokio::spawn(work.clone().in_current_span());
        async move {
            if let Ok(response) = tokio::time::timeout(max_wait, work.clone()).await {
                return response;
            }
            let job = store.register_job(work.boxed());
            info!(
                request_id = %request_id,
                job_id = %job.id(),
                max_wait_ms = max_wait.as_millis() as u64,
                "Request converted to pending job"
            );
            RestResult::pending(job).to_response()
        }
        .boxed()
    }
}
