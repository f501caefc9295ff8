use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use tracing::{field, info, info_span, Instrument};

use super::{Handler, Middleware};
use crate::request::RestRequest;
use crate::result::RestResponse;

/// Opens a `rest_request` span around each request and records the outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(TracingHandler { next })
    }
}

struct TracingHandler {
    next: Arc<dyn Handler>,
}

impl Handler for TracingHandler {
    fn handle(&self, request: RestRequest) -> BoxFuture<'static, RestResponse> {
        let span = info_span!(
            "rest_request",
            request_id = %request.request_id(),
            capability = %request.capability(),
            address = %request.address(),
            outcome = field::Empty,
            latency_ms = field::Empty,
        );
        // inner handlers may spawn; they must see the span as current
        let next = span.in_scope(|| self.next.handle(request));
        let recorder = span.clone();
        async move {
            let start = Instant::now();
            let response = next.await;
            let latency_ms = start.elapsed().as_millis() as u64;
            let outcome = format!("{:?}", response.result().kind());
            recorder.record("outcome", outcome.as_str());
            recorder.record("latency_ms", latency_ms);
            info!(outcome = %outcome, latency_ms, "Request complete");
            response
        }
        .instrument(span)
        .boxed()
    }
}
