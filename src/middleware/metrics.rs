use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;

use super::{Handler, Middleware};
use crate::request::RestRequest;
use crate::result::{RestResponse, ResultKind};

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    successes: AtomicU64,
    bad_requests: AtomicU64,
    not_found: AtomicU64,
    errors: AtomicU64,
    not_executed: AtomicU64,
    redirects: AtomicU64,
    pending: AtomicU64,
    total_latency_ns: AtomicU64,
}

impl Counters {
    fn record(&self, kind: ResultKind, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        let counter = match kind {
            ResultKind::Success => &self.successes,
            ResultKind::BadRequest => &self.bad_requests,
            ResultKind::NotFound => &self.not_found,
            ResultKind::Error => &self.errors,
            ResultKind::NotExecuted => &self.not_executed,
            ResultKind::RedirectPermanent
            | ResultKind::RedirectTemporary
            | ResultKind::NotNecessary => &self.redirects,
            ResultKind::Pending => &self.pending,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub bad_requests: u64,
    pub not_found: u64,
    pub errors: u64,
    pub not_executed: u64,
    pub redirects: u64,
    pub pending: u64,
    pub total_latency_ns: u64,
}

impl MetricsSnapshot {
    /// Mean latency, zero before the first request.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        if self.requests == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_latency_ns / self.requests)
        }
    }
}

/// Request counters by outcome, plus cumulative latency.
///
/// All counters are atomics; clones share them.
#[derive(Clone, Default)]
pub struct MetricsMiddleware {
    counters: Arc<Counters>,
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.counters.requests.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.counters;
        MetricsSnapshot {
            requests: c.requests.load(Ordering::Relaxed),
            successes: c.successes.load(Ordering::Relaxed),
            bad_requests: c.bad_requests.load(Ordering::Relaxed),
            not_found: c.not_found.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            not_executed: c.not_executed.load(Ordering::Relaxed),
            redirects: c.redirects.load(Ordering::Relaxed),
            pending: c.pending.load(Ordering::Relaxed),
            total_latency_ns: c.total_latency_ns.load(Ordering::Relaxed),
        }
    }
}

impl Middleware for MetricsMiddleware {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(MetricsHandler {
            counters: Arc::clone(&self.counters),
            next,
        })
    }
}

struct MetricsHandler {
    counters: Arc<Counters>,
    next: Arc<dyn Handler>,
}

impl Handler for MetricsHandler {
    fn handle(&self, request: RestRequest) -> BoxFuture<'static, RestResponse> {
        let counters = Arc::clone(&self.counters);
        let next = self.next.handle(request);
        async move {
            let start = Instant::now();
            let response = next.await;
            counters.record(response.result().kind(), start.elapsed());
            response
        }
        .boxed()
    }
}
