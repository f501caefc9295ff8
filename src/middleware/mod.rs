//! # Middleware Module
//!
//! A [`Pipeline`] is an ordered list of decorators around a terminal
//! [`Handler`], usually the [`RestDispatcher`](crate::dispatcher::RestDispatcher).
//! Each [`Middleware`] receives the next handler and returns the decorated
//! one. The first added middleware is the outermost: it sees the request
//! first and the response last.
//!
//! ## Standard Decorators
//!
//! - [`CachingMiddleware`] - GET response cache, invalidated by PUT/DELETE/PATCH
//! - [`VersionTokenMiddleware`] - version tokens and conditional GET (`NotNecessary`)
//! - [`TimeoutMiddleware`] - deadline with cooperative cancellation
//! - [`PendingMiddleware`] - slow requests become background jobs
//! - [`SelfLinkMiddleware`] - `self` and `describedby` links
//! - [`TracingMiddleware`] - one span per request
//! - [`MetricsMiddleware`] - counters by outcome and latency
//!
//! Every decorator calls `next` at most once; short-circuiting decorators
//! (a cache hit) do not call it at all.
//!
//! ```rust,ignore
//! let handler = Pipeline::new()
//!     .with(Arc::new(TracingMiddleware))
//!     .with(Arc::new(TimeoutMiddleware::new(Duration::from_secs(30))))
//!     .with(Arc::new(CachingMiddleware::from_config(&config)))
//!     .with(Arc::new(SelfLinkMiddleware))
//!     .build(Arc::new(dispatcher));
//! let response = handler.handle(request).await;
//! ```

mod cache;
mod core;
mod metrics;
mod pending;
mod self_link;
mod timeout;
mod tracing;
mod version;

pub use cache::{CachingMiddleware, DEFAULT_CACHE_CAPACITY};
pub use core::{handler_fn, Handler, Middleware, Pipeline};
pub use metrics::{MetricsMiddleware, MetricsSnapshot};
pub use pending::PendingMiddleware;
pub use self_link::SelfLinkMiddleware;
pub use timeout::TimeoutMiddleware;
pub use tracing::TracingMiddleware;
pub use version::{ContentHashTokenProvider, TokenProvider, TokenProviders, VersionTokenMiddleware};
