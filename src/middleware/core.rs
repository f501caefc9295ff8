use crate::request::RestRequest;
use crate::result::RestResponse;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

/// Anything that turns a request into a response.
pub trait Handler: Send + Sync {
    fn handle(&self, request: RestRequest) -> BoxFuture<'static, RestResponse>;
}

struct FnHandler<F>(F);

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(RestRequest) -> Fut + Send + Sync,
    Fut: Future<Output = RestResponse> + Send + 'static,
{
    fn handle(&self, request: RestRequest) -> BoxFuture<'static, RestResponse> {
        (self.0)(request).boxed()
    }
}

/// Wrap an async function as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(RestRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RestResponse> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// A decorator: given the next handler, produce the decorated one.
///
/// The decorated handler must invoke `next` at most once per request.
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Ordered list of decorators.
///
/// Composition is right-to-left: the first added middleware is the
/// outermost, so it sees the request first and the response last.
#[derive(Clone, Default)]
pub struct Pipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    #[must_use]
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.push(middleware);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Decorate `terminal` with every middleware.
    #[must_use]
    pub fn build(&self, terminal: Arc<dyn Handler>) -> Arc<dyn Handler> {
        let handler = self
            .middlewares
            .iter()
            .rev()
            .fold(terminal, |next, mw| mw.wrap(next));
        tracing::debug!(
            middleware = ?self.middlewares.iter().map(|m| m.name()).collect::<Vec<_>>(),
            "Pipeline built"
        );
        handler
    }
}
