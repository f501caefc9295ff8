//! Dispatcher core - per-request candidate resolution and invocation.

use crate::capability::{BoundCapability, CapabilityKey, Invocation};
use crate::error::RestFailureError;
use crate::identity::Payload;
use crate::links::{AllowAll, Authorizer, LinkProviders};
use crate::metadata::Versioning;
use crate::middleware::Handler;
use crate::repository::{Repository, RepositoryMap};
use crate::request::{BodyError, RestRequest};
use crate::result::{Failure, FailureOn, RestResponse, RestResult};
use anyhow::anyhow;
use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Observer notified of unexpected capability errors.
///
/// Purely diagnostic: listeners cannot change the response.
pub trait ErrorListener: Send + Sync {
    fn on_error(&self, request: &RestRequest, error: &anyhow::Error);
}

impl<F> ErrorListener for F
where
    F: Fn(&RestRequest, &anyhow::Error) + Send + Sync,
{
    fn on_error(&self, request: &RestRequest, error: &anyhow::Error) {
        self(request, error)
    }
}

struct DispatcherInner {
    repositories: RepositoryMap,
    links: LinkProviders,
    authorizer: Arc<dyn Authorizer>,
    error_listeners: Vec<Arc<dyn ErrorListener>>,
}

/// Outcome of one candidate.
enum Attempt {
    /// Success, redirect or pending: ends dispatch.
    Done(RestResult<Payload>),
    /// Recoverable failure, ranked against the other candidates.
    Failed(Failure),
    /// Unexpected error or panic: ends dispatch with `Failure::Error`.
    Unexpected(anyhow::Error),
}

/// The capability resolution and dispatch engine.
///
/// Cheap to clone; clones share repositories, link providers and listeners.
#[derive(Clone)]
pub struct RestDispatcher {
    inner: Arc<DispatcherInner>,
}

impl RestDispatcher {
    #[must_use]
    pub fn new(repositories: RepositoryMap) -> Self {
        Self::builder(repositories).build()
    }

    #[must_use]
    pub fn builder(repositories: RepositoryMap) -> RestDispatcherBuilder {
        RestDispatcherBuilder {
            repositories,
            links: LinkProviders::new(),
            authorizer: Arc::new(AllowAll),
            error_listeners: Vec::new(),
        }
    }

    #[must_use]
    pub fn repositories(&self) -> &RepositoryMap {
        &self.inner.repositories
    }

    /// Handle one request.
    ///
    /// Never fails: every error is folded into the returned response.
    pub async fn dispatch(&self, request: RestRequest) -> RestResponse {
        let start = Instant::now();
        let entity = request.address().resource_type();

        let Some(repository) = self.inner.repositories.get(entity) else {
            warn!(
                request_id = %request.request_id(),
                capability = %request.capability(),
                entity = %entity,
                "No repository registered for resource type"
            );
            let response = RestResult::not_found(FailureOn::Repository).to_response();
            return propagate_versioning(&request, response);
        };

        let key = CapabilityKey::new(request.capability().clone(), entity);
        let candidates = repository.capabilities().capabilities(&key);
        debug!(
            request_id = %request.request_id(),
            capability = %key,
            candidates = candidates.len(),
            "Candidates resolved"
        );

        let result = self.run_candidates(&request, &candidates).await;
        let response = repository.process_response(result.to_response());
        let response = propagate_versioning(&request, response);

        info!(
            request_id = %request.request_id(),
            capability = %key,
            address = %request.address(),
            outcome = ?response.result().kind(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Request dispatched"
        );
        response
    }

    async fn run_candidates(
        &self,
        request: &RestRequest,
        candidates: &[BoundCapability],
    ) -> RestResult<Payload> {
        let mut best: Option<Failure> = None;
        for (idx, candidate) in candidates.iter().enumerate() {
            match self.attempt(request, candidate).await {
                Attempt::Done(RestResult::Success(value)) => {
                    debug!(
                        request_id = %request.request_id(),
                        candidate = idx,
                        "Candidate succeeded"
                    );
                    return self.enrich(request, RestResult::Success(value));
                }
                Attempt::Done(other) => return other,
                Attempt::Failed(failure) => {
                    debug!(
                        request_id = %request.request_id(),
                        candidate = idx,
                        reason = ?failure.reason(),
                        "Candidate failed"
                    );
                    // ties keep the first encountered failure
                    let better = best
                        .as_ref()
                        .map_or(true, |b| failure.reason().priority() < b.reason().priority());
                    if better {
                        best = Some(failure);
                    }
                }
                Attempt::Unexpected(err) => {
                    error!(
                        request_id = %request.request_id(),
                        candidate = idx,
                        capability = %candidate.descriptor().key(),
                        error = %err,
                        "Capability raised an unexpected error"
                    );
                    for listener in &self.inner.error_listeners {
                        listener.on_error(request, &err);
                    }
                    return RestResult::Failure(Failure::Error(Arc::new(err)));
                }
            }
        }
        RestResult::Failure(best.unwrap_or(Failure::NotFound(FailureOn::Capability)))
    }

    async fn attempt(&self, request: &RestRequest, candidate: &BoundCapability) -> Attempt {
        let descriptor = candidate.descriptor();

        let parameters = match descriptor.coerce_parameters(request.parameters()) {
            Ok(p) => p,
            Err(e) => return Attempt::Failed(e.to_failure()),
        };

        let body = match descriptor.body_type() {
            None => None,
            Some(ty) => match request.body().parse(ty).await {
                Ok(raw) => match descriptor.coerce_body(raw) {
                    Some(Ok(body)) => Some(body),
                    Some(Err(e)) => return Attempt::Failed(body_failure(&e)),
                    None => None,
                },
                Err(e) => return Attempt::Failed(body_failure(&e)),
            },
        };

        let invocation = Invocation {
            address: request.address().clone(),
            parameters,
            body,
            cancellation: request.cancellation().clone(),
        };

        let delegate = candidate.delegate();
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| delegate(invocation))) {
            Ok(future) => future,
            Err(panic) => return Attempt::Unexpected(panic_error(panic.as_ref())),
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(RestResult::Failure(failure))) => Attempt::Failed(failure),
            Ok(Ok(result)) => Attempt::Done(result),
            Ok(Err(err)) => match err.downcast::<RestFailureError>() {
                Ok(RestFailureError(failure)) => Attempt::Failed(failure),
                Err(err) => Attempt::Unexpected(err),
            },
            Err(panic) => Attempt::Unexpected(panic_error(panic.as_ref())),
        }
    }

    /// Append authorized provider links to a success value.
    ///
    /// Providers and the authorizer run here, under the same panic guard as
    /// capabilities. A panic is reported to the listeners and the value is
    /// returned with only the links the capability supplied.
    fn enrich(&self, request: &RestRequest, result: RestResult<Payload>) -> RestResult<Payload> {
        let RestResult::Success(value) = result else {
            return result;
        };
        if self.inner.links.is_empty() {
            return RestResult::Success(value);
        }
        let address = request.address();
        let principal = request.principal();
        let computed = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let mut links = self.inner.links.static_links(address);
            links.extend(self.inner.links.dynamic_links(value.value()));
            links.retain(|link| {
                self.inner
                    .authorizer
                    .is_allowed(principal, &link.capability)
            });
            links
        }));
        match computed {
            Ok(links) => RestResult::Success(value.with_links(links)),
            Err(panic) => {
                let err = panic_error(panic.as_ref()).context("link provider failed");
                error!(
                    request_id = %request.request_id(),
                    address = %address,
                    error = %err,
                    "Link enrichment panicked, provider links dropped"
                );
                for listener in &self.inner.error_listeners {
                    listener.on_error(request, &err);
                }
                RestResult::Success(value)
            }
        }
    }
}

fn body_failure(err: &BodyError) -> Failure {
    Failure::bad_request(serde_json::json!({
        "error": "invalid body",
        "message": err.to_string(),
    }))
}

fn panic_error(panic: &(dyn Any + Send)) -> anyhow::Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    anyhow!("panicked: {message}")
}

/// Copy the request's version range onto a response that carries none.
fn propagate_versioning(request: &RestRequest, response: RestResponse) -> RestResponse {
    match request.metadata_item::<Versioning>() {
        Some(versioning) if response.metadata_item::<Versioning>().is_none() => {
            response.with_item(versioning.clone())
        }
        _ => response,
    }
}

impl Handler for RestDispatcher {
    fn handle(&self, request: RestRequest) -> BoxFuture<'static, RestResponse> {
        let dispatcher = self.clone();
        async move { dispatcher.dispatch(request).await }.boxed()
    }
}

/// Builder for [`RestDispatcher`].
pub struct RestDispatcherBuilder {
    repositories: RepositoryMap,
    links: LinkProviders,
    authorizer: Arc<dyn Authorizer>,
    error_listeners: Vec<Arc<dyn ErrorListener>>,
}

impl RestDispatcherBuilder {
    #[must_use]
    pub fn repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repositories.insert(repository);
        self
    }

    #[must_use]
    pub fn links(mut self, links: LinkProviders) -> Self {
        self.links = links;
        self
    }

    #[must_use]
    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    #[must_use]
    pub fn error_listener(mut self, listener: Arc<dyn ErrorListener>) -> Self {
        self.error_listeners.push(listener);
        self
    }

    #[must_use]
    pub fn build(self) -> RestDispatcher {
        info!(
            repositories = self.repositories.len(),
            error_listeners = self.error_listeners.len(),
            "Dispatcher built"
        );
        RestDispatcher {
            inner: Arc::new(DispatcherInner {
                repositories: self.repositories,
                links: self.links,
                authorizer: self.authorizer,
                error_listeners: self.error_listeners,
            }),
        }
    }
}
