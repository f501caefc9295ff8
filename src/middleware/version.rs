use super::{Handler, Middleware};
use crate::identity::{Payload, Resource, ResourceType};
use crate::metadata::{IfNoneMatch, VersionToken};
use crate::request::RestRequest;
use crate::result::{Redirect, RestResponse, RestResult};
use futures::future::{BoxFuture, FutureExt};
use http::Method;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, warn};

/// Computes the version token of a value.
pub trait TokenProvider: Send + Sync {
    fn token_for(&self, value: &Payload) -> Option<VersionToken>;
}

/// SHA-256 over the value's JSON form.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHashTokenProvider;

impl TokenProvider for ContentHashTokenProvider {
    fn token_for(&self, value: &Payload) -> Option<VersionToken> {
        let json = match value.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(value_type = value.type_name(), error = %e, "Value not hashable");
                return None;
            }
        };
        let mut hasher = Sha256::new();
        hasher.update(json.to_string().as_bytes());
        let digest = hasher.finalize();
        let mut token = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            let _ = write!(token, "{byte:02x}");
        }
        Some(VersionToken::new(token))
    }
}

struct TypedTokenProvider<T, F> {
    compute: F,
    _marker: std::marker::PhantomData<fn(&T)>,
}

impl<T, F> TokenProvider for TypedTokenProvider<T, F>
where
    T: Resource,
    F: Fn(&T) -> VersionToken + Send + Sync,
{
    fn token_for(&self, value: &Payload) -> Option<VersionToken> {
        value.downcast_ref::<T>().map(&self.compute)
    }
}

/// Token providers resolved by the value's runtime type, with a fallback.
#[derive(Clone)]
pub struct TokenProviders {
    by_type: HashMap<ResourceType, Arc<dyn TokenProvider>>,
    fallback: Arc<dyn TokenProvider>,
}

impl Default for TokenProviders {
    fn default() -> Self {
        Self {
            by_type: HashMap::new(),
            fallback: Arc::new(ContentHashTokenProvider),
        }
    }
}

impl TokenProviders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `compute` for values of type `T`.
    #[must_use]
    pub fn with<T, F>(mut self, compute: F) -> Self
    where
        T: Resource,
        F: Fn(&T) -> VersionToken + Send + Sync + 'static,
    {
        self.by_type.insert(
            ResourceType::of::<T>(),
            Arc::new(TypedTokenProvider {
                compute,
                _marker: std::marker::PhantomData,
            }),
        );
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.fallback = provider;
        self
    }

    #[must_use]
    pub fn token_for(&self, value: &Payload) -> Option<VersionToken> {
        self.by_type
            .get(&value.resource_type())
            .unwrap_or(&self.fallback)
            .token_for(value)
    }
}

/// Conditional GET support.
///
/// A successful GET gets a [`VersionToken`] in its metadata. When the
/// request's [`IfNoneMatch`] contains that token the result becomes
/// `Redirect::NotNecessary` pointing at the requested address.
#[derive(Clone, Default)]
pub struct VersionTokenMiddleware {
    providers: Arc<TokenProviders>,
}

impl VersionTokenMiddleware {
    #[must_use]
    pub fn new(providers: TokenProviders) -> Self {
        Self {
            providers: Arc::new(providers),
        }
    }
}

impl Middleware for VersionTokenMiddleware {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(VersionTokenHandler {
            providers: Arc::clone(&self.providers),
            next,
        })
    }
}

struct VersionTokenHandler {
    providers: Arc<TokenProviders>,
    next: Arc<dyn Handler>,
}

impl Handler for VersionTokenHandler {
    fn handle(&self, request: RestRequest) -> BoxFuture<'static, RestResponse> {
        if *request.capability() != Method::GET {
            return self.next.handle(request);
        }
        let providers = Arc::clone(&self.providers);
        let request_id = request.request_id();
        let address = request.address().clone();
        let if_none_match = request.metadata_item::<IfNoneMatch>().cloned();
        let next = self.next.handle(request);
        async move {
            let response = next.await;
            let Some(token) = response.value().and_then(|v| providers.token_for(v)) else {
                return response;
            };
            if if_none_match.is_some_and(|inm| inm.matches(&token)) {
                debug!(request_id = %request_id, token = %token, "Version token matched");
                return response
                    .replace_result(RestResult::Redirect(Redirect::NotNecessary(address)))
                    .with_item(token);
            }
            response.with_item(token)
        }
        .boxed()
    }
}
