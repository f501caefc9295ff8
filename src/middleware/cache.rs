use super::{Handler, Middleware};
use crate::identity::Address;
use crate::metadata::{CachePolicy, Parameters, Principal};
use crate::request::RestRequest;
use crate::result::RestResponse;
use crate::runtime_config::RuntimeConfig;
use futures::future::{BoxFuture, FutureExt};
use http::Method;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    capability: Method,
    address: Address,
    parameters: Parameters,
    /// Links are authorized per caller, so callers never share entries.
    principal: Option<Principal>,
}

struct CacheEntry {
    response: RestResponse,
    /// `None` when the time to live does not fit in an `Instant`.
    expires_at: Option<Instant>,
}

struct CacheState {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheState {
    fn lookup(&self, key: &CacheKey) -> Option<RestResponse> {
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at.map_or(true, |at| at > Instant::now()) => {
                return Some(entry.response.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    fn store(&self, key: CacheKey, response: &RestResponse) {
        let ttl = match response.metadata_item::<CachePolicy>() {
            Some(policy) if !policy.store => return,
            Some(policy) => policy.max_age.unwrap_or(self.ttl),
            None => self.ttl,
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key,
                CacheEntry {
                    response: response.clone(),
                    expires_at: Instant::now().checked_add(ttl),
                },
            );
        }
    }

    fn invalidate(&self, address: &Address) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(k, _)| &k.address == address)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }
}

/// Response cache for GET requests.
///
/// GET responses are keyed by `(capability, address, parameters)` and the
/// caller's [`Principal`]; a successful response is stored unless its
/// metadata carries [`CachePolicy::no_store`], and a policy's `max_age`
/// overrides the default time to live. PUT, DELETE and PATCH drop every entry for their address
/// before the request proceeds.
#[derive(Clone)]
pub struct CachingMiddleware {
    state: Arc<CacheState>,
}

/// Default number of cached responses.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

impl CachingMiddleware {
    #[must_use]
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            state: Arc::new(CacheState {
                entries: Mutex::new(LruCache::new(capacity)),
                ttl,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                invalidations: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity)
            .or(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self::new(capacity, config.cache_ttl())
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.state.hits.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.state.misses.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn invalidations(&self) -> u64 {
        self.state.invalidations.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Middleware for CachingMiddleware {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(CachingHandler {
            state: Arc::clone(&self.state),
            next,
        })
    }
}

struct CachingHandler {
    state: Arc<CacheState>,
    next: Arc<dyn Handler>,
}

impl Handler for CachingHandler {
    fn handle(&self, request: RestRequest) -> BoxFuture<'static, RestResponse> {
        let method = request.capability().clone();
        if method == Method::PUT || method == Method::DELETE || method == Method::PATCH {
            let removed = self.state.invalidate(request.address());
            if removed > 0 {
                self.state.invalidations.fetch_add(1, Ordering::Relaxed);
                debug!(
                    request_id = %request.request_id(),
                    address = %request.address(),
                    removed,
                    "Cache entries invalidated"
                );
            }
            return self.next.handle(request);
        }
        if method != Method::GET {
            return self.next.handle(request);
        }

        let key = CacheKey {
            capability: method,
            address: request.address().clone(),
            parameters: request.parameters().clone(),
            principal: request.principal().cloned(),
        };
        if let Some(hit) = self.state.lookup(&key) {
            self.state.hits.fetch_add(1, Ordering::Relaxed);
            debug!(request_id = %request.request_id(), address = %key.address, "Cache hit");
            return futures::future::ready(hit).boxed();
        }
        self.state.misses.fetch_add(1, Ordering::Relaxed);

        let state = Arc::clone(&self.state);
        let next = self.next.handle(request);
        async move {
            let response = next.await;
            if response.is_success() {
                state.store(key, &response);
            }
            response
        }
        .boxed()
    }
}
