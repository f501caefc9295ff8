use super::descriptor::{CapabilityDescriptor, CapabilityFuture, Delegate, Invocation};
use crate::identity::{Identity, Payload, Resource};
use crate::result::{Failure, RestResult};
use anyhow::anyhow;
use dashmap::DashMap;
use futures::future::FutureExt;
use http::Method;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type Binder<O> = Arc<dyn Fn(Arc<O>) -> Delegate + Send + Sync>;

/// A declared capability not yet bound to an instance.
pub struct DeclaredCapability<O> {
    descriptor: CapabilityDescriptor,
    bind: Binder<O>,
}

impl<O> Clone for DeclaredCapability<O> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            bind: Arc::clone(&self.bind),
        }
    }
}

impl<O> DeclaredCapability<O> {
    #[must_use]
    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    /// Bind the capability to `target`, producing the uniform callable.
    #[must_use]
    pub fn create_delegate(&self, target: Arc<O>) -> Delegate {
        (self.bind)(target)
    }
}

/// Types that declare their capabilities explicitly.
///
/// Implementors list one entry per verb/type pairing in `declare`; the list
/// is computed once per type and shared by every instance (see
/// [`DeclarationCache`]).
///
/// ```rust
/// use brrtrest::capability::{CapabilityBuilder, DeclareCapabilities};
/// use brrtrest::identity::Identity;
/// use brrtrest::result::RestResult;
///
/// #[derive(Debug)]
/// struct Pet;
///
/// struct PetStore;
///
/// impl DeclareCapabilities for PetStore {
///     fn declare(builder: &mut CapabilityBuilder<Self>) {
///         builder.get(|_store, id: Identity<Pet>, (): (), _cancel| async move {
///             Ok(RestResult::ok(format!("pet {}", id.value())))
///         });
///     }
/// }
/// ```
pub trait DeclareCapabilities: Send + Sync + Sized + 'static {
    fn declare(builder: &mut CapabilityBuilder<Self>);
}

/// Collects the capability declarations of `O`.
pub struct CapabilityBuilder<O> {
    declared: Vec<DeclaredCapability<O>>,
}

impl<O> Default for CapabilityBuilder<O> {
    fn default() -> Self {
        Self {
            declared: Vec::new(),
        }
    }
}

fn typed_failure(message: &'static str) -> anyhow::Error {
    anyhow!("capability invoked with mismatched input: {message}")
}

impl<O: Send + Sync + 'static> CapabilityBuilder<O> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a capability without a body under `verb`.
    pub fn declare<T, P, R, F, Fut>(&mut self, verb: Method, handler: F) -> &mut Self
    where
        T: ?Sized + 'static,
        P: DeserializeOwned + Send + 'static,
        R: Resource,
        F: Fn(Arc<O>, Identity<T>, P, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<RestResult<R>>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let bind: Binder<O> = Arc::new(move |target: Arc<O>| {
            let handler = Arc::clone(&handler);
            let delegate: Delegate = Arc::new(move |inv: Invocation| -> CapabilityFuture {
                let Ok(params) = inv.parameters.downcast::<P>() else {
                    return futures::future::ready(Err(typed_failure("parameters"))).boxed();
                };
                let id = Identity::<T>::from_value(inv.address.value().clone());
                let fut = handler(Arc::clone(&target), id, *params, inv.cancellation);
                async move { fut.await.map(RestResult::erase) }.boxed()
            });
            delegate
        });
        self.declared.push(DeclaredCapability {
            descriptor: CapabilityDescriptor::new::<T, P, R>(verb),
            bind,
        });
        self
    }

    /// Declare a capability consuming a body of type `B` under `verb`.
    pub fn declare_with_body<T, P, B, R, F, Fut>(&mut self, verb: Method, handler: F) -> &mut Self
    where
        T: ?Sized + 'static,
        P: DeserializeOwned + Send + 'static,
        B: DeserializeOwned + Send + 'static,
        R: Resource,
        F: Fn(Arc<O>, Identity<T>, P, B, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<RestResult<R>>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let bind: Binder<O> = Arc::new(move |target: Arc<O>| {
            let handler = Arc::clone(&handler);
            let delegate: Delegate = Arc::new(move |inv: Invocation| -> CapabilityFuture {
                let Ok(params) = inv.parameters.downcast::<P>() else {
                    return futures::future::ready(Err(typed_failure("parameters"))).boxed();
                };
                let body = match inv.body.map(|b| b.downcast::<B>()) {
                    Some(Ok(body)) => body,
                    Some(Err(_)) => {
                        return futures::future::ready(Err(typed_failure("body"))).boxed();
                    }
                    None => {
                        let missing = RestResult::<Payload>::Failure(Failure::bad_request(
                            serde_json::json!({ "error": "request body is missing" }),
                        ));
                        return futures::future::ready(Ok(missing)).boxed();
                    }
                };
                let id = Identity::<T>::from_value(inv.address.value().clone());
                let fut = handler(Arc::clone(&target), id, *params, *body, inv.cancellation);
                async move { fut.await.map(RestResult::erase) }.boxed()
            });
            delegate
        });
        self.declared.push(DeclaredCapability {
            descriptor: CapabilityDescriptor::with_body::<T, P, B, R>(verb),
            bind,
        });
        self
    }

    pub fn get<T, P, R, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        T: ?Sized + 'static,
        P: DeserializeOwned + Send + 'static,
        R: Resource,
        F: Fn(Arc<O>, Identity<T>, P, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<RestResult<R>>> + Send + 'static,
    {
        self.declare(Method::GET, handler)
    }

    pub fn delete<T, P, R, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        T: ?Sized + 'static,
        P: DeserializeOwned + Send + 'static,
        R: Resource,
        F: Fn(Arc<O>, Identity<T>, P, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<RestResult<R>>> + Send + 'static,
    {
        self.declare(Method::DELETE, handler)
    }

    pub fn put<T, P, B, R, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        T: ?Sized + 'static,
        P: DeserializeOwned + Send + 'static,
        B: DeserializeOwned + Send + 'static,
        R: Resource,
        F: Fn(Arc<O>, Identity<T>, P, B, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<RestResult<R>>> + Send + 'static,
    {
        self.declare_with_body(Method::PUT, handler)
    }

    pub fn post<T, P, B, R, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        T: ?Sized + 'static,
        P: DeserializeOwned + Send + 'static,
        B: DeserializeOwned + Send + 'static,
        R: Resource,
        F: Fn(Arc<O>, Identity<T>, P, B, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<RestResult<R>>> + Send + 'static,
    {
        self.declare_with_body(Method::POST, handler)
    }

    pub fn patch<T, P, B, R, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        T: ?Sized + 'static,
        P: DeserializeOwned + Send + 'static,
        B: DeserializeOwned + Send + 'static,
        R: Resource,
        F: Fn(Arc<O>, Identity<T>, P, B, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<RestResult<R>>> + Send + 'static,
    {
        self.declare_with_body(Method::PATCH, handler)
    }

    #[must_use]
    pub fn build(self) -> Vec<DeclaredCapability<O>> {
        self.declared
    }
}

/// Read-through cache of declared capability sets, keyed by declaring type.
///
/// `DeclareCapabilities::declare` runs once per type per cache; every later
/// lookup clones the shared `Arc`. [`DeclarationCache::shared`] is the
/// process-wide instance used by [`CapabilityRegistry`](super::CapabilityRegistry);
/// tests can build private caches with [`DeclarationCache::new`].
#[derive(Default)]
pub struct DeclarationCache {
    entries: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

static SHARED_DECLARATIONS: Lazy<DeclarationCache> = Lazy::new(DeclarationCache::new);

impl DeclarationCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> &'static DeclarationCache {
        &SHARED_DECLARATIONS
    }

    /// Declarations of `O`, computed on first request.
    pub fn declarations<O: DeclareCapabilities>(&self) -> Arc<Vec<DeclaredCapability<O>>> {
        let key = TypeId::of::<O>();
        if let Some(hit) = self.entries.get(&key) {
            if let Ok(declared) = Arc::clone(hit.value()).downcast::<Vec<DeclaredCapability<O>>>() {
                return declared;
            }
        }
        let mut builder = CapabilityBuilder::<O>::new();
        O::declare(&mut builder);
        let declared = Arc::new(builder.build());
        tracing::debug!(
            declaring_type = std::any::type_name::<O>(),
            capabilities = declared.len(),
            "Capability declarations cached"
        );
        let erased: Arc<dyn Any + Send + Sync> = declared.clone();
        // A concurrent first lookup may have won; keep whichever landed first.
        let stored = Arc::clone(self.entries.entry(key).or_insert(erased).value());
        stored
            .downcast::<Vec<DeclaredCapability<O>>>()
            .unwrap_or(declared)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::TypeInfo;
    use crate::identity::Address;
    use crate::metadata::Parameters;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Pet;

    struct Shelter {
        name: String,
    }

    static DECLARE_CALLS: AtomicUsize = AtomicUsize::new(0);

    impl DeclareCapabilities for Shelter {
        fn declare(builder: &mut CapabilityBuilder<Self>) {
            DECLARE_CALLS.fetch_add(1, Ordering::SeqCst);
            builder
                .get(|s: Arc<Shelter>, id: Identity<Pet>, (): (), _c| async move {
                    Ok(RestResult::ok(format!("{}:{}", s.name, id.value())))
                })
                .post(|_s: Arc<Shelter>, _id: Identity<Pet>, (): (), body: String, _c| async move {
                    Ok(RestResult::ok(body))
                });
        }
    }

    #[test]
    fn test_declarations_are_memoized() {
        let cache = DeclarationCache::new();
        let before = DECLARE_CALLS.load(Ordering::SeqCst);
        let first = cache.declarations::<Shelter>();
        let second = cache.declarations::<Shelter>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(DECLARE_CALLS.load(Ordering::SeqCst), before + 1);
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].descriptor().body_type(), Some(TypeInfo::of::<String>()));
    }

    #[tokio::test]
    async fn test_delegate_binds_to_instance() {
        let declared = DeclarationCache::new().declarations::<Shelter>();
        let target = Arc::new(Shelter {
            name: "north".into(),
        });
        let get = &declared[0];
        let delegate = get.create_delegate(target);
        let params = get.descriptor().coerce_parameters(&Parameters::new()).unwrap();
        let result = delegate(Invocation {
            address: Address::of::<Pet>(7),
            parameters: params,
            body: None,
            cancellation: CancellationToken::new(),
        })
        .await
        .unwrap();
        assert_eq!(
            result.value_as::<String>().map(String::as_str),
            Some("north:7")
        );
    }
}
