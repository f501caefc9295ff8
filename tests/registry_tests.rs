//! Tests for capability declaration and the per-type registry
//!
//! # Test Coverage
//!
//! - Lookup by `(verb, type)` in registration order
//! - Dynamic registration of additional declaring objects
//! - Validation (`EntityMismatch`, `NoCapabilities`) without partial updates
//! - Copy-on-write snapshots and concurrent registration
//! - Marker capabilities (`provide` / `capability`)
//! - Per-type declaration cache

mod common;

use brrtrest::capability::{
    BoundCapability, CapabilityBuilder, CapabilityDescriptor, CapabilityKey, CapabilityRegistry,
    DeclarationCache, DeclareCapabilities, Delegate, Invocation, TypeInfo,
};
use brrtrest::error::RegistrationError;
use brrtrest::identity::{Identity, Payload, ResourceType};
use brrtrest::repository::{DeclaredRepository, Repository, RepositoryMap};
use brrtrest::result::RestResult;
use common::{Owner, Pet, PetStore, PetUpdate};
use futures::FutureExt;
use http::Method;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Declares a second GET and a POST on `Pet`.
struct PetArchive;

impl DeclareCapabilities for PetArchive {
    fn declare(builder: &mut CapabilityBuilder<Self>) {
        builder
            .get(|_s, _id: Identity<Pet>, (): (), _c: CancellationToken| async {
                Ok(RestResult::ok("archived".to_string()))
            })
            .post(
                |_s, _id: Identity<Pet>, (): (), body: PetUpdate, _c: CancellationToken| async move {
                    Ok(RestResult::ok(body.name))
                },
            );
    }
}

/// Declares a capability on the wrong resource type.
struct OwnerLookup;

impl DeclareCapabilities for OwnerLookup {
    fn declare(builder: &mut CapabilityBuilder<Self>) {
        builder
            .get(|_s, _id: Identity<Pet>, (): (), _c: CancellationToken| async {
                Ok(RestResult::ok(()))
            })
            .get(|_s, _id: Identity<Owner>, (): (), _c: CancellationToken| async {
                Ok(RestResult::ok(()))
            });
    }
}

/// Declares nothing.
struct Silent;

impl DeclareCapabilities for Silent {
    fn declare(_builder: &mut CapabilityBuilder<Self>) {}
}

fn pet_registry() -> CapabilityRegistry {
    let registry = CapabilityRegistry::for_entity::<Pet>();
    registry.register_dynamic(Arc::new(PetStore::seeded())).unwrap();
    registry
}

#[test]
fn test_lookup_by_verb_in_registration_order() {
    let registry = pet_registry();
    registry.register_dynamic(Arc::new(PetArchive)).unwrap();

    let gets = registry.capabilities(&CapabilityKey::of::<Pet>(Method::GET));
    assert_eq!(gets.len(), 2);
    assert_eq!(gets[0].descriptor().result_type(), TypeInfo::of::<Pet>());
    assert_eq!(gets[1].descriptor().result_type(), TypeInfo::of::<String>());

    let puts = registry.capabilities(&CapabilityKey::of::<Pet>(Method::PUT));
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].descriptor().body_type(), Some(TypeInfo::of::<PetUpdate>()));

    assert!(registry
        .capabilities(&CapabilityKey::of::<Pet>(Method::PATCH))
        .is_empty());
    assert!(registry
        .capabilities(&CapabilityKey::of::<Owner>(Method::GET))
        .is_empty());
}

#[test]
fn test_keys_keep_first_registration_order() {
    let registry = pet_registry();
    registry.register_dynamic(Arc::new(PetArchive)).unwrap();

    let names: Vec<Method> = registry.keys().into_iter().map(|k| k.name).collect();
    assert_eq!(names, [Method::GET, Method::PUT, Method::DELETE, Method::POST]);
    assert_eq!(registry.len(), 5);
    assert_eq!(registry.descriptors().len(), 5);
}

#[test]
fn test_register_dynamic_returns_added_count() {
    let registry = CapabilityRegistry::for_entity::<Pet>();
    assert!(registry.is_empty());
    assert_eq!(registry.register_dynamic(Arc::new(PetArchive)).unwrap(), 2);
    assert_eq!(registry.register_dynamic(Arc::new(PetArchive)).unwrap(), 2);
    assert_eq!(
        registry
            .capabilities(&CapabilityKey::of::<Pet>(Method::GET))
            .len(),
        2
    );
}

#[test]
fn test_entity_mismatch_leaves_registry_unchanged() {
    let registry = pet_registry();
    let before = registry.len();

    let err = registry.register_dynamic(Arc::new(OwnerLookup)).unwrap_err();
    assert_eq!(
        err,
        RegistrationError::EntityMismatch {
            capability: Method::GET,
            expected: ResourceType::of::<Pet>(),
            found: ResourceType::of::<Owner>(),
        }
    );
    assert!(err.to_string().contains("Owner"));
    assert_eq!(registry.len(), before);
}

#[test]
fn test_object_without_declarations_is_rejected() {
    let registry = CapabilityRegistry::for_entity::<Pet>();
    let err = registry.register_dynamic(Arc::new(Silent)).unwrap_err();
    assert!(matches!(err, RegistrationError::NoCapabilities { .. }));
    assert!(DeclaredRepository::new::<Pet, _>(Arc::new(Silent)).is_err());
}

fn echo_delegate() -> Delegate {
    Arc::new(|inv: Invocation| {
        let value = inv.address.value().clone();
        async move { Ok::<_, anyhow::Error>(RestResult::ok(Payload::new(value))) }.boxed()
    })
}

#[test]
fn test_register_bound_capability() {
    let registry = CapabilityRegistry::for_entity::<Pet>();
    let descriptor = CapabilityDescriptor::new::<Pet, (), serde_json::Value>(Method::GET);
    registry
        .register(BoundCapability::new(descriptor.clone(), echo_delegate()))
        .unwrap();
    assert_eq!(
        registry.capabilities(&CapabilityKey::of::<Pet>(Method::GET))[0].descriptor(),
        &descriptor
    );

    let foreign = CapabilityDescriptor::new::<Owner, (), serde_json::Value>(Method::GET);
    let err = registry
        .register(BoundCapability::new(foreign, echo_delegate()))
        .unwrap_err();
    assert!(matches!(err, RegistrationError::EntityMismatch { .. }));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_snapshots_are_not_affected_by_later_registration() {
    let registry = pet_registry();
    let key = CapabilityKey::of::<Pet>(Method::GET);
    let snapshot = registry.capabilities(&key);

    registry.register_dynamic(Arc::new(PetArchive)).unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(registry.capabilities(&key).len(), 2);
}

#[test]
fn test_concurrent_registration() {
    let registry = Arc::new(CapabilityRegistry::for_entity::<Pet>());
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..10 {
                    registry.register_dynamic(Arc::new(PetArchive)).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(registry.len(), 8 * 10 * 2);
}

trait Discount: Send + Sync {
    fn percent(&self) -> u8;
}

struct Summer;

impl Discount for Summer {
    fn percent(&self) -> u8 {
        15
    }
}

#[test]
fn test_marker_capability() {
    let registry = pet_registry();
    assert!(registry.capability::<dyn Discount>().is_none());

    let summer: Arc<dyn Discount> = Arc::new(Summer);
    registry.provide::<dyn Discount>(summer);
    let found = registry.capability::<dyn Discount>().unwrap();
    assert_eq!(found.percent(), 15);
    assert!(registry.capability::<String>().is_none());
}

static DECLARE_CALLS: AtomicUsize = AtomicUsize::new(0);

struct CountedDeclarations;

impl DeclareCapabilities for CountedDeclarations {
    fn declare(builder: &mut CapabilityBuilder<Self>) {
        DECLARE_CALLS.fetch_add(1, Ordering::SeqCst);
        builder.delete(|_s, _id: Identity<Pet>, (): (), _c: CancellationToken| async {
            Ok(RestResult::ok(()))
        });
    }
}

#[test]
fn test_declarations_are_memoized_per_type() {
    let cache = DeclarationCache::new();
    let first = cache.declarations::<CountedDeclarations>();
    let second = cache.declarations::<CountedDeclarations>();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(DECLARE_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_repository_map() {
    let pets = DeclaredRepository::new::<Pet, _>(Arc::new(PetStore::seeded()))
        .unwrap()
        .with_schema_type::<Owner>();
    assert_eq!(pets.descriptors().len(), 3);

    let map = RepositoryMap::new().with(Arc::new(pets));
    assert!(map.contains(ResourceType::of::<Pet>()));
    assert!(map.get(ResourceType::of::<Owner>()).is_none());
    assert_eq!(
        map.schema_types(),
        vec![ResourceType::of::<Pet>(), ResourceType::of::<Owner>()]
    );
}
