//! # Capability Module
//!
//! A capability is one verb-shaped operation (GET, PUT, POST, DELETE, PATCH)
//! that a repository exposes for a resource type. This module holds the three
//! pieces the dispatcher needs to find and call one:
//!
//! - [`CapabilityDescriptor`] - the declared shape: key, parameter, body and result types
//! - [`CapabilityBuilder`] / [`DeclareCapabilities`] - explicit declaration of a type's capabilities
//! - [`CapabilityRegistry`] - per-repository, copy-on-write table of bound candidates
//!
//! ## Declaring Capabilities
//!
//! Capabilities are declared in code, one builder call per verb. Each handler
//! receives the target instance, the typed identity, the coerced parameters,
//! the body (for PUT/POST/PATCH) and the request's cancellation token:
//!
//! ```rust
//! use brrtrest::capability::{CapabilityBuilder, CapabilityKey, CapabilityRegistry, DeclareCapabilities};
//! use brrtrest::identity::Identity;
//! use brrtrest::result::RestResult;
//! use http::Method;
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct Pet;
//!
//! struct PetStore;
//!
//! impl DeclareCapabilities for PetStore {
//!     fn declare(builder: &mut CapabilityBuilder<Self>) {
//!         builder
//!             .get(|_s, _id: Identity<Pet>, (): (), _c| async { Ok(RestResult::ok("rex".to_string())) })
//!             .put(|_s, _id: Identity<Pet>, (): (), name: String, _c| async move { Ok(RestResult::ok(name)) });
//!     }
//! }
//!
//! let registry = CapabilityRegistry::for_entity::<Pet>();
//! registry.register_dynamic(Arc::new(PetStore)).unwrap();
//! assert_eq!(registry.capabilities(&CapabilityKey::of::<Pet>(Method::GET)).len(), 1);
//! assert!(registry.capabilities(&CapabilityKey::of::<Pet>(Method::DELETE)).is_empty());
//! ```
//!
//! ## Ordering
//!
//! Candidates for a key keep their registration order. Registering a second
//! object that declares the same verb adds a fallback candidate after the
//! first; the dispatcher tries them in that order.

mod builder;
mod descriptor;
mod registry;

pub use builder::{CapabilityBuilder, DeclarationCache, DeclareCapabilities, DeclaredCapability};
pub use descriptor::{
    CapabilityDescriptor, CapabilityFuture, CapabilityKey, Delegate, ErasedValue, Invocation,
    TypeInfo,
};
pub use registry::{BoundCapability, CapabilityRegistry};
