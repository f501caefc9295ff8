//! # Identity Module
//!
//! Resources are addressed by opaque identity values. An identity carries a
//! static resource type (the Rust type the repository serves) and a
//! decomposable JSON value (a key, a composite key, or `null` for the
//! collection itself).
//!
//! - [`ResourceType`] - the erased static type of a resource
//! - [`Identity<T>`] - a typed identity, handed to capabilities
//! - [`Address`] - the erased identity carried by requests and links
//! - [`Resource`] - trait implemented by every value a capability returns
//! - [`Payload`] - a type-erased, shareable resource value
//!
//! ```rust
//! use brrtrest::identity::{Address, Identity};
//!
//! #[derive(Debug)]
//! struct Pet;
//!
//! let id: Identity<Pet> = Identity::new(42);
//! let address: Address = id.clone().into();
//! assert_eq!(address.typed::<Pet>(), Some(id));
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// The static type of a resource, erased to a comparable key.
#[derive(Clone, Copy)]
pub struct ResourceType {
    id: TypeId,
    name: &'static str,
}

impl ResourceType {
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name (`my_app::model::Pet` -> `Pet`).
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }

    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

pub(crate) fn short_type_name(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base)
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ResourceType {}

impl Hash for ResourceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceType({})", self.name)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Marker resource type for schema identities (`describedby` links).
#[derive(Debug, Clone, Copy)]
pub struct Schema;

/// Erased identity: resource type plus identity value.
#[derive(Clone, Debug, PartialEq)]
pub struct Address {
    resource: ResourceType,
    value: Value,
}

impl Address {
    #[must_use]
    pub fn new(resource: ResourceType, value: Value) -> Self {
        Self { resource, value }
    }

    /// Address of a resource of type `T` with the given identity value.
    pub fn of<T: ?Sized + 'static>(value: impl Into<Value>) -> Self {
        Self::new(ResourceType::of::<T>(), value.into())
    }

    /// Address of the collection of `T` (identity value `null`).
    #[must_use]
    pub fn collection_of<T: ?Sized + 'static>() -> Self {
        Self::new(ResourceType::of::<T>(), Value::Null)
    }

    /// Schema identity describing the given Rust type name.
    #[must_use]
    pub fn schema_for(type_name: &str) -> Self {
        Self::of::<Schema>(short_type_name(type_name).to_string())
    }

    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.value.is_null()
    }

    /// Recover the typed identity if this address targets `T`.
    #[must_use]
    pub fn typed<T: ?Sized + 'static>(&self) -> Option<Identity<T>> {
        if self.resource.is::<T>() {
            Some(Identity::from_value(self.value.clone()))
        } else {
            None
        }
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resource.hash(state);
        // serde_json::Value has no Hash impl; the canonical text form does.
        self.value.to_string().hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Null => write!(f, "{}", self.resource),
            Value::String(s) => write!(f, "{}/{}", self.resource, s),
            other => write!(f, "{}/{}", self.resource, other),
        }
    }
}

/// Typed identity of a resource of type `T`.
pub struct Identity<T: ?Sized> {
    value: Value,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ?Sized + 'static> Identity<T> {
    pub fn new(value: impl Into<Value>) -> Self {
        Self::from_value(value.into())
    }

    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    /// Identity of the collection of `T`.
    #[must_use]
    pub fn collection() -> Self {
        Self::from_value(Value::Null)
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Decode the identity value into a concrete key type.
    pub fn value_as<V: DeserializeOwned>(&self) -> Result<V, serde_json::Error> {
        serde_json::from_value(self.value.clone())
    }

    #[must_use]
    pub fn address(&self) -> Address {
        Address::new(ResourceType::of::<T>(), self.value.clone())
    }
}

impl<T: ?Sized> Clone for Identity<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> PartialEq for Identity<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: ?Sized + 'static> fmt::Debug for Identity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Identity")
            .field(&ResourceType::of::<T>().short_name())
            .field(&self.value)
            .finish()
    }
}

impl<T: ?Sized + 'static> From<Identity<T>> for Address {
    fn from(id: Identity<T>) -> Self {
        Address::new(ResourceType::of::<T>(), id.value)
    }
}

/// Value types a capability may return.
///
/// Serialization itself belongs to the codec layer; the core only needs
/// `Serialize` for content hashing and the optional identity for self links.
pub trait Resource: Serialize + fmt::Debug + Send + Sync + 'static {
    /// Identity of this value, when it is an addressable resource.
    fn identity(&self) -> Option<Address> {
        None
    }
}

macro_rules! plain_resource {
    ($($t:ty),* $(,)?) => {
        $(impl Resource for $t {})*
    };
}

plain_resource!(String, Value, (), bool, i32, i64, u32, u64, f64);

impl<T: Resource> Resource for Vec<T> {}

impl<T: Resource> Resource for Option<T> {
    fn identity(&self) -> Option<Address> {
        self.as_ref().and_then(Resource::identity)
    }
}

trait ErasedResource: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn to_json(&self) -> Result<Value, serde_json::Error>;
    fn identity(&self) -> Option<Address>;
    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: Resource> ErasedResource for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn identity(&self) -> Option<Address> {
        Resource::identity(self)
    }

    fn debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Type-erased, cheaply clonable resource value.
#[derive(Clone)]
pub struct Payload {
    inner: Arc<dyn ErasedResource>,
    resource: ResourceType,
}

impl Payload {
    pub fn new<T: Resource>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            resource: ResourceType::of::<T>(),
        }
    }

    /// Runtime type of the wrapped value.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.resource.name()
    }

    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.resource.is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        self.inner.to_json()
    }

    #[must_use]
    pub fn identity(&self) -> Option<Address> {
        self.inner.identity()
    }

    /// True when both payloads share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Payload) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.debug(f)
    }
}
