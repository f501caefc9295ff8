use crate::convert::{from_parameters, ConvertError};
use crate::identity::{Address, Payload, ResourceType};
use crate::metadata::Parameters;
use crate::request::BodyError;
use crate::result::RestResult;
use futures::future::BoxFuture;
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Static type of a declared parameter, body or result.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
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

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Registry lookup key: a verb on a resource type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CapabilityKey {
    pub name: Method,
    pub entity: ResourceType,
}

impl CapabilityKey {
    #[must_use]
    pub fn new(name: Method, entity: ResourceType) -> Self {
        Self { name, entity }
    }

    #[must_use]
    pub fn of<T: ?Sized + 'static>(name: Method) -> Self {
        Self::new(name, ResourceType::of::<T>())
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.entity)
    }
}

/// A coerced parameter or body value on its way into a typed delegate.
pub type ErasedValue = Box<dyn Any + Send>;

type ParameterCoercer = fn(&Parameters) -> Result<ErasedValue, ConvertError>;
type BodyCoercer = fn(Value) -> Result<ErasedValue, BodyError>;

fn coerce_parameters<P: DeserializeOwned + Send + 'static>(
    params: &Parameters,
) -> Result<ErasedValue, ConvertError> {
    from_parameters::<P>(params).map(|p| Box::new(p) as ErasedValue)
}

fn coerce_body<B: DeserializeOwned + Send + 'static>(value: Value) -> Result<ErasedValue, BodyError> {
    serde_json::from_value::<B>(value)
        .map(|b| Box::new(b) as ErasedValue)
        .map_err(|e| BodyError::Invalid(e.to_string()))
}

/// Shape of one verb/type pairing.
///
/// Besides the declared types the descriptor knows how to coerce raw request
/// input into them, which is what lets the dispatcher treat every candidate
/// through the same erased [`Invocation`].
#[derive(Clone)]
pub struct CapabilityDescriptor {
    key: CapabilityKey,
    parameter_type: TypeInfo,
    body_type: Option<TypeInfo>,
    result_type: TypeInfo,
    parameters: ParameterCoercer,
    body: Option<BodyCoercer>,
}

impl CapabilityDescriptor {
    /// Descriptor for a capability without a body (GET, DELETE).
    #[must_use]
    pub fn new<T, P, R>(name: Method) -> Self
    where
        T: ?Sized + 'static,
        P: DeserializeOwned + Send + 'static,
        R: 'static,
    {
        Self {
            key: CapabilityKey::of::<T>(name),
            parameter_type: TypeInfo::of::<P>(),
            body_type: None,
            result_type: TypeInfo::of::<R>(),
            parameters: coerce_parameters::<P>,
            body: None,
        }
    }

    /// Descriptor for a capability that consumes a body of type `B`.
    #[must_use]
    pub fn with_body<T, P, B, R>(name: Method) -> Self
    where
        T: ?Sized + 'static,
        P: DeserializeOwned + Send + 'static,
        B: DeserializeOwned + Send + 'static,
        R: 'static,
    {
        Self {
            body_type: Some(TypeInfo::of::<B>()),
            body: Some(coerce_body::<B>),
            ..Self::new::<T, P, R>(name)
        }
    }

    #[must_use]
    pub fn key(&self) -> &CapabilityKey {
        &self.key
    }

    #[must_use]
    pub fn name(&self) -> &Method {
        &self.key.name
    }

    #[must_use]
    pub fn entity_type(&self) -> ResourceType {
        self.key.entity
    }

    #[must_use]
    pub fn parameter_type(&self) -> TypeInfo {
        self.parameter_type
    }

    #[must_use]
    pub fn body_type(&self) -> Option<TypeInfo> {
        self.body_type
    }

    #[must_use]
    pub fn result_type(&self) -> TypeInfo {
        self.result_type
    }

    /// Coerce the request's string parameters into the declared parameter type.
    pub fn coerce_parameters(&self, params: &Parameters) -> Result<ErasedValue, ConvertError> {
        (self.parameters)(params)
    }

    /// Coerce a decoded body into the declared body type.
    ///
    /// Returns `None` when the capability declares no body.
    pub fn coerce_body(&self, value: Value) -> Option<Result<ErasedValue, BodyError>> {
        self.body.map(|coerce| coerce(value))
    }
}

impl PartialEq for CapabilityDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.parameter_type == other.parameter_type
            && self.body_type == other.body_type
            && self.result_type == other.result_type
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("key", &self.key)
            .field("parameter_type", &self.parameter_type)
            .field("body_type", &self.body_type)
            .field("result_type", &self.result_type)
            .finish()
    }
}

/// Uniform input of a bound capability.
pub struct Invocation {
    pub address: Address,
    pub parameters: ErasedValue,
    pub body: Option<ErasedValue>,
    pub cancellation: CancellationToken,
}

/// Future returned by a bound capability.
pub type CapabilityFuture = BoxFuture<'static, anyhow::Result<RestResult<Payload>>>;

/// A capability bound to its target instance.
pub type Delegate = Arc<dyn Fn(Invocation) -> CapabilityFuture + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug)]
    struct Pet;

    #[derive(Debug, Deserialize)]
    struct NewPet {
        name: String,
    }

    #[test]
    fn test_descriptor_shape() {
        let get = CapabilityDescriptor::new::<Pet, (), String>(Method::GET);
        assert_eq!(get.key(), &CapabilityKey::of::<Pet>(Method::GET));
        assert!(get.body_type().is_none());
        assert_eq!(get.result_type(), TypeInfo::of::<String>());

        let post = CapabilityDescriptor::with_body::<Pet, (), NewPet, String>(Method::POST);
        assert_eq!(post.body_type(), Some(TypeInfo::of::<NewPet>()));
        assert_ne!(get, post);
    }

    #[test]
    fn test_coercion_through_descriptor() {
        let post = CapabilityDescriptor::with_body::<Pet, u32, NewPet, String>(Method::POST);
        let params = post
            .coerce_parameters(&Parameters::new().with("id", "3"))
            .unwrap();
        assert_eq!(params.downcast_ref::<u32>(), Some(&3));

        let body = post
            .coerce_body(serde_json::json!({ "name": "rex" }))
            .unwrap()
            .unwrap();
        assert_eq!(body.downcast_ref::<NewPet>().unwrap().name, "rex");

        let bad = post.coerce_body(serde_json::json!([1])).unwrap();
        assert!(matches!(bad, Err(BodyError::Invalid(_))));
    }
}
