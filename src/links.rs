//! # Links Module
//!
//! Hypermedia links attached to successful results by the dispatcher.
//!
//! Two kinds of providers exist per resource type:
//!
//! - **static** providers compute links from the address alone, without the value
//! - **dynamic** providers compute links from the value a capability returned
//!
//! Every link is then checked against an [`Authorizer`]: a link whose
//! capability the current principal may not exercise is dropped.

use crate::capability::CapabilityKey;
use crate::identity::{Address, Identity, Payload, Resource, ResourceType};
use crate::metadata::Principal;
use crate::result::Link;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type StaticLinkProvider = Arc<dyn Fn(&Address) -> Vec<Link> + Send + Sync>;
type DynamicLinkProvider = Arc<dyn Fn(&Payload) -> Vec<Link> + Send + Sync>;

/// Link providers keyed by resource type.
#[derive(Clone, Default)]
pub struct LinkProviders {
    static_providers: HashMap<ResourceType, Vec<StaticLinkProvider>>,
    dynamic_providers: HashMap<ResourceType, Vec<DynamicLinkProvider>>,
}

impl LinkProviders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider computing links for `T` from its identity.
    pub fn add_static<T, F>(&mut self, provider: F) -> &mut Self
    where
        T: ?Sized + 'static,
        F: Fn(&Identity<T>) -> Vec<Link> + Send + Sync + 'static,
    {
        let erased: StaticLinkProvider = Arc::new(move |address: &Address| {
            address
                .typed::<T>()
                .map(|id| provider(&id))
                .unwrap_or_default()
        });
        self.static_providers
            .entry(ResourceType::of::<T>())
            .or_default()
            .push(erased);
        self
    }

    /// Add a provider computing links from a returned value of type `T`.
    pub fn add_dynamic<T, F>(&mut self, provider: F) -> &mut Self
    where
        T: Resource,
        F: Fn(&T) -> Vec<Link> + Send + Sync + 'static,
    {
        let erased: DynamicLinkProvider = Arc::new(move |value: &Payload| {
            value.downcast_ref::<T>().map(&provider).unwrap_or_default()
        });
        self.dynamic_providers
            .entry(ResourceType::of::<T>())
            .or_default()
            .push(erased);
        self
    }

    /// Links available from the address alone.
    #[must_use]
    pub fn static_links(&self, address: &Address) -> Vec<Link> {
        self.static_providers
            .get(&address.resource_type())
            .map(|providers| providers.iter().flat_map(|p| p(address)).collect())
            .unwrap_or_default()
    }

    /// Links computed from a value, by the value's runtime type.
    #[must_use]
    pub fn dynamic_links(&self, value: &Payload) -> Vec<Link> {
        self.dynamic_providers
            .get(&value.resource_type())
            .map(|providers| providers.iter().flat_map(|p| p(value)).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.static_providers.is_empty() && self.dynamic_providers.is_empty()
    }
}

impl fmt::Debug for LinkProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkProviders")
            .field("static", &self.static_providers.keys().collect::<Vec<_>>())
            .field("dynamic", &self.dynamic_providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Decides whether a principal may exercise a capability.
pub trait Authorizer: Send + Sync {
    fn is_allowed(&self, principal: Option<&Principal>, capability: &CapabilityKey) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(Option<&Principal>, &CapabilityKey) -> bool + Send + Sync,
{
    fn is_allowed(&self, principal: Option<&Principal>, capability: &CapabilityKey) -> bool {
        self(principal, capability)
    }
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_allowed(&self, _principal: Option<&Principal>, _capability: &CapabilityKey) -> bool {
        true
    }
}

/// Role based rules: a listed capability requires one of its roles.
///
/// Capabilities without a rule are allowed.
#[derive(Debug, Clone, Default)]
pub struct RoleAuthorizer {
    rules: HashMap<CapabilityKey, Vec<String>>,
}

impl RoleAuthorizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn require(mut self, capability: CapabilityKey, role: impl Into<String>) -> Self {
        self.rules.entry(capability).or_default().push(role.into());
        self
    }
}

impl Authorizer for RoleAuthorizer {
    fn is_allowed(&self, principal: Option<&Principal>, capability: &CapabilityKey) -> bool {
        match self.rules.get(capability) {
            None => true,
            Some(roles) => principal.is_some_and(|p| roles.iter().any(|r| p.has_role(r))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde::Serialize;

    #[derive(Debug, Serialize)]
    struct Pet {
        id: u64,
        owner: u64,
    }

    impl Resource for Pet {}

    #[derive(Debug)]
    struct Owner;

    #[test]
    fn test_static_and_dynamic_providers() {
        let mut providers = LinkProviders::new();
        providers
            .add_static::<Pet, _>(|id| vec![Link::new("photos", Address::of::<Pet>(id.value().clone()))])
            .add_dynamic::<Pet, _>(|pet| vec![Link::new("owner", Address::of::<Owner>(pet.owner))]);

        let address = Address::of::<Pet>(1);
        assert_eq!(providers.static_links(&address).len(), 1);
        assert!(providers.static_links(&Address::of::<Owner>(1)).is_empty());

        let value = Payload::new(Pet { id: 1, owner: 9 });
        let links = providers.dynamic_links(&value);
        assert_eq!(links[0].target, Address::of::<Owner>(9));
    }

    #[test]
    fn test_role_authorizer() {
        let delete = CapabilityKey::of::<Pet>(Method::DELETE);
        let auth = RoleAuthorizer::new().require(delete.clone(), "admin");
        assert!(!auth.is_allowed(None, &delete));
        assert!(!auth.is_allowed(Some(&Principal::new("bob")), &delete));
        assert!(auth.is_allowed(Some(&Principal::new("ann").with_role("admin")), &delete));
        assert!(auth.is_allowed(None, &CapabilityKey::of::<Pet>(Method::GET)));
    }
}
