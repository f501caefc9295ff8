//! # Repository Module
//!
//! A repository is the per-resource-type collaborator that owns the
//! capabilities for that type. The dispatcher only sees it through the
//! [`Repository`] trait; storage behind the capabilities is the
//! implementor's business.
//!
//! [`DeclaredRepository`] covers the common case of a repository whose
//! capabilities are all declared by one object, and [`RepositoryMap`] is the
//! resolver the dispatcher uses to find the repository for an address.

use crate::capability::{CapabilityDescriptor, CapabilityRegistry, DeclareCapabilities};
use crate::error::RegistrationError;
use crate::identity::ResourceType;
use crate::result::RestResponse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-resource-type provider of capabilities.
pub trait Repository: Send + Sync + 'static {
    /// Resource type this repository serves.
    fn entity_type(&self) -> ResourceType;

    fn capabilities(&self) -> &CapabilityRegistry;

    /// Types referenced by this repository, for schema discovery.
    fn schema_types(&self) -> Vec<ResourceType> {
        vec![self.entity_type()]
    }

    /// Repository specific post-processing of every dispatched response.
    fn process_response(&self, response: RestResponse) -> RestResponse {
        response
    }

    fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.capabilities().descriptors()
    }
}

/// Repository whose capabilities come from one declaring object.
pub struct DeclaredRepository {
    registry: CapabilityRegistry,
    schema_types: Vec<ResourceType>,
}

impl DeclaredRepository {
    /// Repository for `T` bound to `target`'s declared capabilities.
    pub fn new<T, O>(target: Arc<O>) -> Result<Self, RegistrationError>
    where
        T: ?Sized + 'static,
        O: DeclareCapabilities,
    {
        let entity = ResourceType::of::<T>();
        Ok(Self {
            registry: CapabilityRegistry::from_declared(entity, target)?,
            schema_types: vec![entity],
        })
    }

    /// Add a type referenced by this repository's values.
    #[must_use]
    pub fn with_schema_type<S: ?Sized + 'static>(mut self) -> Self {
        let ty = ResourceType::of::<S>();
        if !self.schema_types.contains(&ty) {
            self.schema_types.push(ty);
        }
        self
    }
}

impl Repository for DeclaredRepository {
    fn entity_type(&self) -> ResourceType {
        self.registry.entity_type()
    }

    fn capabilities(&self) -> &CapabilityRegistry {
        &self.registry
    }

    fn schema_types(&self) -> Vec<ResourceType> {
        self.schema_types.clone()
    }
}

/// Resolves the repository registered for a resource type.
#[derive(Clone, Default)]
pub struct RepositoryMap {
    repositories: HashMap<ResourceType, Arc<dyn Repository>>,
}

impl RepositoryMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `repository` under its entity type, replacing any previous one.
    pub fn insert(&mut self, repository: Arc<dyn Repository>) {
        let entity = repository.entity_type();
        if self.repositories.insert(entity, repository).is_some() {
            warn!(entity = %entity, "Replaced existing repository");
        } else {
            info!(
                entity = %entity,
                total_repositories = self.repositories.len(),
                "Repository registered"
            );
        }
    }

    #[must_use]
    pub fn with(mut self, repository: Arc<dyn Repository>) -> Self {
        self.insert(repository);
        self
    }

    #[must_use]
    pub fn get(&self, entity: ResourceType) -> Option<Arc<dyn Repository>> {
        self.repositories.get(&entity).cloned()
    }

    #[must_use]
    pub fn contains(&self, entity: ResourceType) -> bool {
        self.repositories.contains_key(&entity)
    }

    /// Every type referenced by any registered repository, deduplicated.
    #[must_use]
    pub fn schema_types(&self) -> Vec<ResourceType> {
        let mut types: Vec<ResourceType> = Vec::new();
        for repo in self.repositories.values() {
            for ty in repo.schema_types() {
                if !types.contains(&ty) {
                    types.push(ty);
                }
            }
        }
        types
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

impl fmt::Debug for RepositoryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.repositories.keys()).finish()
    }
}
