use super::builder::{DeclarationCache, DeclareCapabilities};
use super::descriptor::{CapabilityDescriptor, CapabilityKey, Delegate};
use crate::error::RegistrationError;
use crate::identity::ResourceType;
use arc_swap::ArcSwap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A descriptor together with the delegate bound to its instance.
#[derive(Clone)]
pub struct BoundCapability {
    descriptor: CapabilityDescriptor,
    delegate: Delegate,
}

impl BoundCapability {
    #[must_use]
    pub fn new(descriptor: CapabilityDescriptor, delegate: Delegate) -> Self {
        Self {
            descriptor,
            delegate,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn delegate(&self) -> &Delegate {
        &self.delegate
    }
}

impl fmt::Debug for BoundCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCapability")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Default)]
struct CapabilityTable {
    order: Vec<CapabilityKey>,
    entries: HashMap<CapabilityKey, Vec<BoundCapability>>,
    markers: Vec<(TypeId, Arc<dyn Any + Send + Sync>)>,
}

impl CapabilityTable {
    fn push(&mut self, capability: BoundCapability) {
        let key = capability.descriptor.key().clone();
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.entry(key).or_default().push(capability);
    }
}

/// Per-repository capability table.
///
/// Reads take a snapshot of the current table; every registration builds a
/// new table and swaps it in, so readers never observe a partial update.
pub struct CapabilityRegistry {
    entity: ResourceType,
    table: ArcSwap<CapabilityTable>,
}

impl CapabilityRegistry {
    /// Empty registry for capabilities on `entity`.
    #[must_use]
    pub fn new(entity: ResourceType) -> Self {
        Self {
            entity,
            table: ArcSwap::from_pointee(CapabilityTable::default()),
        }
    }

    #[must_use]
    pub fn for_entity<T: ?Sized + 'static>() -> Self {
        Self::new(ResourceType::of::<T>())
    }

    /// Registry built from `target`'s own declared capabilities.
    pub fn from_declared<O: DeclareCapabilities>(
        entity: ResourceType,
        target: Arc<O>,
    ) -> Result<Self, RegistrationError> {
        let registry = Self::new(entity);
        registry.register_dynamic(target)?;
        Ok(registry)
    }

    #[must_use]
    pub fn entity_type(&self) -> ResourceType {
        self.entity
    }

    /// Candidates for `key` in registration order; empty when nothing matches.
    #[must_use]
    pub fn capabilities(&self, key: &CapabilityKey) -> Vec<BoundCapability> {
        self.table
            .load()
            .entries
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// All registered descriptors, grouped by key in first-registration order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        let table = self.table.load();
        table
            .order
            .iter()
            .filter_map(|key| table.entries.get(key))
            .flatten()
            .map(|c| c.descriptor.clone())
            .collect()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<CapabilityKey> {
        self.table.load().order.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.load().entries.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(&self, descriptor: &CapabilityDescriptor) -> Result<(), RegistrationError> {
        if descriptor.entity_type() != self.entity {
            return Err(RegistrationError::EntityMismatch {
                capability: descriptor.name().clone(),
                expected: self.entity,
                found: descriptor.entity_type(),
            });
        }
        Ok(())
    }

    /// Append one bound capability after the existing candidates for its key.
    pub fn register(&self, capability: BoundCapability) -> Result<(), RegistrationError> {
        self.validate(capability.descriptor())?;
        debug!(
            entity = %self.entity,
            capability = %capability.descriptor().key(),
            "Capability registered"
        );
        self.table.rcu(|current| {
            let mut next = CapabilityTable::clone(current);
            next.push(capability.clone());
            next
        });
        Ok(())
    }

    /// Register every capability `target` declares.
    ///
    /// All declarations are validated before any is added; on error the
    /// registry is unchanged. Returns the number of capabilities added.
    pub fn register_dynamic<O: DeclareCapabilities>(
        &self,
        target: Arc<O>,
    ) -> Result<usize, RegistrationError> {
        let declared = DeclarationCache::shared().declarations::<O>();
        if declared.is_empty() {
            return Err(RegistrationError::NoCapabilities {
                type_name: std::any::type_name::<O>(),
            });
        }
        for decl in declared.iter() {
            self.validate(decl.descriptor())?;
        }
        let bound: Vec<BoundCapability> = declared
            .iter()
            .map(|decl| {
                BoundCapability::new(
                    decl.descriptor().clone(),
                    decl.create_delegate(Arc::clone(&target)),
                )
            })
            .collect();
        self.table.rcu(|current| {
            let mut next = CapabilityTable::clone(current);
            for capability in &bound {
                next.push(capability.clone());
            }
            next
        });
        info!(
            entity = %self.entity,
            source = std::any::type_name::<O>(),
            added = bound.len(),
            total = self.len(),
            "Capabilities registered"
        );
        Ok(bound.len())
    }

    /// Make `capability` discoverable through [`CapabilityRegistry::capability`].
    pub fn provide<C: ?Sized + Send + Sync + 'static>(&self, capability: Arc<C>) {
        let entry: Arc<dyn Any + Send + Sync> = Arc::new(capability);
        self.table.rcu(|current| {
            let mut next = CapabilityTable::clone(current);
            next.markers.push((TypeId::of::<Arc<C>>(), Arc::clone(&entry)));
            next
        });
    }

    /// First registered instance of the marker capability `C`.
    #[must_use]
    pub fn capability<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        let wanted = TypeId::of::<Arc<C>>();
        self.table
            .load()
            .markers
            .iter()
            .find(|(id, _)| *id == wanted)
            .and_then(|(_, entry)| entry.downcast_ref::<Arc<C>>())
            .cloned()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("entity", &self.entity)
            .field("keys", &self.keys())
            .finish()
    }
}
