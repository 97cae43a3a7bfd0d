use std::collections::HashMap;
use std::sync::Arc;

use crate::entry::{ConstructedObjectEntry, ObjectToConstructEntry};
use crate::errors::{MultipleBindingsError, NormalizationError};
use crate::type_id::{TypeId, TypeInfo};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A single resolved, deduplicated binding: either a pre-existing instance
/// or a recipe to construct one on first injection.
#[derive(Clone)]
pub enum ResolvedBinding {
    ConstructedObject(ConstructedObjectEntry),
    ObjectToConstruct(ObjectToConstructEntry),
}

impl ResolvedBinding {
    pub fn type_id(&self) -> TypeId {
        match self {
            Self::ConstructedObject(e) => e.type_id,
            Self::ObjectToConstruct(e) => e.type_id,
        }
    }

    /// Bindings are idempotent: the same key may be (re-)inserted with an
    /// entry that is the *same* binding (same object pointer, or same
    /// create-thunk pointer), in which case the second insertion is a
    /// no-op rather than a conflict.
    fn same_binding_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::ConstructedObject(a), Self::ConstructedObject(b)) => {
                Arc::ptr_eq(&a.instance, &b.instance)
            }
            (Self::ObjectToConstruct(a), Self::ObjectToConstruct(b)) => {
                Arc::ptr_eq(&a.create, &b.create)
            }
            _ => false,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Looks up bindings in a previously-normalized component this one is
/// overlaid on top of (§6: "base-component lookup interface").
pub trait BaseComponent {
    fn lookup(&self, type_id: TypeId) -> Option<ResolvedBinding>;
}

/// No base component: every binding must be satisfied locally.
pub struct NoBaseComponent;

impl BaseComponent for NoBaseComponent {
    fn lookup(&self, _type_id: TypeId) -> Option<ResolvedBinding> {
        None
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Working map from `TypeId` to candidate binding, accumulated while the
/// expansion engine drains the entry stream. Becomes the final
/// [`BindingTable`] once expansion ends.
#[derive(Default)]
pub struct BindingTableBuilder {
    bindings: HashMap<TypeId, ResolvedBinding>,
}

impl BindingTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the merge rule from the binding-table builder design: insert
    /// if absent, ignore if the incoming entry is the same binding as
    /// what's already there (possibly inherited from `base`), error
    /// otherwise.
    pub fn insert(
        &mut self,
        candidate: ResolvedBinding,
        base: &dyn BaseComponent,
    ) -> Result<(), NormalizationError> {
        let type_id = candidate.type_id();

        if let Some(existing) = self.bindings.get(&type_id) {
            if existing.same_binding_as(&candidate) {
                return Ok(());
            }
            return Err(conflict(type_id));
        }

        if let Some(base_binding) = base.lookup(type_id) {
            if base_binding.same_binding_as(&candidate) {
                return Ok(());
            }
            return Err(conflict(type_id));
        }

        self.bindings.insert(type_id, candidate);
        Ok(())
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.bindings.contains_key(&type_id)
    }

    pub fn get(&self, type_id: TypeId) -> Option<&ResolvedBinding> {
        self.bindings.get(&type_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeId, &ResolvedBinding)> {
        self.bindings.iter()
    }

    pub fn remove(&mut self, type_id: TypeId) -> Option<ResolvedBinding> {
        self.bindings.remove(&type_id)
    }

    /// Replaces (or inserts) a binding unconditionally. Used by the
    /// compressor to rewrite `I`'s entry after a successful fold.
    pub fn overwrite(&mut self, binding: ResolvedBinding) {
        self.bindings.insert(binding.type_id(), binding);
    }

    pub fn finish(self) -> BindingTable {
        BindingTable {
            bindings: self.bindings,
        }
    }
}

fn conflict(type_id: TypeId) -> NormalizationError {
    NormalizationError::MultipleBindings(MultipleBindingsError {
        type_info: TypeInfo {
            id: type_id,
            name: type_id.name(),
        },
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Immutable, deduplicated mapping from `TypeId` to a single binding. Final
/// output of normalization's binding-table stage.
#[derive(Clone, Default)]
pub struct BindingTable {
    bindings: HashMap<TypeId, ResolvedBinding>,
}

impl BindingTable {
    pub fn get(&self, type_id: TypeId) -> Option<&ResolvedBinding> {
        self.bindings.get(&type_id)
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.bindings.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeId, &ResolvedBinding)> {
        self.bindings.iter()
    }

    /// Reopens a finished table for further mutation (used to reverse a
    /// compression fold when overlaying a new component on a base one).
    pub fn into_builder(self) -> BindingTableBuilder {
        BindingTableBuilder {
            bindings: self.bindings,
        }
    }
}

impl BaseComponent for BindingTable {
    fn lookup(&self, type_id: TypeId) -> Option<ResolvedBinding> {
        self.get(type_id).cloned()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::Layout;

    fn make_object_entry(type_id: TypeId, tag: u8) -> ObjectToConstructEntry {
        ObjectToConstructEntry {
            type_id,
            create: Arc::new(move |_inj| {
                let _ = tag;
                Ok(Arc::new(tag) as crate::entry::AnyArc)
            }),
            dependencies: Vec::new(),
            layout: Layout::new::<u8>(),
        }
    }

    #[test]
    fn first_insert_succeeds() {
        let mut builder = BindingTableBuilder::new();
        let t = TypeId::of::<u8>();
        builder
            .insert(
                ResolvedBinding::ObjectToConstruct(make_object_entry(t, 1)),
                &NoBaseComponent,
            )
            .unwrap();
        assert!(builder.contains(t));
    }

    #[test]
    fn reinserting_the_same_thunk_is_idempotent() {
        let mut builder = BindingTableBuilder::new();
        let t = TypeId::of::<u8>();
        let entry = make_object_entry(t, 1);

        builder
            .insert(ResolvedBinding::ObjectToConstruct(entry.clone()), &NoBaseComponent)
            .unwrap();
        builder
            .insert(ResolvedBinding::ObjectToConstruct(entry), &NoBaseComponent)
            .unwrap();

        assert_eq!(builder.finish().len(), 1);
    }

    #[test]
    fn conflicting_bindings_error() {
        let mut builder = BindingTableBuilder::new();
        let t = TypeId::of::<u8>();

        builder
            .insert(ResolvedBinding::ObjectToConstruct(make_object_entry(t, 1)), &NoBaseComponent)
            .unwrap();
        let err = builder
            .insert(ResolvedBinding::ObjectToConstruct(make_object_entry(t, 2)), &NoBaseComponent)
            .unwrap_err();

        assert!(matches!(err, NormalizationError::MultipleBindings(_)));
    }
}
