use std::any::Any;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::injector::Injector;
use crate::type_id::TypeId;
use crate::InjectionError;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Type-erased payload handed around after construction.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Constructs an instance given a live injector to resolve dependencies
/// through. Returning `Err` aborts the in-progress `get`.
pub type CreateThunk = Arc<dyn Fn(&Injector) -> Result<AnyArc, InjectionError> + Send + Sync>;

/// Builds the final ordered `Vec` for a multibinding set out of the
/// individually-constructed elements.
pub type VectorCreatorThunk = Arc<dyn Fn(Vec<AnyArc>) -> AnyArc + Send + Sync>;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// LazyComponentArgs
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Type-erased identity + invocation for a lazy sub-component parametrized
/// by arguments. Two entries referring to "the same" parametrized
/// sub-component (same factory, equal arguments) must compare equal and
/// hash equal, even though the concrete argument type is erased here.
pub trait LazyComponentArgs: Send + Sync {
    fn invoke(&self) -> Vec<StorageEntry>;
    fn component_eq(&self, other: &dyn LazyComponentArgs) -> bool;
    fn component_hash(&self, state: &mut dyn Hasher);
    fn as_any(&self) -> &dyn Any;
    /// Human-readable label for diagnostics (cycle traces, error messages).
    fn describe(&self) -> String;
}

/// Generic carrier for a parametrized lazy component: a plain function
/// pointer (so identity includes pointer equality) plus an owned,
/// hashable argument blob.
struct ArgsComponent<A: 'static> {
    factory: fn(&A) -> Vec<StorageEntry>,
    args: A,
    label: &'static str,
}

impl<A> ArgsComponent<A>
where
    A: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn new_arc(
        factory: fn(&A) -> Vec<StorageEntry>,
        args: A,
        label: &'static str,
    ) -> Arc<dyn LazyComponentArgs> {
        Arc::new(Self { factory, args, label })
    }
}

impl<A> LazyComponentArgs for ArgsComponent<A>
where
    A: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn invoke(&self) -> Vec<StorageEntry> {
        (self.factory)(&self.args)
    }

    fn component_eq(&self, other: &dyn LazyComponentArgs) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(o) => self.factory == o.factory && self.args == o.args,
            None => false,
        }
    }

    fn component_hash(&self, state: &mut dyn Hasher) {
        (self.factory as usize).hash(state);
        self.args.hash(state);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        format!("{}(..)", self.label)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// LazyComponentId
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Identity of a lazy sub-component: pointer identity for a no-args
/// component, structural `(fn, args)` identity for a parametrized one.
#[derive(Clone)]
pub enum LazyComponentId {
    NoArgs(fn() -> Vec<StorageEntry>),
    Args(Arc<dyn LazyComponentArgs>),
}

impl LazyComponentId {
    pub fn no_args(factory: fn() -> Vec<StorageEntry>) -> Self {
        Self::NoArgs(factory)
    }

    pub fn with_args<A>(factory: fn(&A) -> Vec<StorageEntry>, args: A, label: &'static str) -> Self
    where
        A: Eq + Hash + Clone + Send + Sync + 'static,
    {
        Self::Args(ArgsComponent::new_arc(factory, args, label))
    }

    pub fn invoke(&self) -> Vec<StorageEntry> {
        match self {
            Self::NoArgs(f) => f(),
            Self::Args(a) => a.invoke(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::NoArgs(f) => format!("component@{:#x}", *f as usize),
            Self::Args(a) => a.describe(),
        }
    }
}

impl PartialEq for LazyComponentId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NoArgs(a), Self::NoArgs(b)) => (*a as usize) == (*b as usize),
            (Self::Args(a), Self::Args(b)) => a.component_eq(b.as_ref()),
            _ => false,
        }
    }
}

impl Eq for LazyComponentId {}

impl Hash for LazyComponentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::NoArgs(f) => {
                0u8.hash(state);
                (*f as usize).hash(state);
            }
            Self::Args(a) => {
                1u8.hash(state);
                a.component_hash(state);
            }
        }
    }
}

impl std::fmt::Debug for LazyComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LazyComponentId({})", self.describe())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// StorageEntry payloads
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone)]
pub struct ConstructedObjectEntry {
    pub type_id: TypeId,
    pub instance: AnyArc,
}

#[derive(Clone)]
pub struct ObjectToConstructEntry {
    pub type_id: TypeId,
    pub create: CreateThunk,
    pub dependencies: Vec<TypeId>,
    pub layout: std::alloc::Layout,
}

#[derive(Clone, Copy)]
pub struct CompressedBindingEntry {
    pub iface: TypeId,
    pub implementation: TypeId,
}

#[derive(Clone)]
pub struct MultibindingEntry {
    pub type_id: TypeId,
    pub create: CreateThunk,
}

#[derive(Clone)]
pub struct MultibindingVectorCreatorEntry {
    pub type_id: TypeId,
    pub make_vector: VectorCreatorThunk,
}

#[derive(Clone)]
pub struct ReplacedLazyComponentEntry {
    pub target: LazyComponentId,
    pub replacement: LazyComponentId,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// StorageEntry
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A single item of the user-authored entry stream. This is the only
/// vocabulary the normalization core understands; everything produced by a
/// surface builder API is compiled down to a (reversed) `Vec<StorageEntry>`.
#[derive(Clone)]
pub enum StorageEntry {
    ConstructedObject(ConstructedObjectEntry),
    ObjectToConstruct(ObjectToConstructEntry),
    CompressedBinding(CompressedBindingEntry),
    Multibinding(MultibindingEntry),
    MultibindingVectorCreator(MultibindingVectorCreatorEntry),
    LazyComponent(LazyComponentId),
    EndMarker(LazyComponentId),
    ReplacedLazyComponent(ReplacedLazyComponentEntry),
}

impl std::fmt::Debug for StorageEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConstructedObject(e) => write!(f, "ConstructedObject({})", e.type_id.name()),
            Self::ObjectToConstruct(e) => write!(f, "ObjectToConstruct({})", e.type_id.name()),
            Self::CompressedBinding(e) => {
                write!(f, "CompressedBinding({} -> {})", e.iface.name(), e.implementation.name())
            }
            Self::Multibinding(e) => write!(f, "Multibinding({})", e.type_id.name()),
            Self::MultibindingVectorCreator(e) => {
                write!(f, "MultibindingVectorCreator({})", e.type_id.name())
            }
            Self::LazyComponent(id) => write!(f, "LazyComponent({})", id.describe()),
            Self::EndMarker(id) => write!(f, "EndMarker({})", id.describe()),
            Self::ReplacedLazyComponent(e) => write!(
                f,
                "ReplacedLazyComponent({} -> {})",
                e.target.describe(),
                e.replacement.describe()
            ),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn comp_a() -> Vec<StorageEntry> {
        Vec::new()
    }

    fn comp_b() -> Vec<StorageEntry> {
        Vec::new()
    }

    #[test]
    fn no_args_identity_is_pointer_based() {
        let a1 = LazyComponentId::no_args(comp_a);
        let a2 = LazyComponentId::no_args(comp_a);
        let b = LazyComponentId::no_args(comp_b);
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    fn make_pool(port: &u16) -> Vec<StorageEntry> {
        let _ = port;
        Vec::new()
    }

    #[test]
    fn args_identity_is_structural() {
        let a = LazyComponentId::with_args(make_pool, 8080u16, "make_pool");
        let b = LazyComponentId::with_args(make_pool, 8080u16, "make_pool");
        let c = LazyComponentId::with_args(make_pool, 9090u16, "make_pool");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(!set.contains(&c));
    }
}
