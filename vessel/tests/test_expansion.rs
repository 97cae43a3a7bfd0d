//! Entry-stream expansion scenarios (§8 of the normalization spec):
//! colliding bindings, idempotent re-installation, installation cycles,
//! and the boundary behaviors around empty/chained components.

use std::alloc::Layout;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use vessel::entry::{AnyArc, ConstructedObjectEntry, LazyComponentId, ObjectToConstructEntry, StorageEntry};
use vessel::storage::{normalize, NormalizationOptions};
use vessel::type_id::TypeId;
use vessel::NormalizationError;

fn bind_const(type_id: TypeId, value: u32) -> StorageEntry {
    StorageEntry::ConstructedObject(ConstructedObjectEntry {
        type_id,
        instance: Arc::new(value) as AnyArc,
    })
}

/// Scenario 1: `Bind(Foo, FooImplA)`, `Bind(Foo, FooImplB)` where the two
/// values differ -> `MultipleBindings(TypeId(Foo))`.
#[test]
fn two_distinct_bindings_for_the_same_type_collide() {
    let foo = TypeId::annotated::<u32>(Some("test-expansion-foo"));

    // Reversed: natural registration order is [bind FooImplA, bind FooImplB].
    let entries = vec![bind_const(foo, 2), bind_const(foo, 1)];

    let err = normalize(entries, NormalizationOptions::default()).unwrap_err();
    assert!(matches!(err, NormalizationError::MultipleBindings(_)));
}

/// Scenario 2: a lazy component `G` binding `Bar -> BarImpl`, installed
/// twice, normalizes to a single `Bar` binding with no error.
#[test]
fn installing_the_same_lazy_component_twice_is_idempotent() {
    fn g() -> Vec<StorageEntry> {
        vec![StorageEntry::ObjectToConstruct(ObjectToConstructEntry {
            type_id: TypeId::annotated::<u32>(Some("test-expansion-bar")),
            create: Arc::new(|_inj| Ok(Arc::new(7u32) as AnyArc)),
            dependencies: Vec::new(),
            layout: Layout::new::<u32>(),
        })]
    }

    let component = LazyComponentId::no_args(g);
    let entries = vec![
        StorageEntry::LazyComponent(component.clone()),
        StorageEntry::LazyComponent(component),
    ];

    let storage = normalize(entries, NormalizationOptions::default()).unwrap();
    assert_eq!(storage.binding_table().len(), 1);
}

/// Scenario 3: `G1` installs `G2`, `G2` installs `G1` -> a
/// `LazyComponentInstallationLoop` naming the cycle.
#[test]
fn mutually_installing_components_form_a_cycle() {
    fn g1() -> Vec<StorageEntry> {
        vec![StorageEntry::LazyComponent(LazyComponentId::no_args(g2))]
    }
    fn g2() -> Vec<StorageEntry> {
        vec![StorageEntry::LazyComponent(LazyComponentId::no_args(g1))]
    }

    let entries = vec![StorageEntry::LazyComponent(LazyComponentId::no_args(g1))];
    let err = normalize(entries, NormalizationOptions::default()).unwrap_err();

    match err {
        NormalizationError::LazyComponentInstallationLoop(e) => {
            assert!(e.path.len() >= 2, "path should include the repeated component: {:?}", e.path);
        }
        other => panic!("expected LazyComponentInstallationLoop, got {other:?}"),
    }
}

/// Boundary: an empty entry stream normalizes to an empty component.
#[test]
fn empty_component_normalizes_to_empty_tables() {
    let storage = normalize(Vec::new(), NormalizationOptions::default()).unwrap();
    assert_eq!(storage.binding_table().len(), 0);
    assert!(!storage.multibindings().type_ids().any(|_| true));
}

/// Boundary: chain `A -> B -> C` where only `A` is installed behaves like
/// installing `C` directly.
#[test]
fn chained_installation_flattens_to_the_leaf_component() {
    fn c() -> Vec<StorageEntry> {
        vec![StorageEntry::ObjectToConstruct(ObjectToConstructEntry {
            type_id: TypeId::annotated::<u32>(Some("test-expansion-leaf")),
            create: Arc::new(|_inj| Ok(Arc::new(42u32) as AnyArc)),
            dependencies: Vec::new(),
            layout: Layout::new::<u32>(),
        })]
    }
    fn b() -> Vec<StorageEntry> {
        vec![StorageEntry::LazyComponent(LazyComponentId::no_args(c))]
    }
    fn a() -> Vec<StorageEntry> {
        vec![StorageEntry::LazyComponent(LazyComponentId::no_args(b))]
    }

    let via_chain = normalize(
        vec![StorageEntry::LazyComponent(LazyComponentId::no_args(a))],
        NormalizationOptions::default(),
    )
    .unwrap();
    let direct = normalize(
        vec![StorageEntry::LazyComponent(LazyComponentId::no_args(c))],
        NormalizationOptions::default(),
    )
    .unwrap();

    assert_eq!(via_chain.binding_table().len(), direct.binding_table().len());
    assert!(via_chain
        .binding_table()
        .contains(TypeId::annotated::<u32>(Some("test-expansion-leaf"))));
}
