//! Injection-time behavior over a fully normalized component: singleton
//! caching, unregistered-type/self-loop errors surfaced through the
//! public API, and base-injector overlay (§5, §8 scenario 6).

use std::alloc::Layout;
use std::collections::HashSet;
use std::sync::Arc;

use vessel::entry::{AnyArc, ConstructedObjectEntry, ObjectToConstructEntry, StorageEntry};
use vessel::storage::{normalize, NormalizationOptions};
use vessel::type_id::TypeId;
use vessel::{Injector, InjectionError};

fn singleton_counter() -> TypeId {
    TypeId::annotated::<u32>(Some("test-injector-counter"))
}

/// A singleton-scoped binding is constructed once; every subsequent `get`
/// returns the same `Arc`.
#[test]
fn singleton_binding_is_constructed_once_across_many_gets() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let calls_for_thunk = calls.clone();

    let entries = vec![StorageEntry::ObjectToConstruct(ObjectToConstructEntry {
        type_id: singleton_counter(),
        create: Arc::new(move |_inj| {
            calls_for_thunk.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Arc::new(1u32) as AnyArc)
        }),
        dependencies: Vec::new(),
        layout: Layout::new::<u32>(),
    })];

    let storage = normalize(entries, NormalizationOptions::default()).unwrap();
    let injector = Injector::new(storage);

    let a = injector.get::<u32>().unwrap();
    let b = injector.get::<u32>().unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

/// Requesting a TypeId with no binding at all, in an empty component,
/// fails with `Unregistered` rather than panicking.
#[test]
fn unregistered_type_in_an_empty_component_errors() {
    let storage = normalize(Vec::new(), NormalizationOptions::default()).unwrap();
    let injector = Injector::new(storage);

    let err = injector.get_dyn(TypeId::of::<u8>()).unwrap_err();
    assert!(matches!(err, InjectionError::Unregistered(_)));
}

/// A binding whose construction depends on itself is a self-loop,
/// distinct from the normalization-time installation-loop error.
#[test]
fn a_binding_depending_on_itself_is_a_self_loop() {
    let t = TypeId::annotated::<u32>(Some("test-injector-self-loop"));
    let entries = vec![StorageEntry::ObjectToConstruct(ObjectToConstructEntry {
        type_id: t,
        create: Arc::new(move |inj| inj.get_dyn(t)),
        dependencies: vec![t],
        layout: Layout::new::<u32>(),
    })];

    let storage = normalize(entries, NormalizationOptions::default()).unwrap();
    let injector = Injector::new(storage);

    let err = injector.get_dyn(t).unwrap_err();
    assert!(matches!(err, InjectionError::SelfLoop(_)));
}

/// A type bound only in a `base` injector resolves through the overlay,
/// and a type bound locally shadows the base rather than erroring.
#[test]
fn overlay_injector_falls_back_to_its_base() {
    let shared = TypeId::annotated::<u32>(Some("test-injector-shared"));
    let overridden = TypeId::annotated::<u32>(Some("test-injector-overridden"));

    let base_entries = vec![
        StorageEntry::ConstructedObject(ConstructedObjectEntry {
            type_id: shared,
            instance: Arc::new(10u32) as AnyArc,
        }),
        StorageEntry::ConstructedObject(ConstructedObjectEntry {
            type_id: overridden,
            instance: Arc::new(10u32) as AnyArc,
        }),
    ];
    let base_storage = normalize(base_entries, NormalizationOptions::default()).unwrap();
    let base_injector = Arc::new(Injector::new(base_storage));

    let local_entries = vec![StorageEntry::ConstructedObject(ConstructedObjectEntry {
        type_id: overridden,
        instance: Arc::new(20u32) as AnyArc,
    })];
    let local_storage = normalize(local_entries, NormalizationOptions::default()).unwrap();
    let injector = Injector::with_base(local_storage, Some(base_injector), HashSet::new());

    let from_base = injector.get_dyn(shared).unwrap();
    assert_eq!(*from_base.downcast::<u32>().unwrap(), 10);

    let local = injector.get_dyn(overridden).unwrap();
    assert_eq!(*local.downcast::<u32>().unwrap(), 20);
}
