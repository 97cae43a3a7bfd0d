//! End-to-end walkthrough of `vessel`'s normalization pipeline: entry
//! stream -> expansion -> compression -> injector.
//!
//! This talks to the core directly at the `StorageEntry` level rather than
//! through a fluent `bind`/`install`/`replace` builder — that surface
//! layer is an explicit non-goal of the `vessel` crate (see its crate
//! docs), so a caller is expected to assemble the entry stream itself, the
//! same way a compiled-down builder call would.

use std::alloc::Layout;
use std::collections::HashSet;
use std::sync::Arc;

use vessel::entry::{
    AnyArc, CompressedBindingEntry, ConstructedObjectEntry, LazyComponentId, MultibindingEntry,
    MultibindingVectorCreatorEntry, ObjectToConstructEntry, ReplacedLazyComponentEntry, StorageEntry,
};
use vessel::storage::{normalize, NormalizationOptions};
use vessel::type_id::TypeId;
use vessel::Injector;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone)]
struct AppConfig {
    name: String,
}

#[derive(Debug)]
struct SystemClock;

impl SystemClock {
    fn now(&self) -> &'static str {
        "2026-07-28T00:00:00Z"
    }
}

#[derive(Debug)]
struct FixedClock(&'static str);

impl FixedClock {
    fn now(&self) -> &'static str {
        self.0
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// TypeIds
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn config_type() -> TypeId {
    TypeId::of::<AppConfig>()
}

fn greeting_type() -> TypeId {
    TypeId::annotated::<String>(Some("greeting"))
}

/// The "interface" side of the clock binding. Kept as its own annotated
/// identity (rather than a `dyn Trait` handle) so that, once `C`'s
/// create thunk is compressed into this slot, the stored payload's
/// concrete Rust type still matches what callers downcast to — the core
/// treats TypeId purely as an opaque label (§9) and leaves the question
/// of what a given TypeId's payload concretely downcasts to entirely to
/// the surface layer.
fn clock_iface_type() -> TypeId {
    TypeId::annotated::<SystemClock>(Some("clock-iface"))
}

fn clock_impl_type() -> TypeId {
    TypeId::of::<SystemClock>()
}

fn plugin_type() -> TypeId {
    TypeId::annotated::<String>(Some("plugin"))
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Lazy sub-components
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A lazy sub-component ("module") contributing two plugin multibindings.
/// Installed via `StorageEntry::LazyComponent`: the factory runs once no
/// matter how many call sites install it (§8 scenario 2).
fn plugins_module() -> Vec<StorageEntry> {
    vec![
        StorageEntry::Multibinding(MultibindingEntry {
            type_id: plugin_type(),
            create: Arc::new(|_inj| Ok(Arc::new("audit-log".to_string()) as AnyArc)),
        }),
        StorageEntry::Multibinding(MultibindingEntry {
            type_id: plugin_type(),
            create: Arc::new(|_inj| Ok(Arc::new("metrics".to_string()) as AnyArc)),
        }),
        StorageEntry::MultibindingVectorCreator(MultibindingVectorCreatorEntry {
            type_id: plugin_type(),
            make_vector: Arc::new(|items: Vec<AnyArc>| {
                let strings: Vec<String> = items
                    .into_iter()
                    .map(|item| (*item.downcast::<String>().expect("plugin entries are Strings")).clone())
                    .collect();
                Arc::new(strings) as AnyArc
            }),
        }),
    ]
}

/// Production clock sub-component: binds the concrete `SystemClock`, a
/// forwarder binding for its interface slot, and the hint that lets the
/// compressor fuse the two (§4.5).
fn system_clock_module() -> Vec<StorageEntry> {
    vec![
        StorageEntry::ObjectToConstruct(ObjectToConstructEntry {
            type_id: clock_impl_type(),
            create: Arc::new(|_inj| Ok(Arc::new(SystemClock) as AnyArc)),
            dependencies: Vec::new(),
            layout: Layout::new::<SystemClock>(),
        }),
        StorageEntry::ObjectToConstruct(ObjectToConstructEntry {
            type_id: clock_iface_type(),
            create: Arc::new(|inj| inj.get_dyn(clock_impl_type())),
            dependencies: vec![clock_impl_type()],
            layout: Layout::new::<()>(),
        }),
        StorageEntry::CompressedBinding(CompressedBindingEntry {
            iface: clock_iface_type(),
            implementation: clock_impl_type(),
        }),
    ]
}

/// Test double for [`system_clock_module`], swapped in via the
/// replacement protocol in [`build_with_fixed_clock`].
fn fixed_clock_module() -> Vec<StorageEntry> {
    vec![StorageEntry::ObjectToConstruct(ObjectToConstructEntry {
        type_id: clock_iface_type(),
        create: Arc::new(|_inj| Ok(Arc::new(FixedClock("1999-12-31T23:59:59Z")) as AnyArc)),
        dependencies: Vec::new(),
        layout: Layout::new::<FixedClock>(),
    })]
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Component assembly
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn build_production() -> Injector {
    let entries = vec![
        StorageEntry::ConstructedObject(ConstructedObjectEntry {
            type_id: config_type(),
            instance: Arc::new(AppConfig { name: "vessel".to_string() }) as AnyArc,
        }),
        StorageEntry::ObjectToConstruct(ObjectToConstructEntry {
            type_id: greeting_type(),
            create: Arc::new(|inj| {
                let config = inj.get::<AppConfig>()?;
                Ok(Arc::new(format!("Hello, {}!", config.name)) as AnyArc)
            }),
            dependencies: vec![config_type()],
            layout: Layout::new::<String>(),
        }),
        StorageEntry::LazyComponent(LazyComponentId::no_args(plugins_module)),
        StorageEntry::LazyComponent(LazyComponentId::no_args(system_clock_module)),
    ];

    let mut exposed = HashSet::new();
    exposed.insert(clock_iface_type());

    // The core drains its input stack back-to-front (§6), so the natural
    // registration order above has to be reversed before normalizing —
    // exactly what a surface builder's `.build()` would do once, here done
    // inline since this crate has no such builder.
    let storage = normalize(
        entries.into_iter().rev().collect(),
        NormalizationOptions {
            exposed_types: exposed,
            undoable: false,
            base: None,
        },
    )
    .expect("the production component is well-formed");

    Injector::new(storage)
}

/// Same graph, but `system_clock_module` is declared replaced before it
/// is ever installed, per §4.2's replacement protocol.
fn build_with_fixed_clock() -> Injector {
    let target = LazyComponentId::no_args(system_clock_module);
    let replacement = LazyComponentId::no_args(fixed_clock_module);

    let entries = vec![
        StorageEntry::ConstructedObject(ConstructedObjectEntry {
            type_id: config_type(),
            instance: Arc::new(AppConfig { name: "vessel-test".to_string() }) as AnyArc,
        }),
        StorageEntry::ReplacedLazyComponent(ReplacedLazyComponentEntry { target, replacement }),
        StorageEntry::LazyComponent(LazyComponentId::no_args(system_clock_module)),
    ];

    // The replacement must precede the target's installation once
    // reversed back into processing order — see `build_production`.
    let storage = normalize(entries.into_iter().rev().collect(), NormalizationOptions::default())
        .expect("the test component is well-formed");

    Injector::new(storage)
}

fn main() {
    let prod = build_production();

    let greeting = prod.get_dyn(greeting_type()).expect("greeting is bound");
    println!("{}", greeting.downcast::<String>().unwrap());

    let clock = prod.get_dyn(clock_iface_type()).expect("clock is bound");
    let clock = clock.downcast::<SystemClock>().expect("compression kept SystemClock's payload");
    println!("system clock reports: {}", clock.now());

    let plugins = prod.get_all_dyn(plugin_type()).expect("plugins are bound");
    let plugins = plugins.downcast::<Vec<String>>().unwrap();
    println!("loaded plugins: {plugins:?}");

    let test = build_with_fixed_clock();
    let fixed = test.get_dyn(clock_iface_type()).expect("the replacement clock is bound");
    let fixed = fixed.downcast::<FixedClock>().expect("replacement swapped in FixedClock's payload");
    println!("replaced clock reports: {}", fixed.now());
}
