use std::collections::HashSet;

use tracing::{instrument, trace};

use crate::allocator_sizing::FixedSizeAllocatorSizing;
use crate::binding_table::{BaseComponent, BindingTable, NoBaseComponent, ResolvedBinding};
use crate::compressor::{self, CompressionUndoInfoMap};
use crate::entry::StorageEntry;
use crate::errors::NormalizationError;
use crate::expansion;
use crate::multibinding::MultibindingSet;
use crate::type_id::TypeId;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// The enumerated parameters of one normalization call (§6 "Parameters").
#[derive(Default)]
pub struct NormalizationOptions<'a> {
    /// Roots the caller declares; inhibits their compression (§4.5).
    pub exposed_types: HashSet<TypeId>,
    /// When set, the compressor records [`CompressionUndoInfo`](crate::compressor::CompressionUndoInfo)
    /// for every fold it applies.
    pub undoable: bool,
    /// A previously-normalized component this one is overlaid on top of.
    /// Only consulted through [`BaseComponent::lookup`]; use
    /// [`normalize_overlay`] instead of this field to get undo-aware
    /// overlaying.
    pub base: Option<&'a dyn BaseComponent>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Immutable output of normalization (§4.6): the deduplicated binding
/// table, the accumulated multibindings, the injector's allocator sizing
/// contract, and — in undoable mode — the records needed to reverse any
/// compression fold later.
#[derive(Clone)]
pub struct NormalizedComponentStorage {
    pub(crate) binding_table: BindingTable,
    pub(crate) multibindings: MultibindingSet,
    pub(crate) allocator_sizing: FixedSizeAllocatorSizing,
    pub(crate) undo_info: Option<CompressionUndoInfoMap>,
}

impl NormalizedComponentStorage {
    pub fn binding_table(&self) -> &BindingTable {
        &self.binding_table
    }

    pub fn multibindings(&self) -> &MultibindingSet {
        &self.multibindings
    }

    pub fn allocator_sizing(&self) -> FixedSizeAllocatorSizing {
        self.allocator_sizing
    }

    pub fn undo_info(&self) -> Option<&CompressionUndoInfoMap> {
        self.undo_info.as_ref()
    }
}

impl BaseComponent for NormalizedComponentStorage {
    fn lookup(&self, type_id: TypeId) -> Option<ResolvedBinding> {
        self.binding_table.lookup(type_id)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Runs the full pipeline from §2's data flow over a fresh entry stream:
/// expansion (§4.2), binding-table building (§4.3), multibinding
/// accumulation (§4.4), and compression (§4.5).
#[instrument(level = "debug", skip(entries, options))]
pub fn normalize(
    entries: Vec<StorageEntry>,
    options: NormalizationOptions<'_>,
) -> Result<NormalizedComponentStorage, NormalizationError> {
    let base: &dyn BaseComponent = options.base.unwrap_or(&NoBaseComponent);
    let output = expansion::expand(entries, base)?;

    let table = finish_component(
        output.binding_table,
        &output.compressed,
        output.multibindings,
        output.vector_creators,
        &options.exposed_types,
        options.undoable,
    );

    trace!(
        bindings = table.binding_table.len(),
        "normalization complete"
    );
    Ok(table)
}

/// Normalizes `entries` as an overlay on top of an already-normalized
/// `base` component, per §4.5's undoability rationale: a concrete type `C`
/// the base folded away during compression may be depended on or exposed
/// by the overlay, in which case the fold is reversed before the overlay's
/// own bindings are merged in.
#[instrument(level = "debug", skip(base, entries, options))]
pub fn normalize_overlay(
    base: &NormalizedComponentStorage,
    entries: Vec<StorageEntry>,
    options: NormalizationOptions<'_>,
) -> Result<NormalizedComponentStorage, NormalizationError> {
    let output = expansion::expand(entries, &base.binding_table)?;

    let mut referenced: HashSet<TypeId> = options.exposed_types.clone();
    for (_, binding) in output.binding_table.iter() {
        if let ResolvedBinding::ObjectToConstruct(e) = binding {
            referenced.extend(e.dependencies.iter().copied());
        }
    }

    let mut restored = base.binding_table.clone().into_builder();
    if let Some(undo_map) = &base.undo_info {
        for type_id in &referenced {
            if base.binding_table.contains(*type_id) {
                continue;
            }
            if let Some(info) = undo_map.values().find(|i| i.implementation == *type_id) {
                trace!(
                    iface = info.iface.name(),
                    implementation = info.implementation.name(),
                    "undoing compression for overlay dependency"
                );
                compressor::undo_compression(&mut restored, info);
            }
        }
    }

    // The overlay's own freshly-expanded bindings were already checked for
    // conflicts against `base` by `expand` above; merging them here can
    // only conflict with types the undo step just restored.
    for (_, binding) in output.binding_table.iter() {
        restored.insert(binding.clone(), &NoBaseComponent)?;
    }

    let table = finish_component(
        restored,
        &output.compressed,
        output.multibindings,
        output.vector_creators,
        &options.exposed_types,
        options.undoable,
    );
    Ok(table)
}

fn finish_component(
    table: crate::binding_table::BindingTableBuilder,
    compressed: &[crate::entry::CompressedBindingEntry],
    multibindings: Vec<crate::entry::MultibindingEntry>,
    vector_creators: std::collections::HashMap<TypeId, crate::entry::VectorCreatorThunk>,
    exposed_types: &HashSet<TypeId>,
    undoable: bool,
) -> NormalizedComponentStorage {
    let multibinding_types: HashSet<TypeId> = multibindings.iter().map(|m| m.type_id).collect();

    let (table, undo) = compressor::compress(table, compressed, exposed_types, &multibinding_types, undoable);
    let table = table.finish();

    let mut allocator_sizing = FixedSizeAllocatorSizing::new();
    for (_, binding) in table.iter() {
        if let ResolvedBinding::ObjectToConstruct(e) = binding {
            allocator_sizing.add(e.layout);
        }
    }

    NormalizedComponentStorage {
        binding_table: table,
        multibindings: MultibindingSet::build(multibindings, vector_creators),
        allocator_sizing,
        undo_info: if undoable { Some(undo) } else { None },
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AnyArc, ConstructedObjectEntry, ObjectToConstructEntry};
    use std::alloc::Layout;
    use std::sync::Arc;

    #[test]
    fn empty_component_normalizes_to_empty_storage() {
        let storage = normalize(Vec::new(), NormalizationOptions::default()).unwrap();
        assert_eq!(storage.binding_table().len(), 0);
        assert_eq!(storage.allocator_sizing().total_size(), 0);
    }

    #[test]
    fn compression_applied_then_undone_by_overlay() {
        let iface = TypeId::annotated::<dyn std::fmt::Debug>(Some("storage-test-I"));
        let concrete = TypeId::annotated::<u32>(Some("storage-test-C"));
        let dep = TypeId::annotated::<u64>(Some("storage-test-D"));

        let entries = vec![
            StorageEntry::ObjectToConstruct(ObjectToConstructEntry {
                type_id: dep,
                create: Arc::new(|_inj| Ok(Arc::new(7u64) as AnyArc)),
                dependencies: Vec::new(),
                layout: Layout::new::<u64>(),
            }),
            StorageEntry::ObjectToConstruct(ObjectToConstructEntry {
                type_id: concrete,
                create: Arc::new(|_inj| Ok(Arc::new(1u32) as AnyArc)),
                dependencies: vec![dep],
                layout: Layout::new::<u32>(),
            }),
            StorageEntry::CompressedBinding(crate::entry::CompressedBindingEntry {
                iface,
                implementation: concrete,
            }),
        ];

        let mut exposed = HashSet::new();
        exposed.insert(iface);

        let base = normalize(
            entries,
            NormalizationOptions {
                exposed_types: exposed,
                undoable: true,
                base: None,
            },
        )
        .unwrap();

        assert!(!base.binding_table().contains(concrete));
        assert!(base.binding_table().contains(iface));

        // Overlay exposes `concrete` directly, which must force the fold
        // back open.
        let mut overlay_exposed = HashSet::new();
        overlay_exposed.insert(concrete);

        let overlaid = normalize_overlay(
            &base,
            vec![StorageEntry::ConstructedObject(ConstructedObjectEntry {
                type_id: TypeId::annotated::<String>(Some("storage-test-unused")),
                instance: Arc::new("unused".to_string()) as AnyArc,
            })],
            NormalizationOptions {
                exposed_types: overlay_exposed,
                undoable: false,
                base: None,
            },
        )
        .unwrap();

        assert!(overlaid.binding_table().contains(concrete));
        assert!(overlaid.binding_table().contains(iface));
    }
}
