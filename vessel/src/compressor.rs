use std::alloc::Layout;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::binding_table::{BindingTableBuilder, ResolvedBinding};
use crate::entry::{CompressedBindingEntry, ConstructedObjectEntry, CreateThunk, ObjectToConstructEntry};
use crate::injector::Injector;
use crate::type_id::TypeId;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Enough to reverse one `I ↔ C` fold: the synthesized forwarder binding
/// that `I` had before compression, and `C`'s own binding before it was
/// deleted from the table.
#[derive(Clone)]
pub struct CompressionUndoInfo {
    pub iface: TypeId,
    pub implementation: TypeId,
    pub original_iface_binding: ResolvedBinding,
    pub original_impl_binding: ResolvedBinding,
}

pub type CompressionUndoInfoMap = HashMap<TypeId, CompressionUndoInfo>;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Applies the `I→C` + `C→f(deps)` ⟹ `I→f(deps)` rewrite to every surviving
/// `CompressedBinding` candidate, returning the rewritten table and (when
/// `undoable`) the records needed to reverse each fold later.
pub fn compress(
    mut table: BindingTableBuilder,
    candidates: &[CompressedBindingEntry],
    exposed_types: &HashSet<TypeId>,
    multibinding_types: &HashSet<TypeId>,
    undoable: bool,
) -> (BindingTableBuilder, CompressionUndoInfoMap) {
    let mut undo = CompressionUndoInfoMap::new();

    for candidate in candidates {
        if is_vetoed(candidate, candidates, exposed_types, multibinding_types, &table) {
            continue;
        }

        let Some(impl_binding) = table.get(candidate.implementation).cloned() else {
            // C was never bound (e.g. the CompressedBinding hint outlived
            // its implementation); nothing to fuse.
            continue;
        };

        let fused = retype(&impl_binding, candidate.iface);
        table.remove(candidate.implementation);

        if undoable {
            undo.insert(
                candidate.iface,
                CompressionUndoInfo {
                    iface: candidate.iface,
                    implementation: candidate.implementation,
                    original_iface_binding: make_forwarder(candidate.iface, candidate.implementation),
                    original_impl_binding: impl_binding,
                },
            );
        }

        table.overwrite(fused);
    }

    (table, undo)
}

/// Reverses one fold: restores `C`'s binding and rewrites `I` back to a
/// forwarder, as if compression had never run for that pair.
pub fn undo_compression(table: &mut BindingTableBuilder, info: &CompressionUndoInfo) {
    table.overwrite(info.original_impl_binding.clone());
    table.overwrite(info.original_iface_binding.clone());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn is_vetoed(
    candidate: &CompressedBindingEntry,
    all_candidates: &[CompressedBindingEntry],
    exposed_types: &HashSet<TypeId>,
    multibinding_types: &HashSet<TypeId>,
    table: &BindingTableBuilder,
) -> bool {
    let c = candidate.implementation;

    if exposed_types.contains(&c) {
        return true;
    }

    if all_candidates
        .iter()
        .any(|other| other.implementation == c && other.iface != candidate.iface)
    {
        return true;
    }

    if multibinding_types.contains(&c) {
        return true;
    }

    // `I`'s own (pre-compression) forwarder binding naturally depends on
    // `C` — that is what makes it a forwarder — so it must not veto its
    // own fusion. Only a binding keyed at some *other* type referencing
    // `C` counts as "another alias" per §4.5 rule 4.
    table.iter().any(|(type_id, binding)| {
        *type_id != c
            && *type_id != candidate.iface
            && matches!(
                binding,
                ResolvedBinding::ObjectToConstruct(e) if e.dependencies.contains(&c)
            )
    })
}

fn retype(binding: &ResolvedBinding, new_type: TypeId) -> ResolvedBinding {
    match binding {
        ResolvedBinding::ConstructedObject(e) => ResolvedBinding::ConstructedObject(ConstructedObjectEntry {
            type_id: new_type,
            instance: e.instance.clone(),
        }),
        ResolvedBinding::ObjectToConstruct(e) => {
            ResolvedBinding::ObjectToConstruct(ObjectToConstructEntry {
                type_id: new_type,
                create: e.create.clone(),
                dependencies: e.dependencies.clone(),
                layout: e.layout,
            })
        }
    }
}

fn make_forwarder(iface: TypeId, implementation: TypeId) -> ResolvedBinding {
    let create: CreateThunk = Arc::new(move |injector: &Injector| injector.get_dyn(implementation));
    ResolvedBinding::ObjectToConstruct(ObjectToConstructEntry {
        type_id: iface,
        create,
        dependencies: vec![implementation],
        layout: Layout::new::<()>(),
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
