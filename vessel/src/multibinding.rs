use std::collections::HashMap;

use multimap::MultiMap;

use crate::entry::{MultibindingEntry, VectorCreatorThunk};
use crate::type_id::TypeId;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Per-TypeId accumulation of multibindings: an insertion-ordered,
/// duplicate-preserving list plus the thunk that materializes it into the
/// final `Vec` handed back to an injector caller.
#[derive(Clone)]
pub struct MultibindingList<'a> {
    entries: &'a [MultibindingEntry],
    vector_creator: Option<&'a VectorCreatorThunk>,
}

impl<'a> MultibindingList<'a> {
    pub fn entries(&self) -> &'a [MultibindingEntry] {
        self.entries
    }

    pub fn vector_creator(&self) -> Option<&'a VectorCreatorThunk> {
        self.vector_creator
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Mapping TypeId → ordered multibinding list, the output of folding
/// `multibindings_vector` at the end of expansion (§4.4). Backed by the
/// same `MultiMap` the teacher's main binding table uses for its
/// (non-deduplicated) interface → bindings relation, here put to the use
/// it actually fits: multibindings are the one place this crate keeps more
/// than one binding per `TypeId` on purpose.
#[derive(Clone, Default)]
pub struct MultibindingSet {
    entries: MultiMap<TypeId, MultibindingEntry>,
    vector_creators: HashMap<TypeId, VectorCreatorThunk>,
}

impl MultibindingSet {
    pub fn build(
        multibindings: Vec<MultibindingEntry>,
        vector_creators: HashMap<TypeId, VectorCreatorThunk>,
    ) -> Self {
        let mut entries = MultiMap::new();
        for entry in multibindings {
            entries.insert(entry.type_id, entry);
        }

        Self { entries, vector_creators }
    }

    pub fn get(&self, type_id: TypeId) -> Option<MultibindingList<'_>> {
        if !self.entries.contains_key(&type_id) && !self.vector_creators.contains_key(&type_id) {
            return None;
        }

        Some(MultibindingList {
            entries: self.entries.get_vec(&type_id).map_or(&[], Vec::as_slice),
            vector_creator: self.vector_creators.get(&type_id),
        })
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.entries.contains_key(&type_id) || self.vector_creators.contains_key(&type_id)
    }

    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.entries.keys().copied()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AnyArc;
    use std::sync::Arc;

    fn multibinding(type_id: TypeId, value: u32) -> MultibindingEntry {
        MultibindingEntry {
            type_id,
            create: Arc::new(move |_inj| Ok(Arc::new(value) as AnyArc)),
        }
    }

    #[test]
    fn preserves_insertion_order_and_duplicates() {
        let t = TypeId::of::<String>();
        let entries = vec![multibinding(t, 1), multibinding(t, 1), multibinding(t, 2)];
        let set = MultibindingSet::build(entries, HashMap::new());

        assert_eq!(set.get(t).unwrap().len(), 3);
    }

    #[test]
    fn last_vector_creator_wins() {
        let t = TypeId::of::<String>();
        let mut creators = HashMap::new();
        creators.insert(t, Arc::new(|v: Vec<AnyArc>| Arc::new(v.len()) as AnyArc) as VectorCreatorThunk);

        let set = MultibindingSet::build(Vec::new(), creators);
        assert!(set.get(t).unwrap().vector_creator().is_some());
    }

    #[test]
    fn unknown_type_has_no_entry() {
        let set = MultibindingSet::build(Vec::new(), HashMap::new());
        assert!(!set.contains(TypeId::of::<u8>()));
    }
}
