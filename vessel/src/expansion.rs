use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::binding_table::{BaseComponent, BindingTableBuilder, ResolvedBinding};
use crate::entry::{
    CompressedBindingEntry, LazyComponentId, MultibindingEntry, StorageEntry, VectorCreatorThunk,
};
use crate::errors::{
    IncompatibleReplacementsError, LazyComponentInstallationLoopError, NormalizationError,
    ReplacementAfterExpansionError,
};
use crate::type_id::TypeId;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Everything produced by draining a component's entry stream, before the
/// multibinding fold (§4.4) and the compression pass (§4.5) run over it.
pub struct ExpansionOutput {
    pub binding_table: BindingTableBuilder,
    pub compressed: Vec<CompressedBindingEntry>,
    pub multibindings: Vec<MultibindingEntry>,
    pub vector_creators: HashMap<TypeId, VectorCreatorThunk>,
}

/// Drains `entries` (already in the reversed, LIFO-ready order the surface
/// builder is required to produce) against an optional base component.
///
/// Fails fast on the first fatal inconsistency, mirroring the "abort, don't
/// partially succeed" propagation policy of the core.
pub fn expand(
    entries: Vec<StorageEntry>,
    base: &dyn BaseComponent,
) -> Result<ExpansionOutput, NormalizationError> {
    let mut engine = ExpansionEngine::new(entries, base);
    engine.run()?;
    Ok(engine.into_output())
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

struct ExpansionEngine<'a> {
    to_process: Vec<StorageEntry>,
    fully_expanded: HashSet<LazyComponentId>,
    in_progress: HashSet<LazyComponentId>,
    replacements: HashMap<LazyComponentId, LazyComponentId>,
    /// Nesting order of components currently being expanded via
    /// [`Self::begin_expansion`]; used only to render a cycle's path.
    install_stack: Vec<LazyComponentId>,
    binding_table: BindingTableBuilder,
    compressed: Vec<CompressedBindingEntry>,
    multibindings: Vec<MultibindingEntry>,
    vector_creators: HashMap<TypeId, VectorCreatorThunk>,
    base: &'a dyn BaseComponent,
}

impl<'a> ExpansionEngine<'a> {
    fn new(entries: Vec<StorageEntry>, base: &'a dyn BaseComponent) -> Self {
        Self {
            to_process: entries,
            fully_expanded: HashSet::new(),
            in_progress: HashSet::new(),
            replacements: HashMap::new(),
            install_stack: Vec::new(),
            binding_table: BindingTableBuilder::new(),
            compressed: Vec::new(),
            multibindings: Vec::new(),
            vector_creators: HashMap::new(),
            base,
        }
    }

    fn into_output(self) -> ExpansionOutput {
        ExpansionOutput {
            binding_table: self.binding_table,
            compressed: self.compressed,
            multibindings: self.multibindings,
            vector_creators: self.vector_creators,
        }
    }

    fn run(&mut self) -> Result<(), NormalizationError> {
        while let Some(entry) = self.to_process.pop() {
            self.step(entry)?;
        }
        Ok(())
    }

    fn step(&mut self, entry: StorageEntry) -> Result<(), NormalizationError> {
        match entry {
            StorageEntry::ConstructedObject(e) => {
                self.binding_table
                    .insert(ResolvedBinding::ConstructedObject(e), self.base)
            }
            StorageEntry::ObjectToConstruct(e) => {
                self.binding_table
                    .insert(ResolvedBinding::ObjectToConstruct(e), self.base)
            }
            StorageEntry::CompressedBinding(e) => {
                self.compressed.push(e);
                Ok(())
            }
            StorageEntry::Multibinding(e) => {
                self.multibindings.push(e);
                Ok(())
            }
            StorageEntry::MultibindingVectorCreator(e) => {
                self.vector_creators.insert(e.type_id, e.make_vector);
                Ok(())
            }
            StorageEntry::LazyComponent(id) => self.process_lazy_component(id),
            StorageEntry::EndMarker(id) => {
                trace!(component = %id.describe(), "lazy component fully expanded");
                self.in_progress.remove(&id);
                self.fully_expanded.insert(id.clone());
                if self.install_stack.last() == Some(&id) {
                    self.install_stack.pop();
                }
                Ok(())
            }
            StorageEntry::ReplacedLazyComponent(e) => self.process_replacement(e.target, e.replacement),
        }
    }

    fn process_replacement(
        &mut self,
        target: LazyComponentId,
        replacement: LazyComponentId,
    ) -> Result<(), NormalizationError> {
        if let Some(existing) = self.replacements.get(&target) {
            if existing == &replacement {
                return Ok(());
            }
            return Err(NormalizationError::IncompatibleReplacements(
                IncompatibleReplacementsError {
                    target: target.describe(),
                    replacement_a: existing.describe(),
                    replacement_b: replacement.describe(),
                },
            ));
        }

        if self.fully_expanded.contains(&target) {
            return Err(NormalizationError::ReplacementAfterExpansion(
                ReplacementAfterExpansionError {
                    target: target.describe(),
                    replacement: replacement.describe(),
                },
            ));
        }

        self.replacements.insert(target, replacement);
        Ok(())
    }

    fn process_lazy_component(&mut self, id: LazyComponentId) -> Result<(), NormalizationError> {
        if self.fully_expanded.contains(&id) {
            return Ok(());
        }

        // Non-destructive lookup: a target may be installed more than once
        // (idempotence, §8 scenario 2) and each occurrence must still route
        // through the same replacement.
        if let Some(first_hop) = self.replacements.get(&id).cloned() {
            let resolved = self.resolve_replacement_chain(id.clone(), first_hop)?;

            // The replacement may already have been expanded via a different
            // target routed to it earlier; its factory must not run twice.
            if self.fully_expanded.contains(&resolved) {
                self.to_process.push(StorageEntry::EndMarker(id));
                return Ok(());
            }

            if self.in_progress.contains(&resolved) {
                return Err(self.cycle_error(resolved));
            }
            // The target never runs its own factory; it completes as soon
            // as the replacement it routed to completes.
            self.in_progress.insert(id.clone());
            self.to_process.push(StorageEntry::EndMarker(id));
            self.begin_expansion(resolved);
            return Ok(());
        }

        if self.in_progress.contains(&id) {
            return Err(self.cycle_error(id));
        }

        self.begin_expansion(id);
        Ok(())
    }

    fn begin_expansion(&mut self, id: LazyComponentId) {
        trace!(component = %id.describe(), "expanding lazy component");
        self.in_progress.insert(id.clone());
        self.install_stack.push(id.clone());
        self.to_process.push(StorageEntry::EndMarker(id.clone()));

        let produced = id.invoke();
        for entry in produced.into_iter().rev() {
            self.to_process.push(entry);
        }
    }

    /// Follows a chain of replacements (A→B, B→C, ...) to its fixed point,
    /// erroring if it cycles back on itself.
    fn resolve_replacement_chain(
        &self,
        target: LazyComponentId,
        first_hop: LazyComponentId,
    ) -> Result<LazyComponentId, NormalizationError> {
        let mut visited = vec![target];
        let mut current = first_hop;

        loop {
            if visited.contains(&current) {
                let mut path: Vec<String> = visited.iter().map(LazyComponentId::describe).collect();
                path.push(current.describe());
                return Err(NormalizationError::LazyComponentInstallationLoop(
                    LazyComponentInstallationLoopError { path },
                ));
            }
            visited.push(current.clone());

            match self.replacements.get(&current) {
                Some(next) => current = next.clone(),
                None => return Ok(current),
            }
        }
    }

    fn cycle_error(&self, id: LazyComponentId) -> NormalizationError {
        let pos = self
            .install_stack
            .iter()
            .position(|c| c == &id)
            .unwrap_or(0);
        let mut path: Vec<String> = self.install_stack[pos..]
            .iter()
            .map(LazyComponentId::describe)
            .collect();
        path.push(id.describe());
        NormalizationError::LazyComponentInstallationLoop(LazyComponentInstallationLoopError { path })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
