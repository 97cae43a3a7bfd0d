use thiserror::Error;

use crate::type_id::TypeInfo;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// NormalizationError
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// First fatal inconsistency encountered while flattening a component's
/// entry stream into a normalized binding table.
#[derive(Error, Debug, Clone)]
pub enum NormalizationError {
    #[error(transparent)]
    MultipleBindings(MultipleBindingsError),
    #[error(transparent)]
    LazyComponentInstallationLoop(LazyComponentInstallationLoopError),
    #[error(transparent)]
    IncompatibleReplacements(IncompatibleReplacementsError),
    #[error(transparent)]
    ReplacementAfterExpansion(ReplacementAfterExpansionError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, Clone)]
pub struct MultipleBindingsError {
    pub type_info: TypeInfo,
}

impl std::fmt::Display for MultipleBindingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Multiple non-equivalent bindings registered for type: {}",
            self.type_info.name
        )
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, Clone)]
pub struct LazyComponentInstallationLoopError {
    /// Component install path from the repeat point back to itself, in
    /// install order (first entry repeats as the last entry).
    pub path: Vec<String>,
}

impl std::fmt::Display for LazyComponentInstallationLoopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Lazy component installation loop detected:")?;
        for (i, step) in self.path.iter().enumerate() {
            writeln!(f, "  {i}: {step}")?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, Clone)]
pub struct IncompatibleReplacementsError {
    pub target: String,
    pub replacement_a: String,
    pub replacement_b: String,
}

impl std::fmt::Display for IncompatibleReplacementsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Incompatible replacements for {}: {} vs {}",
            self.target, self.replacement_a, self.replacement_b
        )
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, Clone)]
pub struct ReplacementAfterExpansionError {
    pub target: String,
    pub replacement: String,
}

impl std::fmt::Display for ReplacementAfterExpansionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Replacement {} for {} declared after the target was already fully expanded",
            self.replacement, self.target
        )
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// InjectionError
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Errors raised by the injector at lookup/construction time, as opposed
/// to normalization time. `SelfLoop` can only be detected here: a binding's
/// dependency closure reaching itself is only observable while walking the
/// live construction stack.
#[derive(Error, Debug, Clone)]
pub enum InjectionError {
    #[error(transparent)]
    Unregistered(UnregisteredTypeError),
    #[error(transparent)]
    SelfLoop(SelfLoopError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, Clone)]
pub struct UnregisteredTypeError {
    pub type_info: TypeInfo,
}

impl std::fmt::Display for UnregisteredTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "No binding registered for type: {}", self.type_info.name)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, Clone)]
pub struct SelfLoopError {
    /// Construction stack at the point the cycle closed, root first.
    pub stack: Vec<TypeInfo>,
}

impl std::fmt::Display for SelfLoopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dependency cycle detected while constructing:")?;
        for (i, t) in self.stack.iter().enumerate() {
            writeln!(f, "  {i}: {}", t.name)?;
        }
        Ok(())
    }
}
