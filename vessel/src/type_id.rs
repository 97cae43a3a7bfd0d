use std::any::{self, TypeId as StdTypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Process-wide, append-only interning table that hands out stable
/// [`TypeId`]s. Keyed on the underlying Rust type plus an optional
/// annotation, so two bindings for the same Rust type under different
/// named roles (e.g. two `String` values, one `"host"` and one `"port"`)
/// get distinct identities.
struct Registry {
    handles: Mutex<HashMap<(StdTypeId, Option<&'static str>), TypeId>>,
    names: Mutex<HashMap<TypeId, &'static str>>,
    next: AtomicU64,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry {
        handles: Mutex::new(HashMap::new()),
        names: Mutex::new(HashMap::new()),
        next: AtomicU64::new(0),
    })
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Opaque, totally-ordered, hashable identifier for an (optionally
/// annotated) injectable type.
///
/// Backed by a dense `u64` handle rather than `std::any::TypeId` directly so
/// that ordering is stable and under our control (see the registry notes in
/// the normalization design).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u64);

impl TypeId {
    /// Identifier for `T` with no annotation.
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self::annotated::<T>(None)
    }

    /// Identifier for `T` qualified by a static annotation string.
    pub fn annotated<T: 'static + ?Sized>(annotation: Option<&'static str>) -> Self {
        let key = (StdTypeId::of::<T>(), annotation);
        let reg = registry();

        if let Some(id) = reg.handles.lock().unwrap().get(&key) {
            return *id;
        }

        let id = TypeId(reg.next.fetch_add(1, Ordering::Relaxed));
        reg.handles.lock().unwrap().insert(key, id);
        reg.names.lock().unwrap().insert(id, any::type_name::<T>());
        id
    }

    /// Best-effort `mod1::mod2::Typ` name for diagnostics. Unrelated to
    /// equality: two distinct annotations of the same Rust type share a
    /// name but are different `TypeId`s.
    pub fn name(self) -> &'static str {
        registry()
            .names
            .lock()
            .unwrap()
            .get(&self)
            .copied()
            .unwrap_or("<unregistered>")
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A `TypeId` bundled with its diagnostic name, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> Self {
        let id = TypeId::of::<T>();
        Self { id, name: id.name() }
    }

    pub fn annotated<T: 'static + ?Sized>(annotation: Option<&'static str>) -> Self {
        let id = TypeId::annotated::<T>(annotation);
        Self { id, name: id.name() }
    }
}

impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
