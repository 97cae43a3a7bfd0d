use std::collections::HashMap;
use std::sync::Mutex;

use crate::entry::AnyArc;
use crate::errors::InjectionError;
use crate::type_id::TypeId;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// A caching policy for `ObjectToConstruct` bindings at the injector layer.
/// The normalization core itself is scope-agnostic; scopes govern only how
/// many times a binding's `create` thunk actually runs.
pub trait Scope: Send + Sync {
    fn resolve(
        &self,
        type_id: TypeId,
        construct: &mut dyn FnMut() -> Result<AnyArc, InjectionError>,
    ) -> Result<AnyArc, InjectionError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Runs the thunk on every request. No caching.
#[derive(Debug, Default)]
pub struct Transient;

impl Scope for Transient {
    fn resolve(
        &self,
        _type_id: TypeId,
        construct: &mut dyn FnMut() -> Result<AnyArc, InjectionError>,
    ) -> Result<AnyArc, InjectionError> {
        construct()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// The injector's default scope: constructs a type's instance at most once
/// and returns the same `Arc` on every later request.
#[derive(Debug, Default)]
pub struct Singleton {
    cache: Mutex<HashMap<TypeId, AnyArc>>,
}

impl Scope for Singleton {
    fn resolve(
        &self,
        type_id: TypeId,
        construct: &mut dyn FnMut() -> Result<AnyArc, InjectionError>,
    ) -> Result<AnyArc, InjectionError> {
        if let Some(existing) = self.cache.lock().unwrap().get(&type_id) {
            return Ok(existing.clone());
        }

        let instance = construct()?;

        // Two threads racing here both materialize; the loser's instance is
        // discarded in favor of whichever landed in the cache first. Benign
        // for pure constructors; the injector's concurrency contract for
        // side-effectful ones is deferred, per the core's scope.
        let mut cache = self.cache.lock().unwrap();
        Ok(cache.entry(type_id).or_insert(instance).clone())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
