use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::instrument;

use crate::binding_table::ResolvedBinding;
use crate::entry::AnyArc;
use crate::errors::{InjectionError, SelfLoopError, UnregisteredTypeError};
use crate::scopes::{Scope, Singleton, Transient};
use crate::storage::NormalizedComponentStorage;
use crate::type_id::{TypeId, TypeInfo};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

thread_local! {
    /// Construction stack for the *current* call into `get`/`get_all`,
    /// re-entered on every nested dependency resolution. Used solely for
    /// self-loop detection and diagnostics; unrelated to normalization's
    /// installation-cycle bookkeeping.
    static CONSTRUCTION_STACK: std::cell::RefCell<Vec<TypeId>> = const { std::cell::RefCell::new(Vec::new()) };
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Runtime object that materializes instances from a normalized component.
/// Optionally overlays a `base` injector, falling back to it for any type
/// not bound locally.
pub struct Injector {
    storage: NormalizedComponentStorage,
    base: Option<Arc<Injector>>,
    transient_types: HashSet<TypeId>,
    singleton: Singleton,
    transient: Transient,
}

impl Injector {
    pub fn new(storage: NormalizedComponentStorage) -> Self {
        Self::with_base(storage, None, HashSet::new())
    }

    pub fn with_base(
        storage: NormalizedComponentStorage,
        base: Option<Arc<Injector>>,
        transient_types: HashSet<TypeId>,
    ) -> Self {
        Self {
            storage,
            base,
            transient_types,
            singleton: Singleton::default(),
            transient: Transient,
        }
    }

    pub fn storage(&self) -> &NormalizedComponentStorage {
        &self.storage
    }

    /// Typed single-value lookup. Interface bindings are looked up by their
    /// `Arc<dyn Trait>` handle type, e.g. `injector.get::<Arc<dyn Logger>>()`,
    /// since `dyn Trait` itself cannot be the payload of a type-erased `Any`.
    pub fn get<T: 'static + Send + Sync>(&self) -> Result<Arc<T>, InjectionError> {
        One::<T>::resolve(self)
    }

    /// Typed multibinding lookup, e.g. `injector.get_all::<Arc<dyn Plugin>>()`.
    pub fn get_all<T: 'static + Send + Sync>(&self) -> Result<Arc<Vec<T>>, InjectionError> {
        All::<T>::resolve(self)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn get_dyn(&self, type_id: TypeId) -> Result<AnyArc, InjectionError> {
        let already_building = CONSTRUCTION_STACK.with(|stack| stack.borrow().contains(&type_id));
        if already_building {
            return Err(self.self_loop_error(type_id));
        }

        CONSTRUCTION_STACK.with(|stack| stack.borrow_mut().push(type_id));
        let result = self.materialize(type_id);
        CONSTRUCTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
        result
    }

    pub fn get_all_dyn(&self, type_id: TypeId) -> Result<AnyArc, InjectionError> {
        let Some(list) = self.storage.multibindings().get(type_id) else {
            if let Some(base) = &self.base {
                return base.get_all_dyn(type_id);
            }
            return Err(self.unregistered(type_id));
        };

        let mut built = Vec::with_capacity(list.len());
        for entry in list.entries() {
            built.push((entry.create)(self)?);
        }

        match list.vector_creator() {
            Some(make_vector) => Ok(make_vector(built)),
            None => Err(self.unregistered(type_id)),
        }
    }

    fn materialize(&self, type_id: TypeId) -> Result<AnyArc, InjectionError> {
        if let Some(binding) = self.storage.binding_table().get(type_id) {
            return self.materialize_binding(type_id, binding);
        }
        if let Some(base) = &self.base {
            return base.get_dyn(type_id);
        }
        Err(self.unregistered(type_id))
    }

    fn materialize_binding(
        &self,
        type_id: TypeId,
        binding: &ResolvedBinding,
    ) -> Result<AnyArc, InjectionError> {
        match binding {
            ResolvedBinding::ConstructedObject(e) => Ok(e.instance.clone()),
            ResolvedBinding::ObjectToConstruct(e) => {
                let create = e.create.clone();
                let mut construct = || (create)(self);

                let scope: &dyn Scope = if self.transient_types.contains(&type_id) {
                    &self.transient
                } else {
                    &self.singleton
                };
                scope.resolve(type_id, &mut construct)
            }
        }
    }

    fn unregistered(&self, type_id: TypeId) -> InjectionError {
        InjectionError::Unregistered(UnregisteredTypeError {
            type_info: TypeInfo {
                id: type_id,
                name: type_id.name(),
            },
        })
    }

    fn self_loop_error(&self, type_id: TypeId) -> InjectionError {
        let stack = CONSTRUCTION_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .map(|id| TypeInfo {
                    id: *id,
                    name: id.name(),
                })
                .chain(std::iter::once(TypeInfo {
                    id: type_id,
                    name: type_id.name(),
                }))
                .collect()
        });
        InjectionError::SelfLoop(SelfLoopError { stack })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Resolve / One / All
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Dispatch target for [`Injector::get`]/[`Injector::get_all`]: maps a
/// marker type to how it pulls its `Output` out of an injector.
pub trait Resolve {
    type Output;
    fn resolve(injector: &Injector) -> Result<Self::Output, InjectionError>;
}

/// Marker for a single-value binding lookup of `T`.
pub struct One<T>(PhantomData<T>);

impl<T: 'static + Send + Sync> Resolve for One<T> {
    type Output = Arc<T>;

    fn resolve(injector: &Injector) -> Result<Arc<T>, InjectionError> {
        let type_id = TypeId::of::<T>();
        let any = injector.get_dyn(type_id)?;
        Ok(downcast_arc::<T>(any))
    }
}

/// Marker for a multibinding lookup of `T`.
pub struct All<T>(PhantomData<T>);

impl<T: 'static + Send + Sync> Resolve for All<T> {
    type Output = Arc<Vec<T>>;

    fn resolve(injector: &Injector) -> Result<Arc<Vec<T>>, InjectionError> {
        let type_id = TypeId::of::<T>();
        let any = injector.get_all_dyn(type_id)?;
        Ok(downcast_arc::<Vec<T>>(any))
    }
}

/// Downcasts an `Arc<dyn Any>` whose concrete type is guaranteed correct by
/// normalization's external type-checking contract (§1): a mismatch here
/// would mean a binding was registered under the wrong `TypeId`, which is
/// an invariant violation the core assumes never happens.
fn downcast_arc<T: 'static + Send + Sync>(any: AnyArc) -> Arc<T> {
    any.downcast::<T>()
        .expect("binding produced a value of the wrong concrete type")
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
