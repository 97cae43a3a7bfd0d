//! Normalization core for a runtime dependency-injection container.
//!
//! This crate does **not** provide a fluent `bind`/`install`/`replace`
//! builder API, a proc-macro that infers a constructor's dependency
//! signature, or a per-object arena allocator — those are explicitly
//! out-of-scope collaborators (a "surface builder" is expected to compile
//! its registrations down to a [`Vec<StorageEntry>`](entry::StorageEntry)
//! before handing it to [`normalize`]). What lives here is the hard part:
//! flattening a deferred, possibly cyclic graph of lazy sub-component
//! installations and replacements into a single deduplicated, optionally
//! compressed [`BindingTable`](binding_table::BindingTable), and an
//! [`Injector`] that materializes instances from it with at-most-once
//! semantics per type.
//!
//! # Example
//!
//! ```
//! use std::alloc::Layout;
//! use std::sync::Arc;
//!
//! use vessel::entry::{AnyArc, ObjectToConstructEntry, StorageEntry};
//! use vessel::storage::{normalize, NormalizationOptions};
//! use vessel::type_id::TypeId;
//! use vessel::Injector;
//!
//! let greeting = TypeId::of::<String>();
//!
//! let entries = vec![StorageEntry::ObjectToConstruct(ObjectToConstructEntry {
//!     type_id: greeting,
//!     create: Arc::new(|_injector| Ok(Arc::new("hello".to_string()) as AnyArc)),
//!     dependencies: Vec::new(),
//!     layout: Layout::new::<String>(),
//! })];
//!
//! let storage = normalize(entries, NormalizationOptions::default()).unwrap();
//! let injector = Injector::new(storage);
//!
//! assert_eq!(*injector.get::<String>().unwrap(), "hello");
//! ```

pub mod allocator_sizing;
pub mod binding_table;
pub mod compressor;
pub mod entry;
pub mod errors;
pub mod expansion;
mod injector;
pub mod multibinding;
pub mod scopes;
pub mod storage;
pub mod type_id;

pub use errors::{InjectionError, NormalizationError};
pub use injector::Injector;
pub use storage::{normalize, normalize_overlay, NormalizationOptions, NormalizedComponentStorage};
pub use type_id::TypeId;
