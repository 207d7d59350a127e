//! Business-service surface of the Postmesh relay.
//!
//! The relay core treats the per-entity CRUD services as opaque
//! collaborators reachable by name. This crate defines that seam:
//!
//! - [`ServiceKind`] — the closed set of business domains.
//! - [`StoreMethod`] — the operations a store service understands.
//! - [`MethodDirectory`] — the externally supplied method allow-list.
//! - [`EntityService`] — the narrow invocation interface.
//!
//! [`memory::MemoryEntityStore`] is the in-memory reference
//! implementation used by the daemon and the test suites.

pub mod memory;
pub mod service;

pub use service::{
    EntityService, MethodDirectory, ServiceKind, StoreMethod, StoreMethodDirectory,
};
