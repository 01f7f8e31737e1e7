//! Boundary to the host application's object model.
//!
//! Handles are owned by the host and may be destroyed at any time without
//! notification; every consumer checks [`EntityHost::is_live`] lazily.

mod memory;

use std::fmt::Debug;

pub use memory::{EntityRef, MemoryHost};

use crate::identifier::DurableId;

/// Which kind of surface may track an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityCategory {
    /// File-backed project asset
    Asset,
    /// Live entity inside an open document or template
    ContainerEntity,
    /// Anything else (components, transient editor objects)
    Other,
}

/// Secondary ordering of history rows in the displayed list
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub kind: String,
    pub name: String,
    pub instance: i64,
}

pub trait EntityHost {
    type Handle: Clone + Eq + Debug;

    /// Whether the handle still denotes a live, non-destroyed item
    fn is_live(&self, handle: &Self::Handle) -> bool;

    /// Durable id of the handle, or [`DurableId::NULL`] if it has none
    fn durable_id(&self, handle: &Self::Handle) -> DurableId;

    /// Exact resolution of a durable id to a handle
    fn resolve(&self, id: &DurableId) -> Option<Self::Handle>;

    /// Live entities owned by `container`, or every live entity when `None`
    fn members(&self, container: Option<&DurableId>) -> Vec<Self::Handle>;

    fn category(&self, handle: &Self::Handle) -> EntityCategory;

    /// Document that owns a container entity
    fn owning_container(&self, handle: &Self::Handle) -> Option<DurableId>;

    /// Templates that `document` holds instances of
    fn instantiated_templates(&self, document: &DurableId) -> Vec<DurableId>;

    fn sort_key(&self, handle: &Self::Handle) -> SortKey;
}
