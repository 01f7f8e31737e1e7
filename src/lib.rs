#![deny(clippy::mod_module_files)]
//! Recently used items and a pinned shelf for an authoring tool, with
//! per-container durable identity, persistence and drag reordering.

pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod identifier;
pub mod persistence;
pub mod reorder;
pub mod scope;
pub mod store;
pub mod surface;
pub mod usages;

pub use error::Error;
