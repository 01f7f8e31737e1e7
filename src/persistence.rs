//! Durable side of the store: a per-scope index of pinned and history ids
//! kept in memory and flushed as whole-string values into a key/value
//! preference medium.

mod codec;
mod index;
mod prefs;

pub use codec::{decode_list, encode_list, SEPARATOR};
pub use index::{IndexSnapshot, Namespace, PersistenceIndex, Role, ScopeLists};
pub use prefs::{FilePreferences, MemoryPreferences, PreferenceStore};
