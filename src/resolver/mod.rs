//! Title ↔ identifier resolution.
//!
//! - [`IdentifierDictionary`]: `title<TAB>id` table
//! - [`RedirectResolver`]: alias and request edges from the redirect file
//! - [`CanonicalMap`]: every dictionary title resolved to its canonical id
pub mod canonical;
pub mod dictionary;
pub mod redirect;

use std::collections::HashMap;

pub use canonical::{CanonicalMap, MappedId, ResolveStats};
pub use dictionary::IdentifierDictionary;
pub use redirect::{Direction, RedirectEdge, RedirectLoadStats, RedirectResolver, Resolution};

use crate::models::EntityId;

/// Read-only lookup from a textual entity key to a numeric id.
///
/// Implementations are built once and never mutated afterwards, so a single
/// instance can serve any number of concurrent joins.
pub trait KeyMap: Send + Sync {
    fn lookup(&self, key: &str) -> Option<EntityId>;
}

impl KeyMap for IdentifierDictionary {
    fn lookup(&self, key: &str) -> Option<EntityId> {
        self.get(key)
    }
}

impl KeyMap for CanonicalMap {
    fn lookup(&self, key: &str) -> Option<EntityId> {
        self.lookup_title(key)
    }
}

impl KeyMap for HashMap<String, EntityId> {
    fn lookup(&self, key: &str) -> Option<EntityId> {
        self.get(key).copied()
    }
}
