use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    codec::{decode_list, encode_list},
    prefs::PreferenceStore,
};
use crate::{identifier::DurableId, scope::Scope};

/// Which of the two lists an id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Pinned,
    History,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Pinned, Role::History];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pinned => "pinned",
            Role::History => "history",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preference key prefix of one surface: `{company}.{product}.{surface}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(company: &str, product: &str, surface: &str) -> Self {
        Namespace(format!("{}.{}.{}", company, product, surface))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn prefix(&self) -> String {
        format!("{}.", self.0)
    }

    fn scopes_key(&self) -> String {
        format!("{}.scopes", self.0)
    }

    fn flushed_at_key(&self) -> String {
        format!("{}.flushed_at", self.0)
    }

    fn list_key(&self, role: Role, scope: &Scope) -> String {
        format!("{}.{}.{}", self.0, role, scope.key())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered pinned and history ids of one scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopeLists {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pinned: Vec<DurableId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<DurableId>,
}

/// Keep the first occurrence of every id, drop null ids
fn dedup(ids: Vec<DurableId>) -> Vec<DurableId> {
    let mut seen = BTreeSet::new();
    ids.into_iter()
        .filter(|id| !id.is_null() && seen.insert(*id))
        .collect()
}

impl ScopeLists {
    pub fn new(pinned: Vec<DurableId>, history: Vec<DurableId>) -> Self {
        ScopeLists {
            pinned: dedup(pinned),
            history: dedup(history),
        }
    }

    pub fn list(&self, role: Role) -> &[DurableId] {
        match role {
            Role::Pinned => &self.pinned,
            Role::History => &self.history,
        }
    }

    fn list_mut(&mut self, role: Role) -> &mut Vec<DurableId> {
        match role {
            Role::Pinned => &mut self.pinned,
            Role::History => &mut self.history,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty() && self.history.is_empty()
    }
}

/// Serializable view of a whole index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexSnapshot {
    pub namespace: String,
    #[serde(default)]
    pub flushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: BTreeMap<String, ScopeLists>,
}

/// Scope -> ordered pinned/history ids, mirrored into a [`PreferenceStore`].
///
/// Mutations only touch memory and mark the scope dirty. Dirty scopes reach
/// the durable store on [`flush_scope`](Self::flush_scope) and
/// [`flush`](Self::flush); each list is rewritten as one whole value. A scope
/// whose lists both become empty is dropped from memory at once and its keys
/// are deleted at the next flush.
#[derive(Debug)]
pub struct PersistenceIndex {
    namespace: Namespace,
    scopes: BTreeMap<Scope, ScopeLists>,
    dirty: BTreeSet<Scope>,
    flushed_at: Option<DateTime<Utc>>,
}

impl PersistenceIndex {
    /// Create an empty index that has not been read from anywhere
    pub fn new(namespace: Namespace) -> Self {
        PersistenceIndex {
            namespace,
            scopes: BTreeMap::new(),
            dirty: BTreeSet::new(),
            flushed_at: None,
        }
    }

    /// Read every scope recorded under `namespace`
    pub fn open<P: PreferenceStore>(prefs: &P, namespace: Namespace) -> Result<Self> {
        let mut index = PersistenceIndex::new(namespace);

        let scopes_key = index.namespace.scopes_key();
        let scopes: Vec<Scope> = prefs
            .get_string(&scopes_key)
            .with_context(|| format!("Failed to read {}", scopes_key))?
            .map(|raw| decode_list(&raw))
            .unwrap_or_default();

        for scope in scopes {
            let pinned = index.read_list(prefs, Role::Pinned, &scope)?;
            let history = index.read_list(prefs, Role::History, &scope)?;
            let lists = ScopeLists::new(pinned, history);
            if lists.is_empty() {
                tracing::debug!("skipping empty scope {} in {}", scope, index.namespace);
                continue;
            }
            index.scopes.insert(scope, lists);
        }

        let flushed_key = index.namespace.flushed_at_key();
        index.flushed_at = prefs
            .get_string(&flushed_key)
            .with_context(|| format!("Failed to read {}", flushed_key))?
            .and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(e) => {
                    tracing::warn!("ignoring malformed {}: {}", flushed_key, e);
                    None
                }
            });

        tracing::debug!(
            "opened index {} with {} scopes",
            index.namespace,
            index.scopes.len()
        );
        Ok(index)
    }

    fn read_list<P: PreferenceStore>(
        &self,
        prefs: &P,
        role: Role,
        scope: &Scope,
    ) -> Result<Vec<DurableId>> {
        let key = self.namespace.list_key(role, scope);
        let raw = prefs
            .get_string(&key)
            .with_context(|| format!("Failed to read {}", key))?;
        Ok(raw.map(|raw| decode_list(&raw)).unwrap_or_default())
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.keys()
    }

    pub fn contains(&self, scope: &Scope) -> bool {
        self.scopes.contains_key(scope)
    }

    pub fn lists(&self, scope: &Scope) -> Option<&ScopeLists> {
        self.scopes.get(scope)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Whether `scope` has changes that were not flushed yet
    pub fn is_dirty(&self, scope: &Scope) -> bool {
        self.dirty.contains(scope)
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn flushed_at(&self) -> Option<DateTime<Utc>> {
        self.flushed_at
    }

    /// Replace both lists of a scope
    pub fn save(&mut self, scope: Scope, pinned: Vec<DurableId>, history: Vec<DurableId>) {
        let lists = ScopeLists::new(pinned, history);
        if lists.is_empty() {
            self.scopes.remove(&scope);
        } else {
            self.scopes.insert(scope, lists);
        }
        self.dirty.insert(scope);
    }

    /// `(pinned, history)` of a scope, both empty if it is unknown
    pub fn load(&self, scope: &Scope) -> (Vec<DurableId>, Vec<DurableId>) {
        self.scopes
            .get(scope)
            .map(|lists| (lists.pinned.clone(), lists.history.clone()))
            .unwrap_or_default()
    }

    pub fn delete(&mut self, scope: &Scope) -> bool {
        self.dirty.insert(*scope);
        self.scopes.remove(scope).is_some()
    }

    pub fn push_front(&mut self, scope: Scope, role: Role, id: DurableId) {
        self.insert(scope, role, 0, id);
    }

    pub fn push_back(&mut self, scope: Scope, role: Role, id: DurableId) {
        self.insert(scope, role, usize::MAX, id);
    }

    /// Move `id` to `index` in a list (clamped to its end), adding it if new
    pub fn insert(&mut self, scope: Scope, role: Role, index: usize, id: DurableId) {
        if id.is_null() {
            return;
        }
        let list = self.scopes.entry(scope).or_default().list_mut(role);
        list.retain(|existing| *existing != id);
        let at = index.min(list.len());
        list.insert(at, id);
        self.dirty.insert(scope);
    }

    /// Move `id` right behind `anchor` in a list, or to its front when there
    /// is no anchor or the anchor is not in the list
    pub fn insert_after(
        &mut self,
        scope: Scope,
        role: Role,
        anchor: Option<&DurableId>,
        id: DurableId,
    ) {
        if id.is_null() {
            return;
        }
        let list = self.scopes.entry(scope).or_default().list_mut(role);
        list.retain(|existing| *existing != id);
        let at = anchor
            .and_then(|anchor| list.iter().position(|existing| existing == anchor))
            .map_or(0, |position| position + 1);
        list.insert(at, id);
        self.dirty.insert(scope);
    }

    pub fn remove(&mut self, scope: &Scope, role: Role, id: &DurableId) -> bool {
        let Some(lists) = self.scopes.get_mut(scope) else {
            return false;
        };
        let list = lists.list_mut(role);
        let before = list.len();
        list.retain(|existing| existing != id);
        if list.len() == before {
            return false;
        }
        self.dirty.insert(*scope);
        self.drop_if_empty(scope);
        true
    }

    fn drop_if_empty(&mut self, scope: &Scope) {
        if self.scopes.get(scope).is_some_and(ScopeLists::is_empty) {
            tracing::debug!("scope {} is empty, dropping it", scope);
            self.scopes.remove(scope);
        }
    }

    /// Drop every id of one list that `keep` rejects and rewrite the scope
    /// in the durable store right away. Returns how many ids were dropped.
    pub fn heal<P, F>(&mut self, prefs: &P, scope: &Scope, role: Role, keep: F) -> Result<usize>
    where
        P: PreferenceStore,
        F: Fn(&DurableId) -> bool,
    {
        let Some(lists) = self.scopes.get_mut(scope) else {
            return Ok(0);
        };
        let list = lists.list_mut(role);
        let before = list.len();
        list.retain(|id| {
            let kept = keep(id);
            if !kept {
                tracing::warn!("dropping unresolvable {} entry {} from {}", role, id, scope);
            }
            kept
        });
        let dropped = before - list.len();

        if dropped > 0 {
            self.dirty.insert(*scope);
            self.drop_if_empty(scope);
            self.flush_scope(prefs, scope)?;
        }
        Ok(dropped)
    }

    fn write_list<P: PreferenceStore>(
        &self,
        prefs: &P,
        role: Role,
        scope: &Scope,
        ids: &[DurableId],
    ) -> Result<()> {
        let key = self.namespace.list_key(role, scope);
        if ids.is_empty() {
            prefs
                .delete_key(&key)
                .with_context(|| format!("Failed to delete {}", key))
        } else {
            prefs
                .set_string(&key, &encode_list(ids))
                .with_context(|| format!("Failed to write {}", key))
        }
    }

    fn write_scope<P: PreferenceStore>(&self, prefs: &P, scope: &Scope) -> Result<()> {
        for role in Role::ALL {
            let ids = self
                .scopes
                .get(scope)
                .map(|lists| lists.list(role))
                .unwrap_or_default();
            self.write_list(prefs, role, scope, ids)?;
        }
        Ok(())
    }

    fn write_scope_keys<P: PreferenceStore>(&self, prefs: &P) -> Result<()> {
        let key = self.namespace.scopes_key();
        if self.scopes.is_empty() {
            prefs
                .delete_key(&key)
                .with_context(|| format!("Failed to delete {}", key))
        } else {
            prefs
                .set_string(&key, &encode_list(self.scopes.keys()))
                .with_context(|| format!("Failed to write {}", key))
        }
    }

    /// Write one scope now, whether or not it is dirty
    pub fn flush_scope<P: PreferenceStore>(&mut self, prefs: &P, scope: &Scope) -> Result<()> {
        tracing::debug!("flushing scope {} of {}", scope, self.namespace);
        self.write_scope(prefs, scope)?;
        self.write_scope_keys(prefs)?;
        self.dirty.remove(scope);
        Ok(())
    }

    /// Write every dirty scope and record the flush time
    pub fn flush<P: PreferenceStore>(&mut self, prefs: &P) -> Result<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }

        let dirty: Vec<Scope> = self.dirty.iter().copied().collect();
        tracing::debug!("flushing {} scopes of {}", dirty.len(), self.namespace);
        for scope in &dirty {
            self.write_scope(prefs, scope)?;
            self.dirty.remove(scope);
        }
        self.write_scope_keys(prefs)?;

        let now = Utc::now();
        let key = self.namespace.flushed_at_key();
        prefs
            .set_string(&key, &now.to_rfc3339())
            .with_context(|| format!("Failed to write {}", key))?;
        self.flushed_at = Some(now);
        Ok(())
    }

    /// Forget every scope and delete every key of this namespace
    pub fn clear_all<P: PreferenceStore>(&mut self, prefs: &P) -> Result<()> {
        let keys = prefs
            .keys_with_prefix(&self.namespace.prefix())
            .with_context(|| format!("Failed to list keys of {}", self.namespace))?;
        for key in keys {
            prefs
                .delete_key(&key)
                .with_context(|| format!("Failed to delete {}", key))?;
        }
        tracing::debug!("cleared index {}", self.namespace);

        self.scopes.clear();
        self.dirty.clear();
        self.flushed_at = None;
        Ok(())
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            namespace: self.namespace.to_string(),
            flushed_at: self.flushed_at,
            scopes: self
                .scopes
                .iter()
                .map(|(scope, lists)| (scope.key(), lists.clone()))
                .collect(),
        }
    }
}
