//! Bounded recency history plus a manually ordered pinned shelf.
//!
//! Handles are owned by the host and may die at any time. Every operation
//! checks liveness lazily and treats dead handles as already removed.

mod navigation;

use anyhow::Result;

pub use navigation::{capacity_for_area, cycle_selection, Direction};

use crate::{
    host::EntityHost,
    identifier::{DurableId, Resolver},
    persistence::{PersistenceIndex, PreferenceStore, Role},
    scope::{ContainerTracker, Scope},
};

/// The host object model and the container state, borrowed together for
/// the duration of one store operation
pub struct World<'a, E> {
    pub host: &'a E,
    pub containers: &'a ContainerTracker,
}

impl<'a, E> World<'a, E> {
    pub fn new(host: &'a E, containers: &'a ContainerTracker) -> Self {
        World { host, containers }
    }
}

impl<E> Clone for World<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for World<'_, E> {}

/// One tracked handle with the id and scope it is persisted under.
/// `scope == None` keeps the entry in memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<H> {
    pub handle: H,
    pub id: DurableId,
    pub scope: Option<Scope>,
}

impl<H> Entry<H> {
    pub fn is_persisted(&self) -> bool {
        self.scope.is_some() && !self.id.is_null()
    }
}

#[derive(Debug)]
pub struct HistoryStore<H> {
    resolver: Resolver,
    capacity: usize,
    /// Most recent first
    history: Vec<Entry<H>>,
    pinned: Vec<Entry<H>>,
    index: PersistenceIndex,
}

impl<H: Clone + PartialEq + std::fmt::Debug> HistoryStore<H> {
    pub fn new(resolver: Resolver, capacity: usize, index: PersistenceIndex) -> Self {
        HistoryStore {
            resolver,
            capacity,
            history: Vec::new(),
            pinned: Vec::new(),
            index,
        }
    }

    pub fn resolver(&self) -> Resolver {
        self.resolver
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn index(&self) -> &PersistenceIndex {
        &self.index
    }

    pub fn history(&self) -> &[Entry<H>] {
        &self.history
    }

    pub fn pinned(&self) -> &[Entry<H>] {
        &self.pinned
    }

    pub fn history_handles(&self) -> Vec<H> {
        self.history.iter().map(|e| e.handle.clone()).collect()
    }

    pub fn pinned_handles(&self) -> Vec<H> {
        self.pinned.iter().map(|e| e.handle.clone()).collect()
    }

    pub fn contains_pinned(&self, handle: &H) -> bool {
        self.pinned.iter().any(|e| e.handle == *handle)
    }

    pub fn contains_history(&self, handle: &H) -> bool {
        self.history.iter().any(|e| e.handle == *handle)
    }

    pub fn pinned_position(&self, handle: &H) -> Option<usize> {
        self.pinned.iter().position(|e| e.handle == *handle)
    }

    fn list_mut(&mut self, role: Role) -> &mut Vec<Entry<H>> {
        match role {
            Role::Pinned => &mut self.pinned,
            Role::History => &mut self.history,
        }
    }

    fn take_entry(&mut self, role: Role, handle: &H) -> Option<Entry<H>> {
        let list = self.list_mut(role);
        let position = list.iter().position(|e| e.handle == *handle)?;
        Some(list.remove(position))
    }

    /// Remove an entry's id from the index
    fn forget(&mut self, role: Role, entry: &Entry<H>) {
        if let Some(scope) = entry.scope {
            self.index.remove(&scope, role, &entry.id);
        }
    }

    /// Entry for `handle`: the one already tracked if it has an id, a fresh
    /// placement otherwise
    fn entry_for<E: EntityHost<Handle = H>>(
        &self,
        world: World<'_, E>,
        handle: &H,
        existing: Option<Entry<H>>,
        role: Role,
    ) -> Option<Entry<H>> {
        if let Some(entry) = existing.filter(|e| !e.id.is_null()) {
            return Some(entry);
        }
        self.resolver
            .placement(world.host, world.containers, handle, role)
            .map(|placement| Entry {
                handle: handle.clone(),
                id: placement.id,
                scope: placement.scope,
            })
    }

    /// Record a use of `handle`, moving it to the front of the history
    pub fn add_history<E: EntityHost<Handle = H>>(&mut self, world: World<'_, E>, handle: &H) {
        if !world.host.is_live(handle) {
            return;
        }
        let existing = self.take_entry(Role::History, handle);
        let Some(entry) = self.entry_for(world, handle, existing, Role::History) else {
            return;
        };

        if let Some(scope) = entry.scope {
            self.index.push_front(scope, Role::History, entry.id);
        }
        tracing::debug!("history <- {:?} ({})", handle, entry.id);
        self.history.insert(0, entry);
        self.truncate(true);
    }

    /// Pin `handle` at `index` (appended when `None` or past the end).
    /// Pinning an already pinned handle moves it.
    pub fn add_pinned<E: EntityHost<Handle = H>>(
        &mut self,
        world: World<'_, E>,
        handle: &H,
        index: Option<usize>,
    ) {
        if !world.host.is_live(handle) {
            return;
        }
        let existing = self.take_entry(Role::Pinned, handle);
        let Some(entry) = self.entry_for(world, handle, existing, Role::Pinned) else {
            return;
        };

        let at = index
            .unwrap_or(self.pinned.len())
            .min(self.pinned.len());
        if let Some(scope) = entry.scope {
            match index {
                None => self.index.push_back(scope, Role::Pinned, entry.id),
                Some(_) => {
                    // Persisted lists may hold ids that are not loaded, so
                    // place the id behind its nearest persisted neighbour
                    let persisted = self
                        .index
                        .lists(&scope)
                        .map(|lists| lists.list(Role::Pinned))
                        .unwrap_or_default();
                    let anchor = self.pinned[..at]
                        .iter()
                        .rev()
                        .filter(|e| e.scope == Some(scope))
                        .map(|e| e.id)
                        .find(|id| persisted.contains(id));
                    self.index
                        .insert_after(scope, Role::Pinned, anchor.as_ref(), entry.id);
                }
            }
        }
        tracing::debug!("pinned {:?} at {} ({})", handle, at, entry.id);
        self.pinned.insert(at, entry);
        self.truncate(true);
    }

    pub fn remove_history(&mut self, handle: &H) -> bool {
        match self.take_entry(Role::History, handle) {
            Some(entry) => {
                self.forget(Role::History, &entry);
                true
            }
            None => false,
        }
    }

    pub fn remove_pinned(&mut self, handle: &H) -> bool {
        match self.take_entry(Role::Pinned, handle) {
            Some(entry) => {
                self.forget(Role::Pinned, &entry);
                true
            }
            None => false,
        }
    }

    /// Remove every handle matching `predicate` from both lists
    pub fn remove_where<F: Fn(&H) -> bool>(&mut self, predicate: F) -> usize {
        let mut removed = 0;
        for role in Role::ALL {
            let list = self.list_mut(role);
            let (gone, kept): (Vec<_>, Vec<_>) =
                std::mem::take(list).into_iter().partition(|e| predicate(&e.handle));
            *list = kept;
            removed += gone.len();
            for entry in &gone {
                self.forget(role, entry);
            }
        }
        removed
    }

    pub fn clear_history(&mut self) {
        for entry in std::mem::take(&mut self.history) {
            self.forget(Role::History, &entry);
        }
    }

    pub fn clear_pinned(&mut self) {
        for entry in std::mem::take(&mut self.pinned) {
            self.forget(Role::Pinned, &entry);
        }
    }

    pub fn clear_all(&mut self) {
        self.clear_history();
        self.clear_pinned();
    }

    /// Drop the in-memory lists without touching the index, before another
    /// set of scopes is loaded
    pub fn unload_lists(&mut self) {
        self.history.clear();
        self.pinned.clear();
    }

    /// Drop entries whose handles died. The index is left alone: entries of
    /// a closed container must survive its handles going away.
    pub fn prune<E: EntityHost<Handle = H>>(&mut self, host: &E) {
        let before = self.history.len() + self.pinned.len();
        self.history.retain(|e| host.is_live(&e.handle));
        self.pinned.retain(|e| host.is_live(&e.handle));
        let pruned = before - self.history.len() - self.pinned.len();
        if pruned > 0 {
            tracing::debug!("pruned {} stale entries", pruned);
        }
    }

    /// Cap the history so pinned and recent items together fit the capacity.
    /// Evicts the oldest history entries that are not pinned.
    fn truncate(&mut self, forget_evicted: bool) {
        let pinned_only = self
            .pinned
            .iter()
            .filter(|p| !self.contains_history(&p.handle))
            .count();
        let limit = self.capacity.saturating_sub(pinned_only);
        let mut unpinned = self
            .history
            .iter()
            .filter(|e| !self.contains_pinned(&e.handle))
            .count();

        while unpinned > limit {
            let Some(oldest) = self
                .history
                .iter()
                .rposition(|e| !self.contains_pinned(&e.handle))
            else {
                break;
            };
            let evicted = self.history.remove(oldest);
            tracing::debug!("history full, evicting {:?}", evicted.handle);
            if forget_evicted {
                self.forget(Role::History, &evicted);
            }
            unpinned -= 1;
        }
    }

    /// Prune, then bring the history back within capacity
    pub fn limit<E: EntityHost<Handle = H>>(&mut self, host: &E) {
        self.prune(host);
        self.truncate(true);
    }

    pub fn set_capacity<E: EntityHost<Handle = H>>(&mut self, host: &E, capacity: usize) {
        if capacity != self.capacity {
            tracing::debug!("capacity {} -> {}", self.capacity, capacity);
        }
        self.capacity = capacity;
        self.limit(host);
    }

    /// Pinned items in shelf order, then recent items not pinned sorted by
    /// kind, name and instance, cut to capacity. Dead handles are skipped;
    /// the lists themselves are not touched.
    pub fn derive_displayed<E: EntityHost<Handle = H>>(&self, host: &E) -> Vec<H> {
        let mut displayed: Vec<H> = self
            .pinned
            .iter()
            .filter(|e| host.is_live(&e.handle))
            .map(|e| e.handle.clone())
            .collect();

        let mut recent: Vec<_> = self
            .history
            .iter()
            .filter(|e| host.is_live(&e.handle) && !self.contains_pinned(&e.handle))
            .map(|e| (host.sort_key(&e.handle), e.handle.clone()))
            .collect();
        recent.sort_by(|a, b| a.0.cmp(&b.0));

        displayed.extend(recent.into_iter().map(|(_, handle)| handle));
        displayed.truncate(self.capacity);
        displayed
    }

    /// Append an entry read back from the index. Does not touch the index.
    /// Returns false if the handle is already in that list.
    pub fn insert_restored(&mut self, role: Role, entry: Entry<H>) -> bool {
        let list = self.list_mut(role);
        if list.iter().any(|e| e.handle == entry.handle) {
            return false;
        }
        list.push(entry);
        true
    }

    /// Load one scope of the index into the lists.
    ///
    /// Ids are resolved through the resolver, searching `candidate` for
    /// copies of template items. With `heal`, ids that resolve to nothing
    /// are dropped from the index and the scope is rewritten at once.
    /// Returns how many entries were added.
    pub fn restore_scope<E, P>(
        &mut self,
        world: World<'_, E>,
        prefs: &P,
        scope: Scope,
        candidate: Option<&DurableId>,
        heal: bool,
    ) -> Result<usize>
    where
        E: EntityHost<Handle = H>,
        P: PreferenceStore,
    {
        let (pinned, history) = self.index.load(&scope);
        let mut restored = 0;

        for (role, ids) in [(Role::Pinned, pinned), (Role::History, history)] {
            let mut unresolved = Vec::new();
            for id in ids {
                match self.resolver.from_durable(world.host, &id, candidate) {
                    Some(handle) => {
                        let entry = Entry {
                            handle,
                            id,
                            scope: Some(scope),
                        };
                        if self.insert_restored(role, entry) {
                            restored += 1;
                        }
                    }
                    None => unresolved.push(id),
                }
            }
            if heal && !unresolved.is_empty() {
                self.index
                    .heal(prefs, &scope, role, |id| !unresolved.contains(id))?;
            }
        }

        self.truncate(false);
        tracing::debug!("restored {} entries from {}", restored, scope);
        Ok(restored)
    }

    pub fn flush_scope<P: PreferenceStore>(&mut self, prefs: &P, scope: &Scope) -> Result<()> {
        self.index.flush_scope(prefs, scope)
    }

    pub fn flush<P: PreferenceStore>(&mut self, prefs: &P) -> Result<()> {
        self.index.flush(prefs)
    }

    /// Forget everything, in memory and in the durable store
    pub fn clear_index<P: PreferenceStore>(&mut self, prefs: &P) -> Result<()> {
        self.unload_lists();
        self.index.clear_all(prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::{EntityRef, MemoryHost},
        persistence::{MemoryPreferences, Namespace},
    };

    fn store(resolver: Resolver, capacity: usize) -> HistoryStore<EntityRef> {
        let namespace = Namespace::new("Acme", "Editor", resolver.surface_name());
        HistoryStore::new(resolver, capacity, PersistenceIndex::new(namespace))
    }

    fn assets(host: &MemoryHost, count: usize) -> Vec<EntityRef> {
        (0..count)
            .map(|i| host.add_asset(&format!("asset{}.png", i), "Texture"))
            .collect()
    }

    #[test]
    fn test_recency_order() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = assets(&host, 2);
        let (a, b) = (items[0], items[1]);

        let mut store = store(Resolver::AssetScoped, 10);
        store.add_history(world, &a);
        store.add_history(world, &b);
        store.add_history(world, &a);

        assert_eq!(store.history_handles(), vec![a, b]);
        assert_eq!(
            store.index().load(&Scope::Project).1,
            vec![host.durable_id(&a), host.durable_id(&b)]
        );
    }

    #[test]
    fn test_no_duplicates() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = assets(&host, 3);

        let mut store = store(Resolver::AssetScoped, 10);
        for handle in items.iter().chain(items.iter().rev()).chain(items.iter()) {
            store.add_history(world, handle);
            store.add_pinned(world, handle, None);
            store.add_pinned(world, handle, Some(0));
        }

        for list in [store.history_handles(), store.pinned_handles()] {
            let mut deduped = list.clone();
            deduped.sort();
            deduped.dedup();
            assert_eq!(deduped.len(), list.len());
        }
        assert_eq!(store.index().load(&Scope::Project).0.len(), 3);
    }

    #[test]
    fn test_capacity_bound() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = assets(&host, 12);

        let mut store = store(Resolver::AssetScoped, 5);
        store.add_pinned(world, &items[0], None);
        store.add_pinned(world, &items[1], None);
        for handle in &items[2..] {
            store.add_history(world, handle);
        }

        assert_eq!(store.history().len(), 3);
        assert_eq!(store.history_handles(), vec![items[11], items[10], items[9]]);
        assert_eq!(store.index().load(&Scope::Project).1.len(), 3);
        assert_eq!(store.derive_displayed(&host).len(), 5);
    }

    #[test]
    fn test_pin_survives_eviction() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = assets(&host, 30);

        let mut store = store(Resolver::AssetScoped, 4);
        store.add_history(world, &items[0]);
        store.add_pinned(world, &items[0], None);
        for handle in &items[1..] {
            store.add_history(world, handle);
        }

        assert!(store.contains_pinned(&items[0]));
        assert_eq!(store.derive_displayed(&host)[0], items[0]);
        // the pinned item still in history does not count against the cap
        let unpinned = store
            .history()
            .iter()
            .filter(|e| !store.contains_pinned(&e.handle))
            .count();
        assert_eq!(unpinned, 4);
    }

    #[test]
    fn test_add_pinned_index_is_clamped() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = assets(&host, 3);

        let mut store = store(Resolver::AssetScoped, 10);
        store.add_pinned(world, &items[0], None);
        store.add_pinned(world, &items[1], Some(99));
        store.add_pinned(world, &items[2], Some(0));

        assert_eq!(store.pinned_handles(), vec![items[2], items[0], items[1]]);
        let ids: Vec<_> = [items[2], items[0], items[1]]
            .iter()
            .map(|h| host.durable_id(h))
            .collect();
        assert_eq!(store.index().load(&Scope::Project).0, ids);
    }

    #[test]
    fn test_removal_deletes_empty_scope() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = assets(&host, 1);

        let mut store = store(Resolver::AssetScoped, 10);
        store.add_pinned(world, &items[0], None);
        store.add_history(world, &items[0]);
        assert!(store.index().contains(&Scope::Project));

        assert!(store.remove_pinned(&items[0]));
        assert!(store.remove_history(&items[0]));
        assert!(!store.remove_history(&items[0]));
        assert!(!store.index().contains(&Scope::Project));
    }

    #[test]
    fn test_dead_and_transient_handles() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let scratch = host.add_transient(crate::host::EntityCategory::Asset, "scratch");
        let gone = host.add_asset("gone.png", "Texture");
        host.destroy(gone);

        let mut store = store(Resolver::AssetScoped, 10);
        store.add_history(world, &gone);
        store.add_pinned(world, &gone, None);
        assert!(store.history().is_empty());
        assert!(store.pinned().is_empty());

        store.add_pinned(world, &scratch, None);
        store.add_history(world, &scratch);
        assert_eq!(store.pinned_handles(), vec![scratch]);
        assert_eq!(store.history_handles(), vec![scratch]);
        assert!(!store.pinned()[0].is_persisted());
        assert!(store.index().is_empty());
    }

    #[test]
    fn test_prune_keeps_index() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = assets(&host, 2);

        let mut store = store(Resolver::AssetScoped, 10);
        store.add_pinned(world, &items[0], None);
        store.add_history(world, &items[1]);
        host.destroy(items[0]);

        assert_eq!(store.derive_displayed(&host), vec![items[1]]);
        assert_eq!(store.pinned().len(), 1);

        store.prune(&host);
        assert!(store.pinned().is_empty());
        assert_eq!(store.index().load(&Scope::Project).0.len(), 1);
    }

    #[test]
    fn test_displayed_order() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let zebra = host.add_asset("zebra.png", "Texture");
        let apple = host.add_asset("apple.png", "Texture");
        let clip = host.add_asset("walk.anim", "Animation");
        let shelf = host.add_asset("shelf.png", "Texture");

        let mut store = store(Resolver::AssetScoped, 10);
        store.add_history(world, &zebra);
        store.add_history(world, &apple);
        store.add_history(world, &clip);
        store.add_history(world, &shelf);
        store.add_pinned(world, &shelf, None);

        let history_before = store.history_handles();
        assert_eq!(store.derive_displayed(&host), vec![shelf, clip, apple, zebra]);
        assert_eq!(store.derive_displayed(&host), vec![shelf, clip, apple, zebra]);
        assert_eq!(store.history_handles(), history_before);
    }

    #[test]
    fn test_shrinking_capacity_truncates_history_only() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = assets(&host, 6);

        let mut store = store(Resolver::AssetScoped, 10);
        for handle in &items[..3] {
            store.add_pinned(world, handle, None);
        }
        for handle in &items[3..] {
            store.add_history(world, handle);
        }

        store.set_capacity(&host, 4);
        assert_eq!(store.pinned().len(), 3);
        assert_eq!(store.history_handles(), vec![items[5]]);

        store.set_capacity(&host, 1);
        assert_eq!(store.pinned().len(), 3);
        assert!(store.history().is_empty());
        assert_eq!(store.derive_displayed(&host).len(), 1);
    }

    #[test]
    fn test_clear_and_remove_where() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = assets(&host, 4);

        let mut store = store(Resolver::AssetScoped, 10);
        for handle in &items {
            store.add_history(world, handle);
        }
        store.add_pinned(world, &items[0], None);

        assert_eq!(store.remove_where(|h| *h == items[0] || *h == items[1]), 3);
        assert!(store.pinned().is_empty());
        assert_eq!(store.history().len(), 2);

        store.clear_all();
        assert!(store.history().is_empty());
        assert!(store.index().is_empty());
    }

    #[test]
    fn test_restore_heals_missing_ids() -> Result<()> {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let prefs = MemoryPreferences::new();
        let items = assets(&host, 3);
        let ids: Vec<_> = items.iter().map(|h| host.durable_id(h)).collect();

        let mut index = PersistenceIndex::open(&prefs, Namespace::new("Acme", "Editor", "A"))?;
        index.save(Scope::Project, ids.clone(), vec![]);
        index.flush(&prefs)?;
        host.destroy(items[1]);

        let mut store = HistoryStore::new(Resolver::AssetScoped, 10, index);
        let restored = store.restore_scope(world, &prefs, Scope::Project, None, true)?;

        assert_eq!(restored, 2);
        assert_eq!(store.pinned_handles(), vec![items[0], items[2]]);
        assert_eq!(store.index().load(&Scope::Project).0, vec![ids[0], ids[2]]);
        assert!(!store.index().is_dirty(&Scope::Project));
        Ok(())
    }
}
