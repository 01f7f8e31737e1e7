use crate::{
    error::Error,
    host::EntityHost,
    store::{HistoryStore, World},
};

/// Drop `dragged` onto the pinned shelf at `target`, returning the new
/// pinned order.
///
/// Dragged items keep their relative order. A running cursor starts at
/// `target`; an item already pinned above the cursor is lifted out first,
/// which pulls the cursor up by one. Every placement advances the cursor.
/// Items not pinned yet are pinned at the cursor. Dead handles are skipped.
///
/// `target` may equal the shelf length (drop at the end) but not exceed it.
pub fn reorder<E: EntityHost>(
    store: &mut HistoryStore<E::Handle>,
    world: World<'_, E>,
    dragged: &[E::Handle],
    target: usize,
) -> Result<Vec<E::Handle>, Error> {
    store.prune(world.host);
    let len = store.pinned().len();
    if target > len {
        return Err(Error::InvalidDropIndex { index: target, len });
    }

    let mut cursor = target;
    for handle in dragged {
        if !world.host.is_live(handle) {
            continue;
        }
        if let Some(position) = store.pinned_position(handle) {
            if position < cursor {
                cursor -= 1;
            }
        }
        store.add_pinned(world, handle, Some(cursor));
        cursor += 1;
    }

    tracing::debug!("dropped {} items at {}", dragged.len(), target);
    Ok(store.pinned_handles())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::{EntityRef, MemoryHost},
        identifier::Resolver,
        persistence::{Namespace, PersistenceIndex},
        scope::{ContainerTracker, Scope},
    };

    fn shelf(host: &MemoryHost, names: &[&str]) -> Vec<EntityRef> {
        names
            .iter()
            .map(|name| host.add_asset(name, "Texture"))
            .collect()
    }

    fn pinned_store(world: World<'_, MemoryHost>, items: &[EntityRef]) -> HistoryStore<EntityRef> {
        let index = PersistenceIndex::new(Namespace::new("Acme", "Editor", "AssetHistory"));
        let mut store = HistoryStore::new(Resolver::AssetScoped, 20, index);
        for handle in items {
            store.add_pinned(world, handle, None);
        }
        store
    }

    #[test]
    fn test_multi_item_drag_keeps_relative_order() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = shelf(&host, &["a", "b", "c", "d", "z"]);
        let (a, b, c, d, z) = (items[0], items[1], items[2], items[3], items[4]);

        let mut store = pinned_store(world, &[a, b, c, d]);
        let order = reorder(&mut store, world, &[a, c, z], 2).unwrap();

        assert_eq!(order, vec![b, a, c, z, d]);
        let ids: Vec<_> = order.iter().map(|h| host.durable_id(h)).collect();
        assert_eq!(store.index().load(&Scope::Project).0, ids);
    }

    #[test]
    fn test_drag_from_below_target() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = shelf(&host, &["a", "b", "c", "d"]);
        let (a, b, c, d) = (items[0], items[1], items[2], items[3]);

        let mut store = pinned_store(world, &[a, b, c, d]);
        let order = reorder(&mut store, world, &[c, d], 0).unwrap();

        assert_eq!(order, vec![c, d, a, b]);
    }

    #[test]
    fn test_drop_at_end() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = shelf(&host, &["a", "b", "c"]);
        let (a, b, c) = (items[0], items[1], items[2]);

        let mut store = pinned_store(world, &[a, b, c]);
        let order = reorder(&mut store, world, &[a, b], 3).unwrap();

        assert_eq!(order, vec![c, a, b]);
    }

    #[test]
    fn test_out_of_range_target() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = shelf(&host, &["a", "b"]);

        let mut store = pinned_store(world, &items);
        let err = reorder(&mut store, world, &[items[0]], 3).unwrap_err();

        assert!(matches!(err, Error::InvalidDropIndex { index: 3, len: 2 }));
        assert_eq!(store.pinned_handles(), items);
    }

    #[test]
    fn test_dead_handles_are_skipped() {
        let host = MemoryHost::new();
        let containers = ContainerTracker::new();
        let world = World::new(&host, &containers);
        let items = shelf(&host, &["a", "b", "c"]);
        let (a, b, c) = (items[0], items[1], items[2]);

        let mut store = pinned_store(world, &[a, b]);
        host.destroy(c);
        let order = reorder(&mut store, world, &[c, b], 0).unwrap();

        assert_eq!(order, vec![b, a]);
    }
}
