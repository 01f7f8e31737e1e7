use std::{cell::RefCell, collections::BTreeMap};

use sha2::{Digest, Sha256};

use super::{EntityCategory, EntityHost, SortKey};
use crate::identifier::{ContainerGuid, DurableId, IdentifierKind};

/// Handle into a [`MemoryHost`]. Never reused, so a handle to a destroyed or
/// unloaded entity stays dead even after its container is reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityRef(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Liveness {
    Live,
    /// Owning container was closed; comes back under a new handle on reload
    Unloaded,
    Destroyed,
}

#[derive(Debug, Clone)]
struct EntityRecord {
    name: String,
    kind: String,
    category: EntityCategory,
    id: DurableId,
    container: Option<DurableId>,
    liveness: Liveness,
}

#[derive(Debug, Default)]
struct Model {
    entities: Vec<EntityRecord>,
    /// document id -> template ids it holds instances of
    instances: BTreeMap<DurableId, Vec<DurableId>>,
    next_item_id: u64,
    next_instance_id: u64,
}

impl Model {
    fn push(&mut self, record: EntityRecord) -> EntityRef {
        self.entities.push(record);
        EntityRef((self.entities.len() - 1) as u32)
    }

    fn next_item_id(&mut self) -> u64 {
        self.next_item_id += 1;
        self.next_item_id
    }

    fn record(&self, entity: EntityRef) -> Option<&EntityRecord> {
        self.entities.get(entity.0 as usize)
    }
}

/// Reference object model: assets, documents, templates and the entities
/// inside them, with template instancing and lazy invalidation.
#[derive(Debug, Default)]
pub struct MemoryHost {
    model: RefCell<Model>,
}

/// Container guid derived from a name (first 16 bytes of its SHA-256)
fn guid_for_name(name: &str) -> ContainerGuid {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    ContainerGuid::from_bytes(bytes)
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_asset_record(&self, name: &str, kind: &str) -> EntityRef {
        let mut world = self.model.borrow_mut();
        let item_id = world.next_item_id();
        let id = DurableId::new(IdentifierKind::ImportedAsset, guid_for_name(name), item_id, 0);
        world.push(EntityRecord {
            name: name.to_string(),
            kind: kind.to_string(),
            category: EntityCategory::Asset,
            id,
            container: None,
            liveness: Liveness::Live,
        })
    }

    /// Add a file-backed asset of the given type name
    pub fn add_asset(&self, name: &str, kind: &str) -> EntityRef {
        self.add_asset_record(name, kind)
    }

    /// Add a document asset; its durable id is the container id of its entities
    pub fn add_document(&self, name: &str) -> EntityRef {
        self.add_asset_record(name, "Document")
    }

    /// Add a reusable template asset
    pub fn add_template(&self, name: &str) -> EntityRef {
        self.add_asset_record(name, "Template")
    }

    /// Add a live entity inside a document or template
    pub fn add_entity(&self, container: EntityRef, name: &str) -> EntityRef {
        let container_id = self.durable_id(&container);
        let mut world = self.model.borrow_mut();
        let item_id = world.next_item_id();
        let id = DurableId::new(
            IdentifierKind::ContainerEntity,
            container_id.container(),
            item_id,
            0,
        );
        world.push(EntityRecord {
            name: name.to_string(),
            kind: "Entity".to_string(),
            category: EntityCategory::ContainerEntity,
            id,
            container: Some(container_id),
            liveness: Liveness::Live,
        })
    }

    /// Add an entity with no durable backing (unsaved, editor-only)
    pub fn add_transient(&self, category: EntityCategory, name: &str) -> EntityRef {
        self.model.borrow_mut().push(EntityRecord {
            name: name.to_string(),
            kind: "Transient".to_string(),
            category,
            id: DurableId::NULL,
            container: None,
            liveness: Liveness::Live,
        })
    }

    /// Instantiate every live entity of `template` into `document`.
    ///
    /// The copies keep their item ids and get a shared non-zero instance id.
    /// Returns the new handles in template order.
    pub fn instantiate(&self, template: EntityRef, document: EntityRef) -> Vec<EntityRef> {
        let template_id = self.durable_id(&template);
        let document_id = self.durable_id(&document);
        let mut world = self.model.borrow_mut();
        world.next_instance_id += 1;
        let instance_id = 1000 + world.next_instance_id;

        let sources: Vec<EntityRecord> = world
            .entities
            .iter()
            .filter(|r| r.liveness == Liveness::Live && r.container == Some(template_id))
            .cloned()
            .collect();

        let copies: Vec<EntityRef> = sources
            .into_iter()
            .map(|source| {
                let id = DurableId::new(
                    IdentifierKind::ContainerEntity,
                    document_id.container(),
                    source.id.item_id(),
                    instance_id,
                );
                world.push(EntityRecord {
                    id,
                    container: Some(document_id),
                    ..source
                })
            })
            .collect();

        let templates = world.instances.entry(document_id).or_default();
        if !templates.contains(&template_id) {
            templates.push(template_id);
        }
        copies
    }

    pub fn destroy(&self, entity: EntityRef) {
        if let Some(record) = self.model.borrow_mut().entities.get_mut(entity.0 as usize) {
            record.liveness = Liveness::Destroyed;
        }
    }

    /// Close a container: every entity inside it becomes unreachable
    pub fn unload(&self, container: EntityRef) {
        let container_id = self.durable_id(&container);
        for record in self.model.borrow_mut().entities.iter_mut() {
            if record.container == Some(container_id) && record.liveness == Liveness::Live {
                record.liveness = Liveness::Unloaded;
            }
        }
    }

    /// Reopen a container: unloaded entities come back under fresh handles
    pub fn reload(&self, container: EntityRef) -> Vec<EntityRef> {
        let container_id = self.durable_id(&container);
        let mut world = self.model.borrow_mut();
        let mut revived = Vec::new();
        for index in 0..world.entities.len() {
            let record = &mut world.entities[index];
            if record.container == Some(container_id) && record.liveness == Liveness::Unloaded {
                record.liveness = Liveness::Destroyed;
                let fresh = EntityRecord {
                    liveness: Liveness::Live,
                    ..record.clone()
                };
                revived.push(world.push(fresh));
            }
        }
        revived
    }

    pub fn name(&self, entity: EntityRef) -> Option<String> {
        self.model.borrow().record(entity).map(|r| r.name.clone())
    }

    /// Live handle for an entity name inside a container
    pub fn find(&self, container: Option<EntityRef>, name: &str) -> Option<EntityRef> {
        let container_id = container.map(|c| self.durable_id(&c));
        let world = self.model.borrow();
        world
            .entities
            .iter()
            .position(|r| {
                r.liveness == Liveness::Live && r.name == name && r.container == container_id
            })
            .map(|index| EntityRef(index as u32))
    }
}

impl EntityHost for MemoryHost {
    type Handle = EntityRef;

    fn is_live(&self, handle: &EntityRef) -> bool {
        self.model
            .borrow()
            .record(*handle)
            .is_some_and(|r| r.liveness == Liveness::Live)
    }

    fn durable_id(&self, handle: &EntityRef) -> DurableId {
        self.model
            .borrow()
            .record(*handle)
            .map(|r| r.id)
            .unwrap_or(DurableId::NULL)
    }

    fn resolve(&self, id: &DurableId) -> Option<EntityRef> {
        if id.is_null() {
            return None;
        }
        let world = self.model.borrow();
        world
            .entities
            .iter()
            .position(|r| r.liveness == Liveness::Live && r.id == *id)
            .map(|index| EntityRef(index as u32))
    }

    fn members(&self, container: Option<&DurableId>) -> Vec<EntityRef> {
        let world = self.model.borrow();
        world
            .entities
            .iter()
            .enumerate()
            .filter(|(_, r)| r.liveness == Liveness::Live)
            .filter(|(_, r)| container.is_none() || r.container.as_ref() == container)
            .map(|(index, _)| EntityRef(index as u32))
            .collect()
    }

    fn category(&self, handle: &EntityRef) -> EntityCategory {
        self.model
            .borrow()
            .record(*handle)
            .map(|r| r.category)
            .unwrap_or(EntityCategory::Other)
    }

    fn owning_container(&self, handle: &EntityRef) -> Option<DurableId> {
        self.model.borrow().record(*handle).and_then(|r| r.container)
    }

    fn instantiated_templates(&self, document: &DurableId) -> Vec<DurableId> {
        self.model
            .borrow()
            .instances
            .get(document)
            .cloned()
            .unwrap_or_default()
    }

    fn sort_key(&self, handle: &EntityRef) -> SortKey {
        let world = self.model.borrow();
        let (kind, name) = world
            .record(*handle)
            .map(|r| (r.kind.clone(), r.name.clone()))
            .unwrap_or_default();
        SortKey {
            kind,
            name,
            instance: handle.0 as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids_are_scoped_to_their_document() {
        let host = MemoryHost::new();
        let doc = host.add_document("Level1");
        let cube = host.add_entity(doc, "Cube");

        let doc_id = host.durable_id(&doc);
        let cube_id = host.durable_id(&cube);
        assert_eq!(cube_id.kind(), IdentifierKind::ContainerEntity);
        assert_eq!(cube_id.container(), doc_id.container());
        assert_eq!(host.owning_container(&cube), Some(doc_id));
        assert_eq!(host.resolve(&cube_id), Some(cube));
    }

    #[test]
    fn test_instantiate_keeps_item_ids() {
        let host = MemoryHost::new();
        let template = host.add_template("Door");
        let hinge = host.add_entity(template, "Hinge");
        let doc = host.add_document("Level1");

        let copies = host.instantiate(template, doc);
        assert_eq!(copies.len(), 1);

        let original = host.durable_id(&hinge);
        let copy = host.durable_id(&copies[0]);
        assert!(original.same_logical_item(&copy));
        assert_ne!(copy.instance_id(), 0);
        assert_eq!(copy.container(), host.durable_id(&doc).container());
        assert_eq!(
            host.instantiated_templates(&host.durable_id(&doc)),
            vec![host.durable_id(&template)]
        );
    }

    #[test]
    fn test_unload_and_reload_issue_fresh_handles() {
        let host = MemoryHost::new();
        let doc = host.add_document("Level1");
        let cube = host.add_entity(doc, "Cube");
        let cube_id = host.durable_id(&cube);

        host.unload(doc);
        assert!(!host.is_live(&cube));
        assert_eq!(host.resolve(&cube_id), None);

        let revived = host.reload(doc);
        assert_eq!(revived.len(), 1);
        assert_ne!(revived[0], cube);
        assert!(!host.is_live(&cube));
        assert_eq!(host.resolve(&cube_id), Some(revived[0]));
    }

    #[test]
    fn test_destroyed_entities_stay_dead_on_reload() {
        let host = MemoryHost::new();
        let doc = host.add_document("Level1");
        let cube = host.add_entity(doc, "Cube");
        host.destroy(cube);
        host.unload(doc);

        assert!(host.reload(doc).is_empty());
        assert!(host.members(Some(&host.durable_id(&doc))).is_empty());
    }

    #[test]
    fn test_transient_has_no_durable_id() {
        let host = MemoryHost::new();
        let scratch = host.add_transient(EntityCategory::ContainerEntity, "Scratch");
        assert!(host.durable_id(&scratch).is_null());
        assert!(host.is_live(&scratch));
        assert_eq!(host.resolve(&DurableId::NULL), None);
    }

    #[test]
    fn test_handle_lookups_read_the_model() {
        let host = MemoryHost::new();
        let rock = host.add_asset("rock.png", "Texture");
        let doc = host.add_document("Level1");
        let cube = host.add_entity(doc, "Cube");

        assert_eq!(host.category(&rock), EntityCategory::Asset);
        assert_eq!(host.category(&cube), EntityCategory::ContainerEntity);
        assert!(host.instantiated_templates(&host.durable_id(&doc)).is_empty());

        let unknown = EntityRef(99);
        assert!(!host.is_live(&unknown));
        assert!(host.durable_id(&unknown).is_null());
        assert_eq!(host.category(&unknown), EntityCategory::Other);
    }
}
