use super::{DurableId, IdentifierKind};
use crate::{
    host::{EntityCategory, EntityHost},
    persistence::Role,
    scope::{ContainerTracker, Scope},
};

/// Strategy converting between live handles and durable ids.
///
/// - `AssetScoped`: project assets, persisted in one project-wide list
/// - `ContainerScoped`: entities inside documents and templates, persisted
///   per container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolver {
    AssetScoped,
    ContainerScoped,
}

/// Where a handle gets recorded: the id to persist and the scope to persist
/// it under. `scope == None` keeps the entry in memory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    pub id: DurableId,
    pub scope: Option<Scope>,
}

impl Resolver {
    /// Name used for the preference namespace of surfaces using this resolver
    pub fn surface_name(&self) -> &'static str {
        match self {
            Resolver::AssetScoped => "AssetHistory",
            Resolver::ContainerScoped => "EntityHistory",
        }
    }

    /// Whether selections of this handle belong on this kind of surface
    pub fn tracks<E: EntityHost>(&self, host: &E, handle: &E::Handle) -> bool {
        let wanted = match self {
            Resolver::AssetScoped => EntityCategory::Asset,
            Resolver::ContainerScoped => EntityCategory::ContainerEntity,
        };
        host.is_live(handle) && host.category(handle) == wanted
    }

    /// Durable id of a live handle, [`DurableId::NULL`] when it has none
    pub fn to_durable<E: EntityHost>(&self, host: &E, handle: &E::Handle) -> DurableId {
        if !host.is_live(handle) {
            return DurableId::NULL;
        }
        host.durable_id(handle)
    }

    /// Resolve a stored id back to a live handle.
    ///
    /// Tries the exact id first. Container-scoped ids then fall back to a
    /// search by item id inside `candidate_scope` (or everywhere when
    /// `None`), which finds the copy of a template item inside an instance.
    pub fn from_durable<E: EntityHost>(
        &self,
        host: &E,
        id: &DurableId,
        candidate_scope: Option<&DurableId>,
    ) -> Option<E::Handle> {
        if id.is_null() {
            return None;
        }
        if let Some(handle) = host.resolve(id).filter(|h| host.is_live(h)) {
            return Some(handle);
        }
        if *self == Resolver::AssetScoped || id.kind() != IdentifierKind::ContainerEntity {
            return None;
        }
        host.members(candidate_scope)
            .into_iter()
            .find(|h| host.durable_id(h).same_logical_item(id))
    }

    /// Decide how a handle is recorded. `None` means it must not be
    /// recorded at all (a template's own root in its history).
    pub(crate) fn placement<E: EntityHost>(
        &self,
        host: &E,
        containers: &ContainerTracker,
        handle: &E::Handle,
        role: Role,
    ) -> Option<Placement> {
        let id = self.to_durable(host, handle);
        if id.is_null() {
            return Some(Placement { id, scope: None });
        }

        match self {
            Resolver::AssetScoped => Some(Placement {
                id,
                scope: Some(Scope::Project),
            }),
            Resolver::ContainerScoped => {
                if let Some(template) = containers.active_template() {
                    if role == Role::History && id.same_logical_item(&template) {
                        return None;
                    }
                    return Some(Placement {
                        id: id.with_container(template.container()),
                        scope: Some(Scope::Container(template)),
                    });
                }

                let owner = host
                    .owning_container(handle)
                    .filter(|c| containers.is_document_open(c));
                let scope = match (owner, role) {
                    (Some(document), _) => Some(Scope::Container(document)),
                    (None, Role::Pinned) => containers.active_document().map(Scope::Container),
                    (None, Role::History) => None,
                };
                Some(Placement { id, scope })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    #[test]
    fn test_to_durable_null_for_dead_and_transient() {
        let host = MemoryHost::new();
        let asset = host.add_asset("rock.png", "Texture");
        let scratch = host.add_transient(EntityCategory::Asset, "scratch");

        assert!(!Resolver::AssetScoped.to_durable(&host, &asset).is_null());
        assert!(Resolver::AssetScoped.to_durable(&host, &scratch).is_null());

        host.destroy(asset);
        assert!(Resolver::AssetScoped.to_durable(&host, &asset).is_null());
    }

    #[test]
    fn test_from_durable_exact() {
        let host = MemoryHost::new();
        let doc = host.add_document("Level1");
        let cube = host.add_entity(doc, "Cube");
        let id = host.durable_id(&cube);

        assert_eq!(
            Resolver::ContainerScoped.from_durable(&host, &id, None),
            Some(cube)
        );
        assert_eq!(
            Resolver::ContainerScoped.from_durable(&host, &DurableId::NULL, None),
            None
        );
    }

    #[test]
    fn test_from_durable_falls_back_to_instance_copy() {
        let host = MemoryHost::new();
        let template = host.add_template("Door");
        let hinge = host.add_entity(template, "Hinge");
        let hinge_id = host.durable_id(&hinge);
        let doc = host.add_document("Level1");
        let copies = host.instantiate(template, doc);
        host.unload(template);

        let doc_id = host.durable_id(&doc);
        assert_eq!(
            Resolver::ContainerScoped.from_durable(&host, &hinge_id, Some(&doc_id)),
            Some(copies[0])
        );
        // asset-scoped resolution never guesses by item id
        assert_eq!(
            Resolver::AssetScoped.from_durable(&host, &hinge_id, Some(&doc_id)),
            None
        );
    }

    #[test]
    fn test_tracks_by_category() {
        let host = MemoryHost::new();
        let asset = host.add_asset("rock.png", "Texture");
        let doc = host.add_document("Level1");
        let cube = host.add_entity(doc, "Cube");

        assert!(Resolver::AssetScoped.tracks(&host, &asset));
        assert!(!Resolver::AssetScoped.tracks(&host, &cube));
        assert!(Resolver::ContainerScoped.tracks(&host, &cube));
        assert!(!Resolver::ContainerScoped.tracks(&host, &asset));
    }

    #[test]
    fn test_placement_inside_template_rescopes_id() {
        let host = MemoryHost::new();
        let template = host.add_template("Door");
        let hinge = host.add_entity(template, "Hinge");
        let template_id = host.durable_id(&template);

        let mut containers = ContainerTracker::new();
        containers.open_template(template_id);

        let placement = Resolver::ContainerScoped
            .placement(&host, &containers, &hinge, Role::History)
            .unwrap();
        assert_eq!(placement.scope, Some(Scope::Container(template_id)));
        assert_eq!(placement.id.container(), template_id.container());
        assert_eq!(placement.id.item_id(), host.durable_id(&hinge).item_id());
    }

    #[test]
    fn test_placement_of_unowned_entity() {
        let host = MemoryHost::new();
        let doc = host.add_document("Level1");
        let other = host.add_document("Level2");
        let stray = host.add_entity(other, "Stray");
        let doc_id = host.durable_id(&doc);

        let mut containers = ContainerTracker::new();
        containers.open_document(doc_id);

        let history = Resolver::ContainerScoped
            .placement(&host, &containers, &stray, Role::History)
            .unwrap();
        assert_eq!(history.scope, None);

        let pinned = Resolver::ContainerScoped
            .placement(&host, &containers, &stray, Role::Pinned)
            .unwrap();
        assert_eq!(pinned.scope, Some(Scope::Container(doc_id)));
    }
}
