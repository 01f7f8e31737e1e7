//! One UI panel: a store, its preference namespace and its event wiring.

use std::fmt::Debug;

use anyhow::Result;

use crate::{
    config::ShelfConfig,
    error::Error,
    events::{EventSource, Subscription},
    host::EntityHost,
    identifier::{DurableId, Resolver},
    persistence::{Namespace, PersistenceIndex, PreferenceStore},
    reorder::reorder,
    scope::{ContainerEvent, ContainerKind, ContainerTracker, Scope},
    store::{capacity_for_area, HistoryStore, World},
};

pub struct HistorySurface<H, P> {
    prefs: P,
    store: HistoryStore<H>,
    selection: Option<Subscription<Vec<H>>>,
    lifecycle: Option<Subscription<ContainerEvent>>,
}

impl<H, P> HistorySurface<H, P>
where
    H: Clone + PartialEq + Debug,
    P: PreferenceStore,
{
    /// Open the surface's index from `prefs`
    pub fn new(resolver: Resolver, prefs: P, namespace: Namespace, capacity: usize) -> Result<Self> {
        let index = PersistenceIndex::open(&prefs, namespace)?;
        Ok(HistorySurface {
            prefs,
            store: HistoryStore::new(resolver, capacity, index),
            selection: None,
            lifecycle: None,
        })
    }

    /// Namespace and initial capacity taken from the configuration
    pub fn from_config(resolver: Resolver, prefs: P, config: &ShelfConfig) -> Result<Self> {
        let namespace = config.namespace(resolver.surface_name());
        Self::new(resolver, prefs, namespace, config.default_capacity)
    }

    pub fn store(&self) -> &HistoryStore<H> {
        &self.store
    }

    pub fn prefs(&self) -> &P {
        &self.prefs
    }

    /// Subscribe to selection and container events. Calling it again
    /// replaces the previous registrations, so events are never delivered
    /// twice.
    pub fn attach(&mut self, selection: &EventSource<Vec<H>>, tracker: &ContainerTracker) {
        if !self
            .selection
            .as_ref()
            .is_some_and(|s| s.is_from(selection))
        {
            self.selection = Some(selection.subscribe());
        }
        if !self
            .lifecycle
            .as_ref()
            .is_some_and(|s| s.is_from(tracker.events()))
        {
            self.lifecycle = Some(tracker.subscribe());
        }
    }

    pub fn detach(&mut self) {
        self.selection = None;
        self.lifecycle = None;
    }

    pub fn is_attached(&self) -> bool {
        self.selection.is_some() || self.lifecycle.is_some()
    }

    /// Apply every queued container event, then every queued selection
    pub fn pump<E: EntityHost<Handle = H>>(&mut self, world: World<'_, E>) -> Result<()> {
        let events = self
            .lifecycle
            .as_mut()
            .map(Subscription::drain)
            .unwrap_or_default();
        for event in &events {
            self.on_container_event(world, event)?;
        }

        let selections = self
            .selection
            .as_mut()
            .map(Subscription::drain)
            .unwrap_or_default();
        for handles in &selections {
            self.on_selection(world, handles);
        }
        Ok(())
    }

    /// Selected handles this surface tracks go to the front of the history
    pub fn on_selection<E: EntityHost<Handle = H>>(&mut self, world: World<'_, E>, handles: &[H]) {
        let resolver = self.store.resolver();
        for handle in handles.iter().filter(|h| resolver.tracks(world.host, h)) {
            self.store.add_history(world, handle);
        }
    }

    /// Freshly imported assets count as used
    pub fn on_imported<E: EntityHost<Handle = H>>(&mut self, world: World<'_, E>, handles: &[H]) {
        if self.store.resolver() != Resolver::AssetScoped {
            return;
        }
        self.on_selection(world, handles);
    }

    pub fn on_container_event<E: EntityHost<Handle = H>>(
        &mut self,
        world: World<'_, E>,
        event: &ContainerEvent,
    ) -> Result<()> {
        match self.store.resolver() {
            Resolver::AssetScoped => {
                if let ContainerEvent::Opened {
                    container,
                    kind: ContainerKind::Document,
                } = event
                {
                    if let Some(document) = world.host.resolve(container) {
                        self.store.add_history(world, &document);
                    }
                }
                Ok(())
            }
            Resolver::ContainerScoped => self.on_scoped_event(world, event),
        }
    }

    fn on_scoped_event<E: EntityHost<Handle = H>>(
        &mut self,
        world: World<'_, E>,
        event: &ContainerEvent,
    ) -> Result<()> {
        match *event {
            ContainerEvent::Opened {
                container,
                kind: ContainerKind::Template,
            } => {
                self.enter_template(world, container)?;
            }
            ContainerEvent::Swapped { new, .. } => {
                self.enter_template(world, new)?;
            }
            ContainerEvent::Closing {
                kind: ContainerKind::Template,
                reload_documents,
                ..
            } => {
                self.store.prune(world.host);
                self.store.flush(&self.prefs)?;
                if reload_documents {
                    self.store.unload_lists();
                    self.restore_documents(world)?;
                }
            }
            ContainerEvent::Opened {
                container,
                kind: ContainerKind::Document,
            } => {
                if world.containers.active_template().is_none()
                    && world.containers.is_document_open(&container)
                {
                    self.restore_document(world, &container)?;
                }
            }
            ContainerEvent::Closing {
                container,
                kind: ContainerKind::Document,
                ..
            } => {
                let scope = Scope::Container(container);
                if self.store.index().is_dirty(&scope) {
                    self.store.flush_scope(&self.prefs, &scope)?;
                }
            }
        }
        Ok(())
    }

    fn enter_template<E: EntityHost<Handle = H>>(
        &mut self,
        world: World<'_, E>,
        template: DurableId,
    ) -> Result<()> {
        self.store.prune(world.host);
        self.store.flush(&self.prefs)?;
        self.store.unload_lists();
        self.store.restore_scope(
            world,
            &self.prefs,
            Scope::Container(template),
            Some(&template),
            true,
        )?;
        Ok(())
    }

    /// Load a document's own scope, plus whatever was recorded inside the
    /// templates it holds instances of
    fn restore_document<E: EntityHost<Handle = H>>(
        &mut self,
        world: World<'_, E>,
        document: &DurableId,
    ) -> Result<usize> {
        let mut restored = self.store.restore_scope(
            world,
            &self.prefs,
            Scope::Container(*document),
            Some(document),
            true,
        )?;

        for template in world.host.instantiated_templates(document) {
            let scope = Scope::Container(template);
            if self.store.index().contains(&scope) {
                restored +=
                    self.store
                        .restore_scope(world, &self.prefs, scope, Some(document), false)?;
            }
        }
        Ok(restored)
    }

    fn restore_documents<E: EntityHost<Handle = H>>(&mut self, world: World<'_, E>) -> Result<usize> {
        let mut restored = 0;
        for document in world.containers.open_documents() {
            restored += self.restore_document(world, document)?;
        }
        Ok(restored)
    }

    /// Initial load for whatever is open right now
    pub fn restore<E: EntityHost<Handle = H>>(&mut self, world: World<'_, E>) -> Result<usize> {
        match self.store.resolver() {
            Resolver::AssetScoped => {
                self.store
                    .restore_scope(world, &self.prefs, Scope::Project, None, true)
            }
            Resolver::ContainerScoped => match world.containers.active_template() {
                Some(template) => self.store.restore_scope(
                    world,
                    &self.prefs,
                    Scope::Container(template),
                    Some(&template),
                    true,
                ),
                None => self.restore_documents(world),
            },
        }
    }

    pub fn pin<E: EntityHost<Handle = H>>(
        &mut self,
        world: World<'_, E>,
        handle: &H,
        index: Option<usize>,
    ) {
        self.store.add_pinned(world, handle, index);
    }

    /// Pin every selected handle this surface tracks, in selection order
    pub fn pin_selection<E: EntityHost<Handle = H>>(&mut self, world: World<'_, E>, handles: &[H]) {
        let resolver = self.store.resolver();
        for handle in handles.iter().filter(|h| resolver.tracks(world.host, h)) {
            self.store.add_pinned(world, handle, None);
        }
    }

    pub fn unpin(&mut self, handle: &H) -> bool {
        self.store.remove_pinned(handle)
    }

    /// Remove from both lists
    pub fn remove(&mut self, handle: &H) -> bool {
        let pinned = self.store.remove_pinned(handle);
        let recent = self.store.remove_history(handle);
        pinned || recent
    }

    pub fn reorder<E: EntityHost<Handle = H>>(
        &mut self,
        world: World<'_, E>,
        dragged: &[H],
        target: usize,
    ) -> Result<Vec<H>, Error> {
        reorder(&mut self.store, world, dragged, target)
    }

    pub fn clear_history(&mut self) {
        self.store.clear_history();
    }

    pub fn clear_pinned(&mut self) {
        self.store.clear_pinned();
    }

    pub fn clear_all(&mut self) {
        self.store.clear_all();
    }

    /// Forget every scope of this surface, including containers not open
    pub fn forget_everything(&mut self) -> Result<()> {
        self.store.clear_index(&self.prefs)
    }

    pub fn set_capacity<E: EntityHost<Handle = H>>(&mut self, host: &E, capacity: usize) {
        self.store.set_capacity(host, capacity);
    }

    /// Resize the list area, deriving the capacity from the layout settings
    pub fn resize<E: EntityHost<Handle = H>>(
        &mut self,
        host: &E,
        width: f32,
        height: f32,
        config: &ShelfConfig,
    ) {
        let capacity = capacity_for_area(width, height, config.row_height, config.min_column_width);
        self.set_capacity(host, capacity);
    }

    /// Prune, then derive the list to show
    pub fn displayed<E: EntityHost<Handle = H>>(&mut self, host: &E) -> Vec<H> {
        self.store.prune(host);
        self.store.derive_displayed(host)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush(&self.prefs)
    }

    /// Final write before the surface goes away
    pub fn shutdown<E: EntityHost<Handle = H>>(&mut self, host: &E) -> Result<()> {
        self.detach();
        self.store.prune(host);
        self.store.flush(&self.prefs)
    }
}
