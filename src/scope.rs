use std::{fmt, str::FromStr};

use crate::{
    error::Error,
    events::{EventSource, Subscription},
    identifier::DurableId,
};

const PROJECT_KEY: &str = "project";

/// Persistence key that a list entry is recorded under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// One list for the whole project (asset-scoped surfaces)
    Project,
    /// Per container, keyed by the container's own durable id
    Container(DurableId),
}

impl Scope {
    pub fn key(&self) -> String {
        match self {
            Scope::Project => PROJECT_KEY.to_string(),
            Scope::Container(id) => id.encode(),
        }
    }

    pub fn parse_key(key: &str) -> Result<Self, Error> {
        if key == PROJECT_KEY {
            return Ok(Scope::Project);
        }
        Ok(Scope::Container(DurableId::parse(key)?))
    }

    pub fn container(&self) -> Option<&DurableId> {
        match self {
            Scope::Project => None,
            Scope::Container(id) => Some(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::parse_key(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Document,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerEvent {
    Opened {
        container: DurableId,
        kind: ContainerKind,
    },
    /// Sent before the container goes away. For templates,
    /// `reload_documents` is set when no other template replaces it and
    /// editing returns to the open documents.
    Closing {
        container: DurableId,
        kind: ContainerKind,
        reload_documents: bool,
    },
    /// One template replaced another without returning to the documents
    Swapped { old: DurableId, new: DurableId },
}

/// Tracks which containers are open and which one scopes new insertions.
///
/// At most one template is edited at a time; while it is, it takes
/// precedence over the open documents.
#[derive(Debug, Default)]
pub struct ContainerTracker {
    documents: Vec<DurableId>,
    active_document: Option<DurableId>,
    template: Option<DurableId>,
    events: EventSource<ContainerEvent>,
}

impl ContainerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription<ContainerEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventSource<ContainerEvent> {
        &self.events
    }

    /// Container that scopes new history and pin insertions
    pub fn current_container(&self) -> Option<DurableId> {
        self.template.or(self.active_document)
    }

    pub fn active_template(&self) -> Option<DurableId> {
        self.template
    }

    pub fn active_document(&self) -> Option<DurableId> {
        self.active_document
    }

    pub fn open_documents(&self) -> &[DurableId] {
        &self.documents
    }

    pub fn is_document_open(&self, document: &DurableId) -> bool {
        self.documents.contains(document)
    }

    pub fn open_document(&mut self, document: DurableId) {
        if self.is_document_open(&document) {
            return;
        }
        tracing::debug!("document opened: {}", document);
        self.documents.push(document);
        if self.active_document.is_none() {
            self.active_document = Some(document);
        }
        self.events.emit(ContainerEvent::Opened {
            container: document,
            kind: ContainerKind::Document,
        });
    }

    pub fn close_document(&mut self, document: DurableId) {
        if !self.is_document_open(&document) {
            return;
        }
        tracing::debug!("document closing: {}", document);
        self.events.emit(ContainerEvent::Closing {
            container: document,
            kind: ContainerKind::Document,
            reload_documents: false,
        });
        self.documents.retain(|d| *d != document);
        if self.active_document == Some(document) {
            self.active_document = self.documents.last().copied();
        }
    }

    /// Make an already open document the target of unscoped pins
    pub fn set_active_document(&mut self, document: DurableId) -> bool {
        if !self.is_document_open(&document) {
            return false;
        }
        self.active_document = Some(document);
        true
    }

    pub fn open_template(&mut self, template: DurableId) {
        match self.template.replace(template) {
            Some(old) if old == template => {}
            Some(old) => {
                tracing::debug!("template swapped: {} -> {}", old, template);
                self.events.emit(ContainerEvent::Swapped { old, new: template });
            }
            None => {
                tracing::debug!("template opened: {}", template);
                self.events.emit(ContainerEvent::Opened {
                    container: template,
                    kind: ContainerKind::Template,
                });
            }
        }
    }

    /// Close a template. When it was already replaced by another template
    /// the event says so and documents are not reloaded.
    pub fn close_template(&mut self, template: DurableId) {
        let returning_to_documents = self.template == Some(template);
        if returning_to_documents {
            self.template = None;
        }
        tracing::debug!(
            "template closing: {} (returning to documents: {})",
            template,
            returning_to_documents
        );
        self.events.emit(ContainerEvent::Closing {
            container: template,
            kind: ContainerKind::Template,
            reload_documents: returning_to_documents,
        });
    }
}
