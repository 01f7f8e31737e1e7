//! Single-threaded event sources with explicit registration objects.
//!
//! Subscribing returns a [`Subscription`]; events queue up in it until the
//! owner drains them on its own update pass. Dropping the subscription
//! unregisters it, on every exit path.

use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Identifies one registration on an [`EventSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

struct Listeners<T> {
    next_id: usize,
    senders: Vec<(ListenerId, UnboundedSender<T>)>,
}

pub struct EventSource<T> {
    listeners: Rc<RefCell<Listeners<T>>>,
}

impl<T> Default for EventSource<T> {
    fn default() -> Self {
        EventSource {
            listeners: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                senders: Vec::new(),
            })),
        }
    }
}

impl<T> fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<T: Clone> EventSource<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut listeners = self.listeners.borrow_mut();
        let id = ListenerId(listeners.next_id);
        listeners.next_id += 1;
        listeners.senders.push((id, sender));

        Subscription {
            id,
            receiver,
            source: Rc::downgrade(&self.listeners),
        }
    }

    /// Queue an event for every registered listener
    pub fn emit(&self, event: T) {
        self.listeners
            .borrow_mut()
            .senders
            .retain(|(_, sender)| sender.send(event.clone()).is_ok());
    }
}

impl<T> EventSource<T> {
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().senders.len()
    }
}

/// Registration returned by [`EventSource::subscribe`]
pub struct Subscription<T> {
    id: ListenerId,
    receiver: UnboundedReceiver<T>,
    source: Weak<RefCell<Listeners<T>>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Whether this registration belongs to `source`
    pub fn is_from(&self, source: &EventSource<T>) -> bool {
        Weak::ptr_eq(&self.source, &Rc::downgrade(&source.listeners))
    }

    /// Take every queued event, oldest first
    pub fn drain(&mut self) -> Vec<T> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(listeners) = self.source.upgrade() {
            listeners
                .borrow_mut()
                .senders
                .retain(|(id, _)| *id != self.id);
        }
    }
}
