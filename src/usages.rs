//! Asynchronous "what references this item" lookups for a dependency view.
//!
//! Searches run as local tasks on the UI thread. A new search is only
//! issued when the target changed or was invalidated; in-flight searches are
//! never cancelled, and whichever completes last overwrites the result.

use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    rc::{Rc, Weak},
};

use tokio::task::JoinHandle;

/// Search handed back by a [`UsageFinder`]. Owns everything it needs, so it
/// can outlive both the finder and the target it was asked about.
pub type UsageFuture<H> = Pin<Box<dyn Future<Output = Vec<H>>>>;

/// External collaborator that finds the items referencing a target
pub trait UsageFinder<H> {
    fn find_usages(&self, target: &H) -> UsageFuture<H>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus<H> {
    /// No target, or nothing requested yet
    Idle,
    /// A search is in flight and no result for the current target exists
    Running,
    Ready(Vec<H>),
}

#[derive(Debug)]
struct SearchState<H> {
    target: Option<H>,
    search_again: bool,
    in_flight: usize,
    completed: Option<(H, Vec<H>)>,
}

#[derive(Debug)]
pub struct UsageSearch<H> {
    state: Rc<RefCell<SearchState<H>>>,
}

impl<H: Clone + PartialEq + 'static> Default for UsageSearch<H> {
    fn default() -> Self {
        UsageSearch {
            state: Rc::new(RefCell::new(SearchState {
                target: None,
                search_again: false,
                in_flight: 0,
                completed: None,
            })),
        }
    }
}

impl<H: Clone + PartialEq + 'static> UsageSearch<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<H> {
        self.state.borrow().target.clone()
    }

    /// Point the view at another item. Setting the same target again does
    /// not schedule a new search.
    pub fn set_target(&self, target: Option<H>) {
        let mut state = self.state.borrow_mut();
        if state.target == target {
            return;
        }
        state.search_again = target.is_some();
        state.target = target;
    }

    /// Schedule a new search for the current target, e.g. after the project
    /// changed
    pub fn invalidate(&self) {
        let mut state = self.state.borrow_mut();
        state.search_again = state.target.is_some();
    }

    pub fn needs_search(&self) -> bool {
        self.state.borrow().search_again
    }

    /// Issue a search if one is due. The returned future records its result
    /// when it completes; the caller decides where it runs.
    pub fn request<F>(&self, finder: &F) -> Option<impl Future<Output = ()> + 'static>
    where
        F: UsageFinder<H> + 'static,
    {
        let target = {
            let mut state = self.state.borrow_mut();
            if !state.search_again {
                return None;
            }
            let target = state.target.clone()?;
            state.search_again = false;
            state.in_flight += 1;
            target
        };

        tracing::debug!("searching usages");
        let search = finder.find_usages(&target);
        let state: Weak<RefCell<SearchState<H>>> = Rc::downgrade(&self.state);
        Some(async move {
            let usages = search.await;
            if let Some(state) = state.upgrade() {
                let mut state = state.borrow_mut();
                state.in_flight -= 1;
                state.completed = Some((target, usages));
            }
        })
    }

    /// [`request`](Self::request) and spawn the search on the current
    /// `LocalSet`
    pub fn spawn<F>(&self, finder: &F) -> Option<JoinHandle<()>>
    where
        F: UsageFinder<H> + 'static,
    {
        self.request(finder).map(tokio::task::spawn_local)
    }

    /// Result for the current target. Results that arrive for an older
    /// target are ignored here.
    pub fn status(&self) -> SearchStatus<H> {
        let state = self.state.borrow();
        let Some(target) = state.target.as_ref() else {
            return SearchStatus::Idle;
        };
        match &state.completed {
            Some((searched, usages)) if searched == target => SearchStatus::Ready(usages.clone()),
            _ if state.in_flight > 0 => SearchStatus::Running,
            _ => SearchStatus::Idle,
        }
    }
}
