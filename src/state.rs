/// Shared application state
///
/// `AppState` is an immutable snapshot. Every change goes through a pure
/// `with_*` transition that returns a new snapshot, and the `StateStore` holds
/// the current one.
///
/// The store stamps each write with a monotonically increasing version and
/// notifies its change listeners after every write. Writers that computed a
/// new state from an older snapshot can use `commit` to have the write
/// rejected instead of silently overwriting newer data; `update` always
/// applies its transition to the latest snapshot.

use crate::data_view::{DataView, QueryView};
use crate::error::{Result, ViewSyncError};
use crate::paging::Viewport;
use crate::sort::SortKey;
use crate::timer::LoadingTimer;
use crate::view_params::{same_view, Path, ViewParams};
use log::trace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// State of the grid: its definition, viewport and loaded data
#[derive(Debug)]
pub struct ViewState<Q> {
    pub view_params: Rc<ViewParams>,
    pub viewport: Viewport,
    pub query_view: Option<Rc<QueryView<Q>>>,
    pub data_view: Option<Rc<DataView>>,
    pub loading_timer: Rc<LoadingTimer>,
    /// Set when the loading indicator fires, cleared when data arrives
    pub show_loading: bool,
}

// Manual impl: every field is cheap to clone regardless of Q
impl<Q> Clone for ViewState<Q> {
    fn clone(&self) -> Self {
        ViewState {
            view_params: Rc::clone(&self.view_params),
            viewport: self.viewport,
            query_view: self.query_view.clone(),
            data_view: self.data_view.clone(),
            loading_timer: Rc::clone(&self.loading_timer),
            show_loading: self.show_loading,
        }
    }
}

impl<Q> ViewState<Q> {
    pub fn new(view_params: ViewParams, viewport: Viewport) -> Self {
        ViewState {
            view_params: Rc::new(view_params),
            viewport,
            query_view: None,
            data_view: None,
            loading_timer: Rc::new(LoadingTimer::new()),
            show_loading: false,
        }
    }

    /// Install a new view definition (always a new identity)
    pub fn with_view_params(&self, view_params: ViewParams) -> Self {
        ViewState {
            view_params: Rc::new(view_params),
            ..self.clone()
        }
    }

    pub fn with_viewport(&self, viewport: Viewport) -> Self {
        ViewState {
            viewport,
            ..self.clone()
        }
    }

    /// Scroll so rows `[top, bottom)` are visible
    pub fn scroll_to(&self, top: usize, bottom: usize) -> Self {
        self.with_viewport(Viewport::new(top, bottom))
    }

    /// Install a freshly compiled query with the viewport clamped to it
    pub fn with_query_view(&self, query_view: Rc<QueryView<Q>>, viewport: Viewport) -> Self {
        ViewState {
            query_view: Some(query_view),
            viewport,
            ..self.clone()
        }
    }

    /// Install fetched rows; the loading indicator is hidden again
    pub fn with_data_view(&self, data_view: Rc<DataView>) -> Self {
        ViewState {
            data_view: Some(data_view),
            show_loading: false,
            ..self.clone()
        }
    }

    pub fn with_loading(&self, show_loading: bool) -> Self {
        ViewState {
            show_loading,
            ..self.clone()
        }
    }

    pub fn with_pivots(&self, pivots: Vec<String>) -> Self {
        self.with_view_params(self.view_params.as_ref().clone().with_pivots(pivots))
    }

    pub fn with_sort_key(&self, sort_key: Vec<SortKey>) -> Self {
        self.with_view_params(self.view_params.as_ref().clone().with_sort_key(sort_key))
    }

    pub fn with_show_root(&self, show_root: bool) -> Self {
        self.with_view_params(self.view_params.as_ref().clone().with_show_root(show_root))
    }

    /// Expand or collapse the tree node at `path`
    pub fn toggle_path(&self, path: Path) -> Self {
        self.with_view_params(self.view_params.as_ref().clone().toggle_path(path))
    }

    /// The loaded rows, but only if they belong to the current definition
    pub fn current_data_view(&self) -> Option<&Rc<DataView>> {
        self.data_view
            .as_ref()
            .filter(|data_view| same_view(data_view.view_params(), &self.view_params))
    }
}

/// Root of the shared state tree
#[derive(Debug)]
pub struct AppState<Q> {
    pub view_state: ViewState<Q>,
    /// Most recent pipeline failure; cleared when fresh rows arrive
    pub last_error: Option<ViewSyncError>,
}

impl<Q> Clone for AppState<Q> {
    fn clone(&self) -> Self {
        AppState {
            view_state: self.view_state.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

impl<Q> AppState<Q> {
    pub fn new(view_params: ViewParams, viewport: Viewport) -> Self {
        AppState {
            view_state: ViewState::new(view_params, viewport),
            last_error: None,
        }
    }

    pub fn with_view_state(&self, view_state: ViewState<Q>) -> Self {
        AppState {
            view_state,
            last_error: self.last_error.clone(),
        }
    }

    pub fn with_query_view(&self, query_view: Rc<QueryView<Q>>, viewport: Viewport) -> Self {
        self.with_view_state(self.view_state.with_query_view(query_view, viewport))
    }

    pub fn with_data_view(&self, data_view: Rc<DataView>) -> Self {
        AppState {
            view_state: self.view_state.with_data_view(data_view),
            last_error: None,
        }
    }

    pub fn with_loading(&self, show_loading: bool) -> Self {
        self.with_view_state(self.view_state.with_loading(show_loading))
    }

    pub fn with_error(&self, error: ViewSyncError) -> Self {
        AppState {
            view_state: self.view_state.with_loading(false),
            last_error: Some(error),
        }
    }
}

/// A state value together with the version it was written at
pub struct Snapshot<Q> {
    pub version: u64,
    pub state: Rc<AppState<Q>>,
}

impl<Q> Clone for Snapshot<Q> {
    fn clone(&self) -> Self {
        Snapshot {
            version: self.version,
            state: Rc::clone(&self.state),
        }
    }
}

impl<Q> fmt::Debug for Snapshot<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Handle returned by `on_change`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<Q> = Rc<dyn Fn(&StateStore<Q>)>;

struct StoreInner<Q> {
    current: RefCell<Snapshot<Q>>,
    listeners: RefCell<Vec<(ListenerId, Listener<Q>)>>,
    next_listener: Cell<u64>,
}

/// Observable container for the current `AppState`.
///
/// Cloning the store clones the handle; all clones share one state.
pub struct StateStore<Q> {
    inner: Rc<StoreInner<Q>>,
}

impl<Q> Clone for StateStore<Q> {
    fn clone(&self) -> Self {
        StateStore {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<Q> fmt::Debug for StateStore<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("version", &self.version())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

impl<Q> StateStore<Q> {
    pub fn new(state: AppState<Q>) -> Self {
        StateStore {
            inner: Rc::new(StoreInner {
                current: RefCell::new(Snapshot {
                    version: 0,
                    state: Rc::new(state),
                }),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    /// Current state
    pub fn get_value(&self) -> Rc<AppState<Q>> {
        Rc::clone(&self.inner.current.borrow().state)
    }

    /// Current state with its version stamp
    pub fn snapshot(&self) -> Snapshot<Q> {
        self.inner.current.borrow().clone()
    }

    pub fn version(&self) -> u64 {
        self.inner.current.borrow().version
    }

    /// Unconditional write (last writer wins). Returns the new version.
    pub fn set_value(&self, state: AppState<Q>) -> u64 {
        let version = {
            let mut current = self.inner.current.borrow_mut();
            let version = current.version + 1;
            *current = Snapshot {
                version,
                state: Rc::new(state),
            };
            version
        };
        trace!("state store at version {version}");
        self.notify();
        version
    }

    /// Write `state` only if nothing was written since `base_version`.
    pub fn commit(&self, base_version: u64, state: AppState<Q>) -> Result<u64> {
        let current = self.version();
        if base_version != current {
            return Err(ViewSyncError::StaleSnapshot {
                found: base_version,
                current,
            });
        }
        Ok(self.set_value(state))
    }

    /// Apply a pure transition to the latest state and write the result.
    pub fn update<F>(&self, transition: F) -> u64
    where
        F: FnOnce(&AppState<Q>) -> AppState<Q>,
    {
        let next = transition(&self.get_value());
        self.set_value(next)
    }

    /// Register `listener` to run after every write.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StateStore<Q>) + 'static,
    {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        id
    }

    /// Returns true if the listener was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn notify(&self) {
        // Listeners may write to the store or subscribe; call them on a copy
        let listeners: Vec<Listener<Q>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StateStore<()> {
        StateStore::new(AppState::new(ViewParams::new(), Viewport::new(0, 20)))
    }

    #[test]
    fn test_versions_increase() {
        let store = store();
        assert_eq!(store.version(), 0);
        let v1 = store.update(|s| s.with_loading(true));
        let v2 = store.update(|s| s.with_loading(false));
        assert_eq!((v1, v2), (1, 2));
        assert!(!store.get_value().view_state.show_loading);
    }

    #[test]
    fn test_commit_rejects_stale_snapshot() {
        let store = store();
        let snapshot = store.snapshot();

        store.update(|s| s.with_view_state(s.view_state.scroll_to(40, 60)));

        let stale = snapshot.state.with_loading(true);
        let err = store.commit(snapshot.version, stale).unwrap_err();
        assert_eq!(err, ViewSyncError::StaleSnapshot { found: 0, current: 1 });
        assert_eq!(store.get_value().view_state.viewport, Viewport::new(40, 60));

        let fresh = store.snapshot();
        let version = store
            .commit(fresh.version, fresh.state.with_loading(true))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn test_listeners_notified_and_removed() {
        let store = store();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        let id = store.on_change(move |s| log.borrow_mut().push(s.version()));

        store.update(|s| s.with_loading(true));
        store.update(|s| s.with_loading(false));
        assert!(store.remove_listener(id));
        assert!(!store.remove_listener(id));
        store.update(|s| s.with_loading(true));

        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_listener_may_write() {
        let store = store();
        store.on_change(|s| {
            if s.get_value().view_state.show_loading {
                s.update(|state| state.with_loading(false));
            }
        });

        store.update(|s| s.with_loading(true));
        assert!(!store.get_value().view_state.show_loading);
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_view_transitions_change_identity() {
        let state: ViewState<()> = ViewState::new(ViewParams::new(), Viewport::default());
        let pivoted = state.with_pivots(vec!["region".to_string()]);
        let toggled = pivoted.toggle_path(vec!["West".to_string()]);

        assert!(!same_view(&state.view_params, &pivoted.view_params));
        assert!(!same_view(&pivoted.view_params, &toggled.view_params));
        assert!(toggled.view_params.open_paths().is_open(&["West".to_string()]));

        // non-definition transitions keep the identity
        let scrolled = toggled.scroll_to(10, 30);
        assert!(same_view(&toggled.view_params, &scrolled.view_params));
        assert!(Rc::ptr_eq(&toggled.loading_timer, &scrolled.loading_timer));
    }
}
