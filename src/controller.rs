/// Reconciliation controller
///
/// `ViewController` watches a `StateStore` and keeps the loaded rows in step with
/// two inputs that change independently: the view definition and the viewport.
///
/// On every change notification it decides between three outcomes:
///
/// - the view definition changed (by identity): compile a new query, then fetch
///   the rows for the current viewport once the compile resolves
/// - the viewport left the most recently requested window: fetch a new window
///   against the already compiled query
/// - otherwise: nothing
///
/// # Request tracking
///
/// Compiles and fetches cannot be cancelled, so each one is issued with a
/// `RequestTicket`. Issuing a newer request of the same stage abandons the
/// older ticket, and a compile also abandons the in-flight fetch. Results whose
/// ticket was abandoned are dropped on arrival, so an old response resolving
/// late can never overwrite a newer one.
///
/// # Threading
///
/// Pipeline stages run as `spawn_local` tasks; the controller must be driven
/// from inside a `tokio::task::LocalSet`.

use crate::config::ControllerConfig;
use crate::data_view::{DataView, QueryView};
use crate::engine::{compile_query_view, fetch_data_view, QueryEngine};
use crate::error::{Result, ViewSyncError};
use crate::paging::{FetchWindow, PagingPolicy, Viewport};
use crate::schema::Schema;
use crate::state::{ListenerId, StateStore};
use crate::view_params::{same_view, ViewParams};
use log::{debug, error, trace};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Identifies one issued compile or fetch.
///
/// A ticket is abandoned, never cancelled: the request still runs to
/// completion but its result is ignored.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    id: u64,
    abandoned: Rc<Cell<bool>>,
}

impl RequestTicket {
    fn new(id: u64) -> Self {
        RequestTicket {
            id,
            abandoned: Rc::new(Cell::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn abandon(&self) {
        self.abandoned.set(true);
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Compile,
    Fetch,
}

/// Controller-owned bookkeeping; never shared with other writers
struct RequestTracker<Q> {
    last_view: Option<Rc<ViewParams>>,
    compile: Option<RequestTicket>,
    fetch: Option<RequestTicket>,
    /// Resolved query for `last_view`
    query_view: Option<Rc<QueryView<Q>>>,
    /// Window of the most recently issued fetch
    fetch_window: Option<FetchWindow>,
    next_id: u64,
}

impl<Q> RequestTracker<Q> {
    fn new() -> Self {
        RequestTracker {
            last_view: None,
            compile: None,
            fetch: None,
            query_view: None,
            fetch_window: None,
            next_id: 0,
        }
    }

    fn slot(&mut self, stage: Stage) -> &mut Option<RequestTicket> {
        match stage {
            Stage::Compile => &mut self.compile,
            Stage::Fetch => &mut self.fetch,
        }
    }

    /// Issue a ticket for `stage`, abandoning the one it supersedes
    fn issue(&mut self, stage: Stage) -> RequestTicket {
        self.next_id += 1;
        let ticket = RequestTicket::new(self.next_id);
        if let Some(previous) = self.slot(stage).replace(ticket.clone()) {
            previous.abandon();
        }
        ticket
    }

    /// Clear the in-flight slot if `ticket` still occupies it
    fn settle(&mut self, stage: Stage, ticket: &RequestTicket) {
        let slot = self.slot(stage);
        if slot.as_ref().is_some_and(|current| current.id == ticket.id) {
            *slot = None;
        }
    }
}

pub struct ViewController<E: QueryEngine> {
    engine: E,
    base_query: E::Query,
    base_schema: Schema,
    paging: Box<dyn PagingPolicy>,
    config: ControllerConfig,
    requests: RefCell<RequestTracker<E::Query>>,
}

impl<E: QueryEngine + 'static> ViewController<E> {
    /// Create a controller paging with `config.paging()`.
    pub fn new(engine: E, base_query: E::Query, base_schema: Schema, config: ControllerConfig) -> Rc<Self> {
        let paging = config.paging();
        Self::with_paging(engine, base_query, base_schema, config, paging)
    }

    /// Create a controller with a custom paging policy.
    pub fn with_paging<P>(
        engine: E,
        base_query: E::Query,
        base_schema: Schema,
        config: ControllerConfig,
        paging: P,
    ) -> Rc<Self>
    where
        P: PagingPolicy + 'static,
    {
        Rc::new(ViewController {
            engine,
            base_query,
            base_schema,
            paging: Box::new(paging),
            config,
            requests: RefCell::new(RequestTracker::new()),
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The resolved query for the current view definition, if any
    pub fn query_view(&self) -> Option<Rc<QueryView<E::Query>>> {
        self.requests.borrow().query_view.clone()
    }

    /// Window of the most recently issued fetch
    pub fn fetch_window(&self) -> Option<FetchWindow> {
        self.requests.borrow().fetch_window
    }

    /// Id of the compile still awaited, if any
    pub fn pending_compile(&self) -> Option<u64> {
        self.requests.borrow().compile.as_ref().map(RequestTicket::id)
    }

    /// Id of the fetch still awaited, if any
    pub fn pending_fetch(&self) -> Option<u64> {
        self.requests.borrow().fetch.as_ref().map(RequestTicket::id)
    }

    /// Subscribe to `store` and reconcile once against its current state.
    ///
    /// The subscription holds only a weak reference to the controller.
    pub fn initialize(self: &Rc<Self>, store: &StateStore<E::Query>) -> ListenerId {
        let controller = Rc::downgrade(self);
        let listener = store.on_change(move |store| {
            if let Some(controller) = controller.upgrade() {
                controller.on_state_change(store);
            }
        });
        self.on_state_change(store);
        listener
    }

    /// Reconcile the tracked requests against the store's current state.
    pub fn on_state_change(self: &Rc<Self>, store: &StateStore<E::Query>) {
        let state = store.get_value();
        let view_state = &state.view_state;

        let view_changed = match &self.requests.borrow().last_view {
            Some(last) => !same_view(last, &view_state.view_params),
            None => true,
        };
        if view_changed {
            self.start_compile(store, Rc::clone(&view_state.view_params));
            return;
        }

        let viewport = view_state.viewport;
        let stale = {
            let requests = self.requests.borrow();
            let covered = requests
                .fetch_window
                .is_some_and(|window| self.paging.contains(window, viewport));
            if covered {
                None
            } else {
                requests.query_view.clone()
            }
        };

        match stale {
            Some(query_view) => self.request_data(store, query_view),
            None => trace!("viewport {}..{} needs no fetch", viewport.top, viewport.bottom),
        }
    }

    /// Fetch the window around the store's current viewport for `query_view`.
    pub fn request_data(self: &Rc<Self>, store: &StateStore<E::Query>, query_view: Rc<QueryView<E::Query>>) {
        let viewport = store.get_value().view_state.viewport;
        self.start_loading_timer(store);
        self.issue_fetch(store, query_view, viewport);
    }

    fn start_compile(self: &Rc<Self>, store: &StateStore<E::Query>, view_params: Rc<ViewParams>) {
        let ticket = {
            let mut requests = self.requests.borrow_mut();
            requests.last_view = Some(Rc::clone(&view_params));
            requests.query_view = None;
            requests.fetch_window = None;
            // rows for the superseded definition must never land
            if let Some(fetch) = requests.fetch.take() {
                fetch.abandon();
            }
            requests.issue(Stage::Compile)
        };
        debug!(
            "compile #{} issued (pivots {:?}, {} open paths)",
            ticket.id(),
            view_params.pivots(),
            view_params.open_paths().len()
        );

        let controller = Rc::clone(self);
        let task_store = store.clone();
        tokio::task::spawn_local(async move {
            let result = compile_query_view(
                &controller.engine,
                &controller.base_query,
                &controller.base_schema,
                view_params,
            )
            .await;
            controller.finish_compile(&task_store, ticket, result);
        });

        self.start_loading_timer(store);
    }

    fn finish_compile(
        self: &Rc<Self>,
        store: &StateStore<E::Query>,
        ticket: RequestTicket,
        result: Result<QueryView<E::Query>>,
    ) {
        if ticket.is_abandoned() {
            debug!("compile #{} superseded, result discarded", ticket.id());
            return;
        }
        self.requests.borrow_mut().settle(Stage::Compile, &ticket);

        let query_view = match result {
            Ok(query_view) => Rc::new(query_view),
            Err(err) => {
                self.fail(store, err);
                return;
            }
        };
        debug!("compile #{} resolved: {} rows", ticket.id(), query_view.row_count);

        self.requests.borrow_mut().query_view = Some(Rc::clone(&query_view));
        let viewport = self
            .paging
            .clamp_viewport(query_view.row_count, store.get_value().view_state.viewport);

        // Record the window before the store write so the change notification
        // it triggers finds the clamped viewport already covered.
        self.issue_fetch(store, Rc::clone(&query_view), viewport);
        store.update(|state| state.with_query_view(query_view, viewport));
    }

    fn issue_fetch(
        self: &Rc<Self>,
        store: &StateStore<E::Query>,
        query_view: Rc<QueryView<E::Query>>,
        viewport: Viewport,
    ) {
        let window = self.paging.fetch_window(viewport);
        let ticket = {
            let mut requests = self.requests.borrow_mut();
            requests.fetch_window = Some(window);
            requests.issue(Stage::Fetch)
        };
        debug!(
            "fetch #{} issued for rows {}..{} (viewport {}..{})",
            ticket.id(),
            window.offset,
            window.end(),
            viewport.top,
            viewport.bottom
        );

        let controller = Rc::clone(self);
        let store = store.clone();
        tokio::task::spawn_local(async move {
            let result = fetch_data_view(&controller.engine, &query_view, window).await;
            controller.finish_fetch(&store, ticket, result);
        });
    }

    fn finish_fetch(&self, store: &StateStore<E::Query>, ticket: RequestTicket, result: Result<DataView>) {
        if ticket.is_abandoned() {
            debug!("fetch #{} superseded, rows discarded", ticket.id());
            return;
        }
        self.requests.borrow_mut().settle(Stage::Fetch, &ticket);

        match result {
            Ok(data_view) => {
                debug!(
                    "fetch #{} resolved: {} rows at offset {}",
                    ticket.id(),
                    data_view.len(),
                    data_view.offset()
                );
                store.get_value().view_state.loading_timer.stop();
                store.update(|state| state.with_data_view(Rc::new(data_view)));
            }
            Err(err) => self.fail(store, err),
        }
    }

    fn fail(&self, store: &StateStore<E::Query>, err: ViewSyncError) {
        error!("{err}");
        store.get_value().view_state.loading_timer.stop();
        store.update(|state| state.with_error(err));
    }

    fn start_loading_timer(&self, store: &StateStore<E::Query>) {
        let timer = Rc::clone(&store.get_value().view_state.loading_timer);
        let notify = store.clone();
        timer.start(self.config.loading_delay(), move || {
            notify.update(|state| state.with_loading(true));
        });
    }
}
