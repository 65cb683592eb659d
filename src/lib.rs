/// GridSync - Windowed Pivot View Reconciliation
///
/// Keeps a scrolling, pivoted tree grid in step with an asynchronous query
/// engine. A `ViewController` observes a `StateStore`; when the view definition
/// changes it compiles a new query, and when the viewport leaves the loaded
/// window it fetches a new one. Results that were superseded while in flight
/// are discarded, and a debounced `LoadingTimer` reveals a loading indicator
/// only for slow round-trips.
///
/// `MemoryEngine` is an in-memory `QueryEngine` that materializes pivot trees
/// from a `MemoryTable`, useful for demos and tests.

pub mod column;
pub mod schema;
pub mod sort;
pub mod view_params;
pub mod paging;
pub mod data_view;
pub mod engine;
pub mod timer;
pub mod state;
pub mod controller;
pub mod config;
pub mod error;
pub mod memory;

pub use column::{ColumnType, ColumnValue};
pub use schema::Schema;
pub use sort::{SortKey, SortOrder};
pub use view_params::{same_view, Path, PathSet, ViewParams};
pub use paging::{clamp_viewport, FetchWindow, MarginPaging, PagingPolicy, Viewport};
pub use data_view::{annotate_tree, DataView, QueryView, RawTableData, Row};
pub use engine::{compile_query_view, fetch_data_view, EngineError, QueryEngine};
pub use timer::{LoadingTimer, TimerState};
pub use state::{AppState, ListenerId, Snapshot, StateStore, ViewState};
pub use controller::{RequestTicket, ViewController};
pub use config::ControllerConfig;
pub use error::{Result, ViewSyncError};
pub use memory::{MemoryEngine, MemoryQuery, MemoryTable};
