/// Query engine interface
///
/// The controller never compiles or evaluates queries itself. It drives a
/// `QueryEngine` through two pipeline stages:
///
/// 1. compile: `ViewParams` -> `QueryView` (compiled query + row count)
/// 2. fetch: `QueryView` + `FetchWindow` -> `DataView`
///
/// Engine futures are polled on a single-threaded `LocalSet`, so they need not
/// be `Send`. The engine value itself plays the role of the connection.

use crate::data_view::{DataView, QueryView, RawTableData};
use crate::error::{Result, ViewSyncError};
use crate::paging::FetchWindow;
use crate::schema::Schema;
use crate::view_params::ViewParams;
use std::rc::Rc;

/// Failure reported by a query engine
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        EngineError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for EngineError {
    fn from(message: String) -> Self {
        EngineError::new(message)
    }
}

/// Upstream query engine.
#[allow(async_fn_in_trait)]
pub trait QueryEngine {
    /// Compiled query; opaque to the controller
    type Query: Clone + std::fmt::Debug + 'static;

    /// Build the pivot-tree query for `view_params` on top of `base_query`
    async fn compile_view(
        &self,
        base_query: &Self::Query,
        base_schema: &Schema,
        view_params: &ViewParams,
    ) -> Result<Self::Query, EngineError>;

    /// Total rows `query` produces
    async fn row_count(&self, query: &Self::Query) -> Result<usize, EngineError>;

    /// Evaluate rows `[offset, offset + limit)` of `query`.
    ///
    /// Rows must carry `_depth` and one `_path{d}` column per pivot level.
    async fn eval_query(
        &self,
        query: &Self::Query,
        offset: usize,
        limit: usize,
    ) -> Result<RawTableData, EngineError>;
}

/// Compile stage: compile `view_params` and count its rows.
pub async fn compile_query_view<E: QueryEngine>(
    engine: &E,
    base_query: &E::Query,
    base_schema: &Schema,
    view_params: Rc<ViewParams>,
) -> Result<QueryView<E::Query>> {
    let query = engine
        .compile_view(base_query, base_schema, &view_params)
        .await
        .map_err(ViewSyncError::Compile)?;
    let row_count = engine
        .row_count(&query)
        .await
        .map_err(ViewSyncError::Compile)?;

    Ok(QueryView {
        query,
        row_count,
        view_params,
    })
}

/// Fetch stage: evaluate `window` of `query_view` and annotate the tree.
pub async fn fetch_data_view<E: QueryEngine>(
    engine: &E,
    query_view: &QueryView<E::Query>,
    window: FetchWindow,
) -> Result<DataView> {
    let raw = engine
        .eval_query(&query_view.query, window.offset, window.limit)
        .await
        .map_err(|source| ViewSyncError::Fetch {
            offset: window.offset,
            limit: window.limit,
            source,
        })?;

    DataView::from_raw(query_view, window.offset, raw)
}
