/// Query handles and windowed row sets
///
/// Compiling a `ViewParams` yields a `QueryView`: the engine's compiled query
/// plus the total number of rows it produces. Evaluating a window of that query
/// yields a `DataView`, an offset-addressed slice of rows annotated with the
/// synthetic tree columns the grid needs to draw the pivot tree.
///
/// # Tree metadata
///
/// Rows arrive in tree order with an engine-supplied `_depth` and one
/// `_path{d}` column per pivot level. For each row, in fetch order:
///
/// - `_id` is its position within the window
/// - `_parentId` is the `_id` of the most recent row one level up, or null at
///   depth 0 (or when no such row is inside the window)
/// - `_isOpen` is whether its path is in the view's expanded set
/// - `_isLeaf` is whether its depth exceeds the number of pivot levels

use crate::column::ColumnValue;
use crate::error::{Result, ViewSyncError};
use crate::paging::FetchWindow;
use crate::schema::{
    path_column, Schema, DEPTH_COLUMN, ID_COLUMN, IS_LEAF_COLUMN, IS_OPEN_COLUMN, PARENT_ID_COLUMN,
};
use crate::view_params::{Path, ViewParams};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::rc::Rc;

/// One row, keyed by column name
pub type Row = HashMap<String, ColumnValue>;

/// A compiled query and the number of rows it produces.
#[derive(Debug, Clone)]
pub struct QueryView<Q> {
    /// Engine-specific compiled query
    pub query: Q,
    pub row_count: usize,
    /// The definition this query was compiled from
    pub view_params: Rc<ViewParams>,
}

/// Rows as returned by the engine, before tree annotation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTableData {
    pub schema: Schema,
    pub rows: Vec<Row>,
}

/// A materialized window of rows for one `QueryView`.
///
/// Row indices passed to the accessors are absolute (relative to the whole
/// query), not relative to the window.
#[derive(Debug, Clone, PartialEq)]
pub struct DataView {
    view_params: Rc<ViewParams>,
    schema: Schema,
    row_count: usize,
    offset: usize,
    rows: Vec<Row>,
}

impl DataView {
    /// Annotate a fetched window with tree metadata.
    ///
    /// Fails with `MissingDepth` if a row has no integer `_depth`, and with
    /// `InvalidDepth` if it lies below the leaf level.
    pub fn from_raw<Q>(query_view: &QueryView<Q>, offset: usize, raw: RawTableData) -> Result<Self> {
        let RawTableData { schema, mut rows } = raw;
        annotate_tree(&query_view.view_params, &mut rows)?;

        Ok(DataView {
            view_params: Rc::clone(&query_view.view_params),
            schema: schema.with_tree_columns(),
            row_count: query_view.row_count,
            offset,
            rows,
        })
    }

    /// The definition these rows were produced for
    pub fn view_params(&self) -> &Rc<ViewParams> {
        &self.view_params
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Total rows of the owning query, not just this window
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// One past the last loaded row
    pub fn end(&self) -> usize {
        self.offset + self.rows.len()
    }

    /// Number of rows loaded in this window
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The window this view was loaded for, trimmed to the rows that exist
    pub fn window(&self) -> FetchWindow {
        FetchWindow::new(self.offset, self.rows.len())
    }

    /// Returns true if absolute row `index` is loaded
    pub fn contains_row(&self, index: usize) -> bool {
        index >= self.offset && index < self.end()
    }

    /// Get a loaded row by absolute index
    pub fn get_row(&self, index: usize) -> Option<&Row> {
        index
            .checked_sub(self.offset)
            .and_then(|local| self.rows.get(local))
    }

    /// Get a loaded value by absolute row index
    pub fn get_value(&self, index: usize, column: &str) -> Option<&ColumnValue> {
        self.get_row(index).and_then(|row| row.get(column))
    }

    /// Column names and JSON row objects, for handing to a rendering layer
    pub fn to_json(&self) -> (Vec<String>, Vec<Map<String, JsonValue>>) {
        let columns: Vec<String> = self
            .schema
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, JsonValue>>()
            })
            .collect();

        (columns, rows)
    }
}

/// Path of a row: the non-empty `_path{d}` values for `d` in `0..pivot_depth`
pub fn row_path(row: &Row, pivot_depth: usize) -> Path {
    (0..pivot_depth)
        .filter_map(|depth| row.get(&path_column(depth)))
        .filter_map(|value| value.as_string())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Add `_id`, `_parentId`, `_isOpen` and `_isLeaf` to every row of a window.
pub fn annotate_tree(view_params: &ViewParams, rows: &mut [Row]) -> Result<()> {
    let pivot_depth = view_params.pivot_depth();
    // leaves sit one level below the last pivot
    let max_depth = pivot_depth + 1;
    // last_seen[d] is the _id of the most recent row at depth d
    let mut last_seen: Vec<Option<i64>> = Vec::new();

    for (index, row) in rows.iter_mut().enumerate() {
        let depth = row
            .get(DEPTH_COLUMN)
            .and_then(ColumnValue::as_index)
            .ok_or(ViewSyncError::MissingDepth { index })?;
        if depth > max_depth {
            return Err(ViewSyncError::InvalidDepth {
                index,
                depth,
                max: max_depth,
            });
        }

        let id = index as i64;
        let parent_id = match depth {
            0 => None,
            d => last_seen.get(d - 1).copied().flatten(),
        };
        if last_seen.len() <= depth {
            last_seen.resize(depth + 1, None);
        }
        last_seen[depth] = Some(id);

        let path = row_path(row, pivot_depth);
        let is_open = view_params.open_paths().is_open(&path);
        let is_leaf = view_params.is_leaf_depth(depth);

        row.insert(ID_COLUMN.to_string(), ColumnValue::Int64(id));
        row.insert(
            PARENT_ID_COLUMN.to_string(),
            parent_id.map_or(ColumnValue::Null, ColumnValue::Int64),
        );
        row.insert(IS_OPEN_COLUMN.to_string(), ColumnValue::Bool(is_open));
        row.insert(IS_LEAF_COLUMN.to_string(), ColumnValue::Bool(is_leaf));
    }

    Ok(())
}
