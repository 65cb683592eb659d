/// In-memory query engine
///
/// `MemoryEngine` is a reference `QueryEngine` over rows held in a
/// `MemoryTable`. Compiling a view definition materializes the flattened pivot
/// tree eagerly; evaluating a window slices it.
///
/// # Tree layout
///
/// With `P` pivot columns, rows are emitted depth-first:
///
/// - depth 0: the root (only when `show_root` is set)
/// - depths 1..=P: one group row per distinct pivot value, numeric columns
///   summed over the group
/// - depth P+1: the base rows themselves
///
/// A node's children are emitted only when the node is expanded. The root is
/// always expanded when hidden. Siblings are ordered by the view's sort key,
/// then by group value. Every row carries `_depth`, `_pivot` (the group value,
/// or the leaf column value for base rows) and `_path0`..`_path{P-1}`.

use crate::column::{ColumnType, ColumnValue};
use crate::data_view::{RawTableData, Row};
use crate::engine::{EngineError, QueryEngine};
use crate::error::{Result, ViewSyncError};
use crate::schema::{path_column, Schema, DEPTH_COLUMN, PIVOT_COLUMN};
use crate::sort::compare_rows;
use crate::view_params::{Path, ViewParams};
use log::debug;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

/// Group label used for null pivot values
pub const NULL_GROUP: &str = "(null)";

/// A named, append-only set of rows
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    schema: Schema,
    rows: Vec<Row>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        MemoryTable {
            name: name.into(),
            schema,
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. Columns missing from `row` are stored as null.
    pub fn append_row(&mut self, row: Row) -> Result<()> {
        let row = self.normalize(row)?;
        self.rows.push(row);
        Ok(())
    }

    /// Append several rows; nothing is inserted if any row is invalid.
    pub fn append_rows(&mut self, rows: Vec<Row>) -> Result<usize> {
        let rows = rows
            .into_iter()
            .map(|row| self.normalize(row))
            .collect::<Result<Vec<_>>>()?;
        let count = rows.len();
        self.rows.extend(rows);
        Ok(count)
    }

    /// The base query the controller compiles views on top of
    pub fn base_query(&self) -> MemoryQuery {
        MemoryQuery {
            schema: self.schema.clone(),
            rows: Rc::new(self.rows.clone()),
        }
    }

    fn normalize(&self, mut row: Row) -> Result<Row> {
        if let Some(unknown) = row.keys().find(|k| self.schema.get_column_index(k).is_none()) {
            return Err(ViewSyncError::UnknownColumn {
                table: self.name.clone(),
                column: unknown.clone(),
            });
        }
        for name in self.schema.get_column_names() {
            row.entry(name.to_string()).or_insert(ColumnValue::Null);
        }
        Ok(row)
    }
}

/// A fully materialized result set
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    schema: Schema,
    rows: Rc<Vec<Row>>,
}

impl MemoryQuery {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

/// Query engine over `MemoryQuery` values.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    latency: Option<Duration>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        MemoryEngine { latency: None }
    }

    /// Delay every engine call by `latency`, simulating a remote engine
    pub fn with_latency(latency: Duration) -> Self {
        MemoryEngine {
            latency: Some(latency),
        }
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl QueryEngine for MemoryEngine {
    type Query = MemoryQuery;

    async fn compile_view(
        &self,
        base_query: &MemoryQuery,
        base_schema: &Schema,
        view_params: &ViewParams,
    ) -> Result<MemoryQuery, EngineError> {
        self.pause().await;

        let referenced = view_params
            .pivots()
            .iter()
            .map(String::as_str)
            .chain(view_params.pivot_leaf_column());
        for column in referenced {
            if base_schema.get_column_index(column).is_none() {
                return Err(EngineError::new(format!("unknown column '{column}'")));
            }
        }

        let rows = TreeBuilder::new(base_schema, view_params).build(base_query.rows());
        debug!(
            "compiled {} pivot levels over {} rows into {} tree rows",
            view_params.pivot_depth(),
            base_query.len(),
            rows.len()
        );

        Ok(MemoryQuery {
            schema: tree_schema(base_schema, view_params.pivot_depth()),
            rows: Rc::new(rows),
        })
    }

    async fn row_count(&self, query: &MemoryQuery) -> Result<usize, EngineError> {
        Ok(query.len())
    }

    async fn eval_query(
        &self,
        query: &MemoryQuery,
        offset: usize,
        limit: usize,
    ) -> Result<RawTableData, EngineError> {
        self.pause().await;

        let end = offset.saturating_add(limit).min(query.len());
        let start = offset.min(end);
        Ok(RawTableData {
            schema: query.schema.clone(),
            rows: query.rows[start..end].to_vec(),
        })
    }
}

/// Schema of compiled tree rows: base columns (nullable, numerics widened)
/// followed by `_depth`, `_pivot` and one path column per pivot level
pub fn tree_schema(base_schema: &Schema, pivot_depth: usize) -> Schema {
    let mut columns: Vec<(String, ColumnType, bool)> = base_schema
        .iter()
        .map(|(name, column_type, _)| (name.to_string(), widen_type(column_type), true))
        .collect();
    columns.push((DEPTH_COLUMN.to_string(), ColumnType::Int32, false));
    columns.push((PIVOT_COLUMN.to_string(), ColumnType::String, false));
    columns.extend((0..pivot_depth).map(|d| (path_column(d), ColumnType::String, false)));
    Schema::new(columns)
}

fn widen_type(column_type: ColumnType) -> ColumnType {
    match column_type {
        ColumnType::Int32 => ColumnType::Int64,
        ColumnType::Float32 => ColumnType::Float64,
        other => other,
    }
}

fn widen(value: &ColumnValue) -> ColumnValue {
    match value {
        ColumnValue::Int32(v) => ColumnValue::Int64(*v as i64),
        ColumnValue::Float32(v) => ColumnValue::Float64(*v as f64),
        other => other.clone(),
    }
}

fn group_key(value: Option<&ColumnValue>) -> String {
    match value {
        None | Some(ColumnValue::Null) => NULL_GROUP.to_string(),
        Some(value) => value.to_string(),
    }
}

struct TreeBuilder<'a> {
    schema: &'a Schema,
    view: &'a ViewParams,
    out: Vec<Row>,
}

impl<'a> TreeBuilder<'a> {
    fn new(schema: &'a Schema, view: &'a ViewParams) -> Self {
        TreeBuilder {
            schema,
            view,
            out: Vec::new(),
        }
    }

    fn build(mut self, rows: &[Row]) -> Vec<Row> {
        let members: Vec<&Row> = rows.iter().collect();
        let mut path = Path::new();

        if self.view.show_root() {
            let root = self.group_row(&members, &path, "");
            self.out.push(root);
        }
        if !self.view.show_root() || self.view.open_paths().is_open(&path) {
            self.children(&members, &mut path);
        }
        self.out
    }

    /// Emit the children of the node at `path`
    fn children(&mut self, members: &[&Row], path: &mut Path) {
        let level = path.len();
        let Some(column) = self.view.pivots().get(level) else {
            self.leaves(members, path);
            return;
        };

        let mut groups: BTreeMap<String, Vec<&Row>> = BTreeMap::new();
        for &row in members {
            groups.entry(group_key(row.get(column))).or_default().push(row);
        }

        let mut nodes: Vec<(String, Row, Vec<&Row>)> = groups
            .into_iter()
            .map(|(key, group)| {
                path.push(key.clone());
                let row = self.group_row(&group, path, &key);
                path.pop();
                (key, row, group)
            })
            .collect();
        nodes.sort_by(|a, b| compare_rows(&a.1, &b.1, self.view.sort_key()).then_with(|| a.0.cmp(&b.0)));

        for (key, row, group) in nodes {
            self.out.push(row);
            path.push(key);
            if self.view.open_paths().is_open(path) {
                self.children(&group, path);
            }
            path.pop();
        }
    }

    fn leaves(&mut self, members: &[&Row], path: &Path) {
        let mut leaves = members.to_vec();
        leaves.sort_by(|a, b| compare_rows(a, b, self.view.sort_key()));

        for leaf in leaves {
            let mut row: Row = leaf.iter().map(|(k, v)| (k.clone(), widen(v))).collect();
            let label = self
                .view
                .pivot_leaf_column()
                .and_then(|column| leaf.get(column))
                .filter(|value| !value.is_null())
                .map(|value| value.to_string())
                .unwrap_or_default();
            self.tag(&mut row, path.len() + 1, path, label);
            self.out.push(row);
        }
    }

    /// Aggregate row for a group: numeric columns summed, pivot columns on
    /// the group's path carried over, everything else null
    fn group_row(&self, members: &[&Row], path: &Path, label: &str) -> Row {
        let mut row = Row::new();
        for (name, column_type, _) in self.schema.iter() {
            let value = if column_type.is_numeric() {
                sum_column(members, name, column_type)
            } else {
                ColumnValue::Null
            };
            row.insert(name.to_string(), value);
        }
        for column in self.view.pivots().iter().take(path.len()) {
            if let Some(value) = members.first().and_then(|first| first.get(column)) {
                row.insert(column.clone(), widen(value));
            }
        }
        self.tag(&mut row, path.len(), path, label.to_string());
        row
    }

    fn tag(&self, row: &mut Row, depth: usize, path: &Path, label: String) {
        row.insert(DEPTH_COLUMN.to_string(), ColumnValue::Int32(depth as i32));
        row.insert(PIVOT_COLUMN.to_string(), ColumnValue::String(label));
        for d in 0..self.view.pivot_depth() {
            let segment = path.get(d).cloned().unwrap_or_default();
            row.insert(path_column(d), ColumnValue::String(segment));
        }
    }
}

fn sum_column(members: &[&Row], column: &str, column_type: ColumnType) -> ColumnValue {
    let values = members.iter().filter_map(|row| row.get(column));
    match column_type {
        ColumnType::Int32 | ColumnType::Int64 => {
            let total = values
                .filter_map(|v| match v {
                    ColumnValue::Int32(x) => Some(*x as i64),
                    ColumnValue::Int64(x) => Some(*x),
                    _ => None,
                })
                .sum();
            ColumnValue::Int64(total)
        }
        _ => ColumnValue::Float64(values.filter_map(|v| v.to_f64()).sum()),
    }
}
