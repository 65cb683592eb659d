/// View definitions
///
/// A `ViewParams` describes how the grid presents the base query: which columns
/// are pivoted (in order), which column labels leaf rows, whether the root
/// node is shown, the sort order, and which tree nodes are expanded.
///
/// `ViewParams` values are never mutated in place. Every transition consumes or
/// borrows the current value and returns a new one, and the shared state wraps
/// each value in its own `Rc`. The controller compares definitions by `Rc`
/// identity (`same_view`), so two structurally equal definitions built
/// separately still count as a change.
///
/// # Examples
///
/// ```
/// use gridsync::{ViewParams, SortKey};
///
/// let params = ViewParams::new()
///     .with_pivots(vec!["region".to_string()])
///     .with_sort_key(vec![SortKey::descending("sales")])
///     .open_path(vec!["West".to_string()]);
///
/// assert_eq!(params.pivot_depth(), 1);
/// assert!(params.open_paths().is_open(&["West".to_string()]));
/// ```

use crate::sort::SortKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::rc::Rc;

/// Ordered pivot-level values identifying a tree node. The root is `[]`.
pub type Path = Vec<String>;

/// The set of expanded tree paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathSet {
    paths: BTreeSet<Path>,
}

impl PathSet {
    pub fn new() -> Self {
        PathSet::default()
    }

    /// Returns true if `path` is expanded
    pub fn is_open(&self, path: &[String]) -> bool {
        self.paths.contains(path)
    }

    /// Returns a copy with `path` expanded
    pub fn open(&self, path: Path) -> Self {
        let mut paths = self.paths.clone();
        paths.insert(path);
        PathSet { paths }
    }

    /// Returns a copy with `path` and every path below it collapsed
    pub fn close(&self, path: &[String]) -> Self {
        let paths = self
            .paths
            .iter()
            .filter(|p| !p.starts_with(path))
            .cloned()
            .collect();
        PathSet { paths }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter()
    }
}

impl FromIterator<Path> for PathSet {
    fn from_iter<I: IntoIterator<Item = Path>>(iter: I) -> Self {
        PathSet {
            paths: iter.into_iter().collect(),
        }
    }
}

/// Immutable description of the current pivot/sort/expansion configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParams {
    pivots: Vec<String>,
    pivot_leaf_column: Option<String>,
    show_root: bool,
    sort_key: Vec<SortKey>,
    open_paths: PathSet,
}

impl ViewParams {
    /// A flat view: no pivots, no sort, root hidden.
    pub fn new() -> Self {
        ViewParams::default()
    }

    pub fn pivots(&self) -> &[String] {
        &self.pivots
    }

    /// Number of pivot levels; rows deeper than this are leaves
    pub fn pivot_depth(&self) -> usize {
        self.pivots.len()
    }

    pub fn pivot_leaf_column(&self) -> Option<&str> {
        self.pivot_leaf_column.as_deref()
    }

    pub fn show_root(&self) -> bool {
        self.show_root
    }

    pub fn sort_key(&self) -> &[SortKey] {
        &self.sort_key
    }

    pub fn open_paths(&self) -> &PathSet {
        &self.open_paths
    }

    /// Returns true if a row at `depth` lies below the last pivot level
    pub fn is_leaf_depth(&self, depth: usize) -> bool {
        depth > self.pivot_depth()
    }

    /// Replace the pivot columns. Expanded paths are reset since they name
    /// values of the old pivot columns.
    pub fn with_pivots(self, pivots: Vec<String>) -> Self {
        ViewParams {
            pivots,
            open_paths: PathSet::new(),
            ..self
        }
    }

    pub fn with_pivot_leaf_column(self, column: Option<String>) -> Self {
        ViewParams {
            pivot_leaf_column: column,
            ..self
        }
    }

    pub fn with_show_root(self, show_root: bool) -> Self {
        ViewParams { show_root, ..self }
    }

    pub fn with_sort_key(self, sort_key: Vec<SortKey>) -> Self {
        ViewParams { sort_key, ..self }
    }

    pub fn with_open_paths(self, open_paths: PathSet) -> Self {
        ViewParams { open_paths, ..self }
    }

    pub fn open_path(self, path: Path) -> Self {
        let open_paths = self.open_paths.open(path);
        ViewParams { open_paths, ..self }
    }

    pub fn close_path(self, path: &[String]) -> Self {
        let open_paths = self.open_paths.close(path);
        ViewParams { open_paths, ..self }
    }

    /// Expand `path` if collapsed, collapse it (and its descendants) if expanded
    pub fn toggle_path(self, path: Path) -> Self {
        if self.open_paths.is_open(&path) {
            self.close_path(&path)
        } else {
            self.open_path(path)
        }
    }
}

/// Identity comparison used to detect view definition changes
pub fn same_view(a: &Rc<ViewParams>, b: &Rc<ViewParams>) -> bool {
    Rc::ptr_eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> Path {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_close_path_collapses_descendants() {
        let set = PathSet::new()
            .open(path(&["West"]))
            .open(path(&["West", "Seattle"]))
            .open(path(&["East"]));

        let closed = set.close(&path(&["West"]));
        assert_eq!(closed.len(), 1);
        assert!(closed.is_open(&path(&["East"])));
        assert!(!closed.is_open(&path(&["West", "Seattle"])));
        // the original is untouched
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_with_pivots_resets_open_paths() {
        let params = ViewParams::new()
            .with_pivots(vec!["region".to_string()])
            .open_path(path(&["West"]))
            .with_pivots(vec!["region".to_string(), "city".to_string()]);

        assert_eq!(params.pivot_depth(), 2);
        assert!(params.open_paths().is_empty());
    }

    #[test]
    fn test_toggle_path() {
        let params = ViewParams::new().with_pivots(vec!["region".to_string()]);
        let opened = params.toggle_path(path(&["West"]));
        assert!(opened.open_paths().is_open(&path(&["West"])));
        let closed = opened.toggle_path(path(&["West"]));
        assert!(closed.open_paths().is_empty());
    }

    #[test]
    fn test_identity_not_structure() {
        let a = Rc::new(ViewParams::new());
        let b = Rc::new(ViewParams::new());
        assert_eq!(*a, *b);
        assert!(!same_view(&a, &b));
        assert!(same_view(&a, &Rc::clone(&a)));
    }

    #[test]
    fn test_leaf_depth() {
        let params = ViewParams::new().with_pivots(vec!["region".to_string()]);
        assert!(!params.is_leaf_depth(0));
        assert!(!params.is_leaf_depth(1));
        assert!(params.is_leaf_depth(2));
    }

    #[test]
    fn test_serde_defaults() {
        let params: ViewParams =
            serde_json::from_str(r#"{"pivots":["region"],"open_paths":[["West"]]}"#).unwrap();
        assert_eq!(params.pivots(), &["region".to_string()]);
        assert!(params.open_paths().is_open(&path(&["West"])));
        assert!(!params.show_root());
    }
}
