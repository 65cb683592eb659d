/// Schema definitions and the synthetic tree columns
///
/// The query engine describes its result columns with a `Schema`. When a window
/// of rows is materialized into a `DataView`, four synthetic columns are appended
/// (`_id`, `_parentId`, `_isOpen`, `_isLeaf`) so the grid can draw the pivot tree
/// without knowing anything about the engine.
///
/// # Examples
///
/// ```
/// use gridsync::{Schema, ColumnType};
///
/// let schema = Schema::new(vec![
///     ("region".to_string(), ColumnType::String, false),
///     ("sales".to_string(), ColumnType::Float64, true),
/// ]);
///
/// let tree = schema.with_tree_columns();
/// assert_eq!(tree.len(), 6);
/// assert_eq!(tree.get_column_index("_isLeaf"), Some(5));
/// ```

use crate::column::ColumnType;

/// Tree depth of a row, supplied by the engine
pub const DEPTH_COLUMN: &str = "_depth";
/// Display label of a pivot-tree node, supplied by the engine
pub const PIVOT_COLUMN: &str = "_pivot";
/// Position of the row within its window
pub const ID_COLUMN: &str = "_id";
/// `_id` of the nearest preceding row one level up, or null
pub const PARENT_ID_COLUMN: &str = "_parentId";
/// Whether the row's path is expanded
pub const IS_OPEN_COLUMN: &str = "_isOpen";
/// Whether the row lies below the last pivot level
pub const IS_LEAF_COLUMN: &str = "_isLeaf";

/// Name of the path column for a pivot depth (`_path0`, `_path1`, ...)
pub fn path_column(depth: usize) -> String {
    format!("_path{}", depth)
}

/// Schema definition with column names and types.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    columns: Vec<(String, ColumnType, bool)>, // (name, type, nullable)
}

impl Schema {
    /// Creates a new schema with the specified columns.
    ///
    /// # Arguments
    ///
    /// * `columns` - Vector of tuples: (column_name, column_type, is_nullable)
    pub fn new(columns: Vec<(String, ColumnType, bool)>) -> Self {
        Schema { columns }
    }

    /// Returns the number of columns in the schema.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns a list of all column names.
    pub fn get_column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _, _)| name.as_str()).collect()
    }

    /// Returns the index of a column by name, or None if not found.
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _, _)| n == name)
    }

    /// Returns the type of a column by name, or None if not found.
    pub fn get_column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, ty, _)| *ty)
    }

    /// Returns whether a column is nullable by name, or None if not found.
    pub fn is_column_nullable(&self, name: &str) -> Option<bool> {
        self.columns
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, _, nullable)| *nullable)
    }

    /// Iterates over (name, type, nullable) triples in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType, bool)> + '_ {
        self.columns
            .iter()
            .map(|(name, ty, nullable)| (name.as_str(), *ty, *nullable))
    }

    /// Returns a copy of this schema with one more column.
    ///
    /// A column that already exists keeps its original position and type.
    pub fn with_column(&self, name: &str, column_type: ColumnType, nullable: bool) -> Self {
        let mut columns = self.columns.clone();
        if self.get_column_index(name).is_none() {
            columns.push((name.to_string(), column_type, nullable));
        }
        Schema { columns }
    }

    /// Returns this schema extended with the four synthetic tree columns.
    pub fn with_tree_columns(&self) -> Self {
        self.with_column(ID_COLUMN, ColumnType::Int64, false)
            .with_column(PARENT_ID_COLUMN, ColumnType::Int64, true)
            .with_column(IS_OPEN_COLUMN, ColumnType::Bool, false)
            .with_column(IS_LEAF_COLUMN, ColumnType::Bool, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_columns_appended_once() {
        let schema = Schema::new(vec![("a".to_string(), ColumnType::Int32, false)]);
        let tree = schema.with_tree_columns().with_tree_columns();

        assert_eq!(
            tree.get_column_names(),
            vec!["a", "_id", "_parentId", "_isOpen", "_isLeaf"]
        );
        assert_eq!(tree.is_column_nullable(PARENT_ID_COLUMN), Some(true));
        assert_eq!(tree.get_column_type(IS_OPEN_COLUMN), Some(ColumnType::Bool));
    }

    #[test]
    fn test_path_column_names() {
        assert_eq!(path_column(0), "_path0");
        assert_eq!(path_column(3), "_path3");
    }
}
