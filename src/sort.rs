/// Sort keys for pivot views
///
/// A view definition carries an ordered list of `SortKey`s. The first key is
/// primary; later keys break ties. Engines use `compare_rows` to order the
/// siblings of every pivot-tree node.

use crate::column::ColumnValue;
use crate::data_view::Row;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort order specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order (smallest first)
    Ascending,
    /// Descending order (largest first)
    Descending,
}

/// A single sort key specifying a column and order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    /// Column name to sort by
    pub column: String,
    /// Sort order (ascending or descending)
    pub order: SortOrder,
    /// Whether NULL values should be placed first or last
    #[serde(default)]
    pub nulls_first: bool,
}

impl SortKey {
    /// Create a new sort key with ascending order (nulls last)
    pub fn ascending(column: impl Into<String>) -> Self {
        SortKey {
            column: column.into(),
            order: SortOrder::Ascending,
            nulls_first: false,
        }
    }

    /// Create a new sort key with descending order (nulls last)
    pub fn descending(column: impl Into<String>) -> Self {
        SortKey {
            column: column.into(),
            order: SortOrder::Descending,
            nulls_first: false,
        }
    }

    /// Create a new sort key with custom options
    pub fn new(column: impl Into<String>, order: SortOrder, nulls_first: bool) -> Self {
        SortKey {
            column: column.into(),
            order,
            nulls_first,
        }
    }
}

/// Compare two column values according to a sort key.
///
/// A missing value sorts like NULL. NULL placement is not affected by the
/// sort order.
pub fn compare_values(a: Option<&ColumnValue>, b: Option<&ColumnValue>, key: &SortKey) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => {
            return if key.nulls_first {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        (Some(_), None) => {
            return if key.nulls_first {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        (Some(a), Some(b)) => (a, b),
    };

    let base_cmp = match (a, b) {
        (ColumnValue::Int32(a), ColumnValue::Int32(b)) => a.cmp(b),
        (ColumnValue::Int64(a), ColumnValue::Int64(b)) => a.cmp(b),
        (ColumnValue::String(a), ColumnValue::String(b)) => a.cmp(b),
        (ColumnValue::Bool(a), ColumnValue::Bool(b)) => a.cmp(b),
        // Mixed numeric widths (e.g. a summed Int64 against an Int32 leaf) compare as f64
        (a, b) => match (a.to_f64(), b.to_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => format!("{:?}", a).cmp(&format!("{:?}", b)),
        },
    };

    match key.order {
        SortOrder::Ascending => base_cmp,
        SortOrder::Descending => base_cmp.reverse(),
    }
}

/// Compare two rows key by key; the first non-equal key decides.
pub fn compare_rows(a: &Row, b: &Row, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let cmp = compare_values(a.get(&key.column), b.get(&key.column), key);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(score: ColumnValue, name: &str) -> Row {
        let mut row = HashMap::new();
        row.insert("score".to_string(), score);
        row.insert("name".to_string(), ColumnValue::String(name.to_string()));
        row
    }

    #[test]
    fn test_nulls_placement() {
        let null = ColumnValue::Null;
        let one = ColumnValue::Int32(1);

        let last = SortKey::descending("score");
        assert_eq!(compare_values(Some(&null), Some(&one), &last), Ordering::Greater);

        let first = SortKey::new("score", SortOrder::Descending, true);
        assert_eq!(compare_values(Some(&null), Some(&one), &first), Ordering::Less);
        assert_eq!(compare_values(None, Some(&null), &first), Ordering::Equal);
    }

    #[test]
    fn test_compare_rows_tie_break() {
        let keys = vec![SortKey::descending("score"), SortKey::ascending("name")];
        let mut rows = vec![
            row(ColumnValue::Int32(5), "bob"),
            row(ColumnValue::Int32(9), "carol"),
            row(ColumnValue::Int32(5), "alice"),
        ];
        rows.sort_by(|a, b| compare_rows(a, b, &keys));

        let names: Vec<&str> = rows
            .iter()
            .map(|r| r.get("name").and_then(|v| v.as_string()).unwrap())
            .collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn test_mixed_numeric_widths() {
        let key = SortKey::ascending("v");
        let small = ColumnValue::Int32(3);
        let big = ColumnValue::Int64(10);
        assert_eq!(compare_values(Some(&small), Some(&big), &key), Ordering::Less);
    }

    #[test]
    fn test_sort_key_serde() {
        let key: SortKey = serde_json::from_str(r#"{"column":"sales","order":"descending"}"#).unwrap();
        assert_eq!(key, SortKey::descending("sales"));
    }
}
