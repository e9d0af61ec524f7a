use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Represents a scalar cell value in a flattened table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum Scalar {
    /// Plain string literal.
    String(String),
    /// Floating point number literal.
    Number(f64),
    /// Boolean literal.
    Boolean(bool),
    /// Explicit JSON `null` or a cell missing from a row.
    Null,
}

impl Scalar {
    /// Converts a JSON value into a cell. Scalars map directly; arrays and
    /// objects that must become a single cell are stored as their compact
    /// JSON serialization, and numbers outside the `f64` range degrade to
    /// their string form rather than failing the record.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(value) => Scalar::Boolean(*value),
            Value::Number(number) => match number.as_f64() {
                Some(value) => Scalar::Number(value),
                None => Scalar::String(number.to_string()),
            },
            Value::String(value) => Scalar::String(value.clone()),
            other => match serde_json::to_string(other) {
                Ok(serialized) => Scalar::String(serialized),
                Err(_) => Scalar::Null,
            },
        }
    }

}

/// Link from a child row back to the parent row it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLink {
    /// Name of the parent table.
    pub table: String,
    /// `_index` of the parent row within that table.
    pub index: usize,
}

/// One flattened record belonging to exactly one named table.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    /// Row-local identifier, assigned sequentially per table across the
    /// whole extraction run.
    pub index: usize,
    /// Present on every non-root row; references a row already emitted in
    /// the parent table.
    pub parent: Option<RowLink>,
    /// Column name to cell value. Columns may vary row to row; the union of
    /// keys determines the table's effective schema on assembly.
    pub values: BTreeMap<String, Scalar>,
}

/// A table that will be materialised as one spreadsheet sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    /// Cells aligned to `columns`; missing values are [`Scalar::Null`].
    pub rows: Vec<Vec<Scalar>>,
}

impl Table {
    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Cell addressed by row number and column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Scalar> {
        let column = self.column_index(column)?;
        self.rows.get(row)?.get(column)
    }
}

/// All tables assembled from one submission batch, in presentation order:
/// the root table first, the remaining tables in the order they were first
/// encountered during flattening.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSet {
    pub tables: Vec<Table>,
}

impl TableSet {
    /// Looks a table up by name.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Table names in presentation order.
    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(|table| table.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
