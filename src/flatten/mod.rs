use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;

use crate::config::ExtractOptions;
use crate::error::{ExtractError, Result};
use crate::model::{FlatRow, RowLink, Scalar, Table, TableSet};

/// Column holding the row-local sequential identifier.
pub const INDEX_COLUMN: &str = "_index";
/// Column holding the `_index` of the parent row.
pub const PARENT_INDEX_COLUMN: &str = "_parent_index";
/// Column holding the name of the parent table.
pub const PARENT_TABLE_COLUMN: &str = "_parent_table";

/// Column used when a submission cannot be partitioned into fields at all
/// and is coerced to a single string cell instead.
const COERCED_COLUMN: &str = "value";

/// How a field name has been used within one table. A name must stay in one
/// role for the whole extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Column,
    Group,
}

/// Classification of one submission field value.
enum Classified<'v> {
    /// Scalar column cell, including serialized scalar arrays and empty
    /// objects.
    Cell(Scalar),
    /// Repeating group with the given elements.
    Group(Vec<&'v Value>),
    /// Empty repeating group: emits nothing and claims no field role.
    Empty,
}

fn classify(value: &Value) -> Classified<'_> {
    match value {
        Value::Array(items) if items.is_empty() => Classified::Empty,
        Value::Array(items) if items.iter().all(Value::is_object) => {
            Classified::Group(items.iter().collect())
        }
        // Scalar or mixed arrays are not repeating groups; a table built from
        // them would have no distinguishing columns.
        Value::Array(_) => Classified::Cell(Scalar::from_json(value)),
        Value::Object(map) if !map.is_empty() => Classified::Group(vec![value]),
        Value::Object(_) => Classified::Cell(Scalar::from_json(value)),
        other => Classified::Cell(Scalar::from_json(other)),
    }
}

/// KoboToolbox prefixes answers with their group path (`household/age`);
/// columns carry only the final segment. Synthetic `_`-prefixed columns are
/// kept verbatim.
fn clean_column(key: &str) -> &str {
    if key.starts_with('_') {
        key
    } else {
        key.rsplit('/').next().unwrap_or(key)
    }
}

/// Per-run flattening state: accumulated rows per table, the order tables
/// were first encountered in, and the monotonic `_index` counters shared by
/// every submission of the batch.
///
/// One `Flattener` corresponds to one extraction run. Feed it submissions in
/// sequence order via [`Flattener::flatten`], then materialise the result
/// with [`Flattener::into_tables`].
pub struct Flattener<'a> {
    options: &'a ExtractOptions,
    rows: HashMap<String, Vec<FlatRow>>,
    order: Vec<String>,
    counters: HashMap<String, usize>,
    kinds: HashMap<(String, String), FieldKind>,
}

impl<'a> Flattener<'a> {
    pub fn new(options: &'a ExtractOptions) -> Self {
        Self {
            options,
            rows: HashMap::new(),
            order: Vec::new(),
            counters: HashMap::new(),
            kinds: HashMap::new(),
        }
    }

    /// Flattens one submission into the root table and its nested tables.
    pub fn flatten(&mut self, submission: &Value) -> Result<()> {
        let root = self.options.root_table.clone();
        self.flatten_into(submission, &root, None)
    }

    fn flatten_into(&mut self, item: &Value, table: &str, parent: Option<RowLink>) -> Result<()> {
        let Some(object) = item.as_object() else {
            // A record that is not an object cannot be partitioned into
            // fields; coerce it to a single-cell row instead of failing the
            // batch.
            let mut row = self.new_row(table, parent);
            row.values
                .insert(COERCED_COLUMN.to_string(), Scalar::from_json(item));
            self.push_row(table, row);
            return Ok(());
        };

        let mut row = self.new_row(table, parent);
        let mut groups: Vec<(&str, Vec<&Value>)> = Vec::new();

        for (key, value) in object {
            if self.options.excluded_fields.iter().any(|field| field == key) {
                continue;
            }
            match classify(value) {
                Classified::Cell(cell) => {
                    self.record_kind(table, key, FieldKind::Column)?;
                    row.values.insert(clean_column(key).to_string(), cell);
                }
                Classified::Group(items) => {
                    self.record_kind(table, key, FieldKind::Group)?;
                    groups.push((key.as_str(), items));
                }
                Classified::Empty => {}
            }
        }

        // The parent row is emitted before its children so every child link
        // references a row that already exists in the parent table.
        let parent_index = row.index;
        self.push_row(table, row);

        for (key, items) in groups {
            let child_table = format!("{table}{}{key}", self.options.separator);
            for item in items {
                let link = RowLink {
                    table: table.to_string(),
                    index: parent_index,
                };
                self.flatten_into(item, &child_table, Some(link))?;
            }
        }

        Ok(())
    }

    fn new_row(&mut self, table: &str, parent: Option<RowLink>) -> FlatRow {
        let counter = self.counters.entry(table.to_string()).or_insert(0);
        let index = *counter;
        *counter += 1;
        FlatRow {
            index,
            parent,
            values: BTreeMap::new(),
        }
    }

    fn push_row(&mut self, table: &str, row: FlatRow) {
        if !self.rows.contains_key(table) {
            self.order.push(table.to_string());
        }
        self.rows.entry(table.to_string()).or_default().push(row);
    }

    fn record_kind(&mut self, table: &str, field: &str, kind: FieldKind) -> Result<()> {
        let key = (table.to_string(), field.to_string());
        match self.kinds.get(&key) {
            Some(existing) if *existing != kind => Err(ExtractError::NameCollision {
                table: table.to_string(),
                field: field.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.kinds.insert(key, kind);
                Ok(())
            }
        }
    }

    /// Materialises the accumulated rows into presentation-ordered tables:
    /// root first, then first-encounter order. Each table's column set is the
    /// union of keys seen across its rows; missing cells become
    /// [`Scalar::Null`].
    pub fn into_tables(mut self) -> TableSet {
        let root = self.options.root_table.clone();
        let order: Vec<String> = std::iter::once(root.clone())
            .chain(self.order.iter().filter(|name| **name != root).cloned())
            .collect();

        let mut tables = Vec::with_capacity(order.len());
        for name in order {
            if let Some(rows) = self.rows.remove(&name) {
                tables.push(build_table(name, rows));
            }
        }
        TableSet { tables }
    }
}

fn build_table(name: String, rows: Vec<FlatRow>) -> Table {
    let mut data_columns: BTreeSet<String> = BTreeSet::new();
    let mut linked = false;
    for row in &rows {
        data_columns.extend(row.values.keys().cloned());
        if row.parent.is_some() {
            linked = true;
        }
    }

    let meta_width = if linked { 3 } else { 1 };
    let mut columns = Vec::with_capacity(data_columns.len() + meta_width);
    columns.push(INDEX_COLUMN.to_string());
    if linked {
        columns.push(PARENT_TABLE_COLUMN.to_string());
        columns.push(PARENT_INDEX_COLUMN.to_string());
    }
    columns.extend(data_columns);

    let mut cells_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let mut cells = Vec::with_capacity(columns.len());
        cells.push(Scalar::Number(row.index as f64));
        if linked {
            match &row.parent {
                Some(link) => {
                    cells.push(Scalar::String(link.table.clone()));
                    cells.push(Scalar::Number(link.index as f64));
                }
                None => {
                    cells.push(Scalar::Null);
                    cells.push(Scalar::Null);
                }
            }
        }
        for column in columns.iter().skip(meta_width) {
            cells.push(row.values.get(column).cloned().unwrap_or(Scalar::Null));
        }
        cells_rows.push(cells);
    }

    Table {
        name,
        columns,
        rows: cells_rows,
    }
}

/// Flattens an ordered submission batch into one table set.
///
/// Returns `Ok(None)` for an empty batch so callers can distinguish "no data
/// to process" from a present-but-empty result. `_index` values stay
/// monotonic per table across the whole batch because every submission runs
/// through the same [`Flattener`] state.
pub fn assemble(submissions: &[Value], options: &ExtractOptions) -> Result<Option<TableSet>> {
    if submissions.is_empty() {
        return Ok(None);
    }
    let mut flattener = Flattener::new(options);
    for submission in submissions {
        flattener.flatten(submission)?;
    }
    Ok(Some(flattener.into_tables()))
}
