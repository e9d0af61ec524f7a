use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};

use crate::error::{ExtractError, Result};

/// One sheet read back from an exported workbook: its name, header row, and
/// data rows rendered as strings.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Reads every sheet of a workbook in sheet order.
///
/// This is the counterpart of
/// [`excel_write::write_workbook`](crate::io::excel_write::write_workbook):
/// the round-trip tests and the CLI `inspect` command use it to recover the
/// exported table names and row counts.
pub fn read_workbook(path: &Path) -> Result<Vec<SheetData>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let names: Vec<String> = workbook.sheet_names().to_vec();

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .ok_or_else(|| ExtractError::InvalidWorkbook(format!("missing sheet '{name}'")))?
            .map_err(ExtractError::from)?;

        let mut rows = range.rows();
        let columns = match rows.next() {
            Some(header) => header.iter().map(|cell| cell_to_string(Some(cell))).collect(),
            None => Vec::new(),
        };
        let rows = rows
            .map(|row| row.iter().map(|cell| cell_to_string(Some(cell))).collect())
            .collect();

        sheets.push(SheetData {
            name,
            columns,
            rows,
        });
    }

    Ok(sheets)
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
