use std::collections::HashSet;
use std::path::Path;

use rust_xlsxwriter::Workbook;
use tracing::debug;

use crate::config::ExtractOptions;
use crate::error::Result;
use crate::model::{Scalar, TableSet};

/// Writes one sheet per table to the given path.
///
/// Tables arrive in presentation order (root first, then discovery order) and
/// sheets are created in that same order. Sheet names are the table names
/// sanitized for Excel and truncated to the configured maximum length;
/// clashes after truncation are resolved with a `_N` suffix.
pub fn write_workbook(path: &Path, tables: &TableSet, options: &ExtractOptions) -> Result<()> {
    let mut workbook = Workbook::new();
    let mut sheet_names = SheetNameRegistry::new(options.max_sheet_name_len);

    for table in &tables.tables {
        let sheet_name = sheet_names.assign(&table.name);
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet_name)?;

        for (col_idx, header) in table.columns.iter().enumerate() {
            worksheet.write_string(0, col_idx as u16, header)?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                let row_idx = (row_idx + 1) as u32;
                let col_idx = col_idx as u16;
                match cell {
                    Scalar::String(value) => {
                        worksheet.write_string(row_idx, col_idx, value)?;
                    }
                    Scalar::Number(value) => {
                        worksheet.write_number(row_idx, col_idx, *value)?;
                    }
                    Scalar::Boolean(value) => {
                        worksheet.write_boolean(row_idx, col_idx, *value)?;
                    }
                    Scalar::Null => {
                        worksheet.write_string(row_idx, col_idx, &options.null_marker)?;
                    }
                }
            }
        }

        if !table.rows.is_empty() {
            let mut excel_table = rust_xlsxwriter::Table::new();
            excel_table.set_autofilter(true);
            let col_end = (table.columns.len() as u16).saturating_sub(1);
            worksheet.add_table(0, 0, table.rows.len() as u32, col_end, &excel_table)?;
        }

        debug!(
            table = %table.name,
            sheet = %sheet_name,
            rows = table.rows.len(),
            "sheet written"
        );
    }

    workbook.save(path)?;
    Ok(())
}

/// Hands out unique, sanitized sheet names within one workbook.
struct SheetNameRegistry {
    used: HashSet<String>,
    max_len: usize,
}

impl SheetNameRegistry {
    fn new(max_len: usize) -> Self {
        Self {
            used: HashSet::new(),
            max_len,
        }
    }

    fn assign(&mut self, raw: &str) -> String {
        let base = sanitize_sheet_name(raw, self.max_len);
        if !self.used.contains(&base) {
            self.used.insert(base.clone());
            return base;
        }

        let mut counter = 1;
        loop {
            let suffix = format!("_{counter}");
            let max_len = self.max_len.saturating_sub(suffix.len());
            let mut prefix = base.clone();
            if prefix.len() > max_len {
                prefix.truncate(max_len);
            }
            let candidate = format!("{prefix}{suffix}");
            if !self.used.contains(&candidate) {
                self.used.insert(candidate.clone());
                return candidate;
            }
            counter += 1;
        }
    }
}

fn sanitize_sheet_name(raw: &str, max_len: usize) -> String {
    let invalid = [':', '\\', '/', '?', '*', '[', ']', '\'', '"'];
    let mut sanitized: String = raw
        .chars()
        .map(|ch| {
            if invalid.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    sanitized = sanitized.trim().to_string();
    if sanitized.is_empty() {
        sanitized = "sheet".to_string();
    }

    if sanitized.len() > max_len {
        sanitized.truncate(max_len);
    }

    sanitized
}
