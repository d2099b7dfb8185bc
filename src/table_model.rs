use std::path::Path;

use calamine::{Data, Reader, Xlsx, open_workbook};

use crate::error::PipelineError;

/// A single cell value.
///
/// Closed tagged variant so renderers can apply format-appropriate
/// formatting without runtime type inspection. Values are never coerced to
/// a different semantic type after loading.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    /// Format a cell value for display.
    ///
    /// Whole numbers print without a fractional part, everything else with
    /// two decimals to avoid scientific notation. Empty cells are
    /// zero-length fields.
    pub fn display(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{:.2}", n)
                }
            }
            CellValue::Empty => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Text(b.to_string()),
            // Dates, durations and cell errors keep their display form
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// An immutable-once-loaded rectangular grid of cells with named columns
/// and an ordered row sequence.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Build a table from column names and row data.
    ///
    /// Rows are normalized to the declared column count: missing cells
    /// become explicit `Empty` markers, surplus cells are dropped.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.truncate(width);
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Load one worksheet into a table.
    ///
    /// The first sheet is used unless `sheet_name` is given. The first
    /// worksheet row supplies the column names; the remaining rows become
    /// the table body. Returns the table together with the resolved sheet
    /// name.
    pub fn from_xlsx(
        file_path: &str,
        sheet_name: Option<&str>,
    ) -> Result<(Self, String), PipelineError> {
        let source_read = |reason: String| PipelineError::SourceRead {
            source_id: file_path.to_string(),
            reason,
        };

        let mut workbook: Xlsx<_> = open_workbook(file_path)
            .map_err(|e| source_read(format!("Failed to open Excel file: {}", e)))?;

        let sheet_names = workbook.sheet_names().to_owned();
        let sheet = match sheet_name {
            Some(name) => {
                if !sheet_names.iter().any(|s| s == name) {
                    return Err(source_read(format!(
                        "Sheet '{}' not found (available: {})",
                        name,
                        sheet_names.join(", ")
                    )));
                }
                name.to_string()
            }
            None => sheet_names
                .first()
                .cloned()
                .ok_or_else(|| source_read("Workbook contains no sheets".to_string()))?,
        };

        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| source_read(format!("Failed to read sheet '{}': {}", sheet, e)))?;

        let height = range.height();
        let width = range.width();

        let mut header = Vec::with_capacity(width);
        for col in 0..width {
            let name = match range.get_value((0, col as u32)) {
                Some(Data::Empty) | None => String::new(),
                Some(value) => value.to_string(),
            };
            header.push(name);
        }
        let columns = normalize_column_names(header);

        let mut rows = Vec::with_capacity(height.saturating_sub(1));
        for row in 1..height {
            let mut cells = Vec::with_capacity(width);
            for col in 0..width {
                let cell = range
                    .get_value((row as u32, col as u32))
                    .map(CellValue::from)
                    .unwrap_or(CellValue::Empty);
                cells.push(cell);
            }
            rows.push(cells);
        }

        log::info!(
            "Loaded sheet '{}' from {}: {} rows, {} columns",
            sheet,
            file_path,
            rows.len(),
            columns.len()
        );

        Ok((Table::new(columns, rows), sheet))
    }
}

/// Summary of one worksheet, used by the sheet listing command.
#[derive(Debug, Clone)]
pub struct SheetInfo {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
}

/// List all worksheets in a workbook with their dimensions.
pub fn list_sheets(file_path: &str) -> Result<Vec<SheetInfo>, PipelineError> {
    let mut workbook: Xlsx<_> =
        open_workbook(file_path).map_err(|e| PipelineError::SourceRead {
            source_id: file_path.to_string(),
            reason: format!("Failed to open Excel file: {}", e),
        })?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_owned() {
        let (rows, columns) = match workbook.worksheet_range(&name) {
            // The header row is not part of the table body
            Ok(range) => (range.height().saturating_sub(1), range.width()),
            Err(_) => (0, 0),
        };
        sheets.push(SheetInfo {
            name,
            rows,
            columns,
        });
    }
    Ok(sheets)
}

/// Return the file name portion of a source path for headers and logs.
pub fn source_file_name(file_path: &str) -> String {
    Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.to_string())
}

/// Fill in blank column names and deduplicate repeats.
///
/// Blank headers become `Unnamed: {i}`; a repeated name gets a `.{n}`
/// suffix so the column sequence stays unique and order-significant.
fn normalize_column_names(raw: Vec<String>) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    for (idx, name) in raw.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while names.contains(&candidate) {
            candidate = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        names.push(candidate);
    }
    names
}
