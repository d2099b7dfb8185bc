use crate::config::SlicingConfig;
use crate::error::PipelineError;
use crate::table_model::{CellValue, Table};

/// A contiguous column-range slice of a table.
///
/// Pages are read-only views into the table, 1-indexed for display and
/// 0-indexed for column offsets (`end_col` exclusive). Every page carries
/// the header context needed to stand alone when rendered.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    table: &'a Table,
    pub page_index: usize,
    pub start_col: usize,
    pub end_col: usize,
    /// Rows forming the header block, counting the column-name row first
    pub header_rows: usize,
}

impl<'a> Page<'a> {
    pub fn width(&self) -> usize {
        self.end_col - self.start_col
    }

    /// Inclusive offset of the last column on this page.
    pub fn end_col_inclusive(&self) -> usize {
        self.end_col - 1
    }

    /// Column names restricted to this page's range.
    pub fn column_names(&self) -> &'a [String] {
        &self.table.columns()[self.start_col..self.end_col]
    }

    /// All rows restricted to this page's range.
    pub fn rows(&self) -> impl Iterator<Item = &'a [CellValue]> {
        let (start, end) = (self.start_col, self.end_col);
        self.table.rows().iter().map(move |row| &row[start..end])
    }

    /// Leading rows that belong to the header block beyond the
    /// column-name row.
    pub fn header_body_rows(&self) -> impl Iterator<Item = &'a [CellValue]> {
        self.rows().take(self.header_rows.saturating_sub(1))
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }
}

/// How a table will be partitioned, computed without slicing.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceInfo {
    pub total_columns: usize,
    pub max_columns_per_page: usize,
    pub num_pages: usize,
    pub last_page_columns: usize,
}

/// Result of slicing a table: the ordered pages plus any non-fatal
/// warning conditions signaled along the way.
#[derive(Debug)]
pub struct Slicing<'a> {
    pub pages: Vec<Page<'a>>,
    pub warnings: Vec<String>,
}

/// Partition a table's columns into an ordered sequence of pages.
///
/// Pages are formed by walking the column sequence left to right in
/// fixed-size windows; the final page holds the remainder and is never
/// padded or merged. Deterministic, depends only on column count and
/// window size.
pub fn slice<'a>(table: &'a Table, cfg: &SlicingConfig) -> Result<Slicing<'a>, PipelineError> {
    cfg.validate()?;

    let total_columns = table.column_count();
    log::info!("Slicing table with {} columns", total_columns);

    if total_columns == 0 {
        if cfg.require_pages {
            return Err(PipelineError::EmptyTable);
        }
        log::warn!("Table has no columns");
        return Ok(Slicing {
            pages: Vec::new(),
            warnings: Vec::new(),
        });
    }

    let mut warnings = Vec::new();
    // The column-name row always exists; only header rows drawn from the
    // body can exceed the table
    let max_header_rows = table.row_count() + 1;
    let header_rows = if cfg.header_rows > max_header_rows {
        let warning = format!(
            "header_rows {} exceeds table row count, clamped to {}",
            cfg.header_rows, max_header_rows
        );
        log::warn!("{}", warning);
        warnings.push(warning);
        max_header_rows
    } else {
        cfg.header_rows
    };

    let mut pages = Vec::new();
    let mut start_col = 0;
    while start_col < total_columns {
        let end_col = (start_col + cfg.max_columns_per_page).min(total_columns);
        log::debug!("Created slice: columns {}-{}", start_col, end_col - 1);
        pages.push(Page {
            table,
            page_index: pages.len() + 1,
            start_col,
            end_col,
            header_rows,
        });
        start_col = end_col;
    }

    log::info!("Created {} slices from table", pages.len());
    Ok(Slicing { pages, warnings })
}

/// Compute how a table would be sliced without building the pages.
pub fn slice_info(table: &Table, cfg: &SlicingConfig) -> Result<SliceInfo, PipelineError> {
    cfg.validate()?;
    let total_columns = table.column_count();
    let num_pages = total_columns.div_ceil(cfg.max_columns_per_page);
    let last_page_columns = if total_columns == 0 {
        0
    } else {
        let rem = total_columns % cfg.max_columns_per_page;
        if rem == 0 { cfg.max_columns_per_page } else { rem }
    };
    Ok(SliceInfo {
        total_columns,
        max_columns_per_page: cfg.max_columns_per_page,
        num_pages,
        last_page_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: usize, rows: usize) -> Table {
        let names = (0..columns).map(|i| format!("col_{}", i)).collect();
        let rows = (0..rows)
            .map(|r| {
                (0..columns)
                    .map(|c| CellValue::Number((r * columns + c) as f64))
                    .collect()
            })
            .collect();
        Table::new(names, rows)
    }

    fn cfg(max_columns_per_page: usize) -> SlicingConfig {
        SlicingConfig {
            max_columns_per_page,
            ..Default::default()
        }
    }

    #[test]
    fn test_example_scenario_100_columns_window_12() {
        let t = table(100, 50);
        let slicing = slice(&t, &cfg(12)).unwrap();

        assert_eq!(slicing.pages.len(), 9);
        for page in &slicing.pages[..8] {
            assert_eq!(page.width(), 12);
        }
        let last = slicing.pages.last().unwrap();
        assert_eq!(last.width(), 4);
        assert_eq!(last.start_col, 96);
        assert_eq!(last.end_col_inclusive(), 99);
    }

    #[test]
    fn test_coverage_invariant() {
        for (columns, window) in [(1, 1), (7, 3), (12, 12), (100, 12), (5, 100)] {
            let t = table(columns, 2);
            let slicing = slice(&t, &cfg(window)).unwrap();

            let mut covered = Vec::new();
            for (i, page) in slicing.pages.iter().enumerate() {
                assert_eq!(page.page_index, i + 1);
                covered.extend(page.start_col..page.end_col);
            }
            // No gaps, no overlaps, no reordering
            let expected: Vec<usize> = (0..columns).collect();
            assert_eq!(covered, expected);
        }
    }

    #[test]
    fn test_page_size_bound() {
        let t = table(25, 3);
        let slicing = slice(&t, &cfg(10)).unwrap();
        let widths: Vec<usize> = slicing.pages.iter().map(|p| p.width()).collect();
        assert_eq!(widths, vec![10, 10, 5]);
    }

    #[test]
    fn test_determinism() {
        let t = table(31, 4);
        let a = slice(&t, &cfg(7)).unwrap();
        let b = slice(&t, &cfg(7)).unwrap();
        let coords = |s: &Slicing| {
            s.pages
                .iter()
                .map(|p| (p.page_index, p.start_col, p.end_col))
                .collect::<Vec<_>>()
        };
        assert_eq!(coords(&a), coords(&b));
    }

    #[test]
    fn test_window_larger_than_table_is_one_page() {
        let t = table(5, 2);
        let slicing = slice(&t, &cfg(100)).unwrap();
        assert_eq!(slicing.pages.len(), 1);
        assert_eq!(slicing.pages[0].width(), 5);
    }

    #[test]
    fn test_zero_columns_yields_zero_pages() {
        let t = table(0, 0);
        let slicing = slice(&t, &cfg(12)).unwrap();
        assert!(slicing.pages.is_empty());
    }

    #[test]
    fn test_zero_columns_strict_mode_is_an_error() {
        let t = table(0, 0);
        let strict = SlicingConfig {
            max_columns_per_page: 12,
            require_pages: true,
            ..Default::default()
        };
        assert!(matches!(
            slice(&t, &strict),
            Err(PipelineError::EmptyTable)
        ));
    }

    #[test]
    fn test_zero_window_is_invalid_configuration() {
        let t = table(5, 2);
        assert!(matches!(
            slice(&t, &cfg(0)),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_header_rows_clamped_with_warning() {
        let t = table(4, 2);
        let oversized = SlicingConfig {
            max_columns_per_page: 2,
            header_rows: 10,
            ..Default::default()
        };
        let slicing = slice(&t, &oversized).unwrap();
        assert_eq!(slicing.warnings.len(), 1);
        // Column-name row plus both body rows
        assert_eq!(slicing.pages[0].header_rows, 3);
    }

    #[test]
    fn test_page_is_a_view_into_the_table() {
        let t = table(6, 3);
        let slicing = slice(&t, &cfg(4)).unwrap();
        let second = &slicing.pages[1];

        assert_eq!(second.column_names(), &["col_4", "col_5"]);
        let first_row: Vec<String> = second.rows().next().unwrap().iter().map(|c| c.display()).collect();
        assert_eq!(first_row, vec!["4", "5"]);
    }

    #[test]
    fn test_pages_are_shareable_across_threads() {
        fn assert_sync<T: Sync>(_: &T) {}
        let t = table(4, 2);
        let slicing = slice(&t, &cfg(2)).unwrap();
        // Rendering may be parallelized: the table and its page views are
        // read-only and safe to share by reference
        assert_sync(&t);
        assert_sync(&slicing.pages[0]);
    }

    #[test]
    fn test_slice_info_matches_slice() {
        let t = table(100, 50);
        let info = slice_info(&t, &cfg(12)).unwrap();
        assert_eq!(
            info,
            SliceInfo {
                total_columns: 100,
                max_columns_per_page: 12,
                num_pages: 9,
                last_page_columns: 4,
            }
        );

        let exact = slice_info(&table(24, 1), &cfg(12)).unwrap();
        assert_eq!(exact.num_pages, 2);
        assert_eq!(exact.last_page_columns, 12);

        let empty = slice_info(&table(0, 0), &cfg(12)).unwrap();
        assert_eq!(empty.num_pages, 0);
        assert_eq!(empty.last_page_columns, 0);
    }
}
