use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use crate::column_slicer::Page;
use crate::combiner::{self, Combined};
use crate::config::{OutputConfig, PdfStyleConfig};
use crate::error::PipelineError;
use crate::renderer::{PageRenderer, Payload, RenderedArtifact};

// Courier advance width (600/1000 em)
const CHAR_WIDTH_EM: f64 = 0.6;
const LINE_HEIGHT_EM: f64 = 1.4;
const MIN_COLUMN_CHARS: usize = 3;
const MAX_COLUMN_CHARS: usize = 40;

/// Renders pages as vector-text PDF documents via `lopdf`.
///
/// Text is laid out on a monospaced grid at the configured size, never
/// below the floor. Rows that overflow the page width wrap within their
/// columns; tables that overflow the page height continue onto additional
/// PDF pages with the header block repeated.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    output: OutputConfig,
    pdf: PdfStyleConfig,
    repeat_header: bool,
}

impl PdfRenderer {
    pub fn new(output: OutputConfig, pdf: PdfStyleConfig, repeat_header: bool) -> Self {
        Self {
            output,
            pdf,
            repeat_header,
        }
    }

    /// Split the page's text grid into physical PDF pages of line lists.
    fn paginate_lines(&self, page: &Page, lines_per_page: usize, line_chars: usize) -> Vec<Vec<String>> {
        let widths = column_widths(page, line_chars);

        let mut header_lines = Vec::new();
        let name_cells: Vec<String> = page.column_names().to_vec();
        header_lines.extend(grid_lines(&name_cells, &widths));
        header_lines.push(separator_line(&widths));
        let header_body_count = page.header_rows.saturating_sub(1);
        for row in page.header_body_rows() {
            let cells: Vec<String> = row.iter().map(|c| c.display()).collect();
            header_lines.extend(grid_lines(&cells, &widths));
        }

        // Degenerate geometry: keep at least one body line per page
        let capacity = lines_per_page.max(header_lines.len() + 1);

        let mut pages_of_lines: Vec<Vec<String>> = Vec::new();
        let mut current = header_lines.clone();
        let mut rows_on_page = 0;
        for row in page.rows().skip(header_body_count) {
            let cells: Vec<String> = row.iter().map(|c| c.display()).collect();
            // A row's wrapped lines stay together on one physical page
            let group = grid_lines(&cells, &widths);
            if rows_on_page > 0 && current.len() + group.len() > capacity {
                pages_of_lines.push(current);
                current = if self.repeat_header {
                    header_lines.clone()
                } else {
                    Vec::new()
                };
                rows_on_page = 0;
            }
            current.extend(group);
            rows_on_page += 1;
        }
        pages_of_lines.push(current);
        pages_of_lines
    }
}

impl PageRenderer for PdfRenderer {
    fn format_name(&self) -> &'static str {
        "pdf"
    }

    fn file_extension(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, page: &Page) -> Result<RenderedArtifact, PipelineError> {
        let label = self
            .output
            .page_label(page.page_index, page.start_col, page.end_col_inclusive());

        let size = self.pdf.effective_font_size();
        let label_size = size + 2.0;
        let line_height = size * LINE_HEIGHT_EM;
        let (page_w, page_h) = self.pdf.page_dimensions();
        let (top, right, bottom, left) = self.pdf.margins_pt();

        let usable_w = page_w - left - right;
        let usable_h = page_h - top - bottom;
        let line_chars = ((usable_w / (size * CHAR_WIDTH_EM)) as usize).max(MIN_COLUMN_CHARS);
        // Label line and the blank line under it
        let lines_per_page = ((usable_h / line_height) as usize).saturating_sub(2).max(3);

        let pages_of_lines = self.paginate_lines(page, lines_per_page, line_chars);

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let body_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let label_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => body_font_id, "F2" => label_font_id },
        });

        let render_err = |reason: String| PipelineError::PageRender {
            page: page.page_index,
            reason,
        };

        let mut kids: Vec<Object> = Vec::new();
        for lines in &pages_of_lines {
            let mut ops = vec![
                Operation::new("BT", vec![]),
                Operation::new("TL", vec![real(line_height)]),
                Operation::new("Td", vec![real(left), real(page_h - top - label_size)]),
                Operation::new("Tf", vec!["F2".into(), real(label_size)]),
                Operation::new("Tj", vec![text_literal(&label)]),
                Operation::new("Tf", vec!["F1".into(), real(size)]),
                Operation::new("T*", vec![]),
            ];
            for line in lines {
                ops.push(Operation::new("T*", vec![]));
                ops.push(Operation::new("Tj", vec![text_literal(line)]));
            }
            ops.push(Operation::new("ET", vec![]));

            let content = Content { operations: ops };
            let encoded = content
                .encode()
                .map_err(|e| render_err(format!("Failed to encode content stream: {}", e)))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), real(page_w), real(page_h)],
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let kids_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => kids_count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| render_err(format!("Failed to serialize PDF: {}", e)))?;

        log::debug!(
            "Rendered PDF for page {} ({} physical pages)",
            page.page_index,
            pages_of_lines.len()
        );
        Ok(RenderedArtifact {
            page_index: page.page_index,
            start_col: page.start_col,
            end_col: page.end_col,
            label,
            payload: Payload::Binary(bytes),
        })
    }

    fn combine(
        &self,
        artifacts: &[RenderedArtifact],
        missing: &[usize],
    ) -> Result<Combined, PipelineError> {
        combiner::combine_pdf(artifacts, missing)
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Encode a text line for the builtin WinAnsi fonts; characters outside
/// Latin-1 degrade to `?`.
fn text_literal(text: &str) -> Object {
    let bytes: Vec<u8> = text
        .chars()
        .map(|ch| {
            let code = ch as u32;
            if (0x20..0x100).contains(&code) {
                code as u8
            } else {
                b'?'
            }
        })
        .collect();
    Object::string_literal(bytes)
}

/// Character widths per column, fitted to the available line width.
fn column_widths(page: &Page, line_chars: usize) -> Vec<usize> {
    let mut widths: Vec<usize> = page
        .column_names()
        .iter()
        .map(|name| name.chars().count().clamp(MIN_COLUMN_CHARS, MAX_COLUMN_CHARS))
        .collect();
    for row in page.rows() {
        for (width, cell) in widths.iter_mut().zip(row) {
            let len = cell.display().chars().count().min(MAX_COLUMN_CHARS);
            *width = (*width).max(len);
        }
    }

    // Shrink the widest columns until the grid fits the line; content in
    // narrowed columns wraps instead of shrinking the font
    let gaps = 3 * widths.len().saturating_sub(1);
    loop {
        let total: usize = widths.iter().sum::<usize>() + gaps;
        if total <= line_chars {
            break;
        }
        let max_width = *widths.iter().max().unwrap();
        let widest = widths.iter().position(|w| *w == max_width).unwrap();
        if widths[widest] <= MIN_COLUMN_CHARS {
            log::warn!(
                "Grid of {} columns cannot fit {} characters per line; output will overflow",
                widths.len(),
                line_chars
            );
            break;
        }
        widths[widest] -= 1;
    }
    widths
}

/// Wrap a cell into fixed-width chunks.
fn wrap_cell(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Format one logical row as grid lines, wrapping cells to their column
/// width and padding with spaces.
fn grid_lines(cells: &[String], widths: &[usize]) -> Vec<String> {
    let wrapped: Vec<Vec<String>> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| wrap_cell(cell.replace('\n', " ").as_str(), *width))
        .collect();
    let height = wrapped.iter().map(|w| w.len()).max().unwrap_or(1);

    let mut lines = Vec::with_capacity(height);
    for i in 0..height {
        let mut line = String::new();
        for (col, chunks) in wrapped.iter().enumerate() {
            if col > 0 {
                line.push_str(" | ");
            }
            let chunk = chunks.get(i).map(String::as_str).unwrap_or("");
            line.push_str(chunk);
            for _ in chunk.chars().count()..widths[col] {
                line.push(' ');
            }
        }
        lines.push(line);
    }
    lines
}

fn separator_line(widths: &[usize]) -> String {
    let mut line = String::new();
    for (col, width) in widths.iter().enumerate() {
        if col > 0 {
            line.push_str("-+-");
        }
        line.push_str(&"-".repeat(*width));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_slicer::slice;
    use crate::config::SlicingConfig;
    use crate::table_model::{CellValue, Table};

    fn sample_table(rows: usize) -> Table {
        Table::new(
            vec!["Name".to_string(), "Amount".to_string()],
            (0..rows)
                .map(|i| {
                    vec![
                        CellValue::Text(format!("item {}", i)),
                        CellValue::Number(i as f64),
                    ]
                })
                .collect(),
        )
    }

    fn render_bytes(table: &Table, renderer: &PdfRenderer) -> Vec<u8> {
        let slicing = slice(table, &SlicingConfig::default()).unwrap();
        let artifact = renderer.render(&slicing.pages[0]).unwrap();
        match artifact.payload {
            Payload::Binary(bytes) => bytes,
            Payload::Text(_) => panic!("pdf payload must be binary"),
        }
    }

    #[test]
    fn test_render_produces_loadable_pdf_with_label() {
        let table = sample_table(5);
        let renderer = PdfRenderer::new(Default::default(), Default::default(), true);
        let bytes = render_bytes(&table, &renderer);

        assert!(bytes.starts_with(b"%PDF"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        let text = doc.extract_text(&[1]).unwrap();
        assert!(text.contains("Page 1 - Columns 0-1"));
        assert!(text.contains("Name"));
        assert!(text.contains("item 3"));
    }

    #[test]
    fn test_long_table_flows_onto_multiple_physical_pages() {
        let table = sample_table(200);
        let renderer = PdfRenderer::new(Default::default(), Default::default(), true);
        let bytes = render_bytes(&table, &renderer);

        let doc = Document::load_mem(&bytes).unwrap();
        let physical = doc.get_pages().len();
        assert!(physical > 1, "200 rows should not fit one physical page");

        // Header block repeats on continuation pages
        let text = doc.extract_text(&[2]).unwrap();
        assert!(text.contains("Name"));
    }

    #[test]
    fn test_wrap_cell() {
        assert_eq!(wrap_cell("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_cell("abc", 4), vec!["abc"]);
        assert_eq!(wrap_cell("", 4), vec![""]);
    }

    #[test]
    fn test_column_widths_fit_line() {
        let table = Table::new(
            vec!["a".repeat(60), "b".repeat(60)],
            vec![vec![
                CellValue::Text("x".repeat(80)),
                CellValue::Text("y".to_string()),
            ]],
        );
        let slicing = slice(&table, &SlicingConfig::default()).unwrap();
        let widths = column_widths(&slicing.pages[0], 50);
        let total: usize = widths.iter().sum::<usize>() + 3;
        assert!(total <= 50);
        assert!(widths.iter().all(|w| *w >= MIN_COLUMN_CHARS));
    }

    #[test]
    fn test_grid_lines_keep_wrapped_cells_aligned() {
        let lines = grid_lines(
            &["abcdef".to_string(), "xy".to_string()],
            &[4, 4],
        );
        assert_eq!(lines, vec!["abcd | xy  ", "ef   |     "]);
    }
}
