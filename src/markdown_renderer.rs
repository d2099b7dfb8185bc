use crate::column_slicer::Page;
use crate::combiner::{self, Combined};
use crate::config::OutputConfig;
use crate::error::PipelineError;
use crate::renderer::{PageRenderer, Payload, RenderedArtifact};

/// Renders pages as standalone Markdown documents.
///
/// Each page reproduces a complete mini-table with its header at the top,
/// so the output is readable without the adjacent pages.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    output: OutputConfig,
}

impl MarkdownRenderer {
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }
}

impl PageRenderer for MarkdownRenderer {
    fn format_name(&self) -> &'static str {
        "markdown"
    }

    fn file_extension(&self) -> &'static str {
        "md"
    }

    fn render(&self, page: &Page) -> Result<RenderedArtifact, PipelineError> {
        let label = self
            .output
            .page_label(page.page_index, page.start_col, page.end_col_inclusive());

        let mut markdown = format!("# {}\n\n", label);
        markdown.push_str(&format!(
            "**Page:** {} | **Columns:** {} to {}\n\n",
            page.page_index,
            page.start_col,
            page.end_col_inclusive()
        ));
        markdown.push_str("---\n\n");
        markdown.push_str(&page_to_markdown_table(page));
        markdown.push_str("\n---\n");

        log::debug!("Rendered Markdown for page {}", page.page_index);
        Ok(RenderedArtifact {
            page_index: page.page_index,
            start_col: page.start_col,
            end_col: page.end_col,
            label,
            payload: Payload::Text(markdown),
        })
    }

    fn combine(
        &self,
        artifacts: &[RenderedArtifact],
        missing: &[usize],
    ) -> Result<Combined, PipelineError> {
        combiner::combine_text(artifacts, missing)
    }
}

/// Convert one page to a Markdown pipe table.
///
/// The header row holds the page's column names; when the page carries
/// extra header rows they come first in the body, since pipe tables have
/// a single header line.
pub fn page_to_markdown_table(page: &Page) -> String {
    let mut table = String::new();

    table.push('|');
    for name in page.column_names() {
        table.push(' ');
        table.push_str(&escape_cell(name));
        table.push_str(" |");
    }
    table.push('\n');

    table.push('|');
    for _ in 0..page.width() {
        table.push_str(" --- |");
    }
    table.push('\n');

    for row in page.rows() {
        table.push('|');
        for cell in row {
            table.push(' ');
            table.push_str(&escape_cell(&cell.display()));
            table.push_str(" |");
        }
        table.push('\n');
    }

    table
}

/// Escape a cell value so pipe-table structure survives any content.
///
/// Backslash, the pipe delimiter and newlines are backslash-escaped;
/// `unescape_cell` is the exact inverse.
pub fn escape_cell(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '|' => escaped.push_str("\\|"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Inverse of `escape_cell`.
pub fn unescape_cell(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('|') => out.push('|'),
            Some('n') => out.push('\n'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Parse a pipe table back into header names and cell values.
///
/// Compatible with `page_to_markdown_table` output: round-tripping a page
/// through render and parse recovers the original cell display values
/// exactly, including empties and delimiter characters.
pub fn parse_markdown_table(markdown: &str) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let mut lines = markdown.lines().filter(|line| line.starts_with('|'));

    let header = parse_table_row(lines.next()?);
    // Separator row
    lines.next()?;
    let rows = lines.map(parse_table_row).collect();
    Some((header, rows))
}

fn parse_table_row(line: &str) -> Vec<String> {
    let inner = line
        .strip_prefix("| ")
        .unwrap_or(line)
        .strip_suffix(" |")
        .unwrap_or(line);
    inner.split(" | ").map(unescape_cell).collect()
}
