use crate::column_slicer::Page;
use crate::combiner::{self, Combined};
use crate::config::{HtmlStyleConfig, OutputConfig, PdfStyleConfig};
use crate::error::PipelineError;
use crate::renderer::{PageRenderer, Payload, RenderedArtifact};

/// Renders pages as standalone HTML documents.
///
/// The page table is embedded in a page-sized layout with a visible page
/// label. The configured font size is subject to a hard floor: content
/// that would overflow the page width wraps instead of shrinking.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    output: OutputConfig,
    html: HtmlStyleConfig,
    pdf: PdfStyleConfig,
}

impl HtmlRenderer {
    pub fn new(output: OutputConfig, html: HtmlStyleConfig, pdf: PdfStyleConfig) -> Self {
        Self { output, html, pdf }
    }

    fn stylesheet(&self) -> String {
        let orientation = if self.pdf.orientation.eq_ignore_ascii_case("landscape") {
            format!("{} landscape", self.pdf.page_size)
        } else {
            self.pdf.page_size.clone()
        };
        let stripe = if self.html.stripe_rows {
            format!(
                "tbody tr:nth-child(even) {{ background-color: {}; }}\n",
                self.html.stripe_color
            )
        } else {
            String::new()
        };

        format!(
            "@page {{\n  size: {orientation};\n  margin: {top}mm {right}mm {bottom}mm {left}mm;\n}}\nbody {{\n  font-family: {family};\n  font-size: {size}pt;\n}}\n.page-label {{\n  font-size: {label_size}pt;\n  font-weight: bold;\n  margin-bottom: 10px;\n}}\ntable {{\n  width: 100%;\n  border-collapse: collapse;\n  table-layout: fixed;\n  word-wrap: break-word;\n}}\nth, td {{\n  border: {border};\n  padding: {padding};\n  text-align: left;\n}}\nth {{\n  background-color: {header_bg};\n  color: {header_fg};\n}}\n{stripe}",
            orientation = orientation,
            top = self.pdf.margin_top_mm,
            right = self.pdf.margin_right_mm,
            bottom = self.pdf.margin_bottom_mm,
            left = self.pdf.margin_left_mm,
            family = self.pdf.font_family,
            size = self.pdf.effective_font_size(),
            label_size = self.pdf.effective_font_size() + 2.0,
            border = self.html.table_border,
            padding = self.html.cell_padding,
            header_bg = self.html.header_bg_color,
            header_fg = self.html.header_text_color,
        )
    }
}

impl PageRenderer for HtmlRenderer {
    fn format_name(&self) -> &'static str {
        "html"
    }

    fn file_extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, page: &Page) -> Result<RenderedArtifact, PipelineError> {
        let label = self
            .output
            .page_label(page.page_index, page.start_col, page.end_col_inclusive());

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape_html(&label)));
        html.push_str(&format!("<style>\n{}</style>\n", self.stylesheet()));
        html.push_str("</head>\n<body>\n");
        html.push_str(&format!(
            "<div class=\"page-label\">{}</div>\n",
            escape_html(&label)
        ));
        html.push_str("<table>\n<thead>\n<tr>");
        for name in page.column_names() {
            html.push_str(&format!("<th>{}</th>", escape_html(name)));
        }
        html.push_str("</tr>\n");
        for row in page.header_body_rows() {
            html.push_str("<tr>");
            for cell in row {
                html.push_str(&format!("<th>{}</th>", escape_html(&cell.display())));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</thead>\n<tbody>\n");
        let header_body_count = page.header_rows.saturating_sub(1);
        for row in page.rows().skip(header_body_count) {
            html.push_str("<tr>");
            for cell in row {
                html.push_str(&format!("<td>{}</td>", escape_html(&cell.display())));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</tbody>\n</table>\n</body>\n</html>\n");

        log::debug!("Rendered HTML for page {}", page.page_index);
        Ok(RenderedArtifact {
            page_index: page.page_index,
            start_col: page.start_col,
            end_col: page.end_col,
            label,
            payload: Payload::Text(html),
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

/// Escape text for HTML element content and attribute values.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
