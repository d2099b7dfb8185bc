use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

const MM_TO_PT: f64 = 72.0 / 25.4;

/// Full pipeline configuration.
///
/// Loaded once (from a JSON file or defaults) and passed explicitly into
/// each component call; no component reads ambient process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub slicing: SlicingConfig,
    pub pdf: PdfStyleConfig,
    pub html: HtmlStyleConfig,
    pub output: OutputConfig,
}

/// Column slicing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicingConfig {
    /// Window size for the column walk; every page except the last holds
    /// exactly this many columns
    pub max_columns_per_page: usize,
    /// Leading rows that form the header block of every page, counting the
    /// column-name row first
    pub header_rows: usize,
    /// Repeat the header block when a long table continues onto additional
    /// document pages
    pub repeat_header: bool,
    /// Treat a zero-column table as an error instead of producing zero pages
    pub require_pages: bool,
}

impl Default for SlicingConfig {
    fn default() -> Self {
        Self {
            max_columns_per_page: 12,
            header_rows: 1,
            repeat_header: true,
            require_pages: false,
        }
    }
}

impl SlicingConfig {
    /// Reject parameters that cannot produce a valid slicing.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_columns_per_page == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "max_columns_per_page must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// PDF page layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfStyleConfig {
    pub page_size: String,
    pub orientation: String,
    pub margin_top_mm: f64,
    pub margin_right_mm: f64,
    pub margin_bottom_mm: f64,
    pub margin_left_mm: f64,
    pub font_family: String,
    pub font_size_pt: f64,
    /// Hard floor for rendered text; content wraps rather than shrinking
    /// below this size
    pub min_font_size_pt: f64,
}

impl Default for PdfStyleConfig {
    fn default() -> Self {
        Self {
            page_size: "A4".to_string(),
            orientation: "landscape".to_string(),
            margin_top_mm: 15.0,
            margin_right_mm: 10.0,
            margin_bottom_mm: 15.0,
            margin_left_mm: 10.0,
            font_family: "Arial, sans-serif".to_string(),
            font_size_pt: 10.0,
            min_font_size_pt: 8.0,
        }
    }
}

impl PdfStyleConfig {
    /// Page dimensions in points, orientation applied.
    pub fn page_dimensions(&self) -> (f64, f64) {
        let (w, h) = match self.page_size.to_uppercase().as_str() {
            "LETTER" => (612.0, 792.0),
            "A3" => (842.0, 1191.0),
            _ => (595.0, 842.0), // A4
        };
        if self.orientation.eq_ignore_ascii_case("landscape") {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// Margins in points: (top, right, bottom, left).
    pub fn margins_pt(&self) -> (f64, f64, f64, f64) {
        (
            self.margin_top_mm * MM_TO_PT,
            self.margin_right_mm * MM_TO_PT,
            self.margin_bottom_mm * MM_TO_PT,
            self.margin_left_mm * MM_TO_PT,
        )
    }

    /// Text size actually used for rendering, never below the floor.
    pub fn effective_font_size(&self) -> f64 {
        self.font_size_pt.max(self.min_font_size_pt)
    }
}

/// HTML table styling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlStyleConfig {
    pub table_border: String,
    pub header_bg_color: String,
    pub header_text_color: String,
    pub cell_padding: String,
    pub stripe_rows: bool,
    pub stripe_color: String,
}

impl Default for HtmlStyleConfig {
    fn default() -> Self {
        Self {
            table_border: "1px solid #333".to_string(),
            header_bg_color: "#4CAF50".to_string(),
            header_text_color: "#ffffff".to_string(),
            cell_padding: "8px".to_string(),
            stripe_rows: true,
            stripe_color: "#f2f2f2".to_string(),
        }
    }
}

/// Output and labeling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Label template with `{page_num}`, `{start_col}` and `{end_col}`
    /// placeholders; purely presentational
    pub page_label_format: String,
    /// Merge per-page artifacts into a combined document
    pub combine_pages: bool,
    /// Keep the per-page artifacts next to the combined document
    pub keep_individual_pages: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            page_label_format: "Page {page_num} - Columns {start_col}-{end_col}".to_string(),
            combine_pages: true,
            keep_individual_pages: true,
        }
    }
}

impl OutputConfig {
    /// Format the display label for one page.
    ///
    /// `start_col`/`end_col` are the inclusive 0-based column offsets of
    /// the page, `page_num` is 1-based.
    pub fn page_label(&self, page_num: usize, start_col: usize, end_col: usize) -> String {
        self.page_label_format
            .replace("{page_num}", &page_num.to_string())
            .replace("{start_col}", &start_col.to_string())
            .replace("{end_col}", &end_col.to_string())
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file, falling back to defaults if
    /// the file is missing or malformed.
    pub fn load_or_default(config_path: Option<&Path>) -> Self {
        let Some(path) = config_path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => {
                    log::info!("Configuration loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Could not parse config {}: {}", path.display(), e);
                    log::info!("Using default configuration");
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Could not load config from {}: {}", path.display(), e);
                log::info!("Using default configuration");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero_window() {
        let cfg = SlicingConfig {
            max_columns_per_page: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
        assert!(SlicingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_page_label_template() {
        let output = OutputConfig::default();
        assert_eq!(output.page_label(3, 24, 35), "Page 3 - Columns 24-35");

        let custom = OutputConfig {
            page_label_format: "[{page_num}] {start_col}..{end_col}".to_string(),
            ..Default::default()
        };
        assert_eq!(custom.page_label(1, 0, 11), "[1] 0..11");
    }

    #[test]
    fn test_page_dimensions_orientation() {
        let cfg = PdfStyleConfig::default();
        let (w, h) = cfg.page_dimensions();
        assert!(w > h); // landscape A4

        let portrait = PdfStyleConfig {
            orientation: "portrait".to_string(),
            ..Default::default()
        };
        let (w, h) = portrait.page_dimensions();
        assert!(h > w);
    }

    #[test]
    fn test_font_size_floor_is_enforced() {
        let cfg = PdfStyleConfig {
            font_size_pt: 4.0,
            min_font_size_pt: 8.0,
            ..Default::default()
        };
        assert_eq!(cfg.effective_font_size(), 8.0);
    }

    #[test]
    fn test_config_from_json_partial() {
        let parsed: PipelineConfig =
            serde_json::from_str(r#"{"slicing": {"max_columns_per_page": 5}}"#).unwrap();
        assert_eq!(parsed.slicing.max_columns_per_page, 5);
        // Untouched sections keep their defaults
        assert_eq!(parsed.slicing.header_rows, 1);
        assert_eq!(parsed.pdf.page_size, "A4");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let cfg = PipelineConfig::load_or_default(Some(Path::new("no_such_config.json")));
        assert_eq!(cfg.slicing.max_columns_per_page, 12);
    }
}
