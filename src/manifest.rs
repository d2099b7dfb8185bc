use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// One page entry in the manifest.
///
/// `end_col` is exclusive, matching the page it describes. A page that
/// failed to render or persist has `error` set and no artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPage {
    pub page_index: usize,
    pub start_col: usize,
    pub end_col: usize,
    pub label: String,
    pub artifact: Option<String>,
    pub error: Option<String>,
}

/// The persisted description of everything a run produced.
///
/// Constructed once after all pages have been attempted, never mutated
/// afterward, written once as `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub source_file: String,
    pub sheet_name: String,
    pub format: String,
    pub total_rows: usize,
    pub total_columns: usize,
    pub total_pages: usize,
    /// At least one page is missing or failed
    pub partial: bool,
    pub generated_at: DateTime<Utc>,
    pub warnings: Vec<String>,
    pub pages: Vec<ManifestPage>,
    pub combined_artifact: Option<String>,
}

impl Manifest {
    pub const FILE_NAME: &'static str = "index.json";

    /// Persist the manifest under its page-indexed output directory.
    pub fn write_json(&self, output_dir: &Path) -> Result<PathBuf, PipelineError> {
        let path = output_dir.join(Self::FILE_NAME);
        let json = serde_json::to_string_pretty(self).map_err(|e| PipelineError::SinkWrite {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
        std::fs::write(&path, json).map_err(|e| PipelineError::SinkWrite {
            path: path.clone(),
            source: e,
        })?;
        log::info!("Manifest written to {}", path.display());
        Ok(path)
    }

    /// Human-readable table of contents for the run.
    pub fn to_index_markdown(&self) -> String {
        let mut markdown = String::from("# Data Extraction Index\n\n");

        markdown.push_str("## Source Information\n\n");
        markdown.push_str(&format!("- **Source File:** {}\n", self.source_file));
        markdown.push_str(&format!("- **Sheet Name:** {}\n", self.sheet_name));
        markdown.push_str(&format!("- **Total Rows:** {}\n", self.total_rows));
        markdown.push_str(&format!("- **Total Columns:** {}\n", self.total_columns));
        markdown.push_str(&format!("- **Pages Generated:** {}\n\n", self.total_pages));

        markdown.push_str("## Pages\n\n");
        for page in &self.pages {
            match (&page.artifact, &page.error) {
                (Some(artifact), _) => {
                    markdown.push_str(&format!("- [{}]({})\n", page.label, artifact));
                }
                (None, Some(error)) => {
                    markdown.push_str(&format!("- {} (FAILED: {})\n", page.label, error));
                }
                (None, None) => {
                    markdown.push_str(&format!("- {}\n", page.label));
                }
            }
        }

        if let Some(combined) = &self.combined_artifact {
            markdown.push_str(&format!("\n**Combined output:** {}\n", combined));
        }
        markdown
    }

    /// Indices of pages that did not produce an artifact.
    pub fn failed_pages(&self) -> Vec<usize> {
        self.pages
            .iter()
            .filter(|p| p.error.is_some())
            .map(|p| p.page_index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest {
            source_file: "data.xlsx".to_string(),
            sheet_name: "Sheet1".to_string(),
            format: "markdown".to_string(),
            total_rows: 50,
            total_columns: 100,
            total_pages: 9,
            partial: true,
            generated_at: Utc::now(),
            warnings: vec![],
            pages: vec![
                ManifestPage {
                    page_index: 1,
                    start_col: 0,
                    end_col: 12,
                    label: "Page 1 - Columns 0-11".to_string(),
                    artifact: Some("page_1.md".to_string()),
                    error: None,
                },
                ManifestPage {
                    page_index: 2,
                    start_col: 12,
                    end_col: 24,
                    label: "Page 2 - Columns 12-23".to_string(),
                    artifact: None,
                    error: Some("render failed".to_string()),
                },
            ],
            combined_artifact: Some("combined_output.md".to_string()),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let manifest = sample();
        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_pages, 9);
        assert_eq!(back.pages.len(), 2);
        assert!(back.partial);
        assert_eq!(back.pages[1].error.as_deref(), Some("render failed"));
    }

    #[test]
    fn test_index_markdown_marks_failed_pages() {
        let markdown = sample().to_index_markdown();
        assert!(markdown.contains("[Page 1 - Columns 0-11](page_1.md)"));
        assert!(markdown.contains("Page 2 - Columns 12-23 (FAILED: render failed)"));
        assert!(markdown.contains("**Combined output:** combined_output.md"));
    }

    #[test]
    fn test_failed_pages() {
        assert_eq!(sample().failed_pages(), vec![2]);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample().write_json(dir.path()).unwrap();
        assert!(path.ends_with("index.json"));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\"total_pages\": 9"));
    }
}
