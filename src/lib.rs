/// Sheetpager - slices wide spreadsheet tables into paginated column
/// ranges and renders them as OCR-friendly Markdown, HTML and PDF documents

pub mod column_slicer;
pub mod combiner;
pub mod config;
pub mod error;
pub mod html_renderer;
pub mod manifest;
pub mod markdown_renderer;
pub mod pdf_renderer;
pub mod pipeline;
pub mod renderer;
pub mod table_model;

/// Re-export the table model
pub use table_model::{CellValue, SheetInfo, Table, list_sheets};

/// Re-export the slicing engine
pub use column_slicer::{Page, SliceInfo, Slicing, slice, slice_info};

/// Re-export configuration
pub use config::{HtmlStyleConfig, OutputConfig, PdfStyleConfig, PipelineConfig, SlicingConfig};

/// Re-export the rendering contract and built-in renderers
pub use html_renderer::HtmlRenderer;
pub use markdown_renderer::MarkdownRenderer;
pub use pdf_renderer::PdfRenderer;
pub use renderer::{PageRenderer, Payload, RenderedArtifact};

/// Re-export combining and manifest types
pub use combiner::{Combined, combine_pdf, combine_text};
pub use manifest::{Manifest, ManifestPage};

/// Re-export the orchestrator
pub use pipeline::{Pipeline, RunOutcome, RunReport, RunState, SourceInfo};

/// Re-export the error taxonomy
pub use error::PipelineError;
