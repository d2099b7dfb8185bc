use crate::column_slicer::Page;
use crate::combiner::Combined;
use crate::error::PipelineError;

/// Payload of a rendered page, opaque to everything but the combiner.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(s) => s.as_bytes(),
            Payload::Binary(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// The output of rendering one page in one target format, plus the page
/// coordinates it was derived from.
#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub page_index: usize,
    pub start_col: usize,
    pub end_col: usize,
    pub label: String,
    pub payload: Payload,
}

/// A per-format page renderer.
///
/// Invoked once per page, independently and in any order; implementations
/// hold no cross-page state. A failed render is recorded against its page
/// by the orchestrator and never aborts the run.
pub trait PageRenderer {
    /// Short format name used in logs and output directory names.
    fn format_name(&self) -> &'static str;

    /// File extension for per-page and combined artifacts.
    fn file_extension(&self) -> &'static str;

    /// Convert one column-range page into an output artifact.
    fn render(&self, page: &Page) -> Result<RenderedArtifact, PipelineError>;

    /// Merge the ordered per-page artifacts into one combined artifact.
    ///
    /// `missing` lists page indices known to have failed rendering, so a
    /// partial combine is distinguishable from an inconsistent sequence.
    fn combine(
        &self,
        artifacts: &[RenderedArtifact],
        missing: &[usize],
    ) -> Result<Combined, PipelineError>;
}
