use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for a pagination run.
///
/// Fatal kinds abort the run before or after rendering; `PageRender` and
/// per-artifact `SinkWrite` failures are accumulated into the run report
/// instead of aborting.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Bad slicing parameters, rejected before any rendering
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The source table could not be loaded
    #[error("Failed to read source table '{source_id}': {reason}")]
    SourceRead { source_id: String, reason: String },

    /// The table has no columns and the caller required at least one page
    #[error("Source table has no columns")]
    EmptyTable,

    /// One page's format conversion failed
    #[error("Failed to render page {page}: {reason}")]
    PageRender { page: usize, reason: String },

    /// Page-index sequence inconsistent at merge time
    #[error("Failed to combine page artifacts: {0}")]
    Combine(String),

    /// The manifest or an artifact could not be persisted
    #[error("Failed to write {}: {source}", path.display())]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// True for kinds that are recorded in the run report rather than
    /// aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::PageRender { .. } | PipelineError::SinkWrite { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_failing_input() {
        let err = PipelineError::SourceRead {
            source_id: "data.xlsx".to_string(),
            reason: "no such file".to_string(),
        };
        assert!(err.to_string().contains("data.xlsx"));

        let err = PipelineError::PageRender {
            page: 3,
            reason: "boom".to_string(),
        };
        assert!(err.to_string().contains("page 3"));
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(
            PipelineError::PageRender {
                page: 1,
                reason: String::new()
            }
            .is_recoverable()
        );
        assert!(!PipelineError::InvalidConfiguration(String::new()).is_recoverable());
        assert!(!PipelineError::EmptyTable.is_recoverable());
        assert!(!PipelineError::Combine(String::new()).is_recoverable());
    }
}
