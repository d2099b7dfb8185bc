use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::column_slicer::slice;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::manifest::{Manifest, ManifestPage};
use crate::renderer::PageRenderer;
use crate::table_model::Table;

/// Run states, in order. `Failed` is terminal and reachable only from
/// the structural stages; render-level failures are recorded in the run
/// report instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Loaded,
    Sliced,
    Rendering,
    Rendered,
    Combined,
    Done,
    Failed,
}

impl RunState {
    fn may_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Loaded, Sliced)
                | (Sliced, Rendering)
                | (Rendering, Rendered)
                | (Rendered, Combined)
                | (Combined, Done)
                | (Loaded, Failed)
                | (Sliced, Failed)
        )
    }
}

/// Identity of the table a run was fed, carried into the manifest.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub file: String,
    pub sheet: String,
}

/// Non-fatal conditions accumulated over a run, surfaced collectively at
/// the end rather than silently swallowed.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub warnings: Vec<String>,
    pub page_failures: Vec<(usize, String)>,
    pub sink_failures: Vec<String>,
}

impl RunReport {
    pub fn is_partial(&self) -> bool {
        !self.page_failures.is_empty() || !self.sink_failures.is_empty()
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    pub total_pages: usize,
    pub artifact_paths: Vec<PathBuf>,
    pub combined_path: Option<PathBuf>,
    pub manifest_path: PathBuf,
    pub report: RunReport,
}

impl RunOutcome {
    pub fn is_partial(&self) -> bool {
        self.report.is_partial()
    }
}

/// Sequences Slicer -> Renderer -> Combiner over one table and persists
/// the artifacts plus the manifest.
///
/// Each run is a pure transformation of one table into one manifest and
/// N+1 artifacts; the pipeline holds no state across runs.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn run(
        &self,
        table: &Table,
        source: &SourceInfo,
        renderer: &dyn PageRenderer,
        output_dir: &Path,
    ) -> Result<RunOutcome, PipelineError> {
        let mut state = RunState::Loaded;
        let mut report = RunReport::default();
        log::info!(
            "Starting {} run for sheet '{}' of {}",
            renderer.format_name(),
            source.sheet,
            source.file
        );

        let slicing = match slice(table, &self.config.slicing) {
            Ok(slicing) => slicing,
            Err(e) => {
                advance(&mut state, RunState::Failed);
                return Err(e);
            }
        };
        report.warnings.extend(slicing.warnings.iter().cloned());
        advance(&mut state, RunState::Sliced);

        if let Err(e) = std::fs::create_dir_all(output_dir) {
            advance(&mut state, RunState::Failed);
            return Err(PipelineError::SinkWrite {
                path: output_dir.to_path_buf(),
                source: e,
            });
        }

        advance(&mut state, RunState::Rendering);
        let mut artifacts = Vec::new();
        for page in &slicing.pages {
            log::info!("Processing page {}/{}", page.page_index, slicing.pages.len());
            match renderer.render(page) {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => {
                    log::error!("Error processing page {}: {}", page.page_index, e);
                    report.page_failures.push((page.page_index, e.to_string()));
                }
            }
        }
        advance(&mut state, RunState::Rendered);

        // Each page writes to its own page-indexed location
        let mut artifact_paths = Vec::new();
        let mut written: HashMap<usize, String> = HashMap::new();
        let mut write_errors: HashMap<usize, String> = HashMap::new();
        if self.config.output.keep_individual_pages {
            for artifact in &artifacts {
                let file_name =
                    format!("page_{}.{}", artifact.page_index, renderer.file_extension());
                let path = output_dir.join(&file_name);
                match std::fs::write(&path, artifact.payload.as_bytes()) {
                    Ok(()) => {
                        log::debug!("Wrote {}", path.display());
                        written.insert(artifact.page_index, file_name);
                        artifact_paths.push(path);
                    }
                    Err(e) => {
                        let failure = format!("Could not write {}: {}", path.display(), e);
                        log::error!("{}", failure);
                        write_errors.insert(artifact.page_index, failure.clone());
                        report.sink_failures.push(failure);
                    }
                }
            }
        }

        let missing: Vec<usize> = report.page_failures.iter().map(|(page, _)| *page).collect();
        let mut combined_file: Option<String> = None;
        let mut combined_path = None;
        if self.config.output.combine_pages {
            match renderer.combine(&artifacts, &missing)?.into_bytes() {
                None => log::info!("No artifacts to combine"),
                Some(bytes) => {
                    let file_name = format!("combined_output.{}", renderer.file_extension());
                    let path = output_dir.join(&file_name);
                    match std::fs::write(&path, bytes) {
                        Ok(()) => {
                            log::info!("Combined output created: {}", path.display());
                            combined_file = Some(file_name);
                            combined_path = Some(path);
                        }
                        Err(e) => {
                            let failure = format!("Could not write {}: {}", path.display(), e);
                            log::error!("{}", failure);
                            report.sink_failures.push(failure);
                        }
                    }
                }
            }
        }
        advance(&mut state, RunState::Combined);

        let render_failures: HashMap<usize, String> =
            report.page_failures.iter().cloned().collect();
        let pages: Vec<ManifestPage> = slicing
            .pages
            .iter()
            .map(|page| {
                let error = render_failures
                    .get(&page.page_index)
                    .or_else(|| write_errors.get(&page.page_index))
                    .cloned();
                ManifestPage {
                    page_index: page.page_index,
                    start_col: page.start_col,
                    end_col: page.end_col,
                    label: self.config.output.page_label(
                        page.page_index,
                        page.start_col,
                        page.end_col_inclusive(),
                    ),
                    artifact: written.get(&page.page_index).cloned(),
                    error,
                }
            })
            .collect();

        let manifest = Manifest {
            source_file: source.file.clone(),
            sheet_name: source.sheet.clone(),
            format: renderer.format_name().to_string(),
            total_rows: table.row_count(),
            total_columns: table.column_count(),
            total_pages: slicing.pages.len(),
            partial: report.is_partial(),
            generated_at: Utc::now(),
            warnings: report.warnings.clone(),
            pages,
            combined_artifact: combined_file,
        };
        let manifest_path = manifest.write_json(output_dir)?;

        let index_path = output_dir.join("index.md");
        if let Err(e) = std::fs::write(&index_path, manifest.to_index_markdown()) {
            let failure = format!("Could not write {}: {}", index_path.display(), e);
            log::warn!("{}", failure);
            report.sink_failures.push(failure);
        }

        advance(&mut state, RunState::Done);
        log::info!(
            "Run completed: {} pages, {} render failures, {} sink failures",
            slicing.pages.len(),
            report.page_failures.len(),
            report.sink_failures.len()
        );
        Ok(RunOutcome {
            state,
            total_pages: slicing.pages.len(),
            artifact_paths,
            combined_path,
            manifest_path,
            report,
        })
    }
}

fn advance(state: &mut RunState, next: RunState) {
    debug_assert!(
        state.may_advance_to(next),
        "illegal state transition {:?} -> {:?}",
        state,
        next
    );
    log::debug!("Pipeline state: {:?} -> {:?}", state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_slicer::Page;
    use crate::combiner;
    use crate::error::PipelineError;
    use crate::markdown_renderer::MarkdownRenderer;
    use crate::renderer::{Payload, RenderedArtifact};
    use crate::table_model::{CellValue, Table};

    fn table(columns: usize, rows: usize) -> Table {
        let names = (0..columns).map(|i| format!("c{}", i)).collect();
        let rows = (0..rows)
            .map(|r| (0..columns).map(|c| CellValue::Number((r + c) as f64)).collect())
            .collect();
        Table::new(names, rows)
    }

    fn source() -> SourceInfo {
        SourceInfo {
            file: "data.xlsx".to_string(),
            sheet: "Sheet1".to_string(),
        }
    }

    /// Renderer that fails on one designated page.
    struct FlakyRenderer {
        fail_page: usize,
    }

    impl PageRenderer for FlakyRenderer {
        fn format_name(&self) -> &'static str {
            "markdown"
        }

        fn file_extension(&self) -> &'static str {
            "md"
        }

        fn render(&self, page: &Page) -> Result<RenderedArtifact, PipelineError> {
            if page.page_index == self.fail_page {
                return Err(PipelineError::PageRender {
                    page: page.page_index,
                    reason: "synthetic failure".to_string(),
                });
            }
            Ok(RenderedArtifact {
                page_index: page.page_index,
                start_col: page.start_col,
                end_col: page.end_col,
                label: format!("Page {}", page.page_index),
                payload: Payload::Text(format!("body {}", page.page_index)),
            })
        }

        fn combine(
            &self,
            artifacts: &[RenderedArtifact],
            missing: &[usize],
        ) -> Result<combiner::Combined, PipelineError> {
            combiner::combine_text(artifacts, missing)
        }
    }

    #[test]
    fn test_full_run_writes_pages_combined_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config);
        let renderer = MarkdownRenderer::new(config.output.clone());
        let t = table(30, 4);

        let outcome = pipeline
            .run(&t, &source(), &renderer, dir.path())
            .unwrap();

        assert_eq!(outcome.state, RunState::Done);
        assert_eq!(outcome.total_pages, 3);
        assert!(!outcome.is_partial());
        assert_eq!(outcome.artifact_paths.len(), 3);
        for n in 1..=3 {
            assert!(dir.path().join(format!("page_{}.md", n)).exists());
        }
        assert!(dir.path().join("combined_output.md").exists());
        assert!(dir.path().join("index.json").exists());
        assert!(dir.path().join("index.md").exists());
    }

    #[test]
    fn test_partial_failure_containment() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config);
        let renderer = FlakyRenderer { fail_page: 2 };
        let t = table(30, 4);

        let outcome = pipeline
            .run(&t, &source(), &renderer, dir.path())
            .unwrap();

        assert_eq!(outcome.state, RunState::Done);
        assert!(outcome.is_partial());
        assert_eq!(outcome.report.page_failures.len(), 1);
        assert_eq!(outcome.report.page_failures[0].0, 2);
        assert_eq!(outcome.artifact_paths.len(), 2);
        assert!(!dir.path().join("page_2.md").exists());
        assert!(dir.path().join("combined_output.md").exists());

        let manifest: crate::manifest::Manifest = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("index.json")).unwrap(),
        )
        .unwrap();
        assert!(manifest.partial);
        assert_eq!(manifest.failed_pages(), vec![2]);
        assert!(manifest.pages[1].artifact.is_none());
    }

    #[test]
    fn test_invalid_configuration_fails_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.slicing.max_columns_per_page = 0;
        let pipeline = Pipeline::new(&config);
        let renderer = MarkdownRenderer::new(config.output.clone());

        let result = pipeline.run(&table(5, 2), &source(), &renderer, dir.path());
        assert!(matches!(
            result,
            Err(PipelineError::InvalidConfiguration(_))
        ));
        assert!(!dir.path().join("index.json").exists());
    }

    #[test]
    fn test_zero_column_table_produces_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default();
        let pipeline = Pipeline::new(&config);
        let renderer = MarkdownRenderer::new(config.output.clone());

        let outcome = pipeline
            .run(&table(0, 0), &source(), &renderer, dir.path())
            .unwrap();

        assert_eq!(outcome.state, RunState::Done);
        assert_eq!(outcome.total_pages, 0);
        assert!(outcome.combined_path.is_none());
        let manifest: crate::manifest::Manifest = serde_json::from_str(
            &std::fs::read_to_string(outcome.manifest_path).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest.total_pages, 0);
        assert!(manifest.pages.is_empty());
    }

    #[test]
    fn test_combined_only_run_skips_page_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.output.keep_individual_pages = false;
        let pipeline = Pipeline::new(&config);
        let renderer = MarkdownRenderer::new(config.output.clone());

        let outcome = pipeline
            .run(&table(30, 4), &source(), &renderer, dir.path())
            .unwrap();

        assert!(outcome.artifact_paths.is_empty());
        assert!(!dir.path().join("page_1.md").exists());
        assert!(dir.path().join("combined_output.md").exists());
    }

    #[test]
    fn test_state_transitions() {
        assert!(RunState::Loaded.may_advance_to(RunState::Sliced));
        assert!(RunState::Loaded.may_advance_to(RunState::Failed));
        assert!(RunState::Sliced.may_advance_to(RunState::Failed));
        assert!(!RunState::Rendering.may_advance_to(RunState::Failed));
        assert!(!RunState::Rendered.may_advance_to(RunState::Done));
        assert!(!RunState::Done.may_advance_to(RunState::Failed));
    }
}
