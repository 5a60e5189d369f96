use crate::{
    backend::{Backend, BackendKind, create_backend},
    config::Config,
    discovery::{DiscoveredFile, Discovery},
    error::{Error, Result},
    file::SourceFile,
    prompt::EnhancementRequest,
    recorder::{EnhancementResult, Recorder},
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Statistics collected during a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    /// Backend used for the run
    pub backend: BackendKind,

    /// Number of results recorded
    pub total_files: usize,

    /// Files enhanced or handed off
    pub succeeded: usize,

    /// Files that failed
    pub failed: usize,

    /// Files skipped during discovery
    pub skipped: usize,

    /// Total execution time
    pub duration: Duration,

    /// Results file path
    pub results_file: String,

    /// Output directory path, if any
    pub output_directory: Option<String>,
}

impl RunStats {
    /// Returns true if no file was processed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_files == 0
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              Enhancement Run Summary                  ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Backend:              {:>8}                        ║",
            self.backend.id()
        );
        println!(
            "║ Files Processed:      {:>8}                        ║",
            self.total_files
        );
        println!(
            "║   - Succeeded:        {:>8}                        ║",
            self.succeeded
        );
        println!(
            "║   - Failed:           {:>8}                        ║",
            self.failed
        );
        println!(
            "║ Files Skipped:        {:>8}                        ║",
            self.skipped
        );
        println!("║                                                       ║");
        println!("║ Results File:                                         ║");
        println!("║   {}", self.results_file);
        if let Some(output) = &self.output_directory {
            println!("║ Output Directory:                                     ║");
            println!("║   {output}");
        }
        println!("║                                                       ║");
        println!(
            "║ Total Time:           {:>8.2}s                       ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Orchestrates discovery, prompting, dispatch and recording.
///
/// Files are processed one at a time in discovery order. Per-file failures
/// are recorded and the run continues; fatal errors stop it immediately.
pub struct Pipeline {
    config: Config,
    backend: Box<dyn Backend>,
}

impl Pipeline {
    /// Creates a pipeline with the backend selected by `config`.
    ///
    /// Backend startup checks (such as loading the API key) run here, before
    /// any file is discovered.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation or backend creation fails.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let backend = create_backend(&config)?;
        Ok(Self { config, backend })
    }

    /// Creates a pipeline around an existing backend.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the backend's kind differs from the
    /// one selected in `config`.
    pub fn with_backend(config: Config, backend: Box<dyn Backend>) -> Result<Self> {
        config.validate()?;
        if backend.kind() != config.backend {
            return Err(Error::config(format!(
                "backend '{}' does not match configured mode '{}'",
                backend.kind(),
                config.backend
            )));
        }
        Ok(Self { config, backend })
    }

    /// Executes the run and returns statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery cannot start, the backend fails fatally,
    /// or results cannot be persisted.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llm_enhance::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .input_directory("./src")
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config)?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(input = %self.config.input_directory.display(), backend = %self.config.backend))]
    pub fn run(mut self) -> Result<RunStats> {
        let start_time = Instant::now();

        info!("Starting enhancement run");

        let mut discovery = Discovery::new(&self.config)?;
        let mut recorder = Recorder::new(&self.config);
        let mut succeeded = 0;
        let mut failed = 0;

        for (index, item) in discovery.by_ref().enumerate() {
            if index == 0 {
                self.backend.prepare()?;
            }

            let result = self.process(item)?;

            if result.is_success() {
                succeeded += 1;
                info!("[{}] ✓ {}", index + 1, result.relative_path.display());
            } else {
                failed += 1;
                warn!("[{}] ✗ {}", index + 1, result.relative_path.display());
            }

            recorder.record(&result)?;
        }

        let discovery_stats = discovery.stats();
        let total_files = recorder.records();

        if total_files == 0 {
            warn!(
                "No files matching the configured extensions were found in {}",
                self.config.input_directory.display()
            );
        }

        let stats = RunStats {
            backend: self.config.backend,
            total_files,
            succeeded,
            failed,
            skipped: discovery_stats.skipped,
            duration: start_time.elapsed(),
            results_file: self.config.results_file.display().to_string(),
            output_directory: self
                .config
                .output_dir
                .as_ref()
                .map(|p| p.display().to_string()),
        };

        info!(
            "✓ Run completed: {} succeeded, {} failed in {:.2}s",
            stats.succeeded,
            stats.failed,
            stats.duration.as_secs_f64()
        );

        Ok(stats)
    }

    /// Turns one discovery item into a result. Only fatal errors escape.
    fn process(&mut self, item: Result<DiscoveredFile>) -> Result<EnhancementResult> {
        let kind = self.backend.kind();

        let discovered = match item {
            Ok(discovered) => discovered,
            Err(e) => {
                let path = match &e {
                    Error::Io { path, .. } => std::path::absolute(&self.config.input_directory)
                        .ok()
                        .and_then(|root| pathdiff::diff_paths(path, root))
                        .unwrap_or_else(|| path.clone()),
                    _ => self.config.input_directory.clone(),
                };
                return Ok(EnhancementResult::failure(path, kind, &e));
            }
        };

        let file = match SourceFile::read(&discovered) {
            Ok(file) => file,
            Err(e) => {
                warn!("Cannot read {}: {}", discovered.relative_path.display(), e);
                return Ok(EnhancementResult::failure(discovered.relative_path, kind, &e));
            }
        };

        debug!(
            "Read {} ({} bytes, {} lines)",
            file.display_path(),
            file.size_bytes(),
            file.line_count()
        );

        let request = EnhancementRequest::for_file(&file);
        let relative_path: PathBuf = request.relative_path.clone();

        match self.backend.enhance(&request) {
            Ok(outcome) => Ok(EnhancementResult::success(relative_path, kind, outcome)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Enhancement failed for {}: {}", relative_path.display(), e);
                Ok(EnhancementResult::failure(relative_path, kind, &e))
            }
        }
    }
}
