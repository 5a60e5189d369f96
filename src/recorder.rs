use crate::{
    backend::{BackendKind, Outcome},
    config::Config,
    error::{Error, Result},
};
use serde::Serialize;
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultStatus {
    /// The backend returned enhanced code
    Enhanced {
        /// Enhanced code
        text: String,
    },
    /// The prompt was handed to the operator
    HandedOff {
        /// Placeholder note
        note: String,
    },
    /// The file could not be processed
    Failed {
        /// Error description
        error: String,
    },
}

/// Outcome of processing one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancementResult {
    /// Path relative to the input directory
    pub relative_path: PathBuf,

    /// Backend used for the run
    pub backend: BackendKind,

    /// Success payload or failure description
    pub status: ResultStatus,
}

impl EnhancementResult {
    /// Creates a success result from a backend outcome.
    #[must_use]
    pub fn success(relative_path: PathBuf, backend: BackendKind, outcome: Outcome) -> Self {
        let status = match outcome {
            Outcome::Enhanced(text) => ResultStatus::Enhanced { text },
            Outcome::HandedOff(note) => ResultStatus::HandedOff { note },
        };
        Self {
            relative_path,
            backend,
            status,
        }
    }

    /// Creates a failure result.
    #[must_use]
    pub fn failure(relative_path: PathBuf, backend: BackendKind, error: &Error) -> Self {
        Self {
            relative_path,
            backend,
            status: ResultStatus::Failed {
                error: error.to_string(),
            },
        }
    }

    /// Returns true unless the file failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self.status, ResultStatus::Failed { .. })
    }
}

/// One line of the results file.
#[derive(Debug, Serialize)]
struct ResultRecord<'a> {
    timestamp: String,
    path: String,
    backend: BackendKind,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Persists results: one JSON line per file in `results_file`, plus the
/// enhanced text mirrored under `output_dir` when one is configured.
///
/// The results file is opened in append mode on the first record, so a run
/// that records nothing leaves it untouched.
pub struct Recorder {
    results_file: PathBuf,
    output_dir: Option<PathBuf>,
    backup_existing: bool,
    handle: Option<File>,
    records: usize,
}

impl Recorder {
    /// Creates a recorder from configuration. Touches nothing on disk.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            results_file: config.results_file.clone(),
            output_dir: config.output_dir.clone(),
            backup_existing: config.backup_existing,
            handle: None,
            records: 0,
        }
    }

    /// Returns how many records were appended.
    #[must_use]
    pub const fn records(&self) -> usize {
        self.records
    }

    /// Persists one result.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the output file or the results record
    /// cannot be written.
    pub fn record(&mut self, result: &EnhancementResult) -> Result<()> {
        let output_path = match (&result.status, &self.output_dir) {
            (ResultStatus::Enhanced { text }, Some(output_dir)) => {
                let path = output_dir.join(&result.relative_path);
                self.write_output(&path, text)?;
                Some(path)
            }
            _ => None,
        };

        let (content, note, error) = match &result.status {
            ResultStatus::Enhanced { text } if output_path.is_none() => (Some(text.as_str()), None, None),
            ResultStatus::Enhanced { .. } => (None, None, None),
            ResultStatus::HandedOff { note } => (None, Some(note.as_str()), None),
            ResultStatus::Failed { error } => (None, None, Some(error.as_str())),
        };

        let record = ResultRecord {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            path: result.relative_path.to_string_lossy().to_string(),
            backend: result.backend,
            success: result.is_success(),
            output_path: output_path.map(|p| p.display().to_string()),
            content,
            note,
            error,
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        self.append(&line)?;

        self.records += 1;
        debug!(
            "Recorded {} ({})",
            result.relative_path.display(),
            if record.success { "success" } else { "failure" }
        );
        Ok(())
    }

    fn append(&mut self, line: &str) -> Result<()> {
        if self.handle.is_none() {
            if let Some(parent) = self.results_file.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.results_file)
                .map_err(|e| Error::persistence(&self.results_file, e))?;
            self.handle = Some(file);
        }

        if let Some(file) = self.handle.as_mut() {
            file.write_all(line.as_bytes())
                .and_then(|()| file.flush())
                .map_err(|e| Error::persistence(&self.results_file, e))?;
        }
        Ok(())
    }

    /// Writes an enhanced file atomically with optional backup.
    ///
    /// # Process
    ///
    /// 1. Creates parent directories
    /// 2. Creates backup if file exists and backup is enabled
    /// 3. Writes content to a temporary sibling and syncs it
    /// 4. Renames the temporary file onto the target path
    fn write_output(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
        }

        if path.exists() && self.backup_existing {
            Self::backup_file(path)?;
        }

        let temp_path = sibling_with_suffix(path, "tmp", true);
        let mut temp_file = File::create(&temp_path).map_err(|e| Error::persistence(&temp_path, e))?;

        temp_file
            .write_all(content.as_bytes())
            .and_then(|()| temp_file.sync_all())
            .map_err(|e| Error::persistence(&temp_path, e))?;

        drop(temp_file);

        fs::rename(&temp_path, path).map_err(|e| Error::persistence(path, e))?;

        debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Creates a timestamped copy of an existing output file.
    fn backup_file(path: &Path) -> Result<()> {
        let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S%f").to_string();
        let backup_path = sibling_with_suffix(path, &format!("backup.{timestamp}"), false);

        fs::copy(path, &backup_path).map_err(|e| Error::persistence(&backup_path, e))?;

        debug!("Created backup: {}", backup_path.display());
        Ok(())
    }
}

/// Returns `dir/name.suffix`, or `dir/.name.suffix` when `hidden`.
fn sibling_with_suffix(path: &Path, suffix: &str, hidden: bool) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let dot = if hidden { "." } else { "" };
    path.with_file_name(format!("{dot}{name}.{suffix}"))
}
