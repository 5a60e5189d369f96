//! Local model backend driven through the `ollama` command-line tool.

use crate::{
    backend::{Backend, BackendKind, Outcome},
    error::{Error, Result},
    model_cache::{ModelCache, ModelRuntime},
    prompt::{EnhancementRequest, strip_code_fence},
};
use std::ffi::OsString;
use std::io::{self, Write};
use std::process::{Command, Output, Stdio};
use std::thread;
use tracing::{debug, trace};

const OLLAMA_BINARY: &str = "ollama";

/// Runtime that shells out to `ollama list`, `ollama pull` and `ollama run`.
#[derive(Debug, Clone)]
pub struct OllamaRuntime {
    program: OsString,
    leading_args: Vec<OsString>,
}

impl Default for OllamaRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaRuntime {
    /// Uses `ollama` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_command(OLLAMA_BINARY, Vec::<OsString>::new())
    }

    /// Uses a custom program, with arguments placed before each subcommand.
    #[must_use]
    pub fn with_command<I, S>(program: impl Into<OsString>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            leading_args: leading_args.into_iter().map(Into::into).collect(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.leading_args).args(args);
        command
    }

    fn spawn_error(&self, model: &str, error: &io::Error) -> Error {
        if error.kind() == io::ErrorKind::NotFound {
            Error::model_unavailable(
                model,
                format!(
                    "'{}' is not installed or not on PATH",
                    self.program.to_string_lossy()
                ),
            )
        } else {
            Error::model_unavailable(model, format!("cannot start runtime: {error}"))
        }
    }
}

impl ModelRuntime for OllamaRuntime {
    fn is_cached(&self, model: &str) -> Result<bool> {
        let output = self
            .command(&["list"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(model, &e))?;

        if !output.status.success() {
            return Err(Error::model_unavailable(model, diagnostic(&output)));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        Ok(list_contains(&listing, model))
    }

    fn pull(&self, model: &str) -> Result<()> {
        let output = self
            .command(&["pull", model])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(model, &e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::model_unavailable(model, diagnostic(&output)))
        }
    }

    fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let mut child = self
            .command(&["run", model])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::dispatch(format!("cannot start runtime: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::dispatch("runtime stdin is unavailable"))?;

        // Feed stdin from a separate thread so a full stdout pipe cannot
        // block the child while we are still writing.
        let prompt = prompt.to_string();
        let writer = thread::spawn(move || stdin.write_all(prompt.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|e| Error::dispatch(format!("runtime did not finish: {e}")))?;

        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => trace!("Runtime closed stdin early: {}", e),
            Err(_) => return Err(Error::dispatch("stdin writer panicked")),
        }

        if !output.status.success() {
            return Err(Error::dispatch(format!(
                "ollama run failed: {}",
                diagnostic(&output)
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        if text.trim().is_empty() {
            return Err(Error::dispatch("ollama run produced no output"));
        }

        Ok(text)
    }
}

/// Returns true if an `ollama list` table names `model`.
///
/// A model without an explicit tag matches its `:latest` entry.
fn list_contains(listing: &str, model: &str) -> bool {
    let wanted_latest = (!model.contains(':')).then(|| format!("{model}:latest"));

    listing
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .any(|name| name == model || wanted_latest.as_deref() == Some(name))
}

fn diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();

    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr.to_string()
    }
}

/// Backend that runs each prompt through a local model.
///
/// The model is checked (and pulled if needed) in [`Backend::prepare`], or at
/// the latest right before the first request; a failure there is fatal to the
/// run.
#[derive(Debug)]
pub struct LocalBackend<R> {
    cache: ModelCache<R>,
    model: String,
}

impl<R: ModelRuntime> LocalBackend<R> {
    /// Creates a backend for `model` on `runtime`.
    #[must_use]
    pub fn new(runtime: R, model: String) -> Self {
        Self {
            cache: ModelCache::new(runtime),
            model,
        }
    }
}

impl<R: ModelRuntime> Backend for LocalBackend<R> {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn prepare(&mut self) -> Result<()> {
        self.cache.ensure_available(&self.model)
    }

    fn enhance(&mut self, request: &EnhancementRequest) -> Result<Outcome> {
        self.cache.ensure_available(&self.model)?;

        debug!(
            "Running {} on {} ({} prompt bytes)",
            self.model,
            request.relative_path.display(),
            request.prompt.len()
        );

        self.cache
            .runtime()
            .generate(&self.model, &request.prompt)
            .map(|reply| Outcome::Enhanced(strip_code_fence(&reply).to_string()))
    }
}
