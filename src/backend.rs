//! Backend selection and dispatch.
//!
//! A run uses exactly one backend, chosen once from the configuration:
//! the remote API, a local Ollama model, or a clipboard hand-off.

use crate::{
    clipboard::{ClipboardBackend, SystemClipboard},
    config::Config,
    error::{Error, Result},
    ollama::{LocalBackend, OllamaRuntime},
    openai::OpenAiBackend,
    prompt::EnhancementRequest,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery mechanism for enhancement requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Remote OpenAI-compatible chat completions API
    Api,
    /// Local model served by the Ollama runtime
    Local,
    /// Copy prompts to the system clipboard for manual use
    Clipboard,
}

impl BackendKind {
    /// Returns the ID string for this backend.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Local => "local",
            Self::Clipboard => "clipboard",
        }
    }

    /// Maps the two mode flags onto a backend.
    ///
    /// Neither flag selects the API.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when both flags are set.
    pub fn from_flags(clipboard_mode: bool, local_llm: bool) -> Result<Self> {
        match (clipboard_mode, local_llm) {
            (false, false) => Ok(Self::Api),
            (true, false) => Ok(Self::Clipboard),
            (false, true) => Ok(Self::Local),
            (true, true) => Err(Error::config(
                "clipboard_mode and local_llm are mutually exclusive; enable only one",
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Successful result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Enhanced code returned by a model
    Enhanced(String),
    /// Prompt handed to the operator; no text was captured
    HandedOff(String),
}

/// A strategy that turns an enhancement request into an outcome.
///
/// Implementations return [`Error::Dispatch`] for failures that only affect
/// the current file; any other error aborts the run.
pub trait Backend {
    /// Returns which backend this is.
    fn kind(&self) -> BackendKind;

    /// Runs deferred startup checks. Called once, before the first result of
    /// the run is recorded.
    ///
    /// # Errors
    ///
    /// Returns a fatal error when the backend cannot work at all.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Sends one request.
    ///
    /// # Errors
    ///
    /// Returns a per-file dispatch error, or a fatal error when the backend
    /// cannot work at all.
    fn enhance(&mut self, request: &EnhancementRequest) -> Result<Outcome>;
}

/// Constructs the backend selected by `config`.
///
/// Startup checks happen here: the API backend loads its key, and the
/// clipboard backend opens the system clipboard. The local backend defers its
/// model check to [`Backend::prepare`].
///
/// # Errors
///
/// Returns a credential error for a missing or invalid API key, or a
/// clipboard error if the clipboard cannot be opened.
pub fn create_backend(config: &Config) -> Result<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match config.backend {
        BackendKind::Api => Box::new(OpenAiBackend::from_config(config)?),
        BackendKind::Local => Box::new(LocalBackend::new(
            OllamaRuntime::new(),
            config.ollama_model.clone(),
        )),
        BackendKind::Clipboard => Box::new(ClipboardBackend::new(
            SystemClipboard::new()?,
            config.clipboard_confirm,
        )),
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(BackendKind::from_flags(false, false).unwrap(), BackendKind::Api);
        assert_eq!(BackendKind::from_flags(true, false).unwrap(), BackendKind::Clipboard);
        assert_eq!(BackendKind::from_flags(false, true).unwrap(), BackendKind::Local);
        assert!(BackendKind::from_flags(true, true).unwrap_err().is_config());
    }

    #[test]
    fn test_backend_ids() {
        assert_eq!(BackendKind::Api.to_string(), "api");
        assert_eq!(BackendKind::Local.id(), "local");
        assert_eq!(
            serde_json::to_string(&BackendKind::Clipboard).unwrap(),
            "\"clipboard\""
        );
    }

    #[test]
    fn test_create_api_backend_requires_credentials() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder()
            .input_directory(temp.path())
            .api_key_path(temp.path().join(".secret"))
            .build()
            .unwrap();

        let err = create_backend(&config).err().unwrap();
        assert!(err.is_credential());
    }

    #[test]
    fn test_create_api_backend() {
        let temp = assert_fs::TempDir::new().unwrap();
        let secret = temp.child(".secret");
        secret.write_str(r#"{"openai_api_key": "sk-test"}"#).unwrap();

        let config = Config::builder()
            .input_directory(temp.path())
            .api_key_path(secret.path())
            .build()
            .unwrap();

        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.kind(), BackendKind::Api);
    }

    #[test]
    fn test_create_local_backend_is_lazy() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder()
            .input_directory(temp.path())
            .backend(BackendKind::Local)
            .build()
            .unwrap();

        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.kind(), BackendKind::Local);
    }
}
