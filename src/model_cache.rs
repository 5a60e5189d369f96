use crate::error::{Error, Result};
use std::collections::HashSet;
use tracing::{debug, info};

/// Operations offered by a local model runtime.
pub trait ModelRuntime {
    /// Returns true if `model` is present in the local model store.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be queried.
    fn is_cached(&self, model: &str) -> Result<bool>;

    /// Downloads `model`, blocking until the pull finishes.
    ///
    /// # Errors
    ///
    /// Returns an error if the pull fails.
    fn pull(&self, model: &str) -> Result<()>;

    /// Runs `model` on `prompt` and returns its output.
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if generation fails.
    fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Makes sure models are present before use, checking each one at most once
/// per run.
#[derive(Debug)]
pub struct ModelCache<R> {
    runtime: R,
    ensured: HashSet<String>,
}

impl<R: ModelRuntime> ModelCache<R> {
    /// Wraps a runtime.
    #[must_use]
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            ensured: HashSet::new(),
        }
    }

    /// Returns the wrapped runtime.
    #[must_use]
    pub const fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Pulls `model` if the runtime does not have it yet.
    ///
    /// After a success, further calls for the same model return immediately
    /// without touching the runtime.
    ///
    /// # Errors
    ///
    /// Returns a model unavailable error if the runtime cannot be reached,
    /// or the pull fails.
    pub fn ensure_available(&mut self, model: &str) -> Result<()> {
        if self.ensured.contains(model) {
            return Ok(());
        }

        let cached = self
            .runtime
            .is_cached(model)
            .map_err(|e| as_unavailable(model, e))?;

        if cached {
            debug!("Model '{}' is already cached", model);
        } else {
            info!("Model '{}' not found locally, pulling (this may take a while)...", model);
            self.runtime
                .pull(model)
                .map_err(|e| as_unavailable(model, e))?;
            info!("✓ Pulled model '{}'", model);
        }

        self.ensured.insert(model.to_string());
        Ok(())
    }
}

fn as_unavailable(model: &str, error: Error) -> Error {
    match error {
        Error::ModelUnavailable { .. } => error,
        other => Error::model_unavailable(model, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRuntime;

    #[test]
    fn test_ensure_available_pulls_missing_model_once() {
        let runtime = FakeRuntime::new(&[]);
        let mut cache = ModelCache::new(runtime.clone());

        cache.ensure_available("mistral").unwrap();
        cache.ensure_available("mistral").unwrap();

        assert_eq!(runtime.pulls(), vec!["mistral".to_string()]);
        assert_eq!(runtime.list_calls(), 1);
    }

    #[test]
    fn test_ensure_available_skips_pull_for_cached_model() {
        let runtime = FakeRuntime::new(&["mistral"]);
        let mut cache = ModelCache::new(runtime.clone());

        cache.ensure_available("mistral").unwrap();

        assert!(runtime.pulls().is_empty());
    }

    #[test]
    fn test_ensure_available_tracks_models_separately() {
        let runtime = FakeRuntime::new(&[]);
        let mut cache = ModelCache::new(runtime.clone());

        cache.ensure_available("mistral").unwrap();
        cache.ensure_available("llama3").unwrap();
        cache.ensure_available("mistral").unwrap();

        assert_eq!(runtime.pulls(), vec!["mistral".to_string(), "llama3".to_string()]);
    }

    #[test]
    fn test_failed_pull_is_model_unavailable() {
        let runtime = FakeRuntime::new(&[]).failing_pull("manifest not found");
        let mut cache = ModelCache::new(runtime.clone());

        let err = cache.ensure_available("nope").unwrap_err();

        assert!(err.is_model_unavailable());
        assert!(err.is_fatal());
        assert!(err.to_string().contains("manifest not found"));
    }

    #[test]
    fn test_failed_pull_is_retried_on_next_call() {
        let runtime = FakeRuntime::new(&[]).failing_pull("offline");
        let mut cache = ModelCache::new(runtime.clone());

        assert!(cache.ensure_available("mistral").is_err());
        assert!(cache.ensure_available("mistral").is_err());

        assert_eq!(runtime.pulls().len(), 2);
    }
}
