//! In-crate test doubles for the backend seams.

use crate::{
    backend::{Backend, BackendKind, Outcome},
    clipboard::ClipboardSink,
    error::{Error, Result},
    model_cache::ModelRuntime,
    prompt::EnhancementRequest,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct RuntimeState {
    cached: HashSet<String>,
    pulls: Vec<String>,
    list_calls: usize,
    generate_calls: usize,
    generated: Vec<String>,
}

/// Model runtime that keeps its model store in memory.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeRuntime {
    state: Arc<Mutex<RuntimeState>>,
    pull_error: Option<String>,
    fail_generate_on: Vec<usize>,
}

impl FakeRuntime {
    pub(crate) fn new(cached: &[&str]) -> Self {
        let runtime = Self::default();
        runtime
            .state
            .lock()
            .unwrap()
            .cached
            .extend(cached.iter().map(|m| (*m).to_string()));
        runtime
    }

    pub(crate) fn failing_pull(mut self, message: &str) -> Self {
        self.pull_error = Some(message.to_string());
        self
    }

    /// Fails the n-th (1-based) generate call.
    pub(crate) fn failing_generate_on(mut self, call: usize) -> Self {
        self.fail_generate_on.push(call);
        self
    }

    pub(crate) fn pulls(&self) -> Vec<String> {
        self.state.lock().unwrap().pulls.clone()
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub(crate) fn generated(&self) -> Vec<String> {
        self.state.lock().unwrap().generated.clone()
    }
}

impl ModelRuntime for FakeRuntime {
    fn is_cached(&self, model: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        Ok(state.cached.contains(model))
    }

    fn pull(&self, model: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pulls.push(model.to_string());
        match &self.pull_error {
            Some(message) => Err(Error::model_unavailable(model, message.clone())),
            None => {
                state.cached.insert(model.to_string());
                Ok(())
            }
        }
    }

    fn generate(&self, _model: &str, prompt: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.generate_calls += 1;
        if self.fail_generate_on.contains(&state.generate_calls) {
            return Err(Error::dispatch("runtime exited with status 1"));
        }
        state.generated.push(prompt.to_string());
        Ok("enhanced by fake runtime".to_string())
    }
}

/// Clipboard that remembers everything copied to it.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingClipboard {
    texts: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingClipboard {
    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

impl ClipboardSink for RecordingClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        if self.fail {
            return Err(Error::dispatch("clipboard is locked"));
        }
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Backend with scripted per-call failures.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedBackend {
    kind: BackendKind,
    fail_on: Vec<usize>,
    requests: Arc<Mutex<Vec<EnhancementRequest>>>,
}

impl ScriptedBackend {
    pub(crate) fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            fail_on: Vec::new(),
            requests: Arc::default(),
        }
    }

    /// Fails the n-th (1-based) request with a per-file error.
    pub(crate) fn failing_on(mut self, call: usize) -> Self {
        self.fail_on.push(call);
        self
    }

    pub(crate) fn requests(&self) -> Vec<EnhancementRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Backend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn enhance(&mut self, request: &EnhancementRequest) -> Result<Outcome> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        if self.fail_on.contains(&requests.len()) {
            return Err(Error::dispatch("API returned 429 Too Many Requests: Rate limit reached"));
        }
        Ok(Outcome::Enhanced(format!(
            "# enhanced\n{}",
            request.relative_path.display()
        )))
    }
}
