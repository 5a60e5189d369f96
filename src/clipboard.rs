//! Clipboard hand-off backend.
//!
//! Prompts are placed on the system clipboard for the operator to paste into
//! an assistant of their choice. No enhanced text comes back into the run.

use crate::{
    backend::{Backend, BackendKind, Outcome},
    error::{Error, Result},
    prompt::EnhancementRequest,
};
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

/// Note recorded for every clipboard hand-off.
pub const HANDOFF_NOTE: &str = "copied to clipboard, awaiting manual paste";

/// Somewhere a prompt can be copied to.
pub trait ClipboardSink {
    /// Replaces the clipboard content with `text`.
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the write fails.
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// The operating system clipboard.
///
/// The handle stays open for the whole run; on Linux the copied text is only
/// served while it is alive.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    /// Opens the system clipboard.
    ///
    /// # Errors
    ///
    /// Returns a clipboard error if no clipboard is available.
    pub fn new() -> Result<Self> {
        let inner = arboard::Clipboard::new()
            .map_err(|e| Error::clipboard(format!("failed to initialize clipboard: {e}")))?;
        Ok(Self { inner })
    }
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.inner
            .set_text(text.to_string())
            .map_err(|e| Error::dispatch(format!("failed to copy to clipboard: {e}")))
    }
}

/// Backend that copies each prompt to a clipboard.
pub struct ClipboardBackend<S> {
    sink: S,
    confirm: bool,
}

impl<S: ClipboardSink> ClipboardBackend<S> {
    /// Creates the backend. With `confirm`, every hand-off waits for the
    /// operator to press Enter before the run moves on.
    #[must_use]
    pub const fn new(sink: S, confirm: bool) -> Self {
        Self { sink, confirm }
    }

    fn wait_for_operator(request: &EnhancementRequest) {
        show_prompt(&mut io::stdout(), request);

        let mut line = String::new();
        if let Err(e) = io::stdin().lock().read_line(&mut line) {
            warn!("Cannot read confirmation from stdin: {}", e);
        }
    }
}

impl<S: ClipboardSink> Backend for ClipboardBackend<S> {
    fn kind(&self) -> BackendKind {
        BackendKind::Clipboard
    }

    fn enhance(&mut self, request: &EnhancementRequest) -> Result<Outcome> {
        self.sink.set_text(&request.prompt)?;
        info!("Copied prompt for {} to clipboard", request.relative_path.display());

        if self.confirm {
            Self::wait_for_operator(request);
        }

        Ok(Outcome::HandedOff(HANDOFF_NOTE.to_string()))
    }
}

/// Tells the operator which file is waiting on the clipboard.
fn show_prompt(out: &mut impl Write, request: &EnhancementRequest) {
    let shown = write!(
        out,
        "Prompt for {} is on the clipboard. Paste it, then press Enter to continue...",
        request.relative_path.display()
    )
    .and_then(|()| out.flush());

    if let Err(e) = shown {
        warn!("Cannot show confirmation prompt: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingClipboard;
    use std::path::PathBuf;

    #[test]
    fn test_clipboard_receives_full_prompt() {
        let clipboard = RecordingClipboard::default();
        let mut backend = ClipboardBackend::new(clipboard.clone(), false);
        let request = EnhancementRequest {
            relative_path: PathBuf::from("a.py"),
            prompt: "instruction\n\nprint(1)".to_string(),
        };

        let outcome = backend.enhance(&request).unwrap();

        assert_eq!(clipboard.texts(), vec!["instruction\n\nprint(1)".to_string()]);
        assert_eq!(outcome, Outcome::HandedOff(HANDOFF_NOTE.to_string()));
        assert_eq!(backend.kind(), BackendKind::Clipboard);
    }

    #[test]
    fn test_clipboard_write_failure_is_per_file() {
        let clipboard = RecordingClipboard::default().failing();
        let mut backend = ClipboardBackend::new(clipboard, false);
        let request = EnhancementRequest {
            relative_path: PathBuf::from("a.py"),
            prompt: "x".to_string(),
        };

        let err = backend.enhance(&request).unwrap_err();
        assert!(!err.is_fatal());
    }

    struct UnflushableOutput(Vec<u8>);

    impl Write for UnflushableOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_show_prompt_names_file() {
        let mut out = Vec::new();
        let request = EnhancementRequest {
            relative_path: PathBuf::from("pkg/a.py"),
            prompt: "x".to_string(),
        };

        show_prompt(&mut out, &request);

        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("pkg/a.py"));
        assert!(shown.contains("press Enter"));
    }

    #[test]
    fn test_show_prompt_survives_flush_failure() {
        let mut out = UnflushableOutput(Vec::new());
        let request = EnhancementRequest {
            relative_path: PathBuf::from("a.py"),
            prompt: "x".to_string(),
        };

        show_prompt(&mut out, &request);

        assert!(String::from_utf8(out.0).unwrap().contains("a.py"));
    }
}
