//! # llm-enhance
//!
//! Batch-enhance source files with a language model.
//!
//! ## Features
//!
//! - Deterministic recursive discovery filtered by file extension
//! - Three interchangeable backends: a remote chat-completion API, a local
//!   model run through `ollama`, or a clipboard hand-off to the operator
//! - Automatic local model retrieval before the first request
//! - Layered configuration: command line over `config.yaml` over defaults
//! - JSON Lines results log plus an optional mirrored output tree
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_enhance::{BackendKind, Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .input_directory("./src")
//!     .output_dir("./enhanced")
//!     .backend(BackendKind::Local)
//!     .ollama_model("mistral")
//!     .build()?;
//!
//! Pipeline::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Discovery**: Walks the input directory in a stable order
//! 2. **Prompt**: Wraps each file in the fixed enhancement instruction
//! 3. **Backend**: Sends the prompt to the selected destination
//! 4. **Recorder**: Appends one result per file and writes enhanced files

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod backend;
mod clipboard;
mod config;
mod discovery;
mod error;
mod file;
mod filter;
mod model_cache;
mod ollama;
mod openai;
mod pipeline;
mod prompt;
mod recorder;

#[cfg(test)]
mod testing;

pub use backend::{Backend, BackendKind, Outcome, create_backend};
pub use clipboard::{ClipboardBackend, ClipboardSink, HANDOFF_NOTE, SystemClipboard};
pub use config::{Config, ConfigBuilder, ConfigLayer, DEFAULT_CONFIG_FILE, load_or_create};
pub use discovery::{DiscoveredFile, Discovery, DiscoveryStats};
pub use error::{Error, Result};
pub use file::SourceFile;
pub use model_cache::{ModelCache, ModelRuntime};
pub use ollama::{LocalBackend, OllamaRuntime};
pub use openai::{OpenAiBackend, load_api_key};
pub use pipeline::{Pipeline, RunStats};
pub use prompt::{EnhancementRequest, INSTRUCTION, build_prompt, strip_code_fence};
pub use recorder::{EnhancementResult, Recorder, ResultStatus};

/// Runs a complete enhancement pass with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - The selected backend cannot start (missing API key, unavailable model,
///   no clipboard)
/// - The input directory doesn't exist or is not a directory
/// - Results cannot be written
///
/// Failures limited to a single file are recorded, not returned.
pub fn run(config: Config) -> Result<RunStats> {
    Pipeline::new(config)?.run()
}
