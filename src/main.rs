use anyhow::Context;
use clap::Parser;
use llm_enhance::{Config, ConfigLayer, DEFAULT_CONFIG_FILE, Pipeline, load_or_create};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status when no file matched the configured extensions.
const EXIT_NO_FILES: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "llm-enhance",
    version,
    author,
    about = "Enhance source files with an LLM",
    long_about = "Enhance every source file under a directory with a language model.\n\n\
    Each file is wrapped in a fixed improvement instruction and sent to one backend: \
    a remote chat-completion API (default), a local model run through ollama, or the \
    system clipboard for manual pasting. Results are appended to a results file.\n\n\
    Settings come from the command line, then config.yaml, then built-in defaults. \
    A missing config.yaml is created with the defaults.\n\n\
    USAGE EXAMPLES:\n  \
      # Enhance with the remote API (key read from .secret)\n  \
      llm-enhance --input_directory ./src --output_dir ./enhanced\n\n  \
      # Use a local model\n  \
      llm-enhance --input_directory ./src --local_llm --ollama_model codellama\n\n  \
      # Hand prompts off through the clipboard\n  \
      llm-enhance --input_directory ./src --clipboard_mode"
)]
struct Cli {
    /// File-name suffixes to process (e.g. .py .rs)
    #[arg(long = "code_extensions", value_name = "EXT", num_args = 1..)]
    code_extensions: Option<Vec<String>>,

    /// Directory receiving enhanced files, mirroring the input tree
    #[arg(long = "output_dir", value_name = "PATH")]
    output_dir: Option<PathBuf>,

    /// Directory to scan for source files
    #[arg(long = "input_directory", value_name = "PATH")]
    input_directory: Option<PathBuf>,

    /// Remote API model identifier
    #[arg(long = "openai_model", visible_alias = "model", value_name = "NAME")]
    openai_model: Option<String>,

    /// Local model identifier
    #[arg(long = "ollama_model", value_name = "NAME")]
    ollama_model: Option<String>,

    /// Maximum completion tokens for the remote API
    #[arg(long = "max_tokens", value_name = "N")]
    max_tokens: Option<u32>,

    /// Sampling temperature for the remote API (0.0 to 2.0)
    #[arg(long, value_name = "T")]
    temperature: Option<f32>,

    /// File holding the API key
    #[arg(long = "api_key_path", value_name = "FILE")]
    api_key_path: Option<PathBuf>,

    /// Copy prompts to the clipboard instead of calling a model
    #[arg(long = "clipboard_mode")]
    clipboard_mode: bool,

    /// Use a local model through ollama
    #[arg(long = "local_llm")]
    local_llm: bool,

    /// File receiving one result record per processed file
    #[arg(long = "results_file", value_name = "FILE")]
    results_file: Option<PathBuf>,

    /// Glob patterns of paths to skip (relative to the input directory)
    #[arg(long, value_name = "GLOB", num_args = 1..)]
    exclude: Option<Vec<String>>,

    /// Don't wait for Enter after each clipboard hand-off
    #[arg(long = "no_confirm")]
    no_confirm: bool,

    /// Configuration file
    #[arg(long, env = "LLM_ENHANCE_CONFIG", default_value = DEFAULT_CONFIG_FILE, value_name = "FILE")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Builds the command-line configuration layer. Unset flags stay unset
    /// so lower layers can fill them.
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            code_extensions: self.code_extensions.clone(),
            output_dir: self.output_dir.clone(),
            input_directory: self.input_directory.clone(),
            openai_model: self.openai_model.clone(),
            ollama_model: self.ollama_model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            api_key_path: self.api_key_path.clone(),
            clipboard_mode: self.clipboard_mode.then_some(true),
            local_llm: self.local_llm.then_some(true),
            results_file: self.results_file.clone(),
            exclude: self.exclude.clone(),
            clipboard_confirm: self.no_confirm.then_some(false),
            ..ConfigLayer::default()
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let file_layer = load_or_create(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let config = Config::resolve(file_layer, cli.layer())
        .context("Failed to build configuration")?;

    let stats = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .context("Pipeline execution failed")?;

    stats.print_summary();

    if stats.is_empty() {
        return Ok(ExitCode::from(EXIT_NO_FILES));
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("llm_enhance=info"),
        1 => EnvFilter::new("llm_enhance=debug"),
        _ => EnvFilter::new("llm_enhance=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_flags_leave_layer_empty() {
        let cli = Cli::parse_from(["llm-enhance"]);
        let layer = cli.layer();

        assert!(layer.clipboard_mode.is_none());
        assert!(layer.local_llm.is_none());
        assert!(layer.clipboard_confirm.is_none());
        assert!(layer.code_extensions.is_none());
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn test_flags_map_onto_layer() {
        let cli = Cli::parse_from([
            "llm-enhance",
            "--input_directory",
            "src",
            "--code_extensions",
            ".py",
            ".rs",
            "--model",
            "gpt-4o",
            "--local_llm",
            "--no_confirm",
        ]);
        let layer = cli.layer();

        assert_eq!(layer.input_directory, Some(PathBuf::from("src")));
        assert_eq!(layer.code_extensions, Some(vec![".py".to_string(), ".rs".to_string()]));
        assert_eq!(layer.openai_model.as_deref(), Some("gpt-4o"));
        assert_eq!(layer.local_llm, Some(true));
        assert_eq!(layer.clipboard_confirm, Some(false));
    }
}
