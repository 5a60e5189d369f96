use crate::backend::BackendKind;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".java", ".cpp", ".cs", ".html", ".css", ".json", ".yaml", ".yml", ".xml",
    ".md", ".txt", ".go", ".rb", ".php", ".ts", ".tsx", ".vue", ".rs", ".swift", ".kt", ".sh",
    ".bat", ".pl", ".pm", ".r", ".sql", ".ini", ".toml",
];
const DEFAULT_EXCLUDES: &[&str] = &["**/.git", "**/node_modules", "**/target"];
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini-2024-07-18";
const DEFAULT_OLLAMA_MODEL: &str = "mistral";
const DEFAULT_MAX_TOKENS: u32 = 16_384;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_API_KEY_PATH: &str = ".secret";
const DEFAULT_RESULTS_FILE: &str = "results.txt";
const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const MAX_TEMPERATURE: f32 = 2.0;

/// One source of configuration values.
///
/// Every key is optional so that layers can be stacked: built-in defaults,
/// the persisted YAML file, then command-line flags. Keys match the CLI flag
/// names without the leading dashes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    /// File name suffixes to process
    pub code_extensions: Option<Vec<String>>,
    /// Directory receiving enhanced files
    pub output_dir: Option<PathBuf>,
    /// Directory to scan
    pub input_directory: Option<PathBuf>,
    /// Remote model name
    #[serde(alias = "model")]
    pub openai_model: Option<String>,
    /// Local Ollama model name
    pub ollama_model: Option<String>,
    /// Completion token limit for remote requests
    pub max_tokens: Option<u32>,
    /// Sampling temperature for remote requests
    pub temperature: Option<f32>,
    /// JSON file holding `openai_api_key`
    pub api_key_path: Option<PathBuf>,
    /// Hand prompts off through the clipboard
    pub clipboard_mode: Option<bool>,
    /// Use the local Ollama runtime
    pub local_llm: Option<bool>,
    /// Append-only results log
    pub results_file: Option<PathBuf>,
    /// Glob patterns for paths to skip
    pub exclude: Option<Vec<String>>,
    /// Back up existing output files before replacing them
    pub backup_existing: Option<bool>,
    /// Wait for the operator between clipboard hand-offs
    pub clipboard_confirm: Option<bool>,
    /// Base URL of an OpenAI-compatible API
    pub api_base_url: Option<String>,
}

impl ConfigLayer {
    /// Returns the built-in defaults.
    ///
    /// `input_directory` and `output_dir` have no default.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            code_extensions: Some(DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect()),
            output_dir: None,
            input_directory: None,
            openai_model: Some(DEFAULT_OPENAI_MODEL.to_string()),
            ollama_model: Some(DEFAULT_OLLAMA_MODEL.to_string()),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            temperature: Some(DEFAULT_TEMPERATURE),
            api_key_path: Some(PathBuf::from(DEFAULT_API_KEY_PATH)),
            clipboard_mode: Some(false),
            local_llm: Some(false),
            results_file: Some(PathBuf::from(DEFAULT_RESULTS_FILE)),
            exclude: Some(DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect()),
            backup_existing: Some(true),
            clipboard_confirm: Some(true),
            api_base_url: Some(DEFAULT_API_BASE_URL.to_string()),
        }
    }

    /// Parses a layer from YAML text. Blank documents yield an empty layer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text is not valid YAML or holds
    /// unknown keys or mistyped values.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| Error::config(format!("malformed YAML: {e}")))
    }

    /// Renders the layer as YAML.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if rendering fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Stacks `over` on top of `self`; keys set in `over` win.
    #[must_use]
    pub fn overlay(self, over: Self) -> Self {
        Self {
            code_extensions: over.code_extensions.or(self.code_extensions),
            output_dir: over.output_dir.or(self.output_dir),
            input_directory: over.input_directory.or(self.input_directory),
            openai_model: over.openai_model.or(self.openai_model),
            ollama_model: over.ollama_model.or(self.ollama_model),
            max_tokens: over.max_tokens.or(self.max_tokens),
            temperature: over.temperature.or(self.temperature),
            api_key_path: over.api_key_path.or(self.api_key_path),
            clipboard_mode: over.clipboard_mode.or(self.clipboard_mode),
            local_llm: over.local_llm.or(self.local_llm),
            results_file: over.results_file.or(self.results_file),
            exclude: over.exclude.or(self.exclude),
            backup_existing: over.backup_existing.or(self.backup_existing),
            clipboard_confirm: over.clipboard_confirm.or(self.clipboard_confirm),
            api_base_url: over.api_base_url.or(self.api_base_url),
        }
    }
}

/// Loads the persisted configuration layer, creating it with defaults first
/// when the file does not exist. An existing file is never overwritten.
///
/// # Errors
///
/// Returns a configuration error if the file exists but cannot be read or
/// parsed.
pub fn load_or_create(path: &Path) -> Result<ConfigLayer> {
    if !path.exists() {
        write_default_file(path);
        if !path.exists() {
            return Ok(ConfigLayer::default());
        }
    }

    let text = fs::read_to_string(path).map_err(|e| {
        Error::config(format!("cannot read {}: {e}", path.display()))
    })?;

    let layer = ConfigLayer::from_yaml(&text)
        .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
    debug!("Loaded configuration file {}", path.display());
    Ok(layer)
}

fn write_default_file(path: &Path) {
    let yaml = match ConfigLayer::defaults().to_yaml() {
        Ok(yaml) => yaml,
        Err(e) => {
            warn!("Cannot render default configuration: {}", e);
            return;
        }
    };

    let written = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .and_then(|mut file| file.write_all(yaml.as_bytes()));

    match written {
        Ok(()) => info!("Configuration file created with default settings: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => warn!("Cannot create {}: {}", path.display(), e),
    }
}

/// Effective configuration for one run.
///
/// Produced once by [`Config::resolve`] or [`Config::builder()`] and never
/// changed afterwards.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// File name suffixes to process (case-sensitive)
    pub code_extensions: Vec<String>,

    /// Directory mirroring the input tree with enhanced files
    pub output_dir: Option<PathBuf>,

    /// Directory to scan
    pub input_directory: PathBuf,

    /// Remote model name
    pub openai_model: String,

    /// Local Ollama model name
    pub ollama_model: String,

    /// Completion token limit for remote requests
    pub max_tokens: u32,

    /// Sampling temperature for remote requests
    pub temperature: f32,

    /// JSON file holding `openai_api_key`
    pub api_key_path: PathBuf,

    /// Backend selected for the whole run
    pub backend: BackendKind,

    /// Append-only results log
    pub results_file: PathBuf,

    /// Glob patterns for paths to skip
    pub exclude: Vec<String>,

    /// Back up existing output files before replacing them
    pub backup_existing: bool,

    /// Wait for the operator between clipboard hand-offs
    pub clipboard_confirm: bool,

    /// Base URL of an OpenAI-compatible API
    pub api_base_url: String,
}

impl Config {
    /// Creates a new configuration builder on top of the built-in defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_enhance::{BackendKind, Config};
    ///
    /// let config = Config::builder()
    ///     .input_directory("./src")
    ///     .backend(BackendKind::Clipboard)
    ///     .build()
    ///     .expect("valid configuration");
    /// assert_eq!(config.backend, BackendKind::Clipboard);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Merges defaults, the persisted file layer and the CLI layer.
    ///
    /// Precedence is CLI over file over defaults, key by key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation of the merged values fails.
    pub fn resolve(file: ConfigLayer, cli: ConfigLayer) -> Result<Self> {
        Self::from_layer(ConfigLayer::defaults().overlay(file).overlay(cli))
    }

    fn from_layer(layer: ConfigLayer) -> Result<Self> {
        let input_directory = layer.input_directory.ok_or_else(|| {
            Error::config("input_directory is required (set it in the config file or pass --input_directory)")
        })?;

        let clipboard_mode = layer.clipboard_mode.unwrap_or(false);
        let local_llm = layer.local_llm.unwrap_or(false);
        let backend = BackendKind::from_flags(clipboard_mode, local_llm)?;

        let config = Self {
            code_extensions: layer.code_extensions.unwrap_or_default(),
            output_dir: layer.output_dir,
            input_directory,
            openai_model: layer
                .openai_model
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            ollama_model: layer
                .ollama_model
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            max_tokens: layer.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: layer.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            api_key_path: layer
                .api_key_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_API_KEY_PATH)),
            backend,
            results_file: layer
                .results_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_FILE)),
            exclude: layer.exclude.unwrap_or_default(),
            backup_existing: layer.backup_existing.unwrap_or(true),
            clipboard_confirm: layer.clipboard_confirm.unwrap_or(true),
            api_base_url: layer
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_tokens` is zero
    /// - `temperature` is outside `[0, 2]`
    /// - a model name is blank
    /// - an exclude pattern is not a valid glob
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(Error::config("max_tokens must be greater than 0"));
        }

        if !self.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature ({}) must be between 0 and {MAX_TEMPERATURE}",
                self.temperature
            )));
        }

        match self.backend {
            BackendKind::Api if self.openai_model.trim().is_empty() => {
                return Err(Error::config("openai_model must not be empty"));
            }
            BackendKind::Local if self.ollama_model.trim().is_empty() => {
                return Err(Error::config("ollama_model must not be empty"));
            }
            _ => {}
        }

        crate::filter::PathFilter::new(&self.exclude)?;

        if self.code_extensions.is_empty() {
            warn!("code_extensions is empty: no files will be processed");
        }

        Ok(())
    }
}

/// Builder for creating a [`Config`] programmatically.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    layer: ConfigLayer,
}

impl ConfigBuilder {
    /// Sets the directory to scan.
    #[must_use]
    pub fn input_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.layer.input_directory = Some(path.into());
        self
    }

    /// Sets the output directory for enhanced files.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.layer.output_dir = Some(path.into());
        self
    }

    /// Sets the file name suffixes to process.
    #[must_use]
    pub fn code_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layer.code_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the results file.
    #[must_use]
    pub fn results_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.layer.results_file = Some(path.into());
        self
    }

    /// Selects the backend.
    #[must_use]
    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.layer.clipboard_mode = Some(kind == BackendKind::Clipboard);
        self.layer.local_llm = Some(kind == BackendKind::Local);
        self
    }

    /// Sets the remote model name.
    #[must_use]
    pub fn openai_model(mut self, model: impl Into<String>) -> Self {
        self.layer.openai_model = Some(model.into());
        self
    }

    /// Sets the local model name.
    #[must_use]
    pub fn ollama_model(mut self, model: impl Into<String>) -> Self {
        self.layer.ollama_model = Some(model.into());
        self
    }

    /// Sets the completion token limit.
    #[must_use]
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.layer.max_tokens = Some(tokens);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.layer.temperature = Some(temperature);
        self
    }

    /// Sets the credential file path.
    #[must_use]
    pub fn api_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.layer.api_key_path = Some(path.into());
        self
    }

    /// Sets the exclude glob patterns.
    #[must_use]
    pub fn exclude(mut self, patterns: Vec<String>) -> Self {
        self.layer.exclude = Some(patterns);
        self
    }

    /// Enables or disables backup creation.
    #[must_use]
    pub fn backup_existing(mut self, enabled: bool) -> Self {
        self.layer.backup_existing = Some(enabled);
        self
    }

    /// Enables or disables the pause between clipboard hand-offs.
    #[must_use]
    pub fn clipboard_confirm(mut self, enabled: bool) -> Self {
        self.layer.clipboard_confirm = Some(enabled);
        self
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.layer.api_base_url = Some(url.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        Config::resolve(ConfigLayer::default(), self.layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn layer_with_input(dir: &str) -> ConfigLayer {
        ConfigLayer {
            input_directory: Some(PathBuf::from(dir)),
            ..ConfigLayer::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::builder().input_directory("src").build().unwrap();

        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.backend, BackendKind::Api);
        assert_eq!(config.openai_model, DEFAULT_OPENAI_MODEL);
        assert_eq!(config.ollama_model, "mistral");
        assert!(config.code_extensions.contains(&".py".to_string()));
        assert!(config.output_dir.is_none());
    }

    #[test]
    fn test_missing_input_directory() {
        let err = Config::resolve(ConfigLayer::default(), ConfigLayer::default()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("input_directory"));
    }

    #[test]
    fn test_precedence_cli_over_file_over_defaults() {
        let file = ConfigLayer {
            input_directory: Some(PathBuf::from("from_file")),
            max_tokens: Some(500),
            temperature: Some(0.2),
            ..ConfigLayer::default()
        };
        let cli = ConfigLayer {
            max_tokens: Some(900),
            ..ConfigLayer::default()
        };

        let config = Config::resolve(file, cli).unwrap();

        assert_eq!(config.input_directory, PathBuf::from("from_file"));
        assert_eq!(config.max_tokens, 900);
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.results_file, PathBuf::from(DEFAULT_RESULTS_FILE));
    }

    #[test]
    fn test_mode_flags_are_exclusive() {
        let file = ConfigLayer {
            local_llm: Some(true),
            ..layer_with_input("src")
        };
        let cli = ConfigLayer {
            clipboard_mode: Some(true),
            ..ConfigLayer::default()
        };

        let err = Config::resolve(file, cli).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_single_mode_flag_selects_backend() {
        let cli = ConfigLayer {
            local_llm: Some(true),
            ..layer_with_input("src")
        };
        let config = Config::resolve(ConfigLayer::default(), cli).unwrap();
        assert_eq!(config.backend, BackendKind::Local);
    }

    #[test]
    fn test_invalid_token_limits() {
        let result = Config::builder().input_directory("src").max_tokens(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_temperature() {
        assert!(Config::builder().input_directory("src").temperature(2.5).build().is_err());
        assert!(Config::builder().input_directory("src").temperature(-0.1).build().is_err());
        assert!(Config::builder().input_directory("src").temperature(2.0).build().is_ok());
    }

    #[test]
    fn test_invalid_exclude_glob() {
        let result = Config::builder()
            .input_directory("src")
            .exclude(vec!["a[".to_string()])
            .build();
        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_yaml_accepts_legacy_model_key() {
        let layer = ConfigLayer::from_yaml("model: gpt-4o\nmax_tokens: 10\n").unwrap();
        assert_eq!(layer.openai_model.as_deref(), Some("gpt-4o"));
        assert_eq!(layer.max_tokens, Some(10));
    }

    #[test]
    fn test_yaml_rejects_malformed_document() {
        assert!(ConfigLayer::from_yaml("max_tokens: [unclosed").unwrap_err().is_config());
        assert!(ConfigLayer::from_yaml("max_tokens: many").unwrap_err().is_config());
        assert!(ConfigLayer::from_yaml("no_such_key: 1").unwrap_err().is_config());
    }

    #[test]
    fn test_blank_yaml_is_empty_layer() {
        assert_eq!(ConfigLayer::from_yaml("  \n").unwrap(), ConfigLayer::default());
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let temp = assert_fs::TempDir::new().unwrap();
        let path = temp.child("config.yaml");

        let layer = load_or_create(path.path()).unwrap();

        assert!(path.exists());
        assert_eq!(layer, ConfigLayer::defaults());
    }

    #[test]
    fn test_load_or_create_keeps_existing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let path = temp.child("config.yaml");
        path.write_str("ollama_model: llama3\n").unwrap();

        let layer = load_or_create(path.path()).unwrap();

        assert_eq!(layer.ollama_model.as_deref(), Some("llama3"));
        assert_eq!(fs::read_to_string(path.path()).unwrap(), "ollama_model: llama3\n");
    }

    #[test]
    fn test_load_or_create_malformed_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let path = temp.child("config.yaml");
        path.write_str("temperature: {{").unwrap();

        assert!(load_or_create(path.path()).unwrap_err().is_config());
    }
}
