//! Configuration system
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PERSONAFORGE_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pipeline::HybridConfig;
use crate::provider::ProviderKind;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pipeline generation settings
    pub generation: GenerationSettings,

    /// Provider connection settings
    pub providers: ProviderSettings,

    /// Logging configuration
    pub logging: LoggingSettings,

    /// Data storage paths
    pub storage: StorageSettings,
}

/// Pipeline generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Provider for the draft stage
    pub local_provider: String,

    /// Model for the draft stage
    pub local_model: String,

    /// Provider for the refine stage (unset = local-only mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontier_provider: Option<String>,

    /// Model for the refine stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontier_model: Option<String>,

    /// Provider for the judge (unset = frontier provider)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_provider: Option<String>,

    /// Model for the judge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_model: Option<String>,

    /// Minimum judge score for a draft to pass (0.0 - 1.0)
    pub quality_threshold: f64,

    /// Dollar budget per run (unset = unlimited)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cost: Option<f64>,

    /// Personas requested per draft call
    pub batch_size: usize,

    /// Frontier attempts per persona before giving up
    pub max_refinement_attempts: u32,

    /// Sampling temperature for drafting
    pub draft_temperature: f32,

    /// Sampling temperature for refinement
    pub refine_temperature: f32,
}

/// Provider connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Local OpenAI-compatible server (Ollama, vLLM, LM Studio, ...)
    pub local: LocalSettings,

    /// Hosted OpenAI API
    pub openai: OpenAiSettings,
}

/// Local inference server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    /// API base URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient failures
    pub max_retries: u32,
}

/// Hosted OpenAI API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    /// API base URL
    pub base_url: String,

    /// API key (also settable via PERSONAFORGE_OPENAI_API_KEY)
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient failures
    pub max_retries: u32,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

/// Storage path settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Base data directory
    pub data_dir: String,

    /// Default output directory for generated persona sets
    pub output_dir: String,
}

// Default implementations

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generation: GenerationSettings::default(),
            providers: ProviderSettings::default(),
            logging: LoggingSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            local_provider: "local".to_string(),
            local_model: "llama3".to_string(),
            frontier_provider: None,
            frontier_model: None,
            judge_provider: None,
            judge_model: None,
            quality_threshold: 0.7,
            max_cost: None,
            batch_size: 5,
            max_refinement_attempts: 2,
            draft_temperature: 0.9,
            refine_temperature: 0.7,
        }
    }
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.personaforge".to_string(),
            output_dir: "~/.personaforge/output".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        let config_file = Self::find_config_file(config_path)?;
        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                message: format!("{}: {}", path.display(), e),
                source: Some(e),
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let expanded = shellexpand::tilde(path);
            let path = PathBuf::from(expanded.as_ref());
            if path.exists() {
                return Ok(Some(path));
            } else {
                return Err(Error::ConfigNotFound { path });
            }
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            PathBuf::from("personaforge.toml"),
            PathBuf::from("config.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("personaforge").join("config.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".personaforge").join("config.toml"))
                .unwrap_or_default(),
            // System config (Linux)
            PathBuf::from("/etc/personaforge/config.toml"),
        ];

        for path in &search_paths {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Generation settings
        if let Ok(val) = std::env::var("PERSONAFORGE_LOCAL_PROVIDER") {
            self.generation.local_provider = val;
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_LOCAL_MODEL") {
            self.generation.local_model = val;
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_FRONTIER_PROVIDER") {
            self.generation.frontier_provider = Some(val);
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_FRONTIER_MODEL") {
            self.generation.frontier_model = Some(val);
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_JUDGE_MODEL") {
            self.generation.judge_model = Some(val);
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_QUALITY_THRESHOLD") {
            if let Ok(n) = val.parse() {
                self.generation.quality_threshold = n;
            }
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_MAX_COST") {
            if let Ok(n) = val.parse() {
                self.generation.max_cost = Some(n);
            }
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_BATCH_SIZE") {
            if let Ok(n) = val.parse() {
                self.generation.batch_size = n;
            }
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_MAX_REFINEMENT_ATTEMPTS") {
            if let Ok(n) = val.parse() {
                self.generation.max_refinement_attempts = n;
            }
        }

        // Provider settings
        if let Ok(val) = std::env::var("PERSONAFORGE_LOCAL_BASE_URL") {
            self.providers.local.base_url = val;
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_OPENAI_BASE_URL") {
            self.providers.openai.base_url = val;
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_OPENAI_API_KEY") {
            self.providers.openai.api_key = val;
        } else if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            if self.providers.openai.api_key.is_empty() {
                self.providers.openai.api_key = val;
            }
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_OPENAI_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.providers.openai.timeout_secs = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("PERSONAFORGE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }

        // Storage settings
        if let Ok(val) = std::env::var("PERSONAFORGE_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("PERSONAFORGE_OUTPUT_DIR") {
            self.storage.output_dir = val;
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.storage.data_dir = expand_path(&self.storage.data_dir);
        self.storage.output_dir = expand_path(&self.storage.output_dir);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Provider names must parse
        self.generation.local_provider.parse::<ProviderKind>()?;
        if let Some(ref provider) = self.generation.frontier_provider {
            provider.parse::<ProviderKind>()?;
        }
        if let Some(ref provider) = self.generation.judge_provider {
            provider.parse::<ProviderKind>()?;
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        // Pipeline-level constraints are checked by the builder
        self.to_hybrid_config()?;

        Ok(())
    }

    /// Build the validated pipeline config from these settings.
    pub fn to_hybrid_config(&self) -> Result<HybridConfig> {
        let mut builder = HybridConfig::builder()
            .local(
                self.generation.local_provider.parse()?,
                self.generation.local_model.clone(),
            )
            .quality_threshold(self.generation.quality_threshold)
            .batch_size(self.generation.batch_size)
            .max_refinement_attempts(self.generation.max_refinement_attempts)
            .draft_temperature(self.generation.draft_temperature)
            .refine_temperature(self.generation.refine_temperature);

        if let (Some(provider), Some(model)) = (
            &self.generation.frontier_provider,
            &self.generation.frontier_model,
        ) {
            builder = builder.frontier(provider.parse()?, model.clone());
        } else if self.generation.frontier_provider.is_some() {
            return Err(Error::config_field_invalid(
                "frontier_model",
                "A frontier provider requires a frontier model",
            ));
        }

        if let (Some(provider), Some(model)) = (
            &self.generation.judge_provider,
            &self.generation.judge_model,
        ) {
            builder = builder.judge(provider.parse()?, model.clone());
        } else if let Some(model) = &self.generation.judge_model {
            // Judge model without a provider: judge on the frontier provider
            if let Some(provider) = &self.generation.frontier_provider {
                builder = builder.judge(provider.parse()?, model.clone());
            }
        }

        if let Some(max_cost) = self.generation.max_cost {
            builder = builder.max_cost(max_cost);
        }

        builder.build()
    }

    /// Get the data directory as a PathBuf
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }

    /// Get the output directory as a PathBuf
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.output_dir)
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<()> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".personaforge")
                .join("config.toml")
        });

    // Check if file exists
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    // Create parent directories
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
    }

    // Generate default config with comments
    let config_content = generate_default_config();

    // Write the file
    fs::write(&config_path, config_content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

    println!("Configuration file created: {}", config_path.display());
    Ok(())
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# PersonaForge Configuration

[generation]
# Provider for cheap drafting: "local" (Ollama, vLLM, LM Studio) or "openai"
local_provider = "local"

# Model for drafting
local_model = "llama3"

# Frontier provider and model for selective refinement.
# Comment both out for local-only mode (no judging, no refinement).
# frontier_provider = "openai"
# frontier_model = "gpt-4o"

# Judge provider and model (defaults to the frontier model)
# judge_provider = "openai"
# judge_model = "gpt-4o-mini"

# Minimum judge score for a draft to pass (0.0 - 1.0)
quality_threshold = 0.7

# Dollar budget per run (comment out for unlimited)
# max_cost = 1.0

# Personas requested per draft call
batch_size = 5

# Frontier attempts per persona before giving up
max_refinement_attempts = 2

# Sampling temperatures
draft_temperature = 0.9
refine_temperature = 0.7

[providers.local]
# OpenAI-compatible local server (Ollama, vLLM, LM Studio, ...)
base_url = "http://localhost:11434/v1"

# Request timeout in seconds
timeout_secs = 120

# Maximum retries on transient failures
max_retries = 2

[providers.openai]
# Hosted OpenAI API
base_url = "https://api.openai.com/v1"

# API key (or set PERSONAFORGE_OPENAI_API_KEY / OPENAI_API_KEY)
api_key = ""

# Request timeout in seconds
timeout_secs = 120

# Maximum retries on transient failures
max_retries = 2

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.personaforge/logs/personaforge.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false

[storage]
# Base data directory
data_dir = "~/.personaforge"

# Default output directory for generated persona sets
output_dir = "~/.personaforge/output"
"#
    .to_string()
}
