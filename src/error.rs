//! Error types for PersonaForge
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Error context and chaining
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for PersonaForge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Provider errors (3xx)
    ProviderUnavailable = 300,
    ProviderTimeout = 301,
    ProviderResponse = 302,
    ProviderNotRegistered = 303,
    GenerationFailed = 310,

    // Judge errors (4xx)
    JudgeFailed = 400,
    JudgeMalformed = 401,

    // Refinement errors (5xx)
    RefinementFailed = 500,

    // Source data errors (6xx)
    DataNotFound = 600,
    DataParseError = 601,
    DataEmpty = 602,

    // Internal errors (9xx)
    InternalError = 900,
    NotSupported = 902,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Provider errors
            400..=499 => 40, // Judge errors
            500..=599 => 50, // Refinement errors
            600..=699 => 60, // Source data errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for PersonaForge
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Provider Errors
    // ─────────────────────────────────────────────────────────────

    /// Provider could not be reached
    #[error("Provider '{provider}' unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// Provider request timed out
    #[error("Provider '{provider}' timed out after {timeout_secs}s")]
    ProviderTimeout { provider: String, timeout_secs: u64 },

    /// Provider returned an unusable response
    #[error("Provider '{provider}' returned an invalid response: {message}")]
    ProviderResponse { provider: String, message: String },

    /// Requested provider is not in the registry
    #[error("Provider '{provider}' is not registered")]
    ProviderNotRegistered { provider: String },

    /// Draft-stage generation failed (fatal to the run)
    #[error("Persona generation failed: {message}")]
    Generation { message: String },

    // ─────────────────────────────────────────────────────────────
    // Judge Errors
    // ─────────────────────────────────────────────────────────────

    /// Judge call failed for a persona
    #[error("Judge evaluation failed for persona {persona_id}: {message}")]
    JudgeFailed { persona_id: String, message: String },

    /// Judge returned output that could not be parsed as a verdict
    #[error("Judge returned a malformed verdict: {message}")]
    JudgeMalformed { message: String },

    // ─────────────────────────────────────────────────────────────
    // Refinement Errors
    // ─────────────────────────────────────────────────────────────

    /// Refinement of a single persona failed
    #[error("Refinement failed for persona {persona_id}: {message}")]
    RefinementFailed { persona_id: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Source Data Errors
    // ─────────────────────────────────────────────────────────────

    /// Source data path does not exist
    #[error("Source data not found: {path}")]
    DataNotFound { path: PathBuf },

    /// Source data could not be parsed
    #[error("Failed to parse source data: {message}")]
    DataParse { message: String },

    /// Source data contained no usable records
    #[error("Source data is empty")]
    DataEmpty,

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Feature not supported
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::ProviderUnavailable { .. } => ErrorCode::ProviderUnavailable,
            Error::ProviderTimeout { .. } => ErrorCode::ProviderTimeout,
            Error::ProviderResponse { .. } => ErrorCode::ProviderResponse,
            Error::ProviderNotRegistered { .. } => ErrorCode::ProviderNotRegistered,
            Error::Generation { .. } => ErrorCode::GenerationFailed,

            Error::JudgeFailed { .. } => ErrorCode::JudgeFailed,
            Error::JudgeMalformed { .. } => ErrorCode::JudgeMalformed,

            Error::RefinementFailed { .. } => ErrorCode::RefinementFailed,

            Error::DataNotFound { .. } => ErrorCode::DataNotFound,
            Error::DataParse { .. } => ErrorCode::DataParseError,
            Error::DataEmpty => ErrorCode::DataEmpty,

            Error::Json(_) => ErrorCode::InternalError,
            Error::NotSupported(_) => ErrorCode::NotSupported,
            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is retryable at the transport level
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable { .. }
                | Error::ProviderTimeout { .. }
                | Error::Io(_)
                | Error::IoRead { .. }
                | Error::IoWrite { .. }
        )
    }

    /// Check if the error is fatal to a pipeline run
    ///
    /// Only configuration, source-data, and draft-stage failures abort a run;
    /// judge and refinement errors are contained per-persona.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::Config(_)
                | Error::Generation { .. }
                | Error::DataNotFound { .. }
                | Error::DataParse { .. }
                | Error::DataEmpty
                | Error::Internal(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'personaforge config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'personaforge config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values. See documentation for valid options."
            ),

            Error::ProviderUnavailable { .. } => Some(
                "Check that the provider endpoint is running and the base_url in your config is correct."
            ),
            Error::ProviderTimeout { .. } => Some(
                "The provider may be overloaded. Increase timeout_secs in the provider config or retry later."
            ),
            Error::ProviderNotRegistered { .. } => Some(
                "Run 'personaforge providers' to list registered providers and check your [generation] settings."
            ),
            Error::Generation { .. } => Some(
                "Verify the local provider is reachable and the configured model is available on it."
            ),

            Error::JudgeMalformed { .. } => Some(
                "The judge model may be too small to produce structured verdicts. Try a stronger judge_model."
            ),

            Error::DataNotFound { .. } => Some(
                "Check the input path. Accepted inputs are .txt/.md/.json files or a directory of them."
            ),
            Error::DataEmpty => Some(
                "The input contained no usable research records. Provide at least one non-empty document."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            code.as_str(),
            self
        );

        if let Error::ConfigValidation {
            field: Some(field), ..
        } = self
        {
            output.push_str(&format!("  field: {}\n", field));
        }

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        let code = self.code();
        format!("[{}] {}", code.as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a provider unavailable error
    pub fn provider_unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a provider response error
    pub fn provider_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ProviderResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a draft-stage generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Error::Generation {
            message: message.into(),
        }
    }

    /// Create a judge failure error for a persona
    pub fn judge_failed(persona_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::JudgeFailed {
            persona_id: persona_id.into(),
            message: message.into(),
        }
    }

    /// Create a refinement failure error for a persona
    pub fn refinement_failed(persona_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RefinementFailed {
            persona_id: persona_id.into(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
