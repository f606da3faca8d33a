//! Engine configuration, read from TOML.
//!
//! ```toml
//! max_attempts = 3
//!
//! [compensation]
//! min_note_chars = 20
//!
//! [expense]
//! min_note_chars = 1
//! ```
//!
//! Every key is optional; missing keys take the defaults shown above.

use std::path::Path;

use approvals_core::{Compensation, ExpenseReimbursement, NoteRule, Workflow};
use serde::{Deserialize, Serialize};

/// Default number of attempts for a transition that keeps hitting
/// version conflicts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Errors from loading or validating an [`EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Per-workflow settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkflowConfig {
    /// Minimum trimmed length of a justification note.
    pub min_note_chars: usize,
}

impl WorkflowConfig {
    fn defaults_for<W: Workflow>() -> Self {
        WorkflowConfig {
            min_note_chars: W::DEFAULT_MIN_NOTE_CHARS,
        }
    }

    pub fn note_rule(&self) -> NoteRule {
        NoteRule::min_chars(self.min_note_chars)
    }
}

/// Effective engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawConfig")]
pub struct EngineConfig {
    pub max_attempts: u32,
    pub compensation: WorkflowConfig,
    pub expense: WorkflowConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            compensation: WorkflowConfig::defaults_for::<Compensation>(),
            expense: WorkflowConfig::defaults_for::<ExpenseReimbursement>(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if self.compensation.min_note_chars == 0 {
            return Err(ConfigError::Invalid {
                field: "compensation.min_note_chars",
                message: "must be at least 1".to_string(),
            });
        }
        if self.expense.min_note_chars == 0 {
            return Err(ConfigError::Invalid {
                field: "expense.min_note_chars",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ── On-disk shape ────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    max_attempts: Option<u32>,
    compensation: RawWorkflowConfig,
    expense: RawWorkflowConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawWorkflowConfig {
    min_note_chars: Option<usize>,
}

impl RawWorkflowConfig {
    fn resolve<W: Workflow>(self) -> WorkflowConfig {
        WorkflowConfig {
            min_note_chars: self.min_note_chars.unwrap_or(W::DEFAULT_MIN_NOTE_CHARS),
        }
    }
}

impl From<RawConfig> for EngineConfig {
    fn from(raw: RawConfig) -> Self {
        EngineConfig {
            max_attempts: raw.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            compensation: raw.compensation.resolve::<Compensation>(),
            expense: raw.expense.resolve::<ExpenseReimbursement>(),
        }
    }
}
