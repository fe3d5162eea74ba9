//! TOML configuration for the lowering pipeline (`lowering.toml`).
//!
//! ```toml
//! [capture]
//! max-collect-rounds = 64
//!
//! [devirtualization]
//! enabled = true
//! keep-virtual = ["equals/1", "hashCode/0"]
//!
//! [sequencing]
//! extract-unsequenced = true
//!
//! [pipeline]
//! jobs = 4
//! ```
//!
//! Every section and key is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error_codes;
use crate::lowering::devirtualize::DEFAULT_KEEP_VIRTUAL;
use crate::lowering::outer_resolver::DEFAULT_MAX_COLLECT_ROUNDS;
use crate::lowering::LoweringError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LoweringOptions {
    pub capture: CaptureConfig,
    pub devirtualization: DevirtualizationConfig,
    pub sequencing: SequencingConfig,
    pub pipeline: PipelineConfig,
}

/// `[capture]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Cap on the capture-set collection rounds before giving up on a unit
    pub max_collect_rounds: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_collect_rounds: DEFAULT_MAX_COLLECT_ROUNDS,
        }
    }
}

/// `[devirtualization]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DevirtualizationConfig {
    pub enabled: bool,
    /// Methods kept dynamically dispatched, as `name/arity`
    pub keep_virtual: Vec<String>,
}

impl Default for DevirtualizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_virtual: DEFAULT_KEEP_VIRTUAL.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// `[sequencing]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SequencingConfig {
    pub extract_unsequenced: bool,
}

impl Default for SequencingConfig {
    fn default() -> Self {
        Self {
            extract_unsequenced: true,
        }
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Worker threads for batch lowering; unset uses rayon's default
    pub jobs: Option<usize>,
}

impl LoweringOptions {
    /// Parse a `lowering.toml` string
    pub fn from_toml_str(content: &str) -> Result<Self, LoweringError> {
        let options: LoweringOptions = toml::from_str(content).map_err(|e| LoweringError::Config {
            code: error_codes::CONFIG_PARSE_FAILED,
            message: format!("failed to parse lowering config: {}", e),
        })?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: &Path) -> Result<Self, LoweringError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoweringError::Config {
            code: error_codes::CONFIG_PARSE_FAILED,
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), LoweringError> {
        for entry in &self.devirtualization.keep_virtual {
            let valid = match entry.rsplit_once('/') {
                Some((name, arity)) => !name.is_empty() && arity.parse::<usize>().is_ok(),
                None => false,
            };
            if !valid {
                return Err(LoweringError::Config {
                    code: error_codes::CONFIG_INVALID_VALUE,
                    message: format!("keep-virtual entry '{}' is not of the form name/arity", entry),
                });
            }
        }
        if self.capture.max_collect_rounds == 0 {
            return Err(LoweringError::Config {
                code: error_codes::CONFIG_INVALID_VALUE,
                message: "max-collect-rounds must be at least 1".to_string(),
            });
        }
        if self.pipeline.jobs == Some(0) {
            return Err(LoweringError::Config {
                code: error_codes::CONFIG_INVALID_VALUE,
                message: "jobs must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
