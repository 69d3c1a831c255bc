//! Validator stage configuration.

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

/// Configuration for one validator stage.
///
/// Loaded from TOML such as:
///
/// ```toml
/// output_capacity = 4096
/// defect_capacity = 128
/// detect_gaps = false
/// ```
///
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Capacity of the validated-record channel.
    pub output_capacity: usize,

    /// Capacity of the defect channel.
    pub defect_capacity: usize,

    /// Whether to report `gap` defects for keys that skip ahead.
    pub detect_gaps: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            output_capacity: 1024,
            defect_capacity: 256,
            detect_gaps: true,
        }
    }
}

impl ValidatorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read validator config {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Invalid validator config {}", path.display()))
    }

    /// Reject settings the stage cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.output_capacity == 0 {
            return Err(Error::InvalidConfig(
                "output_capacity must be greater than zero".to_string(),
            ));
        }
        if self.defect_capacity == 0 {
            return Err(Error::InvalidConfig(
                "defect_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Command-line options for a validator stage, for flattening into a
/// binary's argument parser.
#[derive(Args, Debug, Clone)]
pub struct ValidatorOpts {
    /// Capacity of the validated-record channel
    #[arg(
        long,
        default_value = "1024",
        env = "OPLOG_SYNC_VALIDATOR_OUTPUT_CAPACITY"
    )]
    pub validator_output_capacity: usize,

    /// Capacity of the defect channel
    #[arg(
        long,
        default_value = "256",
        env = "OPLOG_SYNC_VALIDATOR_DEFECT_CAPACITY"
    )]
    pub validator_defect_capacity: usize,

    /// Do not report gaps in the sequence of oplog timestamps
    #[arg(long, env = "OPLOG_SYNC_VALIDATOR_NO_GAP_DETECTION")]
    pub validator_no_gap_detection: bool,
}

impl From<&ValidatorOpts> for ValidatorConfig {
    fn from(opts: &ValidatorOpts) -> Self {
        Self {
            output_capacity: opts.validator_output_capacity,
            defect_capacity: opts.validator_defect_capacity,
            detect_gaps: !opts.validator_no_gap_detection,
        }
    }
}
