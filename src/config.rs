//! Configuration file handling.
//!
//! Settings come from an optional `quality-scorecard.toml`; command-line
//! flags override whatever the file provides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::kpi::TargetConfig;
use crate::loader::LoaderConfig;
use crate::offenders::OffenderConfig;

pub const DEFAULT_CONFIG_FILE: &str = "quality-scorecard.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: TargetSection,

    #[serde(default)]
    pub offenders: OffenderConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub report: ReportSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetMode {
    Fixed,
    PerRecord,
}

/// Quality goal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSection {
    #[serde(default = "default_target_mode")]
    pub mode: TargetMode,

    /// Goal used in fixed mode.
    #[serde(default = "default_target_value")]
    pub value: f64,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            mode: default_target_mode(),
            value: default_target_value(),
        }
    }
}

impl TargetSection {
    pub fn to_target_config(&self) -> TargetConfig {
        match self.mode {
            TargetMode::Fixed => TargetConfig::Fixed(self.value),
            TargetMode::PerRecord => TargetConfig::PerRecord,
        }
    }
}

fn default_target_mode() -> TargetMode {
    TargetMode::Fixed
}

fn default_target_value() -> f64 {
    90.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSection {
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("report.md")
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Explicit path must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn apply_overrides(
        &mut self,
        target: Option<f64>,
        per_record_target: bool,
        min_zero_scores: Option<usize>,
        limit: Option<usize>,
        strict_timestamps: bool,
    ) {
        if per_record_target {
            self.target.mode = TargetMode::PerRecord;
        } else if let Some(value) = target {
            self.target.mode = TargetMode::Fixed;
            self.target.value = value;
        }
        if let Some(min) = min_zero_scores {
            self.offenders.min_occurrences = min;
        }
        if let Some(limit) = limit {
            self.offenders.limit = limit;
        }
        if strict_timestamps {
            self.loader.strict_timestamps = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_behaviour() {
        let config = Config::default();
        assert_eq!(config.target.to_target_config(), TargetConfig::Fixed(90.0));
        assert_eq!(config.offenders.min_occurrences, 1);
        assert_eq!(config.offenders.limit, 10);
        assert!(!config.loader.strict_timestamps);
    }

    #[test]
    fn parses_partial_file() {
        let content = r#"
[target]
mode = "per-record"

[offenders]
min_occurrences = 2
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.target.to_target_config(), TargetConfig::PerRecord);
        assert_eq!(config.offenders.min_occurrences, 2);
        assert_eq!(config.offenders.limit, 10);
        assert_eq!(config.report.output, PathBuf::from("report.md"));
    }

    #[test]
    fn flags_override_file_values() {
        let mut config = Config::default();
        config.apply_overrides(Some(85.0), false, Some(2), None, true);
        assert_eq!(config.target.to_target_config(), TargetConfig::Fixed(85.0));
        assert_eq!(config.offenders.min_occurrences, 2);
        assert!(config.loader.strict_timestamps);
    }
}
