//! Runtime configuration for identity parsing and cohort assignment.
//!
//! # Responsibility
//! - Provide defaulted, serde-backed configuration for core services.
//! - Load and validate configuration files.
//!
//! # Invariants
//! - Every field has a default, so an empty JSON object is a valid config.
//! - `1 <= min_academic_year <= max_academic_year <= 5`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Upper bound enforced by the storage schema on academic years.
pub const ACADEMIC_YEAR_CEILING: u8 = 5;

/// Accepted range for `ParserConfig::century_base`.
pub const CENTURY_BASE_RANGE: std::ops::RangeInclusive<i32> = 1000..=9900;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CampusConfig {
    pub parser: ParserConfig,
    pub assigner: AssignerConfig,
}

impl CampusConfig {
    /// Checks cross-field invariants not expressible through serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parser.validate()
    }
}

/// Identity parser settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Required domain after `@`, compared case-insensitively.
    pub institutional_domain: String,
    /// Program label used when the program code is not in the lookup table.
    pub default_class_label: String,
    /// Century prefixed to the two-digit admission year code.
    pub century_base: i32,
    pub min_academic_year: u8,
    pub max_academic_year: u8,
    /// Program code -> label entries merged over the built-in table.
    pub extra_programs: BTreeMap<String, String>,
    /// Branch code -> label entries merged over the built-in table.
    pub extra_branches: BTreeMap<String, String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            institutional_domain: "student.nitw.ac.in".to_string(),
            default_class_label: "BTech".to_string(),
            century_base: 2000,
            min_academic_year: 1,
            max_academic_year: ACADEMIC_YEAR_CEILING,
            extra_programs: BTreeMap::new(),
            extra_branches: BTreeMap::new(),
        }
    }
}

impl ParserConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let domain = self.institutional_domain.trim();
        if domain.is_empty() || domain.contains('@') {
            return Err(ConfigError::Invalid(format!(
                "institutional_domain must be a bare domain, got `{}`",
                self.institutional_domain
            )));
        }
        if self.default_class_label.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_class_label must not be blank".to_string(),
            ));
        }
        if !CENTURY_BASE_RANGE.contains(&self.century_base) {
            return Err(ConfigError::Invalid(format!(
                "century_base {} must lie within {}..={}",
                self.century_base,
                CENTURY_BASE_RANGE.start(),
                CENTURY_BASE_RANGE.end()
            )));
        }
        if self.min_academic_year < 1
            || self.min_academic_year > self.max_academic_year
            || self.max_academic_year > ACADEMIC_YEAR_CEILING
        {
            return Err(ConfigError::Invalid(format!(
                "academic year window {}..={} must lie within 1..={ACADEMIC_YEAR_CEILING}",
                self.min_academic_year, self.max_academic_year
            )));
        }
        validate_codes("extra_programs", &self.extra_programs, 2)?;
        validate_codes("extra_branches", &self.extra_branches, 3)?;
        Ok(())
    }
}

fn validate_codes(
    field: &str,
    entries: &BTreeMap<String, String>,
    width: usize,
) -> Result<(), ConfigError> {
    for (code, label) in entries {
        if code.len() != width || !code.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid(format!(
                "{field} key `{code}` must be {width} ASCII alphanumeric characters"
            )));
        }
        if label.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{field} label for `{code}` must not be blank"
            )));
        }
    }
    Ok(())
}

/// How `assign_all` schedules its four ensure-operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOutMode {
    /// One scoped thread per level, joined before returning.
    #[default]
    Concurrent,
    /// Levels run one after another on the calling thread.
    Sequential,
}

/// Cohort assigner settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssignerConfig {
    pub fan_out: FanOutMode,
}

/// Configuration load/validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Reads and validates a JSON configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<CampusConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    parse_config(raw.as_str())
}

/// Parses and validates a JSON configuration document.
pub fn parse_config(raw: &str) -> Result<CampusConfig, ConfigError> {
    let config: CampusConfig = serde_json::from_str(raw)?;
    config.validate()?;
    Ok(config)
}
