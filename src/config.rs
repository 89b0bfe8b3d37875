//! Scheduler configuration
//!
//! A single immutable [`CadenceConfig`] value is loaded once per run and
//! passed by reference into every component. Nothing reads configuration
//! from globals.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::Stage;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Data directory not found")]
    DataDirNotFound,

    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Cadence parameters and collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Reviews spent in the daily stage before promotion
    pub daily_limit: u32,
    /// Reviews spent in the weekly stage before promotion
    pub weekly_limit: u32,
    /// Reviews spent in the monthly stage before mastery
    pub monthly_limit: u32,
    /// Wall-clock time ("HH:MM") every due date is pinned to
    pub morning_time: String,
    /// Expanding intervals for the mastered stage, indexed by review count
    pub mastered_intervals_days: Vec<u32>,
    /// Interval used once the mastered list is exhausted
    pub mastered_fallback_days: u32,
    /// Text marker that suspends automated processing for an item
    pub manual_override_marker: String,
    pub visibility: VisibilityConfig,
    pub collections: CollectionNames,
    pub intake: IntakeConfig,
    pub providers: ProviderConfig,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            daily_limit: 7,
            weekly_limit: 4,
            monthly_limit: 24,
            morning_time: "08:00".to_string(),
            mastered_intervals_days: vec![60, 90, 120, 180],
            mastered_fallback_days: 365,
            manual_override_marker: "[manual]".to_string(),
            visibility: VisibilityConfig::default(),
            collections: CollectionNames::default(),
            intake: IntakeConfig::default(),
            providers: ProviderConfig::default(),
        }
    }
}

/// Progressive masking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Visibility ratios spread evenly across the monthly stage
    pub schedule: Vec<f64>,
    /// Shortest alphabetic run that may be masked
    pub min_word_len: usize,
    pub mask_char: char,
    /// Marker lines between the masked text and the full text
    pub buffer_lines: usize,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            schedule: vec![1.0, 0.75, 0.5, 0.35, 0.2],
            min_word_len: 3,
            mask_char: '_',
            buffer_lines: 12,
        }
    }
}

/// Host collection (list) names, one per stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionNames {
    pub backlog: String,
    pub daily: String,
    pub weekly: String,
    pub monthly: String,
    pub mastered: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            backlog: "Scripture Memorization - Backlog".to_string(),
            daily: "Scripture Memorization - Daily".to_string(),
            weekly: "Scripture Memorization - Weekly".to_string(),
            monthly: "Scripture Memorization - Monthly".to_string(),
            mastered: "Scripture Memorization - Mastered".to_string(),
        }
    }
}

impl CollectionNames {
    /// Collection that holds items of the given stage
    pub fn for_stage(&self, stage: Stage) -> &str {
        match stage {
            Stage::Backlog => &self.backlog,
            Stage::Daily => &self.daily,
            Stage::Weekly => &self.weekly,
            Stage::Monthly => &self.monthly,
            Stage::Mastered => &self.mastered,
        }
    }

    /// Stage collections that take part in reconciliation and cadence
    pub fn active(&self) -> Vec<(Stage, &str)> {
        Stage::ACTIVE
            .iter()
            .map(|stage| (*stage, self.for_stage(*stage)))
            .collect()
    }
}

/// A suggestion candidate with optional topic tags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestionEntry {
    pub reference: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Backlog intake settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Backlog items admitted into daily per run
    pub max_new_per_run: usize,
    /// Minimum days between accepted suggestions; unset disables suggestions
    pub suggest_min_days: Option<u32>,
    pub suggestion_topic: Option<String>,
    pub suggestion_pool: Vec<SuggestionEntry>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_new_per_run: 1,
            suggest_min_days: None,
            suggestion_topic: None,
            suggestion_pool: Vec::new(),
        }
    }
}

/// Text lookup provider kinds, tried in configured order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// `<reference>::<text>` lines in a local file
    Local,
    /// api.esv.org, needs an API key
    Esv,
    /// bible-api.com
    BibleApi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub order: Vec<ProviderKind>,
    /// Defaults to `verses.txt` in the data directory
    pub verse_cache_path: Option<PathBuf>,
    pub esv_api_key: Option<String>,
    pub translation: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            order: vec![ProviderKind::Local, ProviderKind::Esv, ProviderKind::BibleApi],
            verse_cache_path: None,
            esv_api_key: None,
            translation: "kjv".to_string(),
            timeout_secs: 15,
        }
    }
}

impl CadenceConfig {
    /// Load configuration from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CadenceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the cadence math cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.daily_limit == 0 || self.weekly_limit == 0 || self.monthly_limit == 0 {
            return Err(ConfigError::Invalid(
                "stage limits must be at least 1".to_string(),
            ));
        }
        if parse_time(&self.morning_time).is_none() {
            return Err(ConfigError::Invalid(format!(
                "morning_time '{}' is not HH:MM",
                self.morning_time
            )));
        }
        if self
            .visibility
            .schedule
            .iter()
            .any(|r| !r.is_finite() || !(0.0..=1.0).contains(r))
        {
            return Err(ConfigError::Invalid(
                "visibility ratios must lie in [0, 1]".to_string(),
            ));
        }
        if self.visibility.mask_char.is_alphabetic() {
            return Err(ConfigError::Invalid(
                "mask_char must not be a letter".to_string(),
            ));
        }
        Ok(())
    }

    /// Morning time every due date is pinned to
    pub fn morning(&self) -> NaiveTime {
        parse_time(&self.morning_time)
            .or_else(|| NaiveTime::from_hms_opt(8, 0, 0))
            .unwrap_or(NaiveTime::MIN)
    }
}

/// Parse a time string in "HH:MM" format
fn parse_time(time_str: &str) -> Option<NaiveTime> {
    let parts: Vec<&str> = time_str.trim().split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hour: u32 = parts[0].parse().ok()?;
    let minute: u32 = parts[1].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Default data directory for state, host file and verse cache
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|p| p.join("cadence"))
        .ok_or(ConfigError::DataDirNotFound)
}

/// Default location of `config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("cadence").join("config.toml"))
        .ok_or(ConfigError::ConfigDirNotFound)
}
