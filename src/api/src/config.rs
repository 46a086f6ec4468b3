//! Configuration for the race scanner.

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::scraper::venue_name;

/// Longest accepted look-back or look-ahead, in days
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Which race page the ids are resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// Race card (shutuba.html)
    #[default]
    Entry,
    /// Race result (result.html)
    Result,
}

/// Inclusive number range for one component of the race id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberRange {
    pub first: u8,
    pub last: u8,
}

impl NumberRange {
    pub const fn new(first: u8, last: u8) -> Self {
        Self { first, last }
    }

    fn validate(&self, name: &str) -> Result<(), ScanError> {
        if self.first == 0 || self.last > 99 || self.first > self.last {
            return Err(ScanError::InvalidConfig(format!(
                "{} range {}..={} must satisfy 1 <= first <= last <= 99",
                name, self.first, self.last
            )));
        }
        Ok(())
    }
}

/// Scan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_days_back")]
    pub days_back: i64,
    #[serde(default = "default_days_forward")]
    pub days_forward: i64,
    #[serde(default = "default_min_horses")]
    pub min_horses: usize,
    /// Venue codes in scan priority order
    #[serde(default = "default_venues")]
    pub venues: Vec<String>,
    #[serde(default = "default_meetings")]
    pub meetings: NumberRange,
    #[serde(default = "default_days")]
    pub days: NumberRange,
    #[serde(default = "default_races")]
    pub races: NumberRange,
    /// Explicit years; derived from the date window when empty
    #[serde(default)]
    pub years: Vec<u16>,
    /// Highest meetings of the prior year scanned when the window crosses New Year
    #[serde(default = "default_previous_year_tail")]
    pub previous_year_tail: u8,
    #[serde(default)]
    pub page: PageKind,
    /// Require a capital letter or punctuation in jockey cells
    #[serde(default)]
    pub strict_jockey: bool,
}

fn default_batch_size() -> usize {
    12
}

fn default_max_candidates() -> usize {
    2000
}

fn default_batch_delay_ms() -> u64 {
    500
}

fn default_days_back() -> i64 {
    30
}

fn default_days_forward() -> i64 {
    30
}

fn default_min_horses() -> usize {
    4
}

fn default_venues() -> Vec<String> {
    // Tokyo, Nakayama, Kyoto, Hanshin first: they host most of the calendar
    ["05", "06", "08", "09", "07", "10", "04", "03", "01", "02"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_meetings() -> NumberRange {
    NumberRange::new(1, 5)
}

fn default_days() -> NumberRange {
    NumberRange::new(1, 8)
}

fn default_races() -> NumberRange {
    NumberRange::new(1, 12)
}

fn default_previous_year_tail() -> u8 {
    2
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_candidates: default_max_candidates(),
            batch_delay_ms: default_batch_delay_ms(),
            days_back: default_days_back(),
            days_forward: default_days_forward(),
            min_horses: default_min_horses(),
            venues: default_venues(),
            meetings: default_meetings(),
            days: default_days(),
            races: default_races(),
            years: Vec::new(),
            previous_year_tail: default_previous_year_tail(),
            page: PageKind::default(),
            strict_jockey: false,
        }
    }
}

impl ScanConfig {
    /// Reject configurations the scan cannot start with
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.batch_size == 0 {
            return Err(ScanError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.min_horses == 0 {
            return Err(ScanError::InvalidConfig("min_horses must be at least 1".into()));
        }
        for (name, days) in [("days_back", self.days_back), ("days_forward", self.days_forward)] {
            if !(0..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(ScanError::InvalidConfig(format!(
                    "{} must be between 0 and {}, got {}",
                    name, MAX_WINDOW_DAYS, days
                )));
            }
        }
        self.meetings.validate("meetings")?;
        self.days.validate("days")?;
        self.races.validate("races")?;

        for code in &self.venues {
            if code.len() != 2 || venue_name(code).is_none() {
                return Err(ScanError::InvalidConfig(format!(
                    "unknown venue code {:?}",
                    code
                )));
            }
        }
        if let Some(year) = self.years.iter().find(|y| !(1986..=9999).contains(*y)) {
            return Err(ScanError::InvalidConfig(format!("year {} out of range", year)));
        }
        Ok(())
    }

    /// Venue codes as numbers, in priority order
    pub fn venue_codes(&self) -> Vec<u8> {
        self.venues.iter().filter_map(|c| c.parse().ok()).collect()
    }
}

/// HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_races_file")]
    pub races_file: String,
    #[serde(default = "default_summary_file")]
    pub summary_file: String,
    /// Exit non-zero when no races were found
    #[serde(default)]
    pub strict: bool,
}

fn default_output_dir() -> String {
    "data".to_string()
}

fn default_races_file() -> String {
    "races.json".to_string()
}

fn default_summary_file() -> String {
    "summary.json".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            races_file: default_races_file(),
            summary_file: default_summary_file(),
            strict: false,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (KEIBA__SCAN__BATCH_SIZE, etc.)
            .add_source(
                config::Environment::with_prefix("KEIBA")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("scan.venues")
                    .with_list_parse_key("scan.years"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
