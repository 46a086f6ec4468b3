//! Error types for the scanner.

use chrono::NaiveDate;
use thiserror::Error;

/// Failures that stop a run before or after the scan itself
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Why a fetched page was dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("page has no usable title")]
    MissingTitle,
    #[error("title is the site's own branding: {0:?}")]
    BrandedTitle(String),
    #[error("venue code {0} is not a known racecourse")]
    UnknownVenue(String),
    #[error("no race date found")]
    MissingDate,
    #[error("race date {0} is outside the scan window")]
    OutOfWindow(NaiveDate),
    #[error("only {found} horses recovered, {required} required")]
    TooFewHorses { found: usize, required: usize },
}

impl RejectReason {
    pub fn is_classification(&self) -> bool {
        !self.is_extraction()
    }

    pub fn is_extraction(&self) -> bool {
        matches!(self, RejectReason::TooFewHorses { .. })
    }
}
