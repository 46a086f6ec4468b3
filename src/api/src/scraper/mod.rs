//! Race page scanner for netkeiba.com
//!
//! Enumerates race ids, fetches their pages, and turns them into race records.

pub mod candidates;
pub mod orchestrator;
pub mod parsers;

pub use candidates::CandidateGenerator;
pub use orchestrator::{Orchestrator, RunStats};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::time::Duration;
use tracing::debug;

use crate::config::{HttpConfig, PageKind};
use crate::error::ScanError;
use crate::types::{CandidateId, FetchOutcome};

/// Base URL for netkeiba.com
pub const BASE_URL: &str = "https://race.netkeiba.com";

/// Site name that shows up in titles of error and placeholder pages
pub const BRAND_NAME: &str = "netkeiba";

/// JRA racecourse codes (the VV part of a race id)
pub const TRACK_MAP: [(&str, &str); 10] = [
    ("01", "Sapporo"),
    ("02", "Hakodate"),
    ("03", "Fukushima"),
    ("04", "Niigata"),
    ("05", "Tokyo"),
    ("06", "Nakayama"),
    ("07", "Chukyo"),
    ("08", "Kyoto"),
    ("09", "Hanshin"),
    ("10", "Kokura"),
];

/// Display name for a two-digit venue code
pub fn venue_name(code: &str) -> Option<&'static str> {
    TRACK_MAP
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Build race card URL
pub fn race_card_url(race_id: &str) -> String {
    format!("{}/race/shutuba.html?race_id={}", BASE_URL, race_id)
}

/// Build race result URL
pub fn race_result_url(race_id: &str) -> String {
    format!("{}/race/result.html?race_id={}", BASE_URL, race_id)
}

/// URL of the page that is fetched for this id
pub fn page_url(kind: PageKind, race_id: &CandidateId) -> String {
    match kind {
        PageKind::Entry => race_card_url(&race_id.to_string()),
        PageKind::Result => race_result_url(&race_id.to_string()),
    }
}

/// Both page URLs for a race, fetched page first
pub fn source_urls(kind: PageKind, race_id: &CandidateId) -> Vec<String> {
    let id = race_id.to_string();
    match kind {
        PageKind::Entry => vec![race_card_url(&id), race_result_url(&id)],
        PageKind::Result => vec![race_result_url(&id), race_card_url(&id)],
    }
}

/// Something that can resolve a race id to a page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, race_id: &CandidateId) -> FetchOutcome;
}

/// Plain HTTP fetcher with browser-like headers
pub struct HttpFetcher {
    client: reqwest::Client,
    page: PageKind,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig, page: PageKind) -> Result<Self, ScanError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ja,en-US;q=0.8,en;q=0.6"));
        if let Ok(agent) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, agent);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, page })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, race_id: &CandidateId) -> FetchOutcome {
        let url = page_url(self.page, race_id);

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return FetchOutcome::TransientError(e.to_string()),
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return FetchOutcome::NotFound;
        }
        if !status.is_success() {
            debug!("{} returned {}", url, status);
            return FetchOutcome::TransientError(format!("HTTP {} for {}", status, url));
        }

        match response.text().await {
            Ok(body) => FetchOutcome::Success(body),
            Err(e) => FetchOutcome::TransientError(e.to_string()),
        }
    }
}
