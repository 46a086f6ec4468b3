//! Batched fetch loop.
//!
//! Candidates are fetched in fixed-size batches. Fetches inside a batch run
//! concurrently and fail independently; batches run strictly one after the
//! other with a fixed pause in between so the site is not hammered. A miss is
//! final for the run: nothing is retried.

use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::parsers::{PageContext, RacePageParser};
use super::PageFetcher;
use crate::aggregator::Aggregator;
use crate::types::{CandidateId, FetchOutcome};

/// Counters for a single run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub checked: usize,
    pub found: usize,
    pub graded: usize,
    pub not_found: usize,
    pub transient_errors: usize,
    pub classification_rejects: usize,
    pub extraction_rejects: usize,
    pub duplicates: usize,
    /// First transport failure of the run, set once
    pub first_error: Option<String>,
}

impl RunStats {
    fn record_transient(&mut self, race_id: &CandidateId, message: String) {
        self.transient_errors += 1;
        if self.first_error.is_none() {
            warn!("First fetch error at {}: {}", race_id, message);
            self.first_error = Some(message);
        } else {
            debug!("Fetch error at {}: {}", race_id, message);
        }
    }
}

/// Drives fetching and parsing for a list of candidates
pub struct Orchestrator<F: PageFetcher> {
    fetcher: F,
    ctx: PageContext,
    batch_size: usize,
    batch_delay: Duration,
}

impl<F: PageFetcher> Orchestrator<F> {
    pub fn new(fetcher: F, ctx: PageContext, batch_size: usize, batch_delay: Duration) -> Self {
        Self {
            fetcher,
            ctx,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Fetch every candidate and feed accepted races to the aggregator
    pub async fn run(&self, candidates: &[CandidateId], aggregator: &mut Aggregator) -> RunStats {
        let mut stats = RunStats::default();
        let total = candidates.len();
        let batches = total.div_ceil(self.batch_size);

        for (index, batch) in candidates.chunks(self.batch_size).enumerate() {
            let outcomes = self.fetch_batch(batch).await;

            for (race_id, outcome) in outcomes {
                stats.checked += 1;
                self.handle_outcome(race_id, outcome, aggregator, &mut stats);
            }

            info!(
                "Checked {}/{} | races {} | graded {}",
                stats.checked,
                total,
                aggregator.len(),
                stats.graded
            );

            if index + 1 < batches && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        stats
    }

    async fn fetch_batch(&self, batch: &[CandidateId]) -> Vec<(CandidateId, FetchOutcome)> {
        let fetches = batch.iter().map(|race_id| async move {
            let outcome = self.fetcher.fetch(race_id).await;
            (*race_id, outcome)
        });
        join_all(fetches).await
    }

    fn handle_outcome(
        &self,
        race_id: CandidateId,
        outcome: FetchOutcome,
        aggregator: &mut Aggregator,
        stats: &mut RunStats,
    ) {
        let html = match outcome {
            FetchOutcome::Success(html) => html,
            FetchOutcome::NotFound => {
                stats.not_found += 1;
                return;
            }
            FetchOutcome::TransientError(message) => {
                stats.record_transient(&race_id, message);
                return;
            }
        };

        match RacePageParser::parse(&html, &race_id, &self.ctx) {
            Ok(race) => match aggregator.push(race) {
                Some(record) => {
                    stats.found += 1;
                    if record.is_graded() {
                        stats.graded += 1;
                    }
                    info!(
                        "Found {} {} {} ({} horses)",
                        race_id,
                        record.date,
                        record.title,
                        record.horses.len()
                    );
                }
                None => stats.duplicates += 1,
            },
            Err(reason) => {
                debug!("Rejected {}: {}", race_id, reason);
                if reason.is_classification() {
                    stats.classification_rejects += 1;
                } else {
                    stats.extraction_rejects += 1;
                }
            }
        }
    }
}
