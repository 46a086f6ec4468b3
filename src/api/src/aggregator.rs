//! Collects parsed races into the final, numbered record list.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::types::{CandidateId, ParsedRace, RaceRecord};

/// Earliest and latest race date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

/// Summary statistics over a finished scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub last_updated: DateTime<Utc>,
    pub total_races: usize,
    pub graded_stakes: usize,
    pub date_range: Option<DateRange>,
    pub races_by_venue: BTreeMap<String, usize>,
    pub races_by_date: BTreeMap<NaiveDate, usize>,
}

impl ScanSummary {
    pub fn from_records(records: &[RaceRecord], last_updated: DateTime<Utc>) -> Self {
        let mut races_by_venue = BTreeMap::new();
        let mut races_by_date = BTreeMap::new();
        for record in records {
            *races_by_venue.entry(record.venue.clone()).or_insert(0) += 1;
            *races_by_date.entry(record.date).or_insert(0) += 1;
        }

        let date_range = match (races_by_date.keys().next(), races_by_date.keys().next_back()) {
            (Some(&earliest), Some(&latest)) => Some(DateRange { earliest, latest }),
            _ => None,
        };

        Self {
            last_updated,
            total_races: records.len(),
            graded_stakes: records.iter().filter(|r| r.is_graded()).count(),
            date_range,
            races_by_venue,
            races_by_date,
        }
    }
}

/// Final output of a scan
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub races: Vec<RaceRecord>,
    pub summary: ScanSummary,
}

/// Numbers races in arrival order and drops repeats of the same race id
#[derive(Debug, Default)]
pub struct Aggregator {
    records: Vec<RaceRecord>,
    seen: HashSet<CandidateId>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a race; returns the stored record, or `None` for a duplicate
    pub fn push(&mut self, race: ParsedRace) -> Option<&RaceRecord> {
        if !self.seen.insert(race.race_id) {
            return None;
        }
        let id = self.records.len() as u32 + 1;
        self.records.push(race.into_record(id));
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Newest races first; equal dates keep arrival order
    pub fn finish(self, now: DateTime<Utc>) -> ScanReport {
        let mut races = self.records;
        races.sort_by(|a, b| b.date.cmp(&a.date));
        let summary = ScanSummary::from_records(&races, now);
        ScanReport { races, summary }
    }
}
