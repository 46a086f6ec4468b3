//! Race id space generator.
//!
//! There is no index of race ids, so the scanner enumerates
//! year × venue × meeting × day × race. The order matters: under a capped
//! scan budget the ids most likely to exist and be recent come first.
//!
//! Order: year (current first) → meeting (highest first) → venue (configured
//! priority) → day (highest first) → race (ascending).

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::HashSet;

use crate::config::{NumberRange, ScanConfig};
use crate::types::CandidateId;

/// Meetings to enumerate for one year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearPlan {
    pub year: u16,
    pub meetings: NumberRange,
}

/// Generator for candidate race ids
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    years: Vec<YearPlan>,
    venues: Vec<u8>,
    days: NumberRange,
    races: NumberRange,
}

impl CandidateGenerator {
    pub fn new(years: Vec<YearPlan>, venues: Vec<u8>, days: NumberRange, races: NumberRange) -> Self {
        Self {
            years,
            venues,
            days,
            races,
        }
    }

    /// Build the generator for a scan run on `today`
    pub fn from_config(config: &ScanConfig, today: NaiveDate) -> Self {
        let years = if config.years.is_empty() {
            Self::plan_years(config, today)
        } else {
            config
                .years
                .iter()
                .map(|&year| YearPlan {
                    year,
                    meetings: config.meetings,
                })
                .collect()
        };

        Self::new(years, config.venue_codes(), config.days, config.races)
    }

    /// Current year in full, plus the tail of the previous year when the
    /// look-back window reaches past New Year (race numbering resets annually).
    fn plan_years(config: &ScanConfig, today: NaiveDate) -> Vec<YearPlan> {
        let mut plans = vec![YearPlan {
            year: today.year() as u16,
            meetings: config.meetings,
        }];

        let window_start = Duration::try_days(config.days_back)
            .and_then(|d| today.checked_sub_signed(d))
            .unwrap_or(NaiveDate::MIN);
        if window_start.year() < today.year() && config.previous_year_tail > 0 {
            let last = config.meetings.last;
            let first = last
                .saturating_sub(config.previous_year_tail - 1)
                .max(config.meetings.first);
            plans.push(YearPlan {
                year: (today.year() - 1) as u16,
                meetings: NumberRange::new(first, last),
            });
        }

        plans
    }

    pub fn years(&self) -> &[YearPlan] {
        &self.years
    }

    /// Produce the ordered, duplicate-free candidate list
    pub fn generate(&self) -> Vec<CandidateId> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        for plan in &self.years {
            for meeting in (plan.meetings.first..=plan.meetings.last).rev() {
                for &venue in &self.venues {
                    for day in (self.days.first..=self.days.last).rev() {
                        for race in self.races.first..=self.races.last {
                            let id = CandidateId::new(plan.year, venue, meeting, day, race);
                            if seen.insert(id) {
                                ids.push(id);
                            }
                        }
                    }
                }
            }
        }

        ids
    }

    /// Number of ids `generate` would return, ignoring duplicates
    pub fn upper_bound(&self) -> usize {
        let span = |r: &NumberRange| (r.last as usize + 1).saturating_sub(r.first as usize);
        let per_meeting = self.venues.len() * span(&self.days) * span(&self.races);
        self.years.iter().map(|p| span(&p.meetings) * per_meeting).sum()
    }
}
