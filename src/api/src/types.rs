//! Core data types for the race scanner.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Structured race id: YYYY VV KK DD RR (year, venue, meeting, day, race).
///
/// netkeiba exposes race pages only through this 12-digit key, so the scanner
/// has to enumerate it instead of looking races up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateId {
    pub year: u16,
    pub venue: u8,
    pub meeting: u8,
    pub day: u8,
    pub race: u8,
}

impl CandidateId {
    pub fn new(year: u16, venue: u8, meeting: u8, day: u8, race: u8) -> Self {
        Self {
            year,
            venue,
            meeting,
            day,
            race,
        }
    }

    /// Two-digit venue code as used in the id and the venue table
    pub fn venue_code(&self) -> String {
        format!("{:02}", self.venue)
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}{:02}{:02}",
            self.year, self.venue, self.meeting, self.day, self.race
        )
    }
}

impl FromStr for CandidateId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 12 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("race id must be 12 digits: {:?}", s));
        }
        let part = |range: std::ops::Range<usize>| s[range].parse::<u16>().unwrap_or(0);
        Ok(Self {
            year: part(0..4),
            venue: part(4..6) as u8,
            meeting: part(6..8) as u8,
            day: part(8..10) as u8,
            race: part(10..12) as u8,
        })
    }
}

/// Result of looking up one candidate id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(String),
    NotFound,
    /// Non-2xx (other than 404), timeout, or transport failure
    TransientError(String),
}

/// Graded stakes level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    G1,
    G2,
    G3,
}

impl Grade {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Grade::G1),
            2 => Some(Grade::G2),
            3 => Some(Grade::G3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Surface {
    #[default]
    Turf,
    Dirt,
}

/// One recovered row of a race card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorseEntry {
    pub position: u8,
    pub name: String,
    pub jockey: String,
}

/// A page that passed classification and extraction, not yet numbered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRace {
    pub race_id: CandidateId,
    pub title: String,
    pub grade: Option<Grade>,
    pub date: NaiveDate,
    pub venue: String,
    pub distance: String,
    pub surface: Surface,
    pub horses: Vec<HorseEntry>,
    pub source_urls: Vec<String>,
}

impl ParsedRace {
    pub fn into_record(self, id: u32) -> RaceRecord {
        RaceRecord {
            id,
            title: self.title,
            grade: self.grade,
            date: self.date,
            venue: self.venue,
            distance: self.distance,
            surface: self.surface,
            horses: self.horses,
            source_urls: self.source_urls,
        }
    }
}

/// Final output record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceRecord {
    pub id: u32,
    pub title: String,
    pub grade: Option<Grade>,
    pub date: NaiveDate,
    pub venue: String,
    pub distance: String,
    pub surface: Surface,
    pub horses: Vec<HorseEntry>,
    pub source_urls: Vec<String>,
}

impl RaceRecord {
    pub fn is_graded(&self) -> bool {
        self.grade.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_id_display() {
        let id = CandidateId::new(2024, 6, 5, 8, 11);
        assert_eq!(id.to_string(), "202406050811");
        assert_eq!(id.venue_code(), "06");
    }

    #[test]
    fn test_candidate_id_parse() {
        let id: CandidateId = "202409010111".parse().unwrap();
        assert_eq!(id, CandidateId::new(2024, 9, 1, 1, 11));
        assert!("20240901011".parse::<CandidateId>().is_err());
        assert!("2024090101AB".parse::<CandidateId>().is_err());
    }

    #[test]
    fn test_race_record_json_shape() {
        let record = ParsedRace {
            race_id: CandidateId::new(2024, 6, 5, 8, 11),
            title: "Arima Kinen".to_string(),
            grade: Some(Grade::G1),
            date: NaiveDate::from_ymd_opt(2024, 12, 22).unwrap(),
            venue: "Nakayama".to_string(),
            distance: "2500m".to_string(),
            surface: Surface::Turf,
            horses: vec![HorseEntry {
                position: 1,
                name: "Do Deuce".to_string(),
                jockey: "Y. Take".to_string(),
            }],
            source_urls: vec!["https://example.com".to_string()],
        }
        .into_record(7);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["grade"], "G1");
        assert_eq!(json["date"], "2024-12-22");
        assert_eq!(json["surface"], "Turf");
        assert_eq!(json["horses"][0]["position"], 1);
        assert!(json.get("sourceUrls").is_some());
    }

    #[test]
    fn test_race_records_round_trip() {
        let records = vec![
            RaceRecord {
                id: 1,
                title: "Tenno Sho".to_string(),
                grade: None,
                date: NaiveDate::from_ymd_opt(2024, 10, 27).unwrap(),
                venue: "Tokyo".to_string(),
                distance: "Unknown".to_string(),
                surface: Surface::Dirt,
                horses: vec![],
                source_urls: vec![],
            },
        ];
        let json = serde_json::to_string_pretty(&records).unwrap();
        let back: Vec<RaceRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, records);
    }
}
