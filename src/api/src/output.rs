//! JSON output of scan results.

use std::path::{Path, PathBuf};

use crate::aggregator::ScanReport;
use crate::config::OutputConfig;
use crate::error::ScanError;

/// Paths written by [`write_report`]
#[derive(Debug, Clone)]
pub struct WrittenFiles {
    pub races: PathBuf,
    pub summary: PathBuf,
}

/// Write the race list and the summary as pretty-printed JSON
pub fn write_report(report: &ScanReport, config: &OutputConfig) -> Result<WrittenFiles, ScanError> {
    let dir = Path::new(&config.dir);
    std::fs::create_dir_all(dir)?;

    let races = dir.join(&config.races_file);
    std::fs::write(&races, serde_json::to_string_pretty(&report.races)?)?;

    let summary = dir.join(&config.summary_file);
    std::fs::write(&summary, serde_json::to_string_pretty(&report.summary)?)?;

    Ok(WrittenFiles { races, summary })
}
