//! CLI commands for keiba-scan.
//!
//! `scan` walks the race id space and writes the races it finds;
//! `inspect` dumps the table structure of a saved page and runs the extractor on it.

use anyhow::{bail, Context};
use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::aggregator::{Aggregator, ScanReport};
use crate::config::{AppConfig, PageKind, ScanConfig};
use crate::output::write_report;
use crate::scraper::parsers::race_page::{extract_course, extract_grade, resolve_date, resolve_title};
use crate::scraper::parsers::{EntryTableExtractor, PageContext, RaceDocument, RacePageParser, TableRow};
use crate::scraper::{CandidateGenerator, HttpFetcher, Orchestrator, RunStats};
use crate::types::CandidateId;

#[derive(Parser)]
#[command(name = "keiba-scan")]
#[command(version, about = "Discover upcoming and recent JRA race cards on netkeiba.com", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan race ids and write the races found
    Scan(ScanArgs),

    /// Show the table structure of a saved race page and try extraction
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Saved HTML file
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Page type the file was saved from
    #[arg(long, value_enum, default_value_t = PageKind::Entry)]
    pub page: PageKind,

    /// Race id of the page; runs the full classifier against today's window
    #[arg(long)]
    pub race_id: Option<CandidateId>,

    /// Minimum horses for the page to count as a race
    #[arg(long, default_value_t = 4)]
    pub min_horses: usize,

    /// Require a capital letter or punctuation in jockey cells
    #[arg(long)]
    pub strict_jockey: bool,
}

/// Overrides for the loaded configuration
#[derive(Args, Debug, Default)]
pub struct ScanArgs {
    /// Candidates fetched concurrently per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Total race ids to examine
    #[arg(short = 'n', long)]
    pub max_candidates: Option<usize>,

    /// Pause between batches in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Days before today to accept
    #[arg(long)]
    pub days_back: Option<i64>,

    /// Days after today to accept
    #[arg(long)]
    pub days_forward: Option<i64>,

    /// Minimum horses for a page to count as a race
    #[arg(long)]
    pub min_horses: Option<usize>,

    /// Venue codes in priority order (e.g. 05,06,09)
    #[arg(long, value_delimiter = ',')]
    pub venues: Option<Vec<String>>,

    /// Page type to fetch
    #[arg(long, value_enum)]
    pub page: Option<PageKind>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Exit with an error when no races are found
    #[arg(long)]
    pub strict: bool,
}

impl ScanArgs {
    fn apply(self, config: &mut AppConfig) {
        let scan = &mut config.scan;
        if let Some(v) = self.batch_size {
            scan.batch_size = v;
        }
        if let Some(v) = self.max_candidates {
            scan.max_candidates = v;
        }
        if let Some(v) = self.delay_ms {
            scan.batch_delay_ms = v;
        }
        if let Some(v) = self.days_back {
            scan.days_back = v;
        }
        if let Some(v) = self.days_forward {
            scan.days_forward = v;
        }
        if let Some(v) = self.min_horses {
            scan.min_horses = v;
        }
        if let Some(v) = self.venues {
            scan.venues = v;
        }
        if let Some(v) = self.page {
            scan.page = v;
        }
        if let Some(v) = self.output {
            config.output.dir = v.to_string_lossy().to_string();
        }
        if self.strict {
            config.output.strict = true;
        }
    }
}

/// Run a full scan.
pub async fn run_scan(args: ScanArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;
    args.apply(&mut config);
    config.scan.validate()?;

    let today = Local::now().date_naive();
    let generator = CandidateGenerator::from_config(&config.scan, today);
    for plan in generator.years() {
        debug!(
            "Year {}: meetings {}..={}",
            plan.year, plan.meetings.first, plan.meetings.last
        );
    }
    let candidates: Vec<_> = generator
        .generate()
        .into_iter()
        .take(config.scan.max_candidates)
        .collect();

    info!(
        "Scanning {} of {} race ids ({} days back, {} days forward, batch {})",
        candidates.len(),
        generator.upper_bound(),
        config.scan.days_back,
        config.scan.days_forward,
        config.scan.batch_size
    );

    let fetcher = HttpFetcher::new(&config.http, config.scan.page).context("Failed to set up HTTP client")?;
    let ctx = PageContext::from_config(&config.scan, today);
    let orchestrator = Orchestrator::new(
        fetcher,
        ctx,
        config.scan.batch_size,
        Duration::from_millis(config.scan.batch_delay_ms),
    );

    let mut aggregator = Aggregator::new();
    let stats = orchestrator.run(&candidates, &mut aggregator).await;
    let report = aggregator.finish(Utc::now());

    let written = write_report(&report, &config.output).context("Failed to write results")?;
    print_scan_summary(&stats, &report);
    eprintln!("Races written to {}", written.races.display());
    eprintln!("Summary written to {}", written.summary.display());

    if report.races.is_empty() {
        warn_no_races(&stats);
        if config.output.strict {
            bail!("no races found in {} candidates", stats.checked);
        }
    }

    Ok(())
}

fn print_scan_summary(stats: &RunStats, report: &ScanReport) {
    eprintln!();
    eprintln!("=== Scan Complete ===");
    eprintln!("  Checked:       {}", stats.checked);
    eprintln!("  Races found:   {}", stats.found);
    eprintln!("  Graded stakes: {}", stats.graded);
    eprintln!("  Not found:     {}", stats.not_found);
    eprintln!("  Fetch errors:  {}", stats.transient_errors);
    eprintln!(
        "  Rejected:      {} (page), {} (too few horses)",
        stats.classification_rejects, stats.extraction_rejects
    );
    if let Some(range) = report.summary.date_range {
        eprintln!("  Dates:         {} .. {}", range.earliest, range.latest);
    }
    for (venue, count) in &report.summary.races_by_venue {
        eprintln!("    {:<10} {}", venue, count);
    }
}

fn warn_no_races(stats: &RunStats) {
    warn!("No races found. Likely causes:");
    if stats.transient_errors > 0 {
        warn!(
            "  - network errors or blocking by the site ({} failed fetches, first: {})",
            stats.transient_errors,
            stats.first_error.as_deref().unwrap_or("unknown")
        );
    } else {
        warn!("  - requests blocked by the site or the network");
    }
    if stats.classification_rejects > 0 {
        warn!(
            "  - date window too narrow ({} pages rejected as out of window or not a race)",
            stats.classification_rejects
        );
    } else {
        warn!("  - no races scheduled inside the date window");
    }
    warn!("  - venue, meeting, day or race ranges do not match the current calendar");
}

/// Inspect a saved race page.
pub fn run_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let document = RaceDocument::parse(&html);

    println!("Page title: {}", document.title);
    match resolve_title(&document.title, document.heading.as_deref()) {
        Ok(title) => println!("Race title: {}", title),
        Err(e) => println!("Race title: rejected ({})", e),
    }
    match resolve_date(&document.title, &document.body_text) {
        Some(date) => println!("Date:       {}", date),
        None => println!("Date:       not found"),
    }
    if let Some(grade) = extract_grade(&document.title) {
        println!("Grade:      {:?}", grade);
    }
    let (distance, surface) = extract_course(&document.body_text);
    println!("Course:     {} {:?}", distance, surface);

    for (i, rows) in document.tables.iter().enumerate() {
        print_table(i + 1, rows);
    }

    let rows: Vec<TableRow> = document.rows().cloned().collect();
    let horses = EntryTableExtractor::new(args.page, args.strict_jockey).extract(&rows);

    println!();
    println!("=== Extracted Horses ===");
    for horse in &horses {
        println!("  #{:>2}: {} (J: {})", horse.position, horse.name, horse.jockey);
    }
    println!();
    if horses.len() >= args.min_horses {
        println!("OK: {} horses extracted", horses.len());
    } else {
        println!(
            "FAILED: {} horses extracted, {} required. Check which columns hold post position, horse name and jockey.",
            horses.len(),
            args.min_horses
        );
    }

    if let Some(race_id) = args.race_id {
        let scan = ScanConfig {
            min_horses: args.min_horses,
            page: args.page,
            strict_jockey: args.strict_jockey,
            ..Default::default()
        };
        let ctx = PageContext::from_config(&scan, Local::now().date_naive());
        match RacePageParser::parse_document(&document, &race_id, &ctx) {
            Ok(race) => println!(
                "Race {}: {} at {} on {}, {} horses",
                race_id,
                race.title,
                race.venue,
                race.date,
                race.horses.len()
            ),
            Err(reason) => println!("Race {}: rejected ({})", race_id, reason),
        }
    }

    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

fn print_table(number: usize, rows: &[TableRow]) {
    println!();
    println!("=== Table {} ({} rows) ===", number, rows.len());
    for (r, row) in rows.iter().take(5).enumerate() {
        if row.display_cells.is_empty() {
            continue;
        }
        println!("Row {} ({} cells){}", r, row.display_cells.len(), row_class_suffix(row));
        for (c, cell) in row.display_cells.iter().enumerate() {
            println!("  [{}]: {:?}", c, truncate(cell, 20));
        }
    }
}

fn row_class_suffix(row: &TableRow) -> String {
    if row.classes.is_empty() {
        String::new()
    } else {
        format!(" class={}", row.classes.join(" "))
    }
}
