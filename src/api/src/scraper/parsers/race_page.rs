//! Race page classifier and metadata parser.
//!
//! Decides whether a fetched page is a real race page inside the scan window,
//! and if so reads title, grade, date, venue, distance and surface, then hands
//! the tables to the entry extractor. Any reject short-circuits: no partial
//! race is ever produced.

use chrono::{Duration, NaiveDate};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

use super::entry_table::{EntryTableExtractor, TableRow};
use crate::config::{PageKind, ScanConfig};
use crate::error::RejectReason;
use crate::scraper::{source_urls, venue_name, BRAND_NAME};
use crate::types::{CandidateId, Grade, ParsedRace, Surface};

/// Titles shorter than this are treated as missing
const MIN_TITLE_LEN: usize = 3;
const TITLE_SEPARATORS: [char; 2] = ['|', '｜'];

/// Distance placeholder when the course line is missing
pub const UNKNOWN_DISTANCE: &str = "Unknown";

/// The parts of a page the scanner looks at
#[derive(Debug, Clone, Default)]
pub struct RaceDocument {
    pub title: String,
    pub heading: Option<String>,
    pub body_text: String,
    /// Rows grouped per table, in document order
    pub tables: Vec<Vec<TableRow>>,
}

impl RaceDocument {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);

        let title_sel = Selector::parse("title").unwrap();
        let heading_sel = Selector::parse("h1").unwrap();
        let table_sel = Selector::parse("table").unwrap();
        let row_sel = Selector::parse("tr").unwrap();
        let td_sel = Selector::parse("td").unwrap();
        let cell_sel = Selector::parse("td, th").unwrap();
        let cell_text = |e: ElementRef| e.text().collect::<String>().trim().to_string();

        let title = document
            .select(&title_sel)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let heading = document
            .select(&heading_sel)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
            .filter(|h| !h.is_empty());

        let body_text = document.root_element().text().collect::<Vec<_>>().join(" ");

        let tables = document
            .select(&table_sel)
            .map(|table| {
                table
                    .select(&row_sel)
                    .map(|row| {
                        let parsed = TableRow::new(row.select(&td_sel).map(cell_text))
                            .with_display_cells(row.select(&cell_sel).map(cell_text).collect());
                        row.value().classes().fold(parsed, TableRow::with_class)
                    })
                    .collect()
            })
            .collect();

        Self {
            title,
            heading,
            body_text,
            tables,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &TableRow> {
        self.tables.iter().flatten()
    }
}

/// Accepted race dates relative to a reference day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub today: NaiveDate,
    pub days_back: i64,
    pub days_forward: i64,
}

impl DateWindow {
    pub fn new(today: NaiveDate, days_back: i64, days_forward: i64) -> Self {
        Self {
            today,
            days_back,
            days_forward,
        }
    }

    /// Saturates at the calendar limits instead of overflowing
    pub fn earliest(&self) -> NaiveDate {
        Duration::try_days(self.days_back)
            .and_then(|d| self.today.checked_sub_signed(d))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn latest(&self) -> NaiveDate {
        Duration::try_days(self.days_forward)
            .and_then(|d| self.today.checked_add_signed(d))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.earliest() && date <= self.latest()
    }
}

/// Everything page parsing depends on besides the page itself
#[derive(Debug, Clone, Copy)]
pub struct PageContext {
    pub window: DateWindow,
    pub min_horses: usize,
    pub page: PageKind,
    pub extractor: EntryTableExtractor,
}

impl PageContext {
    pub fn from_config(config: &ScanConfig, today: NaiveDate) -> Self {
        Self {
            window: DateWindow::new(today, config.days_back, config.days_forward),
            min_horses: config.min_horses,
            page: config.page,
            extractor: EntryTableExtractor::new(config.page, config.strict_jockey),
        }
    }
}

fn month_name_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?,?\s+(\d{4})\b",
        )
        .unwrap()
    })
}

fn numeric_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 2024/12/22, 2024-12-22, 2024.12.22, 2024年12月22日
    RE.get_or_init(|| Regex::new(r"(\d{4})\s*[/\-.年]\s*(\d{1,2})\s*[/\-.月]\s*(\d{1,2})").unwrap())
}

fn grade_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[(（]\s*[GＧ]\s*([1-3１-３]|III|II|I)\s*[)）]").unwrap())
}

fn course_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // T1600m, D1200m, 芝2500m, ダ1800m, 芝右2000m
    RE.get_or_init(|| Regex::new(r"(芝|ダ|\b[TD])[右左直]?\s?(\d{3,4})\s?m").unwrap())
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let name = name.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == name).map(|i| i as u32 + 1)
}

/// Date patterns, tried in order; the first that matches wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePattern {
    /// "22 December 2024" in the title
    TitleMonthName,
    /// "2024/12/22" or "2024年12月22日" in the title
    TitleNumeric,
    /// Same numeric form anywhere in the page
    BodyNumeric,
}

impl DatePattern {
    pub const CHAIN: [DatePattern; 3] = [
        DatePattern::TitleMonthName,
        DatePattern::TitleNumeric,
        DatePattern::BodyNumeric,
    ];

    pub fn find(&self, title: &str, body: &str) -> Option<NaiveDate> {
        match self {
            DatePattern::TitleMonthName => {
                let caps = month_name_date_re().captures(title)?;
                let day = caps[1].parse().ok()?;
                let month = month_number(&caps[2])?;
                let year = caps[3].parse().ok()?;
                NaiveDate::from_ymd_opt(year, month, day)
            }
            DatePattern::TitleNumeric => numeric_date(title),
            DatePattern::BodyNumeric => numeric_date(body),
        }
    }
}

/// First numeric match that is a real calendar date
fn numeric_date(text: &str) -> Option<NaiveDate> {
    numeric_date_re().captures_iter(text).find_map(|caps| {
        NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
    })
}

/// Resolve the race date through the pattern chain
pub fn resolve_date(title: &str, body: &str) -> Option<NaiveDate> {
    DatePattern::CHAIN.iter().find_map(|p| p.find(title, body))
}

/// Race title: page title up to the first separator, else the first heading
pub fn resolve_title(title: &str, heading: Option<&str>) -> Result<String, RejectReason> {
    let segment = title.split(TITLE_SEPARATORS).next().unwrap_or("").trim();

    let chosen = if segment.chars().count() >= MIN_TITLE_LEN {
        segment
    } else {
        heading
            .map(str::trim)
            .filter(|h| h.chars().count() >= MIN_TITLE_LEN)
            .ok_or(RejectReason::MissingTitle)?
    };

    if chosen.to_lowercase().contains(BRAND_NAME) {
        return Err(RejectReason::BrandedTitle(chosen.to_string()));
    }
    Ok(chosen.to_string())
}

/// Grade marker such as "(G1)", "（Ｇ２）" or "(GIII)"
pub fn extract_grade(title: &str) -> Option<Grade> {
    let caps = grade_re().captures(title)?;
    let level = match &caps[1] {
        "1" | "１" | "I" => 1,
        "2" | "２" | "II" => 2,
        "3" | "３" | "III" => 3,
        _ => return None,
    };
    Grade::from_level(level)
}

/// Distance string and surface; "Unknown" / turf when absent
pub fn extract_course(text: &str) -> (String, Surface) {
    match course_re().captures(text) {
        Some(caps) => {
            let surface = match &caps[1] {
                "ダ" | "D" => Surface::Dirt,
                _ => Surface::Turf,
            };
            (format!("{}m", &caps[2]), surface)
        }
        None => (UNKNOWN_DISTANCE.to_string(), Surface::default()),
    }
}

/// Parser for race card and race result pages
pub struct RacePageParser;

impl RacePageParser {
    /// Classify the page and build a race from it
    pub fn parse(html: &str, race_id: &CandidateId, ctx: &PageContext) -> Result<ParsedRace, RejectReason> {
        let document = RaceDocument::parse(html);
        Self::parse_document(&document, race_id, ctx)
    }

    pub fn parse_document(
        document: &RaceDocument,
        race_id: &CandidateId,
        ctx: &PageContext,
    ) -> Result<ParsedRace, RejectReason> {
        let title = resolve_title(&document.title, document.heading.as_deref())?;

        let code = race_id.venue_code();
        let venue = venue_name(&code).ok_or(RejectReason::UnknownVenue(code))?;

        let date = resolve_date(&document.title, &document.body_text).ok_or(RejectReason::MissingDate)?;
        if !ctx.window.contains(date) {
            return Err(RejectReason::OutOfWindow(date));
        }

        let grade = extract_grade(&document.title);
        let (distance, surface) = extract_course(&document.body_text);

        let rows: Vec<TableRow> = document.rows().cloned().collect();
        let horses = ctx.extractor.extract(&rows);
        if horses.len() < ctx.min_horses {
            return Err(RejectReason::TooFewHorses {
                found: horses.len(),
                required: ctx.min_horses,
            });
        }

        Ok(ParsedRace {
            race_id: *race_id,
            title,
            grade,
            date,
            venue: venue.to_string(),
            distance,
            surface,
            horses,
            source_urls: source_urls(ctx.page, race_id),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 20).unwrap()
    }

    pub(crate) fn context(min_horses: usize) -> PageContext {
        page_context(PageKind::Entry, min_horses)
    }

    fn page_context(page: PageKind, min_horses: usize) -> PageContext {
        PageContext {
            window: DateWindow::new(today(), 30, 30),
            min_horses,
            page,
            extractor: EntryTableExtractor::new(page, false),
        }
    }

    const HORSES: [(&str, &str); 5] = [
        ("Silver Comet", "M. Demuro"),
        ("Night Parade", "C. Lemaire"),
        ("Do Deuce", "Y. Take"),
        ("Justin Palace", "R. Moore"),
        ("Stars on Earth", "K. Tosaki"),
    ];

    /// Entry page with `horses` rows and the given title
    pub(crate) fn race_html(title: &str, horses: usize) -> String {
        let rows: String = HORSES
            .iter()
            .take(horses)
            .enumerate()
            .map(|(i, (name, jockey))| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>M4</td><td>{}</td><td>57kg</td></tr>\n",
                    i + 1,
                    name,
                    jockey
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html>
<head><title>{}</title></head>
<body>
<h1>Heading Race Name</h1>
<div class="RaceData01">15:25 T2500m (Right) Weather: Fine</div>
<table>
<tr><th>No.</th><th>Horse</th><th>Sex/Age</th><th>Jockey</th><th>Weight</th></tr>
{}</table>
</body>
</html>"#,
            title, rows
        )
    }

    fn arima() -> CandidateId {
        CandidateId::new(2024, 6, 5, 8, 11)
    }

    #[test]
    fn test_parse_full_page() {
        let html = race_html("Arima Kinen (G1) | 22 December 2024 Nakayama 11R - netkeiba", 5);
        let race = RacePageParser::parse(&html, &arima(), &context(4)).unwrap();

        assert_eq!(race.title, "Arima Kinen (G1)");
        assert_eq!(race.grade, Some(Grade::G1));
        assert_eq!(race.date, NaiveDate::from_ymd_opt(2024, 12, 22).unwrap());
        assert_eq!(race.venue, "Nakayama");
        assert_eq!(race.distance, "2500m");
        assert_eq!(race.surface, Surface::Turf);
        assert_eq!(race.horses.len(), 5);
        assert_eq!(race.horses[0].name, "Silver Comet");
        assert_eq!(race.horses[0].jockey, "M. Demuro");
        assert_eq!(race.source_urls[0], crate::scraper::race_card_url("202406050811"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let html = race_html("Arima Kinen (G1) | 2024/12/22", 5);
        let first = RacePageParser::parse(&html, &arima(), &context(4));
        let second = RacePageParser::parse(&html, &arima(), &context(4));
        assert_eq!(first, second);
    }

    #[test]
    fn test_too_few_horses_rejects_page() {
        let html = race_html("Arima Kinen (G1) | 2024/12/22", 3);
        let result = RacePageParser::parse(&html, &arima(), &context(4));
        assert_eq!(
            result,
            Err(RejectReason::TooFewHorses {
                found: 3,
                required: 4
            })
        );
    }

    #[test]
    fn test_branded_title_rejected() {
        let html = race_html("netkeiba | 2024/12/22", 5);
        let result = RacePageParser::parse(&html, &arima(), &context(4));
        assert!(matches!(result, Err(RejectReason::BrandedTitle(_))));
    }

    #[test]
    fn test_missing_date_rejected() {
        let html = race_html("Arima Kinen (G1)", 5).replace("T2500m", "");
        let result = RacePageParser::parse(&html, &arima(), &context(4));
        assert_eq!(result, Err(RejectReason::MissingDate));
    }

    #[test]
    fn test_unknown_venue_rejected() {
        let html = race_html("Arima Kinen | 2024/12/22", 5);
        let id = CandidateId::new(2024, 42, 5, 8, 11);
        let result = RacePageParser::parse(&html, &id, &context(4));
        assert_eq!(result, Err(RejectReason::UnknownVenue("42".into())));
    }

    #[test]
    fn test_date_window_bounds() {
        let window = DateWindow::new(today(), 30, 30);
        assert!(window.contains(today() - Duration::days(30)));
        assert!(!window.contains(today() - Duration::days(31)));
        assert!(window.contains(today() + Duration::days(30)));
        assert!(!window.contains(today() + Duration::days(31)));

        // 2024-11-19 is 31 days before 2024-12-20
        let html = race_html("Old Race | 2024/11/19", 5);
        let result = RacePageParser::parse(&html, &arima(), &context(4));
        assert!(matches!(result, Err(RejectReason::OutOfWindow(_))));

        let html = race_html("Old Race | 2024/11/20", 5);
        assert!(RacePageParser::parse(&html, &arima(), &context(4)).is_ok());
    }

    #[test]
    fn test_title_fallback_to_heading() {
        assert_eq!(
            resolve_title("| 2024/12/22", Some("Heading Race Name")),
            Ok("Heading Race Name".to_string())
        );
        assert_eq!(resolve_title("ab", None), Err(RejectReason::MissingTitle));
        assert_eq!(resolve_title("", Some("x")), Err(RejectReason::MissingTitle));
        assert_eq!(resolve_title("有馬記念(G1) 出馬表 ｜ 2024年", None), Ok("有馬記念(G1) 出馬表".to_string()));
    }

    #[test]
    fn test_date_chain_order() {
        // Month-name form in the title beats numeric forms
        assert_eq!(
            resolve_date("Race | 3 Nov 2024 | 2024/11/10", "2024/11/20"),
            NaiveDate::from_ymd_opt(2024, 11, 3)
        );
        assert_eq!(
            resolve_date("有馬記念 | 2024年12月22日 中山11R", "2024/11/20"),
            NaiveDate::from_ymd_opt(2024, 12, 22)
        );
        assert_eq!(
            resolve_date("Race", "Date: 2024-11-20 Post time 15:40"),
            NaiveDate::from_ymd_opt(2024, 11, 20)
        );
        assert_eq!(resolve_date("Race", "no date here"), None);
        assert_eq!(resolve_date("Race | 2024/13/40", "nothing"), None);
    }

    #[test]
    fn test_invalid_numeric_date_skipped() {
        assert_eq!(
            resolve_date("Race", "Updated 2024/13/40, race day 2024/11/20"),
            NaiveDate::from_ymd_opt(2024, 11, 20)
        );
        assert_eq!(
            resolve_date("Race | 2024/02/30 | 2024/02/29", "2024/11/20"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn test_date_window_saturates() {
        let window = DateWindow::new(today(), i64::MAX, i64::MAX);
        assert_eq!(window.earliest(), NaiveDate::MIN);
        assert_eq!(window.latest(), NaiveDate::MAX);
        assert!(window.contains(today()));

        let window = DateWindow::new(today(), 400_000_000, 0);
        assert_eq!(window.earliest(), NaiveDate::MIN);
        assert_eq!(window.latest(), today());
    }

    #[test]
    fn test_extract_grade() {
        assert_eq!(extract_grade("Arima Kinen (G1)"), Some(Grade::G1));
        assert_eq!(extract_grade("日経賞（G2）"), Some(Grade::G2));
        assert_eq!(extract_grade("中山牝馬S(GIII)"), Some(Grade::G3));
        assert_eq!(extract_grade("天皇賞(秋)（Ｇ１）"), Some(Grade::G1));
        assert_eq!(extract_grade("Maiden G1 winner"), None);
        assert_eq!(extract_grade("未勝利"), None);
    }

    #[test]
    fn test_extract_course() {
        assert_eq!(extract_course("15:25 T1600m (Left)"), ("1600m".to_string(), Surface::Turf));
        assert_eq!(extract_course("D1200m"), ("1200m".to_string(), Surface::Dirt));
        assert_eq!(extract_course("15:40発走 / ダ1800m (右)"), ("1800m".to_string(), Surface::Dirt));
        assert_eq!(extract_course("芝右2500m"), ("2500m".to_string(), Surface::Turf));
        assert_eq!(extract_course("no course"), ("Unknown".to_string(), Surface::Turf));
    }

    #[test]
    fn test_structured_rows_detected() {
        let html = r#"<html><head><title>Japan Cup (G1) | 2024/12/01</title></head><body>
<table class="Shutuba_Table">
<tr class="HorseList"><td>1</td><td>1</td><td></td><td>Do Deuce</td><td>M5</td><td>58.0</td><td>Y. Take</td></tr>
<tr class="HorseList"><td>1</td><td>2</td><td></td><td>Shin Emperor</td><td>M3</td><td>56.0</td><td>R. Moore</td></tr>
<tr class="HorseList"><td>2</td><td>3</td><td></td><td>Durezza</td><td>M4</td><td>58.0</td><td>J. Moreira</td></tr>
<tr class="HorseList"><td>2</td><td>4</td><td></td><td>Auguste Rodin</td><td>M4</td><td>58.0</td><td>K. Tosaki</td></tr>
</table></body></html>"#;
        let id = CandidateId::new(2024, 5, 5, 8, 12);
        let race = RacePageParser::parse(html, &id, &context(4)).unwrap();

        let positions: Vec<u8> = race.horses.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
        assert_eq!(race.horses[1].name, "Shin Emperor");
        assert_eq!(race.venue, "Tokyo");
        assert_eq!(race.distance, "Unknown");
    }

    #[test]
    fn test_result_page_structured_rows() {
        // 着順, 枠, 馬番, 馬名, 性齢, 斤量, 騎手; two horses share each of brackets 1 and 2
        let html = r#"<html><head><title>Japan Cup (G1) 結果 | 2024年11月24日</title></head><body>
<div class="RaceData01">15:40発走 / 芝2400m (左)</div>
<table class="RaceTable01">
<tr><th>着順</th><th>枠</th><th>馬番</th><th>馬名</th><th>性齢</th><th>斤量</th><th>騎手</th></tr>
<tr class="HorseList"><td>1</td><td>1</td><td>2</td><td>Do Deuce</td><td>牡5</td><td>58.0</td><td>Y. Take</td></tr>
<tr class="HorseList"><td>2</td><td>2</td><td>4</td><td>Shin Emperor</td><td>牡3</td><td>56.0</td><td>R. Moore</td></tr>
<tr class="HorseList"><td>3</td><td>3</td><td>5</td><td>Durezza</td><td>牡4</td><td>58.0</td><td>J. Moreira</td></tr>
<tr class="HorseList"><td>4</td><td>1</td><td>1</td><td>Auguste Rodin</td><td>牡4</td><td>58.0</td><td>K. Tosaki</td></tr>
<tr class="HorseList"><td>5</td><td>2</td><td>3</td><td>Justin Palace</td><td>牡5</td><td>58.0</td><td>C. Lemaire</td></tr>
</table></body></html>"#;
        let id = CandidateId::new(2024, 5, 5, 8, 12);
        let race = RacePageParser::parse(html, &id, &page_context(PageKind::Result, 4)).unwrap();

        let positions: Vec<u8> = race.horses.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
        assert_eq!(race.horses[0].name, "Auguste Rodin");
        assert_eq!(race.horses[1].name, "Do Deuce");
        assert_eq!(race.horses[4].jockey, "J. Moreira");
        assert_eq!(race.date, NaiveDate::from_ymd_opt(2024, 11, 24).unwrap());
        assert_eq!(race.distance, "2400m");
        assert_eq!(race.source_urls[0], crate::scraper::race_result_url("202405050812"));
    }

    #[test]
    fn test_document_tables() {
        let doc = RaceDocument::parse(&race_html("X Race | 2024/12/22", 2));
        assert_eq!(doc.title, "X Race | 2024/12/22");
        assert_eq!(doc.heading.as_deref(), Some("Heading Race Name"));
        assert_eq!(doc.tables.len(), 1);
        // Header row has no td cells but keeps its th text for display
        assert!(doc.tables[0][0].cells.is_empty());
        assert_eq!(doc.tables[0][0].display_cells[1], "Horse");
        assert_eq!(doc.tables[0][1].cells[1], "Silver Comet");
        assert_eq!(doc.tables[0][1].display_cells, doc.tables[0][1].cells);
    }
}
