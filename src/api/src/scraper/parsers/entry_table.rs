//! Horse entry extraction from race tables.
//!
//! Race tables do not have a fixed column layout: post position, horse name,
//! and jockey move between cell offsets across page variants. Rows are
//! therefore read by content shape, using small predicates applied over
//! bounded windows of cells.
//!
//! Known limitation: a row whose position cell is found but whose name or
//! jockey is not is dropped; it is not retried with a different anchor.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::config::PageKind;
use crate::types::HorseEntry;

/// Rows with fewer cells are never entries
pub const MIN_CELLS: usize = 4;
/// Cells (from the left) searched for the post position
pub const POSITION_PREFIX: usize = 3;
/// Cells after the anchor searched for the horse name
pub const NAME_WINDOW: usize = 3;
/// Last cell offset from the anchor searched for the jockey
pub const JOCKEY_REACH: usize = 6;

pub const MAX_POSITION: u8 = 20;
const MAX_NAME_LEN: usize = 50;
const MIN_NAME_LEN: usize = 3;
const MIN_JOCKEY_LEN: usize = 4;
const MAX_JOCKEY_LEN: usize = 30;

/// Row class marking a genuine race card row
pub const ENTRY_ROW_CLASS: &str = "HorseList";

/// One table row as seen by the extractor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    pub classes: Vec<String>,
    /// `td` text; header cells never hold entries
    pub cells: Vec<String>,
    /// `td` and `th` text in document order, for dumps
    pub display_cells: Vec<String>,
}

impl TableRow {
    pub fn new<S: Into<String>>(cells: impl IntoIterator<Item = S>) -> Self {
        let cells: Vec<String> = cells
            .into_iter()
            .map(|c| {
                let c: String = c.into();
                c.trim().to_string()
            })
            .collect();
        Self {
            classes: Vec::new(),
            display_cells: cells.clone(),
            cells,
        }
    }

    pub fn with_display_cells(mut self, display_cells: Vec<String>) -> Self {
        self.display_cells = display_cells;
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

fn sex_age_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "M4", "F3", "牡5", "セ6"
    RE.get_or_init(|| Regex::new(r"^[MFGHC牡牝セ騸]\d{1,2}$").unwrap())
}

/// Exact decimal integer in 1..=20 ("1st", "01", "1.5" do not count)
pub fn parse_position(text: &str) -> Option<u8> {
    let text = text.trim();
    let n: u8 = text.parse().ok()?;
    if (1..=MAX_POSITION).contains(&n) && n.to_string() == text {
        Some(n)
    } else {
        None
    }
}

fn has_letter(text: &str) -> bool {
    text.chars().any(char::is_alphabetic)
}

fn is_all_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// Weight cells ("57kg", "56.0kg")
fn is_weight(text: &str) -> bool {
    text.to_ascii_lowercase().contains("kg")
}

pub fn is_name_like(text: &str) -> bool {
    let len = text.chars().count();
    (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len)
        && has_letter(text)
        && !is_all_digits(text)
        && !is_weight(text)
        && !sex_age_re().is_match(text)
}

pub fn is_jockey_like(text: &str, name: &str) -> bool {
    let len = text.chars().count();
    (MIN_JOCKEY_LEN..=MAX_JOCKEY_LEN).contains(&len)
        && has_letter(text)
        && !is_all_digits(text)
        && !is_weight(text)
        && text != name
}

/// Jockeys are usually printed as "M. Demuro" or "C.Lemaire"
pub fn is_strict_jockey_like(text: &str, name: &str) -> bool {
    is_jockey_like(text, name)
        && text
            .chars()
            .any(|c| c.is_uppercase() || c == '.' || c == '・' || c == '-')
}

/// First cell in `cells[start..end]` accepted by `pred`, with its index
pub fn first_match<'a, P>(cells: &'a [String], start: usize, end: usize, pred: P) -> Option<(usize, &'a str)>
where
    P: Fn(&str) -> bool,
{
    let end = end.min(cells.len());
    if start >= end {
        return None;
    }
    cells[start..end]
        .iter()
        .enumerate()
        .find(|(_, c)| pred(c))
        .map(|(i, c)| (start + i, c.as_str()))
}

/// Column positions of a documented race table layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub position: usize,
    pub name: usize,
    pub jockey: usize,
}

/// netkeiba shutuba table: 枠, 馬番, 印, 馬名, 性齢, 斤量, 騎手, ...
pub const SHUTUBA_COLUMNS: ColumnMap = ColumnMap {
    position: 1,
    name: 3,
    jockey: 6,
};

/// netkeiba result table: 着順, 枠, 馬番, 馬名, 性齢, 斤量, 騎手, ...
pub const RESULT_COLUMNS: ColumnMap = ColumnMap {
    position: 2,
    name: 3,
    jockey: 6,
};

impl ColumnMap {
    pub fn for_page(page: PageKind) -> Self {
        match page {
            PageKind::Entry => SHUTUBA_COLUMNS,
            PageKind::Result => RESULT_COLUMNS,
        }
    }
}

/// How a row is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStrategy {
    /// Marked entry row with a known column layout
    StructuredRowClass(ColumnMap),
    /// Content-shape scan with no column assumptions
    HeuristicScan,
}

impl RowStrategy {
    /// Pick the strategy for a row from its markup and the page it came from
    pub fn for_row(row: &TableRow, page: PageKind) -> Self {
        if row.has_class(ENTRY_ROW_CLASS) {
            RowStrategy::StructuredRowClass(ColumnMap::for_page(page))
        } else {
            RowStrategy::HeuristicScan
        }
    }

    pub fn extract(&self, row: &TableRow, strict_jockey: bool) -> Option<HorseEntry> {
        if row.cells.len() < MIN_CELLS {
            return None;
        }
        match self {
            RowStrategy::StructuredRowClass(columns) => extract_structured(row, columns, strict_jockey),
            RowStrategy::HeuristicScan => extract_heuristic(row, strict_jockey),
        }
    }
}

fn jockey_pred(strict: bool) -> fn(&str, &str) -> bool {
    if strict {
        is_strict_jockey_like
    } else {
        is_jockey_like
    }
}

fn extract_structured(row: &TableRow, columns: &ColumnMap, strict_jockey: bool) -> Option<HorseEntry> {
    let cell = |i: usize| row.cells.get(i).map(String::as_str);

    let position = parse_position(cell(columns.position)?)?;
    let name = cell(columns.name).filter(|n| is_name_like(n))?;
    let jockey = cell(columns.jockey).filter(|j| jockey_pred(strict_jockey)(j, name))?;

    Some(HorseEntry {
        position,
        name: name.to_string(),
        jockey: jockey.to_string(),
    })
}

fn extract_heuristic(row: &TableRow, strict_jockey: bool) -> Option<HorseEntry> {
    let cells = &row.cells;

    let (anchor, position) = cells
        .iter()
        .take(POSITION_PREFIX)
        .enumerate()
        .find_map(|(i, c)| parse_position(c).map(|p| (i, p)))?;

    let (name_idx, name) = first_match(cells, anchor + 1, anchor + 1 + NAME_WINDOW, is_name_like)?;

    let is_jockey = jockey_pred(strict_jockey);
    let (_, jockey) = first_match(cells, name_idx + 1, anchor + 1 + JOCKEY_REACH, |c| {
        is_jockey(c, name)
    })?;

    Some(HorseEntry {
        position,
        name: name.to_string(),
        jockey: jockey.to_string(),
    })
}

/// Extractor over all rows of a page
#[derive(Debug, Clone, Copy)]
pub struct EntryTableExtractor {
    pub page: PageKind,
    pub strict_jockey: bool,
}

impl EntryTableExtractor {
    pub fn new(page: PageKind, strict_jockey: bool) -> Self {
        Self { page, strict_jockey }
    }

    /// Read one row: the documented layout first for marked rows, then the
    /// content-shape scan
    pub fn extract_row(&self, row: &TableRow) -> Option<HorseEntry> {
        match RowStrategy::for_row(row, self.page) {
            structured @ RowStrategy::StructuredRowClass(_) => structured
                .extract(row, self.strict_jockey)
                .or_else(|| RowStrategy::HeuristicScan.extract(row, self.strict_jockey)),
            heuristic => heuristic.extract(row, self.strict_jockey),
        }
    }

    /// All entries, first occurrence per position, sorted by position
    pub fn extract(&self, rows: &[TableRow]) -> Vec<HorseEntry> {
        let mut seen = HashSet::new();
        let mut entries: Vec<HorseEntry> = rows
            .iter()
            .filter_map(|row| self.extract_row(row))
            .filter(|entry| seen.insert(entry.position))
            .collect();

        entries.sort_by_key(|e| e.position);
        entries
    }
}
