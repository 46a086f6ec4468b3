//! HTML parsers for netkeiba.com race pages.

pub mod entry_table;
pub mod race_page;

pub use entry_table::{EntryTableExtractor, TableRow};
pub use race_page::{PageContext, RaceDocument, RacePageParser};
