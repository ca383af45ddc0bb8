//! Tolerant date recognition for free-form availability text.
//!
//! Only the first date-like substring of a fragment is considered. It is read as
//! ISO (`YYYY-MM-DD`) first, then month-first (`MM/DD/YYYY`), then day-first
//! (`DD/MM/YYYY`). Slash dates that are valid both ways are therefore always read
//! month-first: `03/04/2025` is the 4th of March. There is no locale detection.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

/// Interpretations tried, in order, against the matched substring
const FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

lazy_static! {
    static ref DATE_RX: Regex = Regex::new(r"(20\d{2}-\d{2}-\d{2})|(\d{1,2}/\d{1,2}/20\d{2})")
        .expect("date pattern is valid");
}

/// Find the first date in `text`.
///
/// Returns `None` when nothing date-like appears, or when the first candidate
/// is not a real calendar date under any accepted format. Later candidates in
/// the same text are never tried.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let candidate = DATE_RX.find(text)?.as_str();

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
}
