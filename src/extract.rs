//! Availability extraction from rendered page markup.
//!
//! Uses scraper for element selection and [`crate::date`] for date recognition.

use crate::date::parse_date;
use chrono::NaiveDate;
use scraper::{Html, Selector};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid selection rule '{rule}': {reason}")]
    InvalidSelector { rule: String, reason: String },
}

/// A fragment of page text paired with the date recognised in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Visible text of the matched element
    pub text: String,
    /// Date parsed from `text`
    pub date: NaiveDate,
}

/// Outcome of fetching and extracting one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    Success {
        /// Fragments that carried a date, in document order
        findings: Vec<Finding>,
        /// Every non-empty fragment the rule matched, dated or not
        raw: Vec<String>,
    },
    Failure(String),
}

/// Compiled selection rule for availability indicators.
#[derive(Debug, Clone)]
pub struct Extractor {
    selector: Selector,
}

impl Extractor {
    /// Compile a CSS selection rule
    pub fn new(rule: &str) -> Result<Self, ExtractError> {
        let selector = Selector::parse(rule).map_err(|e| ExtractError::InvalidSelector {
            rule: rule.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { selector })
    }

    /// Visible text of every matched element, empties dropped.
    ///
    /// Each text node is trimmed and the nodes are concatenated without a
    /// separator, so a date split across inline elements reads as one.
    pub fn fragments(&self, markup: &str) -> Vec<String> {
        let document = Html::parse_document(markup);

        document
            .select(&self.selector)
            .map(|element| element.text().map(str::trim).collect::<String>())
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// Select fragments and keep those that contain a date
    pub fn extract(&self, markup: &str) -> PollResult {
        let raw = self.fragments(markup);
        let findings = raw
            .iter()
            .filter_map(|text| {
                parse_date(text).map(|date| Finding {
                    text: text.clone(),
                    date,
                })
            })
            .collect();

        PollResult::Success { findings, raw }
    }
}
