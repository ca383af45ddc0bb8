//! The watch loop: fetch, extract, decide, alert, sleep, repeat.
//!
//! Cycles never overlap and no cycle failure escapes the loop. A fetch that
//! errors or outlives its timeout becomes a logged [`Outcome::Error`] and the
//! next cycle is the retry. Interval and jitter stay fixed regardless of how
//! many cycles in a row have failed.

use crate::config::Config;
use crate::decision::{alert_body, decide, AlertGate, ALERT_TITLE};
use crate::extract::{ExtractError, Extractor, PollResult};
use crate::fetcher::{FetchError, PageFetcher, SessionToken};
use crate::notify::Notifier;
use chrono::NaiveDate;
use rand::Rng;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Raw fragments shown when nothing parsed as a date
const DIAGNOSTIC_FRAGMENTS: usize = 3;

/// What a single cycle ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The page could not be retrieved
    Error(String),
    AlertSent { earliest: NaiveDate },
    /// Every notification channel failed
    AlertFailed { earliest: NaiveDate },
    LaterThanTarget { earliest: NaiveDate },
    /// Qualifying date already alerted under the once-per-date policy
    Suppressed { earliest: NaiveDate },
    /// Nothing parsed; carries the first few raw fragments
    NoDates { raw: Vec<String> },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Error(reason) => write!(f, "ERROR: {}", reason),
            Outcome::AlertSent { earliest } => write!(f, "ALERT sent. Earliest: {}", earliest),
            Outcome::AlertFailed { earliest } => {
                write!(f, "ALERT FAILED to send. Earliest: {}", earliest)
            }
            Outcome::LaterThanTarget { earliest } => {
                write!(f, "Dates found, but later than target: {}", earliest)
            }
            Outcome::Suppressed { earliest } => {
                write!(f, "Alert suppressed, already sent for: {}", earliest)
            }
            Outcome::NoDates { raw } => write!(f, "No dates parsed. Raw lines: {:?}", raw),
        }
    }
}

/// Delay before the next cycle: the interval plus up to `jitter_secs` extra whole seconds
pub fn next_delay<R: Rng + ?Sized>(
    interval_secs: i64,
    jitter_secs: u64,
    rng: &mut R,
) -> Duration {
    let base = interval_secs.max(0) as u64;
    let extra = if jitter_secs == 0 {
        0
    } else {
        rng.random_range(0..=jitter_secs)
    };
    Duration::from_secs(base.saturating_add(extra))
}

/// Polls one page and alerts on qualifying availability.
pub struct Watcher<'a> {
    config: &'a Config,
    fetcher: Box<dyn PageFetcher>,
    extractor: Extractor,
    notifier: Notifier,
    gate: AlertGate,
}

impl<'a> Watcher<'a> {
    pub fn new(
        config: &'a Config,
        fetcher: Box<dyn PageFetcher>,
        notifier: Notifier,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            config,
            fetcher,
            extractor: Extractor::new(&config.target.selector)?,
            notifier,
            gate: AlertGate::new(config.schedule.alert_policy),
        })
    }

    /// Run one cycle, then keep going every interval (plus jitter) unless single-shot
    pub async fn run(&mut self) {
        loop {
            self.run_cycle().await;

            if self.config.single_shot() {
                return;
            }

            let delay = next_delay(
                self.config.schedule.interval_secs,
                self.config.schedule.jitter_secs,
                &mut rand::rng(),
            );
            debug!(secs = delay.as_secs(), "sleeping until next check");
            tokio::time::sleep(delay).await;
        }
    }

    /// Fetch, extract and decide once, alerting if warranted
    pub async fn run_cycle(&mut self) -> Outcome {
        let outcome = match self.check_once().await {
            PollResult::Failure(reason) => Outcome::Error(reason),
            PollResult::Success { findings, raw } => {
                let decision = decide(&findings, self.config.schedule.earliest_target_date);

                match decision.earliest {
                    None => Outcome::NoDates {
                        raw: raw.into_iter().take(DIAGNOSTIC_FRAGMENTS).collect(),
                    },
                    Some(earliest) if !decision.should_alert => {
                        Outcome::LaterThanTarget { earliest }
                    }
                    Some(earliest) if !self.gate.permits(earliest) => {
                        Outcome::Suppressed { earliest }
                    }
                    Some(earliest) => {
                        let body = alert_body(&findings);
                        if self.notifier.push_alert(ALERT_TITLE, &body).await {
                            self.gate.record(earliest);
                            Outcome::AlertSent { earliest }
                        } else {
                            Outcome::AlertFailed { earliest }
                        }
                    }
                }
            }
        };

        log_outcome(&outcome);
        outcome
    }

    /// Fetch the page and extract findings. Extraction is skipped if the fetch fails.
    pub async fn check_once(&self) -> PollResult {
        let session = match SessionToken::load_if_present(&self.config.target.session_path) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "continuing without saved session");
                None
            }
        };

        let url = self.config.page_url();
        let timeout = self.config.fetch_timeout();
        let fetch = self.fetcher.fetch(url, session.as_ref(), timeout);

        match tokio::time::timeout(timeout, fetch).await {
            Ok(Ok(markup)) => self.extractor.extract(&markup),
            Ok(Err(e)) => PollResult::Failure(e.to_string()),
            Err(_) => PollResult::Failure(FetchError::Timeout.to_string()),
        }
    }
}

fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Error(_) | Outcome::AlertFailed { .. } => error!("{}", outcome),
        Outcome::NoDates { .. } => warn!("{}", outcome),
        _ => info!("{}", outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn delay_stays_within_interval_plus_jitter() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let delay = next_delay(30, 10, &mut rng).as_secs();
            assert!((30..=40).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn zero_jitter_is_exact() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(next_delay(45, 0, &mut rng), Duration::from_secs(45));
    }

    #[test]
    fn huge_interval_saturates() {
        let mut rng = StdRng::seed_from_u64(3);
        let delay = next_delay(i64::MAX, u64::MAX, &mut rng);
        assert!(delay >= Duration::from_secs(i64::MAX as u64));
    }

    #[test]
    fn negative_interval_clamps_to_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(next_delay(-10, 0, &mut rng), Duration::ZERO);
    }

    #[test]
    fn outcome_lines_match_log_vocabulary() {
        let earliest = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(
            Outcome::Error("Timeout opening page".into()).to_string(),
            "ERROR: Timeout opening page"
        );
        assert!(Outcome::AlertSent { earliest }
            .to_string()
            .starts_with("ALERT sent"));
        assert!(Outcome::AlertFailed { earliest }
            .to_string()
            .starts_with("ALERT FAILED"));
        assert_eq!(
            Outcome::LaterThanTarget { earliest }.to_string(),
            "Dates found, but later than target: 2025-06-01"
        );
        assert_eq!(
            Outcome::NoDates {
                raw: vec!["Closed".into()]
            }
            .to_string(),
            "No dates parsed. Raw lines: [\"Closed\"]"
        );
    }
}
