//! Alert decision: earliest date, target gating and alert message text.

use crate::extract::Finding;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Title used for every availability alert
pub const ALERT_TITLE: &str = "Appointment Availability Found";

/// Whether a qualifying date re-alerts on every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertPolicy {
    /// Alert on every cycle that sees a qualifying date
    #[default]
    Every,
    /// Alert once per distinct earliest date for the lifetime of the process
    OncePerDate,
}

/// Result of weighing one cycle's findings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertDecision {
    pub should_alert: bool,
    /// Earliest date seen; `None` when there were no findings
    pub earliest: Option<NaiveDate>,
}

/// Decide whether `findings` warrant an alert.
///
/// With a `threshold`, only an earliest date on or before it qualifies.
/// Without one, any finding qualifies.
pub fn decide(findings: &[Finding], threshold: Option<NaiveDate>) -> AlertDecision {
    let earliest = findings.iter().map(|f| f.date).min();

    let should_alert = match (earliest, threshold) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(date), Some(target)) => date <= target,
    };

    AlertDecision {
        should_alert,
        earliest,
    }
}

/// Human-readable alert body listing every finding
pub fn alert_body(findings: &[Finding]) -> String {
    let lines = findings
        .iter()
        .map(|f| format!("- {} → {}", f.text, f.date.format("%Y-%m-%d")))
        .collect::<Vec<_>>()
        .join("\n");

    format!("Found possible availability lines:\n\n{}", lines)
}

/// Suppresses repeat alerts according to an [`AlertPolicy`].
///
/// Memory only; nothing survives a restart.
#[derive(Debug, Default)]
pub struct AlertGate {
    policy: AlertPolicy,
    alerted: HashSet<NaiveDate>,
}

impl AlertGate {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            alerted: HashSet::new(),
        }
    }

    /// True if an alert for `earliest` should go out
    pub fn permits(&self, earliest: NaiveDate) -> bool {
        match self.policy {
            AlertPolicy::Every => true,
            AlertPolicy::OncePerDate => !self.alerted.contains(&earliest),
        }
    }

    /// Record a successfully delivered alert
    pub fn record(&mut self, earliest: NaiveDate) {
        if self.policy == AlertPolicy::OncePerDate {
            self.alerted.insert(earliest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn findings(dates: &[&str]) -> Vec<Finding> {
        dates
            .iter()
            .map(|d| Finding {
                text: format!("Available {}", d),
                date: date(d),
            })
            .collect()
    }

    #[test]
    fn earliest_date_is_selected() {
        let found = findings(&["2025-08-10", "2025-06-01", "2025-07-15"]);
        assert_eq!(decide(&found, None).earliest, Some(date("2025-06-01")));
    }

    #[test]
    fn threshold_gates_the_alert() {
        let found = findings(&["2025-08-10", "2025-06-01", "2025-07-15"]);

        assert!(!decide(&found, Some(date("2025-05-01"))).should_alert);
        assert!(decide(&found, Some(date("2025-07-01"))).should_alert);
        assert!(decide(&found, Some(date("2025-06-01"))).should_alert);
        assert!(decide(&found, None).should_alert);
    }

    #[test]
    fn no_findings_never_alert() {
        let decision = decide(&[], Some(date("2030-01-01")));
        assert_eq!(
            decision,
            AlertDecision {
                should_alert: false,
                earliest: None
            }
        );
        assert!(!decide(&[], None).should_alert);
    }

    #[test]
    fn body_lists_every_finding() {
        let found = vec![
            Finding {
                text: "Mumbai: 06/01/2025".to_string(),
                date: date("2025-06-01"),
            },
            Finding {
                text: "Chennai 2025-08-10".to_string(),
                date: date("2025-08-10"),
            },
        ];

        assert_eq!(
            alert_body(&found),
            "Found possible availability lines:\n\n\
             - Mumbai: 06/01/2025 → 2025-06-01\n\
             - Chennai 2025-08-10 → 2025-08-10"
        );
    }

    #[test]
    fn every_policy_never_suppresses() {
        let mut gate = AlertGate::new(AlertPolicy::Every);
        gate.record(date("2025-06-01"));
        assert!(gate.permits(date("2025-06-01")));
    }

    #[test]
    fn once_per_date_suppresses_only_recorded_dates() {
        let mut gate = AlertGate::new(AlertPolicy::OncePerDate);
        assert!(gate.permits(date("2025-06-01")));

        gate.record(date("2025-06-01"));
        assert!(!gate.permits(date("2025-06-01")));
        assert!(gate.permits(date("2025-05-20")));
    }
}
