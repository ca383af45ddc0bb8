//! # Slotwatch
//!
//! Unattended watcher for appointment availability on a scheduling page.
//!
//! ## Features
//!
//! - **Tolerant date recognition**: ISO and slash-separated dates inside free text
//! - **Target gating**: alert only when the earliest date is on or before a target
//! - **Best-effort alerts**: Telegram and email, either one succeeding is enough
//! - **Jittered polling**: fixed interval plus random extra delay; zero interval checks once

pub mod config;
pub mod date;
pub mod decision;
pub mod extract;
pub mod fetcher;
pub mod logging;
pub mod notify;
pub mod scheduler;

pub use config::Config;
pub use extract::{Finding, PollResult};
pub use scheduler::{Outcome, Watcher};
