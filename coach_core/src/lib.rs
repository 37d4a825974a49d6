#![forbid(unsafe_code)]

//! Core domain model and business logic for the Coach training-program
//! modification engine.
//!
//! This crate provides:
//! - Domain types (sessions, plans, rules, automations, presets)
//! - Condition evaluation and action application
//! - Rule engine and what-if simulation
//! - Recurrence scheduling and automation execution
//! - Persistence (JSON collections, run journal, CSV archive)

pub mod types;
pub mod error;
pub mod parse;
pub mod config;
pub mod logging;
pub mod condition;
pub mod action;
pub mod engine;
pub mod schedule;
pub mod executor;
pub mod metrics;
pub mod simulation;
pub mod preset;
pub mod store;
pub mod runlog;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use engine::{apply_rules, RuleDraft, RuleOutcome};
pub use executor::{is_due, run_due, ActionHandler, AutomationDraft, LoggingHandler};
pub use metrics::compute_metrics;
pub use preset::{PresetDraft, PresetExport, PresetFilter};
pub use schedule::next_run;
pub use simulation::{simulate, SimulationScope};
pub use store::{AutomationRepository, FileStore, PresetRepository, RuleRepository};
