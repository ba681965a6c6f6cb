//! negsweep core library
//!
//! Classifies an account's recent search terms, gates them through human
//! approval and reconciles the approved ones into shared negative keyword
//! lists. Remote systems are reached only through the `AdAccountService` and
//! `AiClassifier` ports.

pub mod accounts;
pub mod approval;
pub mod classifier;
pub mod config;
mod error;
pub mod obs;
pub mod pipeline;
pub mod reconciler;
pub mod report;
pub mod telemetry;
pub mod term;

pub use accounts::{AccountDirectory, AccountEntry, AccountRef};
pub use approval::{
    approve, parse_selection, ApprovalPolicy, LineChannel, ScriptedChannel, Selection,
    StdioChannel,
};
pub use classifier::{Classification, DisqualifierTable, TermClassifier};
pub use config::{ListConfig, ListSettings, PhraseMode, SweepConfig};
pub use error::{SweepError, SweepResult};
pub use pipeline::{SweepPipeline, TermSource};
pub use reconciler::{
    dedup_key, CategoryOutcome, ExclusionReconciler, ReconcileStage, Reconciliation,
};
pub use report::{AccountReport, BatchReport, ReportAggregator};
pub use term::{ApprovedTerm, FlagCategory, FlagSource, FlaggedTerm};

pub use negsweep_platform::{AccountId, DateRange};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
