//! perfrunner - Browser performance-test run orchestration.
//!
//! This crate provides:
//! - Backend selection across harness families (extension-based and
//!   browsertime-style, desktop and android)
//! - A run orchestrator with a strict partial-failure model: a run that
//!   publishes results can still be graded a failure when pages timed out
//! - Test catalog resolution from JSON manifests
//! - Post-run result packaging and local profile-viewer handoff
//!
//! # Example
//!
//! ```rust,no_run
//! use perfrunner::backend::{BackendOptions, MockBackend, MockFactory, RunMode, TargetIdentity};
//! use perfrunner::catalog::{StaticCatalog, TestDescriptor};
//! use perfrunner::orchestrator::Orchestrator;
//!
//! let catalog = StaticCatalog::new(vec![TestDescriptor::named("tp6-amazon")]);
//! let factory = MockFactory::new(MockBackend::succeeding("./results"));
//! let orchestrator = Orchestrator::new(&catalog, &factory);
//! let target = TargetIdentity::new("firefox", "/usr/bin/firefox", RunMode::Harness);
//! let verdict = orchestrator.run(&target, "linux", BackendOptions::default()).unwrap();
//! std::process::exit(verdict.exit_code() as i32);
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod finalize;
pub mod interrupt;
pub mod orchestrator;
pub mod prefs;

// Re-export backend types
pub use backend::{
    BackendFactory, BackendKind, BackendOptions, ExecutionBackend, MockBackend, MockFactory,
    PageTimeout, ProcessBackend, ProcessFactory, RunMode, TargetIdentity, partition_options,
    select_backend,
};

// Re-export catalog types
pub use catalog::{CatalogError, ManifestCatalog, StaticCatalog, TestCatalog, TestDescriptor};

// Re-export orchestration types
pub use orchestrator::{Orchestrator, OrchestratorError, RunVerdict};

// Re-export finalization
pub use finalize::{FinalizeContext, FinalizeError, archive_result_dir};

// Re-export cancellation and preferences
pub use interrupt::InterruptToken;
pub use prefs::{PrefMap, PrefValue, parse_preferences, reconcile_site_isolation};
