//! Execution backend abstraction for performance-test runs.
//!
//! This module provides a unified interface over the run strategies:
//! - External harness runner (browsertime-style, desktop and android)
//! - Extension-based runner (primary browser, desktop Chromium, android)
//! - `MockBackend` for testing

pub mod mock;
pub mod process;
pub mod select;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interrupt::InterruptToken;
use crate::prefs::PrefMap;

pub use mock::{MockBackend, MockFactory};
pub use process::{ProcessBackend, ProcessFactory};
pub use select::{
    BackendKind, CHROMIUM_DISTROS, HARNESS_OPTION_PREFIX, PRIMARY_APP, partition_options,
    select_backend,
};

/// Which harness family drives the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// Legacy extension-based harness.
    Extension,
    /// Alternate external-harness run (browsertime-style).
    Harness,
}

/// Identity of the application under test, fixed for the duration of a run.
#[derive(Debug, Clone)]
pub struct TargetIdentity {
    /// Application name (e.g. "firefox", "chromium", or a mobile target)
    pub app: String,
    /// Path to the application binary
    pub binary: PathBuf,
    /// Which harness family drives the run
    pub run_mode: RunMode,
    /// Device name, for mobile targets
    pub device_name: Option<String>,
}

impl TargetIdentity {
    /// Create an identity for a desktop run with the given mode.
    pub fn new(app: impl Into<String>, binary: impl Into<PathBuf>, run_mode: RunMode) -> Self {
        Self {
            app: app.into(),
            binary: binary.into(),
            run_mode,
            device_name: None,
        }
    }

    /// Set the device name for a mobile target.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device_name = Some(device.into());
        self
    }
}

/// A single test page that did not finish within its allotted time.
///
/// Presence of these records does not make the backend report overall
/// failure; the orchestrator grades the run instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTimeout {
    /// Name of the test the page belongs to
    pub test_name: String,
    /// URL of the page that timed out
    pub url: String,
    /// Number of metrics still pending when the page was abandoned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_metrics: Option<u64>,
}

/// Named run options passed through to backend construction.
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// Interactive/local developer run (not CI)
    pub run_local: bool,
    /// Skip (re)installing the application on the device
    pub no_install: bool,
    /// Path to an installer to use instead of the binary in place
    pub installer_path: Option<PathBuf>,
    /// Path to the build object directory, when running from a build tree
    pub build_path: Option<PathBuf>,
    /// Capture profiler data during the run
    pub profile: bool,
    /// Profiler sampling interval in milliseconds
    pub profile_interval: Option<u64>,
    /// Profiler circular buffer size in entries
    pub profile_entries: Option<u64>,
    /// Path to breakpad symbols for stack fixing
    pub symbols_path: Option<PathBuf>,
    /// Hostname or address the test environment binds to
    pub host: Option<String>,
    /// Measure power usage during the run
    pub power_test: bool,
    /// Measure CPU usage during the run
    pub cpu_test: bool,
    /// Measure memory usage during the run
    pub memory_test: bool,
    /// The binary under test is a release build
    pub is_release_build: bool,
    /// Developer debug mode: verbose output, relaxed timeouts
    pub debug_mode: bool,
    /// Delay after application startup before testing begins, in milliseconds
    pub post_startup_delay: u64,
    /// Android activity to launch
    pub activity: Option<String>,
    /// Android intent to launch the activity with
    pub intent: Option<String>,
    /// Cancellation token threaded through to the blocking run call
    pub interrupt: InterruptToken,
    /// Preferences applied to the application profile
    pub extra_prefs: PrefMap,
    /// Run against a plain profile instead of a conditioned one
    pub no_conditioned_profile: bool,
    /// Raw `KEY=VALUE` options; harness-prefixed keys are moved to
    /// `harness_options` before construction in harness mode
    pub extra_options: BTreeMap<String, String>,
    /// Options reserved for the harness backend
    pub harness_options: BTreeMap<String, String>,
}

/// Errors raised while constructing an execution backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The application binary does not exist or is not a file.
    #[error("application binary not found: {}", .0.display())]
    BinaryNotFound(PathBuf),

    /// The result directory could not be prepared.
    #[error("failed to prepare result directory {}: {source}", dir.display())]
    ResultDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A concrete test-execution strategy.
///
/// Failures inside `run_tests` are reported through its return value, never
/// by panicking or by an error escaping the call: `false` means the run
/// produced no results at all (timeout, crash, or cancellation before any
/// page reported data).
pub trait ExecutionBackend {
    /// Run every given test. Blocks for the full duration of automation.
    fn run_tests(&mut self, tests: &[crate::catalog::TestDescriptor], names: &[String]) -> bool;

    /// Pages that individually timed out during the last run.
    fn page_timeouts(&self) -> &[PageTimeout];

    /// Directory where this run's raw artifacts accumulate.
    fn result_dir(&self) -> &Path;
}

/// Constructs execution backends for a selected family.
pub trait BackendFactory {
    /// Build a backend of the given kind for the target.
    fn create(
        &self,
        kind: BackendKind,
        target: &TargetIdentity,
        options: BackendOptions,
    ) -> Result<Box<dyn ExecutionBackend>, BackendError>;
}
