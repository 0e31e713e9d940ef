//! Scriptable mock backend for testing the orchestration path.
//!
//! `MockBackend` plays back a configured outcome instead of driving a
//! browser; `MockFactory` records every construction so tests can assert
//! when selection happened and which family was chosen.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{
    BackendError, BackendFactory, BackendKind, BackendOptions, ExecutionBackend, PageTimeout,
    TargetIdentity,
};
use crate::catalog::TestDescriptor;

/// An execution backend with a scripted outcome.
#[derive(Debug, Clone)]
pub struct MockBackend {
    /// Value `run_tests` returns
    pub outcome: bool,
    /// Page timeouts reported after the run
    pub timeouts: Vec<PageTimeout>,
    /// Result directory handed to the finalizer
    pub result_dir: PathBuf,
    /// Test names received by `run_tests`, for assertions
    pub ran: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// A backend that succeeds with no timeouts.
    pub fn succeeding(result_dir: impl Into<PathBuf>) -> Self {
        Self {
            outcome: true,
            timeouts: Vec::new(),
            result_dir: result_dir.into(),
            ran: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A backend that produces no results at all.
    pub fn failing(result_dir: impl Into<PathBuf>) -> Self {
        Self {
            outcome: false,
            ..Self::succeeding(result_dir)
        }
    }

    /// Add a page timeout to the scripted outcome.
    pub fn with_timeout(mut self, timeout: PageTimeout) -> Self {
        self.timeouts.push(timeout);
        self
    }
}

impl ExecutionBackend for MockBackend {
    fn run_tests(&mut self, _tests: &[TestDescriptor], names: &[String]) -> bool {
        self.ran.lock().expect("mock run list").extend(names.iter().cloned());
        self.outcome
    }

    fn page_timeouts(&self) -> &[PageTimeout] {
        &self.timeouts
    }

    fn result_dir(&self) -> &Path {
        &self.result_dir
    }
}

/// A record of one factory invocation.
#[derive(Debug, Clone)]
pub struct Creation {
    /// Backend family that was selected
    pub kind: BackendKind,
    /// Application the backend was built for
    pub app: String,
    /// General option set at construction time
    pub extra_options: Vec<String>,
    /// Harness option set at construction time
    pub harness_options: Vec<String>,
}

/// Factory returning clones of a template backend, recording every call.
#[derive(Debug, Clone)]
pub struct MockFactory {
    template: MockBackend,
    creations: Arc<Mutex<Vec<Creation>>>,
}

impl MockFactory {
    /// Create a factory that always returns clones of `template`.
    pub fn new(template: MockBackend) -> Self {
        Self {
            template,
            creations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of backends constructed so far.
    pub fn created(&self) -> usize {
        self.creations.lock().expect("mock creations").len()
    }

    /// Every recorded construction, in order.
    pub fn creations(&self) -> Vec<Creation> {
        self.creations.lock().expect("mock creations").clone()
    }
}

impl BackendFactory for MockFactory {
    fn create(
        &self,
        kind: BackendKind,
        target: &TargetIdentity,
        options: BackendOptions,
    ) -> Result<Box<dyn ExecutionBackend>, BackendError> {
        self.creations.lock().expect("mock creations").push(Creation {
            kind,
            app: target.app.clone(),
            extra_options: options.extra_options.keys().cloned().collect(),
            harness_options: options.harness_options.keys().cloned().collect(),
        });
        Ok(Box::new(self.template.clone()))
    }
}
