//! Run orchestration: resolve tests, dispatch a backend, grade the outcome.
//!
//! The run is a straight-line state machine: RESOLVING → VALIDATING →
//! EXECUTING → FINALIZING, terminal on the first failing transition. Three
//! failure causes exist and stay distinct, because CI tooling parses the log
//! lines for each:
//! - empty resolved test list (configuration error, no backend constructed)
//! - `run_tests` returned false (no results at all)
//! - one or more pages timed out despite overall results existing
//!
//! The last one is the partial-failure rule: a run can publish valid
//! aggregate results and still be graded a failure.

use tracing::{error, info};

use crate::backend::{
    BackendFactory, BackendOptions, HARNESS_OPTION_PREFIX, TargetIdentity, partition_options,
    select_backend,
};
use crate::catalog::TestCatalog;
use crate::finalize::{self, FinalizeContext, FinalizeError};

/// Fixed prefix CI tooling greps for on fatal classifications.
const FAIL_TAG: &str = "TEST-UNEXPECTED-FAIL";

/// Graded outcome of one orchestrated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunVerdict {
    /// Results exist and every page completed
    Success,
    /// No tests are targeted for this application (nothing was executed)
    NoTestsResolved,
    /// The backend produced no results at all
    NoResults,
    /// Results exist but this many pages timed out
    IncompletePages(usize),
}

impl RunVerdict {
    /// Process exit code for this verdict: zero only on full success.
    pub fn exit_code(self) -> u8 {
        match self {
            RunVerdict::Success => 0,
            _ => 1,
        }
    }
}

/// Errors that abort orchestration outright, separate from graded failures.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Backend construction failed.
    #[error(transparent)]
    Backend(#[from] crate::backend::BackendError),

    /// Artifact packaging failed; losing the archive loses the results.
    #[error(transparent)]
    Finalize(#[from] FinalizeError),
}

/// Drives one performance-test run end to end.
pub struct Orchestrator<'a> {
    catalog: &'a dyn TestCatalog,
    factory: &'a dyn BackendFactory,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over the given catalog and backend factory.
    pub fn new(catalog: &'a dyn TestCatalog, factory: &'a dyn BackendFactory) -> Self {
        Self { catalog, factory }
    }

    /// Run every applicable test for the target and grade the outcome.
    ///
    /// Finalization runs whenever a backend executed, regardless of the
    /// grade; it never runs for an empty test list.
    pub fn run(
        &self,
        target: &TargetIdentity,
        host_platform: &str,
        mut options: BackendOptions,
    ) -> Result<RunVerdict, OrchestratorError> {
        // RESOLVING
        let tests = self.catalog.resolve(target, host_platform);

        // VALIDATING: fail fast before any backend exists.
        if tests.is_empty() {
            error!("{}: no tests are targeted for {}", FAIL_TAG, target.app);
            return Ok(RunVerdict::NoTestsResolved);
        }

        let names: Vec<String> = tests.iter().map(|t| t.name.clone()).collect();
        info!("tests scheduled to run:");
        for name in &names {
            info!("  {}", name);
        }

        // EXECUTING
        let kind = select_backend(&target.app, target.run_mode);
        if kind.is_harness() {
            let (general, reserved) =
                partition_options(std::mem::take(&mut options.extra_options), HARNESS_OPTION_PREFIX);
            options.extra_options = general;
            options.harness_options.extend(reserved);
        }
        let run_local = options.run_local;
        let profiling = options.profile;

        let mut backend = self.factory.create(kind, target, options)?;
        let success = backend.run_tests(&tests, &names);

        // Outcome classification: all three checks must pass.
        let verdict = if !success {
            // No results at all; the test job must fail.
            error!(
                "{}: no test results were found for {}",
                FAIL_TAG,
                names.join(", ")
            );
            RunVerdict::NoResults
        } else {
            let timed_out = backend.page_timeouts();
            if timed_out.is_empty() {
                RunVerdict::Success
            } else {
                // Results were published for the pages that did load, but
                // the job is still graded a failure.
                for page in timed_out {
                    let mut message = vec![
                        (FAIL_TAG, format!("test '{}'", page.test_name)),
                        ("timed out loading test page", page.url.clone()),
                    ];
                    if let Some(pending) = page.pending_metrics {
                        message.push(("pending metrics", pending.to_string()));
                    }
                    let line: Vec<String> = message
                        .iter()
                        .map(|(subject, msg)| format!("{}: {}", subject, msg))
                        .collect();
                    error!("{}", line.join(" "));
                }
                RunVerdict::IncompletePages(timed_out.len())
            }
        };

        // FINALIZING: runs for every graded outcome.
        finalize::finalize(&FinalizeContext {
            harness_mode: kind.is_harness(),
            run_local,
            profiling,
            result_dir: backend.result_dir(),
            binary: &target.binary,
        })?;

        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, MockBackend, MockFactory, PageTimeout, RunMode};
    use crate::catalog::{StaticCatalog, TestDescriptor};
    use pretty_assertions::assert_eq;

    fn target(app: &str, mode: RunMode) -> TargetIdentity {
        TargetIdentity::new(app, "/opt/browser/bin", mode)
    }

    fn catalog(names: &[&str]) -> StaticCatalog {
        StaticCatalog::new(names.iter().map(|name| TestDescriptor::named(*name)).collect())
    }

    fn local_options() -> BackendOptions {
        // run_local keeps the finalizer away from archiving in unit tests.
        BackendOptions {
            run_local: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_catalog_skips_backend_construction() {
        let catalog = catalog(&[]);
        let factory = MockFactory::new(MockBackend::succeeding("/nonexistent"));
        let orchestrator = Orchestrator::new(&catalog, &factory);

        let verdict = orchestrator
            .run(&target("firefox", RunMode::Extension), "linux", local_options())
            .unwrap();

        assert_eq!(verdict, RunVerdict::NoTestsResolved);
        assert_eq!(factory.created(), 0);
        assert_eq!(verdict.exit_code(), 1);
    }

    #[test]
    fn test_no_results_fails_regardless_of_timeout_list() {
        let catalog = catalog(&["tp6-amazon"]);
        let backend = MockBackend::failing("/nonexistent").with_timeout(PageTimeout {
            test_name: "tp6-amazon".to_string(),
            url: "https://amazon.example/".to_string(),
            pending_metrics: None,
        });
        let factory = MockFactory::new(backend);
        let orchestrator = Orchestrator::new(&catalog, &factory);

        let verdict = orchestrator
            .run(&target("firefox", RunMode::Extension), "linux", local_options())
            .unwrap();

        assert_eq!(verdict, RunVerdict::NoResults);
        assert_eq!(verdict.exit_code(), 1);
    }

    #[test]
    fn test_page_timeout_fails_a_successful_run() {
        let catalog = catalog(&["tp6-amazon"]);
        let backend = MockBackend::succeeding("/nonexistent").with_timeout(PageTimeout {
            test_name: "tp6-amazon".to_string(),
            url: "https://amazon.example/".to_string(),
            pending_metrics: Some(2),
        });
        let factory = MockFactory::new(backend);
        let orchestrator = Orchestrator::new(&catalog, &factory);

        let verdict = orchestrator
            .run(&target("firefox", RunMode::Extension), "linux", local_options())
            .unwrap();

        assert_eq!(verdict, RunVerdict::IncompletePages(1));
        assert_eq!(verdict.exit_code(), 1);
    }

    #[test]
    fn test_clean_run_succeeds() {
        let catalog = catalog(&["tp6-amazon", "tp6-wiki"]);
        let backend = MockBackend::succeeding("/nonexistent");
        let ran = backend.ran.clone();
        let factory = MockFactory::new(backend);
        let orchestrator = Orchestrator::new(&catalog, &factory);

        let verdict = orchestrator
            .run(&target("firefox", RunMode::Extension), "linux", local_options())
            .unwrap();

        assert_eq!(verdict, RunVerdict::Success);
        assert_eq!(verdict.exit_code(), 0);
        assert_eq!(
            ran.lock().unwrap().clone(),
            vec!["tp6-amazon".to_string(), "tp6-wiki".to_string()]
        );
    }

    #[test]
    fn test_harness_mode_partitions_reserved_options() {
        let catalog = catalog(&["tp6-amazon"]);
        let factory = MockFactory::new(MockBackend::succeeding("/nonexistent"));
        let orchestrator = Orchestrator::new(&catalog, &factory);

        let mut options = local_options();
        options.extra_options.insert("harness_video".to_string(), "true".to_string());
        options.extra_options.insert("page_cycles".to_string(), "25".to_string());

        orchestrator
            .run(&target("firefox", RunMode::Harness), "linux", options)
            .unwrap();

        let creation = &factory.creations()[0];
        assert_eq!(creation.kind, BackendKind::HarnessDesktop);
        assert_eq!(creation.extra_options, vec!["page_cycles".to_string()]);
        assert_eq!(creation.harness_options, vec!["harness_video".to_string()]);
    }

    #[test]
    fn test_extension_mode_leaves_options_alone() {
        let catalog = catalog(&["tp6-amazon"]);
        let factory = MockFactory::new(MockBackend::succeeding("/nonexistent"));
        let orchestrator = Orchestrator::new(&catalog, &factory);

        let mut options = local_options();
        options.extra_options.insert("harness_video".to_string(), "true".to_string());

        orchestrator
            .run(&target("firefox", RunMode::Extension), "linux", options)
            .unwrap();

        let creation = &factory.creations()[0];
        assert_eq!(creation.kind, BackendKind::ExtensionPrimary);
        assert_eq!(creation.extra_options, vec!["harness_video".to_string()]);
        assert!(creation.harness_options.is_empty());
    }
}
