//! Subprocess-based execution backend.
//!
//! Every backend family ultimately delegates measurement to an external
//! runner process: the harness families to a browsertime-style CLI, the
//! extension families to the extension runner. One test maps to one runner
//! invocation; the runner writes a per-test report under the result
//! directory which this backend reads back for the overall verdict and the
//! page-timeout list.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{info, warn};

use super::{
    BackendError, BackendFactory, BackendKind, BackendOptions, ExecutionBackend, PageTimeout,
    TargetIdentity,
};
use crate::catalog::TestDescriptor;
use crate::config;

/// Shape of the per-test report the external runner writes.
#[derive(Debug, Deserialize)]
struct TestReport {
    success: bool,
    #[serde(default)]
    page_timeouts: Vec<PageTimeout>,
}

/// Execution backend that spawns an external runner per test.
pub struct ProcessBackend {
    kind: BackendKind,
    target: TargetIdentity,
    options: BackendOptions,
    program: String,
    result_dir: PathBuf,
    page_timeouts: Vec<PageTimeout>,
}

impl ProcessBackend {
    /// Create a backend of the given kind, preparing its result directory.
    pub fn new(
        kind: BackendKind,
        target: TargetIdentity,
        options: BackendOptions,
        program: String,
        result_dir: PathBuf,
    ) -> Result<Self, BackendError> {
        fs::create_dir_all(&result_dir).map_err(|source| BackendError::ResultDir {
            dir: result_dir.clone(),
            source,
        })?;
        Ok(Self {
            kind,
            target,
            options,
            program,
            result_dir,
            page_timeouts: Vec::new(),
        })
    }

    /// Build the runner invocation for one test.
    fn command_for(&self, test: &TestDescriptor) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--binary")
            .arg(&self.target.binary)
            .arg("--test")
            .arg(&test.name)
            .arg("--output")
            .arg(self.result_dir.join(&test.name));

        if let Some(host) = &self.options.host {
            cmd.arg("--host").arg(host);
        }
        if self.options.profile {
            cmd.arg("--profile");
            if let Some(interval) = self.options.profile_interval {
                cmd.arg("--profile-interval").arg(interval.to_string());
            }
            if let Some(entries) = self.options.profile_entries {
                cmd.arg("--profile-entries").arg(entries.to_string());
            }
        }
        if let Some(symbols) = &self.options.symbols_path {
            cmd.arg("--symbols-path").arg(symbols);
        }
        if let Some(installer) = &self.options.installer_path {
            cmd.arg("--installer-path").arg(installer);
        }
        if let Some(build) = &self.options.build_path {
            cmd.arg("--build-path").arg(build);
        }
        for (flag, enabled) in [
            ("--power-test", self.options.power_test),
            ("--cpu-test", self.options.cpu_test),
            ("--memory-test", self.options.memory_test),
            ("--is-release-build", self.options.is_release_build),
            ("--no-install", self.options.no_install),
        ] {
            if enabled {
                cmd.arg(flag);
            }
        }
        if self.options.post_startup_delay > 0 {
            cmd.arg("--startup-delay")
                .arg(self.options.post_startup_delay.to_string());
        }
        if self.options.debug_mode {
            cmd.arg("--debug");
        }
        for (name, value) in &self.options.extra_prefs {
            cmd.arg("--setpref").arg(format!("{}={}", name, pref_arg(value)));
        }
        if self.options.no_conditioned_profile {
            cmd.arg("--no-conditioned-profile");
        }
        if self.kind.is_android() {
            if let Some(device) = &self.target.device_name {
                cmd.arg("--device").arg(device);
            }
            if let Some(activity) = &self.options.activity {
                cmd.arg("--activity").arg(activity);
            }
            if let Some(intent) = &self.options.intent {
                cmd.arg("--intent").arg(intent);
            }
        }
        for (key, value) in pass_through_options(self.kind, &self.options) {
            cmd.arg(format!("--{}", key.replace('_', "-"))).arg(value);
        }
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        cmd
    }

    /// Read the report the runner wrote for one test, if any.
    fn read_report(&self, test: &TestDescriptor) -> Option<TestReport> {
        let path = self.result_dir.join(&test.name).join("report.json");
        let data = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&data) {
            Ok(report) => Some(report),
            Err(err) => {
                warn!("discarding unreadable report {}: {}", path.display(), err);
                None
            }
        }
    }
}

/// Render a preference value back to its command-line spelling.
fn pref_arg(value: &crate::prefs::PrefValue) -> String {
    match value {
        crate::prefs::PrefValue::Bool(b) => b.to_string(),
        crate::prefs::PrefValue::Int(n) => n.to_string(),
        crate::prefs::PrefValue::Str(s) => s.clone(),
    }
}

/// Options forwarded verbatim to the runner invocation.
fn pass_through_options<'a>(
    kind: BackendKind,
    options: &'a BackendOptions,
) -> &'a BTreeMap<String, String> {
    if kind.is_harness() {
        &options.harness_options
    } else {
        &options.extra_options
    }
}

impl ExecutionBackend for ProcessBackend {
    fn run_tests(&mut self, tests: &[TestDescriptor], names: &[String]) -> bool {
        let mut any_results = false;

        for (test, name) in tests.iter().zip(names) {
            if self.options.interrupt.is_triggered() {
                warn!("run interrupted before test {}", name);
                return false;
            }

            info!("running test {}", name);
            let status = match self.command_for(test).status() {
                Ok(status) => status,
                Err(err) => {
                    warn!("failed to launch runner {} for {}: {}", self.program, name, err);
                    continue;
                }
            };
            if !status.success() {
                warn!("runner exited with {} for {}", status, name);
            }

            if let Some(report) = self.read_report(test) {
                if report.success {
                    any_results = true;
                }
                self.page_timeouts.extend(report.page_timeouts);
            }
        }

        any_results
    }

    fn page_timeouts(&self) -> &[PageTimeout] {
        &self.page_timeouts
    }

    fn result_dir(&self) -> &Path {
        &self.result_dir
    }
}

/// Factory wiring each backend family to its external runner command.
#[derive(Debug)]
pub struct ProcessFactory {
    harness_command: String,
    webext_command: String,
    result_base: PathBuf,
}

impl ProcessFactory {
    /// Create a factory from the global configuration.
    pub fn from_config() -> Self {
        let config = config::get();
        Self {
            harness_command: config.runners.harness_command.clone(),
            webext_command: config.runners.webext_command.clone(),
            result_base: PathBuf::from(&config.result_dir),
        }
    }

    /// Create a factory with explicit commands and result base directory.
    pub fn new(
        harness_command: impl Into<String>,
        webext_command: impl Into<String>,
        result_base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            harness_command: harness_command.into(),
            webext_command: webext_command.into(),
            result_base: result_base.into(),
        }
    }

    /// Result directory for a fresh run for the given target.
    fn result_dir_for(&self, target: &TargetIdentity) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        self.result_base.join(format!("{}_{}", target.app, stamp))
    }
}

impl BackendFactory for ProcessFactory {
    fn create(
        &self,
        kind: BackendKind,
        target: &TargetIdentity,
        options: BackendOptions,
    ) -> Result<Box<dyn ExecutionBackend>, BackendError> {
        if !options.no_install && !target.binary.exists() {
            return Err(BackendError::BinaryNotFound(target.binary.clone()));
        }
        let program = if kind.is_harness() {
            self.harness_command.clone()
        } else {
            self.webext_command.clone()
        };
        let backend = ProcessBackend::new(
            kind,
            target.clone(),
            options,
            program,
            self.result_dir_for(target),
        )?;
        Ok(Box::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RunMode;
    use pretty_assertions::assert_eq;

    fn target() -> TargetIdentity {
        TargetIdentity::new("firefox", "/opt/firefox/firefox", RunMode::Harness)
    }

    fn backend_with(options: BackendOptions, kind: BackendKind) -> ProcessBackend {
        let dir = tempfile::tempdir().expect("tempdir");
        ProcessBackend::new(
            kind,
            target().with_device("pixel6"),
            options,
            "true".to_string(),
            dir.keep(),
        )
        .expect("backend")
    }

    #[test]
    fn test_interrupted_run_reports_no_results() {
        let options = BackendOptions::default();
        options.interrupt.trigger();
        let mut backend = backend_with(options, BackendKind::HarnessDesktop);

        let tests = vec![TestDescriptor::named("tp6-amazon")];
        let names = vec!["tp6-amazon".to_string()];
        assert!(!backend.run_tests(&tests, &names));
        assert!(backend.page_timeouts().is_empty());
    }

    #[test]
    fn test_missing_report_means_no_results() {
        // The `true` binary exits cleanly but writes no report.
        let mut backend = backend_with(BackendOptions::default(), BackendKind::HarnessDesktop);
        let tests = vec![TestDescriptor::named("tp6-amazon")];
        let names = vec!["tp6-amazon".to_string()];
        assert!(!backend.run_tests(&tests, &names));
    }

    #[test]
    fn test_reports_are_read_back() {
        let mut backend = backend_with(BackendOptions::default(), BackendKind::HarnessDesktop);
        let report_dir = backend.result_dir().join("tp6-amazon");
        fs::create_dir_all(&report_dir).unwrap();
        fs::write(
            report_dir.join("report.json"),
            r#"{"success": true,
                "page_timeouts": [{"test_name": "tp6-amazon",
                                   "url": "https://amazon.example/",
                                   "pending_metrics": 2}]}"#,
        )
        .unwrap();

        let tests = vec![TestDescriptor::named("tp6-amazon")];
        let names = vec!["tp6-amazon".to_string()];
        assert!(backend.run_tests(&tests, &names));
        assert_eq!(backend.page_timeouts().len(), 1);
        assert_eq!(backend.page_timeouts()[0].pending_metrics, Some(2));
    }

    #[test]
    fn test_prefs_and_toggles_reach_the_runner_command() {
        let mut options = BackendOptions::default();
        options.power_test = true;
        options.extra_prefs.insert(
            "isolation.autostart".to_string(),
            crate::prefs::PrefValue::Bool(true),
        );
        let backend = backend_with(options, BackendKind::HarnessDesktop);
        let cmd = backend.command_for(&TestDescriptor::named("tp6-amazon"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert!(args.contains(&"--power-test".to_string()));
        assert!(args.contains(&"isolation.autostart=true".to_string()));
    }

    #[test]
    fn test_android_args_only_for_android_kinds() {
        let mut options = BackendOptions::default();
        options.activity = Some("org.example.BrowserActivity".to_string());
        let backend = backend_with(options, BackendKind::HarnessAndroid);
        let cmd = backend.command_for(&TestDescriptor::named("speed-bench"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert!(args.contains(&"--device".to_string()));
        assert!(args.contains(&"--activity".to_string()));
    }
}
