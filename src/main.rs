use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use perfrunner::backend::{BackendOptions, ProcessFactory, RunMode, TargetIdentity};
use perfrunner::catalog::ManifestCatalog;
use perfrunner::interrupt::InterruptToken;
use perfrunner::orchestrator::{Orchestrator, RunVerdict};
use perfrunner::prefs::{parse_preferences, reconcile_site_isolation};
use perfrunner::config;

/// perfrunner - Browser performance-test run orchestration
#[derive(Parser, Debug)]
#[command(
    name = "perfrunner",
    about = "Run browser performance tests and grade the outcome",
    after_help = "ENVIRONMENT VARIABLES:\n\
        PERFRUNNER_MANIFEST                Path to the test manifest\n\
        PERFRUNNER_RESULT_DIR              Base directory for result output\n\
        PERFRUNNER_HARNESS_CMD             External harness runner command\n\
        PERFRUNNER_WEBEXT_CMD              External extension runner command\n\
        PERFRUNNER_PROFILE_VIEWER          Profile viewer command\n\
        PERFRUNNER_DISABLE_PROFILE_LAUNCH  Set to 1 to skip the viewer launch"
)]
struct Args {
    /// Application under test (e.g. firefox, chromium, or a mobile target)
    #[arg(short, long)]
    app: String,

    /// Path to the application binary
    #[arg(short, long)]
    binary: PathBuf,

    /// Run only this named test instead of every applicable one
    #[arg(short, long)]
    test: Option<String>,

    /// Path to the test manifest
    #[arg(long, env = "PERFRUNNER_MANIFEST", default_value = config::DEFAULT_MANIFEST)]
    manifest: PathBuf,

    /// Drive the run with the alternate external harness instead of the
    /// extension-based one
    #[arg(long)]
    harness: bool,

    /// Interactive/local developer run (skips CI result packaging)
    #[arg(long)]
    run_local: bool,

    /// Skip (re)installing the application on the device
    #[arg(long)]
    no_install: bool,

    /// Path to an installer to use instead of the binary in place
    #[arg(long)]
    installer_path: Option<PathBuf>,

    /// Path to the build object directory
    #[arg(long)]
    build_path: Option<PathBuf>,

    /// Capture profiler data during the run
    #[arg(long)]
    profile: bool,

    /// Profiler sampling interval in milliseconds
    #[arg(long)]
    profile_interval: Option<u64>,

    /// Profiler circular buffer size in entries
    #[arg(long)]
    profile_entries: Option<u64>,

    /// Path to breakpad symbols for stack fixing
    #[arg(long)]
    symbols_path: Option<PathBuf>,

    /// Hostname or address the test environment binds to
    #[arg(long)]
    host: Option<String>,

    /// Measure power usage during the run
    #[arg(long)]
    power_test: bool,

    /// Measure CPU usage during the run
    #[arg(long)]
    cpu_test: bool,

    /// Measure memory usage during the run
    #[arg(long)]
    memory_test: bool,

    /// The binary under test is a release build
    #[arg(long)]
    is_release_build: bool,

    /// Developer debug mode: verbose logging, relaxed timeouts
    #[arg(long)]
    debug_mode: bool,

    /// Delay after application startup before testing begins (ms)
    #[arg(long, default_value = "30000")]
    post_startup_delay: u64,

    /// Device name, for mobile targets
    #[arg(long)]
    device_name: Option<String>,

    /// Android activity to launch
    #[arg(long)]
    activity: Option<String>,

    /// Android intent to launch the activity with
    #[arg(long)]
    intent: Option<String>,

    /// Profile preference, as KEY=VALUE (repeatable)
    #[arg(long = "setpref", value_name = "KEY=VALUE")]
    extra_prefs: Vec<String>,

    /// Enable site isolation (forces the controlled preferences on)
    #[arg(long)]
    enable_site_isolation: bool,

    /// Run against a plain profile instead of a conditioned one
    #[arg(long)]
    no_conditioned_profile: bool,

    /// Raw run option, as KEY=VALUE (repeatable); keys prefixed with
    /// "harness_" are routed to the harness backend
    #[arg(long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug_mode);

    match run(args) {
        Ok(verdict) => ExitCode::from(verdict.exit_code()),
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug_mode: bool) {
    let level = if debug_mode {
        "perfrunner=debug"
    } else {
        "perfrunner=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn run(args: Args) -> anyhow::Result<RunVerdict> {
    info!("perfrunner-start");
    if args.debug_mode {
        info!("debug-mode enabled");
    }
    debug!("received command line arguments: {:?}", args);

    let mut extra_prefs =
        parse_preferences(&args.extra_prefs).context("invalid --setpref argument")?;
    let site_isolation =
        reconcile_site_isolation(&mut extra_prefs, args.enable_site_isolation);
    if site_isolation && !args.enable_site_isolation {
        info!("site isolation enabled via preferences");
    }

    let run_mode = if args.harness {
        RunMode::Harness
    } else {
        RunMode::Extension
    };
    let mut target = TargetIdentity::new(&args.app, &args.binary, run_mode);
    if let Some(device) = &args.device_name {
        target = target.with_device(device);
    }

    let catalog = ManifestCatalog::load(&args.manifest)
        .with_context(|| format!("cannot load manifest {}", args.manifest.display()))?
        .with_filter(args.test.clone());

    let mut extra_options = BTreeMap::new();
    for entry in &args.options {
        let (key, value) = entry
            .split_once('=')
            .with_context(|| format!("--option '{}' is not of the form KEY=VALUE", entry))?;
        extra_options.insert(key.to_string(), value.to_string());
    }

    let options = BackendOptions {
        run_local: args.run_local,
        no_install: args.no_install,
        installer_path: args.installer_path,
        build_path: args.build_path,
        profile: args.profile,
        profile_interval: args.profile_interval,
        profile_entries: args.profile_entries,
        symbols_path: args.symbols_path,
        host: args.host,
        power_test: args.power_test,
        cpu_test: args.cpu_test,
        memory_test: args.memory_test,
        is_release_build: args.is_release_build,
        debug_mode: args.debug_mode,
        post_startup_delay: args.post_startup_delay,
        activity: args.activity,
        intent: args.intent,
        interrupt: InterruptToken::new(),
        extra_prefs,
        no_conditioned_profile: args.no_conditioned_profile,
        extra_options,
        harness_options: BTreeMap::new(),
    };

    let factory = ProcessFactory::from_config();
    let orchestrator = Orchestrator::new(&catalog, &factory);
    let verdict = orchestrator.run(&target, config::host_platform(), options)?;
    Ok(verdict)
}
