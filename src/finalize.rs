//! Post-run artifact finalization.
//!
//! Two independent steps, both gated on run mode and environment:
//! - CI harness runs package the result directory into a single archive.
//!   The archive is fully written before the uncompressed directory is
//!   removed; a packaging failure propagates, since losing the archive
//!   loses the run's results.
//! - Local profiling runs hand the most recent capture to an external
//!   viewer. That launch is a convenience: any failure is logged and
//!   swallowed, and it never changes the run's exit status.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use tracing::{info, warn};
use zip::write::FileOptions;

use crate::config;

/// Inputs the finalizer needs from the completed run.
#[derive(Debug)]
pub struct FinalizeContext<'a> {
    /// The run used the external-harness backend family
    pub harness_mode: bool,
    /// Interactive/local developer run
    pub run_local: bool,
    /// Profiler data was captured during the run
    pub profiling: bool,
    /// Result directory owned by the backend until now
    pub result_dir: &'a Path,
    /// Binary under test, used to locate its profile captures
    pub binary: &'a Path,
}

/// Errors raised while packaging the result directory.
#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    /// Filesystem failure while reading or removing results.
    #[error("result packaging I/O failure: {0}")]
    Io(#[from] io::Error),

    /// The archive itself could not be written.
    #[error("failed to write result archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The result tree could not be walked.
    #[error("failed to walk result directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Finalize artifacts for a completed run.
pub fn finalize(ctx: &FinalizeContext<'_>) -> Result<(), FinalizeError> {
    if ctx.harness_mode && !ctx.run_local {
        archive_result_dir(ctx.result_dir)?;
    }

    if ctx.profiling && ctx.run_local {
        if config::profile_launch_disabled() {
            info!(
                "not launching the profile viewer because {}=1",
                config::ENV_DISABLE_PROFILE_LAUNCH
            );
        } else if let Err(err) = launch_profile_viewer(ctx.binary) {
            warn!("profile viewer launch failed: {}", err);
        }
    }

    Ok(())
}

/// Compress the result directory into `<dir>.zip` and remove the original.
///
/// Entries inside the archive are rooted at the directory's base name. A
/// missing directory is a no-op. The original is only deleted after the
/// archive has been completely written and closed.
pub fn archive_result_dir(dir: &Path) -> Result<Option<PathBuf>, FinalizeError> {
    if !dir.exists() {
        return Ok(None);
    }

    let archive_path = PathBuf::from(format!("{}.zip", dir.display()));
    let root: PathBuf = match dir.file_name() {
        Some(name) => PathBuf::from(name),
        None => PathBuf::from("results"),
    };

    info!("creating result archive at {}", archive_path.display());
    let file = fs::File::create(&archive_path)?;
    let mut archive = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(dir)
            .expect("walked entries live under the walked root");
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = root.join(relative).to_string_lossy().replace('\\', "/");
        if entry.file_type().is_dir() {
            archive.add_directory(name, options)?;
        } else {
            archive.start_file(name, options)?;
            let mut source = fs::File::open(entry.path())?;
            io::copy(&mut source, &mut archive)?;
        }
    }
    archive.finish()?;

    info!("removing {}", dir.display());
    fs::remove_dir_all(dir)?;
    Ok(Some(archive_path))
}

/// Launch the configured viewer on the most recent profile capture.
fn launch_profile_viewer(binary: &Path) -> io::Result<()> {
    let settings = &config::get().viewer;
    let capture = latest_profile_capture(Path::new(&settings.capture_dir)).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no profile capture found under {}", settings.capture_dir),
        )
    })?;

    info!("launching {} on {}", settings.command, capture.display());
    Command::new(&settings.command)
        .arg("--binary")
        .arg(binary)
        .arg(&capture)
        .spawn()?;
    Ok(())
}

/// Most recently modified `*.profile.json` file under `dir`, recursively.
fn latest_profile_capture(dir: &Path) -> Option<PathBuf> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in walkdir::WalkDir::new(dir).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(".profile.json") {
            continue;
        }
        let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
            Some(time) => time,
            None => continue,
        };
        match &latest {
            Some((best, _)) if *best >= modified => {}
            _ => latest = Some((modified, entry.path().to_path_buf())),
        }
    }
    latest.map(|(_, path)| path)
}
