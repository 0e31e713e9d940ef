//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for perfrunner, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults matching what CI expects
//! - Plain constructors for programmatic configuration
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PERFRUNNER_MANIFEST` | Path to the test manifest | `./manifest.json` |
//! | `PERFRUNNER_RESULT_DIR` | Base directory for result output | `./perfrunner-results` |
//! | `PERFRUNNER_HARNESS_CMD` | External harness runner command | `browsertime` |
//! | `PERFRUNNER_WEBEXT_CMD` | External extension runner command | `webext-runner` |
//! | `PERFRUNNER_PROFILE_VIEWER` | Profile viewer command | `profile-viewer` |
//! | `PERFRUNNER_PROFILE_DIR` | Directory scanned for profile captures | `./perfrunner-results` |
//! | `PERFRUNNER_DISABLE_PROFILE_LAUNCH` | Set to `1` to skip viewer launch | unset |

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default test manifest path
pub const DEFAULT_MANIFEST: &str = "./manifest.json";

/// Default base directory for result output
pub const DEFAULT_RESULT_DIR: &str = "./perfrunner-results";

/// Default external harness runner command
pub const DEFAULT_HARNESS_COMMAND: &str = "browsertime";

/// Default external extension runner command
pub const DEFAULT_WEBEXT_COMMAND: &str = "webext-runner";

/// Default profile viewer command
pub const DEFAULT_PROFILE_VIEWER: &str = "profile-viewer";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the test manifest path
pub const ENV_MANIFEST: &str = "PERFRUNNER_MANIFEST";

/// Environment variable for the result base directory
pub const ENV_RESULT_DIR: &str = "PERFRUNNER_RESULT_DIR";

/// Environment variable for the harness runner command
pub const ENV_HARNESS_COMMAND: &str = "PERFRUNNER_HARNESS_CMD";

/// Environment variable for the extension runner command
pub const ENV_WEBEXT_COMMAND: &str = "PERFRUNNER_WEBEXT_CMD";

/// Environment variable for the profile viewer command
pub const ENV_PROFILE_VIEWER: &str = "PERFRUNNER_PROFILE_VIEWER";

/// Environment variable for the profile capture directory
pub const ENV_PROFILE_DIR: &str = "PERFRUNNER_PROFILE_DIR";

/// Environment variable that suppresses the profile viewer launch
pub const ENV_DISABLE_PROFILE_LAUNCH: &str = "PERFRUNNER_DISABLE_PROFILE_LAUNCH";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for perfrunner
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the test manifest
    pub manifest: String,
    /// Base directory for result output
    pub result_dir: String,
    /// External runner commands
    pub runners: RunnerSettings,
    /// Profile viewer settings
    pub viewer: ViewerSettings,
}

/// External runner command settings
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Harness-mode runner command
    pub harness_command: String,
    /// Extension-mode runner command
    pub webext_command: String,
}

/// Profile viewer settings
#[derive(Debug, Clone)]
pub struct ViewerSettings {
    /// Viewer command to launch
    pub command: String,
    /// Directory scanned for the most recent profile capture
    pub capture_dir: String,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            manifest: env::var(ENV_MANIFEST).unwrap_or_else(|_| DEFAULT_MANIFEST.to_string()),
            result_dir: env::var(ENV_RESULT_DIR)
                .unwrap_or_else(|_| DEFAULT_RESULT_DIR.to_string()),
            runners: RunnerSettings::from_env(),
            viewer: ViewerSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            manifest: DEFAULT_MANIFEST.to_string(),
            result_dir: DEFAULT_RESULT_DIR.to_string(),
            runners: RunnerSettings::defaults(),
            viewer: ViewerSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RunnerSettings {
    /// Create runner settings from environment variables
    pub fn from_env() -> Self {
        Self {
            harness_command: env::var(ENV_HARNESS_COMMAND)
                .unwrap_or_else(|_| DEFAULT_HARNESS_COMMAND.to_string()),
            webext_command: env::var(ENV_WEBEXT_COMMAND)
                .unwrap_or_else(|_| DEFAULT_WEBEXT_COMMAND.to_string()),
        }
    }

    /// Create runner settings with defaults
    pub fn defaults() -> Self {
        Self {
            harness_command: DEFAULT_HARNESS_COMMAND.to_string(),
            webext_command: DEFAULT_WEBEXT_COMMAND.to_string(),
        }
    }
}

impl ViewerSettings {
    /// Create viewer settings from environment variables
    pub fn from_env() -> Self {
        Self {
            command: env::var(ENV_PROFILE_VIEWER)
                .unwrap_or_else(|_| DEFAULT_PROFILE_VIEWER.to_string()),
            capture_dir: env::var(ENV_PROFILE_DIR)
                .or_else(|_| env::var(ENV_RESULT_DIR))
                .unwrap_or_else(|_| DEFAULT_RESULT_DIR.to_string()),
        }
    }

    /// Create viewer settings with defaults
    pub fn defaults() -> Self {
        Self {
            command: DEFAULT_PROFILE_VIEWER.to_string(),
            capture_dir: DEFAULT_RESULT_DIR.to_string(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Whether the profile viewer launch is suppressed via the environment
pub fn profile_launch_disabled() -> bool {
    env::var(ENV_DISABLE_PROFILE_LAUNCH).map(|v| v == "1").unwrap_or(false)
}

/// Host platform name as the test manifests spell it
pub fn host_platform() -> &'static str {
    match env::consts::OS {
        "linux" => "linux",
        "macos" => "mac",
        "windows" => "win",
        "android" => "android",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.manifest, DEFAULT_MANIFEST);
        assert_eq!(config.result_dir, DEFAULT_RESULT_DIR);
        assert_eq!(config.runners.harness_command, DEFAULT_HARNESS_COMMAND);
        assert_eq!(config.viewer.command, DEFAULT_PROFILE_VIEWER);
    }

    #[test]
    fn test_host_platform_is_known() {
        let platform = host_platform();
        assert!(!platform.is_empty());
    }
}
