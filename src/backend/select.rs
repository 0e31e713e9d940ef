//! Backend selection and option routing.
//!
//! Selection is a pure function of (application identity, run mode): the
//! variant set is closed and the same inputs always yield the same kind. An
//! identity that matches neither the primary browser nor a known Chromium
//! distribution falls through to the android variant; the calling surface
//! relies on this permissive default, so unknown identities are never
//! rejected here.

use std::collections::BTreeMap;

use super::RunMode;

/// The primary desktop browser under test.
pub const PRIMARY_APP: &str = "firefox";

/// Chromium-derived desktop distributions we know how to drive.
pub const CHROMIUM_DISTROS: &[&str] = &["chrome", "chromium", "edge", "brave"];

/// Option keys carrying this prefix are reserved for the harness backend.
pub const HARNESS_OPTION_PREFIX: &str = "harness_";

/// The closed set of execution-backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Extension harness driving the primary desktop browser
    ExtensionPrimary,
    /// Extension harness driving a desktop Chromium distribution
    ExtensionChromium,
    /// Extension harness driving a mobile/android target
    ExtensionAndroid,
    /// External harness driving a desktop browser
    HarnessDesktop,
    /// External harness driving a mobile/android target
    HarnessAndroid,
}

impl BackendKind {
    /// Whether this kind belongs to the external-harness family.
    pub fn is_harness(self) -> bool {
        matches!(self, BackendKind::HarnessDesktop | BackendKind::HarnessAndroid)
    }

    /// Whether this kind drives an android target.
    pub fn is_android(self) -> bool {
        matches!(self, BackendKind::ExtensionAndroid | BackendKind::HarnessAndroid)
    }
}

/// Whether the identity names a desktop browser we can drive directly.
fn is_desktop_app(app: &str) -> bool {
    app == PRIMARY_APP || CHROMIUM_DISTROS.contains(&app)
}

/// Map (application identity, run mode) to the backend family that runs it.
pub fn select_backend(app: &str, mode: RunMode) -> BackendKind {
    match mode {
        RunMode::Harness => {
            if is_desktop_app(app) {
                BackendKind::HarnessDesktop
            } else {
                BackendKind::HarnessAndroid
            }
        }
        RunMode::Extension => {
            if app == PRIMARY_APP {
                BackendKind::ExtensionPrimary
            } else if CHROMIUM_DISTROS.contains(&app) {
                BackendKind::ExtensionChromium
            } else {
                BackendKind::ExtensionAndroid
            }
        }
    }
}

/// Split an option set into (general, prefixed) by key prefix.
///
/// This is a partition, not a filter: a prefixed key is moved out of the
/// general set and appears in the prefixed set exactly once.
pub fn partition_options(
    options: BTreeMap<String, String>,
    prefix: &str,
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut general = BTreeMap::new();
    let mut prefixed = BTreeMap::new();
    for (key, value) in options {
        if key.starts_with(prefix) {
            prefixed.insert(key, value);
        } else {
            general.insert(key, value);
        }
    }
    (general, prefixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_selection_table() {
        let cases = [
            ("firefox", RunMode::Extension, BackendKind::ExtensionPrimary),
            ("chrome", RunMode::Extension, BackendKind::ExtensionChromium),
            ("chromium", RunMode::Extension, BackendKind::ExtensionChromium),
            ("edge", RunMode::Extension, BackendKind::ExtensionChromium),
            ("brave", RunMode::Extension, BackendKind::ExtensionChromium),
            ("fenix", RunMode::Extension, BackendKind::ExtensionAndroid),
            ("firefox", RunMode::Harness, BackendKind::HarnessDesktop),
            ("chrome", RunMode::Harness, BackendKind::HarnessDesktop),
            ("chromium", RunMode::Harness, BackendKind::HarnessDesktop),
            ("fenix", RunMode::Harness, BackendKind::HarnessAndroid),
        ];
        for (app, mode, expected) in cases {
            assert_eq!(select_backend(app, mode), expected, "app={app} mode={mode:?}");
        }
    }

    #[test]
    fn test_unknown_identity_falls_through_to_android() {
        assert_eq!(
            select_backend("some-new-browser", RunMode::Extension),
            BackendKind::ExtensionAndroid
        );
        assert_eq!(
            select_backend("some-new-browser", RunMode::Harness),
            BackendKind::HarnessAndroid
        );
    }

    #[test]
    fn test_selection_is_pure() {
        for _ in 0..3 {
            assert_eq!(
                select_backend("chrome", RunMode::Extension),
                BackendKind::ExtensionChromium
            );
        }
    }

    fn opts(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_partition_empty() {
        let (general, prefixed) = partition_options(BTreeMap::new(), HARNESS_OPTION_PREFIX);
        assert!(general.is_empty());
        assert!(prefixed.is_empty());
    }

    #[test]
    fn test_partition_single_prefixed_key() {
        let (general, prefixed) =
            partition_options(opts(&[("harness_iterations", "5")]), HARNESS_OPTION_PREFIX);
        assert!(general.is_empty());
        assert_eq!(prefixed.get("harness_iterations"), Some(&"5".to_string()));
    }

    #[test]
    fn test_partition_moves_without_loss_or_duplication() {
        let input = opts(&[
            ("harness_iterations", "5"),
            ("harness_video", "true"),
            ("page_cycles", "25"),
            ("cold_load", "false"),
        ]);
        let (general, prefixed) = partition_options(input, HARNESS_OPTION_PREFIX);

        assert_eq!(general.len(), 2);
        assert_eq!(prefixed.len(), 2);
        assert!(general.keys().all(|k| !k.starts_with(HARNESS_OPTION_PREFIX)));
        assert!(prefixed.keys().all(|k| k.starts_with(HARNESS_OPTION_PREFIX)));
        assert_eq!(general.get("page_cycles"), Some(&"25".to_string()));
        assert_eq!(prefixed.get("harness_video"), Some(&"true".to_string()));
    }
}
