//! Browser preference parsing and site-isolation reconciliation.
//!
//! Command-line preferences arrive as `KEY=VALUE` strings and are parsed into
//! a typed map. The site-isolation toggle and the three preferences it
//! controls are kept consistent in both directions:
//! - toggle enabled: all three preferences are forced to `true`
//! - any of the three preferences already `true`: the toggle is forced on

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Preferences that the site-isolation toggle controls.
pub const SITE_ISOLATION_PREFS: [&str; 3] = [
    "isolation.autostart",
    "workers.parent_intercept",
    "tabs.document_channel",
];

/// A typed preference value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl PrefValue {
    /// Parse a raw value string, preferring bool, then integer, then string.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "true" => PrefValue::Bool(true),
            "false" => PrefValue::Bool(false),
            other => match other.parse::<i64>() {
                Ok(n) => PrefValue::Int(n),
                Err(_) => PrefValue::Str(other.to_string()),
            },
        }
    }

    /// Whether this value is the boolean `true`.
    pub fn is_enabled(&self) -> bool {
        matches!(self, PrefValue::Bool(true))
    }
}

/// Ordered preference mapping, keyed by preference name.
pub type PrefMap = BTreeMap<String, PrefValue>;

/// Errors raised while parsing preference strings.
#[derive(Debug, Error)]
pub enum PrefError {
    /// The argument did not contain a `=` separator.
    #[error("preference '{0}' is not of the form KEY=VALUE")]
    MissingSeparator(String),

    /// The key side of the argument was empty.
    #[error("preference '{0}' has an empty key")]
    EmptyKey(String),
}

/// Parse `KEY=VALUE` preference strings into a typed map.
///
/// Later occurrences of a key override earlier ones.
pub fn parse_preferences(raw: &[String]) -> Result<PrefMap, PrefError> {
    let mut prefs = PrefMap::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| PrefError::MissingSeparator(entry.clone()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(PrefError::EmptyKey(entry.clone()));
        }
        prefs.insert(key.to_string(), PrefValue::parse(value.trim()));
    }
    Ok(prefs)
}

/// Reconcile the site-isolation toggle with its three controlled preferences.
///
/// Returns the settled toggle state. The toggle-to-prefs direction is applied
/// first, so a toggle that starts enabled populates all three preferences;
/// a preference that starts enabled only flips the toggle.
pub fn reconcile_site_isolation(prefs: &mut PrefMap, enabled: bool) -> bool {
    if enabled {
        for key in SITE_ISOLATION_PREFS {
            prefs.insert(key.to_string(), PrefValue::Bool(true));
        }
    }

    let any_pref_enabled = SITE_ISOLATION_PREFS
        .iter()
        .any(|key| prefs.get(*key).map(PrefValue::is_enabled).unwrap_or(false));

    enabled || any_pref_enabled
}
