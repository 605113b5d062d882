//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`KeelSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::KeelSettings;

/// Resolve the Keel home directory (`$KEEL_HOME`, else `~/.keel`).
pub fn keel_home() -> PathBuf {
    if let Some(home) = read_env_string("KEEL_HOME") {
        return PathBuf::from(home);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".keel")
}

/// Resolve the path to the settings file.
pub fn settings_path() -> PathBuf {
    keel_home().join("settings.json")
}

/// Resolve a settings `data_dir` against the Keel home directory.
pub fn resolve_data_dir(settings: &KeelSettings) -> PathBuf {
    let dir = PathBuf::from(&settings.data_dir);
    if dir.is_absolute() { dir } else { keel_home().join(dir) }
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<KeelSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON or invalid values, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<KeelSettings> {
    let defaults = serde_json::to_value(KeelSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: KeelSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Reject settings no component can run with.
fn validate(settings: &KeelSettings) -> Result<()> {
    let session = &settings.session;
    if session.warning_minutes >= session.timeout_minutes {
        return Err(SettingsError::WarningLead {
            warning_minutes: session.warning_minutes,
            timeout_minutes: session.timeout_minutes,
        });
    }
    if settings.relay.discovery_backoff_ms.is_empty() {
        return Err(SettingsError::EmptyList {
            field: "relay.discoveryBackoffMs",
        });
    }
    if settings.rpc.vendor_order.is_empty() {
        return Err(SettingsError::EmptyList {
            field: "rpc.vendorOrder",
        });
    }
    if settings.rpc.max_attempts == 0 {
        return Err(SettingsError::TooSmall {
            field: "rpc.maxAttempts",
            min: 1,
            value: 0,
        });
    }
    Ok(())
}

/// Apply environment variable overrides to loaded settings.
///
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are ignored with a warning (fall back to file/default)
pub fn apply_env_overrides(settings: &mut KeelSettings) {
    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("KEEL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("KEEL_LOG_JSON") {
        settings.logging.json = v;
    }
    if let Some(v) = read_env_string("KEEL_DATA_DIR") {
        settings.data_dir = v;
    }

    // ── Provider / session ──────────────────────────────────────────
    if let Some(v) = read_env_u64("KEEL_REQUEST_TIMEOUT_MS", 1000, 600_000) {
        settings.provider.request_timeout_ms = v;
    }
    if let Some(v) = read_env_string("KEEL_SESSION_SECRET") {
        settings.session.signing_secret = Some(v);
    }

    // ── RPC ─────────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("KEEL_RPC_TIMEOUT_MS", 100, 120_000) {
        settings.rpc.timeout_ms = v;
    }
    for (var, vendor) in [
        ("ALCHEMY_API_KEY", "alchemy"),
        ("INFURA_API_KEY", "infura"),
        ("QUICKNODE_API_KEY", "quicknode"),
    ] {
        if let Some(key) = read_env_string(var) {
            let _ = settings.rpc.api_keys.insert(vendor.to_string(), key);
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_objects_recursively() {
        let target = json!({"rpc": {"timeoutMs": 10000, "maxAttempts": 3}});
        let source = json!({"rpc": {"timeoutMs": 8000}});
        let merged = deep_merge(target, source);
        assert_eq!(merged, json!({"rpc": {"timeoutMs": 8000, "maxAttempts": 3}}));
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let target = json!({"vendorOrder": ["alchemy", "infura"]});
        let source = json!({"vendorOrder": ["quicknode"]});
        assert_eq!(deep_merge(target, source), json!({"vendorOrder": ["quicknode"]}));
    }

    #[test]
    fn deep_merge_skips_nulls() {
        let target = json!({"level": "info"});
        let source = json!({"level": null});
        assert_eq!(deep_merge(target, source), json!({"level": "info"}));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.rpc.timeout_ms, KeelSettings::default().rpc.timeout_ms);
        assert_eq!(settings.provider.request_timeout_ms, 30_000);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"rpc": {"apiKeys": {"infura": "abc"}, "vendorOrder": ["infura"]}}"#,
        )
        .unwrap();
        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.rpc.api_keys.get("infura").map(String::as_str), Some("abc"));
        assert_eq!(settings.rpc.vendor_order, vec!["infura".to_string()]);
        assert_eq!(settings.rpc.balance_spacing_ms, 100);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::Parse { path: p, .. }) if p == path
        ));
    }

    #[test]
    fn warning_lead_must_be_below_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"session": {"timeoutMinutes": 2, "warningMinutes": 2}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::WarningLead {
                warning_minutes: 2,
                timeout_minutes: 2
            })
        ));
    }

    #[test]
    fn empty_backoff_schedule_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"relay": {"discoveryBackoffMs": []}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::EmptyList {
                field: "relay.discoveryBackoffMs"
            })
        ));
    }

    #[test]
    fn empty_vendor_order_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"rpc": {"vendorOrder": []}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::EmptyList { field: "rpc.vendorOrder" })
        ));
    }

    #[test]
    fn zero_attempts_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"rpc": {"maxAttempts": 0}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::TooSmall {
                field: "rpc.maxAttempts",
                min: 1,
                value: 0
            })
        ));
    }

    #[test]
    fn wrongly_typed_value_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"rpc": {"maxAttempts": "three"}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::Schema(_))
        ));
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("8000", 100, 120_000), Some(8000));
        assert_eq!(parse_u64_range("50", 100, 120_000), None);
        assert_eq!(parse_u64_range("-1", 0, 10), None);
    }

    #[test]
    fn absolute_data_dir_is_kept() {
        let settings = KeelSettings {
            data_dir: "/var/lib/keel".to_string(),
            ..KeelSettings::default()
        };
        assert_eq!(resolve_data_dir(&settings), PathBuf::from("/var/lib/keel"));
    }
}
