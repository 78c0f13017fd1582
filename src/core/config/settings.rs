// ─── Settings Table ───
// Editing of global settings by key. Each key maps to a typed setter;
// unknown keys and unparsable values are rejected.

use super::global::GlobalConfig;
use crate::core::error::{LauncherError, LauncherResult};

type Setter = fn(&mut GlobalConfig, &str) -> Result<(), String>;

const JAVA_PATH_PREFIX: &str = "java_paths.";

const SETTINGS: &[(&str, Setter)] = &[
    ("instances_folder", |c, v| set_string(&mut c.instances_folder, v)),
    ("api", |c, v| set_string(&mut c.api, v)),
    ("api_login", |c, v| set_string(&mut c.api_login, v)),
    ("api_password", |c, v| set_string(&mut c.api_password, v)),
    ("backup_on_rollback", |c, v| {
        c.backup_on_rollback = parse_bool(v)?;
        Ok(())
    }),
    ("default_editor", |c, v| set_string(&mut c.default_editor, v)),
    ("show_full_progress", |c, v| {
        c.show_full_progress = parse_bool(v)?;
        Ok(())
    }),
    ("lang", |c, v| set_string(&mut c.lang, v)),
    ("checkUpdateInterval", |c, v| {
        c.check_update_interval = v.trim().parse::<u64>().map_err(|e| format!("{e}"))?;
        Ok(())
    }),
    ("logMaxLines", |c, v| {
        c.log_max_lines = v.trim().parse::<u32>().map_err(|e| format!("{e}"))?;
        Ok(())
    }),
    ("exec", |c, v| set_string(&mut c.exec, v)),
];

/// Names accepted by [`apply_setting`], in display order.
pub fn setting_keys() -> impl Iterator<Item = &'static str> {
    SETTINGS.iter().map(|(key, _)| *key)
}

/// Apply `key = value` to `cfg`. The caller persists the result.
///
/// `java_paths.<major>` sets the runtime for a Java major version; an empty
/// value removes the entry.
pub fn apply_setting(cfg: &mut GlobalConfig, key: &str, value: &str) -> LauncherResult<()> {
    let invalid = |reason: String| LauncherError::InvalidSetting {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    };

    if let Some(major) = key.strip_prefix(JAVA_PATH_PREFIX) {
        let major: u32 = major
            .parse()
            .map_err(|_| invalid(format!("'{major}' is not a Java major version")))?;
        if value.trim().is_empty() {
            cfg.java_paths.remove(&major);
        } else {
            cfg.java_paths.insert(major, value.trim().to_string());
        }
        return Ok(());
    }

    let (_, setter) = SETTINGS
        .iter()
        .find(|(name, _)| *name == key)
        .ok_or_else(|| LauncherError::UnknownSetting(key.to_string()))?;

    setter(cfg, value).map_err(invalid)
}

fn set_string(field: &mut String, value: &str) -> Result<(), String> {
    *field = value.to_string();
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Ok(true),
        "false" | "no" | "n" | "0" | "off" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}
