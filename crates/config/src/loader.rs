use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::IndusConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["indus.toml", "indus.yaml", "indus.yml", "indus.json"];

static CONFIG_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Override the user-global config directory (e.g. from `--config-dir`).
pub fn set_config_dir(dir: PathBuf) {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.write() {
        *guard = Some(dir);
    }
}

/// Drop a previous [`set_config_dir`] override.
pub fn clear_config_dir() {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.write() {
        *guard = None;
    }
}

/// Returns the user-global config directory (`~/.config/indus/` unless overridden).
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(guard) = CONFIG_DIR_OVERRIDE.read()
        && let Some(dir) = guard.as_ref()
    {
        return Some(dir.clone());
    }
    directories::ProjectDirs::from("", "", "indus").map(|d| d.config_dir().to_path_buf())
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<IndusConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply `INDUS_*`
/// environment overrides.
///
/// Search order:
/// 1. `./indus.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/indus.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `IndusConfig::default()` if no config file is found or it
/// fails to parse.
pub fn discover_and_load() -> IndusConfig {
    let config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                IndusConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        IndusConfig::default()
    };
    apply_env_overrides(config)
}

/// Apply `INDUS_SERVICE_URL`, `INDUS_API_KEY` and
/// `INDUS_MAX_SCREENSHOT_DIMENSION` on top of a loaded config.
pub fn apply_env_overrides(config: IndusConfig) -> IndusConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: IndusConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> IndusConfig {
    if let Some(url) = lookup("INDUS_SERVICE_URL").filter(|v| !v.is_empty()) {
        config.service.base_url = url;
    }
    if let Some(key) = lookup("INDUS_API_KEY").filter(|v| !v.is_empty()) {
        config.service.api_key = Some(Secret::new(key));
    }
    if let Some(raw) = lookup("INDUS_MAX_SCREENSHOT_DIMENSION") {
        match raw.parse() {
            Ok(dim) => config.agent.max_screenshot_dimension = dim,
            Err(e) => {
                warn!(value = %raw, error = %e, "ignoring invalid INDUS_MAX_SCREENSHOT_DIMENSION");
            },
        }
    }
    config
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<IndusConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
