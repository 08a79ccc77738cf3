//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, GylConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli). Only existing
/// files are returned.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/gyl/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("gyl/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("gyl.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<GylConfig, ConfigError> {
    let contents = read_file(path)?;
    parse_toml(&contents, path)
}

/// Load several config files in order. Later files win for every key they
/// set, even when the value equals the compiled default.
pub fn load_layered(paths: &[PathBuf]) -> Result<GylConfig, ConfigError> {
    let mut merged = toml::Table::new();
    for path in paths {
        merge_tables(&mut merged, load_table(path)?);
    }

    let mut config: GylConfig = toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Invalid {
            key: "config".to_string(),
            message: e.to_string(),
        })?;
    expand_config_paths(&mut config);
    Ok(config)
}

/// Read one file as a raw table, after checking it against the schema so
/// type errors name the file they came from.
fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = read_file(path)?;
    parse_toml(&contents, path)?;
    toml::from_str(&contents).map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Deep-merge `overlay` into `base`; nested tables merge key by key.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })
}

fn parse_toml(contents: &str, path: &Path) -> Result<GylConfig, ConfigError> {
    let mut config: GylConfig =
        toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    expand_config_paths(&mut config);
    Ok(config)
}

// serde gives us the literal string; resolve ~ and $VAR here
fn expand_config_paths(config: &mut GylConfig) {
    if let Some(raw) = config.paths.pictures_dir.to_str() {
        config.paths.pictures_dir = expand_path(raw);
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut GylConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("GYL_PICTURES_DIR") {
        config.paths.pictures_dir = expand_path(&v);
        sources.env_overrides.push("GYL_PICTURES_DIR".to_string());
    }
    if let Ok(v) = env::var("GYL_STORAGE_DIR") {
        config.paths.storage_dir = v;
        sources.env_overrides.push("GYL_STORAGE_DIR".to_string());
    }
    if let Ok(v) = env::var("GYL_JPEG_QUALITY") {
        if let Ok(quality) = v.parse() {
            config.capture.jpeg_quality = quality;
            sources.env_overrides.push("GYL_JPEG_QUALITY".to_string());
        }
    }
    if let Ok(v) = env::var("GYL_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("GYL_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over GYL_LOG_LEVEL, matching EnvFilter conventions
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
