//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "KILN_CONFIG";

/// Environment variable overriding the dataset root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "KILN_ROOT_FOLDER";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate the TOML config file for a module
///
/// Priority:
/// 1. `KILN_CONFIG` environment variable
/// 2. `<config_dir>/kiln/<module_name>.toml`
///
/// Returns `None` if no candidate location can be determined.
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("kiln").join(format!("{}.toml", module_name)))
}

/// Load a TOML config file, falling back to built-in defaults when absent
///
/// A file that exists but cannot be read is `Error::Io`; one that cannot be
/// parsed is `Error::Config`.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        debug!("No config file location available, using built-in defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        info!("Config file {} not found, using built-in defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;

    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Root folder resolution, in priority order:
/// 1. Environment variable
/// 2. TOML config value
/// 3. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(env_var_name: &str, toml_value: Option<&Path>) -> PathBuf {
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("kiln"))
        .unwrap_or_else(|| PathBuf::from("./kiln_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[derive(Debug, Default, Deserialize)]
    struct SampleConfig {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");

        let config: SampleConfig = load_toml_config(Some(&path)).unwrap();
        assert!(config.name.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_existing_file_is_parsed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kiln.toml");
        std::fs::write(&path, "name = \"met\"\n[logging]\nlevel = \"debug\"\n").unwrap();

        let config: SampleConfig = load_toml_config(Some(&path)).unwrap();
        assert_eq!(config.name.as_deref(), Some("met"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unparseable_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "name = [unterminated").unwrap();

        let result: Result<SampleConfig> = load_toml_config(Some(&path));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        // A directory at the config path exists but cannot be read as text
        let path = temp_dir.path().join("kiln.toml");
        std::fs::create_dir(&path).unwrap();

        let result: Result<SampleConfig> = load_toml_config(Some(&path));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    #[serial]
    fn test_root_folder_env_overrides_toml() {
        std::env::set_var("KILN_TEST_ROOT", "/tmp/from-env");
        let resolved = resolve_root_folder("KILN_TEST_ROOT", Some(Path::new("/tmp/from-toml")));
        std::env::remove_var("KILN_TEST_ROOT");

        assert_eq!(resolved, PathBuf::from("/tmp/from-env"));
    }

    #[test]
    #[serial]
    fn test_root_folder_toml_then_default() {
        std::env::remove_var("KILN_TEST_ROOT");

        let from_toml = resolve_root_folder("KILN_TEST_ROOT", Some(Path::new("/tmp/from-toml")));
        assert_eq!(from_toml, PathBuf::from("/tmp/from-toml"));

        let fallback = resolve_root_folder("KILN_TEST_ROOT", None);
        assert!(fallback.ends_with("kiln") || fallback.ends_with("kiln_data"));
    }

    #[test]
    #[serial]
    fn test_config_file_path_prefers_env() {
        std::env::set_var(CONFIG_ENV_VAR, "/tmp/custom.toml");
        let path = config_file_path("kiln-harvest");
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(path, Some(PathBuf::from("/tmp/custom.toml")));
    }
}
