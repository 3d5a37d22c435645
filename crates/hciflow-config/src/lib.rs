//! HCIFlow configuration
//!
//! Settings come from a YAML file, then environment variables override
//! whatever the file says:
//!
//! ```yaml
//! api_url: https://hypertec.cloud/api/v1/
//! api_key: xxxxxxxx
//! insecure: false
//! propagate_resize_errors: false
//! ```

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://hypertec.cloud/api/v1/";

pub const CONFIG_PATH_VAR: &str = "HCIFLOW_CONFIG_PATH";
pub const API_URL_VAR: &str = "HCI_API_URL";
pub const API_KEY_VAR: &str = "HCI_API_KEY";
pub const INSECURE_VAR: &str = "HCI_INSECURE";

const LOCAL_CANDIDATES: [&str; 2] = ["hciflow.yaml", ".hciflow.yaml"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HciConfig {
    pub api_url: String,
    pub api_key: String,
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Fail volume updates when the resize call fails instead of logging it
    pub propagate_resize_errors: bool,
}

impl Default for HciConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            insecure: false,
            propagate_resize_errors: false,
        }
    }
}

impl HciConfig {
    /// Discover, read and validate the configuration.
    pub fn load() -> Result<Self> {
        Self::load_from(find_config_file()?.as_deref())
    }

    /// Like [`HciConfig::load`] with an explicit file. `None` means
    /// environment variables and defaults only.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(url) = env_value(API_URL_VAR) {
            self.api_url = url;
        }
        if let Some(key) = env_value(API_KEY_VAR) {
            self.api_key = key;
        }
        if let Some(value) = env_value(INSECURE_VAR) {
            self.insecure = parse_flag(INSECURE_VAR, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

/// Directory of the user-wide config file (`~/.config/hciflow` on Linux)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hciflow"))
}

/// Find the config file
///
/// Search order:
/// 1. `HCIFLOW_CONFIG_PATH` (must exist when set)
/// 2. current directory: hciflow.yaml, .hciflow.yaml
/// 3. `<config_dir>/hciflow/config.yaml`
///
/// `Ok(None)` when no file exists; the environment may still carry
/// everything that is needed.
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Some(config_path) = env_value(CONFIG_PATH_VAR) {
        let path = PathBuf::from(config_path);
        if path.is_file() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in LOCAL_CANDIDATES {
        let path = current_dir.join(filename);
        if path.is_file() {
            return Ok(Some(path));
        }
    }

    Ok(config_dir()
        .map(|dir| dir.join("config.yaml"))
        .filter(|path| path.is_file()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const ALL_VARS: [&str; 4] = [CONFIG_PATH_VAR, API_URL_VAR, API_KEY_VAR, INSECURE_VAR];

    /// Run `f` inside `dir` with every HCIFlow variable unset and the
    /// user config directory pointed below `dir`.
    fn isolated<R>(dir: &Path, vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let xdg = dir.join("xdg").to_string_lossy().into_owned();
        let mut overrides: Vec<(&str, Option<String>)> =
            ALL_VARS.iter().map(|name| (*name, None)).collect();
        overrides.push(("XDG_CONFIG_HOME", Some(xdg)));
        for &(name, value) in vars {
            overrides.retain(|(n, _)| *n != name);
            overrides.push((name, Some(value.to_string())));
        }

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let result = temp_env::with_vars(overrides, f);
        std::env::set_current_dir(original_dir).unwrap();
        result
    }

    #[test]
    #[serial]
    fn test_find_config_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("hciflow.yaml"), "api_key: k").unwrap();

        let found = isolated(temp_dir.path(), &[], || find_config_file().unwrap());
        assert!(found.unwrap().ends_with("hciflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_visible_file_wins_over_hidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("hciflow.yaml"), "api_key: visible").unwrap();
        fs::write(temp_dir.path().join(".hciflow.yaml"), "api_key: hidden").unwrap();

        let config = isolated(temp_dir.path(), &[], || HciConfig::load().unwrap());
        assert_eq!(config.api_key, "visible");
    }

    #[test]
    #[serial]
    fn test_env_path_has_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("hciflow.yaml"), "api_key: local").unwrap();
        let custom = temp_dir.path().join("custom.yaml");
        fs::write(&custom, "api_key: custom").unwrap();

        let custom_str = custom.to_string_lossy().into_owned();
        let found = isolated(temp_dir.path(), &[(CONFIG_PATH_VAR, &custom_str)], || {
            find_config_file().unwrap()
        });
        assert_eq!(found, Some(custom));
    }

    #[test]
    #[serial]
    fn test_env_path_must_exist() {
        let temp_dir = tempfile::tempdir().unwrap();
        let vars = [(CONFIG_PATH_VAR, "/nonexistent/hciflow.yaml")];
        let result = isolated(temp_dir.path(), &vars, find_config_file);
        assert!(matches!(result, Err(ConfigError::ConfigFileNotFound(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn test_user_config_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let user_dir = temp_dir.path().join("xdg").join("hciflow");
        fs::create_dir_all(&user_dir).unwrap();
        fs::write(user_dir.join("config.yaml"), "api_key: global\ninsecure: true").unwrap();

        let config = isolated(temp_dir.path(), &[], || HciConfig::load().unwrap());
        assert_eq!(config.api_key, "global");
        assert!(config.insecure);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(
            temp_dir.path().join("hciflow.yaml"),
            concat!(
                "api_url: https://file.example.com/api/\n",
                "api_key: from-file\n",
                "propagate_resize_errors: true\n",
            ),
        )
        .unwrap();

        let config = isolated(
            temp_dir.path(),
            &[(API_KEY_VAR, "from-env"), (INSECURE_VAR, "yes")],
            || HciConfig::load().unwrap(),
        );
        assert_eq!(config.api_url, "https://file.example.com/api/");
        assert_eq!(config.api_key, "from-env");
        assert!(config.insecure);
        assert!(config.propagate_resize_errors);
    }

    #[test]
    #[serial]
    fn test_environment_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let vars = [(API_KEY_VAR, "k"), (API_URL_VAR, "http://localhost:8080/")];
        let config = isolated(temp_dir.path(), &vars, || HciConfig::load().unwrap());
        assert_eq!(config.api_url, "http://localhost:8080/");
        assert!(!config.insecure);
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("hciflow.yaml"), "insecure: false").unwrap();

        let result = isolated(temp_dir.path(), &[], HciConfig::load);
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));
    }

    #[test]
    #[serial]
    fn test_invalid_insecure_flag() {
        let temp_dir = tempfile::tempdir().unwrap();
        let vars = [(API_KEY_VAR, "k"), (INSECURE_VAR, "maybe")];
        let result = isolated(temp_dir.path(), &vars, HciConfig::load);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: INSECURE_VAR, .. })
        ));
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("broken.yaml");
        fs::write(&path, "api_key: [unclosed").unwrap();

        let err = HciConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_empty_file_is_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("hciflow.yaml");
        fs::write(&path, "\n").unwrap();

        assert_eq!(HciConfig::from_file(&path).unwrap(), HciConfig::default());
    }
}
