use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;
use crate::shared::{Settings, ValidationError};

/// Configuration file looked up relative to the current directory and its
/// ancestors.
const CONFIG_FILE: &str = "cfg/cfg.yml";

/// How many ancestor directories are searched for [`CONFIG_FILE`].
const MAX_SEARCH_DEPTH: usize = 5;

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "DK";

/// Separator between the prefix and the first key segment.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
///
/// Example: `DK_POSTGRES__HOST` sets the `postgres.host` field.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
///
/// Example: `DK_MONITORING__RECIPIENTS=a@x.com,b@x.com` sets the
/// `monitoring.recipients` array field.
const LIST_SEPARATOR: &str = ",";

/// Trait defining the list of keys that should be parsed as lists when a given
/// config shape is loaded from environment variables.
pub trait Config {
    /// Slice containing all the keys that should be parsed as lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors produced while constructing [`Settings`].
///
/// All of these are fatal at startup: the process has no valid configuration
/// to run with.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file or environment sources could not be merged or deserialized.
    /// The message names the missing or malformed field.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    /// The merged configuration failed a semantic check.
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
    /// The `DK_ENVIRONMENT` tag or the current directory could not be read.
    #[error("failed to read the process environment: {0}")]
    Environment(#[from] std::io::Error),
}

/// Loads and validates [`Settings`] for the current process.
///
/// Sources, lowest precedence first:
/// 1. `cfg/cfg.yml`, searched from the current directory through at most 5
///    ancestors. The file is optional; a missing file means values come from
///    the environment and defaults alone.
/// 2. Environment variables prefixed with `DK`, nested keys joined by `__`.
///    An environment value always overrides the corresponding file value.
///
/// The environment tag is taken from `DK_ENVIRONMENT`, never from the file.
///
/// Call this once at process start and pass the result by reference; the
/// settings are immutable after construction.
pub fn load_settings() -> Result<Settings, SettingsError> {
    let cwd = std::env::current_dir()?;
    load_settings_from(&cwd)
}

/// Like [`load_settings`], but searching for `cfg/cfg.yml` from `search_start`
/// instead of the current directory.
pub fn load_settings_from(search_start: &Path) -> Result<Settings, SettingsError> {
    let environment = Environment::load()?;

    let mut settings: Settings = load_config_from(search_start, env_source::<Settings>())?;
    settings.environment = environment;
    settings.validate()?;

    Ok(settings)
}

/// Loads an arbitrary [`Config`] shape using the standard file and environment
/// layering, searching for the file from the current directory.
pub fn load_config<T>() -> Result<T, config::ConfigError>
where
    T: Config + DeserializeOwned,
{
    let cwd = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("failed to determine cwd: {e}")))?;

    load_config_from(&cwd, env_source::<T>())
}

/// Builds the environment variable source for a [`Config`] shape.
fn env_source<T: Config>() -> config::Environment {
    let mut source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        source = source.try_parsing(true).list_separator(LIST_SEPARATOR);

        for key in T::LIST_PARSE_KEYS {
            source = source.with_list_parse_key(key);
        }
    }

    source
}

/// Merges the optional config file with the given environment source and
/// deserializes the result.
fn load_config_from<T>(
    search_start: &Path,
    env_source: config::Environment,
) -> Result<T, config::ConfigError>
where
    T: DeserializeOwned,
{
    let mut builder = config::Config::builder();

    if let Some(config_path) = locate_config_file(search_start) {
        builder = builder.add_source(config::File::from(config_path));
    }

    let merged = builder.add_source(env_source).build()?;

    merged.try_deserialize::<T>()
}

/// Searches `start` and up to [`MAX_SEARCH_DEPTH`] ancestors for
/// [`CONFIG_FILE`]. Returns `None` when no file is found, which is not an
/// error: the environment can carry the full configuration.
fn locate_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start;

    for _ in 0..MAX_SEARCH_DEPTH {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }

        current = current.parent()?;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    const MINIMAL_CFG: &str = r#"
postgres:
  host: file-host
  name: analytics
  username: etl
  password: file-password
monitoring:
  smtp_host: smtp.internal
"#;

    fn write_cfg(dir: &TempDir, contents: &str) {
        let cfg_dir = dir.path().join("cfg");
        fs::create_dir_all(&cfg_dir).unwrap();
        fs::write(cfg_dir.join("cfg.yml"), contents).unwrap();
    }

    /// Environment source backed by an explicit map, so tests never mutate the
    /// process environment.
    fn env_with(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        env_source::<Settings>().source(Some(map))
    }

    #[test]
    fn loads_from_file_alone() {
        let dir = TempDir::new().unwrap();
        write_cfg(&dir, MINIMAL_CFG);

        let settings: Settings = load_config_from(dir.path(), env_with(&[])).unwrap();

        assert_eq!(settings.postgres.host, "file-host");
        assert_eq!(settings.postgres.port, 5432);
        assert_eq!(settings.monitoring.smtp_port, 25);
        assert!(settings.storage.is_none());
    }

    #[test]
    fn missing_required_field_names_the_field() {
        let dir = TempDir::new().unwrap();
        // `postgres.host` is missing from both the file and the environment.
        write_cfg(
            &dir,
            r#"
postgres:
  name: analytics
  username: etl
monitoring:
  smtp_host: smtp.internal
"#,
        );

        let result: Result<Settings, _> = load_config_from(dir.path(), env_with(&[]));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("host"), "error should name the field: {message}");
    }

    #[test]
    fn environment_overrides_file_value() {
        let dir = TempDir::new().unwrap();
        write_cfg(&dir, MINIMAL_CFG);

        let settings: Settings = load_config_from(
            dir.path(),
            env_with(&[("DK_POSTGRES__HOST", "env-host"), ("DK_POSTGRES__PORT", "5433")]),
        )
        .unwrap();

        assert_eq!(settings.postgres.host, "env-host");
        assert_eq!(settings.postgres.port, 5433);
        // Keys not overridden keep the file value.
        assert_eq!(settings.postgres.name, "analytics");
    }

    #[test]
    fn environment_alone_is_sufficient() {
        let dir = TempDir::new().unwrap();

        let settings: Settings = load_config_from(
            dir.path(),
            env_with(&[
                ("DK_POSTGRES__HOST", "env-host"),
                ("DK_POSTGRES__NAME", "analytics"),
                ("DK_POSTGRES__USERNAME", "etl"),
                ("DK_MONITORING__SMTP_HOST", "smtp.internal"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.postgres.host, "env-host");
    }

    #[test]
    fn recipients_parse_as_list_from_environment() {
        let dir = TempDir::new().unwrap();
        write_cfg(&dir, MINIMAL_CFG);

        let settings: Settings = load_config_from(
            dir.path(),
            env_with(&[(
                "DK_MONITORING__RECIPIENTS",
                "oncall@example.com,team@example.com",
            )]),
        )
        .unwrap();

        assert_eq!(
            settings.monitoring.recipients,
            vec!["oncall@example.com", "team@example.com"]
        );
    }

    #[test]
    fn config_file_is_found_in_an_ancestor_directory() {
        let dir = TempDir::new().unwrap();
        write_cfg(&dir, MINIMAL_CFG);

        let nested = dir.path().join("jobs").join("daily");
        fs::create_dir_all(&nested).unwrap();

        let located = locate_config_file(&nested).unwrap();
        assert_eq!(located, dir.path().join("cfg").join("cfg.yml"));
    }

    #[test]
    fn search_stops_after_max_depth() {
        let dir = TempDir::new().unwrap();
        write_cfg(&dir, MINIMAL_CFG);

        let mut nested = dir.path().to_path_buf();
        for level in 0..MAX_SEARCH_DEPTH {
            nested = nested.join(format!("level{level}"));
        }
        fs::create_dir_all(&nested).unwrap();

        // The file sits one level beyond the search horizon.
        assert!(locate_config_file(&nested).is_none());
    }
}
