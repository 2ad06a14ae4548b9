use std::{env, fmt::Display, net::IpAddr, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::info;

use crate::metadata::FetchSettings;

const APP_DIR_NAME: &str = "urlist";
const DATABASE_FILE_NAME: &str = "urlist.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {message}")]
    Invalid {
        key: &'static str,
        value: String,
        message: String,
    },
    #[error("no data directory available; set URLIST_DATABASE")]
    NoDataDir,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_path: PathBuf,
    pub fetch: FetchSettings,
    /// Include fetch failure details in metadata error responses.
    pub expose_errors: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = FetchSettings::default();
        let database_path = match lookup("URLIST_DATABASE") {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
            _ => default_database_path(&lookup)?,
        };

        Ok(Self {
            host: try_load(&lookup, "URLIST_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "URLIST_PORT", "3000")?,
            database_path,
            fetch: FetchSettings {
                timeout: Duration::from_secs(try_load(
                    &lookup,
                    "URLIST_FETCH_TIMEOUT_SECS",
                    &defaults.timeout.as_secs().to_string(),
                )?),
                max_html_bytes: try_load(
                    &lookup,
                    "URLIST_MAX_HTML_BYTES",
                    &defaults.max_html_bytes.to_string(),
                )?,
                ..defaults
            },
            expose_errors: try_load(&lookup, "URLIST_EXPOSE_ERRORS", "false")?,
        })
    }
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    value.trim().parse::<T>().map_err(|err| ConfigError::Invalid {
        key,
        value: value.clone(),
        message: err.to_string(),
    })
}

fn default_database_path<F>(lookup: &F) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let data_root = lookup("APPDATA")
        .or_else(|| lookup("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .or_else(|| lookup("HOME").map(|home| PathBuf::from(home).join(".local").join("share")))
        .ok_or(ConfigError::NoDataDir)?;
    Ok(data_root.join(APP_DIR_NAME).join(DATABASE_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup_from(&[("HOME", "/home/someone")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host.to_string(), "0.0.0.0");
        assert!(!config.expose_errors);
        assert_eq!(
            config.database_path,
            PathBuf::from("/home/someone/.local/share/urlist/urlist.db")
        );
        assert_eq!(config.fetch.timeout, FetchSettings::default().timeout);
    }

    #[test]
    fn explicit_values_win() {
        let config = Config::from_lookup(lookup_from(&[
            ("URLIST_PORT", "8080"),
            ("URLIST_DATABASE", "/tmp/lists.db"),
            ("URLIST_FETCH_TIMEOUT_SECS", "3"),
            ("URLIST_EXPOSE_ERRORS", "true"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, PathBuf::from("/tmp/lists.db"));
        assert_eq!(config.fetch.timeout, Duration::from_secs(3));
        assert!(config.expose_errors);
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = Config::from_lookup(lookup_from(&[
            ("URLIST_DATABASE", "/tmp/lists.db"),
            ("URLIST_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "URLIST_PORT", .. }));
    }

    #[test]
    fn missing_data_dir_is_reported() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::NoDataDir));
    }
}
