use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::Deserialize;

use crate::domain::{ApiKey, Credentials, SearchTermJoin};
use crate::error::ImportError;

pub const DEFAULT_CONFIG_FILE: &str = "kaggle-import.json";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub key: Option<ApiKey>,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub sink: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub sink_root: Option<String>,
    #[serde(default)]
    pub sink_url: Option<String>,
    #[serde(default)]
    pub sink_token: Option<String>,
    #[serde(default)]
    pub search_join: Option<SearchTermJoin>,
    #[serde(default)]
    pub settle_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct KaggleJson {
    username: String,
    key: ApiKey,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<Config, ImportError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }
        Self::load(&config_path)
    }

    pub fn load(path: &Path) -> Result<Config, ImportError> {
        let content =
            fs::read_to_string(path).map_err(|_| ImportError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| ImportError::ConfigParse(err.to_string()))
    }
}

// Credentials from, in order: explicit values, the config file, the
// `KAGGLE_USERNAME`/`KAGGLE_KEY` environment and `~/.kaggle/kaggle.json`.
pub fn resolve_credentials(
    username: Option<&str>,
    key: Option<&str>,
    config: &Config,
) -> Result<Credentials, ImportError> {
    let mut username = username
        .map(str::to_string)
        .or_else(|| config.username.clone())
        .or_else(|| std::env::var("KAGGLE_USERNAME").ok())
        .filter(|value| !value.trim().is_empty());
    let mut key = key
        .map(ApiKey::new)
        .or_else(|| config.key.clone())
        .or_else(|| std::env::var("KAGGLE_KEY").ok().map(ApiKey::new))
        .filter(|value| !value.is_empty());

    if username.is_none() || key.is_none() {
        if let Some(path) = kaggle_json_path().filter(|path| path.exists()) {
            let json = read_kaggle_json(&path)?;
            username = username.or(Some(json.username));
            key = key.or(Some(json.key));
        }
    }

    let username = username
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ImportError::MissingCredentials("no username configured".to_string()))?;
    let key = key
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ImportError::MissingCredentials("no api key configured".to_string()))?;
    Ok(Credentials { username, key })
}

pub fn kaggle_json_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".kaggle").join("kaggle.json"))
}

fn read_kaggle_json(path: &Path) -> Result<KaggleJson, ImportError> {
    let content =
        fs::read_to_string(path).map_err(|_| ImportError::ConfigRead(path.to_path_buf()))?;
    serde_json::from_str(&content).map_err(|err| ImportError::ConfigParse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let raw = r#"{
            "username": "alice",
            "key": "secret",
            "dataset": "owner/ds",
            "file": "data.csv",
            "sink": "out",
            "project": "proj",
            "search_join": "space",
            "settle_ms": 250
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.dataset.as_deref(), Some("owner/ds"));
        assert_eq!(config.search_join, Some(SearchTermJoin::Space));
        assert_eq!(config.settle_ms, Some(250));
        assert_eq!(config.key.unwrap().expose(), "secret");
    }

    #[test]
    fn explicit_credentials_win() {
        let config = Config {
            username: Some("from-config".to_string()),
            key: Some(ApiKey::new("config-key")),
            ..Config::default()
        };
        let creds = resolve_credentials(Some("alice"), Some("flag-key"), &config).unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.key.expose(), "flag-key");

        let creds = resolve_credentials(None, None, &config).unwrap();
        assert_eq!(creds.username, "from-config");
        assert_eq!(creds.key.expose(), "config-key");
    }
}
