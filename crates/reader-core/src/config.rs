use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://www.wanandroid.com/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub enable_logging: bool,
    pub allow_insecure_tls: bool,
    pub crash_report_endpoint: Option<String>,
    pub unauthorized_statuses: Vec<u16>,
    pub business_unauthorized_codes: Vec<i64>,
    pub headers: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: 10,
            read_timeout_secs: 10,
            write_timeout_secs: 10,
            enable_logging: false,
            allow_insecure_tls: false,
            crash_report_endpoint: None,
            unauthorized_statuses: vec![401, 403],
            business_unauthorized_codes: vec![-1001],
            headers: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).context("read config")?;
        let config = serde_json::from_str(&data).context("parse config")?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create config directory")?;
        }
        let data = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, data).context("write config")?;
        Ok(())
    }
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from("com", "reader", "reader").context("resolve project dirs")
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.json"))
}

pub fn default_prefs_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.data_dir().join("prefs.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig::load(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.unauthorized_statuses, vec![401, 403]);
    }

    #[test]
    fn config_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let mut config = AppConfig {
            base_url: "http://localhost:8080/".into(),
            crash_report_endpoint: Some("http://localhost:9000/crash".into()),
            ..AppConfig::default()
        };
        config.headers.insert("x-client".into(), "reader".into());
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"base_url":"http://example.test/","read_timeout_secs":30}"#).unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "http://example.test/");
        assert_eq!(config.read_timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.business_unauthorized_codes, vec![-1001]);
    }
}
