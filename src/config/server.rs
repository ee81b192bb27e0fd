use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::catalogs::{CatalogConfig, validate_catalogs};
use crate::error::{Error, Result};

const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Root under which catalog sources are checked out.
    pub cache_dir: PathBuf,
    pub refresh_interval_secs: u64,
    pub catalogs: BTreeMap<String, CatalogConfig>,
}

impl ServiceConfig {
    /// Loads a config file. `.json` files use the `{"catalogs": {...}}` layout,
    /// anything else is read as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?,
            _ => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(Error::Config(
                "refresh_interval_secs must be greater than zero".into(),
            ));
        }
        validate_catalogs(&self.catalogs)
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("catalogd.db")
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
            data_dir: PathBuf::from("./data"),
            cache_dir: PathBuf::from("./cache"),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            catalogs: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalogd.toml");
        fs::write(
            &path,
            r#"
port = 9000
refresh_interval_secs = 30

[catalogs.library]
url = "https://example.com/catalog.git"

[catalogs.team]
url = "https://example.com/team.git"
branch = "stable"
environment_id = "1a5"
"#,
        )
        .unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));

        let library = &config.catalogs["library"];
        assert_eq!(library.branch, "master");
        assert_eq!(library.environment_id, "global");

        let team = &config.catalogs["team"];
        assert_eq!(team.branch, "stable");
        assert_eq!(team.environment_id, "1a5");
    }

    #[test]
    fn test_load_json_catalog_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repo.json");
        fs::write(
            &path,
            r#"{"catalogs": {"library": {"url": "/srv/catalog", "environmentId": "1a7"}}}"#,
        )
        .unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.port, 8088);
        assert_eq!(config.catalogs["library"].url, "/srv/catalog");
        assert_eq!(config.catalogs["library"].environment_id, "1a7");
    }

    #[test]
    fn test_load_rejects_zero_interval() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalogd.toml");
        fs::write(&path, "refresh_interval_secs = 0\n").unwrap();

        assert!(matches!(ServiceConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = ServiceConfig::load(&temp.path().join("nope.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
