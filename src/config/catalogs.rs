use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::GLOBAL_ENVIRONMENT;

fn default_branch() -> String {
    "master".to_string()
}

fn default_environment() -> String {
    GLOBAL_ENVIRONMENT.to_string()
}

/// Where a catalog's templates come from and which environment sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_environment", alias = "environmentId")]
    pub environment_id: String,
}

impl CatalogConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: default_branch(),
            environment_id: default_environment(),
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment_id: impl Into<String>) -> Self {
        self.environment_id = environment_id.into();
        self
    }

    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }
}

pub fn validate_catalog(name: &str, config: &CatalogConfig) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Config("catalog name cannot be empty".into()));
    }
    if name.contains('/') {
        return Err(Error::Config(format!(
            "catalog name '{name}' cannot contain '/'"
        )));
    }
    if config.url.trim().is_empty() {
        return Err(Error::Config(format!("catalog '{name}' has no url")));
    }
    if config.branch.trim().is_empty() {
        return Err(Error::Config(format!("catalog '{name}' has an empty branch")));
    }
    if config.environment_id.trim().is_empty() {
        return Err(Error::Config(format!(
            "catalog '{name}' has an empty environment id"
        )));
    }
    Ok(())
}

pub fn validate_catalogs(catalogs: &BTreeMap<String, CatalogConfig>) -> Result<()> {
    catalogs
        .iter()
        .try_for_each(|(name, config)| validate_catalog(name, config))
}
