use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope shared by every environment.
pub const GLOBAL_ENVIRONMENT: &str = "global";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub branch: String,
    pub environment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl Catalog {
    #[must_use]
    pub fn key(&self) -> CatalogKey {
        CatalogKey::new(&self.environment_id, &self.name)
    }
}

/// A catalog name is unique within its environment scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CatalogKey {
    pub environment_id: String,
    pub name: String,
}

impl CatalogKey {
    pub fn new(environment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            environment_id: environment_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.environment_id, self.name)
    }
}

/// Descriptive metadata read from a template folder's `config.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(
        default,
        alias = "projectURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_url: Option<String>,
    #[serde(
        default,
        rename = "version",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub catalog_id: i64,
    pub folder_name: String,
    #[serde(flatten)]
    pub meta: TemplateMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionFile {
    pub name: String,
    pub contents: Vec<u8>,
}

/// An opaque prompt definition. Only its `variable` key is ever inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Question(pub serde_json::Value);

impl Question {
    #[must_use]
    pub fn variable(&self) -> Option<&str> {
        self.0.get("variable").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub environment_id: String,
    pub template_id: i64,
    pub revision: i64,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_rancher_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_rancher_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_from: Option<String>,
    pub files: Vec<VersionFile>,
    pub questions: Vec<Question>,
    pub bindings: serde_json::Value,
    pub readme: String,
    /// Versions this one may be upgraded to, keyed by version string.
    pub upgrade_version_links: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeLink {
    pub from_revision: i64,
    pub to_revision: i64,
}
