use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogRefresh, RefreshOutcome, RefreshState};
use crate::types::{Catalog, GLOBAL_ENVIRONMENT, Question, Version};

#[derive(Debug, Deserialize)]
pub struct EnvironmentParams {
    pub environment: Option<String>,
}

impl EnvironmentParams {
    #[must_use]
    pub fn environment_id(&self) -> &str {
        self.environment
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(GLOBAL_ENVIRONMENT)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCatalogRequest {
    pub name: String,
    pub url: String,
    pub branch: Option<String>,
    pub environment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub branch: String,
    pub environment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub state: RefreshState,
}

impl CatalogResponse {
    #[must_use]
    pub fn new(catalog: Catalog, state: RefreshState) -> Self {
        Self {
            id: catalog.id,
            name: catalog.name,
            url: catalog.url,
            branch: catalog.branch,
            environment_id: catalog.environment_id,
            last_refreshed_at: catalog.last_refreshed_at,
            state,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ParseFailureResponse {
    pub folder: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub catalog: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions_added: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions_removed: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ParseFailureResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<CatalogRefresh> for RefreshResponse {
    fn from(refresh: CatalogRefresh) -> Self {
        let catalog = refresh.catalog.to_string();
        match refresh.result {
            Ok(RefreshOutcome::Completed(report)) => Self {
                catalog,
                status: "completed",
                versions_added: Some(report.stats.versions_added),
                versions_removed: Some(report.stats.versions_removed),
                failures: report
                    .failures
                    .into_iter()
                    .map(|f| ParseFailureResponse {
                        folder: f.folder,
                        reason: f.reason,
                    })
                    .collect(),
                error: None,
            },
            Ok(RefreshOutcome::Skipped) => Self {
                catalog,
                status: "skipped",
                versions_added: None,
                versions_removed: None,
                failures: Vec::new(),
                error: None,
            },
            Err(e) => Self {
                catalog,
                status: "failed",
                versions_added: None,
                versions_removed: None,
                failures: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub environment_id: String,
    pub revision: i64,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_rancher_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_rancher_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_from: Option<String>,
    pub readme: String,
    pub questions: Vec<Question>,
    pub bindings: serde_json::Value,
    pub files: BTreeMap<String, String>,
    /// Target version string to its URL.
    pub upgrade_version_links: BTreeMap<String, String>,
}

impl VersionResponse {
    #[must_use]
    pub fn new(version: Version, catalog: &str, template: &str) -> Self {
        let files = version
            .files
            .into_iter()
            .map(|f| (f.name, String::from_utf8_lossy(&f.contents).into_owned()))
            .collect();
        let upgrade_version_links = version
            .upgrade_version_links
            .into_iter()
            .map(|(target, revision)| {
                (
                    target,
                    format!("/v1-catalog/templates/{catalog}/{template}/versions/{revision}"),
                )
            })
            .collect();

        Self {
            environment_id: version.environment_id,
            revision: version.revision,
            version: version.version,
            minimum_rancher_version: version.minimum_rancher_version,
            maximum_rancher_version: version.maximum_rancher_version,
            upgrade_from: version.upgrade_from,
            readme: version.readme,
            questions: version.questions,
            bindings: version.bindings,
            files,
            upgrade_version_links,
        }
    }
}
