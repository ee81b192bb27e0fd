mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::catalog::resolver::{CatalogPlan, PersistedCatalog};
use crate::config::CatalogConfig;
use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Catalog operations
    fn upsert_catalog(&self, name: &str, config: &CatalogConfig) -> Result<Catalog>;
    fn get_catalog_by_key(&self, key: &CatalogKey) -> Result<Option<Catalog>>;
    fn list_catalogs(&self) -> Result<Vec<Catalog>>;
    fn list_catalogs_by_name(&self, name: &str) -> Result<Vec<Catalog>>;
    fn delete_catalog(&self, id: i64) -> Result<bool>;

    // Refresh operations
    fn load_persisted(&self, catalog_id: i64) -> Result<PersistedCatalog>;
    /// Applies a whole refresh in one transaction.
    fn commit_refresh(&self, catalog_id: i64, plan: &CatalogPlan) -> Result<()>;

    // Read operations
    fn list_templates(&self, catalog_id: i64) -> Result<Vec<Template>>;
    /// One version visible to `environment_id`, read from a single snapshot.
    /// `None` when the template does not resolve or has no such revision.
    fn version_snapshot(
        &self,
        environment_id: &str,
        catalog: &str,
        template: &str,
        revision: i64,
    ) -> Result<Option<Version>>;
    /// Every version visible to `environment_id`, read from a single snapshot.
    /// `None` when no catalog visible to the environment has the template.
    fn versions_snapshot(
        &self,
        environment_id: &str,
        catalog: &str,
        template: &str,
    ) -> Result<Option<Vec<Version>>>;
}
