use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Catalog, CatalogKey, GLOBAL_ENVIRONMENT, Template, Version};

/// Environment-scoped reads. An environment sees its own catalogs and the
/// global ones.
#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<dyn Store>,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn get_version(
        &self,
        environment_id: &str,
        catalog: &str,
        template: &str,
        revision: i64,
    ) -> Result<Version> {
        self.store
            .version_snapshot(environment_id, catalog, template, revision)?
            .ok_or(Error::NotFound)
    }

    /// Empty when the template exists but currently has no versions.
    pub fn list_versions(
        &self,
        environment_id: &str,
        catalog: &str,
        template: &str,
    ) -> Result<Vec<Version>> {
        self.store
            .versions_snapshot(environment_id, catalog, template)?
            .ok_or(Error::NotFound)
    }

    /// The catalog named `name` as seen from `environment_id`: its own one if
    /// it has it, the global one otherwise.
    pub fn resolve_catalog(&self, environment_id: &str, name: &str) -> Result<Catalog> {
        if let Some(catalog) = self
            .store
            .get_catalog_by_key(&CatalogKey::new(environment_id, name))?
        {
            return Ok(catalog);
        }
        self.store
            .get_catalog_by_key(&CatalogKey::new(GLOBAL_ENVIRONMENT, name))?
            .ok_or(Error::NotFound)
    }

    pub fn list_templates(&self, environment_id: &str, catalog: &str) -> Result<Vec<Template>> {
        let catalog = self.resolve_catalog(environment_id, catalog)?;
        self.store.list_templates(catalog.id)
    }
}
