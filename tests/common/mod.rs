#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use catalogd::catalog::resolver::{CatalogPlan, PersistedCatalog, PlannedVersion};
use catalogd::catalog::{RefreshCoordinator, RefreshOutcome, RefreshReport, RefreshState, SourceProvider};
use catalogd::config::CatalogConfig;
use catalogd::error::{Error, Result};
use catalogd::store::{SqliteStore, Store};
use catalogd::types::*;

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent dir")).expect("create dirs");
    fs::write(path, contents).expect("write file");
}

/// Writes `<template>/<folder>/rancher-compose.yml` with the given version.
pub fn write_version(root: &Path, template: &str, folder: &str, version: &str) {
    write_version_with(root, template, folder, version, "");
}

/// Like [`write_version`] with extra lines appended to the `.catalog` section.
pub fn write_version_with(root: &Path, template: &str, folder: &str, version: &str, extra: &str) {
    write_file(
        root,
        &format!("{template}/{folder}/rancher-compose.yml"),
        &format!(".catalog:\n  version: \"{version}\"\n{extra}"),
    );
    write_file(
        root,
        &format!("{template}/{folder}/docker-compose.yml"),
        &format!("app:\n  image: example/{template}:{version}\n"),
    );
}

pub fn remove_dir(root: &Path, relative: &str) {
    fs::remove_dir_all(root.join(relative)).expect("remove dir");
}

/// Serves the directory named by the catalog url as the snapshot.
pub struct LocalProvider;

impl SourceProvider for LocalProvider {
    fn fetch(&self, catalog: &Catalog) -> Result<PathBuf> {
        let path = PathBuf::from(&catalog.url);
        if path.is_dir() {
            Ok(path)
        } else {
            Err(Error::Fetch(format!("no such source: {}", catalog.url)))
        }
    }
}

/// A [`LocalProvider`] whose fetches block until the test releases them.
pub struct GatedProvider {
    release: Mutex<Receiver<()>>,
}

impl GatedProvider {
    pub fn new() -> (Self, Sender<()>) {
        let (tx, rx) = channel();
        (
            Self {
                release: Mutex::new(rx),
            },
            tx,
        )
    }
}

impl SourceProvider for GatedProvider {
    fn fetch(&self, catalog: &Catalog) -> Result<PathBuf> {
        self.release
            .lock()
            .expect("gate lock")
            .recv()
            .map_err(|_| Error::Fetch("gate closed".into()))?;
        LocalProvider.fetch(catalog)
    }
}

/// Delegates to a [`SqliteStore`], optionally corrupting the refresh plan so
/// the commit fails after part of it has been written.
pub struct SabotagedStore {
    pub inner: SqliteStore,
    pub sabotage: AtomicBool,
}

impl Store for SabotagedStore {
    fn initialize(&self) -> Result<()> {
        self.inner.initialize()
    }
    fn upsert_catalog(&self, name: &str, config: &CatalogConfig) -> Result<Catalog> {
        self.inner.upsert_catalog(name, config)
    }
    fn get_catalog_by_key(&self, key: &CatalogKey) -> Result<Option<Catalog>> {
        self.inner.get_catalog_by_key(key)
    }
    fn list_catalogs(&self) -> Result<Vec<Catalog>> {
        self.inner.list_catalogs()
    }
    fn list_catalogs_by_name(&self, name: &str) -> Result<Vec<Catalog>> {
        self.inner.list_catalogs_by_name(name)
    }
    fn delete_catalog(&self, id: i64) -> Result<bool> {
        self.inner.delete_catalog(id)
    }
    fn load_persisted(&self, catalog_id: i64) -> Result<PersistedCatalog> {
        self.inner.load_persisted(catalog_id)
    }
    fn commit_refresh(&self, catalog_id: i64, plan: &CatalogPlan) -> Result<()> {
        if !self.sabotage.load(Ordering::SeqCst) {
            return self.inner.commit_refresh(catalog_id, plan);
        }
        let mut plan = plan.clone();
        let last = plan.templates.last_mut().expect("plan has templates");
        let duplicate = last.versions.last().expect("template has versions").clone();
        last.versions.push(PlannedVersion {
            existing_id: None,
            ..duplicate
        });
        self.inner.commit_refresh(catalog_id, &plan)
    }
    fn list_templates(&self, catalog_id: i64) -> Result<Vec<Template>> {
        self.inner.list_templates(catalog_id)
    }
    fn version_snapshot(
        &self,
        environment_id: &str,
        catalog: &str,
        template: &str,
        revision: i64,
    ) -> Result<Option<Version>> {
        self.inner
            .version_snapshot(environment_id, catalog, template, revision)
    }
    fn versions_snapshot(
        &self,
        environment_id: &str,
        catalog: &str,
        template: &str,
    ) -> Result<Option<Vec<Version>>> {
        self.inner.versions_snapshot(environment_id, catalog, template)
    }
}

pub struct Harness {
    pub temp: TempDir,
    pub store: Arc<dyn Store>,
    pub coordinator: Arc<RefreshCoordinator>,
}

impl Harness {
    /// One global catalog named `library` whose source is `source_dir()`.
    pub fn new() -> Self {
        Self::with_provider(Arc::new(LocalProvider))
    }

    pub fn with_provider(provider: Arc<dyn SourceProvider>) -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let store = SqliteStore::new(temp.path().join("catalogd.db")).expect("open store");
        store.initialize().expect("initialize store");
        Self::build(temp, Arc::new(store), provider)
    }

    pub fn build(temp: TempDir, store: Arc<dyn Store>, provider: Arc<dyn SourceProvider>) -> Self {
        let source = temp.path().join("source");
        fs::create_dir_all(&source).expect("create source dir");

        let mut catalogs = BTreeMap::new();
        catalogs.insert(
            "library".to_string(),
            CatalogConfig::new(source.to_str().expect("utf-8 path")),
        );

        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&store),
            provider,
            catalogs,
        ));
        coordinator
            .create_config_catalogs()
            .expect("create config catalogs");

        Self {
            temp,
            store,
            coordinator,
        }
    }

    pub fn source_dir(&self) -> PathBuf {
        self.temp.path().join("source")
    }

    pub fn catalog(&self) -> Catalog {
        self.store
            .get_catalog_by_key(&CatalogKey::new(GLOBAL_ENVIRONMENT, "library"))
            .expect("lookup catalog")
            .expect("catalog exists")
    }

    /// Refreshes `library` and returns its report, panicking on failure.
    pub fn refresh(&self) -> RefreshReport {
        match self.coordinator.refresh_catalog(&self.catalog()) {
            Ok(RefreshOutcome::Completed(report)) => report,
            Ok(RefreshOutcome::Skipped) => panic!("refresh skipped"),
            Err(e) => panic!("refresh failed: {e}"),
        }
    }

    /// `(version string, revision)` pairs visible to `environment_id`, empty
    /// when the template is unknown.
    pub fn revisions(&self, environment_id: &str, template: &str) -> Vec<(String, i64)> {
        self.store
            .versions_snapshot(environment_id, "library", template)
            .expect("lookup versions")
            .unwrap_or_default()
            .into_iter()
            .map(|v| (v.version, v.revision))
            .collect()
    }
}

pub async fn wait_for_state(coordinator: &RefreshCoordinator, key: &CatalogKey, state: RefreshState) {
    for _ in 0..500 {
        if coordinator.state(key) == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("catalog {key} never reached {state:?}");
}
