use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::parser::{ParseFailure, parse_catalog};
use super::resolver::{PlanStats, resolve};
use super::source::SourceProvider;
use crate::config::{CatalogConfig, validate_catalog};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Catalog, CatalogKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    Idle,
    Refreshing,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub catalog: CatalogKey,
    pub stats: PlanStats,
    pub failures: Vec<ParseFailure>,
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Completed(RefreshReport),
    /// Another refresh of the same catalog was already running.
    Skipped,
}

#[derive(Debug)]
pub struct CatalogRefresh {
    pub catalog: CatalogKey,
    pub result: Result<RefreshOutcome>,
}

type StateMap = Mutex<HashMap<CatalogKey, RefreshState>>;

fn lock_states(states: &StateMap) -> MutexGuard<'_, HashMap<CatalogKey, RefreshState>> {
    states.lock().unwrap_or_else(|e| e.into_inner())
}

/// Marks a catalog as refreshing for as long as it lives. Dropping it without
/// [`RefreshGuard::finish`] (an error or a panic) leaves the catalog Failed.
struct RefreshGuard<'a> {
    states: &'a StateMap,
    key: CatalogKey,
    finished: bool,
}

impl<'a> RefreshGuard<'a> {
    fn try_begin(states: &'a StateMap, key: &CatalogKey) -> Option<Self> {
        let mut map = lock_states(states);
        let state = map.entry(key.clone()).or_insert(RefreshState::Idle);
        if *state == RefreshState::Refreshing {
            return None;
        }
        *state = RefreshState::Refreshing;
        Some(Self {
            states,
            key: key.clone(),
            finished: false,
        })
    }

    fn finish(mut self, state: RefreshState) {
        lock_states(self.states).insert(self.key.clone(), state);
        self.finished = true;
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            lock_states(self.states).insert(self.key.clone(), RefreshState::Failed);
        }
    }
}

/// Drives fetch, parse, resolve and commit for every catalog, never running
/// two refreshes of one catalog at the same time.
pub struct RefreshCoordinator {
    store: Arc<dyn Store>,
    provider: Arc<dyn SourceProvider>,
    configured: BTreeMap<String, CatalogConfig>,
    states: StateMap,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn SourceProvider>,
        configured: BTreeMap<String, CatalogConfig>,
    ) -> Self {
        Self {
            store,
            provider,
            configured,
            states: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn state(&self, key: &CatalogKey) -> RefreshState {
        lock_states(&self.states)
            .get(key)
            .copied()
            .unwrap_or(RefreshState::Idle)
    }

    pub fn create_config_catalogs(&self) -> Result<Vec<Catalog>> {
        self.configured
            .iter()
            .map(|(name, config)| self.register_catalog(name, config))
            .collect()
    }

    /// Creates or updates a catalog. It is picked up by the next tick.
    pub fn register_catalog(&self, name: &str, config: &CatalogConfig) -> Result<Catalog> {
        validate_catalog(name, config)?;
        let catalog = self.store.upsert_catalog(name, config)?;
        info!("Registered catalog {} ({})", catalog.key(), catalog.url);
        Ok(catalog)
    }

    fn run_pipeline(&self, catalog: &Catalog) -> Result<RefreshReport> {
        let snapshot = self.provider.fetch(catalog)?;
        let parsed = parse_catalog(&snapshot)?;
        let failures = parsed.failures.clone();
        for failure in &failures {
            warn!(
                "Catalog {}: skipping {}: {}",
                catalog.key(),
                failure.folder,
                failure.reason
            );
        }

        let persisted = self.store.load_persisted(catalog.id)?;
        let plan = resolve(parsed, &persisted);
        self.store.commit_refresh(catalog.id, &plan)?;

        Ok(RefreshReport {
            catalog: catalog.key(),
            stats: plan.stats(),
            failures,
        })
    }

    /// Refreshes one catalog on the calling thread.
    pub fn refresh_catalog(&self, catalog: &Catalog) -> Result<RefreshOutcome> {
        let key = catalog.key();
        let Some(guard) = RefreshGuard::try_begin(&self.states, &key) else {
            info!("Catalog {} is already refreshing, skipping", key);
            return Ok(RefreshOutcome::Skipped);
        };
        info!("Refreshing catalog {} from {}", key, catalog.url);

        match self.run_pipeline(catalog) {
            Ok(report) => {
                guard.finish(RefreshState::Idle);
                let s = &report.stats;
                info!(
                    "Refreshed catalog {}: {} templates, {} versions added, {} updated, {} removed, {} templates removed",
                    key,
                    s.templates,
                    s.versions_added,
                    s.versions_updated,
                    s.versions_removed,
                    s.templates_removed
                );
                Ok(RefreshOutcome::Completed(report))
            }
            Err(e) => {
                guard.finish(RefreshState::Failed);
                error!("Failed to refresh catalog {}: {}", key, e);
                Err(e)
            }
        }
    }

    /// One pass over every catalog, one after another.
    pub fn refresh_all(&self) -> Result<Vec<CatalogRefresh>> {
        let catalogs = self.store.list_catalogs()?;
        Ok(catalogs
            .iter()
            .map(|catalog| CatalogRefresh {
                catalog: catalog.key(),
                result: self.refresh_catalog(catalog),
            })
            .collect())
    }

    async fn refresh_in_background(self: &Arc<Self>, catalogs: Vec<Catalog>) -> Vec<CatalogRefresh> {
        let handles: Vec<_> = catalogs
            .into_iter()
            .map(|catalog| {
                let coordinator = Arc::clone(self);
                let key = catalog.key();
                let handle =
                    tokio::task::spawn_blocking(move || coordinator.refresh_catalog(&catalog));
                (key, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(Error::Internal(format!("refresh task failed: {e}"))));
            results.push(CatalogRefresh {
                catalog: key,
                result,
            });
        }
        results
    }

    /// Runs a store call on the blocking pool.
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Store) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .unwrap_or_else(|e| Err(Error::Internal(format!("store task failed: {e}"))))
    }

    /// Launches a refresh of every catalog in parallel and waits for all of them.
    pub async fn tick(self: &Arc<Self>) -> Result<Vec<CatalogRefresh>> {
        let catalogs = self.with_store(|store| store.list_catalogs()).await?;
        Ok(self.refresh_in_background(catalogs).await)
    }

    /// Administrative trigger: refreshes every catalog with this name.
    pub async fn refresh_now(self: &Arc<Self>, name: &str) -> Result<Vec<CatalogRefresh>> {
        let name = name.to_string();
        let catalogs = self
            .with_store(move |store| store.list_catalogs_by_name(&name))
            .await?;
        if catalogs.is_empty() {
            return Err(Error::NotFound);
        }
        Ok(self.refresh_in_background(catalogs).await)
    }

    /// Deletes a catalog with everything it owns. A catalog that is being
    /// refreshed cannot be removed.
    pub fn remove_catalog(&self, key: &CatalogKey) -> Result<()> {
        let catalog = self.store.get_catalog_by_key(key)?.ok_or(Error::NotFound)?;
        let Some(guard) = RefreshGuard::try_begin(&self.states, key) else {
            return Err(Error::Conflict(format!("catalog {key} is refreshing")));
        };

        self.store.delete_catalog(catalog.id)?;
        guard.finish(RefreshState::Idle);
        lock_states(&self.states).remove(key);
        info!("Removed catalog {}", key);
        Ok(())
    }

    /// Registers configured catalogs and runs the initial pass.
    ///
    /// With `validate_only` any failure, including a single unparseable
    /// version, is returned as an error.
    pub fn startup(&self, validate_only: bool) -> Result<Vec<CatalogRefresh>> {
        self.create_config_catalogs()
            .map_err(|e| Error::Config(format!("failed to create catalogs from config: {e}")))?;

        let results = self.refresh_all()?;
        if !validate_only {
            return Ok(results);
        }

        let mut problems = Vec::new();
        for refresh in &results {
            match &refresh.result {
                Ok(RefreshOutcome::Completed(report)) => {
                    problems.extend(report.failures.iter().map(|f| {
                        format!("{}: {}: {}", refresh.catalog, f.folder, f.reason)
                    }));
                }
                Ok(RefreshOutcome::Skipped) => {}
                Err(e) => problems.push(format!("{}: {e}", refresh.catalog)),
            }
        }

        if problems.is_empty() {
            Ok(results)
        } else {
            Err(Error::Validation(problems.join("; ")))
        }
    }

    /// Launches a tick every `interval` until the task is dropped. The first
    /// tick fires one interval from now since [`startup`](Self::startup)
    /// already covered the initial pass.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            let coordinator = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = coordinator.tick().await {
                    error!("Failed to list catalogs for refresh: {}", e);
                }
            });
        }
    }
}
