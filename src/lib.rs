//! # catalogd
//!
//! Keeps template catalogs in sync with their git sources and serves their
//! versions per environment. Usable as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use catalogd::catalog::{GitSourceProvider, QueryFacade, RefreshCoordinator};
//! use catalogd::config::ServiceConfig;
//! use catalogd::store::{SqliteStore, Store};
//!
//! let config = ServiceConfig::load("catalogd.toml".as_ref()).unwrap();
//! let store: Arc<dyn Store> = Arc::new(SqliteStore::new(config.db_path()).unwrap());
//! store.initialize().unwrap();
//!
//! let coordinator = Arc::new(RefreshCoordinator::new(
//!     Arc::clone(&store),
//!     Arc::new(GitSourceProvider::new(&config.cache_dir)),
//!     config.catalogs.clone(),
//! ));
//! coordinator.startup(false).unwrap();
//!
//! let versions = QueryFacade::new(store).list_versions("1a5", "library", "mysql").unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): builds the `catalogd` binary.

pub mod catalog;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
