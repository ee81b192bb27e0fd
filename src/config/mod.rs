mod catalogs;
mod server;

pub use catalogs::{CatalogConfig, validate_catalog, validate_catalogs};
pub use server::ServiceConfig;
