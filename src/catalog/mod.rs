pub mod coordinator;
pub mod parser;
pub mod query;
pub mod resolver;
pub mod source;

pub use coordinator::{
    CatalogRefresh, RefreshCoordinator, RefreshOutcome, RefreshReport, RefreshState,
};
pub use parser::{ParseFailure, ParsedCatalog, parse_catalog};
pub use query::QueryFacade;
pub use resolver::{CatalogPlan, PlanStats, resolve};
pub use source::{GitSourceProvider, SourceProvider};
