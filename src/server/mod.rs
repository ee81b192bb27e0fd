mod catalogs;
pub mod dto;
pub mod response;
mod router;
mod versions;

pub use router::{AppState, create_router};
