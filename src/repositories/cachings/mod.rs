mod errors;
mod queries;
mod repository;

pub use errors::Error;
pub use queries::{format_caching, parse_caching};
pub use repository::Repository;
