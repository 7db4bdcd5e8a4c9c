mod errors;
mod queries;
mod repository;

pub use errors::Error;
pub use queries::{format_network, parse_network};
pub use repository::Repository;
