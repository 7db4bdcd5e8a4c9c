mod errors;
mod repository;

#[cfg(test)]
pub mod queries;
#[cfg(not(test))]
mod queries;

pub use errors::Error;
pub use queries::{Manifest, MemberKey};
pub use repository::{Checkpoint, Repository};
