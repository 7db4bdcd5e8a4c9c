mod errors;
mod service;

pub use errors::Error;
pub use service::{Conclusion, Interrupt, Outcome, Service, ServiceBuilder};
