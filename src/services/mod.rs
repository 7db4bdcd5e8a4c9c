pub mod batch;
pub mod optimization;
pub mod workers;
