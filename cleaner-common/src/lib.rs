pub mod audit;
pub mod error;
pub mod job;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod metrics;
pub mod pgstore;
pub mod sanitize;
pub mod store;
pub mod tables;
