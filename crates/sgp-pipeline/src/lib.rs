// Library root: re-exports all modules so integration tests and the binary
// can reach the pipeline's public API.

pub mod config;
pub mod db;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod snapshot;
pub mod valuation;
