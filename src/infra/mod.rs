//! Infrastructure adapters and runtime bootstrap.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod telemetry;
pub mod writer;
