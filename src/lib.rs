// Library root — exposes internals for integration tests.
// The binary entry point is src/main.rs.

pub mod config;
pub mod error;
pub mod gateway;
pub mod knowledge;
pub mod logger;
pub mod subsystems;
