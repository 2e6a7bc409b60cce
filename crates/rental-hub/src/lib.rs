pub mod access;
pub mod config;
pub mod error;
pub mod properties;
pub mod telemetry;
