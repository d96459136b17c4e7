//! # dbpulse application layer
//!
//! Command handlers and dependency wiring over the transaction core.
//!
//! This crate contains:
//! - Commands (request → core bridge): transaction execution and health
//! - Application context (dependency injection)
//! - Logging helpers
//!
//! ## Architecture
//! - Depends on `dbpulse-common` for all database-facing behavior
//! - Commands are framework-agnostic async functions; the surrounding
//!   routing layer maps them onto endpoints

pub mod commands;
pub mod context;
pub mod utils;

pub use commands::*;
pub use context::*;
