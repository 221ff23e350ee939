//! `dbtrack` - instrumented PostgreSQL connection wrappers
//!
//! This library decorates `tokio-postgres` connections with the bookkeeping
//! a connection owner needs: backend-pid tagging, usage timestamps, a
//! bad-connection flag, slow liveness-check logging, and a fixed query
//! timeout on every statement.

#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    missing_docs,
    rust_2018_idioms
)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/// Configuration management for dbtrack
pub mod config;
pub mod connection;
pub mod error;
/// Slow liveness-check classification and logging
pub mod liveness;
pub mod session;
pub mod statement;

pub use config::{Config, DatabaseConfig, TimeoutConfig};
pub use connection::TrackedConnection;
pub use error::{DbTrackError, Result};
pub use liveness::LivenessThresholds;
pub use session::IsolationLevel;
pub use statement::{TrackedCall, TrackedPreparedStatement, TrackedStatement};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
