//! # Database Layer
//!
//! Connection pool construction and embedded schema migrations.

pub mod connection;
pub mod migrations;

pub use connection::establish_pool;
pub use migrations::run_migrations;
