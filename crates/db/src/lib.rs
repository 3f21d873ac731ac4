//! SQLite persistence for the perfume service: pool construction, embedded
//! migrations, and the repository traits with their SQL and in-memory
//! implementations.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
