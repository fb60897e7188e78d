//! Cacher - A lightweight in-memory key/value server
//!
//! Provides Redis-like get/set/delete over a line-oriented TCP protocol, with
//! per-key expiration tracked in time buckets and swept by background janitors.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheManager};
pub use config::Config;
pub use error::{CacheError, Result};
pub use server::serve;
pub use tasks::Janitor;
