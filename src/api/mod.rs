//! API Module
//!
//! Command handlers and routing for the line protocol.
//!
//! # Commands
//! - `GET <key> [-f]` - Retrieve a value by key
//! - `SET <key> <value> [-e <seconds>] [-f]` - Store a key-value pair
//! - `DEL <key> [-f]` - Delete a key
//! - `STATS [-f]` - Get cache statistics
//! - `PING` - Liveness check
//!
//! `-f` routes the command to the frequent-access cache.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{dispatch, route};
