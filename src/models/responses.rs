//! Response models for the line protocol
//!
//! Every request produces exactly one reply line.

use std::fmt;

use crate::cache::CacheStats;
use crate::error::CacheError;

/// A reply to one command, rendered on the wire through `Display`.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Write accepted
    Ok,
    Pong,
    /// Value found for a GET
    Value(String),
    /// Key missing or expired
    Nil,
    /// Count of affected keys
    Integer(i64),
    /// Serialized statistics of one cache
    Stats(CacheStats),
    Error(String),
}

impl From<CacheError> for Response {
    fn from(err: CacheError) -> Self {
        Response::Error(err.to_string())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => write!(f, "OK"),
            Response::Pong => write!(f, "PONG"),
            Response::Value(value) => write!(f, "{}", value),
            Response::Nil => write!(f, "(nil)"),
            Response::Integer(n) => write!(f, "(integer) {}", n),
            Response::Stats(stats) => {
                let json = serde_json::to_string(stats).map_err(|_| fmt::Error)?;
                write!(f, "{}", json)
            }
            Response::Error(message) => write!(f, "ERR {}", message),
        }
    }
}
