//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Janitor: Removes expired cache entries at configured intervals

mod janitor;

pub use janitor::{Janitor, MIN_JANITOR_INTERVAL};
