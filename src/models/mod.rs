//! Request and Response models for the line protocol
//!
//! This module defines the typed commands parsed from client lines and the
//! replies written back.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::Request;
pub use responses::Response;
