//! Command Routing
//!
//! Maps a raw protocol line to its handler.

use tracing::warn;

use crate::api::handlers::{delete_handler, get_handler, set_handler, stats_handler, AppState};
use crate::error::Result;
use crate::models::{Request, Response};

/// Parses and executes one command line, always producing a reply.
///
/// Parse and routing failures become [`Response::Error`].
pub fn route(state: &AppState, line: &str) -> Response {
    match Request::parse(line).and_then(|request| dispatch(state, request)) {
        Ok(response) => response,
        Err(err) => {
            warn!("Rejected command {:?}: {}", line, err);
            Response::from(err)
        }
    }
}

/// Executes an already parsed request.
pub fn dispatch(state: &AppState, request: Request) -> Result<Response> {
    match request {
        Request::Get {
            key,
            frequent_access,
        } => get_handler(state, &key, frequent_access),
        Request::Set {
            key,
            value,
            expires_in,
            frequent_access,
        } => set_handler(state, key, value, expires_in, frequent_access),
        Request::Delete {
            key,
            frequent_access,
        } => delete_handler(state, &key, frequent_access),
        Request::Stats { frequent_access } => stats_handler(state, frequent_access),
        Request::Ping => Ok(Response::Pong),
    }
}
