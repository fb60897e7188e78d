//! TCP Server Module
//!
//! Accepts connections and serves the line protocol, one task per connection.

use std::future::Future;
use std::sync::Arc;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::api::{route, AppState};
use crate::error::Result;
use crate::models::Response;

/// Longest command line accepted, newline excluded
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Accepts connections on `listener` until `shutdown` resolves.
///
/// At most `max_connections` connections are served at once; further clients
/// wait in the listener backlog until a slot frees up. Connections already
/// being served are left to finish on their own.
///
/// # Arguments
/// * `listener` - Bound listener; dropped when this returns
/// * `state` - Shared cache manager and default TTL
/// * `max_connections` - Concurrent connection cap (treated as at least 1)
/// * `shutdown` - Future whose completion stops the accept loop
///
/// # Returns
/// `Ok(())` once `shutdown` has resolved.
pub async fn serve<F>(
    listener: TcpListener,
    state: AppState,
    max_connections: usize,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let slots = Arc::new(Semaphore::new(max_connections.max(1)));
    tokio::pin!(shutdown);

    loop {
        let permit = tokio::select! {
            _ = &mut shutdown => break,
            permit = Arc::clone(&slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let (stream, addr) = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    continue;
                }
            },
        };

        info!("New connection from {}", addr);
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &state).await {
                error!("[{}] connection error: {}", addr, e);
            }
            debug!("[{}] connection closed", addr);
            drop(permit);
        });
    }

    info!("Stopped accepting connections");
    Ok(())
}

/// Serves one client until it closes its side of the stream.
///
/// Every non-blank line gets exactly one newline-terminated reply. Lines
/// longer than [`MAX_LINE_LENGTH`] are discarded and answered with an error.
pub async fn handle_connection<S>(stream: S, state: &AppState) -> Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        let reply = match read_line(&mut reader, &mut buf).await? {
            ReadLine::Eof => break,
            ReadLine::TooLong => {
                warn!("Rejected line longer than {} bytes", MAX_LINE_LENGTH);
                Response::Error(format!("line exceeds {} bytes", MAX_LINE_LENGTH))
            }
            ReadLine::Line => match std::str::from_utf8(&buf) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    debug!("> {}", line);
                    route(state, line)
                }
                Err(_) => Response::Error("line is not valid UTF-8".to_string()),
            },
        };

        writer.write_all(format!("{}\n", reply).as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

enum ReadLine {
    Eof,
    Line,
    TooLong,
}

// Reads one line into `buf`, never holding more than MAX_LINE_LENGTH + 1
// bytes of it. The tail of an oversized line is consumed and dropped.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<ReadLine>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_LINE_LENGTH as u64 + 1;

    buf.clear();
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(ReadLine::Eof);
    }
    if buf.ends_with(b"\n") || (read as u64) < limit {
        return Ok(ReadLine::Line);
    }

    loop {
        buf.clear();
        let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        if read == 0 || buf.ends_with(b"\n") {
            break;
        }
    }
    buf.clear();
    Ok(ReadLine::TooLong)
}
