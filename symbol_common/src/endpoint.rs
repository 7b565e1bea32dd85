//! Per-exchange endpoint naming and the client side of the one-shot protocol.
//!
//! Every registered exchange is served on its own Unix domain socket at
//! `<socket_dir>/<exchange>.sock`. A client connects, the server writes exactly
//! one JSON object and closes; nothing is ever sent by the client.

use std::io::Read;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SymbolError;
use crate::symbol::Response;

/// File extension of endpoint sockets.
pub const SOCKET_EXTENSION: &str = "sock";
/// Socket directory used when none is configured.
pub const DEFAULT_SOCKET_DIR: &str = "exchange";

/// Endpoint address of `exchange` inside `socket_dir`.
pub fn socket_path(socket_dir: &Path, exchange: &str) -> PathBuf {
    socket_dir.join(format!("{}.{}", exchange, SOCKET_EXTENSION))
}

/// Extracts the exchange key from an endpoint file name like `bitmex.sock`.
pub fn exchange_from_file_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(SOCKET_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .filter(|s| !s.is_empty())
}

/// Connects to an endpoint and reads its single response.
///
/// `read_timeout` bounds how long the read may block; the server holds the
/// connection open while a refresh for that exchange is in flight.
pub fn request(path: &Path, read_timeout: Option<Duration>) -> Result<Response, SymbolError> {
    let mut stream = UnixStream::connect(path)?;
    stream.set_read_timeout(read_timeout)?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf)?;
    if buf.is_empty() {
        return Err(SymbolError::Format(format!(
            "endpoint {} closed without a response",
            path.display()
        )));
    }
    Response::from_json_slice(&buf)
}
