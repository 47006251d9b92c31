//! Port allocation for worker processes.

use std::io;
use std::net::TcpListener;

use tracing::debug;

/// Let the OS pick a free ephemeral port on `host`.
///
/// The listener is dropped before returning so the worker can bind the port
/// itself. Another process may grab it in between; the worker then fails to
/// bind and exits before readiness, which surfaces as a spawn error.
pub fn allocate_ephemeral_port(host: &str) -> io::Result<u16> {
    let listener = TcpListener::bind((host, 0))?;
    let port = listener.local_addr()?.port();
    debug!(%host, port, "Allocated ephemeral port");
    Ok(port)
}
