//! Async line readers over worker output (non-UTF8-safe).
//!
//! Bundlers and the tools they shell out to can emit non-UTF8 bytes.
//! `BufReader::lines()` would terminate the reader on invalid UTF-8, so lines
//! are read as bytes and decoded lossily.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Read `stream` line by line until EOF, handing each line to `on_line`.
pub fn spawn_line_reader<R, F>(stream: R, label: String, mut on_line: F) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    F: FnMut(String) + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    // Trim trailing newline(s)
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    if buf.is_empty() {
                        continue;
                    }
                    on_line(String::from_utf8_lossy(&buf).into_owned());
                }
                Err(e) => {
                    debug!(%label, error = %e, "Output reader exiting due to read error");
                    break;
                }
            }
        }

        debug!(%label, "Output reader task exiting");
    })
}
