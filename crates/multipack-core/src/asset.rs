//! Compiled assets served to clients.

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;

/// Streamed asset body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// Asset payload: in memory or streamed from a worker.
pub enum AssetBody {
    Bytes(Bytes),
    Stream(ByteStream),
}

impl fmt::Debug for AssetBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// An asset produced by a backend, addressed by `(target, name)`.
#[derive(Debug)]
pub struct Asset {
    pub name: String,
    pub mime_type: String,
    /// Size in bytes when known up front.
    pub size: Option<u64>,
    pub body: AssetBody,
}

impl Asset {
    /// In-memory asset; the MIME type is guessed from the name.
    pub fn from_bytes(name: impl Into<String>, bytes: Bytes) -> Self {
        let name = name.into();
        Self {
            mime_type: mime_type_for(&name),
            size: Some(bytes.len() as u64),
            body: AssetBody::Bytes(bytes),
            name,
        }
    }
}

/// MIME type for an asset name.
///
/// Bundles and source maps are not known to the MIME database and are mapped
/// explicitly.
pub fn mime_type_for(name: &str) -> String {
    let path = name.split('?').next().unwrap_or(name);
    if path.ends_with(".bundle") {
        return "application/javascript".to_string();
    }
    if path.ends_with(".map") {
        return "application/json".to_string();
    }
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
