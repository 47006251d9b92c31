//! Build targets and target inference.
//!
//! A request names its target either explicitly (`?target=ios`, or the
//! legacy `?platform=ios`) or through the filename convention
//! `index.ios.bundle`, where the segment before the extension is the target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigurationError;

/// Query parameters that can carry an explicit target, in priority order.
const TARGET_PARAMS: &[&str] = &["target", "platform"];

/// Base used to parse relative request paths into URLs.
const RELATIVE_BASE: &str = "http://localhost/";

/// A distinct build variant (device/OS family) with its own compiled artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target(String);

impl Target {
    /// Parse and validate a target name.
    ///
    /// Target names are lowercase ASCII identifiers (`[a-z0-9_-]+`).
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
        if valid {
            Ok(Self(name))
        } else {
            Err(ConfigurationError::InvalidTarget(name))
        }
    }

    /// The target name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Target {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Target {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.0
    }
}

/// Resolves request targets against the configured target list.
///
/// Anything that does not name a configured target resolves to `None`,
/// which the gateway reports as a client error.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    targets: Vec<Target>,
}

impl TargetResolver {
    /// Create a resolver recognising only `targets`.
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }

    /// Configured targets.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Look up a configured target by name.
    pub fn recognize(&self, name: &str) -> Option<Target> {
        self.targets.iter().find(|t| t.as_str() == name).cloned()
    }

    /// Resolve a target from an explicit parameter value or a request path.
    ///
    /// The explicit value wins when it names a configured target. Otherwise
    /// the filename suffix of `path` is consulted.
    pub fn resolve(&self, explicit: Option<&str>, path: &str) -> Option<Target> {
        explicit
            .and_then(|name| self.recognize(name))
            .or_else(|| filename_target(path).and_then(|name| self.recognize(name)))
    }

    /// Resolve a target from a full or relative URL such as
    /// `http://localhost:8081/index.bundle?platform=ios&dev=true`.
    pub fn resolve_url(&self, raw: &str) -> Option<Target> {
        let url = parse_url(raw)?;
        let explicit = TARGET_PARAMS.iter().find_map(|param| {
            url.query_pairs()
                .find(|(key, _)| key == param)
                .map(|(_, value)| value.into_owned())
        });
        self.resolve(explicit.as_deref(), url.path())
    }
}

/// Parse a raw request target (absolute or path-only) into a URL.
pub fn parse_url(raw: &str) -> Option<Url> {
    Url::parse(raw)
        .or_else(|_| Url::parse(RELATIVE_BASE).and_then(|base| base.join(raw)))
        .ok()
}

/// Asset name addressed by a URL path, without leading slashes.
///
/// `http://localhost:8081/src/index.bundle?platform=ios` yields `src/index.bundle`.
pub fn asset_name(raw: &str) -> Option<String> {
    let url = parse_url(raw)?;
    let name = url.path().trim_start_matches('/');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Extract the `.<target>.` segment that precedes the extension of a filename.
///
/// A trailing `.map` is ignored so source maps resolve like their bundles:
/// `main.android.bundle.map` yields `android`.
pub fn filename_target(path: &str) -> Option<&str> {
    let file = path.rsplit(['/', '\\']).next()?;
    let file = file.strip_suffix(".map").unwrap_or(file);
    let mut segments = file.rsplit('.');
    let _extension = segments.next()?;
    let candidate = segments.next()?;
    // Require a stem in front of the target segment.
    segments.next()?;
    if candidate.is_empty() {
        None
    } else {
        Some(candidate)
    }
}
