//! Stack symbolication.
//!
//! Maps generated-code frames back to original sources using the target's
//! source maps. Resolution is per frame and best effort: a frame without a
//! usable source map comes back unchanged.

mod code_frame;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use multipack_core::target::asset_name;
use multipack_core::{
    BuildBackend, StackFrame, SymbolicateResponse, SymbolicationError, Target, TargetResolver,
};
use regex::Regex;
use sourcemap::SourceMap;
use tracing::debug;

pub use code_frame::render_code_frame;

/// Frames inside bundler runtime or bootstrap code.
const RUNTIME_FRAME_PATTERN: &str =
    r"webpack[/\\](runtime|bootstrap)|\(webpack\)[/\\]|__webpack_require__";

static RUNTIME_FRAMES: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(RUNTIME_FRAME_PATTERN).ok());

/// Whether `file` points into generated runtime machinery.
pub fn is_runtime_frame(file: &str) -> bool {
    RUNTIME_FRAMES.as_ref().is_some_and(|re| re.is_match(file))
}

/// Resolves stack frames against per-target source maps.
pub struct Symbolicator {
    backend: Arc<dyn BuildBackend>,
    resolver: TargetResolver,
}

impl std::fmt::Debug for Symbolicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Symbolicator")
            .field("targets", &self.resolver.targets())
            .finish_non_exhaustive()
    }
}

impl Symbolicator {
    pub fn new(backend: Arc<dyn BuildBackend>, resolver: TargetResolver) -> Self {
        Self { backend, resolver }
    }

    /// Target named by the first frame whose file URL resolves to one.
    pub fn infer_target(&self, stack: &[StackFrame]) -> Option<Target> {
        stack
            .iter()
            .filter_map(|frame| frame.file.as_deref())
            .find_map(|file| self.resolver.resolve_url(file))
    }

    /// Infer the target from `stack` and resolve every frame.
    pub async fn symbolicate(
        &self,
        stack: Vec<StackFrame>,
    ) -> Result<SymbolicateResponse, SymbolicationError> {
        let target = self
            .infer_target(&stack)
            .ok_or(SymbolicationError::UnknownTarget)?;
        Ok(self.symbolicate_for(&target, stack).await)
    }

    /// Resolve every frame of `stack` against `target`'s source maps.
    pub async fn symbolicate_for(&self, target: &Target, stack: Vec<StackFrame>) -> SymbolicateResponse {
        let raw_maps = self.fetch_maps(target, &stack).await;

        let maps: HashMap<String, SourceMap> = raw_maps
            .into_iter()
            .filter_map(|(name, bytes)| match SourceMap::from_slice(&bytes) {
                Ok(map) => Some((name, map)),
                Err(e) => {
                    debug!(target = %target, asset = %name, error = %e, "Unparseable source map");
                    None
                }
            })
            .collect();

        let mut code_frame = None;
        let stack = stack
            .into_iter()
            .map(|frame| {
                let resolved = self.resolve_frame(&maps, &frame);
                let mut out = resolved.as_ref().map_or_else(|| frame.clone(), |r| r.frame.clone());
                out.collapse = out
                    .file
                    .as_deref()
                    .is_some_and(is_runtime_frame);

                if code_frame.is_none() && !out.collapse {
                    code_frame = resolved.and_then(|r| r.code_frame);
                }
                out
            })
            .collect();

        SymbolicateResponse { stack, code_frame }
    }

    async fn fetch_maps(&self, target: &Target, stack: &[StackFrame]) -> HashMap<String, Bytes> {
        let mut names: Vec<String> = stack
            .iter()
            .filter_map(|frame| frame.file.as_deref())
            .filter_map(asset_name)
            .collect();
        names.sort();
        names.dedup();

        let mut maps = HashMap::new();
        for name in names {
            match self.backend.get_source_map(target, &name).await {
                Ok(Some(bytes)) => {
                    maps.insert(name, bytes);
                }
                Ok(None) => debug!(target = %target, asset = %name, "No source map"),
                Err(e) => debug!(target = %target, asset = %name, error = %e, "Source map unavailable"),
            }
        }
        maps
    }

    fn resolve_frame(&self, maps: &HashMap<String, SourceMap>, frame: &StackFrame) -> Option<Resolved> {
        let name = asset_name(frame.file.as_deref()?)?;
        let map = maps.get(&name)?;
        let line = frame.line_number?.checked_sub(1)?;
        let column = frame.column.unwrap_or(0);

        // Lookup falls back to earlier lines; a line without mappings stays unresolved.
        let token = map
            .lookup_token(line, column)
            .filter(|token| token.get_dst_line() == line)?;
        let source = token.get_source()?;
        let src_line = token.get_src_line();
        let src_col = token.get_src_col();

        let resolved = StackFrame {
            file: Some(source.to_string()),
            line_number: Some(src_line + 1),
            column: Some(src_col),
            method_name: token
                .get_name()
                .map(str::to_string)
                .or_else(|| frame.method_name.clone()),
            collapse: false,
        };
        let code_frame = map
            .get_source_contents(token.get_src_id())
            .and_then(|contents| render_code_frame(source, contents, src_line + 1, src_col));

        Some(Resolved {
            frame: resolved,
            code_frame,
        })
    }
}

struct Resolved {
    frame: StackFrame,
    code_frame: Option<multipack_core::CodeFrame>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use multipack_core::{Asset, BackendError, BuildState};

    const INDEX_MAP: &str = r#"{
        "version": 3,
        "sources": ["src/App.js"],
        "sourcesContent": ["import React from 'react';\nconst App = () => null;\nexport default App;\n"],
        "names": ["render"],
        "mappings": "AAAAA;AACA"
    }"#;

    #[derive(Debug, Default)]
    struct MapBackend {
        maps: HashMap<String, Bytes>,
    }

    #[async_trait]
    impl BuildBackend for MapBackend {
        fn targets(&self) -> Vec<Target> {
            vec![Target::new("ios").unwrap()]
        }

        async fn get_asset(&self, target: &Target, name: &str) -> Result<Asset, BackendError> {
            Err(BackendError::AssetNotFound {
                target: target.clone(),
                name: name.to_string(),
            })
        }

        async fn get_source_map(
            &self,
            _target: &Target,
            name: &str,
        ) -> Result<Option<Bytes>, BackendError> {
            Ok(self.maps.get(name).cloned())
        }

        async fn get_build_state(&self, target: &Target) -> Result<BuildState, BackendError> {
            Ok(BuildState::idle(target.clone()))
        }

        async fn shutdown(&self) {}
    }

    fn symbolicator() -> Symbolicator {
        let mut backend = MapBackend::default();
        backend
            .maps
            .insert("index.ios.bundle".into(), Bytes::from_static(INDEX_MAP.as_bytes()));
        backend
            .maps
            .insert("broken.ios.bundle".into(), Bytes::from_static(b"not json"));
        Symbolicator::new(
            Arc::new(backend),
            TargetResolver::new(vec![
                Target::new("ios").unwrap(),
                Target::new("android").unwrap(),
            ]),
        )
    }

    const BUNDLE: &str = "http://localhost:8081/index.ios.bundle?platform=ios&dev=true";

    #[tokio::test]
    async fn test_partial_resolution_keeps_every_frame() {
        let stack = vec![
            StackFrame::new(BUNDLE, 1, 0, "a"),
            StackFrame::new(BUNDLE, 2, 0, "b"),
            StackFrame::new("http://localhost:8081/other.ios.bundle", 7, 3, "c"),
        ];

        let response = symbolicator().symbolicate(stack.clone()).await.unwrap();
        assert_eq!(response.stack.len(), 3);

        assert_eq!(response.stack[0].file.as_deref(), Some("src/App.js"));
        assert_eq!(response.stack[0].line_number, Some(1));
        assert_eq!(response.stack[0].method_name.as_deref(), Some("render"));

        assert_eq!(response.stack[1].line_number, Some(2));
        assert_eq!(response.stack[1].method_name.as_deref(), Some("b"));

        assert_eq!(response.stack[2], stack[2]);
    }

    #[tokio::test]
    async fn test_code_frame_from_first_resolved_frame() {
        let stack = vec![StackFrame::new(BUNDLE, 2, 0, "b")];
        let response = symbolicator().symbolicate(stack).await.unwrap();
        let frame = response.code_frame.unwrap();
        assert_eq!(frame.file_name, "src/App.js");
        assert_eq!(frame.line, 2);
        assert!(frame.content.contains("> 2 | const App = () => null;"));
    }

    #[tokio::test]
    async fn test_unknown_target_is_error() {
        let stack = vec![StackFrame::new("http://localhost:8081/index.bundle", 1, 0, "a")];
        assert!(matches!(
            symbolicator().symbolicate(stack).await,
            Err(SymbolicationError::UnknownTarget)
        ));
    }

    #[tokio::test]
    async fn test_broken_map_leaves_frame_unchanged() {
        let frame = StackFrame::new("http://localhost:8081/broken.ios.bundle", 1, 0, "x");
        let response = symbolicator().symbolicate(vec![frame.clone()]).await.unwrap();
        assert_eq!(response.stack, vec![frame]);
        assert!(response.code_frame.is_none());
    }

    #[tokio::test]
    async fn test_frame_past_mapped_lines_left_unchanged() {
        let frame = StackFrame::new(BUNDLE, 50, 0, "x");
        let response = symbolicator().symbolicate(vec![frame.clone()]).await.unwrap();
        assert_eq!(response.stack, vec![frame]);
        assert!(response.code_frame.is_none());
    }

    #[tokio::test]
    async fn test_native_frames_pass_through() {
        let native = StackFrame {
            file: None,
            line_number: None,
            column: None,
            method_name: Some("nativeCall".into()),
            collapse: false,
        };
        let stack = vec![StackFrame::new(BUNDLE, 1, 0, "a"), native.clone()];
        let response = symbolicator().symbolicate(stack).await.unwrap();
        assert_eq!(response.stack[1], native);
    }

    #[test]
    fn test_runtime_frames_match_pattern() {
        assert!(is_runtime_frame("webpack/runtime/jsonp chunk loading"));
        assert!(is_runtime_frame("webpack\\bootstrap"));
        assert!(is_runtime_frame("(webpack)/hot/dev-server.js"));
        assert!(!is_runtime_frame("src/App.js"));
    }

    #[tokio::test]
    async fn test_runtime_frames_collapsed() {
        let frame = StackFrame::new("webpack/runtime/load script", 1, 0, "load");
        let response = symbolicator()
            .symbolicate_for(&Target::new("ios").unwrap(), vec![frame])
            .await;
        assert!(response.stack[0].collapse);
    }

    #[test]
    fn test_infer_target_uses_first_matching_frame() {
        let stack = vec![
            StackFrame::new("native", 1, 0, "x"),
            StackFrame::new("http://localhost:8081/index.bundle?platform=android", 1, 0, "y"),
        ];
        assert_eq!(
            symbolicator().infer_target(&stack),
            Some(Target::new("android").unwrap())
        );
    }
}
