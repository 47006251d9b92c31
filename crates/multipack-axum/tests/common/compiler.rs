//! Bundler stand-in that "builds" instantly from an in-memory file set.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use multipack_core::{AssetSummary, Compiler, CompilerError, CompilerEvent, Target};
use tokio::sync::mpsc;

pub const BUNDLE: &str = "__d(function render() {});\n";

pub const BUNDLE_MAP: &str = r#"{
    "version": 3,
    "sources": ["src/App.js"],
    "sourcesContent": ["import React from 'react';\nconst App = () => null;\nexport default App;\n"],
    "names": ["render"],
    "mappings": "AAAAA;AACA"
}"#;

#[derive(Debug, Default)]
pub struct FakeCompiler {
    files: HashMap<String, Bytes>,
    // Keeps the event streams open for the lifetime of the compiler.
    senders: Mutex<Vec<mpsc::UnboundedSender<CompilerEvent>>>,
}

impl FakeCompiler {
    /// `index.bundle`, its source map and the per-target bundles.
    pub fn with_bundle() -> Self {
        let mut files = HashMap::new();
        for name in ["index.bundle", "index.ios.bundle", "index.android.bundle"] {
            files.insert(name.to_string(), Bytes::from_static(BUNDLE.as_bytes()));
        }
        files.insert(
            "index.bundle.map".to_string(),
            Bytes::from_static(BUNDLE_MAP.as_bytes()),
        );
        Self {
            files,
            senders: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Compiler for FakeCompiler {
    async fn watch(
        &self,
        _target: &Target,
    ) -> Result<mpsc::UnboundedReceiver<CompilerEvent>, CompilerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let assets = self
            .files
            .iter()
            .map(|(name, bytes)| AssetSummary {
                name: name.clone(),
                size: bytes.len() as u64,
            })
            .collect();
        for event in [
            CompilerEvent::WatchRun,
            CompilerEvent::Compile,
            CompilerEvent::Done {
                hash: "abc123".into(),
                time: 7,
                warnings: vec![],
                errors: vec![],
                assets,
            },
        ] {
            let _ = tx.send(event);
        }
        self.senders.lock().unwrap().push(tx);
        Ok(rx)
    }

    async fn read_asset(&self, _target: &Target, name: &str) -> Result<Option<Bytes>, CompilerError> {
        Ok(self.files.get(name).cloned())
    }

    async fn stop(&self) {
        self.senders.lock().unwrap().clear();
    }
}
