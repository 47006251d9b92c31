//! Stack frames exchanged with the `/symbolicate` endpoint.

use serde::{Deserialize, Serialize};

/// A stack frame, either raw (generated-code coordinates) or resolved
/// (original-source coordinates).
///
/// Lines are 1-based, columns 0-based, matching what JavaScript engines
/// report in stack traces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(default)]
    pub method_name: Option<String>,
    /// Frame points into generated runtime/bootstrap code and may be hidden.
    #[serde(default)]
    pub collapse: bool,
}

impl StackFrame {
    /// Create a frame from generated-code coordinates.
    pub fn new(file: impl Into<String>, line_number: u32, column: u32, method: &str) -> Self {
        Self {
            file: Some(file.into()),
            line_number: Some(line_number),
            column: Some(column),
            method_name: Some(method.to_string()),
            collapse: false,
        }
    }
}

/// Body of `POST /symbolicate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolicateRequest {
    pub stack: Vec<StackFrame>,
}

/// A few lines of original source around the first user frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFrame {
    pub content: String,
    pub file_name: String,
    pub line: u32,
    pub column: u32,
}

/// Response of `POST /symbolicate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolicateResponse {
    pub stack: Vec<StackFrame>,
    pub code_frame: Option<CodeFrame>,
}
