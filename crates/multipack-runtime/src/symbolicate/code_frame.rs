//! Source excerpt around a resolved frame.

use multipack_core::CodeFrame;

/// Lines shown on each side of the error line.
const CONTEXT_LINES: u32 = 2;

/// Render a gutter-numbered excerpt of `contents` around `line` (1-based)
/// with a caret under `column` (0-based).
///
/// ```text
///   1 | import React from 'react';
/// > 2 | const App = () => null;
///     | ^
///   3 | export default App;
/// ```
pub fn render_code_frame(file_name: &str, contents: &str, line: u32, column: u32) -> Option<CodeFrame> {
    let lines: Vec<&str> = contents.lines().collect();
    let index = usize::try_from(line.checked_sub(1)?).ok()?;
    if index >= lines.len() {
        return None;
    }

    let first = line.saturating_sub(CONTEXT_LINES).max(1);
    let last = line
        .saturating_add(CONTEXT_LINES)
        .min(u32::try_from(lines.len()).ok()?);
    let width = last.to_string().len();

    let mut content = Vec::new();
    for number in first..=last {
        let text = lines[usize::try_from(number - 1).ok()?];
        let marker = if number == line { '>' } else { ' ' };
        content.push(format!("{marker} {number:>width$} | {text}"));
        if number == line {
            let pad = " ".repeat(usize::try_from(column).ok()?);
            content.push(format!("  {:>width$} | {pad}^", ""));
        }
    }

    Some(CodeFrame {
        content: content.join("\n"),
        file_name: file_name.to_string(),
        line,
        column,
    })
}
