//! Grammar for code-bearing model responses (coder, feature, patcher).
//!
//! ````text
//! ~~~
//! File: `src/main.rs`:
//! ```rust
//! fn main() {}
//! ```
//! ~~~
//! ````
//!
//! The block between the first and last `~~~` is scanned line by line. A line
//! starting with `File: ` opens a record named by its first backtick-quoted
//! token; lines inside triple-backtick fences are that record's body. Names
//! must be relative paths that stay inside the project directory.

use crate::core::project::project_relative_path;
use crate::core::response::Rejection;
use crate::core::types::CodeFile;

const DELIMITER: &str = "~~~";
const FILE_PREFIX: &str = "File: ";
const FENCE: &str = "```";

/// Parse a code-bearing response into ordered file records.
pub fn parse_code_blocks(raw: &str) -> Result<Vec<CodeFile>, Rejection> {
    let text = raw.trim();
    let first = text
        .find(DELIMITER)
        .ok_or_else(|| Rejection::new("missing ~~~ delimiter block"))?;
    let last = text.rfind(DELIMITER).unwrap_or(first);
    if last == first {
        return Err(Rejection::new("unterminated ~~~ delimiter block"));
    }
    let body = text[first + DELIMITER.len()..last].trim();

    let mut files = Vec::new();
    let mut current: Option<String> = None;
    let mut lines: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in body.lines() {
        if line.starts_with(FILE_PREFIX) {
            flush(&mut files, current.take(), &mut lines);
            current = Some(file_name(line)?);
            in_fence = false;
        } else if line.starts_with(FENCE) {
            in_fence = !in_fence;
        } else if in_fence && current.is_some() {
            lines.push(line);
        }
    }
    flush(&mut files, current.take(), &mut lines);

    if files.is_empty() {
        return Err(Rejection::new("delimiter block contains no file records"));
    }
    Ok(files)
}

/// Render records in the grammar accepted by [`parse_code_blocks`].
///
/// Bodies are written verbatim, so a body line starting with triple backticks
/// or `File: ` does not survive a parse of the output.
pub fn render_code_blocks(files: &[CodeFile]) -> String {
    let mut buf = String::from("~~~\n");
    for file in files {
        buf.push_str(&format!("File: `{}`:\n```\n{}\n```\n\n", file.file, file.code));
    }
    buf.push_str("~~~");
    buf
}

fn flush(files: &mut Vec<CodeFile>, name: Option<String>, lines: &mut Vec<&str>) {
    if let Some(file) = name
        && !lines.is_empty()
    {
        files.push(CodeFile {
            file,
            code: lines.join("\n"),
        });
    }
    lines.clear();
}

fn file_name(line: &str) -> Result<String, Rejection> {
    let name = line
        .split('`')
        .nth(1)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Rejection::new(format!("file line without a quoted name: {line:?}")))?;
    project_relative_path(name)?;
    Ok(name.to_string())
}
