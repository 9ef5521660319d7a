use std::path::Path;

use serde_json::Value;

use crate::error::{Result, ThreadLinkError};

pub fn parse_json_line(path: &Path, line: usize, raw: &str) -> Result<Option<Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    serde_json::from_str::<Value>(trimmed)
        .map(Some)
        .map_err(|source| ThreadLinkError::InvalidJsonLine {
            path: path.to_path_buf(),
            line,
            source,
        })
}

/// Parses every line, turning bad ones into warnings.
///
/// Fails only when not a single line parses.
pub fn parse_json_lines(path: &Path, raw: &str, warnings: &mut Vec<String>) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    let mut first_error = None;

    for (line_idx, line) in raw.lines().enumerate() {
        match parse_json_line(path, line_idx + 1, line) {
            Ok(Some(value)) => values.push(value),
            Ok(None) => {}
            Err(err) => {
                warnings.push(format!("failed to parse line {}: {err}", line_idx + 1));
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) if values.is_empty() => Err(err),
        _ => Ok(values),
    }
}
