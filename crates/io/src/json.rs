//! JSON reader: a root array of objects, or NDJSON (one object per line).
//!
//! Key order inside each object is preserved end to end, so unknown columns
//! land in the detail bag in source order.

use std::path::Path;

use serde_json::Value;

use claimdock_engine::record::RawRow;

use crate::error::ReadError;

pub fn read_rows(path: &Path, content: &str) -> Result<Vec<RawRow>, ReadError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        read_array(path, trimmed)
    } else {
        // Line numbers must count from the top of the file, so the
        // untrimmed content goes in; blank lines are skipped inside.
        read_ndjson(path, content)
    }
}

fn read_array(path: &Path, content: &str) -> Result<Vec<RawRow>, ReadError> {
    let value: Value = serde_json::from_str(content).map_err(|e| ReadError::JsonRoot {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let items = match value {
        Value::Array(items) => items,
        _ => {
            return Err(ReadError::JsonRoot {
                path: path.to_path_buf(),
                message: "document root must be an array of objects".to_string(),
            })
        }
    };
    let mut rows = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => rows.push(map),
            other => {
                return Err(ReadError::JsonRoot {
                    path: path.to_path_buf(),
                    message: format!("element {idx} is {}, expected an object", kind_of(&other)),
                })
            }
        }
    }
    Ok(rows)
}

fn read_ndjson(path: &Path, content: &str) -> Result<Vec<RawRow>, ReadError> {
    let mut rows = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|e| ReadError::JsonLine {
            path: path.to_path_buf(),
            line: idx + 1,
            message: e.to_string(),
        })?;
        match value {
            Value::Object(map) => rows.push(map),
            other => {
                return Err(ReadError::JsonLine {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    message: format!("{}, expected an object", kind_of(&other)),
                })
            }
        }
    }
    Ok(rows)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
