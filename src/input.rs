//! Handle list parsing for enrich-only runs.
//!
//! Supports:
//! - CSV files with one handle per line or a "username" column (a prior
//!   CSV export feeds straight back in)
//! - JSON files with an array of handle strings, objects with a "username"
//!   field, or an object with a "usernames" array
//! - Invalid entries are skipped, not fatal

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Input format for handle list files
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("csv") => Some(Self::Csv),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse a handle list from a file (auto-detects format from extension).
/// Order is preserved; duplicates are dropped at first occurrence.
pub fn parse_handle_file(path: &Path) -> Result<Vec<String>> {
    let format = InputFormat::from_path(path).context(format!(
        "Cannot determine input format from file extension. Expected .csv or .json: {}",
        path.display()
    ))?;

    let content = fs::read_to_string(path)
        .context(format!("Failed to read input file: {}", path.display()))?;

    let handles = match format {
        InputFormat::Csv => parse_csv_handles(&content)?,
        InputFormat::Json => parse_json_handles(&content)?,
    };

    Ok(dedup_preserving_order(handles))
}

/// Parse handles from CSV content
///
/// Supports two formats:
/// 1. One handle per line (no header)
/// 2. CSV with a "username" column header (our own export format)
pub fn parse_csv_handles(content: &str) -> Result<Vec<String>> {
    let mut handles = Vec::new();
    let lines: Vec<&str> = content.lines().collect();

    if lines.is_empty() {
        return Ok(handles);
    }

    // Check if first line looks like a header
    let first_line = lines[0].to_lowercase();
    let has_header = first_line.contains("username");

    if has_header {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers().context("Failed to read CSV headers")?.clone();

        let username_idx = headers
            .iter()
            .position(|h| h.to_lowercase() == "username")
            .context("CSV must have a 'username' column when using headers")?;

        for result in reader.records() {
            let record = result.context("Failed to parse CSV record")?;

            let handle = record
                .get(username_idx)
                .map(normalize_handle)
                .filter(|s| !s.is_empty());

            if let Some(handle) = handle {
                if is_valid_handle(&handle) {
                    handles.push(handle);
                }
            }
        }
    } else {
        // Parse as simple one-handle-per-line format
        for line in lines {
            // Take the first column when lines are comma-separated
            let raw = line.split(',').next().unwrap_or(line);

            if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
                continue;
            }

            let handle = normalize_handle(raw);
            if is_valid_handle(&handle) {
                handles.push(handle);
            }
        }
    }

    Ok(handles)
}

/// Parse handles from JSON content
///
/// Supports three formats:
/// 1. Array of handle strings: ["alice", "bob"]
/// 2. Array of objects with "username" field (our own JSON export records)
/// 3. Object with "usernames" array: {"usernames": ["alice", "bob"]}
pub fn parse_json_handles(content: &str) -> Result<Vec<String>> {
    let value: serde_json::Value =
        serde_json::from_str(content).context("Failed to parse JSON content")?;

    let handles = match &value {
        serde_json::Value::Array(arr) => parse_json_array(arr),

        serde_json::Value::Object(obj) => {
            if let Some(serde_json::Value::Array(arr)) = obj.get("usernames") {
                parse_json_array(arr)
            } else if let Some(serde_json::Value::Array(arr)) = obj.get("records") {
                // Our own JSON export wraps records under a "records" key
                parse_json_array(arr)
            } else {
                bail!("JSON object must have a 'usernames' or 'records' array field");
            }
        }

        _ => bail!("JSON must be an array of handles or an object with a 'usernames' field"),
    };

    Ok(handles)
}

fn parse_json_array(arr: &[serde_json::Value]) -> Vec<String> {
    let mut handles = Vec::new();

    for item in arr {
        let raw = match item {
            serde_json::Value::String(s) => Some(s.as_str()),
            serde_json::Value::Object(obj) => {
                obj.get("username").or_else(|| obj.get("handle")).and_then(|v| v.as_str())
            }
            _ => None,
        };

        if let Some(raw) = raw {
            let handle = normalize_handle(raw);
            if is_valid_handle(&handle) {
                handles.push(handle);
            }
        }
    }

    handles
}

/// Strip whitespace and an optional leading '@'.
fn normalize_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_string()
}

/// Handle shape: 1-15 word characters.
fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle.len() <= 15
        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn dedup_preserving_order(handles: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    handles.into_iter().filter(|h| seen.insert(h.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============ CSV Parsing Tests ============

    #[test]
    fn test_parse_csv_simple_handles() {
        let content = "alice\nbob\ncharlie_3";
        let result = parse_csv_handles(content).unwrap();
        assert_eq!(result, vec!["alice", "bob", "charlie_3"]);
    }

    #[test]
    fn test_parse_csv_with_header() {
        let content = "Username,Location\nalice,London\nbob,Tokyo";
        let result = parse_csv_handles(content).unwrap();
        assert_eq!(result, vec!["alice", "bob"]);
    }

    #[test]
    fn test_parse_csv_skip_comments_and_empty() {
        let content = "alice\n# list from last week\n\nbob";
        let result = parse_csv_handles(content).unwrap();
        assert_eq!(result, vec!["alice", "bob"]);
    }

    #[test]
    fn test_parse_csv_at_prefix_stripped() {
        let content = "@alice\n@bob";
        let result = parse_csv_handles(content).unwrap();
        assert_eq!(result, vec!["alice", "bob"]);
    }

    #[test]
    fn test_parse_csv_invalid_handles_skipped() {
        let content = "alice\nnot a handle\nwaytoolongforahandle123\nbob";
        let result = parse_csv_handles(content).unwrap();
        assert_eq!(result, vec!["alice", "bob"]);
    }

    // ============ JSON Parsing Tests ============

    #[test]
    fn test_parse_json_string_array() {
        let content = r#"["alice", "bob"]"#;
        let result = parse_json_handles(content).unwrap();
        assert_eq!(result, vec!["alice", "bob"]);
    }

    #[test]
    fn test_parse_json_object_array() {
        let content = r#"[{"username": "alice"}, {"username": "bob", "location": "Tokyo"}]"#;
        let result = parse_json_handles(content).unwrap();
        assert_eq!(result, vec!["alice", "bob"]);
    }

    #[test]
    fn test_parse_json_usernames_field() {
        let content = r#"{"usernames": ["alice", "bob"]}"#;
        let result = parse_json_handles(content).unwrap();
        assert_eq!(result, vec!["alice", "bob"]);
    }

    #[test]
    fn test_parse_json_export_records() {
        let content = r#"{"summary": {}, "records": [{"handle": "alice"}, {"handle": "bob"}]}"#;
        let result = parse_json_handles(content).unwrap();
        assert_eq!(result, vec!["alice", "bob"]);
    }

    #[test]
    fn test_parse_json_skip_invalid() {
        let content = r#"["alice", 123, null, "spaces here", "bob"]"#;
        let result = parse_json_handles(content).unwrap();
        assert_eq!(result, vec!["alice", "bob"]);
    }

    #[test]
    fn test_parse_json_invalid() {
        assert!(parse_json_handles("not valid json").is_err());
        assert!(parse_json_handles(r#""just a string""#).is_err());
    }

    // ============ Shape and Format Tests ============

    #[test]
    fn test_is_valid_handle() {
        assert!(is_valid_handle("alice"));
        assert!(is_valid_handle("a_b_c_123"));
        assert!(is_valid_handle("x"));

        assert!(!is_valid_handle(""));
        assert!(!is_valid_handle("has spaces"));
        assert!(!is_valid_handle("dash-not-allowed"));
        assert!(!is_valid_handle("sixteencharacter"));
    }

    #[test]
    fn test_input_format_detection() {
        assert_eq!(InputFormat::from_path(Path::new("list.csv")), Some(InputFormat::Csv));
        assert_eq!(InputFormat::from_path(Path::new("list.CSV")), Some(InputFormat::Csv));
        assert_eq!(InputFormat::from_path(Path::new("list.json")), Some(InputFormat::Json));
        assert_eq!(InputFormat::from_path(Path::new("list.txt")), None);
        assert_eq!(InputFormat::from_path(Path::new("list")), None);
    }

    #[test]
    fn test_duplicates_dropped_preserving_order() {
        let handles = vec![
            "alice".to_string(),
            "bob".to_string(),
            "alice".to_string(),
            "carol".to_string(),
        ];
        assert_eq!(dedup_preserving_order(handles), vec!["alice", "bob", "carol"]);
    }
}
