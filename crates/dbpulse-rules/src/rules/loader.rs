//! Rule file discovery and loading.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, error};

use dbpulse_core::errors::{ErrorCode, RuleError};

use super::validator::validate_and_load_rules;

/// Read, parse and validate one rule file.
pub fn load_rule_file(path: &Path) -> Result<Map<String, Value>, RuleError> {
    let content = std::fs::read_to_string(path).map_err(|e| RuleError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let raw: Value = serde_json::from_str(&content).map_err(|e| RuleError::InvalidJson {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(validate_and_load_rules(&raw, &path.display().to_string()))
}

/// `*.json` files directly under `dir`, sorted by file name.
pub fn discover_rule_files(dir: &Path) -> Result<Vec<PathBuf>, RuleError> {
    if !dir.is_dir() {
        return Err(RuleError::Io {
            path: dir.display().to_string(),
            message: "not a directory".to_string(),
        });
    }

    let pattern = dir.join("*.json").display().to_string();
    let paths = glob::glob(&pattern).map_err(|e| RuleError::Pattern {
        pattern: pattern.clone(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Unreadable rule file entry"),
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Load and merge every rule file in `dir`.
///
/// Files merge in file-name order. A later file replaces an entry of the
/// same name but the entry keeps its first position. A file that fails to
/// load is logged and contributes nothing.
pub fn load_rule_dir(dir: &Path) -> Result<Map<String, Value>, RuleError> {
    let mut merged = Map::new();
    for path in discover_rule_files(dir)? {
        match load_rule_file(&path) {
            Ok(entries) => {
                debug!(path = %path.display(), entries = entries.len(), "Loaded rule file");
                for (name, entry) in entries {
                    merged.insert(name, entry);
                }
            }
            Err(e) => error!("{}", e.coded_message()),
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(keyword: &str, level: &str) -> Value {
        json!({
            "metric_keywords": [keyword],
            "rules": [{"expression": "True", "level": level, "score": 1,
                       "reasoning": "r", "recommendations": ["x"]}]
        })
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_rule_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, RuleError::Io { .. }));
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_rule_file(&path),
            Err(RuleError::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_dir_merges_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("20_extra.json"),
            json!({"b": rule("x", "low"), "a": rule("y", "high")}).to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("10_base.json"),
            json!({"a": rule("y", "medium"), "c": rule("z", "low")}).to_string(),
        )
        .unwrap();
        std::fs::write(dir.path().join("30_bad.json"), "[").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let merged = load_rule_dir(dir.path()).unwrap();
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["a", "c", "b"]);
        assert_eq!(merged["a"]["rules"][0]["level"], json!("high"));
    }

    #[test]
    fn test_missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_rule_dir(&dir.path().join("nope")).is_err());
    }
}
