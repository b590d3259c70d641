//! Research-data loading
//!
//! Source material for persona generation comes from a single file or a
//! directory of files (.txt, .md, .json). The loader keeps each record's
//! origin so logs can point back at the file a persona was grounded in.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Source Data
// ─────────────────────────────────────────────────────────────────

/// One unit of source material (one file, or one inline text blob)
#[derive(Debug, Clone)]
pub struct SourceRecord {
    /// Where this record came from, for logging
    pub origin: String,

    /// The text content
    pub text: String,
}

/// Loaded research data, ready for prompt embedding
#[derive(Debug, Clone)]
pub struct SourceData {
    pub records: Vec<SourceRecord>,
}

impl SourceData {
    /// Wrap inline text as a single record
    pub fn from_text(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::DataEmpty);
        }
        Ok(Self {
            records: vec![SourceRecord {
                origin: "<inline>".to_string(),
                text,
            }],
        })
    }

    /// Load from a file or directory path
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::DataNotFound {
                path: path.to_path_buf(),
            });
        }

        let records = if path.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(path)
                .map_err(|e| Error::IoRead {
                    path: path.to_path_buf(),
                    source: e,
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported(p))
                .collect();
            files.sort();

            let mut records = Vec::with_capacity(files.len());
            for file in files {
                records.push(load_file(&file)?);
            }
            records
        } else {
            vec![load_file(path)?]
        };

        if records.iter().all(|r| r.text.trim().is_empty()) {
            return Err(Error::DataEmpty);
        }

        debug!(path = %path.display(), records = records.len(), "Loaded source data");
        Ok(Self { records })
    }

    /// Concatenated source text, truncated to `max_chars` for prompt
    /// embedding. Truncation happens on a char boundary.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let joined = self
            .records
            .iter()
            .map(|r| r.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");
        if joined.chars().count() <= max_chars {
            joined
        } else {
            joined.chars().take(max_chars).collect()
        }
    }

    /// Total characters across all records
    pub fn total_chars(&self) -> usize {
        self.records.iter().map(|r| r.text.chars().count()).sum()
    }
}

fn is_supported(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("txt") | Some("md") | Some("json")
    )
}

fn load_file(path: &Path) -> Result<SourceRecord> {
    let raw = fs::read_to_string(path).map_err(|e| Error::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    // JSON files are flattened to the string values they contain so the
    // prompt sees prose, not syntax
    let text = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        let value: Value = serde_json::from_str(&raw).map_err(|e| Error::DataParse {
            message: format!("{}: {}", path.display(), e),
        })?;
        let mut parts = Vec::new();
        collect_strings(&value, &mut parts);
        parts.join("\n")
    } else {
        raw
    };

    Ok(SourceRecord {
        origin: path.display().to_string(),
        text,
    })
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        Value::Object(map) => {
            for (_, item) in map {
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn test_from_text() {
        let data = SourceData::from_text("interview notes").unwrap();
        assert_eq!(data.records.len(), 1);
        assert_eq!(data.records[0].origin, "<inline>");
    }

    #[test]
    fn test_from_text_empty() {
        assert!(matches!(
            SourceData::from_text("   \n").unwrap_err(),
            Error::DataEmpty
        ));
    }

    #[test]
    fn test_from_path_missing() {
        let err = SourceData::from_path(Path::new("/nonexistent/data.txt")).unwrap_err();
        assert!(matches!(err, Error::DataNotFound { .. }));
    }

    #[test]
    fn test_from_path_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "user said the export flow is confusing").unwrap();

        let data = SourceData::from_path(&path).unwrap();
        assert_eq!(data.records.len(), 1);
        assert!(data.records[0].text.contains("export flow"));
    }

    #[test]
    fn test_from_path_directory_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second").unwrap();
        fs::write(dir.path().join("a.md"), "first").unwrap();
        fs::write(dir.path().join("ignore.csv"), "skipped").unwrap();

        let data = SourceData::from_path(dir.path()).unwrap();
        assert_eq!(data.records.len(), 2);
        assert!(data.records[0].origin.ends_with("a.md"));
        assert!(data.records[1].origin.ends_with("b.txt"));
    }

    #[test]
    fn test_json_flattened_to_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            "{{\"responses\": [{{\"quote\": \"too many clicks\", \"age\": 34}}]}}"
        )
        .unwrap();

        let data = SourceData::from_path(&path).unwrap();
        assert!(data.records[0].text.contains("too many clicks"));
        assert!(!data.records[0].text.contains("34"));
    }

    #[test]
    fn test_json_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            SourceData::from_path(&path).unwrap_err(),
            Error::DataParse { .. }
        ));
    }

    #[test]
    fn test_excerpt_truncates() {
        let data = SourceData::from_text("a".repeat(100)).unwrap();
        assert_eq!(data.excerpt(10).chars().count(), 10);
        assert_eq!(data.excerpt(1000).chars().count(), 100);
    }
}
