//! Candidate records exchanged between check, classify and emit.

use crate::error::{CatalogError, Result};
use crate::ndjson::Record;
use crate::paths::is_valid_slug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::UNIX_EPOCH;

pub const FIELD_SLUG: &str = "slug";
pub const FIELD_PATH: &str = "path";
pub const FIELD_MTIME: &str = "mtime";
pub const FIELD_SIZE: &str = "size";
pub const FIELD_DECISION: &str = "decision";
pub const FIELD_LAST_HASH: &str = "last_hash";
pub const FIELD_SCHEMA_VERSION: &str = "schema_version";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Uploadable,
    Ambiguous,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Uploadable => f.write_str("uploadable"),
            Decision::Ambiguous => f.write_str("ambiguous"),
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uploadable" => Ok(Decision::Uploadable),
            "ambiguous" => Ok(Decision::Ambiguous),
            other => Err(format!("unknown candidate decision: {other}")),
        }
    }
}

/// One snippet file the scanner found, plus whatever earlier stages attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub slug: String,
    pub path: PathBuf,
    pub mtime: f64,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_hash: Option<String>,
}

impl CandidateRecord {
    /// Stat `path` and build an undecided candidate for it.
    pub fn from_path(slug: &str, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CatalogError::FileVanished(path.to_path_buf()));
        }
        let (mtime, size) = stat(path)?;
        Ok(Self {
            slug: slug.to_string(),
            path: path.to_path_buf(),
            mtime,
            size,
            decision: None,
            last_hash: None,
        })
    }

    /// Validate the shape of a raw NDJSON record. `line` is only used in
    /// error messages.
    pub fn from_record(record: &Record, line: usize) -> Result<Self> {
        let bad = |reason: String| CatalogError::InvalidCandidate { line, reason };

        let slug = match record.get(FIELD_SLUG).and_then(Value::as_str).map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return Err(bad("candidate slug must be a non-empty string".into())),
        };
        if !is_valid_slug(slug) {
            return Err(bad(format!("invalid slug '{slug}'")));
        }

        let path = match record.get(FIELD_PATH).and_then(Value::as_str) {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => return Err(bad("candidate path must be a non-empty string".into())),
        };

        let mtime = non_negative(record.get(FIELD_MTIME))
            .ok_or_else(|| bad("candidate mtime must be a non-negative number".into()))?;
        let size = non_negative(record.get(FIELD_SIZE))
            .ok_or_else(|| bad("candidate size must be a non-negative number".into()))?;

        let decision = match record.get(FIELD_DECISION) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.parse::<Decision>().map_err(bad)?),
            Some(_) => return Err(bad("candidate decision must be a non-empty string".into())),
        };

        let last_hash = match record.get(FIELD_LAST_HASH) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(_) => return Err(bad("last_hash must be a non-empty string".into())),
        };

        Ok(Self {
            slug: slug.to_string(),
            path,
            mtime,
            size: size as u64,
            decision,
            last_hash,
        })
    }
}

fn non_negative(value: Option<&Value>) -> Option<f64> {
    // serde_json keeps booleans apart from numbers, so `true` never passes.
    let n = value?.as_f64()?;
    (n.is_finite() && n >= 0.0).then_some(n)
}

/// Modification time (fractional epoch seconds) and size of `path`.
pub fn stat(path: &Path) -> Result<(f64, u64)> {
    let meta = std::fs::metadata(path)?;
    let mtime = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok((mtime, meta.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn parses_full_candidate() {
        let c = CandidateRecord::from_record(
            &record(json!({
                "slug": " a1 ",
                "path": "a.md",
                "mtime": 1.5,
                "size": 10,
                "decision": "AMBIGUOUS",
                "last_hash": "abc"
            })),
            1,
        )
        .unwrap();
        assert_eq!(c.slug, "a1");
        assert_eq!(c.size, 10);
        assert_eq!(c.decision, Some(Decision::Ambiguous));
        assert_eq!(c.last_hash.as_deref(), Some("abc"));
    }

    #[test]
    fn rejects_bad_shapes() {
        let cases = [
            json!({"path": "a.md", "mtime": 1, "size": 1}),
            json!({"slug": "Bad Slug", "path": "a.md", "mtime": 1, "size": 1}),
            json!({"slug": "a1", "path": " ", "mtime": 1, "size": 1}),
            json!({"slug": "a1", "path": "a.md", "mtime": true, "size": 1}),
            json!({"slug": "a1", "path": "a.md", "mtime": 1, "size": -1}),
            json!({"slug": "a1", "path": "a.md", "mtime": 1, "size": "1"}),
            json!({"slug": "a1", "path": "a.md", "mtime": 1, "size": 1, "decision": "maybe"}),
            json!({"slug": "a1", "path": "a.md", "mtime": 1, "size": 1, "decision": 3}),
            json!({"slug": "a1", "path": "a.md", "mtime": 1, "size": 1, "last_hash": ""}),
        ];
        for case in cases {
            let err = CandidateRecord::from_record(&record(case.clone()), 7).unwrap_err();
            match err {
                CatalogError::InvalidCandidate { line, .. } => assert_eq!(line, 7),
                other => panic!("expected InvalidCandidate for {case}, got {other:?}"),
            }
        }
    }

    #[test]
    fn from_path_reports_vanished_file() {
        let dir = TempDir::new().unwrap();
        let err = CandidateRecord::from_path("a1", &dir.path().join("gone.md")).unwrap_err();
        assert!(matches!(err, CatalogError::FileVanished(_)));
    }

    #[test]
    fn from_path_stats_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "12345").unwrap();
        let c = CandidateRecord::from_path("a1", &path).unwrap();
        assert_eq!(c.size, 5);
        assert!(c.mtime > 0.0);
        assert_eq!(c.decision, None);
    }

    #[test]
    fn serializes_without_empty_options() {
        let c = CandidateRecord {
            slug: "a1".into(),
            path: PathBuf::from("a.md"),
            mtime: 1.0,
            size: 1,
            decision: None,
            last_hash: None,
        };
        let v = serde_json::to_value(&c).unwrap();
        assert!(v.get("decision").is_none());
        assert!(v.get("last_hash").is_none());
    }
}
