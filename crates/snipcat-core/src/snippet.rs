//! Snippet extraction from markdown sources.

use crate::error::{CatalogError, Result};
use crate::markdown::{self, MarkdownDoc};
use crate::paths::validate_slug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_SCHEMA_VERSION: &str = "1";

const SLUG_KEYS: &[&str] = &["slug"];
const SCOPE_KEYS: &[&str] = &["scope", "role"];
const SCHEMA_KEYS: &[&str] = &["schema_version", "schema"];

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Context,
    Batch,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Context => "context",
            Scope::Batch => "batch",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "global" | "instruction" => Ok(Scope::Global),
            "context" => Ok(Scope::Context),
            "batch" => Ok(Scope::Batch),
            other => Err(format!("unknown scope '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Snippet
// ---------------------------------------------------------------------------

/// Fields pulled from one snippet source, already cross-checked against the
/// slug the scanner assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    pub slug: String,
    pub path: PathBuf,
    pub body: String,
    pub scope: Scope,
    /// Front-matter schema version, if the file declares one.
    pub schema_version: Option<String>,
}

impl Snippet {
    pub fn extract(path: &Path, slug: &str) -> Result<Self> {
        let doc = MarkdownDoc::read(path)?;
        Self::from_doc(path, slug, &doc)
    }

    fn from_doc(path: &Path, slug: &str, doc: &MarkdownDoc) -> Result<Self> {
        let invalid = |reason: String| CatalogError::InvalidSnippet {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(fm_slug) = doc.field(SLUG_KEYS).filter(|v| markdown::is_truthy(v)) {
            if fm_slug.as_str() != Some(slug) {
                return Err(CatalogError::SlugMismatch {
                    path: path.to_path_buf(),
                    expected: slug.to_string(),
                    found: markdown::render(fm_slug),
                });
            }
        }
        validate_slug(slug)?;

        // `scope`, then `role`, then the default; falsy values fall through.
        let declared = SCOPE_KEYS
            .iter()
            .filter_map(|k| doc.front_matter.get(*k))
            .find(|v| markdown::is_truthy(v));
        let scope = match declared {
            None => Scope::Global,
            Some(value) => match value.as_str() {
                Some(s) => s.parse().map_err(invalid)?,
                None => {
                    return Err(invalid(format!(
                        "invalid scope {}",
                        markdown::render(value)
                    )))
                }
            },
        };

        let schema_version = match doc.field(SCHEMA_KEYS) {
            None => None,
            Some(value) => Some(coerce_schema_version(&yaml_to_json(value)).map_err(invalid)?),
        };

        if doc.body.trim().is_empty() {
            return Err(invalid("instruction body is empty".to_string()));
        }

        Ok(Self {
            slug: slug.to_string(),
            path: path.to_path_buf(),
            body: doc.body.clone(),
            scope,
            schema_version,
        })
    }
}

fn yaml_to_json(value: &serde_yaml::Value) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Schema version
// ---------------------------------------------------------------------------

/// Accept a string or number as a schema version; booleans and structures
/// are rejected, as is anything blank.
pub fn coerce_schema_version(value: &Value) -> std::result::Result<String, String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err("schema_version must be a string".to_string()),
    };
    if text.is_empty() {
        return Err("schema_version must be non-empty".to_string());
    }
    Ok(text)
}

/// Front matter beats the record, the record beats the default. A
/// disagreement between front matter and record is logged, not fatal.
pub fn select_schema_version(
    front_matter: Option<&str>,
    record: Option<&str>,
    default: &str,
    path: &Path,
) -> String {
    if let (Some(fm), Some(rec)) = (front_matter, record) {
        if fm != rec {
            tracing::warn!(
                path = %path.display(),
                front_matter = fm,
                record = rec,
                "schema_version mismatch; using front matter"
            );
        }
    }
    front_matter
        .or(record)
        .unwrap_or(default)
        .to_string()
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Lowercase hex SHA-256 of the raw bytes at `path`.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex(&hasher.finalize()))
}

pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex(&Sha256::digest(bytes))
}

fn hex(digest: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}
