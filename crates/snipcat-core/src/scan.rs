//! Candidate discovery: slug → path mapping plus the check phase built on it.

use crate::candidate::CandidateRecord;
use crate::error::{CatalogError, Result};
use crate::markdown::{self, MarkdownDoc};
use crate::paths::{self, validate_slug};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub type SlugMap = BTreeMap<String, PathBuf>;

pub trait SlugScanner {
    fn map_slugs(&self, root: &Path) -> Result<SlugMap>;
}

// ---------------------------------------------------------------------------
// FrontMatterScanner
// ---------------------------------------------------------------------------

/// Walks markdown files and maps each front-matter `slug` to its file.
///
/// A file whose front matter cannot be read has no slug as far as the scan
/// is concerned; it is logged and skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrontMatterScanner;

impl SlugScanner for FrontMatterScanner {
    fn map_slugs(&self, root: &Path) -> Result<SlugMap> {
        let mut map = SlugMap::new();
        for path in paths::collect_files(root, paths::MARKDOWN_EXTENSIONS)? {
            let doc = match MarkdownDoc::read(&path) {
                Ok(doc) => doc,
                Err(CatalogError::InvalidSnippet { reason, .. }) => {
                    tracing::warn!(path = %path.display(), reason, "unreadable front matter; skipping");
                    continue;
                }
                Err(CatalogError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                    tracing::warn!(path = %path.display(), error = %e, "not UTF-8; skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let slug = match doc.field(&["slug"]) {
                None => continue,
                Some(serde_yaml::Value::String(s)) => s.trim().to_string(),
                Some(other) => {
                    return Err(CatalogError::InvalidSnippet {
                        path,
                        reason: format!("slug must be a string, got {}", markdown::render(other)),
                    })
                }
            };
            if slug.is_empty() {
                continue;
            }
            validate_slug(&slug)?;
            insert_unique(&mut map, slug, path)?;
        }
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// IndexScanner
// ---------------------------------------------------------------------------

/// Reads a prebuilt `{ "slug": "path" }` JSON index instead of walking.
///
/// Relative paths resolve against the index file's directory. The scan root
/// is not consulted beyond the directory check done by [`check`].
#[derive(Debug, Clone)]
pub struct IndexScanner {
    pub index: PathBuf,
}

impl IndexScanner {
    pub fn new(index: impl Into<PathBuf>) -> Self {
        Self {
            index: index.into(),
        }
    }
}

impl SlugScanner for IndexScanner {
    fn map_slugs(&self, _root: &Path) -> Result<SlugMap> {
        let data = std::fs::read_to_string(&self.index)?;
        let Value::Object(entries) = serde_json::from_str::<Value>(&data)? else {
            return Err(CatalogError::InvalidSnippet {
                path: self.index.clone(),
                reason: "instruction index must be a JSON object".to_string(),
            });
        };
        let base = self.index.parent().unwrap_or(Path::new("."));

        let mut map = SlugMap::new();
        for (slug, value) in entries {
            validate_slug(&slug)?;
            let Some(raw) = value.as_str().filter(|s| !s.trim().is_empty()) else {
                return Err(CatalogError::InvalidSnippet {
                    path: self.index.clone(),
                    reason: format!("index entry '{slug}' must map to a path"),
                });
            };
            let path = Path::new(raw);
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                base.join(path)
            };
            insert_unique(&mut map, slug, path)?;
        }
        Ok(map)
    }
}

fn insert_unique(map: &mut SlugMap, slug: String, path: PathBuf) -> Result<()> {
    if let Some(first) = map.get(&slug) {
        return Err(CatalogError::DuplicateSlug {
            slug,
            first: first.clone(),
            second: path,
        });
    }
    map.insert(slug, path);
    Ok(())
}

// ---------------------------------------------------------------------------
// Check phase
// ---------------------------------------------------------------------------

/// Scan `root` and stat every candidate, in slug order.
///
/// A file the scanner reported but that no longer exists is fatal.
pub fn check(root: &Path, scanner: &dyn SlugScanner) -> Result<Vec<CandidateRecord>> {
    if !root.is_dir() {
        return Err(CatalogError::NotADirectory(root.to_path_buf()));
    }
    let root = root.canonicalize()?;
    let map = scanner.map_slugs(&root)?;
    map.iter()
        .map(|(slug, path)| CandidateRecord::from_path(slug, path))
        .collect()
}
