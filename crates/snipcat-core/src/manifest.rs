//! Instruction-set manifests.
//!
//! A manifest is a YAML mapping with a `slug` and up to three snippet lists.
//! The lists may be written in one of three shapes:
//!
//! ```yaml
//! # (a) flat list, all global
//! snippets: [greet_user, tone]
//!
//! # (b) sectioned mapping
//! snippets:
//!   global: [greet_user]
//!   batch: [batch_rules]
//!
//! # (c) top-level sections, either spelling
//! global_snippets: [greet_user]
//! context: [customer_ctx]
//! ```
//!
//! Mixing shapes, or spelling one section two ways, is rejected. So is a
//! manifest with no snippets at all. Documents without a `slug` are not
//! instruction sets and are skipped.

use crate::error::{CatalogError, Result};
use crate::markdown::{is_truthy, render};
use crate::paths::{self, is_valid_slug};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const FIELD_SLUG: &str = "slug";
const FIELD_MANIFEST_REF: &str = "manifest_ref";
const FIELD_MANIFEST: &str = "manifest";
const FIELD_SNIPPETS: &str = "snippets";

/// (section name, accepted top-level spellings)
const SECTIONS: [(&str, [&str; 2]); 3] = [
    ("global", ["global_snippets", "global"]),
    ("context", ["context_snippets", "context"]),
    ("batch", ["batch_snippets", "batch"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub slug: String,
    pub manifest_ref: String,
    pub path: PathBuf,
    pub global: Vec<String>,
    pub context: Vec<String>,
    pub batch: Vec<String>,
}

impl ManifestEntry {
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.context.is_empty() && self.batch.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tree loading
// ---------------------------------------------------------------------------

/// Load every instruction-set manifest under `root`, ordered by file path.
///
/// Any invalid manifest, or a slug declared by two files, fails the whole
/// load: callers never see a partial result.
pub fn load_tree(root: &Path) -> Result<Vec<ManifestEntry>> {
    if !root.is_dir() {
        return Err(CatalogError::NotADirectory(root.to_path_buf()));
    }
    let root = root.canonicalize()?;

    let mut files = paths::collect_files(&root, paths::MANIFEST_EXTENSIONS)?
        .into_iter()
        .map(|p| p.canonicalize())
        .collect::<std::io::Result<Vec<_>>>()?;
    files.sort();
    files.dedup();
    if files.is_empty() {
        return Err(CatalogError::NoManifests(root));
    }

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut entries = Vec::new();
    for path in files {
        let Some(entry) = parse_file(&path, &root)? else {
            tracing::debug!(path = %path.display(), "no slug; not an instruction set");
            continue;
        };
        if let Some(first) = seen.get(&entry.slug) {
            return Err(CatalogError::DuplicateSlug {
                slug: entry.slug,
                first: first.clone(),
                second: path,
            });
        }
        seen.insert(entry.slug.clone(), path);
        entries.push(entry);
    }
    Ok(entries)
}

pub fn parse_file(path: &Path, root: &Path) -> Result<Option<ManifestEntry>> {
    let data = std::fs::read_to_string(path)?;
    let doc: Value = serde_yaml::from_str(&data)?;
    parse_document(&doc, path, root)
}

// ---------------------------------------------------------------------------
// Document parsing
// ---------------------------------------------------------------------------

pub fn parse_document(doc: &Value, path: &Path, root: &Path) -> Result<Option<ManifestEntry>> {
    let invalid = |reason: String| CatalogError::InvalidManifest {
        path: path.to_path_buf(),
        reason,
    };

    let Value::Mapping(map) = doc else {
        return Err(invalid("instruction set YAML must be a mapping".to_string()));
    };

    let slug = match map.get(FIELD_SLUG) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if is_valid_slug(s) => s.clone(),
        Some(other) => return Err(invalid(format!("invalid slug {}", describe(other)))),
    };

    let manifest_ref = resolve_manifest_ref(map, path, root).map_err(invalid)?;
    let [global, context, batch] = read_sections(map, path)?;

    let entry = ManifestEntry {
        slug,
        manifest_ref,
        path: path.to_path_buf(),
        global,
        context,
        batch,
    };
    if entry.is_empty() {
        return Err(CatalogError::EmptyInstructionSet(path.to_path_buf()));
    }
    Ok(Some(entry))
}

fn resolve_manifest_ref(map: &Mapping, path: &Path, root: &Path) -> std::result::Result<String, String> {
    let explicit = [FIELD_MANIFEST_REF, FIELD_MANIFEST]
        .iter()
        .filter_map(|k| map.get(*k))
        .find(|v| is_truthy(v));

    let value = match explicit {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => return Err(format!("invalid manifest_ref {}", describe(other))),
        None => match path.strip_prefix(root) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => path.to_string_lossy().into_owned(),
        },
    };
    if value.is_empty() {
        return Err("missing or invalid manifest_ref".to_string());
    }
    Ok(value)
}

fn read_sections(map: &Mapping, path: &Path) -> Result<[Vec<String>; 3]> {
    let explicit_present: Vec<&str> = SECTIONS
        .iter()
        .flat_map(|(_, keys)| keys.iter().copied())
        .filter(|k| map.contains_key(*k))
        .collect();

    if let Some(snippets) = map.get(FIELD_SNIPPETS) {
        return match snippets {
            Value::Sequence(_) => {
                if !explicit_present.is_empty() {
                    return Err(CatalogError::InvalidManifest {
                        path: path.to_path_buf(),
                        reason: "'snippets' list used alongside explicit sections".to_string(),
                    });
                }
                Ok([
                    normalize_list(Some(snippets), "snippets", path)?,
                    Vec::new(),
                    Vec::new(),
                ])
            }
            Value::Mapping(sub) => {
                if !explicit_present.is_empty() {
                    return Err(CatalogError::InvalidManifest {
                        path: path.to_path_buf(),
                        reason: "'snippets' mapping mixed with explicit sections".to_string(),
                    });
                }
                let mut out: [Vec<String>; 3] = Default::default();
                for (slot, (name, _)) in out.iter_mut().zip(SECTIONS.iter()) {
                    *slot = normalize_list(sub.get(*name), &format!("snippets.{name}"), path)?;
                }
                Ok(out)
            }
            _ => Err(CatalogError::InvalidManifest {
                path: path.to_path_buf(),
                reason: "snippets must be a list or mapping".to_string(),
            }),
        };
    }

    let mut out: [Vec<String>; 3] = Default::default();
    for (slot, (name, keys)) in out.iter_mut().zip(SECTIONS.iter()) {
        let present: Vec<&str> = keys.iter().copied().filter(|k| map.contains_key(*k)).collect();
        match present.as_slice() {
            [] => {}
            [key] => *slot = normalize_list(map.get(*key), key, path)?,
            _ => {
                return Err(CatalogError::MultipleKeys {
                    path: path.to_path_buf(),
                    section: name.to_string(),
                    keys: present.iter().map(|k| k.to_string()).collect(),
                })
            }
        }
    }
    Ok(out)
}

/// Validate one snippet list: every entry a grammar-valid slug, no repeats.
fn normalize_list(value: Option<&Value>, label: &str, path: &Path) -> Result<Vec<String>> {
    let invalid = |reason: String| CatalogError::InvalidManifest {
        path: path.to_path_buf(),
        reason,
    };
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Sequence(items)) => items,
        Some(_) => return Err(invalid(format!("{label} must be a list"))),
    };

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let slug = match item {
            Value::String(s) if !s.is_empty() => s,
            other => {
                return Err(invalid(format!(
                    "{label} contains invalid entry {}",
                    describe(other)
                )))
            }
        };
        if !is_valid_slug(slug) {
            return Err(invalid(format!("{label} contains non-slug entry '{slug}'")));
        }
        if !seen.insert(slug.as_str()) {
            return Err(invalid(format!("{label} contains duplicate entry '{slug}'")));
        }
        out.push(slug.clone());
    }
    Ok(out)
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => render(other),
    }
}
