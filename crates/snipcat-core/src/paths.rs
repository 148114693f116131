use crate::error::{CatalogError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Store location constants
// ---------------------------------------------------------------------------

pub const DB_PATH_ENV: &str = "SNIPCAT_DB_PATH";
pub const STORE_DIR: &str = ".snipcat";
pub const STORE_FILE: &str = "catalog.redb";

pub const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml"];
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

pub fn default_store_path(home: &Path) -> PathBuf {
    home.join(STORE_DIR).join(STORE_FILE)
}

/// True when `path` has one of `extensions` (case-insensitive).
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Collect every file under `root` whose extension is in `extensions`.
///
/// Directory entries are sorted at each level, so the result order does not
/// depend on what the OS returns from `read_dir`. Hidden directories are
/// walked like any other.
pub fn collect_files(root: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    walk(root, extensions, &mut out)?;
    out.sort();
    Ok(out)
}

fn walk(dir: &Path, extensions: &[&str], out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            walk(&path, extensions, out)?;
        } else if path.is_file() && has_extension(&path, extensions) {
            out.push(path);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(?:[-_][a-z0-9]+)*$").unwrap())
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug_re().is_match(slug)
        && slug.bytes().any(|b| b.is_ascii_lowercase())
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if !is_valid_slug(slug) {
        return Err(CatalogError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn valid_slugs() {
        for slug in ["intro", "greet_user", "a1", "auth-login", "x", "v2-batch_rules"] {
            validate_slug(slug).unwrap_or_else(|_| panic!("expected valid: {slug}"));
        }
    }

    #[test]
    fn invalid_slugs() {
        for slug in [
            "",
            "123",
            "-starts-with-dash",
            "ends-with-dash-",
            "double--dash",
            "has spaces",
            "UPPER",
            "dot.ted",
        ] {
            assert!(validate_slug(slug).is_err(), "expected invalid: {slug}");
        }
    }

    #[test]
    fn long_path_derived_slugs_are_valid() {
        let slug = format!("{}-{}", "projects-notes-prompts".repeat(4), "greet-the-user-warmly");
        assert!(slug.len() > 100);
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn collect_files_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("b/nested/z.yaml"), "x: 1").unwrap();
        std::fs::write(dir.path().join("a/y.YML"), "x: 1").unwrap();
        std::fs::write(dir.path().join("a/notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join("c.yaml"), "x: 1").unwrap();

        let files = collect_files(dir.path(), MANIFEST_EXTENSIONS).unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("a/y.YML"),
                PathBuf::from("b/nested/z.yaml"),
                PathBuf::from("c.yaml"),
            ]
        );
    }

    #[test]
    fn default_store_path_under_home() {
        assert_eq!(
            default_store_path(Path::new("/home/u")),
            PathBuf::from("/home/u/.snipcat/catalog.redb")
        );
    }
}
