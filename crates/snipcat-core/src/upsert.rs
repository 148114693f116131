//! Instruction-set upserts.
//!
//! Each manifest entry becomes one `instruction_sets` row. The row's identity
//! is looked up by slug before any snippet identity is resolved, so a set
//! that already exists keeps the identity it was stored under. Rows are then
//! compared field by field; only real differences are written.

use crate::error::{CatalogError, Result};
use crate::identity::{Identity, IdentityTable, SlugRegistry};
use crate::manifest::ManifestEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSetRow {
    pub set_id: Identity,
    pub slug: String,
    pub manifest_ref: String,
    pub global_snippets: Option<String>,
    pub context_snippets: Option<String>,
    pub batch_snippets: Option<String>,
    /// Epoch seconds; written once on insert.
    pub created_at: i64,
}

impl InstructionSetRow {
    fn same_content(&self, other: &InstructionSetRow) -> bool {
        self.slug == other.slug
            && self.manifest_ref == other.manifest_ref
            && self.global_snippets == other.global_snippets
            && self.context_snippets == other.context_snippets
            && self.batch_snippets == other.batch_snippets
    }
}

/// Storage seam for instruction-set rows.
pub trait SetTable {
    fn find_by_slug(&self, slug: &str) -> Result<Option<Identity>>;
    fn get(&self, set_id: &Identity) -> Result<Option<InstructionSetRow>>;
    fn put(&mut self, row: &InstructionSetRow) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl LoadSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged",
            self.created, self.updated, self.skipped
        )
    }
}

// ---------------------------------------------------------------------------
// Identity-list encoding
// ---------------------------------------------------------------------------

/// Compact JSON array of identities, first occurrence wins; `None` when the
/// list is empty.
pub fn encode_ids(ids: &[Identity]) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    let mut seen = HashSet::new();
    let unique: Vec<&str> = ids
        .iter()
        .map(Identity::as_str)
        .filter(|id| seen.insert(*id))
        .collect();
    serde_json::to_string(&unique).ok()
}

pub fn decode_ids(blob: Option<&str>) -> Result<Vec<Identity>> {
    let Some(blob) = blob else {
        return Ok(Vec::new());
    };
    let ids: Vec<String> = serde_json::from_str(blob)
        .map_err(|e| CatalogError::InvalidIdentityList(e.to_string()))?;
    let mut seen = HashSet::new();
    Ok(ids
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .map(Identity::from)
        .collect())
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Upsert `entries` in order. Writes go through `sets` and `registry`; the
/// caller owns the surrounding transaction and decides commit or abort.
pub fn upsert_sets<I: IdentityTable, S: SetTable>(
    registry: &mut SlugRegistry<I>,
    sets: &mut S,
    entries: &[ManifestEntry],
    now: i64,
) -> Result<LoadSummary> {
    let mut summary = LoadSummary::default();

    for entry in entries {
        let existing = sets.find_by_slug(&entry.slug)?;
        let set_id = registry.resolve(&entry.slug, existing.as_ref())?;

        let mut encode = |slugs: &[String]| -> Result<Option<String>> {
            let ids = slugs
                .iter()
                .map(|s| registry.resolve(s, None))
                .collect::<Result<Vec<_>>>()?;
            Ok(encode_ids(&ids))
        };
        let global_snippets = encode(&entry.global)?;
        let context_snippets = encode(&entry.context)?;
        let batch_snippets = encode(&entry.batch)?;

        let mut row = InstructionSetRow {
            set_id,
            slug: entry.slug.clone(),
            manifest_ref: entry.manifest_ref.clone(),
            global_snippets,
            context_snippets,
            batch_snippets,
            created_at: now,
        };

        match sets.get(&row.set_id)? {
            None => {
                sets.put(&row)?;
                summary.created += 1;
                tracing::info!(slug = %row.slug, set_id = %row.set_id, "instruction set created");
            }
            Some(stored) if stored.same_content(&row) => {
                summary.skipped += 1;
            }
            Some(stored) => {
                row.created_at = stored.created_at;
                sets.put(&row)?;
                summary.updated += 1;
                tracing::info!(slug = %row.slug, set_id = %row.set_id, "instruction set updated");
            }
        }
    }

    debug_assert_eq!(summary.total(), entries.len());
    Ok(summary)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::identity::MemoryIdentities;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[derive(Default)]
    pub(crate) struct MemorySets {
        pub rows: BTreeMap<Identity, InstructionSetRow>,
        pub writes: usize,
    }

    impl SetTable for MemorySets {
        fn find_by_slug(&self, slug: &str) -> Result<Option<Identity>> {
            Ok(self
                .rows
                .values()
                .find(|r| r.slug == slug)
                .map(|r| r.set_id.clone()))
        }

        fn get(&self, set_id: &Identity) -> Result<Option<InstructionSetRow>> {
            Ok(self.rows.get(set_id).cloned())
        }

        fn put(&mut self, row: &InstructionSetRow) -> Result<()> {
            self.writes += 1;
            self.rows.insert(row.set_id.clone(), row.clone());
            Ok(())
        }
    }

    fn entry(slug: &str, global: &[&str]) -> ManifestEntry {
        ManifestEntry {
            slug: slug.to_string(),
            manifest_ref: format!("{slug}.yaml"),
            path: PathBuf::from(format!("/sets/{slug}.yaml")),
            global: global.iter().map(|s| s.to_string()).collect(),
            context: Vec::new(),
            batch: Vec::new(),
        }
    }

    #[test]
    fn encode_decode_keeps_order_and_drops_duplicates() {
        let ids: Vec<Identity> = ["c", "a", "c", "b", "a"].into_iter().map(Identity::from).collect();
        let blob = encode_ids(&ids).unwrap();
        assert_eq!(blob, r#"["c","a","b"]"#);
        let decoded = decode_ids(Some(&blob)).unwrap();
        let decoded: Vec<_> = decoded.iter().map(Identity::as_str).collect();
        assert_eq!(decoded, vec!["c", "a", "b"]);
    }

    #[test]
    fn empty_list_encodes_as_null() {
        assert_eq!(encode_ids(&[]), None);
        assert!(decode_ids(None).unwrap().is_empty());
        assert!(decode_ids(Some("not json")).is_err());
    }

    #[test]
    fn create_then_skip_on_identical_reload() {
        let mut registry = SlugRegistry::new(MemoryIdentities::default());
        let mut sets = MemorySets::default();
        let entries = vec![entry("intro", &["greet_user"])];

        let first = upsert_sets(&mut registry, &mut sets, &entries, 100).unwrap();
        assert_eq!(first, LoadSummary { created: 1, updated: 0, skipped: 0 });

        let second = upsert_sets(&mut registry, &mut sets, &entries, 200).unwrap();
        assert_eq!(second, LoadSummary { created: 0, updated: 0, skipped: 1 });
        assert_eq!(sets.writes, 1);
    }

    #[test]
    fn adding_a_snippet_updates_and_keeps_created_at() {
        let mut registry = SlugRegistry::new(MemoryIdentities::default());
        let mut sets = MemorySets::default();
        upsert_sets(&mut registry, &mut sets, &[entry("intro", &["greet_user"])], 100).unwrap();

        let summary = upsert_sets(
            &mut registry,
            &mut sets,
            &[entry("intro", &["greet_user", "tone"])],
            200,
        )
        .unwrap();
        assert_eq!(summary, LoadSummary { created: 0, updated: 1, skipped: 0 });

        let row = sets.rows.values().next().unwrap();
        assert_eq!(row.created_at, 100);
        assert_eq!(decode_ids(row.global_snippets.as_deref()).unwrap().len(), 2);
        assert_eq!(row.context_snippets, None);
    }

    #[test]
    fn set_identity_is_inherited_from_stored_row() {
        let mut sets = MemorySets::default();
        let stored = Identity::from("legacy-id");
        sets.rows.insert(
            stored.clone(),
            InstructionSetRow {
                set_id: stored.clone(),
                slug: "intro".into(),
                manifest_ref: "old.yaml".into(),
                global_snippets: None,
                context_snippets: None,
                batch_snippets: None,
                created_at: 1,
            },
        );
        let mut registry = SlugRegistry::new(MemoryIdentities::default());
        let summary =
            upsert_sets(&mut registry, &mut sets, &[entry("intro", &["greet_user"])], 50).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(sets.rows.len(), 1);
        assert_eq!(sets.rows[&stored].created_at, 1);
        assert_eq!(registry.resolve("intro", None).unwrap(), stored);
    }

    #[test]
    fn shared_snippets_resolve_to_same_identity() {
        let mut registry = SlugRegistry::new(MemoryIdentities::default());
        let mut sets = MemorySets::default();
        let entries = vec![entry("one", &["shared"]), entry("two", &["shared"])];
        let summary = upsert_sets(&mut registry, &mut sets, &entries, 1).unwrap();
        assert_eq!(summary.created, 2);
        let blobs: Vec<_> = sets.rows.values().map(|r| r.global_snippets.clone()).collect();
        assert_eq!(blobs[0], blobs[1]);
    }

    #[test]
    fn summary_display_matches_report_line() {
        let s = LoadSummary { created: 1, updated: 2, skipped: 3 };
        assert_eq!(s.to_string(), "1 created, 2 updated, 3 unchanged");
    }
}
