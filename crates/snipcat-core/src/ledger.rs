//! Snippet ledger: the catalog's copy of the last emitted IR per snippet.
//!
//! Rows are keyed by the snippet's identity, so a file that moves keeps its
//! row. The recorded `sha256` is what the classifier hands back to the
//! emission phase as `last_hash`.

use crate::emit::INSTRUCTION_SNIPPET_TYPE;
use crate::error::{CatalogError, Result};
use crate::identity::{Identity, IdentityTable, SlugRegistry};
use crate::ndjson::{Mode, NdjsonReader, Record};
use crate::paths::is_valid_slug;
use crate::snippet::Scope;
use crate::upsert::LoadSummary;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetRow {
    pub snippet_id: Identity,
    pub slug: String,
    pub path: String,
    pub sha256: String,
    pub schema_version: String,
    pub scope: Scope,
    pub mtime: f64,
    pub size: u64,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SnippetRow {
    fn same_content(&self, other: &SnippetRow) -> bool {
        self.slug == other.slug
            && self.path == other.path
            && self.sha256 == other.sha256
            && self.schema_version == other.schema_version
            && self.scope == other.scope
            && self.mtime == other.mtime
            && self.size == other.size
    }
}

pub trait SnippetTable {
    fn get(&self, snippet_id: &Identity) -> Result<Option<SnippetRow>>;
    fn put(&mut self, row: &SnippetRow) -> Result<()>;
}

/// Emitted IR as read back from the emission stream.
#[derive(Debug, Deserialize)]
struct SnippetIr {
    #[serde(rename = "type")]
    kind: String,
    slug: String,
    path: String,
    mtime: f64,
    size: u64,
    sha256: String,
    schema_version: String,
    scope: Scope,
    content: String,
}

impl SnippetIr {
    fn from_record(record: Record, line: usize) -> Result<Self> {
        let bad = |reason: String| CatalogError::InvalidCandidate { line, reason };
        let ir: SnippetIr =
            serde_json::from_value(Value::Object(record)).map_err(|e| bad(e.to_string()))?;
        if ir.kind != INSTRUCTION_SNIPPET_TYPE {
            return Err(bad(format!("unexpected record type '{}'", ir.kind)));
        }
        if !is_valid_slug(&ir.slug) {
            return Err(bad(format!("invalid slug '{}'", ir.slug)));
        }
        if ir.sha256.len() != 64 || !ir.sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(bad(format!("sha256 is not a hex digest: '{}'", ir.sha256)));
        }
        Ok(ir)
    }
}

/// Record every IR line from `input`. Strict: the first bad line aborts, and
/// the caller discards the transaction.
pub fn record_snippets<R: BufRead, I: IdentityTable, T: SnippetTable>(
    input: R,
    registry: &mut SlugRegistry<I>,
    table: &mut T,
    now: i64,
) -> Result<LoadSummary> {
    let mut summary = LoadSummary::default();
    let mut total = 0;

    for item in NdjsonReader::new(input, Mode::Strict) {
        let (line, record) = item?;
        total += 1;
        let ir = SnippetIr::from_record(record, line)?;
        let snippet_id = registry.resolve(&ir.slug, None)?;

        let mut row = SnippetRow {
            snippet_id,
            slug: ir.slug,
            path: ir.path,
            sha256: ir.sha256,
            schema_version: ir.schema_version,
            scope: ir.scope,
            mtime: ir.mtime,
            size: ir.size,
            content: ir.content,
            created_at: now,
            updated_at: now,
        };

        match table.get(&row.snippet_id)? {
            None => {
                table.put(&row)?;
                summary.created += 1;
            }
            Some(stored) if stored.same_content(&row) => summary.skipped += 1,
            Some(stored) => {
                row.created_at = stored.created_at;
                table.put(&row)?;
                summary.updated += 1;
                tracing::info!(slug = %row.slug, "snippet updated");
            }
        }
    }

    debug_assert_eq!(summary.total(), total);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentities;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::io::Cursor;

    #[derive(Default)]
    struct MemorySnippets {
        rows: BTreeMap<Identity, SnippetRow>,
    }

    impl SnippetTable for MemorySnippets {
        fn get(&self, snippet_id: &Identity) -> Result<Option<SnippetRow>> {
            Ok(self.rows.get(snippet_id).cloned())
        }

        fn put(&mut self, row: &SnippetRow) -> Result<()> {
            self.rows.insert(row.snippet_id.clone(), row.clone());
            Ok(())
        }
    }

    fn ir(slug: &str, sha: char) -> String {
        let v = json!({
            "type": "instruction_snippet",
            "slug": slug,
            "path": format!("/notes/{slug}.md"),
            "mtime": 10.5,
            "size": 12,
            "sha256": sha.to_string().repeat(64),
            "schema_version": "1",
            "scope": "global",
            "content": "Say hi.",
            "decision": "uploadable",
        });
        format!("{v}\n")
    }

    #[test]
    fn create_skip_update_cycle() {
        let mut registry = SlugRegistry::new(MemoryIdentities::default());
        let mut table = MemorySnippets::default();

        let s = record_snippets(Cursor::new(ir("greet", 'a')), &mut registry, &mut table, 1).unwrap();
        assert_eq!(s.created, 1);

        let s = record_snippets(Cursor::new(ir("greet", 'a')), &mut registry, &mut table, 2).unwrap();
        assert_eq!(s.skipped, 1);

        let s = record_snippets(Cursor::new(ir("greet", 'b')), &mut registry, &mut table, 3).unwrap();
        assert_eq!(s.updated, 1);
        let row = table.rows.values().next().unwrap();
        assert_eq!(row.created_at, 1);
        assert_eq!(row.updated_at, 3);
        assert_eq!(row.sha256, "b".repeat(64));
    }

    #[test]
    fn rejects_non_ir_records() {
        let mut registry = SlugRegistry::new(MemoryIdentities::default());
        let mut table = MemorySnippets::default();
        for line in [
            "{\"slug\":\"a1\",\"path\":\"a.md\",\"mtime\":1,\"size\":1}\n".to_string(),
            ir("greet", 'z'),
            ir("greet", 'a').replace("instruction_snippet", "other"),
        ] {
            assert!(
                record_snippets(Cursor::new(line.clone()), &mut registry, &mut table, 1).is_err(),
                "expected failure for {line}"
            );
        }
        assert!(table.rows.is_empty());
    }
}
