//! Persistent catalog storage using redb.
//!
//! # Table design
//!
//! ```text
//! instruction_sets  set_id     -> JSON InstructionSetRow
//! set_slugs         slug       -> set_id
//! slug_identities   slug       -> identity
//! snippets          snippet_id -> JSON SnippetRow
//! ```
//!
//! Every mutating run happens inside one [`CatalogTxn`]. The table adapters
//! it hands out borrow the transaction, so identities minted mid-run commit
//! together with the rows that reference them, or not at all.

use std::collections::HashMap;
use std::fmt::Display;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::config::StoreConfig;
use crate::error::{CatalogError, Result};
use crate::identity::{Identity, IdentityTable, SlugRegistry};
use crate::ledger::{self, SnippetRow, SnippetTable};
use crate::manifest::ManifestEntry;
use crate::upsert::{self, InstructionSetRow, LoadSummary, SetTable};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const INSTRUCTION_SETS: TableDefinition<&str, &[u8]> = TableDefinition::new("instruction_sets");
const SET_SLUGS: TableDefinition<&str, &str> = TableDefinition::new("set_slugs");
const SLUG_IDENTITIES: TableDefinition<&str, &str> = TableDefinition::new("slug_identities");
const SNIPPETS: TableDefinition<&str, &[u8]> = TableDefinition::new("snippets");

fn store_err<E: Display>(e: E) -> CatalogError {
    CatalogError::Store(e.to_string())
}

/// Whether a run should keep its writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Yes,
    DryRun,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub struct Catalog {
    db: Database,
    path: PathBuf,
}

impl Catalog {
    /// Open or create the catalog at `path`, creating parent directories and
    /// all tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(INSTRUCTION_SETS).map_err(store_err)?;
        wt.open_table(SET_SLUGS).map_err(store_err)?;
        wt.open_table(SLUG_IDENTITIES).map_err(store_err)?;
        wt.open_table(SNIPPETS).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn open_configured(config: &StoreConfig) -> Result<Self> {
        Self::open(&config.db_path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn begin(&self) -> Result<CatalogTxn> {
        Ok(CatalogTxn {
            txn: self.db.begin_write().map_err(store_err)?,
        })
    }

    /// Upsert validated manifest entries in one transaction.
    pub fn load_sets(&self, entries: &[ManifestEntry], now: i64, commit: Commit) -> Result<LoadSummary> {
        let txn = self.begin()?;
        let result = {
            let mut registry = SlugRegistry::new(txn.identities());
            let mut sets = txn.sets();
            upsert::upsert_sets(&mut registry, &mut sets, entries, now)
        };
        txn.finish(result, commit)
    }

    /// Record emitted snippet IR in one transaction.
    pub fn record_snippets<R: BufRead>(&self, input: R, now: i64, commit: Commit) -> Result<LoadSummary> {
        let txn = self.begin()?;
        let result = {
            let mut registry = SlugRegistry::new(txn.identities());
            let mut snippets = txn.snippets();
            ledger::record_snippets(input, &mut registry, &mut snippets, now)
        };
        txn.finish(result, commit)
    }

    /// Resolve (and persist, if new) the identity for `slug`.
    pub fn resolve(&self, slug: &str) -> Result<Identity> {
        let txn = self.begin()?;
        let result = SlugRegistry::new(txn.identities()).resolve(slug, None);
        txn.finish(result, Commit::Yes)
    }

    /// All instruction-set rows, sorted by slug.
    pub fn list_sets(&self) -> Result<Vec<InstructionSetRow>> {
        let mut rows: Vec<InstructionSetRow> = self.read_json_rows(INSTRUCTION_SETS)?;
        rows.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(rows)
    }

    /// All ledger rows, sorted by slug.
    pub fn list_snippets(&self) -> Result<Vec<SnippetRow>> {
        let mut rows: Vec<SnippetRow> = self.read_json_rows(SNIPPETS)?;
        rows.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(rows)
    }

    /// slug → last recorded sha256, for the classifier.
    pub fn recorded_hashes(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .list_snippets()?
            .into_iter()
            .map(|row| (row.slug, row.sha256))
            .collect())
    }

    fn read_json_rows<T: serde::de::DeserializeOwned>(
        &self,
        def: TableDefinition<'static, &'static str, &'static [u8]>,
    ) -> Result<Vec<T>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(def).map_err(store_err)?;
        let mut rows = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            rows.push(serde_json::from_slice(v.value())?);
        }
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// CatalogTxn
// ---------------------------------------------------------------------------

pub struct CatalogTxn {
    txn: WriteTransaction,
}

impl CatalogTxn {
    pub fn identities(&self) -> TxnIdentities<'_> {
        TxnIdentities { txn: &self.txn }
    }

    pub fn sets(&self) -> TxnSets<'_> {
        TxnSets { txn: &self.txn }
    }

    pub fn snippets(&self) -> TxnSnippets<'_> {
        TxnSnippets { txn: &self.txn }
    }

    pub fn commit(self) -> Result<()> {
        self.txn.commit().map_err(store_err)
    }

    pub fn abort(self) -> Result<()> {
        self.txn.abort().map_err(store_err)
    }

    /// Commit on success (unless dry-running), abort on failure.
    fn finish<T>(self, result: Result<T>, commit: Commit) -> Result<T> {
        match (result, commit) {
            (Ok(value), Commit::Yes) => {
                self.commit()?;
                Ok(value)
            }
            (Ok(value), Commit::DryRun) => {
                self.abort()?;
                Ok(value)
            }
            (Err(e), _) => {
                tracing::debug!(error = %e, "aborting catalog transaction");
                self.abort()?;
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Table adapters
// ---------------------------------------------------------------------------

pub struct TxnIdentities<'a> {
    txn: &'a WriteTransaction,
}

impl IdentityTable for TxnIdentities<'_> {
    fn lookup(&self, slug: &str) -> Result<Option<Identity>> {
        let table = self.txn.open_table(SLUG_IDENTITIES).map_err(store_err)?;
        let found = table.get(slug).map_err(store_err)?;
        Ok(found.map(|v| Identity::from(v.value())))
    }

    fn bind(&mut self, slug: &str, id: &Identity) -> Result<()> {
        let mut table = self.txn.open_table(SLUG_IDENTITIES).map_err(store_err)?;
        table.insert(slug, id.as_str()).map_err(store_err)?;
        Ok(())
    }
}

pub struct TxnSets<'a> {
    txn: &'a WriteTransaction,
}

impl SetTable for TxnSets<'_> {
    fn find_by_slug(&self, slug: &str) -> Result<Option<Identity>> {
        let table = self.txn.open_table(SET_SLUGS).map_err(store_err)?;
        let found = table.get(slug).map_err(store_err)?;
        Ok(found.map(|v| Identity::from(v.value())))
    }

    fn get(&self, set_id: &Identity) -> Result<Option<InstructionSetRow>> {
        let table = self.txn.open_table(INSTRUCTION_SETS).map_err(store_err)?;
        let found = table.get(set_id.as_str()).map_err(store_err)?;
        match found {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, row: &InstructionSetRow) -> Result<()> {
        let value = serde_json::to_vec(row)?;
        let mut table = self.txn.open_table(INSTRUCTION_SETS).map_err(store_err)?;
        table
            .insert(row.set_id.as_str(), value.as_slice())
            .map_err(store_err)?;
        drop(table);
        let mut slugs = self.txn.open_table(SET_SLUGS).map_err(store_err)?;
        slugs
            .insert(row.slug.as_str(), row.set_id.as_str())
            .map_err(store_err)?;
        Ok(())
    }
}

pub struct TxnSnippets<'a> {
    txn: &'a WriteTransaction,
}

impl SnippetTable for TxnSnippets<'_> {
    fn get(&self, snippet_id: &Identity) -> Result<Option<SnippetRow>> {
        let table = self.txn.open_table(SNIPPETS).map_err(store_err)?;
        let found = table.get(snippet_id.as_str()).map_err(store_err)?;
        match found {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, row: &SnippetRow) -> Result<()> {
        let value = serde_json::to_vec(row)?;
        let mut table = self.txn.open_table(SNIPPETS).map_err(store_err)?;
        table
            .insert(row.snippet_id.as_str(), value.as_slice())
            .map_err(store_err)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upsert::decode_ids;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, Catalog) {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::open(&dir.path().join("nested/catalog.redb")).unwrap();
        (dir, catalog)
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
    fn resolve_is_stable_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.redb");
        let first = Catalog::open(&path).unwrap().resolve("greet_user").unwrap();
        let second = Catalog::open(&path).unwrap().resolve("greet_user").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn load_then_reload_skips() {
        let (_dir, catalog) = open_tmp();
        let entries = vec![entry("intro", &["greet_user"])];
        let s = catalog.load_sets(&entries, 10, Commit::Yes).unwrap();
        assert_eq!(s.created, 1);
        let s = catalog.load_sets(&entries, 20, Commit::Yes).unwrap();
        assert_eq!((s.created, s.updated, s.skipped), (0, 0, 1));

        let rows = catalog.list_sets().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].created_at, 10);
        let ids = decode_ids(rows[0].global_snippets.as_deref()).unwrap();
        assert_eq!(ids, vec![catalog.resolve("greet_user").unwrap()]);
    }

    #[test]
    fn set_slug_index_follows_puts() {
        let (_dir, catalog) = open_tmp();
        let entries: Vec<_> = (0..50).map(|i| entry(&format!("set-{i}"), &["shared"])).collect();
        let s = catalog.load_sets(&entries, 1, Commit::Yes).unwrap();
        assert_eq!(s.created, 50);

        let txn = catalog.begin().unwrap();
        let sets = txn.sets();
        let id = sets.find_by_slug("set-7").unwrap().unwrap();
        assert_eq!(sets.get(&id).unwrap().unwrap().slug, "set-7");
        assert_eq!(sets.find_by_slug("missing").unwrap(), None);
        txn.abort().unwrap();

        let s = catalog.load_sets(&entries, 2, Commit::Yes).unwrap();
        assert_eq!((s.created, s.updated, s.skipped), (0, 0, 50));
    }

    #[test]
    fn failed_run_leaves_store_unchanged() {
        let (_dir, catalog) = open_tmp();
        let bad = vec![entry("good", &["a"]), entry("also-good", &["NOT VALID"])];
        assert!(catalog.load_sets(&bad, 1, Commit::Yes).is_err());
        assert!(catalog.list_sets().unwrap().is_empty());

        // The identity minted for "good" during the failed run was rolled back.
        let txn = catalog.begin().unwrap();
        assert_eq!(txn.identities().lookup("good").unwrap(), None);
        txn.abort().unwrap();
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let (_dir, catalog) = open_tmp();
        let s = catalog
            .load_sets(&[entry("intro", &["greet_user"])], 1, Commit::DryRun)
            .unwrap();
        assert_eq!(s.created, 1);
        assert!(catalog.list_sets().unwrap().is_empty());
    }

    #[test]
    fn recorded_hashes_come_from_ledger() {
        let (_dir, catalog) = open_tmp();
        let line = serde_json::json!({
            "type": "instruction_snippet",
            "slug": "greet_user",
            "path": "/n/greet.md",
            "mtime": 1.0,
            "size": 3,
            "sha256": "f".repeat(64),
            "schema_version": "1",
            "scope": "batch",
            "content": "hey",
        })
        .to_string();
        let s = catalog
            .record_snippets(Cursor::new(line), 5, Commit::Yes)
            .unwrap();
        assert_eq!(s.created, 1);
        let hashes = catalog.recorded_hashes().unwrap();
        assert_eq!(hashes["greet_user"], "f".repeat(64));
    }
}
