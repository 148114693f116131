use crate::cmd::{now, open_catalog};
use crate::output::{print_json, print_summary, print_table};
use anyhow::Context;
use clap::Subcommand;
use snipcat_core::{
    config::StoreConfig,
    manifest,
    store::Commit,
    upsert::decode_ids,
};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum SetsSubcommand {
    /// Load every manifest under ROOT into the catalog
    Load {
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Validate and report without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// List stored instruction sets
    List,
}

pub fn run(config: &StoreConfig, subcmd: SetsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SetsSubcommand::Load { root, dry_run } => load(config, &root, dry_run, json),
        SetsSubcommand::List => list(config, json),
    }
}

fn load(config: &StoreConfig, root: &Path, dry_run: bool, json: bool) -> anyhow::Result<()> {
    // Manifests are fully validated before the catalog is touched.
    let entries = manifest::load_tree(root)
        .with_context(|| format!("failed to load manifests under {}", root.display()))?;

    let catalog = open_catalog(config)?;
    let commit = if dry_run { Commit::DryRun } else { Commit::Yes };
    let summary = catalog
        .load_sets(&entries, now(), commit)
        .context("failed to load instruction sets")?;

    let line = if dry_run {
        format!("{summary} (dry run)")
    } else {
        summary.to_string()
    };
    print_summary(&summary, &line, json)
}

fn list(config: &StoreConfig, json: bool) -> anyhow::Result<()> {
    let rows = open_catalog(config)?
        .list_sets()
        .context("failed to list instruction sets")?;

    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No instruction sets.");
        return Ok(());
    }

    let table = rows
        .iter()
        .map(|row| {
            Ok(vec![
                row.slug.clone(),
                row.set_id.to_string(),
                count(row.global_snippets.as_deref())?,
                count(row.context_snippets.as_deref())?,
                count(row.batch_snippets.as_deref())?,
                row.manifest_ref.clone(),
            ])
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    print_table(
        &["SLUG", "SET ID", "GLOBAL", "CONTEXT", "BATCH", "MANIFEST"],
        table,
    );
    Ok(())
}

fn count(blob: Option<&str>) -> anyhow::Result<String> {
    Ok(decode_ids(blob)?.len().to_string())
}
