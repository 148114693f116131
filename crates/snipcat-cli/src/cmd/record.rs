use crate::cmd::{now, open_catalog};
use crate::output::print_summary;
use crate::stream::open_input;
use anyhow::Context;
use snipcat_core::{config::StoreConfig, store::Commit};
use std::path::Path;

pub fn run(config: &StoreConfig, input: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let catalog = open_catalog(config)?;
    let reader = open_input(input)?;
    let summary = catalog
        .record_snippets(reader, now(), Commit::Yes)
        .context("failed to record snippets")?;
    print_summary(&summary, &summary.to_string(), json)
}
