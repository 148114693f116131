use crate::cmd::open_catalog;
use crate::output::print_summary;
use crate::stream::{open_input, Sink};
use anyhow::Context;
use snipcat_core::{classify, config::StoreConfig};
use std::path::Path;

pub fn run(
    config: &StoreConfig,
    input: Option<&Path>,
    output: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let recorded = open_catalog(config)?
        .recorded_hashes()
        .context("failed to read the snippet ledger")?;

    let reader = open_input(input)?;
    let mut sink = Sink::open(output)?;
    let summary = classify::classify(reader, sink.records(), &recorded)
        .context("failed to classify candidates")?;

    if sink.report() {
        let line = format!(
            "classify_instructions: total={} uploadable={} ambiguous={} malformed={}",
            summary.total, summary.uploadable, summary.ambiguous, summary.malformed
        );
        print_summary(&summary, &line, json)?;
    }
    Ok(())
}
