use crate::output::print_summary;
use crate::stream::{open_input, Sink};
use anyhow::Context;
use snipcat_core::emit;
use std::path::Path;

pub fn run(
    input: Option<&Path>,
    output: Option<&Path>,
    default_schema_version: &str,
    json: bool,
) -> anyhow::Result<()> {
    let reader = open_input(input)?;
    let mut sink = Sink::open(output)?;
    let summary = emit::emit(reader, sink.records(), default_schema_version)
        .context("failed to emit instruction snippets")?;

    if sink.report() {
        let line = format!(
            "emit_instructions: total={} emitted={} skipped={}",
            summary.total, summary.emitted, summary.skipped
        );
        print_summary(&summary, &line, json)?;
    }
    Ok(())
}
