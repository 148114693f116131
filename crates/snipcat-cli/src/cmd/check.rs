use crate::output::print_summary;
use crate::stream::Sink;
use anyhow::Context;
use snipcat_core::{
    ndjson,
    scan::{self, FrontMatterScanner, IndexScanner, SlugScanner},
};
use std::io::Write;
use std::path::Path;

pub fn run(root: &Path, index: Option<&Path>, output: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let scanner: Box<dyn SlugScanner> = match index {
        Some(index) => Box::new(IndexScanner::new(index)),
        None => Box::new(FrontMatterScanner),
    };
    let candidates = scan::check(root, scanner.as_ref())
        .with_context(|| format!("failed to scan {}", root.display()))?;

    let mut sink = Sink::open(output)?;
    if let Some(out) = sink.records() {
        for candidate in &candidates {
            ndjson::write_record(&mut *out, candidate)?;
        }
        out.flush()?;
    }

    if sink.report() {
        let n = candidates.len();
        print_summary(
            &serde_json::json!({ "emitted": n }),
            &format!("check_instructions: emitted {n} candidates"),
            json,
        )?;
    }
    Ok(())
}
