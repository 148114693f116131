//! Emission phase: candidates in, snippet IR out.
//!
//! Every candidate is validated, read, hashed and either written as an
//! `instruction_snippet` record or skipped because an ambiguous candidate
//! turned out to be unchanged. Any invalid input aborts the whole stream.

use crate::candidate::{self, CandidateRecord, Decision, FIELD_SCHEMA_VERSION};
use crate::error::{CatalogError, Result};
use crate::ndjson::{self, Mode, NdjsonReader, Record};
use crate::snippet::{coerce_schema_version, select_schema_version, sha256_file, Snippet};
use serde::Serialize;
use serde_json::Value;
use std::io::{BufRead, Write};

pub const INSTRUCTION_SNIPPET_TYPE: &str = "instruction_snippet";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmitSummary {
    pub total: usize,
    pub emitted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Emit,
    Unchanged,
}

/// Decide whether a candidate needs emitting given its freshly computed hash.
///
/// Only an ambiguous candidate whose recorded hash equals `current_hash` is
/// unchanged. An ambiguous candidate without a recorded hash is emitted with
/// a warning rather than dropped.
pub fn resolve_ambiguity(
    slug: &str,
    decision: Option<Decision>,
    last_hash: Option<&str>,
    current_hash: &str,
) -> Verdict {
    if decision != Some(Decision::Ambiguous) {
        return Verdict::Emit;
    }
    match last_hash {
        Some(prior) if prior == current_hash => Verdict::Unchanged,
        Some(_) => Verdict::Emit,
        None => {
            tracing::warn!(slug, "missing last_hash for ambiguous record; emitting");
            Verdict::Emit
        }
    }
}

/// Run the emission phase over an NDJSON candidate stream.
///
/// Records are written to `out` when given; callers pass `None` when the sink
/// is an interactive terminal and only the summary is wanted.
pub fn emit<R: BufRead>(
    input: R,
    mut out: Option<&mut dyn Write>,
    default_schema_version: &str,
) -> Result<EmitSummary> {
    let default_schema_version =
        coerce_schema_version(&Value::String(default_schema_version.to_string()))
            .map_err(|reason| CatalogError::InvalidOption(format!("default {reason}")))?;

    let mut summary = EmitSummary::default();
    for item in NdjsonReader::new(input, Mode::Strict) {
        let (line, record) = item?;
        summary.total += 1;

        match emit_one(&record, line, &default_schema_version)? {
            Some(output) => {
                if let Some(out) = out.as_deref_mut() {
                    ndjson::write_record(out, &output)?;
                }
                summary.emitted += 1;
            }
            None => summary.skipped += 1,
        }
    }
    if let Some(out) = out {
        out.flush()?;
    }
    debug_assert_eq!(summary.total, summary.emitted + summary.skipped);
    Ok(summary)
}

fn emit_one(record: &Record, line: usize, default_schema_version: &str) -> Result<Option<Record>> {
    let cand = CandidateRecord::from_record(record, line)?;
    if !cand.path.exists() {
        return Err(CatalogError::FileVanished(cand.path));
    }

    let snippet = Snippet::extract(&cand.path, &cand.slug)?;
    let record_version = match record.get(FIELD_SCHEMA_VERSION) {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            coerce_schema_version(v).map_err(|reason| CatalogError::InvalidCandidate { line, reason })?,
        ),
    };
    let schema_version = select_schema_version(
        snippet.schema_version.as_deref(),
        record_version.as_deref(),
        default_schema_version,
        &cand.path,
    );

    let sha = sha256_file(&cand.path)?;
    if resolve_ambiguity(&cand.slug, cand.decision, cand.last_hash.as_deref(), &sha)
        == Verdict::Unchanged
    {
        tracing::debug!(slug = %cand.slug, "unchanged; skipping");
        return Ok(None);
    }

    let (mtime, size) = candidate::stat(&cand.path)?;
    let mut output = record.clone();
    let overlay = [
        ("type", Value::from(INSTRUCTION_SNIPPET_TYPE)),
        ("slug", Value::from(snippet.slug)),
        ("path", Value::from(cand.path.to_string_lossy().into_owned())),
        ("mtime", Value::from(mtime)),
        ("size", Value::from(size)),
        ("sha256", Value::from(sha)),
        ("schema_version", Value::from(schema_version)),
        ("content", Value::from(snippet.body)),
        ("scope", Value::from(snippet.scope.as_str())),
    ];
    for (key, value) in overlay {
        output.insert(key.to_string(), value);
    }
    Ok(Some(output))
}
