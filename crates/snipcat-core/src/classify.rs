//! Tag check-phase candidates with a decision for the emission phase.
//!
//! A slug the ledger has never recorded is `uploadable`. A slug it has
//! recorded is `ambiguous` and carries the recorded hash as `last_hash`, so
//! the emission phase can tell by hashing whether anything changed.

use crate::candidate::{CandidateRecord, Decision, FIELD_DECISION, FIELD_LAST_HASH};
use crate::error::Result;
use crate::ndjson::{self, Mode, NdjsonReader};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassifySummary {
    pub total: usize,
    pub uploadable: usize,
    pub ambiguous: usize,
    pub malformed: usize,
}

/// `recorded` maps slug → last recorded sha256.
pub fn classify<R: BufRead>(
    input: R,
    mut out: Option<&mut dyn Write>,
    recorded: &HashMap<String, String>,
) -> Result<ClassifySummary> {
    let mut summary = ClassifySummary::default();
    let mut reader = NdjsonReader::new(input, Mode::Lenient);

    for item in reader.by_ref() {
        let (line, mut record) = item?;
        let cand = match CandidateRecord::from_record(&record, line) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(line, error = %e, "skipping malformed candidate");
                summary.malformed += 1;
                continue;
            }
        };
        summary.total += 1;

        match recorded.get(&cand.slug) {
            Some(hash) => {
                record.insert(FIELD_DECISION.into(), Value::from(Decision::Ambiguous.to_string()));
                record.insert(FIELD_LAST_HASH.into(), Value::from(hash.as_str()));
                summary.ambiguous += 1;
            }
            None => {
                record.insert(FIELD_DECISION.into(), Value::from(Decision::Uploadable.to_string()));
                record.remove(FIELD_LAST_HASH);
                summary.uploadable += 1;
            }
        }
        if let Some(out) = out.as_deref_mut() {
            ndjson::write_record(out, &record)?;
        }
    }
    summary.malformed += reader.malformed();
    if let Some(out) = out {
        out.flush()?;
    }
    Ok(summary)
}
