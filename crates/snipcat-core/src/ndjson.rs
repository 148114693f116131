//! Newline-delimited JSON: one object per non-blank line.
//!
//! Two reading modes exist. Advisory consumers of scan output read
//! leniently and drop lines that are not JSON objects with a warning.
//! Consumers whose output feeds storage read strictly and fail on the first
//! bad line.

use crate::error::{CatalogError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{BufRead, Write};

pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Strict,
    Lenient,
}

pub struct NdjsonReader<R> {
    input: R,
    mode: Mode,
    line: usize,
    malformed: usize,
    buf: String,
}

impl<R: BufRead> NdjsonReader<R> {
    pub fn new(input: R, mode: Mode) -> Self {
        Self {
            input,
            mode,
            line: 0,
            malformed: 0,
            buf: String::new(),
        }
    }

    /// Lines dropped so far in lenient mode.
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    fn next_record(&mut self) -> Result<Option<(usize, Record)>> {
        loop {
            self.buf.clear();
            if self.input.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            match parse_object(text) {
                Ok(record) => return Ok(Some((self.line, record))),
                Err(reason) => match self.mode {
                    Mode::Strict => {
                        return Err(CatalogError::MalformedLine {
                            line: self.line,
                            reason,
                        })
                    }
                    Mode::Lenient => {
                        self.malformed += 1;
                        tracing::warn!(line = self.line, %reason, "skipping malformed NDJSON line");
                    }
                },
            }
        }
    }
}

impl<R: BufRead> Iterator for NdjsonReader<R> {
    type Item = Result<(usize, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn parse_object(text: &str) -> std::result::Result<Record, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Write `value` as one compact JSON line.
pub fn write_record<W: Write + ?Sized, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}
