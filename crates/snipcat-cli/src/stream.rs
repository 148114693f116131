//! Stream endpoints for the NDJSON commands.
//!
//! `None` or `-` means the standard stream. Records are never written to an
//! interactive terminal; the command prints its summary line instead.

use anyhow::Context;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, IsTerminal, Write};
use std::path::Path;

fn named(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| p.as_os_str() != "-")
}

pub fn open_input(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    match named(path) {
        Some(p) => {
            let file = File::open(p).with_context(|| format!("cannot open {}", p.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

pub struct Sink {
    records: Option<Box<dyn Write>>,
    on_stdout: bool,
}

impl Sink {
    pub fn open(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(p) = named(path) else {
            let stdout = io::stdout();
            let records: Option<Box<dyn Write>> = if stdout.is_terminal() {
                None
            } else {
                Some(Box::new(BufWriter::new(stdout.lock())))
            };
            return Ok(Self {
                records,
                on_stdout: true,
            });
        };
        let file = File::create(p).with_context(|| format!("cannot create {}", p.display()))?;
        Ok(Self {
            records: Some(Box::new(BufWriter::new(file))),
            on_stdout: false,
        })
    }

    /// Writer for records, or `None` when the sink is a terminal.
    pub fn records(&mut self) -> Option<&mut dyn Write> {
        match &mut self.records {
            Some(w) => {
                let w: &mut dyn Write = w.as_mut();
                Some(w)
            }
            None => None,
        }
    }

    /// Whether stdout is free for a summary line.
    pub fn report(&self) -> bool {
        self.records.is_none() || !self.on_stdout
    }
}
