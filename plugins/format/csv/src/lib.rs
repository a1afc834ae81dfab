//! Flight-log reader: turns an OpenRocket-style CSV export into a lazy
//! sequence of [`Record`]s.

mod parser;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use telemetry_api::{FieldSchema, Record, RecordError, TelemetryError};

use parser::parse_fields;

// ═══════════════════════════════════════════════════════════════
//  Reader options
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderOptions {
    /// Lines starting with this character are skipped (default `#`).
    pub comment: char,
    /// Field delimiter (default `,`).
    pub delimiter: char,
    /// RFC 4180 double-quote handling (default true).
    pub quoting: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            comment: '#',
            delimiter: ',',
            quoting: true,
        }
    }
}

impl ReaderOptions {
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.comment == self.delimiter {
            return Err(TelemetryError::config(format!(
                "CSV: comment marker and delimiter are both {:?}",
                self.delimiter
            )));
        }
        if matches!(self.delimiter, '\n' | '\r') || (self.quoting && self.delimiter == '"') {
            return Err(TelemetryError::config(format!(
                "CSV: {:?} cannot be used as delimiter",
                self.delimiter
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  LogReader
// ═══════════════════════════════════════════════════════════════

/// Lazy, finite, non-restartable record sequence over a text source.
///
/// Comment and blank lines are skipped. The first malformed row ends the
/// sequence: it is yielded as an error and every later call returns `None`.
pub struct LogReader<R> {
    source: R,
    schema: FieldSchema,
    options: ReaderOptions,
    buf: String,
    line: usize,
    comments: usize,
    done: bool,
}

impl LogReader<BufReader<File>> {
    /// Open a log file.
    pub fn open(
        path: impl AsRef<Path>,
        schema: FieldSchema,
        options: ReaderOptions,
    ) -> Result<Self, TelemetryError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| TelemetryError::config(format!("cannot open {}: {e}", path.display())))?;
        Ok(Self::new(BufReader::new(file), schema, options))
    }
}

impl<R: BufRead> LogReader<R> {
    pub fn new(source: R, schema: FieldSchema, options: ReaderOptions) -> Self {
        Self {
            source,
            schema,
            options,
            buf: String::new(),
            line: 0,
            comments: 0,
            done: false,
        }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Number of source lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line
    }

    /// Number of comment lines skipped so far.
    pub fn comments_skipped(&self) -> usize {
        self.comments
    }

    fn next_record(&mut self) -> Option<Result<Record, RecordError>> {
        loop {
            self.buf.clear();
            match self.source.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line += 1,
                Err(e) => {
                    return Some(Err(RecordError::Malformed {
                        line: self.line + 1,
                        reason: format!("read error: {e}"),
                    }));
                }
            }

            let line = self.buf.trim_end_matches(['\r', '\n']);
            if line.starts_with(self.options.comment) {
                self.comments += 1;
                tracing::trace!(line = self.line, "skipping comment");
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }

            let values = parse_fields(line, self.options.delimiter, self.options.quoting);
            return Some(Record::from_row(&self.schema, self.line, values));
        }
    }
}

impl<R: BufRead> Iterator for LogReader<R> {
    type Item = Result<Record, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.next_record();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

impl<R: BufRead> std::iter::FusedIterator for LogReader<R> {}
