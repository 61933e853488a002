//! Line-oriented console input and log output around the pipeline.

use crate::error::{PipelineError, Result};
use std::io::BufRead;
use tracing::{info, warn};

/// The command that ends console input, matched case-insensitively
pub const EXIT_COMMAND: &str = "exit";

/// A classified console line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Value(i64),
    Exit,
}

/// Classify one line of console input
pub fn parse_line(raw: &str) -> Result<Line> {
    let line = raw.trim();
    if line.eq_ignore_ascii_case(EXIT_COMMAND) {
        return Ok(Line::Exit);
    }
    line.parse::<i64>()
        .map(Line::Value)
        .map_err(|source| PipelineError::MalformedInput {
            line: line.to_string(),
            source,
        })
}

/// Integers read line by line from a console-like reader.
///
/// Iteration ends at the exit command or at end of input. Lines that are not
/// integers (including lines that are not valid UTF-8) are reported and
/// skipped.
pub struct ConsoleSource<R> {
    reader: R,
    line: Vec<u8>,
    skipped: u64,
    finished: bool,
}

impl<R: BufRead> ConsoleSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            skipped: 0,
            finished: false,
        }
    }

    /// Number of lines rejected so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: BufRead> Iterator for ConsoleSource<R> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        while !self.finished {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    info!("console input closed");
                    self.finished = true;
                }
                Ok(_) => match parse_line(&String::from_utf8_lossy(&self.line)) {
                    Ok(Line::Value(value)) => return Some(value),
                    Ok(Line::Exit) => {
                        info!("exit requested, shutting down");
                        self.finished = true;
                    }
                    Err(e) => {
                        self.skipped += 1;
                        warn!("{e}");
                    }
                },
                Err(e) => {
                    warn!(error = %e, "failed to read console input");
                    self.finished = true;
                }
            }
        }
        None
    }
}

/// Terminal consumer of tokens that made it through every stage
pub trait Sink<T> {
    fn consume(&mut self, value: T);
}

impl<T, F> Sink<T> for F
where
    F: FnMut(T),
{
    fn consume(&mut self, value: T) {
        self(value)
    }
}

/// Logs every delivered token at `info`
#[derive(Debug, Default)]
pub struct LogSink {
    delivered: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl<T: std::fmt::Display> Sink<T> for LogSink {
    fn consume(&mut self, value: T) {
        self.delivered += 1;
        info!(value = %value, "processed data");
    }
}
