//! Line Splitter
//!
//! Walks the compiler's mixed markup/code output line by line and keeps only
//! host code, each fragment tied to the nearest preceding marker.
//!
//! The walk is a two-mode state machine. Output starts in markup mode (a
//! host file is markup until the first `<?php`). In markup mode everything up
//! to the next `<?php` is discarded; in code mode everything up to the next
//! `?>` is kept. A fragment closed by `?>` gets a `;` appended: `foo();;` is
//! valid host code, an unterminated `foo()` is not.
//!
//! One template line may yield zero, one or many `CodeLine`s. A compiled line
//! with no marker of its own (a directive that expands to several lines)
//! keeps the marker of the last line that had one.

use tracing::trace;

use crate::error::MapError;
use crate::marker::Marker;

pub const CODE_OPEN: &str = "<?php";
pub const CODE_CLOSE: &str = "?>";

/// One unit of host code and the template line it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeLine {
    pub marker: Marker,
    pub code: String,
}

impl CodeLine {
    pub fn new(marker: Marker, code: impl Into<String>) -> Self {
        Self {
            marker,
            code: code.into(),
        }
    }
}

/// Incremental splitter state.
#[derive(Debug, Default)]
pub struct LineSplitter {
    inside_code: bool,
    current: Option<Marker>,
    lines: Vec<CodeLine>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one compiled line. `index` is 0-based and only used for errors.
    pub fn feed(&mut self, index: usize, line: &str) -> Result<(), MapError> {
        let mut tail = match Marker::decode(line) {
            Some((marker, rest)) => {
                self.current = Some(marker);
                rest
            }
            None => line,
        };

        loop {
            if tail.is_empty() {
                return Ok(());
            }

            if self.inside_code {
                let marker = self.require_marker(index, line)?;
                match tail.find(CODE_CLOSE) {
                    None => {
                        let code = tail.trim();
                        if !code.is_empty() {
                            self.lines.push(CodeLine::new(marker, code));
                        }
                        return Ok(());
                    }
                    Some(at) => {
                        let code = tail[..at].trim();
                        if !code.is_empty() {
                            self.lines.push(CodeLine::new(marker, format!("{code};")));
                        }
                        self.inside_code = false;
                        tail = &tail[at + CODE_CLOSE.len()..];
                    }
                }
            } else {
                match tail.find(CODE_OPEN) {
                    None => return Ok(()),
                    Some(at) => {
                        self.require_marker(index, line)?;
                        self.inside_code = true;
                        tail = &tail[at + CODE_OPEN.len()..];
                    }
                }
            }
        }
    }

    fn require_marker(&self, index: usize, line: &str) -> Result<Marker, MapError> {
        self.current.clone().ok_or_else(|| MapError::MissingMarker {
            line: index + 1,
            content: line.to_string(),
        })
    }

    pub fn is_inside_code(&self) -> bool {
        self.inside_code
    }

    pub fn finish(self) -> Vec<CodeLine> {
        trace!(
            code_lines = self.lines.len(),
            ends_in_code = self.inside_code,
            "split compiled output"
        );
        self.lines
    }
}

/// Split a whole compiled output into code lines.
pub fn split(compiled: &str) -> Result<Vec<CodeLine>, MapError> {
    let mut splitter = LineSplitter::new();
    for (index, line) in compiled.split('\n').enumerate() {
        splitter.feed(index, line)?;
    }
    Ok(splitter.finish())
}
