//! Synthesizer: assembles the file handed to the type checker.
//!
//! ```text
//! <?php
//! /** @var int $a */                      <- one line per binding
//! /** template_name=..., line=1, ... */    <- marker of the code line below
//! echo $a + 1;;
//! /** template_name=..., line=2, ... */
//! ...
//! ```
//!
//! Every code line is preceded by its own marker line, so any checker line
//! below the first marker has a marker above it.

use crate::bindings::TypeBindings;
use crate::splitter::{CodeLine, CODE_OPEN};

/// Checkable host source, kept as lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SynthesizedFile {
    lines: Vec<String>,
}

impl SynthesizedFile {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Full text with a trailing newline.
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 1-based line access.
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub fn synthesize(bindings: &TypeBindings, code_lines: &[CodeLine]) -> SynthesizedFile {
    let mut lines = Vec::with_capacity(1 + bindings.len() + code_lines.len() * 2);
    lines.push(CODE_OPEN.to_string());
    lines.extend(bindings.declarations());
    for line in code_lines {
        lines.push(line.marker.encode());
        lines.push(line.code.clone());
    }
    SynthesizedFile::from_lines(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Marker;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_layout() {
        let bindings: TypeBindings = [("a", "int")].into_iter().collect();
        let marker = Marker::new("t", "/t.blade.php", 3, vec![]);
        let file = synthesize(&bindings, &[CodeLine::new(marker.clone(), "echo $a;;")]);
        assert_eq!(
            file.lines(),
            &[
                "<?php".to_string(),
                "/** @var int $a */".to_string(),
                marker.encode(),
                "echo $a;;".to_string(),
            ]
        );
        assert_eq!(file.line(4), Some("echo $a;;"));
        assert_eq!(file.line(0), None);
        assert!(file.text().ends_with("echo $a;;\n"));
    }

    #[test]
    fn test_no_code_lines() {
        let file = synthesize(&TypeBindings::new(), &[]);
        assert_eq!(file.text(), "<?php\n");
        assert_eq!(file.len(), 1);
    }
}
