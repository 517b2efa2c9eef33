//! Structural errors raised by the mapping engine.
//!
//! Every variant means an invariant about the compiler's output or the
//! synthesized file was broken. None of them are user-facing diagnostics:
//! they abort the check of one entry point and carry enough context
//! (line, content, file) to debug the unmodelled output shape.

/// Errors raised while splitting, rewriting, parsing includes or back-mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// The compiler produced host code before any marker line.
    #[error("host code on compiled line {line} appears before any template marker: {content:?}")]
    MissingMarker { line: usize, content: String },

    /// A diagnostic points at a synthesized line with no marker above it.
    #[error(
        "no template marker precedes line {line} of {path} for diagnostic {message:?} (line content: {content:?})"
    )]
    OrphanDiagnostic {
        path: String,
        line: u32,
        message: String,
        content: String,
    },

    /// The include call shape did not match what the compiler is known to emit.
    #[error("malformed include call: {reason} in `{snippet}`")]
    MalformedInclude { reason: String, snippet: String },

    /// `foreach($__currentLoopData ...)` with no loop data assigned before it.
    #[error("loop over $__currentLoopData without a preceding assignment at {template_path}:{line}")]
    UnboundLoopData { template_path: String, line: u32 },
}

impl MapError {
    pub(crate) fn malformed(reason: impl Into<String>, snippet: &str) -> Self {
        // Keep messages on one line and bounded; calls can span many lines.
        let flat: String = snippet
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(160)
            .collect();
        Self::MalformedInclude {
            reason: reason.into(),
            snippet: flat,
        }
    }
}
