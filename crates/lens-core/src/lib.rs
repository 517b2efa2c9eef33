//! lens-core: template source mapping engine
//!
//! A host-language type checker only ever sees one synthesized file per
//! entry point. This crate holds the pure text processing that makes that
//! possible, with NO file system or process access:
//! - Marker codec (per-line provenance comments)
//! - Line splitter (markup / code state machine over compiled output)
//! - Statement rewrites (escape helper removal, loop variable typing)
//! - Include call parser (the `$__env->make(...)` shape)
//! - Type binding merge and file synthesis
//! - Diagnostic back-mapping to template file, line and inclusion stack
//!
//! Tagging, compiling, recursive include expansion and checker invocation
//! live in the `blade-lens` crate, which owns the external collaborators.
//!
//! ```text
//! template ──tag_lines──▶ compiler ──▶ include expansion ──split──▶ CodeLines
//!     ──rewrite──▶ synthesize ──▶ checker ──resolve_all──▶ ResolvedDiagnostics
//! ```

pub mod backmap;
pub mod bindings;
pub mod diagnostics;
pub mod error;
pub mod include_call;
pub mod marker;
pub mod rewrite;
pub mod scan;
pub mod splitter;
pub mod synth;

// Re-export commonly used types
pub use backmap::{resolve, resolve_all};
pub use bindings::{TypeBinding, TypeBindings};
pub use diagnostics::{
    DiagnosticMetadata, DiagnosticOrigin, RawDiagnostic, ResolvedDiagnostic, TemplateOrigin,
};
pub use error::MapError;
pub use include_call::{find_include, IncludeCall, IncludeData, IncludeTarget};
pub use marker::{last_marker_before, stack_json, strip_markers, tag_lines, Marker, StackFrame};
pub use rewrite::{rewrite_statements, LoopScopes};
pub use splitter::{split, CodeLine, LineSplitter, CODE_CLOSE, CODE_OPEN};
pub use synth::{synthesize, SynthesizedFile};
