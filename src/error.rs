//! Error types for the analysis pipeline
//!
//! `AnalysisError` aborts the check of one entry point. Batch callers
//! (`Analyser::check_all`) isolate it per request; nothing here is retried.

use std::path::PathBuf;

use lens_core::MapError;
use thiserror::Error;

/// Failure of an external collaborator process.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("unreadable output from `{command}`: {reason}")]
    Output { command: String, reason: String },
}

/// Errors that abort the analysis of one template entry point.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A structural invariant failed while processing a specific template.
    #[error("template '{template}': {source}")]
    Template {
        template: String,
        #[source]
        source: MapError,
    },

    #[error(transparent)]
    Map(#[from] MapError),

    /// Include chain revisits a template or exceeds the configured depth.
    #[error("include cycle or depth limit: {}", .chain.join(" -> "))]
    IncludeCycle { chain: Vec<String> },

    #[error("compiling template '{template}': {source}")]
    Compiler {
        template: String,
        #[source]
        source: CollaboratorError,
    },

    /// The checker failed on a scratch file; the file is left in place.
    #[error("type checking {} (see that file): {source}", .path.display())]
    Checker {
        path: PathBuf,
        #[source]
        source: CollaboratorError,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ignore pattern {pattern:?}: {source}")]
    IgnorePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl AnalysisError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn template(template: impl Into<String>) -> impl FnOnce(MapError) -> Self {
        let template = template.into();
        move |source| Self::Template { template, source }
    }
}
