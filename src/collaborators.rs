//! External collaborators of the pipeline.
//!
//! The engine never compiles templates, infers types or searches the file
//! system for views itself. It talks to these three seams; `finder` and
//! `process` hold the concrete implementations used by the CLI, tests plug in
//! fakes.

use std::path::{Path, PathBuf};

use lens_core::RawDiagnostic;

use crate::error::CollaboratorError;

/// Template source in, mixed markup and host code out.
///
/// Must be deterministic and must copy `/** ... */` comments through
/// untouched, otherwise markers are lost.
pub trait TemplateCompiler {
    fn compile(&self, source: &str) -> Result<String, CollaboratorError>;
}

/// Runs the host type checker over one synthesized file.
pub trait TypeChecker {
    fn check(&self, path: &Path) -> Result<Vec<RawDiagnostic>, CollaboratorError>;
}

/// Maps a template name (`users.show`, `mail::layout`) to its file.
pub trait TemplateLocator {
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

impl<F> TemplateLocator for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self(name)
    }
}
