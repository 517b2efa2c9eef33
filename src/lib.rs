//! blade-lens: type check Blade templates with a host PHP type checker
//!
//! The checker only ever sees one synthesized PHP file per entry point. This
//! crate drives the pipeline around the pure engine in `lens-core`:
//! - `analyser` runs one check (or a batch) end to end
//! - `include` expands nested templates recursively
//! - `collaborators` defines the compiler, checker and locator seams;
//!   `finder` and `process` implement them over the file system and
//!   external commands
//! - `scratch` names and writes the synthesized files
//! - `ledger` records which caller depends on which template
//! - `config` loads `blade-lens.yaml`

pub mod analyser;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod finder;
pub mod include;
pub mod ledger;
pub mod process;
pub mod scratch;

// Re-export commonly used types
pub use analyser::{Analyser, CheckOutcome, CheckRequest};
pub use collaborators::{TemplateCompiler, TemplateLocator, TypeChecker};
pub use config::{CommandSpec, ConfigLoader, LensConfig};
pub use error::{AnalysisError, CollaboratorError};
pub use finder::ViewFinder;
pub use include::IncludeExpander;
pub use ledger::{DependencyLedger, DependencyRecord};
pub use process::{CommandChecker, CommandCompiler};
pub use scratch::{scratch_path, write_scratch};

pub use lens_core::{
    DiagnosticMetadata, DiagnosticOrigin, RawDiagnostic, ResolvedDiagnostic, StackFrame,
    TemplateOrigin, TypeBinding, TypeBindings,
};
