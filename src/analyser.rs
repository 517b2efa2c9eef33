//! Analyser: one template entry point in, template-positioned diagnostics out.
//!
//! ```text
//! CheckRequest
//!   → locate template            (missing → no diagnostics)
//!   → ledger.record(caller, template)
//!   → IncludeExpander::render     (tag → compile → expand, recursively)
//!   → split                       (no code lines → no diagnostics, checker not run)
//!   → rewrite_statements
//!   → merge bindings + ambient → synthesize
//!   → write scratch file → TypeChecker::check
//!   → resolve_all → ignore filters
//! ```

use std::path::Path;

use lens_core::{
    resolve_all, rewrite_statements, split, synthesize, IncludeTarget, ResolvedDiagnostic,
    StackFrame, TypeBindings,
};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::collaborators::{TemplateCompiler, TemplateLocator, TypeChecker};
use crate::config::LensConfig;
use crate::error::AnalysisError;
use crate::include::IncludeExpander;
use crate::ledger::DependencyLedger;
use crate::scratch::write_scratch;

/// One call site asking for a template to be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub template_name: String,
    /// Types of the data passed explicitly at the call site.
    pub explicit: TypeBindings,
    /// Lower priority data; only fills names `explicit` lacks.
    pub merge: TypeBindings,
    /// The calling file and line.
    pub seed: StackFrame,
}

impl CheckRequest {
    pub fn new(template_name: impl Into<String>, seed: StackFrame) -> Self {
        Self {
            template_name: template_name.into(),
            explicit: TypeBindings::new(),
            merge: TypeBindings::new(),
            seed,
        }
    }

    pub fn with_explicit(mut self, explicit: TypeBindings) -> Self {
        self.explicit = explicit;
        self
    }

    pub fn with_merge(mut self, merge: TypeBindings) -> Self {
        self.merge = merge;
        self
    }
}

/// Result of one request in a batch.
#[derive(Debug)]
pub struct CheckOutcome {
    pub request: CheckRequest,
    pub result: Result<Vec<ResolvedDiagnostic>, AnalysisError>,
}

pub struct Analyser {
    compiler: Box<dyn TemplateCompiler>,
    checker: Box<dyn TypeChecker>,
    locator: Box<dyn TemplateLocator>,
    config: LensConfig,
    ledger: Option<DependencyLedger>,
    ignore: Vec<Regex>,
}

impl Analyser {
    pub fn new(
        compiler: Box<dyn TemplateCompiler>,
        checker: Box<dyn TypeChecker>,
        locator: Box<dyn TemplateLocator>,
        config: LensConfig,
    ) -> Result<Self, AnalysisError> {
        let ignore = config
            .ignore_errors
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| AnalysisError::IgnorePattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            compiler,
            checker,
            locator,
            config,
            ledger: None,
            ignore,
        })
    }

    /// Record (caller, template) dependencies on every check.
    pub fn with_ledger(mut self, ledger: DependencyLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn config(&self) -> &LensConfig {
        &self.config
    }

    /// Check a template whose name is given as a host expression.
    ///
    /// A computed name cannot be followed and yields no diagnostics.
    pub fn check_expression(
        &self,
        name_expr: &str,
        explicit: TypeBindings,
        merge: TypeBindings,
        seed: StackFrame,
    ) -> Result<Vec<ResolvedDiagnostic>, AnalysisError> {
        match IncludeTarget::classify(name_expr) {
            IncludeTarget::Literal(name) => self.check(
                &CheckRequest::new(name, seed)
                    .with_explicit(explicit)
                    .with_merge(merge),
            ),
            IncludeTarget::Dynamic(expr) => {
                debug!(expr = %expr, caller = %seed.file, "template name is computed at runtime, skipping");
                Ok(Vec::new())
            }
        }
    }

    pub fn check(&self, request: &CheckRequest) -> Result<Vec<ResolvedDiagnostic>, AnalysisError> {
        let name = request.template_name.as_str();
        let Some(path) = self.locator.locate(name) else {
            debug!(template = name, "template not found, nothing to check");
            return Ok(Vec::new());
        };

        if let Some(ledger) = &self.ledger {
            ledger.record(&request.seed.file, &path)?;
        }

        let stack = vec![request.seed.clone()];
        let expander = IncludeExpander::new(
            self.compiler.as_ref(),
            self.locator.as_ref(),
            self.config.max_include_depth,
        );
        let expanded = expander.render(name, &path, &stack)?;

        let mut code_lines = split(&expanded).map_err(AnalysisError::template(name))?;
        if code_lines.is_empty() {
            debug!(template = name, "no host code, checker not invoked");
            return Ok(Vec::new());
        }
        rewrite_statements(&mut code_lines, &self.config.loop_variable_type)
            .map_err(AnalysisError::template(name))?;

        let bindings = TypeBindings::merge(&request.explicit, &request.merge)
            .with_ambient(&self.config.ambient_bindings);
        let file = synthesize(&bindings, &code_lines);

        let template_path = path.to_string_lossy();
        let scratch = write_scratch(&self.config.scratch_dir, &template_path, &stack, &file.text())?;
        let raw = self
            .checker
            .check(&scratch)
            .map_err(|source| AnalysisError::Checker {
                path: scratch.clone(),
                source,
            })?;

        let reported = raw.len();
        let diagnostics = self.filter(resolve_all(raw, &file, &scratch)?);
        info!(
            template = name,
            caller = %request.seed.file,
            code_lines = code_lines.len(),
            reported,
            kept = diagnostics.len(),
            "checked template"
        );
        Ok(diagnostics)
    }

    /// Check every request; a fatal error affects only its own request.
    pub fn check_all<'r, I>(&self, requests: I) -> Vec<CheckOutcome>
    where
        I: IntoIterator<Item = &'r CheckRequest>,
    {
        requests
            .into_iter()
            .map(|request| {
                let result = self.check(request);
                if let Err(error) = &result {
                    warn!(
                        template = %request.template_name,
                        caller = %request.seed.file,
                        line = request.seed.line,
                        %error,
                        "template check aborted"
                    );
                }
                CheckOutcome {
                    request: request.clone(),
                    result,
                }
            })
            .collect()
    }

    fn filter(&self, diagnostics: Vec<ResolvedDiagnostic>) -> Vec<ResolvedDiagnostic> {
        if self.ignore.is_empty() {
            return diagnostics;
        }
        diagnostics
            .into_iter()
            .filter(|d| !self.ignore.iter().any(|re| re.is_match(&d.message)))
            .collect()
    }

    /// Scratch directory used for synthesized files.
    pub fn scratch_dir(&self) -> &Path {
        &self.config.scratch_dir
    }
}
