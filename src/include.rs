//! Include Expander
//!
//! Recursively inlines nested templates into the compiled output of their
//! parent, so one synthesized file covers a whole include tree.
//!
//! ```text
//! render(name, path, stack)
//!   ├─ read source, tag every line with a marker carrying `stack`
//!   ├─ compile
//!   └─ expand: for each include call in the compiled text
//!        ├─ dynamic name      → delete the call
//!        ├─ not locatable     → delete the call
//!        └─ literal name      → render(nested, stack + [parent frame]) and splice
//! ```
//!
//! A spliced include replaces `echo $__env->make(...)->render();` inside the
//! parent's code block with:
//!
//! ```text
//! <shadow statements> ?>
//! <nested compiled output>
//! <parent marker><?php <restore statements>
//! ```
//!
//! The nested output keeps its own markers, whose stacks are one frame
//! longer than the parent's. Restore statements sit under the parent's marker
//! again so anything reported there maps back to the call site.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use lens_core::{
    find_include, last_marker_before, tag_lines, IncludeCall, IncludeTarget, MapError, StackFrame,
};
use regex::Regex;
use tracing::{debug, warn};

use crate::collaborators::{TemplateCompiler, TemplateLocator};
use crate::error::AnalysisError;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

pub struct IncludeExpander<'a> {
    compiler: &'a dyn TemplateCompiler,
    locator: &'a dyn TemplateLocator,
    max_depth: usize,
}

impl<'a> IncludeExpander<'a> {
    pub fn new(
        compiler: &'a dyn TemplateCompiler,
        locator: &'a dyn TemplateLocator,
        max_depth: usize,
    ) -> Self {
        Self {
            compiler,
            locator,
            max_depth,
        }
    }

    /// Tag, compile and expand the template at `path`.
    pub fn render(
        &self,
        name: &str,
        path: &Path,
        stack: &[StackFrame],
    ) -> Result<String, AnalysisError> {
        let mut chain = Vec::new();
        self.render_in_chain(name, path, stack, &mut chain)
    }

    /// `chain` holds the names of the templates being expanded, outermost first.
    fn render_in_chain(
        &self,
        name: &str,
        path: &Path,
        stack: &[StackFrame],
        chain: &mut Vec<String>,
    ) -> Result<String, AnalysisError> {
        let source = fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
        let tagged = tag_lines(&source, name, &path.to_string_lossy(), stack);
        let compiled = self
            .compiler
            .compile(&tagged)
            .map_err(|source| AnalysisError::Compiler {
                template: name.to_string(),
                source,
            })?;

        chain.push(name.to_string());
        let expanded = self.expand(compiled, chain);
        chain.pop();
        expanded
    }

    fn expand(&self, mut text: String, chain: &mut Vec<String>) -> Result<String, AnalysisError> {
        let template = chain.last().cloned().unwrap_or_default();
        let mut pos = 0;

        while let Some(call) = find_include(&text, pos).map_err(AnalysisError::template(&template))? {
            let replacement = match &call.target {
                IncludeTarget::Dynamic(expr) => {
                    debug!(template = %template, expr = %expr, "skipping include with a computed name");
                    String::new()
                }
                IncludeTarget::Literal(nested) => self.splice(&text, &call, nested, chain)?,
            };
            text.replace_range(call.range.clone(), &replacement);
            pos = call.range.start;
        }

        Ok(text)
    }

    fn splice(
        &self,
        text: &str,
        call: &IncludeCall,
        nested: &str,
        chain: &mut Vec<String>,
    ) -> Result<String, AnalysisError> {
        if chain.iter().any(|name| name == nested) || chain.len() > self.max_depth {
            let mut cycle = chain.clone();
            cycle.push(nested.to_string());
            return Err(AnalysisError::IncludeCycle { chain: cycle });
        }

        let parent = last_marker_before(text, call.range.start).ok_or_else(|| {
            let line = text[..call.range.start].matches('\n').count() + 1;
            let content = text[call.range.clone()].to_string();
            AnalysisError::template(chain.last().cloned().unwrap_or_default())(
                MapError::MissingMarker { line, content },
            )
        })?;

        let Some(path) = self.locator.locate(nested) else {
            warn!(template = %parent.template_name, nested, "included template not found");
            return Ok(String::new());
        };

        let mut stack = parent.stack.clone();
        stack.push(StackFrame::named(
            parent.template_path.clone(),
            parent.line,
            parent.template_name.clone(),
        ));
        debug!(
            nested,
            parent = %parent.template_name,
            line = parent.line,
            depth = stack.len(),
            "expanding include"
        );

        let fragment = self.render_in_chain(nested, &path, &stack, chain)?;
        let shadow = Shadow::new(chain.len(), &call.data_pairs());

        Ok(format!(
            "{} ?>\n{}\n{}<?php {}",
            shadow.enter(),
            fragment,
            parent.encode(),
            shadow.leave()
        ))
    }
}

/// Save/assign and restore statements for an include's explicit data.
///
/// Every argument is evaluated into a temporary before any name is
/// shadowed, so `['a' => $b, 'b' => $a]` sees the caller's values.
#[derive(Debug)]
struct Shadow {
    depth: usize,
    names: Vec<(String, String)>,
}

impl Shadow {
    fn new(depth: usize, pairs: &[(String, String)]) -> Self {
        let names = pairs
            .iter()
            .filter(|(name, _)| {
                let valid = IDENTIFIER_RE.is_match(name);
                if !valid {
                    debug!(key = %name, "data key is not a variable name, not shadowed");
                }
                valid
            })
            .cloned()
            .collect();
        Self { depth, names }
    }

    fn enter(&self) -> String {
        let d = self.depth;
        let mut out: Vec<String> = self
            .names
            .iter()
            .map(|(name, expr)| format!("$__lens_arg_{d}_{name} = {expr};"))
            .collect();
        for (name, _) in &self.names {
            out.push(format!(
                "$__lens_had_{d}_{name} = array_key_exists('{name}', get_defined_vars()); \
                 $__lens_saved_{d}_{name} = ${name} ?? null; \
                 ${name} = $__lens_arg_{d}_{name};"
            ));
        }
        out.join(" ")
    }

    fn leave(&self) -> String {
        let d = self.depth;
        self.names
            .iter()
            .rev()
            .map(|(name, _)| {
                format!(
                    "if ($__lens_had_{d}_{name}) {{ ${name} = $__lens_saved_{d}_{name}; }} else {{ unset(${name}); }} \
                     unset($__lens_arg_{d}_{name}, $__lens_saved_{d}_{name}, $__lens_had_{d}_{name});"
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
