//! Shared fixtures for pipeline integration tests.
//!
//! - `FakeBlade`: a line-preserving Blade compiler covering `{{ }}`,
//!   `@include`, `@foreach` and `@endforeach`
//! - `NeedleChecker`: reports a fixed message on every synthesized line that
//!   contains a needle, and logs which files it was asked to check
//! - `Views`: a temporary view directory with a `ViewFinder` over it

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use blade_lens::{
    Analyser, CollaboratorError, LensConfig, RawDiagnostic, TemplateCompiler, TypeChecker,
    ViewFinder,
};
use regex::{Captures, NoExpand, Regex};

static ECHO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\s*(.+?)\s*\}\}").unwrap());
static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@include\(\s*('[^']*'|"[^"]*"|\$\w+)\s*(?:,\s*(\[.*\]))?\s*\)"#).unwrap()
});
static FOREACH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@foreach\s*\((.+?)\s+as\s+(.+)\)").unwrap());
static ENDFOREACH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@endforeach").unwrap());

pub const EXCEPT_LOCALS: &str =
    r"\Illuminate\Support\Arr::except(get_defined_vars(), ['__data', '__path'])";

pub struct FakeBlade;

impl TemplateCompiler for FakeBlade {
    fn compile(&self, source: &str) -> Result<String, CollaboratorError> {
        let out = INCLUDE_RE.replace_all(source, |caps: &Captures| {
            let data = caps
                .get(2)
                .map(|m| format!("{}, ", m.as_str()))
                .unwrap_or_default();
            format!(
                "<?php echo $__env->make({}, {data}{EXCEPT_LOCALS})->render(); ?>",
                &caps[1]
            )
        });
        let out = FOREACH_RE.replace_all(&out, |caps: &Captures| {
            format!(
                "<?php $__currentLoopData = {}; $__env->addLoop($__currentLoopData); foreach($__currentLoopData as {}): $__env->incrementLoopIndices(); $loop = $__env->getLastLoop(); ?>",
                &caps[1], &caps[2]
            )
        });
        let out = ENDFOREACH_RE.replace_all(
            &out,
            NoExpand("<?php endforeach; $__env->popLoop(); $loop = $__env->getLastLoop(); ?>"),
        );
        let out = ECHO_RE.replace_all(&out, "<?php echo e($1); ?>");
        Ok(out.into_owned())
    }
}

/// Drops everything but plain markup; output carries no markers.
pub struct MarkupOnly;

impl TemplateCompiler for MarkupOnly {
    fn compile(&self, _source: &str) -> Result<String, CollaboratorError> {
        Ok("<html>\n<body>hello</body>\n</html>\n".to_string())
    }
}

/// Emits host code before the first tagged line.
pub struct Preamble;

impl TemplateCompiler for Preamble {
    fn compile(&self, source: &str) -> Result<String, CollaboratorError> {
        Ok(format!("<?php $__preamble = 1; ?>\n{source}"))
    }
}

#[derive(Clone, Default)]
pub struct NeedleChecker {
    rules: Vec<(String, String)>,
    extra: Vec<RawDiagnostic>,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl NeedleChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, needle: &str, message: &str) -> Self {
        self.rules.push((needle.to_string(), message.to_string()));
        self
    }

    /// Always reported, after the rule matches.
    pub fn extra(mut self, diagnostic: RawDiagnostic) -> Self {
        self.extra.push(diagnostic);
        self
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl TypeChecker for NeedleChecker {
    fn check(&self, path: &Path) -> Result<Vec<RawDiagnostic>, CollaboratorError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        let text = fs::read_to_string(path).map_err(|source| CollaboratorError::Spawn {
            command: "needle-checker".into(),
            source,
        })?;

        let mut out = Vec::new();
        for (index, line) in text.lines().enumerate() {
            for (needle, message) in &self.rules {
                if line.contains(needle.as_str()) {
                    out.push(RawDiagnostic::new(message.clone(), index as u32 + 1));
                }
            }
        }
        out.extend(self.extra.iter().cloned());
        Ok(out)
    }
}

pub struct Views {
    pub dir: tempfile::TempDir,
}

impl Views {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let views = dir.path().join("views");
        for (name, body) in files {
            let path = views.join(format!("{}.blade.php", name.replace('.', "/")));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        Self { dir }
    }

    pub fn path(&self, name: &str) -> String {
        self.dir
            .path()
            .join("views")
            .join(format!("{}.blade.php", name.replace('.', "/")))
            .to_string_lossy()
            .into_owned()
    }

    pub fn config(&self) -> LensConfig {
        LensConfig {
            view_paths: vec![self.dir.path().join("views")],
            scratch_dir: self.dir.path().join("scratch"),
            ..LensConfig::default()
        }
    }

    pub fn finder(&self) -> ViewFinder {
        ViewFinder::from_config(&self.config())
    }

    pub fn analyser(&self, checker: &NeedleChecker) -> Analyser {
        self.analyser_with(Box::new(FakeBlade), checker, self.config())
    }

    pub fn analyser_with(
        &self,
        compiler: Box<dyn TemplateCompiler>,
        checker: &NeedleChecker,
        config: LensConfig,
    ) -> Analyser {
        Analyser::new(
            compiler,
            Box::new(checker.clone()),
            Box::new(ViewFinder::from_config(&config)),
            config,
        )
        .unwrap()
    }
}
