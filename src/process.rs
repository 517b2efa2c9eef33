//! Collaborators backed by external commands.
//!
//! - `CommandCompiler` pipes tagged template source to a command's stdin and
//!   reads the compiled output from its stdout.
//! - `CommandChecker` runs a command with the scratch file path as its last
//!   argument and reads JSON diagnostics from stdout, either one array or
//!   one object per line.
//!
//! Checkers usually exit non-zero when they report errors, so a failing exit
//! status is only an error when stdout is empty.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use lens_core::RawDiagnostic;
use tracing::debug;

use crate::collaborators::{TemplateCompiler, TypeChecker};
use crate::config::CommandSpec;
use crate::error::CollaboratorError;

fn display(spec: &CommandSpec) -> String {
    std::iter::once(spec.program.as_str())
        .chain(spec.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn failed(spec: &CommandSpec, output: &Output) -> CollaboratorError {
    CollaboratorError::Failed {
        command: display(spec),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn stdout_text(spec: &CommandSpec, output: Output) -> Result<String, CollaboratorError> {
    String::from_utf8(output.stdout).map_err(|e| CollaboratorError::Output {
        command: display(spec),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct CommandCompiler {
    spec: CommandSpec,
}

impl CommandCompiler {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl TemplateCompiler for CommandCompiler {
    fn compile(&self, source: &str) -> Result<String, CollaboratorError> {
        let spawn_error = |source| CollaboratorError::Spawn {
            command: display(&self.spec),
            source,
        };

        let mut child = Command::new(&self.spec.program)
            .args(&self.spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes()).map_err(spawn_error)?;
        }
        let output = child.wait_with_output().map_err(spawn_error)?;
        if !output.status.success() {
            return Err(failed(&self.spec, &output));
        }
        stdout_text(&self.spec, output)
    }
}

#[derive(Debug, Clone)]
pub struct CommandChecker {
    spec: CommandSpec,
}

impl CommandChecker {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

impl TypeChecker for CommandChecker {
    fn check(&self, path: &Path) -> Result<Vec<RawDiagnostic>, CollaboratorError> {
        let output = Command::new(&self.spec.program)
            .args(&self.spec.args)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CollaboratorError::Spawn {
                command: display(&self.spec),
                source,
            })?;

        if !output.status.success() && output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(failed(&self.spec, &output));
        }

        let text = stdout_text(&self.spec, output)?;
        let diagnostics = parse_diagnostics(&text).map_err(|e| CollaboratorError::Output {
            command: display(&self.spec),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), count = diagnostics.len(), "checker finished");
        Ok(diagnostics)
    }
}

/// Parse checker output: a JSON array, or one JSON object per line.
pub fn parse_diagnostics(text: &str) -> Result<Vec<RawDiagnostic>, serde_json::Error> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed);
    }
    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::DiagnosticOrigin;

    fn spec(program: &str, args: &[&str]) -> CommandSpec {
        CommandSpec {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_array_and_lines() {
        let array = r#"[{"message":"a","line":3},{"message":"b","line":4,"identifier":"x.y"}]"#;
        let parsed = parse_diagnostics(array).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].identifier.as_deref(), Some("x.y"));

        let lines = "{\"message\":\"a\",\"line\":3}\n\n{\"message\":\"b\",\"line\":9}\n";
        let parsed = parse_diagnostics(lines).unwrap();
        assert_eq!(parsed[1].line, 9);
        assert_eq!(parsed[0].origin, DiagnosticOrigin::Pending);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_diagnostics("").unwrap().is_empty());
        assert!(parse_diagnostics("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_diagnostics("Fatal error").is_err());
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let compiler = CommandCompiler::new(spec("/definitely/not/a/compiler", &[]));
        assert!(matches!(
            compiler.compile("x"),
            Err(CollaboratorError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_compiler_pipes_stdin() {
        let compiler = CommandCompiler::new(spec("cat", &[]));
        assert_eq!(compiler.compile("<p><?php echo 1; ?></p>").unwrap(), "<p><?php echo 1; ?></p>");
    }

    #[cfg(unix)]
    #[test]
    fn test_checker_reads_stdout_despite_failure_status() {
        let checker = CommandChecker::new(spec(
            "sh",
            &["-c", r#"echo '{"message":"m","line":2}'; exit 1"#, "checker"],
        ));
        let diagnostics = checker.check(Path::new("/tmp/x.php")).unwrap();
        assert_eq!(diagnostics, vec![RawDiagnostic::new("m", 2)]);
    }

    #[cfg(unix)]
    #[test]
    fn test_checker_failure_without_output() {
        let checker = CommandChecker::new(spec("sh", &["-c", "echo boom >&2; exit 3", "checker"]));
        match checker.check(Path::new("/tmp/x.php")) {
            Err(CollaboratorError::Failed { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
