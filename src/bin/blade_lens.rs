//! blade-lens command line interface
//!
//! # Usage
//!
//! ```bash
//! # Check one template as rendered from a controller
//! blade_lens check users.show --bind user='App\Models\User' --caller app/Http/UserController.php:31
//!
//! # Same, machine-readable
//! blade_lens -o json check users.show --bind user='App\Models\User'
//!
//! # Name given as a host expression, as written at the call site
//! blade_lens check --expr "'users.' . \$action"
//!
//! # Callers whose templates changed since they were last checked
//! blade_lens stale
//! ```
//!
//! Compiler and checker commands come from `blade-lens.yaml` (or the file
//! named by `BLADE_LENS_CONFIG`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use blade_lens::{
    AnalysisError, Analyser, CheckRequest, CommandChecker, CommandCompiler, ConfigLoader, DependencyLedger, LensConfig,
    ResolvedDiagnostic, StackFrame, TypeBinding, TypeBindings, ViewFinder,
};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blade_lens")]
#[command(version = "0.1.0")]
#[command(about = "Type check Blade templates and report errors at template lines")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to BLADE_LENS_CONFIG, then ./blade-lens.yaml)
    #[arg(long, short, global = true, env = "BLADE_LENS_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one template
    Check {
        /// Template name (`users.show`, `mail::layout`)
        template: String,

        /// Treat the template argument as a host expression (`'users.show'`)
        #[arg(long)]
        expr: bool,

        /// Explicit data type, `name=type` (repeatable)
        #[arg(long = "bind", value_parser = parse_binding)]
        bindings: Vec<TypeBinding>,

        /// Lower priority data type, `name=type` (repeatable)
        #[arg(long = "merge", value_parser = parse_binding)]
        merge: Vec<TypeBinding>,

        /// Calling file and line, `path:line`
        #[arg(long, default_value = "cli:1", value_parser = parse_caller)]
        caller: StackFrame,

        /// Also record the dependency in the ledger
        #[arg(long)]
        record: bool,
    },

    /// List callers whose templates changed since they were recorded
    Stale,
}

fn parse_binding(raw: &str) -> Result<TypeBinding, String> {
    let (name, ty) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=type, got {raw:?}"))?;
    if name.trim().is_empty() || ty.trim().is_empty() {
        return Err(format!("expected name=type, got {raw:?}"));
    }
    Ok(TypeBinding::new(name, ty.trim()))
}

fn parse_caller(raw: &str) -> Result<StackFrame, String> {
    let (file, line) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("expected path:line, got {raw:?}"))?;
    let line = line
        .parse()
        .map_err(|e| format!("bad line number in {raw:?}: {e}"))?;
    Ok(StackFrame::new(file, line))
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let loader = match &cli.config {
        Some(path) => ConfigLoader::new(path),
        None => ConfigLoader::from_env(),
    };

    let result = loader.load().and_then(|config| match cli.command {
        Commands::Check {
            template,
            expr,
            bindings,
            merge,
            caller,
            record,
        } => cmd_check(
            config,
            &template,
            expr,
            bindings,
            merge,
            caller,
            record,
            cli.format,
        ),
        Commands::Stale => cmd_stale(&config, cli.format),
    });

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::from(2)
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Returns `Ok(false)` when diagnostics were found.
#[allow(clippy::too_many_arguments)]
fn cmd_check(
    config: LensConfig,
    template: &str,
    expr: bool,
    bindings: Vec<TypeBinding>,
    merge: Vec<TypeBinding>,
    caller: StackFrame,
    record: bool,
    format: OutputFormat,
) -> Result<bool> {
    let compiler = config
        .compiler
        .clone()
        .ok_or_else(|| anyhow!("no `compiler` command configured"))?;
    let checker = config
        .checker
        .clone()
        .ok_or_else(|| anyhow!("no `checker` command configured"))?;
    let ledger = DependencyLedger::in_dir(&config.scratch_dir);

    let mut analyser = Analyser::new(
        Box::new(CommandCompiler::new(compiler)),
        Box::new(CommandChecker::new(checker)),
        Box::new(ViewFinder::from_config(&config)),
        config,
    )?;
    if record {
        analyser = analyser.with_ledger(ledger);
    }

    let diagnostics = run_check(
        &analyser,
        template,
        expr,
        bindings.into_iter().collect(),
        merge.into_iter().collect(),
        caller,
    )
    .with_context(|| format!("checking {template}"))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&diagnostics)?),
        OutputFormat::Text => print_text(&diagnostics),
    }
    Ok(diagnostics.is_empty())
}

/// A plain name is checked as given; `expr` classifies it as a host expression first.
fn run_check(
    analyser: &Analyser,
    template: &str,
    expr: bool,
    explicit: TypeBindings,
    merge: TypeBindings,
    caller: StackFrame,
) -> Result<Vec<ResolvedDiagnostic>, AnalysisError> {
    if expr {
        return analyser.check_expression(template, explicit, merge, caller);
    }
    analyser.check(
        &CheckRequest::new(template, caller)
            .with_explicit(explicit)
            .with_merge(merge),
    )
}

fn print_text(diagnostics: &[ResolvedDiagnostic]) {
    if diagnostics.is_empty() {
        println!("{} no errors", "OK".green().bold());
        return;
    }

    let mut current: Option<(&str, Option<&StackFrame>)> = None;
    for diagnostic in diagnostics {
        let group = (diagnostic.file.as_str(), diagnostic.caller());
        if current != Some(group) {
            let from = group
                .1
                .map(|frame| format!(" (from {}:{})", frame.file, frame.line))
                .unwrap_or_default();
            println!("{}{}", diagnostic.file.yellow(), from.dimmed());
            current = Some(group);
        }
        println!(
            "  {:>5}  {}",
            diagnostic.line.to_string().cyan(),
            diagnostic.message
        );
        if diagnostic.metadata.stack.len() > 1 {
            let via: Vec<String> = diagnostic.metadata.stack[1..]
                .iter()
                .map(|f| format!("{}:{}", f.name.as_deref().unwrap_or(&f.file), f.line))
                .collect();
            println!("         {} {}", "via".dimmed(), via.join(" -> "));
        }
    }
    println!("{} {} error(s)", "FAIL".red().bold(), diagnostics.len());
}

/// Returns `Ok(false)` when any caller is stale.
fn cmd_stale(config: &LensConfig, format: OutputFormat) -> Result<bool> {
    let ledger = DependencyLedger::in_dir(&config.scratch_dir);
    let stale = ledger
        .stale_callers()
        .with_context(|| format!("reading {}", ledger.path().display()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stale)?),
        OutputFormat::Text => {
            if stale.is_empty() {
                println!("{} nothing stale", "OK".green().bold());
            }
            for caller in &stale {
                println!("{} {}", "stale".yellow(), caller);
            }
        }
    }
    Ok(stale.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use blade_lens::{CollaboratorError, RawDiagnostic, TemplateCompiler, TypeChecker};

    struct Identity;

    impl TemplateCompiler for Identity {
        fn compile(&self, source: &str) -> Result<String, CollaboratorError> {
            Ok(source.to_string())
        }
    }

    /// Reports every line that reads `->email`.
    struct EmailChecker;

    impl TypeChecker for EmailChecker {
        fn check(&self, path: &Path) -> Result<Vec<RawDiagnostic>, CollaboratorError> {
            let text = fs::read_to_string(path).map_err(|source| CollaboratorError::Spawn {
                command: "email-checker".into(),
                source,
            })?;
            Ok(text
                .lines()
                .enumerate()
                .filter(|(_, line)| line.contains("->email"))
                .map(|(index, _)| {
                    RawDiagnostic::new("Undefined property $email.", index as u32 + 1)
                })
                .collect())
        }
    }

    fn analyser(dir: &Path) -> Analyser {
        let view = dir.join("profile.blade.php");
        fs::write(&view, "<?php echo $user->email; ?>").unwrap();
        let config = LensConfig {
            scratch_dir: dir.join("scratch"),
            ..LensConfig::default()
        };
        Analyser::new(
            Box::new(Identity),
            Box::new(EmailChecker),
            Box::new(move |name: &str| (name == "profile").then(|| view.clone())),
            config,
        )
        .unwrap()
    }

    fn user() -> TypeBindings {
        [("user", "App\\Models\\User")].into_iter().collect()
    }

    #[test]
    fn test_check_parses_unquoted_name() {
        let cli = Cli::try_parse_from([
            "blade_lens",
            "check",
            "users.show",
            "--bind",
            "user=App\\User",
        ])
        .unwrap();
        let Commands::Check {
            template,
            expr,
            bindings,
            caller,
            ..
        } = cli.command
        else {
            panic!("expected check");
        };
        assert_eq!(template, "users.show");
        assert!(!expr);
        assert_eq!(bindings.len(), 1);
        assert_eq!(caller, StackFrame::new("cli", 1));
    }

    #[test]
    fn test_unquoted_name_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let analyser = analyser(dir.path());

        let diagnostics = run_check(
            &analyser,
            "profile",
            false,
            user(),
            TypeBindings::new(),
            StackFrame::new("cli", 1),
        )
        .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 1);
    }

    #[test]
    fn test_expr_flag_classifies_the_name() {
        let dir = tempfile::tempdir().unwrap();
        let analyser = analyser(dir.path());
        let caller = StackFrame::new("cli", 1);

        let quoted = run_check(
            &analyser,
            "'profile'",
            true,
            user(),
            TypeBindings::new(),
            caller.clone(),
        )
        .unwrap();
        assert_eq!(quoted.len(), 1);

        let computed = run_check(
            &analyser,
            "'prof' . $suffix",
            true,
            user(),
            TypeBindings::new(),
            caller,
        )
        .unwrap();
        assert!(computed.is_empty());
    }

    #[test]
    fn test_parse_caller() {
        assert_eq!(
            parse_caller("app/Http/UserController.php:31").unwrap(),
            StackFrame::new("app/Http/UserController.php", 31)
        );
        assert!(parse_caller("no-line").is_err());
    }
}
