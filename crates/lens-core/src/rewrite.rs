//! Statement rewrites applied to code lines before synthesis.
//!
//! Two rewrites remove false positives the checker would otherwise report:
//!
//! 1. Escape unwrapping: `echo e(EXPR);` becomes `echo EXPR;`. The escape
//!    helper accepts almost anything, so leaving it in place hides the type
//!    of the echoed expression.
//! 2. Loop typing: compiled loops iterate over `$__currentLoopData`, which the
//!    checker cannot see through. The foreach header is rewritten to iterate
//!    the assigned expression, the outermost loop declares the `$loop`
//!    helper's type, and `$loop` is unset again when that loop closes.
//!
//! Loop nesting is tracked in an explicit `LoopScopes` stack threaded through
//! the rewrite, never in shared state.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::MapError;
use crate::scan::{matching_close, statement_len};
use crate::splitter::CodeLine;

static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\becho\s+e\s*\(").unwrap());

static LOOP_EVENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<assign>\$__currentLoopData\s*=[^=>])|(?P<foreach>\bforeach\s*\(\s*\$__currentLoopData\s+as\b)|(?P<plain>\bforeach\s*\()|(?P<end>\bendforeach\s*;)",
    )
    .unwrap()
});

/// Loop nesting state carried across code lines.
#[derive(Debug, Default)]
pub struct LoopScopes {
    /// Expression from the last `$__currentLoopData = ...;`, not yet consumed.
    pending: Option<String>,
    /// Each open alternative-syntax loop, outermost first. `Some` holds the
    /// iterated expression of a template loop, `None` marks a plain one.
    open: Vec<Option<String>>,
}

impl LoopScopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Whether a template loop (one that defines `$loop`) is open.
    fn in_template_loop(&self) -> bool {
        self.open.iter().any(Option::is_some)
    }
}

/// Apply all rewrites to `lines` in order.
pub fn rewrite_statements(lines: &mut [CodeLine], loop_type: &str) -> Result<(), MapError> {
    let mut scopes = LoopScopes::new();
    for line in lines.iter_mut() {
        line.code = unwrap_escapes(&line.code);
        line.code = rewrite_loops(line, &mut scopes, loop_type)?;
    }
    if scopes.depth() > 0 {
        debug!(open = scopes.depth(), "loops still open at end of template");
    }
    Ok(())
}

/// `echo e(EXPR);` → `echo EXPR;`
pub fn unwrap_escapes(code: &str) -> String {
    let mut code = code.to_string();
    let mut pos = 0;
    while let Some(found) = ESCAPE_RE.find_at(&code, pos) {
        let (start, end) = (found.start(), found.end());
        let open = end - 1;
        let Some(close) = matching_close(&code, open) else {
            break;
        };
        let after = &code[close + 1..];
        if !after.trim_start().starts_with(';') {
            pos = end;
            continue;
        }

        let inner = code[open + 1..close].trim().to_string();
        let replaced = format!("echo {inner}");
        code.replace_range(start..=close, &replaced);
        pos = start + replaced.len();
    }
    code
}

fn rewrite_loops(
    line: &CodeLine,
    scopes: &mut LoopScopes,
    loop_type: &str,
) -> Result<String, MapError> {
    let mut code = line.code.clone();
    let mut pos = 0;

    while let Some(caps) = LOOP_EVENT_RE.captures_at(&code, pos) {
        let Some(event) = caps.get(0) else {
            break;
        };
        let (start, end) = (event.start(), event.end());

        if caps.name("assign").is_some() {
            // The match includes one char past `=`; the expression starts after `=`.
            let expr_start = code[start..end].find('=').map(|i| start + i + 1).unwrap_or(end);
            let rest = &code[expr_start..];
            let expr_end = statement_len(rest);
            scopes.pending = Some(rest[..expr_end].trim().to_string());
            pos = expr_start + expr_end;
        } else if caps.name("foreach").is_some() {
            let source = scopes
                .pending
                .take()
                .ok_or_else(|| MapError::UnboundLoopData {
                    template_path: line.marker.template_path.clone(),
                    line: line.marker.line,
                })?;
            let header = format!("foreach({source} as");
            code.replace_range(start..end, &header);
            pos = start + header.len();

            if !scopes.in_template_loop() {
                let paren = start + "foreach".len();
                if let Some(colon) = header_colon(&code, paren) {
                    let doc = format!(" /** @var {loop_type} $loop */");
                    code.insert_str(colon + 1, &doc);
                    pos = colon + 1 + doc.len();
                }
            }
            scopes.open.push(Some(source));
        } else if caps.name("plain").is_some() {
            // Brace-syntax loops never reach `endforeach;`.
            if header_colon(&code, end - 1).is_some() {
                scopes.open.push(None);
            }
            pos = end;
        } else {
            match scopes.open.pop() {
                Some(Some(_)) if !scopes.in_template_loop() => {
                    code.insert_str(start, "unset($loop); ");
                    pos = end + "unset($loop); ".len();
                }
                _ => pos = end,
            }
        }
    }

    Ok(code)
}

/// Position of the `:` that ends an alternative-syntax foreach header.
fn header_colon(code: &str, paren: usize) -> Option<usize> {
    let close = matching_close(code, paren)?;
    let after = &code[close + 1..];
    let skipped = after.len() - after.trim_start().len();
    after.trim_start().starts_with(':').then_some(close + 1 + skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Marker;
    use pretty_assertions::assert_eq;

    const LOOP: &str = "\\Illuminate\\View\\Loop";

    fn line(n: u32, code: &str) -> CodeLine {
        CodeLine::new(Marker::new("t", "/t.blade.php", n, vec![]), code)
    }

    fn rewrite(codes: &[&str]) -> Result<Vec<String>, MapError> {
        let mut lines: Vec<CodeLine> = codes
            .iter()
            .enumerate()
            .map(|(i, c)| line(i as u32 + 1, c))
            .collect();
        rewrite_statements(&mut lines, LOOP)?;
        Ok(lines.into_iter().map(|l| l.code).collect())
    }

    #[test]
    fn test_unwrap_escape() {
        assert_eq!(unwrap_escapes("echo e($user->email);;"), "echo $user->email;;");
        assert_eq!(
            unwrap_escapes("echo e(f($a, ')')); echo e($b);"),
            "echo f($a, ')'); echo $b;"
        );
    }

    #[test]
    fn test_unwrap_leaves_other_calls() {
        assert_eq!(unwrap_escapes("echo e($a) . 'x';"), "echo e($a) . 'x';");
        assert_eq!(unwrap_escapes("echo date($a);"), "echo date($a);");
    }

    #[test]
    fn test_single_loop() {
        let out = rewrite(&[
            "$__currentLoopData = $users; $__env->addLoop($__currentLoopData); foreach($__currentLoopData as $user): $__env->incrementLoopIndices(); $loop = $__env->getLastLoop();;",
            "echo e($user->email);;",
            "endforeach; $__env->popLoop(); $loop = $__env->getLastLoop();;",
        ])
        .unwrap();
        assert_eq!(
            out,
            vec![
                "$__currentLoopData = $users; $__env->addLoop($__currentLoopData); foreach($users as $user): /** @var \\Illuminate\\View\\Loop $loop */ $__env->incrementLoopIndices(); $loop = $__env->getLastLoop();;".to_string(),
                "echo $user->email;;".to_string(),
                "unset($loop); endforeach; $__env->popLoop(); $loop = $__env->getLastLoop();;".to_string(),
            ]
        );
    }

    #[test]
    fn test_nested_loops_type_only_outermost() {
        let out = rewrite(&[
            "$__currentLoopData = $users; foreach($__currentLoopData as $user):;",
            "$__currentLoopData = ['one', 'two']; foreach($__currentLoopData as $text):;",
            "endforeach;;",
            "endforeach;;",
        ])
        .unwrap();
        assert!(out[0].contains("foreach($users as $user): /** @var"));
        assert_eq!(
            out[1],
            "$__currentLoopData = ['one', 'two']; foreach(['one', 'two'] as $text):;"
        );
        assert_eq!(out[2], "endforeach;;");
        assert_eq!(out[3], "unset($loop); endforeach;;");
    }

    #[test]
    fn test_plain_loop_inside_template_loop_keeps_loop_variable() {
        let out = rewrite(&[
            "$__currentLoopData = $users; foreach($__currentLoopData as $user):;",
            "foreach ($user->tags as $tag):;",
            "endforeach;;",
            "echo $loop->index;;",
            "endforeach;;",
        ])
        .unwrap();
        assert_eq!(out[1], "foreach ($user->tags as $tag):;");
        assert_eq!(out[2], "endforeach;;");
        assert_eq!(out[3], "echo $loop->index;;");
        assert_eq!(out[4], "unset($loop); endforeach;;");
    }

    #[test]
    fn test_template_loop_inside_plain_loop() {
        let out = rewrite(&[
            "foreach ($groups as $group):;",
            "$__currentLoopData = $group; foreach($__currentLoopData as $item):;",
            "endforeach;;",
            "endforeach;;",
        ])
        .unwrap();
        assert!(out[1].contains("foreach($group as $item): /** @var"));
        assert_eq!(out[2], "unset($loop); endforeach;;");
        assert_eq!(out[3], "endforeach;;");
    }

    #[test]
    fn test_brace_loop_is_not_a_scope() {
        let out = rewrite(&[
            "$__currentLoopData = $users; foreach($__currentLoopData as $user):;",
            "foreach ($user->tags as $tag) { echo $tag; };",
            "endforeach;;",
        ])
        .unwrap();
        assert_eq!(out[2], "unset($loop); endforeach;;");
    }

    #[test]
    fn test_foreach_without_assignment_fails() {
        let err = rewrite(&["foreach($__currentLoopData as $x):;"]).unwrap_err();
        assert_eq!(
            err,
            MapError::UnboundLoopData {
                template_path: "/t.blade.php".into(),
                line: 1
            }
        );
    }

    #[test]
    fn test_stray_endforeach_untouched() {
        let out = rewrite(&["endforeach;;"]).unwrap();
        assert_eq!(out, vec!["endforeach;;".to_string()]);
    }

    #[test]
    fn test_scopes_depth() {
        let mut scopes = LoopScopes::new();
        let l = line(1, "$__currentLoopData = $a; foreach($__currentLoopData as $x):;");
        rewrite_loops(&l, &mut scopes, LOOP).unwrap();
        assert_eq!(scopes.depth(), 1);
    }
}
