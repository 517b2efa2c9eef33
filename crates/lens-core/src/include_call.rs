//! Include call parser
//!
//! Finds the "render another template" call shape in compiled output:
//!
//! ```text
//! echo $__env->make('addition', ['a' => $x], \Illuminate\Support\Arr::except(get_defined_vars(), ['__data', '__path']))->render();
//! ```
//!
//! - first argument: the nested template name, a string literal or anything
//!   else (dynamic, cannot be followed)
//! - optional data argument: an array literal of `'key' => expr` pairs, or an
//!   opaque expression
//! - optional last argument: the caller's locals minus an exclusion list
//!
//! A multi-line call carries the markers of its continuation lines; they are
//! stripped before the arguments are parsed. Anything that deviates from the
//! shape is a `MalformedInclude` error, not a diagnostic.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::MapError;
use crate::marker::strip_markers;
use crate::scan::{array_literal, keyed_item, matching_close, split_items, string_literal};

static CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\becho\s+\$__env\s*->\s*make\s*\(").unwrap());

static RENDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*->\s*render\s*\(\s*\)\s*;").unwrap());

static EXCEPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\\?Illuminate\\Support\\Arr::except\s*\(\s*get_defined_vars\s*\(\s*\)\s*,(?P<list>.*)\)$")
        .unwrap()
});

/// Which template an include renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncludeTarget {
    /// Known at compile time.
    Literal(String),
    /// Computed at runtime; the include cannot be followed.
    Dynamic(String),
}

impl IncludeTarget {
    pub fn classify(expr: &str) -> Self {
        match string_literal(expr) {
            Some(name) => Self::Literal(name),
            None => Self::Dynamic(expr.trim().to_string()),
        }
    }
}

/// The explicit data argument of an include.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncludeData {
    /// `['key' => expr, ...]` in source order.
    Pairs(Vec<(String, String)>),
    /// Any other expression; its keys are unknown.
    Opaque(String),
}

/// One include call found in compiled output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncludeCall {
    /// Byte range of `echo ... ->render();`
    pub range: Range<usize>,
    pub target: IncludeTarget,
    pub data: Option<IncludeData>,
    /// `Some(names)` when the caller's locals are passed, minus `names`.
    pub excluded_locals: Option<Vec<String>>,
}

impl IncludeCall {
    /// Explicit `(key, expr)` pairs, later duplicates replacing earlier ones.
    pub fn data_pairs(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        if let Some(IncludeData::Pairs(pairs)) = &self.data {
            for (key, expr) in pairs {
                match out.iter_mut().find(|(k, _)| k == key) {
                    Some(existing) => existing.1 = expr.clone(),
                    None => out.push((key.clone(), expr.clone())),
                }
            }
        }
        out
    }
}

/// Find the next include call at or after byte offset `from`.
pub fn find_include(text: &str, from: usize) -> Result<Option<IncludeCall>, MapError> {
    let Some(found) = CALL_RE.find_at(text, from) else {
        return Ok(None);
    };

    let open = found.end() - 1;
    let close = matching_close(text, open)
        .ok_or_else(|| MapError::malformed("unbalanced argument list", &text[found.start()..]))?;
    let render = RENDER_RE.find(&text[close + 1..]).ok_or_else(|| {
        MapError::malformed(
            "make(...) is not followed by ->render();",
            &text[found.start()..=close],
        )
    })?;
    let range = found.start()..close + 1 + render.end();

    let arguments = strip_markers(&text[open + 1..close]);
    parse_arguments(&arguments, range, &text[found.start()..close + 1])
}

fn parse_arguments(
    arguments: &str,
    range: Range<usize>,
    snippet: &str,
) -> Result<Option<IncludeCall>, MapError> {
    let mut args: Vec<&str> = split_items(arguments)
        .ok_or_else(|| MapError::malformed("unbalanced argument list", snippet))?
        .into_iter()
        .map(str::trim)
        .collect();
    if args.last().is_some_and(|a| a.is_empty()) {
        args.pop();
    }
    if args.is_empty() || args.len() > 3 || args.iter().any(|a| a.is_empty()) {
        return Err(MapError::malformed(
            format!("expected 1 to 3 arguments, found {}", args.len()),
            snippet,
        ));
    }

    let target = IncludeTarget::classify(args[0]);
    let mut data = None;
    let mut excluded_locals = None;

    for (index, arg) in args.iter().enumerate().skip(1) {
        let is_last = index == args.len() - 1;
        match EXCEPT_RE.captures(arg) {
            Some(caps) if is_last => {
                excluded_locals = Some(parse_exclusions(&caps["list"], snippet)?);
            }
            Some(_) => {
                return Err(MapError::malformed(
                    "the caller's locals must be the last argument",
                    snippet,
                ));
            }
            None if index == 1 => data = Some(parse_data(arg, snippet)?),
            None => {
                return Err(MapError::malformed(
                    "third argument must pass the caller's locals",
                    snippet,
                ));
            }
        }
    }

    Ok(Some(IncludeCall {
        range,
        target,
        data,
        excluded_locals,
    }))
}

fn parse_data(arg: &str, snippet: &str) -> Result<IncludeData, MapError> {
    let Some(inner) = array_literal(arg) else {
        return Ok(IncludeData::Opaque(single_line(arg)));
    };

    let items = split_items(inner)
        .ok_or_else(|| MapError::malformed("unbalanced data array", snippet))?;
    let pairs = items
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .map(|item| {
            keyed_item(item)
                .map(|(key, expr)| (key, single_line(expr)))
                .ok_or_else(|| {
                    MapError::malformed("data array entry is not a 'key' => value pair", snippet)
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(IncludeData::Pairs(pairs))
}

fn parse_exclusions(list: &str, snippet: &str) -> Result<Vec<String>, MapError> {
    let inner = array_literal(list)
        .ok_or_else(|| MapError::malformed("exclusion list is not an array literal", snippet))?;
    split_items(inner)
        .ok_or_else(|| MapError::malformed("unbalanced exclusion list", snippet))?
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            string_literal(item)
                .ok_or_else(|| MapError::malformed("exclusion list entry is not a literal", snippet))
        })
        .collect()
}

fn single_line(expr: &str) -> String {
    expr.trim()
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
}
