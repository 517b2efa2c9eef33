//! Marker Codec
//!
//! Every template line is prefixed with a marker comment before it is handed
//! to the template compiler. The compiler copies comments through untouched,
//! so host code that follows a marker in the compiled output can be traced
//! back to the template line (and inclusion stack) it came from.
//!
//! Grammar (single line):
//!
//! ```text
//! /** template_name="welcome", template_path="/app/views/welcome.blade.php", line=3, stack=[{"file":"/app/Http/HomeController.php","line":12,"name":null}] */
//! ```
//!
//! Name and path are JSON string literals, so the quotes bound them even when
//! a path contains spaces or `, `. Any `*/` inside a JSON payload is written
//! as `*\/` so the host comment cannot be closed early.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::trace;

const PATTERN: &str = r#"/\*\* template_name=(?P<name>"(?:[^"\\]|\\.)*"), template_path=(?P<path>"(?:[^"\\]|\\.)*"), line=(?P<line>\d+), stack=(?P<stack>.*?) \*/"#;

/// A marker at the very start of a line.
static MARKER_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{PATTERN}")).unwrap());

/// A marker anywhere in the text.
static MARKER_ANY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(PATTERN).unwrap());

/// One level of inclusion: where the current template was reached from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub name: Option<String>,
}

impl StackFrame {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            name: None,
        }
    }

    pub fn named(file: impl Into<String>, line: u32, name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            name: Some(name.into()),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "file": self.file,
            "line": self.line,
            "name": self.name,
        })
    }
}

/// Compact JSON for a provenance stack, outermost frame first.
pub fn stack_json(stack: &[StackFrame]) -> String {
    Value::Array(stack.iter().map(StackFrame::to_json).collect()).to_string()
}

/// Positional provenance of one template line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub template_name: String,
    pub template_path: String,
    /// 1-based template line
    pub line: u32,
    pub stack: Vec<StackFrame>,
}

impl Marker {
    pub fn new(
        template_name: impl Into<String>,
        template_path: impl Into<String>,
        line: u32,
        stack: Vec<StackFrame>,
    ) -> Self {
        Self {
            template_name: template_name.into(),
            template_path: template_path.into(),
            line,
            stack,
        }
    }

    /// Serialize as a single-line host comment.
    pub fn encode(&self) -> String {
        format!(
            "/** template_name={}, template_path={}, line={}, stack={} */",
            comment_safe(Value::String(self.template_name.clone()).to_string()),
            comment_safe(Value::String(self.template_path.clone()).to_string()),
            self.line,
            comment_safe(stack_json(&self.stack)),
        )
    }

    /// Decode a marker at the start of `line`.
    ///
    /// Returns the marker and the rest of the line, or `None` when the line
    /// does not start with a well-formed marker.
    pub fn decode(line: &str) -> Option<(Marker, &str)> {
        if !line.starts_with("/** template_name=") {
            return None;
        }
        let caps = MARKER_PREFIX_RE.captures(line)?;
        let whole = caps.get(0)?;

        let decoded = (|| {
            let template_name: String = serde_json::from_str(&caps["name"]).ok()?;
            let template_path: String = serde_json::from_str(&caps["path"]).ok()?;
            let line: u32 = caps["line"].parse().ok()?;
            let stack: Vec<StackFrame> = serde_json::from_str(&caps["stack"]).ok()?;
            Some(Marker {
                template_name,
                template_path,
                line,
                stack,
            })
        })();

        match decoded {
            Some(marker) => Some((marker, &line[whole.end()..])),
            None => {
                trace!(line, "marker-shaped comment with undecodable payload");
                None
            }
        }
    }
}

fn comment_safe(json: String) -> String {
    json.replace("*/", "*\\/")
}

/// Prefix every line of `source` with its marker. Line numbers start at 1.
pub fn tag_lines(
    source: &str,
    template_name: &str,
    template_path: &str,
    stack: &[StackFrame],
) -> String {
    source
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            let marker = Marker::new(template_name, template_path, i as u32 + 1, stack.to_vec());
            format!("{}{}", marker.encode(), line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove every marker from `text`, wherever it appears.
pub fn strip_markers(text: &str) -> String {
    MARKER_ANY_RE.replace_all(text, "").into_owned()
}

/// The last marker that starts a line before byte offset `pos`.
pub fn last_marker_before(text: &str, pos: usize) -> Option<Marker> {
    text[..pos]
        .rsplit('\n')
        .find_map(|line| Marker::decode(line).map(|(marker, _)| marker))
}


// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------
