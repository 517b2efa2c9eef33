//! Diagnostic types on both sides of the back-mapping.
//!
//! A [`RawDiagnostic`] is what the type checker reports against a synthesized
//! file: a message and a 1-based line. Back-mapping turns it into a
//! [`ResolvedDiagnostic`] that names the template file, template line and
//! inclusion stack. A raw diagnostic that already carries its origin (one
//! produced by a nested check) passes through unchanged.

use serde::{Deserialize, Serialize};

use crate::marker::{Marker, StackFrame};

/// Where in a template a diagnostic belongs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOrigin {
    pub template_name: String,
    pub template_path: String,
    pub line: u32,
    pub stack: Vec<StackFrame>,
}

impl From<Marker> for TemplateOrigin {
    fn from(marker: Marker) -> Self {
        Self {
            template_name: marker.template_name,
            template_path: marker.template_path,
            line: marker.line,
            stack: marker.stack,
        }
    }
}

/// Whether a raw diagnostic still needs back-mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticOrigin {
    /// Positioned in the synthesized file; resolve through its markers.
    #[default]
    Pending,
    /// Already positioned in a template.
    Resolved(TemplateOrigin),
}

/// A diagnostic as the type checker reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDiagnostic {
    pub message: String,
    /// 1-based line in the synthesized file
    pub line: u32,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub origin: DiagnosticOrigin,
}

impl RawDiagnostic {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            line,
            identifier: None,
            origin: DiagnosticOrigin::Pending,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// A diagnostic whose template position is already known.
    pub fn resolved(message: impl Into<String>, origin: TemplateOrigin) -> Self {
        Self {
            message: message.into(),
            line: origin.line,
            identifier: None,
            origin: DiagnosticOrigin::Resolved(origin),
        }
    }
}

/// Template name and inclusion stack attached to every resolved diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticMetadata {
    pub template_name: String,
    /// Outermost caller first.
    pub stack: Vec<StackFrame>,
}

/// A diagnostic positioned in template source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDiagnostic {
    pub message: String,
    /// Template file path
    pub file: String,
    /// 1-based template line
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub metadata: DiagnosticMetadata,
}

impl ResolvedDiagnostic {
    pub fn at(
        message: impl Into<String>,
        identifier: Option<String>,
        origin: TemplateOrigin,
    ) -> Self {
        Self {
            message: message.into(),
            file: origin.template_path,
            line: origin.line,
            identifier,
            metadata: DiagnosticMetadata {
                template_name: origin.template_name,
                stack: origin.stack,
            },
        }
    }

    pub fn origin(&self) -> TemplateOrigin {
        TemplateOrigin {
            template_name: self.metadata.template_name.clone(),
            template_path: self.file.clone(),
            line: self.line,
            stack: self.metadata.stack.clone(),
        }
    }

    /// The frame that first reached this template, if any.
    pub fn caller(&self) -> Option<&StackFrame> {
        self.metadata.stack.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn origin() -> TemplateOrigin {
        TemplateOrigin {
            template_name: "addition".into(),
            template_path: "/views/addition.blade.php".into(),
            line: 1,
            stack: vec![StackFrame::new("/app/Controller.php", 12)],
        }
    }

    #[test]
    fn test_raw_defaults_to_pending() {
        let raw: RawDiagnostic =
            serde_json::from_str(r#"{"message":"Undefined variable","line":4}"#).unwrap();
        assert_eq!(raw, RawDiagnostic::new("Undefined variable", 4));
    }

    #[test]
    fn test_resolved_origin_serde() {
        let raw = RawDiagnostic::resolved("Binary operation", origin());
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["origin"]["kind"], "resolved");
        assert_eq!(json["origin"]["template_name"], "addition");
        let back: RawDiagnostic = serde_json::from_value(json).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_resolved_round_trips_origin() {
        let diag = ResolvedDiagnostic::at("m", Some("binaryOp.invalid".into()), origin());
        assert_eq!(diag.file, "/views/addition.blade.php");
        assert_eq!(diag.caller().unwrap().line, 12);
        assert_eq!(diag.origin(), origin());
    }
}
