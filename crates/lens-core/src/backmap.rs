//! Back-mapper: checker line → template line.
//!
//! Starting on the line above the reported one, walk upward through the
//! synthesized file until a line that decodes as a marker is found. A marker
//! line is never itself a reported code line, so it is not inspected first. That marker is the diagnostic's
//! template origin. Diagnostics keep their order and are never deduplicated.

use std::path::Path;

use tracing::trace;

use crate::diagnostics::{DiagnosticOrigin, RawDiagnostic, ResolvedDiagnostic, TemplateOrigin};
use crate::error::MapError;
use crate::marker::Marker;
use crate::synth::SynthesizedFile;

/// Resolve one raw diagnostic against the lines of the synthesized file.
pub fn resolve(
    raw: RawDiagnostic,
    lines: &[String],
    path: &Path,
) -> Result<ResolvedDiagnostic, MapError> {
    let origin = match raw.origin {
        DiagnosticOrigin::Resolved(origin) => origin,
        DiagnosticOrigin::Pending => {
            let above = (raw.line as usize).saturating_sub(1).min(lines.len());
            let found = lines[..above]
                .iter()
                .rev()
                .find_map(|line| Marker::decode(line.trim_start()).map(|(marker, _)| marker));
            match found {
                Some(marker) => TemplateOrigin::from(marker),
                None => {
                    return Err(MapError::OrphanDiagnostic {
                        path: path.display().to_string(),
                        line: raw.line,
                        content: (raw.line as usize)
                            .checked_sub(1)
                            .and_then(|index| lines.get(index))
                            .cloned()
                            .unwrap_or_default(),
                        message: raw.message,
                    });
                }
            }
        }
    };

    trace!(
        line = raw.line,
        template = %origin.template_name,
        template_line = origin.line,
        "resolved diagnostic"
    );
    Ok(ResolvedDiagnostic::at(raw.message, raw.identifier, origin))
}

/// Resolve every diagnostic reported against `file`, in order.
pub fn resolve_all(
    raw: Vec<RawDiagnostic>,
    file: &SynthesizedFile,
    path: &Path,
) -> Result<Vec<ResolvedDiagnostic>, MapError> {
    raw.into_iter()
        .map(|diagnostic| resolve(diagnostic, file.lines(), path))
        .collect()
}
