//! Dependency ledger
//!
//! Every check appends one JSON line recording which template a caller file
//! reached and the template's modification time at that moment. An external
//! result cache asks `stale_callers()` which callers must be re-analysed
//! because a template they depend on changed or disappeared.
//!
//! The file is append-only; `dependencies()` folds it, later records winning.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AnalysisError;

pub const LEDGER_FILE: &str = "dependencies.jsonl";

/// caller file → template file → template mtime when last checked
pub type DependencyMap = BTreeMap<String, BTreeMap<String, DateTime<Utc>>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub caller: String,
    pub template: String,
    pub mtime: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DependencyLedger {
    path: PathBuf,
}

impl DependencyLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/dependencies.jsonl`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(LEDGER_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record that `caller` renders `template`.
    pub fn record(&self, caller: &str, template: &Path) -> Result<(), AnalysisError> {
        let record = DependencyRecord {
            caller: caller.to_string(),
            template: template.to_string_lossy().into_owned(),
            mtime: modified(template)?,
            recorded_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| AnalysisError::io(parent, e))?;
        }
        let mut line = serde_json::to_string(&record)
            .map_err(|e| AnalysisError::io(&self.path, e.into()))?;
        line.push('\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|e| AnalysisError::io(&self.path, e))?;

        debug!(caller, template = %template.display(), "recorded dependency");
        Ok(())
    }

    /// All recorded dependencies. A missing ledger is empty.
    pub fn dependencies(&self) -> Result<DependencyMap, AnalysisError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DependencyMap::new()),
            Err(e) => return Err(AnalysisError::io(&self.path, e)),
        };

        let mut map = DependencyMap::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DependencyRecord>(line) {
                Ok(record) => {
                    map.entry(record.caller)
                        .or_default()
                        .insert(record.template, record.mtime);
                }
                Err(e) => warn!(line = index + 1, error = %e, "skipping undecodable ledger line"),
            }
        }
        Ok(map)
    }

    /// Callers with at least one template that is missing or newer than recorded.
    pub fn stale_callers(&self) -> Result<Vec<String>, AnalysisError> {
        let stale = self
            .dependencies()?
            .into_iter()
            .filter(|(_, templates)| {
                templates.iter().any(|(template, recorded)| {
                    match modified(Path::new(template)) {
                        Ok(current) => current > *recorded,
                        Err(_) => true,
                    }
                })
            })
            .map(|(caller, _)| caller)
            .collect();
        Ok(stale)
    }
}

fn modified(path: &Path) -> Result<DateTime<Utc>, AnalysisError> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(DateTime::<Utc>::from)
        .map_err(|e| AnalysisError::io(path, e))
}
