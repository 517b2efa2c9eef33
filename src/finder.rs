//! File system template locator.
//!
//! Resolves names the way the view layer does:
//! - `users.show` → `<root>/users/show.<ext>` for each root, each extension
//! - `mail::layout` → the same, under the roots registered for `mail`
//! - an existing file path is returned as is

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use crate::collaborators::TemplateLocator;
use crate::config::LensConfig;

const HINT_DELIMITER: &str = "::";

#[derive(Debug, Clone, Default)]
pub struct ViewFinder {
    paths: Vec<PathBuf>,
    extensions: Vec<String>,
    namespaces: BTreeMap<String, Vec<PathBuf>>,
}

impl ViewFinder {
    pub fn new(paths: Vec<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            paths,
            extensions,
            namespaces: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &LensConfig) -> Self {
        Self {
            paths: config.view_paths.clone(),
            extensions: config.view_extensions.clone(),
            namespaces: config.namespaces.clone(),
        }
    }

    /// Register roots for `namespace::name` lookups.
    pub fn with_namespace(mut self, namespace: impl Into<String>, roots: Vec<PathBuf>) -> Self {
        self.namespaces.insert(namespace.into(), roots);
        self
    }

    fn search(&self, roots: &[PathBuf], name: &str) -> Option<PathBuf> {
        let relative = name.trim().replace('.', "/");
        let relative = relative.as_str();
        roots
            .iter()
            .flat_map(|root| {
                self.extensions
                    .iter()
                    .map(move |ext| root.join(format!("{relative}.{ext}")))
            })
            .find(|candidate| candidate.is_file())
    }
}

impl TemplateLocator for ViewFinder {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(name);
        if direct.is_absolute() && direct.is_file() {
            return Some(direct);
        }

        let found = match name.split_once(HINT_DELIMITER) {
            Some((namespace, rest)) => self
                .namespaces
                .get(namespace)
                .and_then(|roots| self.search(roots, rest)),
            None => self.search(&self.paths, name),
        };

        if found.is_none() {
            debug!(name, "template not found");
        }
        found
    }
}
