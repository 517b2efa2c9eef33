//! Configuration
//!
//! `blade-lens.yaml`, every field optional:
//!
//! ```yaml
//! view_paths: [resources/views]
//! namespaces:
//!   mail: [resources/views/vendor/mail]
//! scratch_dir: /tmp/blade-lens
//! max_include_depth: 16
//! ignore_errors:
//!   - "^Call to an undefined method Illuminate\\\\Support\\\\HtmlString"
//! compiler: { program: php, args: [artisan, blade:compile-stdin] }
//! checker: { program: vendor/bin/phpstan, args: [analyse, --error-format=json-lines] }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lens_core::TypeBinding;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const CONFIG_ENV: &str = "BLADE_LENS_CONFIG";
pub const CONFIG_FILE: &str = "blade-lens.yaml";

/// An external program and its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Roots searched for dot-notation template names, in order.
    pub view_paths: Vec<PathBuf>,
    /// File suffixes tried for each name, in order.
    pub view_extensions: Vec<String>,
    /// `namespace::name` hint roots.
    pub namespaces: BTreeMap<String, Vec<PathBuf>>,
    pub scratch_dir: PathBuf,
    pub max_include_depth: usize,
    /// Type declared for `$loop` inside template loops.
    pub loop_variable_type: String,
    /// Variables every template can see without being passed them.
    pub ambient_bindings: Vec<TypeBinding>,
    /// Regexes; a diagnostic whose message matches any of them is dropped.
    pub ignore_errors: Vec<String>,
    pub compiler: Option<CommandSpec>,
    pub checker: Option<CommandSpec>,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            view_paths: vec![PathBuf::from("resources/views")],
            view_extensions: vec!["blade.php".to_string(), "php".to_string()],
            namespaces: BTreeMap::new(),
            scratch_dir: std::env::temp_dir().join("blade-lens"),
            max_include_depth: 16,
            loop_variable_type: "\\Illuminate\\View\\Loop".to_string(),
            ambient_bindings: default_ambient_bindings(),
            ignore_errors: Vec::new(),
            compiler: None,
            checker: None,
        }
    }
}

/// The view environment, the error bag and the anonymous component.
pub fn default_ambient_bindings() -> Vec<TypeBinding> {
    vec![
        TypeBinding::new("__env", "\\Illuminate\\View\\Factory"),
        TypeBinding::new("errors", "\\Illuminate\\Support\\ViewErrorBag"),
        TypeBinding::new("component", "\\Illuminate\\View\\AnonymousComponent"),
    ]
}

impl LensConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse blade-lens configuration")
    }
}

pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Resolution order:
    /// 1. `BLADE_LENS_CONFIG` environment variable
    /// 2. `blade-lens.yaml` in the working directory
    /// 3. built-in defaults
    pub fn from_env() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::new(path);
        }
        if Path::new(CONFIG_FILE).exists() {
            return Self::new(CONFIG_FILE);
        }
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self) -> Result<LensConfig> {
        let Some(path) = &self.path else {
            info!("No configuration file found, using defaults");
            return Ok(LensConfig::default());
        };

        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config = LensConfig::from_yaml(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        // Relative view roots are relative to the config file.
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let rebase = |p: &mut PathBuf| {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            };
            config.view_paths.iter_mut().for_each(rebase);
            config
                .namespaces
                .values_mut()
                .flat_map(|roots| roots.iter_mut())
                .for_each(rebase);
        }

        Ok(config)
    }
}
