//! Variable type bindings declared at the top of a synthesized file.
//!
//! Order is preserved so the declarations, and therefore the line numbers of
//! the synthesized file, are deterministic for identical input.

use serde::{Deserialize, Deserializer, Serialize};

/// One `name => type` declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeBinding {
    /// Variable name without the leading `$`.
    #[serde(deserialize_with = "deserialize_name")]
    pub name: String,
    /// Type in host checker syntax, e.g. `int`, `App\Models\User`.
    pub type_descriptor: String,
}

impl TypeBinding {
    pub fn new(name: impl AsRef<str>, type_descriptor: impl Into<String>) -> Self {
        Self {
            name: normalize(name.as_ref()),
            type_descriptor: type_descriptor.into(),
        }
    }

    /// `/** @var int $count */`
    pub fn declaration(&self) -> String {
        format!("/** @var {} ${} */", self.type_descriptor, self.name)
    }
}

fn normalize(name: &str) -> String {
    name.trim().trim_start_matches('$').to_string()
}

fn deserialize_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|name| normalize(&name))
}

/// Ordered set of bindings, unique by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeBindings {
    entries: Vec<TypeBinding>,
}

impl TypeBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit bindings override `merge` bindings of the same name.
    ///
    /// Explicit entries keep their order and come first; merge-only names
    /// follow in their own order.
    pub fn merge(explicit: &TypeBindings, merge: &TypeBindings) -> TypeBindings {
        let mut out = explicit.clone();
        for binding in &merge.entries {
            out.fill(binding.clone());
        }
        out
    }

    /// Add `binding`, replacing the type of an existing entry in place.
    pub fn insert(&mut self, binding: TypeBinding) {
        match self.entries.iter_mut().find(|b| b.name == binding.name) {
            Some(existing) => existing.type_descriptor = binding.type_descriptor,
            None => self.entries.push(binding),
        }
    }

    /// Add `binding` only if the name is not bound yet.
    pub fn fill(&mut self, binding: TypeBinding) {
        if self.get(&binding.name).is_none() {
            self.entries.push(binding);
        }
    }

    /// Fill gaps with ambient bindings (the view environment and friends).
    pub fn with_ambient(mut self, ambient: &[TypeBinding]) -> Self {
        for binding in ambient {
            self.fill(binding.clone());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = normalize(name);
        self.entries
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.type_descriptor.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeBinding> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One declaration line per binding, in order.
    pub fn declarations(&self) -> Vec<String> {
        self.entries.iter().map(TypeBinding::declaration).collect()
    }
}

impl FromIterator<TypeBinding> for TypeBindings {
    fn from_iter<I: IntoIterator<Item = TypeBinding>>(iter: I) -> Self {
        let mut out = TypeBindings::new();
        for binding in iter {
            out.insert(binding);
        }
        out
    }
}

impl<N: AsRef<str>, T: Into<String>> FromIterator<(N, T)> for TypeBindings {
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(name, ty)| TypeBinding::new(name, ty))
            .collect()
    }
}
