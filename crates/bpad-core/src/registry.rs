//! Component type registry.
//!
//! Maps the type identifier used in a manifest's `class_name` field to a
//! constructor. Populated once at startup; the manifest loader looks types up
//! here instead of resolving them dynamically.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::component::Component;
use crate::components::{KubectlManifests, Noop, Scripts};
use crate::error::{BpadError, Result};

/// Builds a component rooted at the given directory.
pub type ComponentFactory = fn(PathBuf) -> Box<dyn Component>;

#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    factories: BTreeMap<String, ComponentFactory>,
}

impl ComponentRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the components shipped in [`crate::components`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Noop::KIND, |path| Box::new(Noop::new(path)));
        registry.register(Scripts::KIND, |path| Box::new(Scripts::new(path)));
        registry.register(KubectlManifests::KIND, |path| {
            Box::new(KubectlManifests::new(path))
        });
        registry
    }

    /// Register a constructor, replacing any previous one for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, factory: ComponentFactory) -> &mut Self {
        self.factories.insert(kind.into(), factory);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Instantiate the component registered as `kind`.
    pub fn create(&self, kind: &str, path: PathBuf) -> Result<Box<dyn Component>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| BpadError::UnknownComponentType {
                type_name: kind.to_string(),
                known: self.names(),
            })?;
        Ok(factory(path))
    }
}
