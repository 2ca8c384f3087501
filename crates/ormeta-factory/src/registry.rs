//! In-memory class registry.
//!
//! [`ClassRegistry`] implements [`ReflectionService`] over classes described
//! up front, which is how code-first applications (and tests) tell the
//! factory about their types.

use std::collections::BTreeMap;
use std::sync::Arc;

use ormeta_core::{ClassReflection, ReflectionService};

/// Reflection over a fixed set of registered classes.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, Arc<ClassReflection>>,
}

impl ClassRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class (builder pattern).
    pub fn with_class(mut self, class: ClassReflection) -> Self {
        self.register(class);
        self
    }

    /// Register a class, replacing an earlier registration of the same name.
    pub fn register(&mut self, class: ClassReflection) {
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    /// Registered class names, sorted.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Number of registered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ReflectionService for ClassRegistry {
    fn class(&self, name: &str) -> Option<Arc<ClassReflection>> {
        self.classes.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_reflects_registered_classes() {
        let registry = ClassRegistry::new()
            .with_class(ClassReflection::new("app::Vehicle").abstract_class())
            .with_class(ClassReflection::new("app::Car").extends("app::Vehicle"));

        assert_eq!(registry.len(), 2);
        assert!(registry.class_exists("app::Car"));
        assert!(!registry.class_exists("app::Boat"));
        assert!(registry.class("app::Vehicle").unwrap().is_abstract);
        assert!(registry.is_subclass_of("app::Car", "app::Vehicle"));
        assert_eq!(
            registry.class_names().collect::<Vec<_>>(),
            vec!["app::Car", "app::Vehicle"]
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ClassRegistry::new();
        registry.register(ClassReflection::new("app::User"));
        registry.register(ClassReflection::new("app::User").method("onLoad"));
        assert_eq!(registry.len(), 1);
        assert!(registry.has_public_method("app::User", "onLoad"));
    }
}
