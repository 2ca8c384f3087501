//! Reflection contract.
//!
//! The metadata factory never inspects application types directly. It asks a
//! [`ReflectionService`] whether a class exists, what its parent is, whether
//! it is abstract, and which methods it declares.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{MappingError, Result};

/// Reflected shape of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassReflection {
    /// Class name.
    pub name: String,
    /// Direct parent class, mapped or not.
    pub parent: Option<String>,
    /// Whether the class cannot be instantiated.
    pub is_abstract: bool,
    /// Public method names.
    pub methods: BTreeSet<String>,
}

impl ClassReflection {
    /// Reflect a concrete class without parent or methods.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            is_abstract: false,
            methods: BTreeSet::new(),
        }
    }

    /// Set the parent class.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Mark as abstract.
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Declare a public method.
    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.methods.insert(name.into());
        self
    }

    /// Whether the class declares a public method.
    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains(name)
    }
}

/// Class introspection used by the metadata factory.
pub trait ReflectionService: Send + Sync {
    /// Reflection handle for a class, if it exists.
    fn class(&self, name: &str) -> Option<Arc<ClassReflection>>;

    /// Whether a class exists.
    fn class_exists(&self, name: &str) -> bool {
        self.class(name).is_some()
    }

    /// Ancestors of a class, root first.
    fn parent_classes(&self, name: &str) -> Result<Vec<String>> {
        let mut current = self.class(name).ok_or_else(|| MappingError::ClassNotFound {
            class: name.to_string(),
        })?;
        let mut parents = Vec::new();
        while let Some(parent) = current.parent.clone() {
            if parent == name || parents.contains(&parent) {
                return Err(MappingError::CircularInheritance {
                    class: name.to_string(),
                });
            }
            current = self
                .class(&parent)
                .ok_or_else(|| MappingError::ClassNotFound {
                    class: parent.clone(),
                })?;
            parents.push(parent);
        }
        parents.reverse();
        Ok(parents)
    }

    /// Whether `name` inherits (directly or transitively) from `ancestor`.
    fn is_subclass_of(&self, name: &str, ancestor: &str) -> bool {
        self.parent_classes(name)
            .is_ok_and(|parents| parents.iter().any(|p| p == ancestor))
    }

    /// Whether a class declares a public method.
    fn has_public_method(&self, class: &str, method: &str) -> bool {
        self.class(class).is_some_and(|c| c.has_method(method))
    }
}
