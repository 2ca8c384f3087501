//! Metadata notification hooks.
//!
//! Listeners are kept in registration order and invoked synchronously by the
//! factory. Load listeners see the metadata while it is still mutable;
//! not-found listeners may supply replacement metadata for a class the
//! driver could not describe.

use std::fmt;
use std::sync::Arc;

use ormeta_core::{ClassMetadata, Result};

use crate::context::ClassMetadataBuildingContext;

/// Arguments of the "class metadata loaded" notification.
pub struct LoadClassMetadataArgs<'a> {
    /// Metadata being loaded; listeners may mutate it.
    pub metadata: &'a mut ClassMetadata,
    /// Building context of the current lookup.
    pub context: &'a ClassMetadataBuildingContext,
}

/// Arguments of the "class metadata not found" notification.
pub struct ClassMetadataNotFoundArgs<'a> {
    class_name: &'a str,
    context: &'a ClassMetadataBuildingContext,
    found: Option<ClassMetadata>,
}

impl<'a> ClassMetadataNotFoundArgs<'a> {
    pub(crate) fn new(class_name: &'a str, context: &'a ClassMetadataBuildingContext) -> Self {
        Self {
            class_name,
            context,
            found: None,
        }
    }

    /// The class that could not be described.
    #[must_use]
    pub fn class_name(&self) -> &str {
        self.class_name
    }

    /// Building context of the current lookup.
    #[must_use]
    pub fn context(&self) -> &ClassMetadataBuildingContext {
        self.context
    }

    /// Supply replacement metadata. The last listener to call this wins.
    pub fn set_found_metadata(&mut self, metadata: ClassMetadata) {
        self.found = Some(metadata);
    }

    /// Replacement metadata supplied so far.
    #[must_use]
    pub fn found_metadata(&self) -> Option<&ClassMetadata> {
        self.found.as_ref()
    }

    pub(crate) fn into_found_metadata(self) -> Option<ClassMetadata> {
        self.found
    }
}

/// Listener for the "class metadata loaded" notification.
pub type LoadClassMetadataListener =
    Arc<dyn Fn(&mut LoadClassMetadataArgs<'_>) -> Result<()> + Send + Sync>;

/// Listener for the "class metadata not found" notification.
pub type ClassMetadataNotFoundListener =
    Arc<dyn Fn(&mut ClassMetadataNotFoundArgs<'_>) + Send + Sync>;

/// Ordered listener lists for metadata notifications.
#[derive(Clone, Default)]
pub struct MetadataEvents {
    load_listeners: Vec<LoadClassMetadataListener>,
    not_found_listeners: Vec<ClassMetadataNotFoundListener>,
}

impl MetadataEvents {
    /// Create an empty listener set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a "class metadata loaded" listener.
    pub fn on_load_class_metadata<F>(mut self, listener: F) -> Self
    where
        F: Fn(&mut LoadClassMetadataArgs<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.load_listeners.push(Arc::new(listener));
        self
    }

    /// Register a "class metadata not found" listener.
    pub fn on_class_metadata_not_found<F>(mut self, listener: F) -> Self
    where
        F: Fn(&mut ClassMetadataNotFoundArgs<'_>) + Send + Sync + 'static,
    {
        self.not_found_listeners.push(Arc::new(listener));
        self
    }

    /// Whether any "loaded" listener is registered.
    #[must_use]
    pub fn has_load_listeners(&self) -> bool {
        !self.load_listeners.is_empty()
    }

    /// Whether any "not found" listener is registered.
    #[must_use]
    pub fn has_not_found_listeners(&self) -> bool {
        !self.not_found_listeners.is_empty()
    }

    /// Dispatch "class metadata loaded"; the first failing listener aborts.
    pub fn dispatch_load_class_metadata(&self, args: &mut LoadClassMetadataArgs<'_>) -> Result<()> {
        for listener in &self.load_listeners {
            listener(args)?;
        }
        Ok(())
    }

    /// Dispatch "class metadata not found" to every listener.
    pub fn dispatch_class_metadata_not_found(&self, args: &mut ClassMetadataNotFoundArgs<'_>) {
        for listener in &self.not_found_listeners {
            listener(args);
        }
    }
}

impl fmt::Debug for MetadataEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataEvents")
            .field("load_listeners", &self.load_listeners.len())
            .field("not_found_listeners", &self.not_found_listeners.len())
            .finish()
    }
}
