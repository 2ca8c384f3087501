//! Metadata factory configuration.

use std::sync::Arc;

use ormeta_core::{
    CustomGeneratorRegistry, CustomValueGenerator, DefaultNamingStrategy, NamingStrategy, Platform,
    PlatformCapabilities, PlatformKind,
};

use crate::cache::MetadataCache;

/// Suffix appended to class names to build metadata cache keys.
pub const DEFAULT_CACHE_SALT: &str = "$CLASSMETADATA";

/// Configuration of a [`ClassMetadataFactory`](crate::ClassMetadataFactory).
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    /// Target platform.
    pub platform: PlatformKind,
    /// Capabilities overriding the built-in ones for `platform`.
    pub platform_capabilities: Option<Arc<dyn PlatformCapabilities>>,
    /// Naming strategy handed to drivers through the building context.
    pub naming_strategy: Arc<dyn NamingStrategy>,
    /// Optional cache of finished metadata.
    pub metadata_cache: Option<Arc<dyn MetadataCache>>,
    /// Suffix of metadata cache keys.
    pub cache_salt: String,
    /// Custom value generators that `CUSTOM` strategies may name.
    pub generators: CustomGeneratorRegistry,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            platform: PlatformKind::default(),
            platform_capabilities: None,
            naming_strategy: Arc::new(DefaultNamingStrategy),
            metadata_cache: None,
            cache_salt: DEFAULT_CACHE_SALT.to_string(),
            generators: CustomGeneratorRegistry::new(),
        }
    }
}

impl MetadataConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for the platform named by a connection URL scheme.
    ///
    /// Returns `None` if the scheme is not a known platform.
    #[must_use]
    pub fn for_url(url: &str) -> Option<Self> {
        PlatformKind::from_url(url).map(|kind| Self::new().platform(kind))
    }

    /// Set the target platform.
    pub fn platform(mut self, kind: PlatformKind) -> Self {
        self.platform = kind;
        self
    }

    /// Use custom platform capabilities.
    pub fn platform_capabilities(mut self, capabilities: Arc<dyn PlatformCapabilities>) -> Self {
        self.platform_capabilities = Some(capabilities);
        self
    }

    /// Set the naming strategy.
    pub fn naming_strategy(mut self, strategy: impl NamingStrategy + 'static) -> Self {
        self.naming_strategy = Arc::new(strategy);
        self
    }

    /// Enable the metadata cache.
    pub fn metadata_cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.metadata_cache = Some(cache);
        self
    }

    /// Set the cache key suffix.
    pub fn cache_salt(mut self, salt: impl Into<String>) -> Self {
        self.cache_salt = salt.into();
        self
    }

    /// Register a custom value generator class.
    pub fn generator<F>(mut self, class: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Arc<dyn CustomValueGenerator> + Send + Sync + 'static,
    {
        self.generators.register(class, constructor);
        self
    }

    /// Cache key of a class.
    #[must_use]
    pub fn cache_key(&self, class_name: &str) -> String {
        format!("{class_name}{}", self.cache_salt)
    }

    /// Resolve platform capabilities.
    #[must_use]
    pub fn resolve_platform(&self) -> Arc<dyn PlatformCapabilities> {
        match &self.platform_capabilities {
            Some(capabilities) => Arc::clone(capabilities),
            None => Arc::new(Platform::new(self.platform)),
        }
    }
}
