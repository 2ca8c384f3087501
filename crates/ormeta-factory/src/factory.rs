//! The class metadata factory.
//!
//! [`ClassMetadataFactory`] turns class names into finished, validated,
//! shared [`ClassMetadata`]. Lookups run a two-phase pipeline:
//!
//! 1. **Primary pass**: the inheritance chain is walked root first. Every
//!    class not loaded yet is described by the driver, completed (identifier
//!    generators, inherited behavior, discriminator map, tables), announced
//!    to listeners, given a value generation plan, validated, and committed
//!    to the factory cache. Discriminator values are resolved once the whole
//!    chain is committed.
//! 2. **Second pass**: deferred steps queued on the building context run
//!    once the requested class and everything it pulled in are committed.
//!
//! # Example
//!
//! ```ignore
//! let mut factory = ClassMetadataFactory::new(config, driver, registry);
//! let user = factory.get_metadata_for("app::User")?;
//! assert_eq!(user.table.name, "users");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use ormeta_core::{
    ClassMetadata, MappingError, PlatformCapabilities, PropertyKind, ReflectionService, Result,
};

use crate::config::MetadataConfig;
use crate::context::{ClassMetadataBuildingContext, MetadataResolver};
use crate::discriminator::{generate_discriminator_map, resolve_discriminator_value};
use crate::driver::MappingDriver;
use crate::events::{ClassMetadataNotFoundArgs, LoadClassMetadataArgs, MetadataEvents};
use crate::id_generator::complete_identifier_generator_mappings;
use crate::plan_builder::build_value_generation_plan;
use crate::validation::validate_runtime_metadata;

/// Cache slot of one class.
#[derive(Debug, Clone)]
enum CacheSlot {
    /// The class's primary pass is running.
    Loading,
    /// Finished metadata.
    Ready(Arc<ClassMetadata>),
}

/// Loads, completes, validates, and caches class metadata.
pub struct ClassMetadataFactory {
    config: MetadataConfig,
    driver: Arc<dyn MappingDriver>,
    reflection: Arc<dyn ReflectionService>,
    events: MetadataEvents,
    slots: HashMap<String, CacheSlot>,
    platform: OnceLock<Arc<dyn PlatformCapabilities>>,
    known_class_names: Option<Arc<[String]>>,
}

impl ClassMetadataFactory {
    /// Create a factory.
    pub fn new(
        config: MetadataConfig,
        driver: impl MappingDriver + 'static,
        reflection: impl ReflectionService + 'static,
    ) -> Self {
        Self::from_parts(config, Arc::new(driver), Arc::new(reflection))
    }

    /// Create a factory from shared collaborators.
    pub fn from_parts(
        config: MetadataConfig,
        driver: Arc<dyn MappingDriver>,
        reflection: Arc<dyn ReflectionService>,
    ) -> Self {
        Self {
            config,
            driver,
            reflection,
            events: MetadataEvents::default(),
            slots: HashMap::new(),
            platform: OnceLock::new(),
            known_class_names: None,
        }
    }

    /// Attach notification listeners.
    pub fn with_events(mut self, events: MetadataEvents) -> Self {
        self.events = events;
        self
    }

    /// The factory configuration.
    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    /// Platform capabilities, resolved on first use.
    pub fn platform(&self) -> Arc<dyn PlatformCapabilities> {
        let platform = self.platform.get_or_init(|| {
            let platform = self.config.resolve_platform();
            tracing::debug!(
                target: "ormeta::factory",
                platform = platform.name(),
                "Resolved target platform"
            );
            platform
        });
        Arc::clone(platform)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Finished metadata of a class, loading it (and its ancestors) on first
    /// request.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn get_metadata_for(&mut self, class_name: &str) -> Result<Arc<ClassMetadata>> {
        if let Some(CacheSlot::Ready(metadata)) = self.slots.get(class_name) {
            return Ok(Arc::clone(metadata));
        }

        let context = self.new_building_context();
        let metadata = match self.get_metadata_in(class_name, &context) {
            Ok(metadata) => metadata,
            Err(e) => {
                self.discard_loaded(&context);
                tracing::warn!(
                    target: "ormeta::factory",
                    class = class_name,
                    error = %e,
                    "Loading failed; discarded classes loaded by this lookup"
                );
                return Err(e);
            }
        };

        if let Err(e) = context.validate(self) {
            self.discard_loaded(&context);
            tracing::warn!(
                target: "ormeta::factory",
                class = class_name,
                error = %e,
                "Second pass failed; discarded classes loaded by this lookup"
            );
            return Err(e);
        }
        Ok(metadata)
    }

    /// Whether finished metadata for a class is cached.
    #[must_use]
    pub fn has_metadata_for(&self, class_name: &str) -> bool {
        matches!(self.slots.get(class_name), Some(CacheSlot::Ready(_)))
    }

    /// Register finished metadata directly, bypassing the driver.
    pub fn set_metadata_for(&mut self, class_name: impl Into<String>, metadata: Arc<ClassMetadata>) {
        self.slots
            .insert(class_name.into(), CacheSlot::Ready(metadata));
    }

    /// Every finished metadata cached so far.
    #[must_use]
    pub fn get_loaded_metadata(&self) -> Vec<Arc<ClassMetadata>> {
        let mut loaded: Vec<Arc<ClassMetadata>> = self
            .slots
            .values()
            .filter_map(|slot| match slot {
                CacheSlot::Ready(metadata) => Some(Arc::clone(metadata)),
                CacheSlot::Loading => None,
            })
            .collect();
        loaded.sort_by(|a, b| a.class_name.cmp(&b.class_name));
        loaded
    }

    /// Load the metadata of every class the driver maps.
    pub fn get_all_metadata(&mut self) -> Result<Vec<Arc<ClassMetadata>>> {
        let names = self.known_class_names()?;
        names
            .iter()
            .map(|name| self.get_metadata_for(name))
            .collect()
    }

    /// Whether the driver considers a class unmapped.
    #[must_use]
    pub fn is_transient(&self, class_name: &str) -> bool {
        self.driver.is_transient(class_name)
    }

    /// Drop every cached metadata and the known class list.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.known_class_names = None;
    }

    /// Resolve the discriminator value of a class within a building context.
    pub fn resolve_discriminator_value(
        &mut self,
        metadata: &ClassMetadata,
        context: &ClassMetadataBuildingContext,
    ) -> Result<()> {
        resolve_discriminator_value(metadata, self, context)
    }

    fn new_building_context(&self) -> ClassMetadataBuildingContext {
        ClassMetadataBuildingContext::new(
            Arc::clone(&self.reflection),
            Arc::clone(&self.config.naming_strategy),
        )
    }

    /// Classes committed within a failed lookup have not passed their
    /// second-pass checks and must not stay cached.
    fn discard_loaded(&mut self, context: &ClassMetadataBuildingContext) {
        for loaded in context.loaded_classes() {
            self.evict(&loaded);
        }
    }

    fn evict(&mut self, class_name: &str) {
        self.slots.remove(class_name);
        if let Some(cache) = &self.config.metadata_cache {
            cache.delete(&self.config.cache_key(class_name));
        }
    }

    fn get_metadata_in(
        &mut self,
        class_name: &str,
        context: &ClassMetadataBuildingContext,
    ) -> Result<Arc<ClassMetadata>> {
        match self.slots.get(class_name) {
            Some(CacheSlot::Ready(metadata)) => return Ok(Arc::clone(metadata)),
            Some(CacheSlot::Loading) => {
                return Err(MappingError::CircularLoad {
                    class: class_name.to_string(),
                });
            }
            None => {}
        }

        if let Some(metadata) = self.fetch_from_metadata_cache(class_name)? {
            self.slots
                .insert(class_name.to_string(), CacheSlot::Ready(Arc::clone(&metadata)));
            return Ok(metadata);
        }

        match self.load_metadata(class_name, context) {
            Ok(loaded) => self.save_to_metadata_cache(&loaded),
            Err(e) if e.is_class_not_found() && !self.has_metadata_for(class_name) => {
                return self.on_not_found_metadata(class_name, context, e);
            }
            Err(e) => return Err(e),
        }

        match self.slots.get(class_name) {
            Some(CacheSlot::Ready(metadata)) => Ok(Arc::clone(metadata)),
            _ => Err(MappingError::ClassNotFound {
                class: class_name.to_string(),
            }),
        }
    }

    fn on_not_found_metadata(
        &mut self,
        class_name: &str,
        context: &ClassMetadataBuildingContext,
        error: MappingError,
    ) -> Result<Arc<ClassMetadata>> {
        if !self.events.has_not_found_listeners() {
            return Err(error);
        }
        let mut args = ClassMetadataNotFoundArgs::new(class_name, context);
        self.events.dispatch_class_metadata_not_found(&mut args);
        let Some(found) = args.into_found_metadata() else {
            return Err(error);
        };

        tracing::warn!(
            target: "ormeta::factory",
            class = class_name,
            "Using metadata supplied by a not-found listener"
        );
        let found = Arc::new(found);
        self.set_metadata_for(class_name, Arc::clone(&found));
        Ok(found)
    }

    // ========================================================================
    // Primary pass
    // ========================================================================

    /// Mapped ancestors of a class, root first.
    fn get_parent_classes(&self, class_name: &str) -> Result<Vec<String>> {
        let parents = self.reflection.parent_classes(class_name)?;
        Ok(parents
            .into_iter()
            .filter(|parent| !self.driver.is_transient(parent))
            .collect())
    }

    /// Load a class and its missing ancestors. Returns the classes committed.
    fn load_metadata(
        &mut self,
        class_name: &str,
        context: &ClassMetadataBuildingContext,
    ) -> Result<Vec<Arc<ClassMetadata>>> {
        let mut chain = self.get_parent_classes(class_name)?;
        chain.push(class_name.to_string());

        let mut parent: Option<Arc<ClassMetadata>> = None;
        let mut loaded: Vec<Arc<ClassMetadata>> = Vec::new();

        for name in &chain {
            match self.slots.get(name) {
                Some(CacheSlot::Ready(metadata)) => {
                    parent = Some(Arc::clone(metadata));
                    continue;
                }
                Some(CacheSlot::Loading) => {
                    return Err(MappingError::CircularLoad {
                        class: name.clone(),
                    });
                }
                None => {}
            }

            self.slots.insert(name.clone(), CacheSlot::Loading);
            let metadata = match self.do_load_metadata(name, parent.as_deref(), context) {
                Ok(metadata) => Arc::new(metadata),
                Err(e) => {
                    self.slots.remove(name);
                    return Err(e);
                }
            };
            self.slots
                .insert(name.clone(), CacheSlot::Ready(Arc::clone(&metadata)));
            context.record_loaded(name);
            loaded.push(Arc::clone(&metadata));
            parent = Some(metadata);
        }

        for metadata in &loaded {
            if let Err(e) = resolve_discriminator_value(metadata, self, context) {
                self.slots.remove(&metadata.class_name);
                return Err(e);
            }
        }

        tracing::info!(
            target: "ormeta::factory",
            class = class_name,
            loaded = loaded.len(),
            "Loaded class metadata"
        );
        Ok(loaded)
    }

    fn do_load_metadata(
        &mut self,
        class_name: &str,
        parent: Option<&ClassMetadata>,
        context: &ClassMetadataBuildingContext,
    ) -> Result<ClassMetadata> {
        tracing::debug!(
            target: "ormeta::factory",
            class = class_name,
            parent = parent.map(|p| p.class_name.as_str()),
            "Loading class metadata from driver"
        );
        let mut metadata = self
            .driver
            .load_metadata_for_class(class_name, parent, context)?;
        if metadata.reflection().is_none() {
            if let Some(reflection) = self.reflection.class(class_name) {
                metadata.set_reflection(reflection);
            }
        }

        let platform = self.platform();
        complete_identifier_generator_mappings(
            &mut metadata,
            platform.as_ref(),
            &self.config.generators,
        )?;

        let inherits_from_mapped_superclass =
            parent.is_some_and(|p| p.is_mapped_superclass) && !metadata.is_mapped_superclass;

        if let Some(parent) = parent.filter(|_| inherits_from_mapped_superclass) {
            if metadata.cache.is_none() {
                metadata.cache = parent.cache.clone();
            }
            if metadata.entity_listeners.is_empty() {
                metadata.entity_listeners = parent.entity_listeners.clone();
            }
        }

        if metadata.discriminator_map.is_none()
            && metadata.has_inheritance()
            && metadata.is_root_entity()
            && !metadata.is_mapped_superclass
        {
            let known = self.known_class_names()?;
            let map = generate_discriminator_map(class_name, &known, self.reflection.as_ref())?;
            metadata.discriminator_map = Some(map);
        }
        self.add_direct_sub_classes(&mut metadata);

        if inherits_from_mapped_superclass {
            complete_runtime_metadata(&mut metadata);
        }

        if self.events.has_load_listeners() {
            let mut args = LoadClassMetadataArgs {
                metadata: &mut metadata,
                context,
            };
            self.events.dispatch_load_class_metadata(&mut args)?;
        }

        let plan =
            build_value_generation_plan(&metadata, platform.as_ref(), &self.config.generators)?;
        metadata.set_value_generation_plan(plan);

        validate_runtime_metadata(&metadata, context)?;
        Ok(metadata)
    }

    fn add_direct_sub_classes(&self, metadata: &mut ClassMetadata) {
        let Some(map) = metadata.discriminator_map.as_ref() else {
            return;
        };
        let direct: Vec<String> = map
            .values()
            .filter(|candidate| {
                self.reflection
                    .class(candidate)
                    .and_then(|c| c.parent.clone())
                    .is_some_and(|parent| parent == metadata.class_name)
            })
            .cloned()
            .collect();
        for class in direct {
            metadata.add_sub_class(class);
        }
    }

    /// Every class name the driver maps, enumerated once per factory.
    fn known_class_names(&mut self) -> Result<Arc<[String]>> {
        if let Some(names) = &self.known_class_names {
            return Ok(Arc::clone(names));
        }
        let names: Arc<[String]> = self.driver.get_all_class_names()?.into();
        tracing::debug!(
            target: "ormeta::factory",
            classes = names.len(),
            "Enumerated mapped classes"
        );
        self.known_class_names = Some(Arc::clone(&names));
        Ok(names)
    }

    // ========================================================================
    // Metadata cache
    // ========================================================================

    fn fetch_from_metadata_cache(&self, class_name: &str) -> Result<Option<Arc<ClassMetadata>>> {
        let Some(cache) = &self.config.metadata_cache else {
            return Ok(None);
        };
        let Some(mut metadata) = cache.fetch(&self.config.cache_key(class_name)) else {
            return Ok(None);
        };
        if metadata.class_name != class_name {
            tracing::warn!(
                target: "ormeta::cache",
                class = class_name,
                cached = %metadata.class_name,
                "Ignoring metadata cache entry for another class"
            );
            return Ok(None);
        }

        if let Some(reflection) = self.reflection.class(class_name) {
            metadata.set_reflection(reflection);
        }
        let plan = build_value_generation_plan(
            &metadata,
            self.platform().as_ref(),
            &self.config.generators,
        )?;
        metadata.set_value_generation_plan(plan);
        tracing::debug!(
            target: "ormeta::cache",
            class = class_name,
            "Restored class metadata from cache"
        );
        Ok(Some(Arc::new(metadata)))
    }

    fn save_to_metadata_cache(&self, loaded: &[Arc<ClassMetadata>]) {
        let Some(cache) = &self.config.metadata_cache else {
            return;
        };
        for metadata in loaded {
            if !cache.save(&self.config.cache_key(&metadata.class_name), metadata) {
                tracing::warn!(
                    target: "ormeta::cache",
                    class = %metadata.class_name,
                    "Failed to store class metadata in cache"
                );
            }
        }
    }
}

/// Pin declared columns of a class below a mapped superclass to its table.
fn complete_runtime_metadata(metadata: &mut ClassMetadata) {
    let table = metadata.table.name.clone();
    for property in metadata.declared_properties_mut() {
        match &mut property.kind {
            PropertyKind::Field(field) | PropertyKind::Version(field) => {
                if field.table_name.is_none() {
                    field.table_name = Some(table.clone());
                }
            }
            PropertyKind::ToOne(association) => {
                for join_column in &mut association.join_columns {
                    if join_column.table_name.is_none() {
                        join_column.table_name = Some(table.clone());
                    }
                }
            }
            PropertyKind::ToMany(_) => {}
        }
    }
}

impl MetadataResolver for ClassMetadataFactory {
    fn resolve_metadata(
        &mut self,
        class_name: &str,
        context: &ClassMetadataBuildingContext,
    ) -> Result<Arc<ClassMetadata>> {
        self.get_metadata_in(class_name, context)
    }
}

impl fmt::Debug for ClassMetadataFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut loaded: Vec<&String> = self.slots.keys().collect();
        loaded.sort();
        f.debug_struct("ClassMetadataFactory")
            .field("config", &self.config)
            .field("events", &self.events)
            .field("loaded", &loaded)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::StaticDriver;
    use crate::registry::ClassRegistry;
    use ormeta_core::{
        AssociationMetadata, ClassReflection, FieldMetadata, GeneratorType, PlatformKind,
        ValueGeneratorMetadata,
    };

    fn registry() -> ClassRegistry {
        ClassRegistry::new()
            .with_class(ClassReflection::new("app::User"))
            .with_class(ClassReflection::new("app::Post"))
    }

    fn driver() -> StaticDriver {
        StaticDriver::new()
            .entity("app::User", |m| {
                m.table("users").id(
                    "id",
                    FieldMetadata::new("integer").generated(ValueGeneratorMetadata::new(
                        GeneratorType::Auto,
                    )),
                )?;
                Ok(())
            })
            .entity("app::Post", |m| {
                m.table("posts")
                    .id("id", FieldMetadata::new("integer"))?
                    .association("author", AssociationMetadata::many_to_one("app::User"))?;
                Ok(())
            })
    }

    fn factory(kind: PlatformKind) -> ClassMetadataFactory {
        ClassMetadataFactory::new(MetadataConfig::new().platform(kind), driver(), registry())
    }

    #[test]
    fn test_lookup_is_cached() {
        let mut factory = factory(PlatformKind::PostgreSql);
        assert!(!factory.has_metadata_for("app::User"));
        let first = factory.get_metadata_for("app::User").unwrap();
        let second = factory.get_metadata_for("app::User").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(factory.has_metadata_for("app::User"));
        assert!(first.reflection().is_some());
    }

    #[test]
    fn test_second_pass_loads_association_targets() {
        let mut factory = factory(PlatformKind::Sqlite);
        factory.get_metadata_for("app::Post").unwrap();
        assert!(factory.has_metadata_for("app::User"));
        let names: Vec<String> = factory
            .get_loaded_metadata()
            .iter()
            .map(|m| m.class_name.clone())
            .collect();
        assert_eq!(names, vec!["app::Post", "app::User"]);
    }

    #[test]
    fn test_unknown_class_is_not_found() {
        let mut factory = factory(PlatformKind::Sqlite);
        let err = factory.get_metadata_for("app::Ghost").unwrap_err();
        assert!(err.is_class_not_found());
        assert!(factory.is_transient("app::Ghost"));
        assert!(!factory.has_metadata_for("app::Ghost"));
    }

    #[test]
    fn test_failed_lookup_evicts_committed_parents() {
        let registry =
            registry().with_class(ClassReflection::new("app::Admin").extends("app::User"));
        let driver = driver().entity("app::Admin", |m| {
            m.field("badge", FieldMetadata::new("integer"))?;
            m.generated_value("badge", "TABLE", serde_json::Map::new())?;
            Ok(())
        });
        let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

        assert!(factory.get_metadata_for("app::Admin").is_err());
        assert!(!factory.has_metadata_for("app::User"));
        assert!(!factory.has_metadata_for("app::Admin"));
        assert!(factory.get_metadata_for("app::User").is_ok());
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut factory = factory(PlatformKind::Sqlite);
        factory.get_metadata_for("app::User").unwrap();
        factory.clear();
        assert!(factory.get_loaded_metadata().is_empty());
    }

    #[test]
    fn test_set_metadata_for_bypasses_driver() {
        let mut factory = factory(PlatformKind::Sqlite);
        factory.set_metadata_for("app::Ghost", Arc::new(ClassMetadata::new("app::Ghost")));
        let ghost = factory.get_metadata_for("app::Ghost").unwrap();
        assert_eq!(ghost.class_name, "app::Ghost");
    }

    #[test]
    fn test_platform_resolved_once() {
        let factory = factory(PlatformKind::MySql);
        let a = factory.platform();
        let b = factory.platform();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "mysql");
    }

    #[test]
    fn test_complete_runtime_metadata_respects_explicit_tables() {
        let mut metadata = ClassMetadata::new("app::Manager");
        metadata.table.name = "managers".to_string();
        metadata
            .add_property(ormeta_core::Property::field(
                "bonus",
                FieldMetadata::new("integer").column("bonus"),
            ))
            .unwrap();
        metadata
            .add_property(ormeta_core::Property::field(
                "notes",
                FieldMetadata::new("string").column("notes").table("manager_notes"),
            ))
            .unwrap();
        complete_runtime_metadata(&mut metadata);

        let table = |name: &str| {
            metadata
                .property(name)
                .and_then(|p| p.as_field())
                .and_then(|f| f.table_name.clone())
        };
        assert_eq!(table("bonus").as_deref(), Some("managers"));
        assert_eq!(table("notes").as_deref(), Some("manager_notes"));
    }
}
