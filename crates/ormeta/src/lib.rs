//! ormeta: class metadata mapping for relational persistence.
//!
//! `ormeta` describes how application classes map onto relational tables:
//! columns, associations, inheritance hierarchies, lifecycle hooks, and how
//! identifier values are generated at insert time.
//!
//! This crate is the facade. It re-exports the data model from
//! [`ormeta_core`] and the loading pipeline from [`ormeta_factory`].
//!
//! # Quick Start
//!
//! ```ignore
//! use ormeta::prelude::*;
//!
//! let registry = ClassRegistry::new().with_class(ClassReflection::new("app::User"));
//! let driver = StaticDriver::new().entity("app::User", |m| {
//!     m.table("users").id(
//!         "id",
//!         FieldMetadata::new("integer").generated(ValueGeneratorMetadata::new(GeneratorType::Auto)),
//!     )?;
//!     Ok(())
//! });
//!
//! let config = MetadataConfig::new().platform(PlatformKind::PostgreSql);
//! let mut factory = ClassMetadataFactory::new(config, driver, registry);
//! let user = factory.get_metadata_for("app::User")?;
//! assert!(!user.value_generation_plan().is_empty());
//! ```

pub use ormeta_core::*;
pub use ormeta_factory::*;

/// Common imports for mapping classes and loading metadata.
pub mod prelude {
    pub use ormeta_core::{
        AssociationMetadata, ClassMetadata, ClassReflection, DefaultNamingStrategy,
        EntityAccess, FieldMetadata, GenerationBackend, GenerationError, Generator,
        GeneratorType, InheritanceType, JoinColumn, LifecycleEvent, MappingError,
        NamingStrategy, PlatformKind, Property, ReflectionService, Result,
        UnderscoreNamingStrategy, Value, ValueGenerationPlan, ValueGeneratorMetadata,
    };
    pub use ormeta_factory::{
        ClassMetadataFactory, ClassRegistry, InMemoryMetadataCache, MappingBuilder,
        MappingDriver, MetadataConfig, MetadataEvents, StaticDriver,
    };
}
