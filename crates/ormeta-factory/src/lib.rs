//! Class metadata factory for ormeta.
//!
//! `ormeta-factory` is the **loading layer**: it turns class names into
//! finished [`ormeta_core::ClassMetadata`].
//!
//! # Role In The Architecture
//!
//! - **Drivers**: [`MappingDriver`] supplies raw mappings; [`StaticDriver`]
//!   maps classes registered in code.
//! - **Factory**: [`ClassMetadataFactory`] completes, validates, and caches
//!   metadata in two phases, with deferred steps queued on a
//!   [`ClassMetadataBuildingContext`].
//! - **Extension points**: [`MetadataEvents`] listeners and a
//!   [`MetadataCache`] for persisted metadata.

pub mod cache;
pub mod config;
pub mod context;
pub mod discriminator;
pub mod driver;
pub mod events;
pub mod factory;
pub mod id_generator;
pub mod plan_builder;
pub mod registry;
pub mod validation;

pub use cache::{InMemoryMetadataCache, MetadataCache};
pub use config::{DEFAULT_CACHE_SALT, MetadataConfig};
pub use context::{ClassMetadataBuildingContext, MetadataResolver, SecondPass};
pub use discriminator::{default_discriminator_value, generate_discriminator_map};
pub use driver::{ClassLoader, MappingBuilder, MappingDriver, StaticDriver};
pub use events::{
    ClassMetadataNotFoundArgs, ClassMetadataNotFoundListener, LoadClassMetadataArgs,
    LoadClassMetadataListener, MetadataEvents,
};
pub use factory::ClassMetadataFactory;
pub use id_generator::{complete_identifier_generator_mappings, preferred_generator_type};
pub use plan_builder::build_value_generation_plan;
pub use registry::ClassRegistry;
