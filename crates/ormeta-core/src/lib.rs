//! Core types and traits for ormeta.
//!
//! `ormeta-core` is the **data layer** of the metadata engine. It defines the
//! runtime description of a mapped class and the contracts the metadata
//! factory consumes.
//!
//! # Role In The Architecture
//!
//! - **Data model**: `ClassMetadata`, `Property`, and `ValueGeneratorMetadata`
//!   describe how a class persists.
//! - **Identifier generation**: `Generator` and `ValueGenerationPlan` are the
//!   executable side of a class's generator declarations.
//! - **Collaborator contracts**: `ReflectionService`, `NamingStrategy`, and
//!   `PlatformCapabilities` are the seams embedders implement.
//!
//! `ormeta-factory` builds on these types; most applications should use the
//! `ormeta` facade.

pub mod error;
pub mod generator;
pub mod metadata;
pub mod naming;
pub mod plan;
pub mod platform;
pub mod property;
pub mod reflection;
pub mod value;

pub use error::{ErrorCategory, GenerationError, MappingError, Result};
pub use generator::{
    CustomGeneratorRegistry, CustomValueGenerator, GenerationBackend, Generator, GeneratorType,
    SequenceGenerator, ValueGeneratorMetadata,
};
pub use metadata::{
    CacheMetadata, CacheUsage, ClassMetadata, DiscriminatorColumn, EntityListener,
    InheritanceType, LifecycleEvent, TableMetadata,
};
pub use naming::{
    DefaultNamingStrategy, LetterCase, NamingStrategy, UnderscoreNamingStrategy, short_class_name,
};
pub use plan::{EntityAccess, GeneratedValue, ValueGenerationExecutor, ValueGenerationPlan};
pub use platform::{Platform, PlatformCapabilities, PlatformKind};
pub use property::{
    AssociationKind, AssociationMetadata, FetchMode, FieldMetadata, JoinColumn, JoinTable,
    Property, PropertyKind,
};
pub use reflection::{ClassReflection, ReflectionService};
pub use value::Value;
