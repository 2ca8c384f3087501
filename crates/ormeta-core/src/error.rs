//! Error types for metadata loading and value generation.
//!
//! Every failure raised while building class metadata is a [`MappingError`].
//! Errors are grouped into three categories (see [`ErrorCategory`]): bad
//! generator configuration, invalid mappings, and failed class lookups. All of
//! them are fatal for the `get_metadata_for` call that raised them.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use crate::generator::GeneratorType;

/// Result alias used throughout ormeta.
pub type Result<T, E = MappingError> = std::result::Result<T, E>;

/// Broad classification of a [`MappingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Identifier generator configuration is unusable.
    Configuration,
    /// The mapping itself violates a structural rule.
    Mapping,
    /// The requested class could not be described.
    Lookup,
}

/// Errors raised while loading, completing, or validating class metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    // Configuration
    /// `TABLE` generation is not implemented.
    TableGeneratorNotImplemented { class: String, property: String },
    /// A raw generator strategy tag did not name a known strategy.
    UnknownGeneratorType {
        class: String,
        property: String,
        generator_type: String,
    },
    /// A generator reached plan building without being resolved by the platform.
    UnresolvedGeneratorType {
        class: String,
        property: String,
        generator_type: GeneratorType,
    },
    /// A `CUSTOM` generator definition has no `class` entry.
    MissingCustomGeneratorClass { class: String, property: String },
    /// A `CUSTOM` generator names a class that is not registered.
    CustomGeneratorNotFound {
        class: String,
        property: String,
        generator_class: String,
    },
    /// A generator definition carries malformed values.
    InvalidGeneratorDefinition {
        class: String,
        property: String,
        reason: String,
    },

    // Mapping
    /// Root entity with inheritance has no discriminator map.
    MissingDiscriminatorMap { class: String },
    /// Root entity with inheritance has no discriminator column.
    MissingDiscriminatorColumn { class: String },
    /// Root mapped superclass declares discriminator metadata.
    NoInheritanceOnMappedSuperclass { class: String },
    /// Two properties resolve to the same column in one table.
    DuplicateColumnName { class: String, column: String },
    /// A property name was declared twice.
    DuplicatePropertyName { class: String, property: String },
    /// A property was declared with an empty name.
    EmptyFieldName { class: String },
    /// An association uses a cascade keyword that does not exist.
    InvalidCascadeOption {
        class: String,
        property: String,
        option: String,
    },
    /// An association targets a class that cannot be loaded.
    InvalidTargetEntity {
        class: String,
        property: String,
        target: String,
    },
    /// A to-many association was marked as part of the identifier.
    IllegalToManyIdentifier { class: String, property: String },
    /// An inverse-side to-one association was marked as part of the identifier.
    IllegalInverseSideIdentifier { class: String, property: String },
    /// An identifier association was configured for orphan removal.
    IllegalOrphanRemovalOnIdentifier { class: String, property: String },
    /// An entity has no identifier.
    IdentifierRequired { class: String },
    /// The identifier names a property that is missing or not a key.
    UnknownIdentifierProperty { class: String, property: String },
    /// A lifecycle callback names a method the class does not declare.
    LifecycleCallbackMethodNotFound { class: String, method: String },
    /// An entity listener class does not exist.
    EntityListenerClassNotFound { class: String, listener: String },
    /// An entity listener class does not declare the referenced method.
    EntityListenerMethodNotFound {
        class: String,
        listener: String,
        method: String,
    },
    /// Generated discriminator map would contain the same short name twice.
    DuplicateDiscriminatorEntry {
        class: String,
        duplicates: Vec<String>,
        map: BTreeMap<String, String>,
    },
    /// A concrete class is not listed in its hierarchy's discriminator map.
    ClassNotInDiscriminatorMap { class: String, root: String },
    /// A class was requested again while its own load was still in progress.
    CircularLoad { class: String },
    /// The parent chain of a class loops back onto itself.
    CircularInheritance { class: String },
    /// Second-pass work was queued after the second pass started.
    SecondPassAlreadyStarted,
    /// A building context was validated twice.
    ContextAlreadyValidated,

    // Lookup
    /// The class cannot be described by the driver.
    ClassNotFound { class: String },
}

impl MappingError {
    /// Classify this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            MappingError::TableGeneratorNotImplemented { .. }
            | MappingError::UnknownGeneratorType { .. }
            | MappingError::UnresolvedGeneratorType { .. }
            | MappingError::MissingCustomGeneratorClass { .. }
            | MappingError::CustomGeneratorNotFound { .. }
            | MappingError::InvalidGeneratorDefinition { .. } => ErrorCategory::Configuration,
            MappingError::ClassNotFound { .. } => ErrorCategory::Lookup,
            _ => ErrorCategory::Mapping,
        }
    }

    /// Whether this error means the class could not be described at all.
    #[must_use]
    pub const fn is_class_not_found(&self) -> bool {
        matches!(self, MappingError::ClassNotFound { .. })
    }

    /// The class the error was raised for, when there is one.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            MappingError::TableGeneratorNotImplemented { class, .. }
            | MappingError::UnknownGeneratorType { class, .. }
            | MappingError::UnresolvedGeneratorType { class, .. }
            | MappingError::MissingCustomGeneratorClass { class, .. }
            | MappingError::CustomGeneratorNotFound { class, .. }
            | MappingError::InvalidGeneratorDefinition { class, .. }
            | MappingError::MissingDiscriminatorMap { class }
            | MappingError::MissingDiscriminatorColumn { class }
            | MappingError::NoInheritanceOnMappedSuperclass { class }
            | MappingError::DuplicateColumnName { class, .. }
            | MappingError::DuplicatePropertyName { class, .. }
            | MappingError::EmptyFieldName { class }
            | MappingError::InvalidCascadeOption { class, .. }
            | MappingError::InvalidTargetEntity { class, .. }
            | MappingError::IllegalToManyIdentifier { class, .. }
            | MappingError::IllegalInverseSideIdentifier { class, .. }
            | MappingError::IllegalOrphanRemovalOnIdentifier { class, .. }
            | MappingError::IdentifierRequired { class }
            | MappingError::UnknownIdentifierProperty { class, .. }
            | MappingError::LifecycleCallbackMethodNotFound { class, .. }
            | MappingError::EntityListenerClassNotFound { class, .. }
            | MappingError::EntityListenerMethodNotFound { class, .. }
            | MappingError::DuplicateDiscriminatorEntry { class, .. }
            | MappingError::ClassNotInDiscriminatorMap { class, .. }
            | MappingError::CircularLoad { class }
            | MappingError::CircularInheritance { class }
            | MappingError::ClassNotFound { class } => Some(class),
            MappingError::SecondPassAlreadyStarted | MappingError::ContextAlreadyValidated => None,
        }
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::TableGeneratorNotImplemented { class, property } => write!(
                f,
                "TABLE value generation is not implemented ({}::{})",
                class, property
            ),
            MappingError::UnknownGeneratorType {
                class,
                property,
                generator_type,
            } => write!(
                f,
                "unknown generator type '{}' on {}::{}",
                generator_type, class, property
            ),
            MappingError::UnresolvedGeneratorType {
                class,
                property,
                generator_type,
            } => write!(
                f,
                "generator type {} on {}::{} was never resolved against the platform",
                generator_type.as_str(),
                class,
                property
            ),
            MappingError::MissingCustomGeneratorClass { class, property } => write!(
                f,
                "cannot instantiate custom generator for {}::{}: no class has been defined",
                class, property
            ),
            MappingError::CustomGeneratorNotFound {
                class,
                property,
                generator_class,
            } => write!(
                f,
                "cannot instantiate custom generator for {}::{}: class '{}' not found",
                class, property, generator_class
            ),
            MappingError::InvalidGeneratorDefinition {
                class,
                property,
                reason,
            } => write!(
                f,
                "invalid generator definition on {}::{}: {}",
                class, property, reason
            ),
            MappingError::MissingDiscriminatorMap { class } => write!(
                f,
                "entity class '{}' uses inheritance but no discriminator map was defined",
                class
            ),
            MappingError::MissingDiscriminatorColumn { class } => write!(
                f,
                "entity class '{}' uses inheritance but no discriminator column was defined",
                class
            ),
            MappingError::NoInheritanceOnMappedSuperclass { class } => write!(
                f,
                "mapped superclass '{}' cannot declare inheritance or discriminator metadata",
                class
            ),
            MappingError::DuplicateColumnName { class, column } => write!(
                f,
                "duplicate definition of column '{}' on entity '{}'",
                column, class
            ),
            MappingError::DuplicatePropertyName { class, property } => write!(
                f,
                "property '{}' on entity '{}' was already declared",
                property, class
            ),
            MappingError::EmptyFieldName { class } => {
                write!(f, "the field or association name on '{}' is empty", class)
            }
            MappingError::InvalidCascadeOption {
                class,
                property,
                option,
            } => write!(
                f,
                "invalid cascade option '{}' on {}::{}",
                option, class, property
            ),
            MappingError::InvalidTargetEntity {
                class,
                property,
                target,
            } => write!(
                f,
                "target entity '{}' of association {}::{} cannot be found",
                target, class, property
            ),
            MappingError::IllegalToManyIdentifier { class, property } => write!(
                f,
                "to-many association {}::{} cannot be part of the identifier",
                class, property
            ),
            MappingError::IllegalInverseSideIdentifier { class, property } => write!(
                f,
                "inverse-side association {}::{} cannot be part of the identifier",
                class, property
            ),
            MappingError::IllegalOrphanRemovalOnIdentifier { class, property } => write!(
                f,
                "identifier association {}::{} cannot use orphan removal",
                class, property
            ),
            MappingError::IdentifierRequired { class } => {
                write!(f, "no identifier specified for entity '{}'", class)
            }
            MappingError::UnknownIdentifierProperty { class, property } => write!(
                f,
                "identifier of '{}' references '{}', which is not a primary key property",
                class, property
            ),
            MappingError::LifecycleCallbackMethodNotFound { class, method } => write!(
                f,
                "lifecycle callback method '{}' does not exist on '{}'",
                method, class
            ),
            MappingError::EntityListenerClassNotFound { class, listener } => write!(
                f,
                "entity listener '{}' configured for '{}' was not found",
                listener, class
            ),
            MappingError::EntityListenerMethodNotFound {
                class,
                listener,
                method,
            } => write!(
                f,
                "entity listener '{}' configured for '{}' has no method '{}'",
                listener, class, method
            ),
            MappingError::DuplicateDiscriminatorEntry {
                class,
                duplicates,
                map,
            } => {
                write!(
                    f,
                    "the discriminator map of '{}' has duplicate entries: {}; map: {{",
                    class,
                    duplicates.join(", ")
                )?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            MappingError::ClassNotInDiscriminatorMap { class, root } => write!(
                f,
                "entity '{}' has to be part of the discriminator map of '{}'",
                class, root
            ),
            MappingError::CircularLoad { class } => write!(
                f,
                "metadata for '{}' was requested while it was still being loaded",
                class
            ),
            MappingError::CircularInheritance { class } => {
                write!(f, "the parent chain of '{}' is circular", class)
            }
            MappingError::SecondPassAlreadyStarted => {
                write!(f, "second-pass work cannot be queued once the second pass started")
            }
            MappingError::ContextAlreadyValidated => {
                write!(f, "the metadata building context was already validated")
            }
            MappingError::ClassNotFound { class } => write!(f, "class '{}' does not exist", class),
        }
    }
}

impl StdError for MappingError {}

/// Errors raised while executing a value generation plan at insert time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The backend failed to produce a value.
    Backend(String),
    /// A key association has no identifier value to copy.
    MissingAssociationIdentifier { property: String },
    /// A custom generator reported a failure.
    Custom { generator: String, message: String },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Backend(msg) => write!(f, "value generation backend error: {}", msg),
            GenerationError::MissingAssociationIdentifier { property } => write!(
                f,
                "associated entity of '{}' has no identifier value",
                property
            ),
            GenerationError::Custom { generator, message } => {
                write!(f, "custom generator '{}' failed: {}", generator, message)
            }
        }
    }
}

impl StdError for GenerationError {}
