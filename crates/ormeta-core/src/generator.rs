//! Identifier generator declarations and executable generators.
//!
//! A mapping declares *intent* with [`ValueGeneratorMetadata`] (a strategy tag
//! plus a free-form definition map). Once the metadata factory has resolved the
//! intent against the target platform, the plan builder turns it into an
//! executable [`Generator`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::error::GenerationError;
use crate::plan::EntityAccess;
use crate::value::Value;

/// Definition key holding the sequence name.
pub const SEQUENCE_NAME: &str = "sequenceName";
/// Definition key holding the sequence allocation size.
pub const ALLOCATION_SIZE: &str = "allocationSize";
/// Definition key holding the custom generator class.
pub const GENERATOR_CLASS: &str = "class";

/// Declared identifier generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeneratorType {
    /// Let the platform pick.
    Auto,
    /// Sequence-backed values.
    Sequence,
    /// Hi/lo table values.
    Table,
    /// Identity (auto-increment) column.
    Identity,
    /// Values are assigned by the application.
    None,
    /// Random UUIDs.
    Uuid,
    /// A registered custom generator.
    Custom,
}

impl GeneratorType {
    /// The canonical strategy tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            GeneratorType::Auto => "AUTO",
            GeneratorType::Sequence => "SEQUENCE",
            GeneratorType::Table => "TABLE",
            GeneratorType::Identity => "IDENTITY",
            GeneratorType::None => "NONE",
            GeneratorType::Uuid => "UUID",
            GeneratorType::Custom => "CUSTOM",
        }
    }

    /// Parse a strategy tag (case-insensitive).
    ///
    /// Returns `None` if the tag is not a recognized strategy.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "AUTO" => Some(GeneratorType::Auto),
            "SEQUENCE" => Some(GeneratorType::Sequence),
            "TABLE" => Some(GeneratorType::Table),
            "IDENTITY" => Some(GeneratorType::Identity),
            "NONE" => Some(GeneratorType::None),
            "UUID" => Some(GeneratorType::Uuid),
            "CUSTOM" => Some(GeneratorType::Custom),
            _ => None,
        }
    }
}

/// Declared generator for a field: strategy plus definition map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueGeneratorMetadata {
    /// Strategy tag.
    pub generator_type: GeneratorType,
    /// Strategy-specific settings (`sequenceName`, `allocationSize`, `class`).
    #[serde(default)]
    pub definition: Map<String, serde_json::Value>,
}

impl ValueGeneratorMetadata {
    /// Create a generator descriptor with an empty definition.
    pub fn new(generator_type: GeneratorType) -> Self {
        Self {
            generator_type,
            definition: Map::new(),
        }
    }

    /// Create a generator descriptor with the given definition.
    pub fn with_definition(
        generator_type: GeneratorType,
        definition: Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            generator_type,
            definition,
        }
    }

    /// Sequence definition shorthand.
    pub fn sequence(name: impl Into<String>, allocation_size: u32) -> Self {
        let mut definition = Map::new();
        definition.insert(
            SEQUENCE_NAME.to_string(),
            serde_json::Value::String(name.into()),
        );
        definition.insert(ALLOCATION_SIZE.to_string(), allocation_size.into());
        Self::with_definition(GeneratorType::Sequence, definition)
    }

    /// Custom generator shorthand.
    pub fn custom(class: impl Into<String>) -> Self {
        let mut definition = Map::new();
        definition.insert(
            GENERATOR_CLASS.to_string(),
            serde_json::Value::String(class.into()),
        );
        Self::with_definition(GeneratorType::Custom, definition)
    }

    /// Add one definition entry (builder pattern).
    pub fn set(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.definition.insert(key.to_string(), value.into());
        self
    }

    /// Whether the definition map is empty.
    #[must_use]
    pub fn has_definition(&self) -> bool {
        !self.definition.is_empty()
    }

    /// The configured sequence name.
    #[must_use]
    pub fn sequence_name(&self) -> Option<&str> {
        self.definition.get(SEQUENCE_NAME).and_then(|v| v.as_str())
    }

    /// The configured allocation size.
    #[must_use]
    pub fn allocation_size(&self) -> Option<u64> {
        self.definition.get(ALLOCATION_SIZE).and_then(|v| v.as_u64())
    }

    /// The configured custom generator class.
    #[must_use]
    pub fn custom_class(&self) -> Option<&str> {
        self.definition.get(GENERATOR_CLASS).and_then(|v| v.as_str())
    }
}

// ============================================================================
// Executable generators
// ============================================================================

/// Source of database-produced values used by generators.
///
/// Implemented by the persistence layer on top of a live connection.
pub trait GenerationBackend {
    /// Fetch the next value of a sequence.
    fn next_sequence_value(&mut self, sequence_name: &str) -> Result<i64, GenerationError>;

    /// Fetch the identifier assigned by the last insert.
    fn last_insert_id(&mut self, sequence_name: Option<&str>) -> Result<i64, GenerationError>;
}

/// A user-supplied generator, registered under a class name.
pub trait CustomValueGenerator: Send + Sync + fmt::Debug {
    /// Produce a value for the entity about to be inserted.
    fn generate(
        &self,
        backend: &mut dyn GenerationBackend,
        entity: &dyn EntityAccess,
    ) -> Result<Value, GenerationError>;

    /// Whether the value is only available after the INSERT ran.
    fn is_post_insert(&self) -> bool {
        false
    }
}

/// Sequence generator that hands out values in blocks of `allocation_size`.
#[derive(Debug)]
pub struct SequenceGenerator {
    sequence_name: String,
    allocation_size: u64,
    // (next value, exclusive upper bound of the current block)
    state: Mutex<(i64, i64)>,
}

impl SequenceGenerator {
    /// Create a sequence generator.
    pub fn new(sequence_name: impl Into<String>, allocation_size: u64) -> Self {
        Self {
            sequence_name: sequence_name.into(),
            allocation_size: allocation_size.max(1),
            state: Mutex::new((0, 0)),
        }
    }

    /// The sequence name.
    #[must_use]
    pub fn sequence_name(&self) -> &str {
        &self.sequence_name
    }

    /// Values fetched per database round trip.
    #[must_use]
    pub const fn allocation_size(&self) -> u64 {
        self.allocation_size
    }

    fn next(&self, backend: &mut dyn GenerationBackend) -> Result<i64, GenerationError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GenerationError::Backend("sequence state poisoned".to_string()))?;
        if state.0 >= state.1 {
            let next = backend.next_sequence_value(&self.sequence_name)?;
            let size = i64::try_from(self.allocation_size).unwrap_or(i64::MAX);
            *state = (next, next.saturating_add(size));
        }
        let value = state.0;
        state.0 = value.checked_add(1).ok_or_else(|| {
            GenerationError::Backend(format!("sequence '{}' is exhausted", self.sequence_name))
        })?;
        Ok(value)
    }
}

impl Clone for SequenceGenerator {
    fn clone(&self) -> Self {
        // A clone starts a fresh block.
        Self::new(self.sequence_name.clone(), self.allocation_size)
    }
}

/// Executable generator compiled from resolved [`ValueGeneratorMetadata`].
#[derive(Debug, Clone)]
pub enum Generator {
    /// Identity column; optionally emulated through a sequence.
    Identity { sequence_name: Option<String> },
    /// Sequence with block allocation.
    Sequence(SequenceGenerator),
    /// Random UUID (v4).
    Uuid,
    /// Registered custom generator.
    Custom {
        class: String,
        generator: Arc<dyn CustomValueGenerator>,
    },
}

impl Generator {
    /// Whether the value is only known after the INSERT.
    #[must_use]
    pub fn is_post_insert(&self) -> bool {
        match self {
            Generator::Identity { .. } => true,
            Generator::Sequence(_) | Generator::Uuid => false,
            Generator::Custom { generator, .. } => generator.is_post_insert(),
        }
    }

    /// Produce a value.
    pub fn generate(
        &self,
        backend: &mut dyn GenerationBackend,
        entity: &dyn EntityAccess,
    ) -> Result<Value, GenerationError> {
        match self {
            Generator::Identity { sequence_name } => backend
                .last_insert_id(sequence_name.as_deref())
                .map(Value::BigInt),
            Generator::Sequence(sequence) => sequence.next(backend).map(Value::BigInt),
            Generator::Uuid => Ok(Value::Uuid(uuid::Uuid::new_v4())),
            Generator::Custom { generator, .. } => generator.generate(backend, entity),
        }
    }
}

// ============================================================================
// Custom generator registry
// ============================================================================

type GeneratorConstructor = Arc<dyn Fn() -> Arc<dyn CustomValueGenerator> + Send + Sync>;

/// Registry of custom generator "classes" that `CUSTOM` strategies may name.
#[derive(Clone, Default)]
pub struct CustomGeneratorRegistry {
    constructors: HashMap<String, GeneratorConstructor>,
}

impl CustomGeneratorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generator constructor under a class name.
    pub fn register<F>(&mut self, class: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn CustomValueGenerator> + Send + Sync + 'static,
    {
        self.constructors.insert(class.into(), Arc::new(constructor));
    }

    /// Whether a generator class is registered.
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.constructors.contains_key(class)
    }

    /// Build a new generator instance for a class.
    #[must_use]
    pub fn instantiate(&self, class: &str) -> Option<Arc<dyn CustomValueGenerator>> {
        self.constructors.get(class).map(|constructor| constructor())
    }
}

impl fmt::Debug for CustomGeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<&String> = self.constructors.keys().collect();
        classes.sort();
        f.debug_struct("CustomGeneratorRegistry")
            .field("classes", &classes)
            .finish()
    }
}
