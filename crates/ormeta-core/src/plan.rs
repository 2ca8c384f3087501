//! Value generation plans.
//!
//! A [`ValueGenerationPlan`] is compiled once per class by the metadata
//! factory and is the only way the persistence layer obtains generated
//! identifier values at insert time:
//!
//! ```ignore
//! let plan = metadata.value_generation_plan();
//! let before = plan.execute_immediate(&mut backend, &mut entity)?;
//! // ... INSERT ...
//! if plan.contains_deferred() {
//!     let after = plan.execute_deferred(&mut backend, &mut entity)?;
//! }
//! ```

use crate::error::GenerationError;
use crate::generator::{GenerationBackend, Generator};
use crate::value::Value;

/// Property access to the entity being inserted.
///
/// Provided by the persistence layer's property accessors.
pub trait EntityAccess {
    /// Read a property value.
    fn get_value(&self, property: &str) -> Option<Value>;

    /// Write a property value.
    fn set_value(&mut self, property: &str, value: Value);

    /// Identifier values of the entity referenced by a to-one association,
    /// in join column order.
    fn related_identifier(&self, association: &str) -> Option<Vec<Value>> {
        self.get_value(association).map(|value| vec![value])
    }
}

/// A column value produced by a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedValue {
    /// Property the value belongs to.
    pub property: String,
    /// Column the value is written to.
    pub column: String,
    /// The value.
    pub value: Value,
}

/// One generation step, bound to a single property.
#[derive(Debug, Clone)]
pub enum ValueGenerationExecutor {
    /// Generates a column value with a generator.
    Column {
        property: String,
        column: String,
        generator: Generator,
    },
    /// Copies the identifier of the associated entity into the join columns.
    Association {
        property: String,
        target_entity: String,
        join_columns: Vec<String>,
    },
}

impl ValueGenerationExecutor {
    /// The property this executor fills.
    #[must_use]
    pub fn property(&self) -> &str {
        match self {
            ValueGenerationExecutor::Column { property, .. }
            | ValueGenerationExecutor::Association { property, .. } => property,
        }
    }

    /// Whether the executor runs after the INSERT.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        match self {
            ValueGenerationExecutor::Column { generator, .. } => generator.is_post_insert(),
            ValueGenerationExecutor::Association { .. } => false,
        }
    }

    /// Run the executor.
    ///
    /// Column executors write the generated value back to the entity.
    /// Association executors only report the join column values.
    pub fn execute(
        &self,
        backend: &mut dyn GenerationBackend,
        entity: &mut dyn EntityAccess,
    ) -> Result<Vec<GeneratedValue>, GenerationError> {
        match self {
            ValueGenerationExecutor::Column {
                property,
                column,
                generator,
            } => {
                let value = generator.generate(backend, &*entity)?;
                entity.set_value(property, value.clone());
                Ok(vec![GeneratedValue {
                    property: property.clone(),
                    column: column.clone(),
                    value,
                }])
            }
            ValueGenerationExecutor::Association {
                property,
                join_columns,
                ..
            } => {
                let identifier = entity.related_identifier(property).ok_or_else(|| {
                    GenerationError::MissingAssociationIdentifier {
                        property: property.clone(),
                    }
                })?;
                if identifier.len() < join_columns.len() {
                    return Err(GenerationError::MissingAssociationIdentifier {
                        property: property.clone(),
                    });
                }
                Ok(join_columns
                    .iter()
                    .zip(identifier)
                    .map(|(column, value)| GeneratedValue {
                        property: property.clone(),
                        column: column.clone(),
                        value,
                    })
                    .collect())
            }
        }
    }
}

/// Compiled strategy for producing generated values of one class.
#[derive(Debug, Clone, Default)]
pub enum ValueGenerationPlan {
    /// Nothing is generated.
    #[default]
    Noop,
    /// Exactly one generated property.
    Single(ValueGenerationExecutor),
    /// Several generated properties, run in discovery order.
    Composite(Vec<ValueGenerationExecutor>),
}

impl ValueGenerationPlan {
    /// Compile a list of executors into the matching plan shape.
    #[must_use]
    pub fn from_executors(mut executors: Vec<ValueGenerationExecutor>) -> Self {
        match executors.len() {
            0 => ValueGenerationPlan::Noop,
            1 => ValueGenerationPlan::Single(executors.remove(0)),
            _ => ValueGenerationPlan::Composite(executors),
        }
    }

    /// All executors in execution order.
    #[must_use]
    pub fn executors(&self) -> &[ValueGenerationExecutor] {
        match self {
            ValueGenerationPlan::Noop => &[],
            ValueGenerationPlan::Single(executor) => std::slice::from_ref(executor),
            ValueGenerationPlan::Composite(executors) => executors,
        }
    }

    /// Number of executors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executors().len()
    }

    /// True for the no-op plan.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, ValueGenerationPlan::Noop)
    }

    /// Whether any executor needs to run after the INSERT.
    #[must_use]
    pub fn contains_deferred(&self) -> bool {
        self.executors().iter().any(|e| e.is_deferred())
    }

    /// Run every executor whose value is needed before the INSERT.
    pub fn execute_immediate(
        &self,
        backend: &mut dyn GenerationBackend,
        entity: &mut dyn EntityAccess,
    ) -> Result<Vec<GeneratedValue>, GenerationError> {
        self.run(backend, entity, false)
    }

    /// Run every executor whose value is only known after the INSERT.
    pub fn execute_deferred(
        &self,
        backend: &mut dyn GenerationBackend,
        entity: &mut dyn EntityAccess,
    ) -> Result<Vec<GeneratedValue>, GenerationError> {
        self.run(backend, entity, true)
    }

    fn run(
        &self,
        backend: &mut dyn GenerationBackend,
        entity: &mut dyn EntityAccess,
        deferred: bool,
    ) -> Result<Vec<GeneratedValue>, GenerationError> {
        let mut values = Vec::new();
        for executor in self.executors() {
            if executor.is_deferred() == deferred {
                values.extend(executor.execute(backend, entity)?);
            }
        }
        Ok(values)
    }
}
