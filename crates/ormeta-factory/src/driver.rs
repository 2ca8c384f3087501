//! Mapping drivers.
//!
//! A [`MappingDriver`] turns a class name into a metadata draft. The factory
//! completes, validates, and caches what the driver returns. [`StaticDriver`]
//! is the in-tree driver for code-first mappings: each class registers a
//! loader closure that describes the mapping through a [`MappingBuilder`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ormeta_core::{
    AssociationMetadata, CacheMetadata, CacheUsage, ClassMetadata, DiscriminatorColumn,
    FieldMetadata, GeneratorType, InheritanceType, JoinColumn, JoinTable, LifecycleEvent,
    MappingError, Property, Result, TableMetadata, ValueGeneratorMetadata,
};

use crate::context::ClassMetadataBuildingContext;

/// Source of raw class mappings.
pub trait MappingDriver: Send + Sync {
    /// Produce the metadata draft of a class.
    ///
    /// `parent` is the finished metadata of the nearest mapped ancestor; the
    /// driver merges what the class inherits from it. Fails with
    /// [`MappingError::ClassNotFound`] for classes it does not map.
    fn load_metadata_for_class(
        &self,
        class_name: &str,
        parent: Option<&ClassMetadata>,
        context: &ClassMetadataBuildingContext,
    ) -> Result<ClassMetadata>;

    /// Every class this driver maps.
    fn get_all_class_names(&self) -> Result<Vec<String>>;

    /// Whether a class is not mapped (neither entity nor mapped superclass).
    fn is_transient(&self, class_name: &str) -> bool;
}

/// Loader closure describing one class.
pub type ClassLoader = Arc<dyn Fn(&mut MappingBuilder<'_>) -> Result<()> + Send + Sync>;

#[derive(Clone)]
struct StaticMapping {
    mapped_superclass: bool,
    loader: ClassLoader,
}

/// Driver over mappings registered in code.
#[derive(Clone, Default)]
pub struct StaticDriver {
    mappings: BTreeMap<String, StaticMapping>,
}

impl StaticDriver {
    /// Create a driver without mappings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map an entity.
    pub fn entity<F>(mut self, class_name: impl Into<String>, loader: F) -> Self
    where
        F: Fn(&mut MappingBuilder<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.mappings.insert(
            class_name.into(),
            StaticMapping {
                mapped_superclass: false,
                loader: Arc::new(loader),
            },
        );
        self
    }

    /// Map a mapped superclass.
    pub fn mapped_superclass<F>(mut self, class_name: impl Into<String>, loader: F) -> Self
    where
        F: Fn(&mut MappingBuilder<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.mappings.insert(
            class_name.into(),
            StaticMapping {
                mapped_superclass: true,
                loader: Arc::new(loader),
            },
        );
        self
    }
}

impl MappingDriver for StaticDriver {
    fn load_metadata_for_class(
        &self,
        class_name: &str,
        parent: Option<&ClassMetadata>,
        context: &ClassMetadataBuildingContext,
    ) -> Result<ClassMetadata> {
        let mapping = self
            .mappings
            .get(class_name)
            .ok_or_else(|| MappingError::ClassNotFound {
                class: class_name.to_string(),
            })?;

        let mut metadata = ClassMetadata::new(class_name);
        metadata.table =
            TableMetadata::new(context.naming_strategy().class_to_table_name(class_name));
        metadata.is_mapped_superclass = mapping.mapped_superclass;
        if let Some(parent) = parent {
            metadata.inherit_from(parent);
        }

        let mut builder = MappingBuilder::new(metadata, context);
        (mapping.loader)(&mut builder)?;
        Ok(builder.finish())
    }

    fn get_all_class_names(&self) -> Result<Vec<String>> {
        Ok(self.mappings.keys().cloned().collect())
    }

    fn is_transient(&self, class_name: &str) -> bool {
        !self.mappings.contains_key(class_name)
    }
}

impl fmt::Debug for StaticDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticDriver")
            .field("classes", &self.mappings.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Mapping builder
// ============================================================================

/// Describes one class mapping, filling unnamed columns from the naming
/// strategy of the building context.
pub struct MappingBuilder<'a> {
    metadata: ClassMetadata,
    context: &'a ClassMetadataBuildingContext,
}

impl<'a> MappingBuilder<'a> {
    /// Start from a draft (usually already merged with its parent).
    pub fn new(metadata: ClassMetadata, context: &'a ClassMetadataBuildingContext) -> Self {
        Self { metadata, context }
    }

    /// The draft so far.
    #[must_use]
    pub fn metadata(&self) -> &ClassMetadata {
        &self.metadata
    }

    /// Direct access to the draft.
    pub fn metadata_mut(&mut self) -> &mut ClassMetadata {
        &mut self.metadata
    }

    /// Building context of the current lookup.
    #[must_use]
    pub fn context(&self) -> &ClassMetadataBuildingContext {
        self.context
    }

    /// Set the table name.
    pub fn table(&mut self, name: impl Into<String>) -> &mut Self {
        self.metadata.table.name = name.into();
        self
    }

    /// Set the table schema.
    pub fn schema(&mut self, schema: impl Into<String>) -> &mut Self {
        self.metadata.table.schema = Some(schema.into());
        self
    }

    /// Set the inheritance type.
    pub fn inheritance(&mut self, inheritance_type: InheritanceType) -> &mut Self {
        self.metadata.inheritance_type = inheritance_type;
        self
    }

    /// Set the discriminator column.
    pub fn discriminator_column(&mut self, column: DiscriminatorColumn) -> &mut Self {
        self.metadata.discriminator_column = Some(column);
        self
    }

    /// Add a discriminator map entry.
    pub fn discriminator(
        &mut self,
        value: impl Into<String>,
        class_name: impl Into<String>,
    ) -> &mut Self {
        self.metadata
            .discriminator_map
            .get_or_insert_with(BTreeMap::new)
            .insert(value.into(), class_name.into());
        self
    }

    /// Mark the class read-only.
    pub fn read_only(&mut self) -> &mut Self {
        self.metadata.read_only = true;
        self
    }

    /// Enable second-level caching.
    pub fn cache(&mut self, usage: CacheUsage, region: impl Into<String>) -> &mut Self {
        self.metadata.cache = Some(CacheMetadata {
            usage,
            region: region.into(),
        });
        self
    }

    /// Register a lifecycle callback.
    pub fn lifecycle_callback(
        &mut self,
        event: LifecycleEvent,
        method: impl Into<String>,
    ) -> &mut Self {
        self.metadata.add_lifecycle_callback(event, method);
        self
    }

    /// Register an entity listener.
    pub fn entity_listener(
        &mut self,
        event: LifecycleEvent,
        class_name: impl Into<String>,
        method: impl Into<String>,
    ) -> &mut Self {
        self.metadata.add_entity_listener(event, class_name, method);
        self
    }

    /// Map a field.
    pub fn field(&mut self, name: &str, field: FieldMetadata) -> Result<&mut Self> {
        let field = self.complete_field(name, field);
        self.metadata.add_property(Property::field(name, field))?;
        Ok(self)
    }

    /// Map an identifier field.
    pub fn id(&mut self, name: &str, field: FieldMetadata) -> Result<&mut Self> {
        let field = self.complete_field(name, field);
        self.metadata
            .add_property(Property::field(name, field).primary_key(true))?;
        Ok(self)
    }

    /// Map a version field.
    pub fn version(&mut self, name: &str, field: FieldMetadata) -> Result<&mut Self> {
        let field = self.complete_field(name, field);
        self.metadata.add_property(Property::version(name, field))?;
        Ok(self)
    }

    /// Map an association.
    pub fn association(
        &mut self,
        name: &str,
        association: AssociationMetadata,
    ) -> Result<&mut Self> {
        let association = self.complete_association(name, association);
        self.metadata
            .add_property(Property::association(name, association))?;
        Ok(self)
    }

    /// Map a to-one association that is part of the identifier.
    pub fn id_association(
        &mut self,
        name: &str,
        association: AssociationMetadata,
    ) -> Result<&mut Self> {
        let association = self.complete_association(name, association);
        self.metadata
            .add_property(Property::association(name, association).primary_key(true))?;
        Ok(self)
    }

    /// Declare the generator of a mapped field from its raw strategy tag.
    pub fn generated_value(
        &mut self,
        property: &str,
        strategy: &str,
        definition: serde_json::Map<String, serde_json::Value>,
    ) -> Result<&mut Self> {
        let class = self.metadata.class_name.clone();
        let generator_type =
            GeneratorType::from_str(strategy).ok_or_else(|| MappingError::UnknownGeneratorType {
                class: class.clone(),
                property: property.to_string(),
                generator_type: strategy.to_string(),
            })?;
        let field = self
            .metadata
            .property_mut(property)
            .and_then(|p| p.as_field_mut())
            .ok_or_else(|| MappingError::InvalidGeneratorDefinition {
                class,
                property: property.to_string(),
                reason: "generators can only be declared on mapped fields".to_string(),
            })?;
        field.value_generator = Some(ValueGeneratorMetadata::with_definition(
            generator_type,
            definition,
        ));
        Ok(self)
    }

    /// Finish the draft.
    #[must_use]
    pub fn finish(self) -> ClassMetadata {
        self.metadata
    }

    fn complete_field(&self, name: &str, mut field: FieldMetadata) -> FieldMetadata {
        if field.column_name.is_empty() {
            field.column_name = self
                .context
                .naming_strategy()
                .property_to_column_name(name, &self.metadata.class_name);
        }
        field
    }

    fn complete_association(
        &self,
        name: &str,
        mut association: AssociationMetadata,
    ) -> AssociationMetadata {
        if !association.is_owning_side() {
            return association;
        }
        let naming = self.context.naming_strategy();
        let class_name = &self.metadata.class_name;

        if association.kind.is_to_one() {
            if association.join_columns.is_empty() {
                association.join_columns.push(JoinColumn::new(
                    naming.join_column_name(name, class_name),
                    naming.reference_column_name(),
                ));
            }
            for join_column in &mut association.join_columns {
                if join_column.column_name.is_empty() {
                    join_column.column_name = naming.join_column_name(name, class_name);
                }
                if join_column.referenced_column_name.is_empty() {
                    join_column.referenced_column_name = naming.reference_column_name();
                }
            }
        } else if association.join_table.is_none() {
            let target = association.target_entity.clone();
            association.join_table = Some(JoinTable {
                name: naming.join_table_name(class_name, &target, name),
                join_columns: vec![JoinColumn::new(
                    naming.join_key_column_name(class_name, None),
                    naming.reference_column_name(),
                )],
                inverse_join_columns: vec![JoinColumn::new(
                    naming.join_key_column_name(&target, None),
                    naming.reference_column_name(),
                )],
            });
        }
        association
    }
}
