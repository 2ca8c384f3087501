//! Value generation plan building.

use ormeta_core::{
    ClassMetadata, CustomGeneratorRegistry, Generator, GeneratorType, MappingError,
    PlatformCapabilities, PropertyKind, Result, SequenceGenerator, ValueGenerationExecutor,
    ValueGenerationPlan, ValueGeneratorMetadata,
};

/// Compile the value generation plan of a class.
///
/// Only properties declared by the class itself contribute: every field
/// with an active generator yields a column executor, every identifier
/// to-one association an association executor.
pub fn build_value_generation_plan(
    metadata: &ClassMetadata,
    platform: &dyn PlatformCapabilities,
    generators: &CustomGeneratorRegistry,
) -> Result<ValueGenerationPlan> {
    let mut executors = Vec::new();

    for property in metadata.declared_properties() {
        match &property.kind {
            PropertyKind::Field(field) | PropertyKind::Version(field) => {
                let Some(declared) = field.value_generator.as_ref() else {
                    continue;
                };
                let table = metadata.column_table(property);
                let generator = create_generator(
                    declared,
                    platform,
                    generators,
                    GeneratorSite {
                        class: &metadata.class_name,
                        property: &property.name,
                        table,
                        schema: metadata.table.schema.as_deref(),
                        column: &field.column_name,
                    },
                )?;
                if let Some(generator) = generator {
                    executors.push(ValueGenerationExecutor::Column {
                        property: property.name.clone(),
                        column: field.column_name.clone(),
                        generator,
                    });
                }
            }
            PropertyKind::ToOne(association) if property.primary_key => {
                executors.push(ValueGenerationExecutor::Association {
                    property: property.name.clone(),
                    target_entity: association.target_entity.clone(),
                    join_columns: association
                        .join_columns
                        .iter()
                        .map(|jc| jc.column_name.clone())
                        .collect(),
                });
            }
            PropertyKind::ToOne(_) | PropertyKind::ToMany(_) => {}
        }
    }

    tracing::debug!(
        target: "ormeta::plan",
        class = %metadata.class_name,
        executors = executors.len(),
        "Built value generation plan"
    );
    Ok(ValueGenerationPlan::from_executors(executors))
}

struct GeneratorSite<'a> {
    class: &'a str,
    property: &'a str,
    table: &'a str,
    schema: Option<&'a str>,
    column: &'a str,
}

/// Turn a completed generator declaration into an executable generator.
/// `NONE` yields no generator.
fn create_generator(
    declared: &ValueGeneratorMetadata,
    platform: &dyn PlatformCapabilities,
    generators: &CustomGeneratorRegistry,
    site: GeneratorSite<'_>,
) -> Result<Option<Generator>> {
    let generator = match declared.generator_type {
        GeneratorType::None => return Ok(None),
        GeneratorType::Identity => {
            let sequence_name = platform.uses_sequence_emulated_identity_columns().then(|| {
                let prefix = platform.sequence_prefix(site.table, site.schema);
                platform.fix_schema_element_name(
                    &platform.identity_sequence_name(&prefix, site.column),
                )
            });
            Generator::Identity { sequence_name }
        }
        GeneratorType::Sequence => {
            let sequence_name = declared.sequence_name().ok_or_else(|| {
                MappingError::InvalidGeneratorDefinition {
                    class: site.class.to_string(),
                    property: site.property.to_string(),
                    reason: "sequence generator without sequenceName".to_string(),
                }
            })?;
            let allocation_size = declared.allocation_size().unwrap_or(1);
            Generator::Sequence(SequenceGenerator::new(sequence_name, allocation_size))
        }
        GeneratorType::Uuid => Generator::Uuid,
        GeneratorType::Custom => {
            let class = declared.custom_class().ok_or_else(|| {
                MappingError::MissingCustomGeneratorClass {
                    class: site.class.to_string(),
                    property: site.property.to_string(),
                }
            })?;
            let generator = generators.instantiate(class).ok_or_else(|| {
                MappingError::CustomGeneratorNotFound {
                    class: site.class.to_string(),
                    property: site.property.to_string(),
                    generator_class: class.to_string(),
                }
            })?;
            Generator::Custom {
                class: class.to_string(),
                generator,
            }
        }
        GeneratorType::Table => {
            return Err(MappingError::TableGeneratorNotImplemented {
                class: site.class.to_string(),
                property: site.property.to_string(),
            });
        }
        GeneratorType::Auto => {
            return Err(MappingError::UnresolvedGeneratorType {
                class: site.class.to_string(),
                property: site.property.to_string(),
                generator_type: GeneratorType::Auto,
            });
        }
    };
    Ok(Some(generator))
}
