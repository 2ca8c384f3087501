//! Identifier generator completion.
//!
//! Resolves the declared generator of every field against the target
//! platform: `AUTO` and `IDENTITY` become the platform's preferred style,
//! sequences get a name when the mapping did not give one, and strategies
//! that cannot work are rejected before any plan is built.

use ormeta_core::generator::{ALLOCATION_SIZE, SEQUENCE_NAME};
use ormeta_core::{
    ClassMetadata, CustomGeneratorRegistry, GeneratorType, MappingError, PlatformCapabilities,
    Result, ValueGeneratorMetadata,
};

/// Strategy that `AUTO` and `IDENTITY` resolve to on a platform.
#[must_use]
pub fn preferred_generator_type(platform: &dyn PlatformCapabilities) -> GeneratorType {
    if platform.prefers_sequences() || platform.uses_sequence_emulated_identity_columns() {
        GeneratorType::Sequence
    } else if platform.prefers_identity_columns() {
        GeneratorType::Identity
    } else {
        GeneratorType::Table
    }
}

/// Complete the generators of every field declared by `metadata`.
pub fn complete_identifier_generator_mappings(
    metadata: &mut ClassMetadata,
    platform: &dyn PlatformCapabilities,
    generators: &CustomGeneratorRegistry,
) -> Result<()> {
    let class_name = metadata.class_name.clone();
    let class_table = metadata.table.name.clone();
    let schema = metadata.table.schema.clone();

    for property in metadata.declared_properties_mut() {
        let property_name = property.name.clone();
        let Some(field) = property.as_field_mut() else {
            continue;
        };
        let Some(declared) = field.value_generator.take() else {
            continue;
        };
        let table = field.table_name.as_deref().unwrap_or(&class_table);
        let column = field.column_name.as_str();

        let completed = complete_field_generator(
            declared,
            platform,
            generators,
            FieldTarget {
                class: &class_name,
                property: &property_name,
                table,
                schema: schema.as_deref(),
                column,
            },
        )?;
        tracing::debug!(
            target: "ormeta::id_generator",
            class = %class_name,
            property = %property_name,
            generator = completed.generator_type.as_str(),
            "Completed identifier generator"
        );
        field.value_generator = Some(completed);
    }
    Ok(())
}

struct FieldTarget<'a> {
    class: &'a str,
    property: &'a str,
    table: &'a str,
    schema: Option<&'a str>,
    column: &'a str,
}

fn complete_field_generator(
    declared: ValueGeneratorMetadata,
    platform: &dyn PlatformCapabilities,
    generators: &CustomGeneratorRegistry,
    target: FieldTarget<'_>,
) -> Result<ValueGeneratorMetadata> {
    let mut generator = match declared.generator_type {
        GeneratorType::Auto | GeneratorType::Identity => ValueGeneratorMetadata::with_definition(
            preferred_generator_type(platform),
            declared.definition,
        ),
        _ => declared,
    };

    match generator.generator_type {
        GeneratorType::Sequence => {
            complete_sequence_definition(&mut generator, platform, &target)?;
        }
        GeneratorType::Table => {
            return Err(MappingError::TableGeneratorNotImplemented {
                class: target.class.to_string(),
                property: target.property.to_string(),
            });
        }
        GeneratorType::Custom => {
            let class = generator.custom_class().ok_or_else(|| {
                MappingError::MissingCustomGeneratorClass {
                    class: target.class.to_string(),
                    property: target.property.to_string(),
                }
            })?;
            if !generators.contains(class) {
                return Err(MappingError::CustomGeneratorNotFound {
                    class: target.class.to_string(),
                    property: target.property.to_string(),
                    generator_class: class.to_string(),
                });
            }
        }
        GeneratorType::Identity | GeneratorType::None | GeneratorType::Uuid => {}
        GeneratorType::Auto => {
            return Err(MappingError::UnresolvedGeneratorType {
                class: target.class.to_string(),
                property: target.property.to_string(),
                generator_type: GeneratorType::Auto,
            });
        }
    }
    Ok(generator)
}

fn complete_sequence_definition(
    generator: &mut ValueGeneratorMetadata,
    platform: &dyn PlatformCapabilities,
    target: &FieldTarget<'_>,
) -> Result<()> {
    let invalid = |reason: &str| MappingError::InvalidGeneratorDefinition {
        class: target.class.to_string(),
        property: target.property.to_string(),
        reason: reason.to_string(),
    };

    match generator.definition.get(SEQUENCE_NAME) {
        None => {
            let prefix = platform.sequence_prefix(target.table, target.schema);
            let name =
                platform.fix_schema_element_name(&format!("{prefix}_{}_seq", target.column));
            generator
                .definition
                .insert(SEQUENCE_NAME.to_string(), serde_json::Value::String(name));
        }
        Some(serde_json::Value::String(name)) if !name.is_empty() => {}
        Some(_) => return Err(invalid("sequenceName must be a non-empty string")),
    }

    match generator.definition.get(ALLOCATION_SIZE) {
        None => {
            generator
                .definition
                .insert(ALLOCATION_SIZE.to_string(), 1.into());
        }
        Some(value) if value.as_u64().is_some_and(|size| size > 0) => {}
        Some(_) => return Err(invalid("allocationSize must be a positive integer")),
    }
    Ok(())
}
