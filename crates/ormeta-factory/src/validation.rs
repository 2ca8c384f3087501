//! Runtime metadata validation.
//!
//! Runs as the last step of a class's primary pass. Metadata without a
//! reflection handle describes no runtime class and is not validated.

use ormeta_core::{ClassMetadata, MappingError, PropertyKind, Result};

use crate::context::ClassMetadataBuildingContext;

/// Validate a freshly loaded class.
pub fn validate_runtime_metadata(
    metadata: &ClassMetadata,
    context: &ClassMetadataBuildingContext,
) -> Result<()> {
    let Some(reflection) = metadata.reflection() else {
        tracing::debug!(
            target: "ormeta::validation",
            class = %metadata.class_name,
            "Skipping validation of static metadata"
        );
        return Ok(());
    };

    validate_identifier(metadata)?;
    validate_associations(metadata, context)?;

    for methods in metadata.lifecycle_callbacks.values() {
        for method in methods {
            if !reflection.has_method(method) {
                return Err(MappingError::LifecycleCallbackMethodNotFound {
                    class: metadata.class_name.clone(),
                    method: method.clone(),
                });
            }
        }
    }

    for listeners in metadata.entity_listeners.values() {
        for listener in listeners {
            let Some(listener_class) = context.reflection().class(&listener.class_name) else {
                return Err(MappingError::EntityListenerClassNotFound {
                    class: metadata.class_name.clone(),
                    listener: listener.class_name.clone(),
                });
            };
            if !listener_class.has_method(&listener.method) {
                return Err(MappingError::EntityListenerMethodNotFound {
                    class: metadata.class_name.clone(),
                    listener: listener.class_name.clone(),
                    method: listener.method.clone(),
                });
            }
        }
    }

    validate_inheritance(metadata)
}

fn validate_identifier(metadata: &ClassMetadata) -> Result<()> {
    if metadata.is_mapped_superclass {
        return Ok(());
    }
    if metadata.identifier.is_empty() {
        return Err(MappingError::IdentifierRequired {
            class: metadata.class_name.clone(),
        });
    }
    for name in &metadata.identifier {
        let is_key = metadata.property(name).is_some_and(|p| p.primary_key);
        if !is_key {
            return Err(MappingError::UnknownIdentifierProperty {
                class: metadata.class_name.clone(),
                property: name.clone(),
            });
        }
    }
    Ok(())
}

fn validate_associations(
    metadata: &ClassMetadata,
    context: &ClassMetadataBuildingContext,
) -> Result<()> {
    for property in metadata.declared_properties() {
        let (PropertyKind::ToOne(association) | PropertyKind::ToMany(association)) = &property.kind
        else {
            continue;
        };

        if let Some(option) = association.invalid_cascade_options().next() {
            return Err(MappingError::InvalidCascadeOption {
                class: metadata.class_name.clone(),
                property: property.name.clone(),
                option: option.to_string(),
            });
        }

        let target = association.target_entity.clone();
        if !context.reflection().class_exists(&target) {
            return Err(MappingError::InvalidTargetEntity {
                class: metadata.class_name.clone(),
                property: property.name.clone(),
                target,
            });
        }

        // Targets first seen during the second pass are checked by existence only.
        if !context.is_in_second_pass() {
            let class = metadata.class_name.clone();
            let property = property.name.clone();
            context.add_second_pass(move |resolver, context| {
                match resolver.resolve_metadata(&target, context) {
                    Ok(_) => Ok(()),
                    Err(e) if e.is_class_not_found() => Err(MappingError::InvalidTargetEntity {
                        class,
                        property,
                        target,
                    }),
                    Err(e) => Err(e),
                }
            })?;
        }
    }
    Ok(())
}

fn validate_inheritance(metadata: &ClassMetadata) -> Result<()> {
    if metadata.is_mapped_superclass {
        let declares_discriminator =
            metadata.discriminator_map.is_some() || metadata.discriminator_column.is_some();
        if metadata.is_root_entity() && declares_discriminator {
            return Err(MappingError::NoInheritanceOnMappedSuperclass {
                class: metadata.class_name.clone(),
            });
        }
        return Ok(());
    }

    if metadata.has_inheritance() && metadata.is_root_entity() {
        if metadata.discriminator_map.is_none() {
            return Err(MappingError::MissingDiscriminatorMap {
                class: metadata.class_name.clone(),
            });
        }
        if metadata.discriminator_column.is_none() {
            return Err(MappingError::MissingDiscriminatorColumn {
                class: metadata.class_name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClassRegistry;
    use ormeta_core::{
        AssociationMetadata, ClassReflection, DefaultNamingStrategy, DiscriminatorColumn,
        FieldMetadata, InheritanceType, LifecycleEvent, Property,
    };
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn registry() -> ClassRegistry {
        ClassRegistry::new()
            .with_class(ClassReflection::new("app::User").method("onPrePersist"))
            .with_class(ClassReflection::new("app::Team"))
            .with_class(ClassReflection::new("app::AuditListener").method("record"))
    }

    fn context() -> ClassMetadataBuildingContext {
        ClassMetadataBuildingContext::new(Arc::new(registry()), Arc::new(DefaultNamingStrategy))
    }

    fn user() -> ClassMetadata {
        let mut metadata = ClassMetadata::new("app::User");
        metadata.set_reflection(Arc::new(ClassReflection::new("app::User").method("onPrePersist")));
        metadata
            .add_property(
                Property::field("id", FieldMetadata::new("integer").column("id")).primary_key(true),
            )
            .unwrap();
        metadata
    }

    #[test]
    fn test_valid_metadata_passes_and_queues_target_check() {
        let ctx = context();
        let mut metadata = user();
        metadata
            .add_property(Property::association(
                "team",
                AssociationMetadata::many_to_one("app::Team").cascade("persist"),
            ))
            .unwrap();
        metadata.add_lifecycle_callback(LifecycleEvent::PrePersist, "onPrePersist");
        metadata.add_entity_listener(LifecycleEvent::PostPersist, "app::AuditListener", "record");

        validate_runtime_metadata(&metadata, &ctx).unwrap();
        assert_eq!(ctx.pending_second_passes(), 1);
    }

    #[test]
    fn test_static_metadata_is_not_validated() {
        let ctx = context();
        let metadata = ClassMetadata::new("app::Anything");
        validate_runtime_metadata(&metadata, &ctx).unwrap();
    }

    #[test]
    fn test_identifier_required() {
        let ctx = context();
        let mut metadata = ClassMetadata::new("app::User");
        metadata.set_reflection(Arc::new(ClassReflection::new("app::User")));
        assert!(matches!(
            validate_runtime_metadata(&metadata, &ctx),
            Err(MappingError::IdentifierRequired { .. })
        ));

        metadata.identifier.push("ghost".to_string());
        assert!(matches!(
            validate_runtime_metadata(&metadata, &ctx),
            Err(MappingError::UnknownIdentifierProperty { ref property, .. }) if property == "ghost"
        ));
    }

    #[test]
    fn test_association_checks() {
        let ctx = context();
        let mut metadata = user();
        metadata
            .add_property(Property::association(
                "team",
                AssociationMetadata::many_to_one("app::Team").cascade("explode"),
            ))
            .unwrap();
        assert!(matches!(
            validate_runtime_metadata(&metadata, &ctx),
            Err(MappingError::InvalidCascadeOption { ref option, .. }) if option == "explode"
        ));

        let mut metadata = user();
        metadata
            .add_property(Property::association(
                "league",
                AssociationMetadata::many_to_one("app::League"),
            ))
            .unwrap();
        assert!(matches!(
            validate_runtime_metadata(&metadata, &ctx),
            Err(MappingError::InvalidTargetEntity { ref target, .. }) if target == "app::League"
        ));
    }

    #[test]
    fn test_callback_and_listener_checks() {
        let ctx = context();
        let mut metadata = user();
        metadata.add_lifecycle_callback(LifecycleEvent::PreUpdate, "onPreUpdate");
        assert!(matches!(
            validate_runtime_metadata(&metadata, &ctx),
            Err(MappingError::LifecycleCallbackMethodNotFound { ref method, .. }) if method == "onPreUpdate"
        ));

        let mut metadata = user();
        metadata.add_entity_listener(LifecycleEvent::PostLoad, "app::Missing", "record");
        assert!(matches!(
            validate_runtime_metadata(&metadata, &ctx),
            Err(MappingError::EntityListenerClassNotFound { .. })
        ));

        let mut metadata = user();
        metadata.add_entity_listener(LifecycleEvent::PostLoad, "app::AuditListener", "forget");
        assert!(matches!(
            validate_runtime_metadata(&metadata, &ctx),
            Err(MappingError::EntityListenerMethodNotFound { .. })
        ));
    }

    #[test]
    fn test_inheritance_root_needs_map_then_column() {
        let ctx = context();
        let mut metadata = user();
        metadata.inheritance_type = InheritanceType::Joined;
        assert!(matches!(
            validate_runtime_metadata(&metadata, &ctx),
            Err(MappingError::MissingDiscriminatorMap { .. })
        ));

        metadata.discriminator_map = Some(BTreeMap::from([(
            "user".to_string(),
            "app::User".to_string(),
        )]));
        assert!(matches!(
            validate_runtime_metadata(&metadata, &ctx),
            Err(MappingError::MissingDiscriminatorColumn { .. })
        ));

        metadata.discriminator_column = Some(DiscriminatorColumn::new("dtype"));
        validate_runtime_metadata(&metadata, &ctx).unwrap();
    }

    #[test]
    fn test_root_mapped_superclass_rejects_discriminator() {
        let ctx = context();
        let mut metadata = ClassMetadata::new("app::User");
        metadata.set_reflection(Arc::new(ClassReflection::new("app::User")));
        metadata.is_mapped_superclass = true;
        validate_runtime_metadata(&metadata, &ctx).unwrap();

        metadata.discriminator_column = Some(DiscriminatorColumn::new("dtype"));
        assert!(matches!(
            validate_runtime_metadata(&metadata, &ctx),
            Err(MappingError::NoInheritanceOnMappedSuperclass { .. })
        ));
    }
}
