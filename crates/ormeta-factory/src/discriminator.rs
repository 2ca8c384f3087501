//! Discriminator map defaulting and discriminator value resolution.

use std::collections::BTreeMap;

use ormeta_core::{ClassMetadata, MappingError, ReflectionService, Result, short_class_name};

use crate::context::{ClassMetadataBuildingContext, MetadataResolver};

/// Default discriminator value of a class: its lower-cased short name.
#[must_use]
pub fn default_discriminator_value(class_name: &str) -> String {
    short_class_name(class_name).to_lowercase()
}

/// Build the discriminator map of a hierarchy root from every known class.
///
/// The root and each of its transitive subclasses are keyed by their default
/// discriminator value. Two classes sharing a key fail the whole map.
pub fn generate_discriminator_map(
    root: &str,
    known_classes: &[String],
    reflection: &dyn ReflectionService,
) -> Result<BTreeMap<String, String>> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    let mut duplicates: Vec<String> = Vec::new();

    let subclasses = known_classes
        .iter()
        .map(String::as_str)
        .filter(|candidate| *candidate != root && reflection.is_subclass_of(candidate, root));

    for candidate in std::iter::once(root).chain(subclasses) {
        let key = default_discriminator_value(candidate);
        match map.get(&key) {
            Some(existing) if existing == candidate => {}
            Some(existing) => {
                for class in [existing.as_str(), candidate] {
                    if !duplicates.iter().any(|d| d == class) {
                        duplicates.push(class.to_string());
                    }
                }
            }
            None => {
                map.insert(key, candidate.to_string());
            }
        }
    }

    if !duplicates.is_empty() {
        return Err(MappingError::DuplicateDiscriminatorEntry {
            class: root.to_string(),
            duplicates,
            map,
        });
    }

    tracing::debug!(
        target: "ormeta::discriminator",
        root = root,
        entries = map.len(),
        "Generated discriminator map"
    );
    Ok(map)
}

/// Whether a class still needs its discriminator value resolved.
#[must_use]
pub fn needs_discriminator_value(metadata: &ClassMetadata) -> bool {
    metadata.discriminator_value().is_none()
        && metadata.discriminator_map.is_some()
        && !metadata.is_mapped_superclass
        && !metadata.is_abstract()
}

/// Resolve the discriminator value of a class from its map.
///
/// An entry naming the class exactly wins. Otherwise every entry's metadata
/// is resolved and the first entry whose resolved class is this class wins.
/// Calling this on a class that already has a value is a no-op.
pub fn resolve_discriminator_value(
    metadata: &ClassMetadata,
    resolver: &mut dyn MetadataResolver,
    context: &ClassMetadataBuildingContext,
) -> Result<()> {
    if !needs_discriminator_value(metadata) {
        return Ok(());
    }
    let Some(map) = metadata.discriminator_map.as_ref() else {
        return Ok(());
    };

    if let Some((value, _)) = map.iter().find(|(_, class)| **class == metadata.class_name) {
        metadata.set_discriminator_value(value.clone());
        return Ok(());
    }

    for (value, class) in map {
        let resolved = resolver.resolve_metadata(class, context)?;
        if resolved.class_name == metadata.class_name {
            metadata.set_discriminator_value(value.clone());
            return Ok(());
        }
    }

    Err(MappingError::ClassNotInDiscriminatorMap {
        class: metadata.class_name.clone(),
        root: metadata.root_class_name.clone(),
    })
}
