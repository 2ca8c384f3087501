use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ormeta::prelude::*;
use ormeta::{CacheUsage, ClassMetadataBuildingContext, DiscriminatorColumn, Generator, MetadataCache};

fn user_mapping(m: &mut MappingBuilder<'_>) -> Result<()> {
    m.table("users")
        .id("id", FieldMetadata::new("integer"))?
        .field("email", FieldMetadata::new("string").unique(true))?;
    m.generated_value("id", "auto", serde_json::Map::new())?;
    Ok(())
}

fn users() -> (ClassRegistry, StaticDriver) {
    let registry = ClassRegistry::new().with_class(ClassReflection::new("app::User"));
    let driver = StaticDriver::new().entity("app::User", user_mapping);
    (registry, driver)
}

fn vehicles() -> (ClassRegistry, StaticDriver) {
    let registry = ClassRegistry::new()
        .with_class(ClassReflection::new("app::Vehicle"))
        .with_class(ClassReflection::new("app::Car").extends("app::Vehicle"))
        .with_class(ClassReflection::new("app::Truck").extends("app::Vehicle"));
    let driver = StaticDriver::new()
        .entity("app::Vehicle", |m| {
            m.table("vehicles")
                .inheritance(InheritanceType::SingleTable)
                .discriminator_column(DiscriminatorColumn::new("dtype"))
                .id("id", FieldMetadata::new("integer"))?;
            Ok(())
        })
        .entity("app::Car", |m| {
            m.field("doors", FieldMetadata::new("integer"))?;
            Ok(())
        })
        .entity("app::Truck", |m| {
            m.field("payload", FieldMetadata::new("integer"))?;
            Ok(())
        });
    (registry, driver)
}

fn employees() -> (ClassRegistry, StaticDriver) {
    let registry = ClassRegistry::new()
        .with_class(ClassReflection::new("app::Employee").abstract_class())
        .with_class(ClassReflection::new("app::Manager").extends("app::Employee"))
        .with_class(ClassReflection::new("app::AuditListener").method("record"));
    let driver = StaticDriver::new()
        .mapped_superclass("app::Employee", |m| {
            m.table("employee")
                .cache(CacheUsage::ReadWrite, "staff")
                .entity_listener(LifecycleEvent::PostPersist, "app::AuditListener", "record")
                .id("id", FieldMetadata::new("integer"))?
                .field("salary", FieldMetadata::new("integer"))?;
            Ok(())
        })
        .entity("app::Manager", |m| {
            m.table("manager")
                .field("bonus", FieldMetadata::new("integer"))?;
            Ok(())
        });
    (registry, driver)
}

fn field_table(metadata: &ClassMetadata, property: &str) -> Option<String> {
    metadata
        .property(property)
        .and_then(Property::as_field)
        .and_then(|field| field.table_name.clone())
}

#[test]
fn auto_identifier_becomes_sequence_on_sequence_platform() {
    let (registry, driver) = users();
    let config = MetadataConfig::new().platform(PlatformKind::PostgreSql);
    let mut factory = ClassMetadataFactory::new(config, driver, registry);

    let user = factory.get_metadata_for("app::User").unwrap();
    let generator = user
        .property("id")
        .and_then(Property::as_field)
        .and_then(|field| field.value_generator.clone())
        .unwrap();
    assert_eq!(generator.generator_type, GeneratorType::Sequence);
    assert_eq!(generator.sequence_name(), Some("users_id_seq"));
    assert_eq!(generator.allocation_size(), Some(1));

    let ValueGenerationPlan::Single(executor) = user.value_generation_plan() else {
        panic!("expected a single executor");
    };
    assert_eq!(executor.property(), "id");
    assert!(!executor.is_deferred());
}

#[test]
fn auto_identifier_becomes_identity_on_identity_platform() {
    let (registry, driver) = users();
    let config = MetadataConfig::new().platform(PlatformKind::MySql);
    let mut factory = ClassMetadataFactory::new(config, driver, registry);

    let user = factory.get_metadata_for("app::User").unwrap();
    let generator = user
        .property("id")
        .and_then(Property::as_field)
        .and_then(|field| field.value_generator.clone())
        .unwrap();
    assert_eq!(generator.generator_type, GeneratorType::Identity);
    assert!(user.value_generation_plan().contains_deferred());
}

#[test]
fn table_generator_is_rejected() {
    let registry = ClassRegistry::new().with_class(ClassReflection::new("app::Ticket"));
    let driver = StaticDriver::new().entity("app::Ticket", |m| {
        m.id("id", FieldMetadata::new("integer"))?;
        m.generated_value("id", "TABLE", serde_json::Map::new())?;
        Ok(())
    });
    let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

    let err = factory.get_metadata_for("app::Ticket").unwrap_err();
    assert!(matches!(err, MappingError::TableGeneratorNotImplemented { .. }));
    assert!(!factory.has_metadata_for("app::Ticket"));
}

#[test]
fn unknown_generator_tag_is_rejected() {
    let registry = ClassRegistry::new().with_class(ClassReflection::new("app::Ticket"));
    let driver = StaticDriver::new().entity("app::Ticket", |m| {
        m.id("id", FieldMetadata::new("integer"))?;
        m.generated_value("id", "hilo", serde_json::Map::new())?;
        Ok(())
    });
    let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

    let err = factory.get_metadata_for("app::Ticket").unwrap_err();
    assert!(matches!(
        err,
        MappingError::UnknownGeneratorType { ref generator_type, .. } if generator_type == "hilo"
    ));
}

#[test]
fn discriminator_map_generated_for_single_table_root() {
    let (registry, driver) = vehicles();
    let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

    let car = factory.get_metadata_for("app::Car").unwrap();
    let expected: BTreeMap<String, String> = [
        ("car", "app::Car"),
        ("truck", "app::Truck"),
        ("vehicle", "app::Vehicle"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(car.discriminator_map.as_ref(), Some(&expected));
    assert_eq!(car.discriminator_value(), Some("car"));
    assert_eq!(car.table.name, "vehicles");
    assert_eq!(car.root_class_name, "app::Vehicle");

    let vehicle = factory.get_metadata_for("app::Vehicle").unwrap();
    assert_eq!(vehicle.discriminator_value(), Some("vehicle"));
    assert!(vehicle.sub_classes.contains("app::Car"));
    assert!(vehicle.sub_classes.contains("app::Truck"));
}

#[test]
fn discriminator_resolution_is_idempotent() {
    let (registry, driver) = vehicles();
    let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry.clone());
    let truck = factory.get_metadata_for("app::Truck").unwrap();
    assert_eq!(truck.discriminator_value(), Some("truck"));

    let context = ClassMetadataBuildingContext::new(
        Arc::new(registry),
        Arc::new(DefaultNamingStrategy),
    );
    factory
        .resolve_discriminator_value(&truck, &context)
        .unwrap();
    assert_eq!(truck.discriminator_value(), Some("truck"));
}

#[test]
fn duplicate_discriminator_short_names_fail() {
    let (registry, driver) = vehicles();
    let registry =
        registry.with_class(ClassReflection::new("legacy::Car").extends("app::Vehicle"));
    let driver = driver.entity("legacy::Car", |_| Ok(()));
    let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

    let err = factory.get_metadata_for("app::Vehicle").unwrap_err();
    let MappingError::DuplicateDiscriminatorEntry {
        class, duplicates, ..
    } = err
    else {
        panic!("expected a duplicate discriminator entry, got {err:?}");
    };
    assert_eq!(class, "app::Vehicle");
    assert_eq!(duplicates, vec!["app::Car", "legacy::Car"]);
}

#[test]
fn subclass_outside_explicit_map_fails() {
    let registry = ClassRegistry::new()
        .with_class(ClassReflection::new("app::Vehicle"))
        .with_class(ClassReflection::new("app::Boat").extends("app::Vehicle"));
    let driver = StaticDriver::new()
        .entity("app::Vehicle", |m| {
            m.inheritance(InheritanceType::Joined)
                .discriminator_column(DiscriminatorColumn::new("dtype"))
                .discriminator("vehicle", "app::Vehicle")
                .id("id", FieldMetadata::new("integer"))?;
            Ok(())
        })
        .entity("app::Boat", |_| Ok(()));
    let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

    let err = factory.get_metadata_for("app::Boat").unwrap_err();
    assert_eq!(
        err,
        MappingError::ClassNotInDiscriminatorMap {
            class: "app::Boat".to_string(),
            root: "app::Vehicle".to_string(),
        }
    );
    assert!(!factory.has_metadata_for("app::Boat"));
    assert!(factory.has_metadata_for("app::Vehicle"));
}

#[test]
fn fields_below_mapped_superclass_resolve_their_tables() {
    let (registry, driver) = employees();
    let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

    let manager = factory.get_metadata_for("app::Manager").unwrap();
    assert!(manager.is_root_entity());
    assert_eq!(manager.parent_classes, vec!["app::Employee"]);
    assert_eq!(field_table(&manager, "salary").as_deref(), Some("employee"));
    assert_eq!(field_table(&manager, "bonus").as_deref(), Some("manager"));
    assert_eq!(manager.identifier, vec!["id"]);
}

#[test]
fn mapped_superclass_shares_cache_and_listeners() {
    let (registry, driver) = employees();
    let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

    let manager = factory.get_metadata_for("app::Manager").unwrap();
    let cache = manager.cache.as_ref().unwrap();
    assert_eq!(cache.usage, CacheUsage::ReadWrite);
    assert_eq!(cache.region, "staff");
    let listeners = &manager.entity_listeners[&LifecycleEvent::PostPersist];
    assert_eq!(listeners.len(), 1);
    assert_eq!(listeners[0].class_name, "app::AuditListener");

    let employee = factory.get_metadata_for("app::Employee").unwrap();
    assert!(employee.is_mapped_superclass);
    assert_eq!(employee.discriminator_value(), None);
}

#[test]
fn duplicate_column_fails_in_either_order() {
    for (first, second) in [("email", "contact"), ("contact", "email")] {
        let registry = ClassRegistry::new().with_class(ClassReflection::new("app::User"));
        let driver = StaticDriver::new().entity("app::User", move |m| {
            m.id("id", FieldMetadata::new("integer"))?
                .field(first, FieldMetadata::new("string").column("email"))?
                .field(second, FieldMetadata::new("string").column("email"))?;
            Ok(())
        });
        let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

        let err = factory.get_metadata_for("app::User").unwrap_err();
        assert!(
            matches!(err, MappingError::DuplicateColumnName { ref column, .. } if column == "email"),
            "unexpected error {err:?}"
        );
    }
}

#[test]
fn not_found_listener_supplies_metadata() {
    let events = MetadataEvents::new().on_class_metadata_not_found(|args| {
        if args.class_name() == "app::Legacy" {
            let mut metadata = ClassMetadata::new("app::Legacy");
            metadata.read_only = true;
            args.set_found_metadata(metadata);
        }
    });
    let (registry, driver) = users();
    let mut factory =
        ClassMetadataFactory::new(MetadataConfig::new(), driver, registry).with_events(events);

    let legacy = factory.get_metadata_for("app::Legacy").unwrap();
    assert!(legacy.read_only);
    assert!(factory.has_metadata_for("app::Legacy"));

    let err = factory.get_metadata_for("app::Ghost").unwrap_err();
    assert!(err.is_class_not_found());
}

#[test]
fn load_listeners_see_every_loaded_class() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let events = MetadataEvents::new().on_load_class_metadata(move |args| {
        counter.fetch_add(1, Ordering::SeqCst);
        args.metadata.read_only = true;
        Ok(())
    });
    let (registry, driver) = vehicles();
    let mut factory =
        ClassMetadataFactory::new(MetadataConfig::new(), driver, registry).with_events(events);

    let car = factory.get_metadata_for("app::Car").unwrap();
    assert!(car.read_only);
    assert_eq!(seen.load(Ordering::SeqCst), 2);

    factory.get_metadata_for("app::Car").unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn association_targets_are_checked_in_second_pass() {
    let registry = ClassRegistry::new()
        .with_class(ClassReflection::new("app::Post"))
        .with_class(ClassReflection::new("app::Draft"));
    let driver = StaticDriver::new().entity("app::Post", |m| {
        m.id("id", FieldMetadata::new("integer"))?
            .association("draft", AssociationMetadata::one_to_one("app::Draft"))?;
        Ok(())
    });
    let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

    let err = factory.get_metadata_for("app::Post").unwrap_err();
    assert!(matches!(
        err,
        MappingError::InvalidTargetEntity { ref target, .. } if target == "app::Draft"
    ));
    assert!(!factory.has_metadata_for("app::Post"));
}

#[test]
fn failed_subclass_load_discards_ancestors_loaded_with_it() {
    let registry = ClassRegistry::new()
        .with_class(ClassReflection::new("app::Post"))
        .with_class(ClassReflection::new("app::Ghost"))
        .with_class(ClassReflection::new("app::Article").extends("app::Post"));
    let driver = StaticDriver::new()
        .entity("app::Post", |m| {
            m.id("id", FieldMetadata::new("integer"))?
                .association("author", AssociationMetadata::many_to_one("app::Ghost"))?;
            Ok(())
        })
        .entity("app::Article", |m| {
            m.field("code", FieldMetadata::new("integer"))?;
            m.generated_value("code", "TABLE", serde_json::Map::new())?;
            Ok(())
        });
    let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

    let err = factory.get_metadata_for("app::Article").unwrap_err();
    assert!(matches!(err, MappingError::TableGeneratorNotImplemented { .. }));
    assert!(!factory.has_metadata_for("app::Post"));
    assert!(factory.get_loaded_metadata().is_empty());

    // The parent is rebuilt on its own lookup and its association target checked.
    let err = factory.get_metadata_for("app::Post").unwrap_err();
    assert!(matches!(
        err,
        MappingError::InvalidTargetEntity { ref target, .. } if target == "app::Ghost"
    ));
    assert!(!factory.has_metadata_for("app::Post"));
}

#[test]
fn get_all_metadata_loads_every_mapped_class() {
    let (registry, driver) = vehicles();
    let mut factory = ClassMetadataFactory::new(MetadataConfig::new(), driver, registry);

    let all = factory.get_all_metadata().unwrap();
    let names: Vec<&str> = all.iter().map(|m| m.class_name.as_str()).collect();
    assert_eq!(names, vec!["app::Car", "app::Truck", "app::Vehicle"]);
    assert_eq!(factory.get_loaded_metadata().len(), 3);
}

#[test]
fn metadata_cache_round_trip() {
    let cache = Arc::new(ormeta::InMemoryMetadataCache::new());
    let config = MetadataConfig::new()
        .platform(PlatformKind::PostgreSql)
        .metadata_cache(cache.clone());

    let (registry, driver) = users();
    let mut first = ClassMetadataFactory::new(config.clone(), driver, registry.clone());
    first.get_metadata_for("app::User").unwrap();
    assert_eq!(cache.len(), 1);
    assert!(cache.fetch("app::User$CLASSMETADATA").is_some());

    // No driver mappings: the entry can only come from the cache.
    let mut second = ClassMetadataFactory::new(config, StaticDriver::new(), registry);
    let user = second.get_metadata_for("app::User").unwrap();
    assert_eq!(user.table.name, "users");
    assert!(user.reflection().is_some());
    let ValueGenerationPlan::Single(ormeta::ValueGenerationExecutor::Column { generator, .. }) =
        user.value_generation_plan()
    else {
        panic!("expected a rebuilt column executor");
    };
    assert!(matches!(generator, Generator::Sequence(s) if s.sequence_name() == "users_id_seq"));
}
