//! Class metadata.
//!
//! [`ClassMetadata`] is the runtime description of how one mapped class is
//! persisted. Drivers and listeners mutate it while the metadata factory runs
//! its load pipeline; afterwards it is shared behind an `Arc` and treated as
//! immutable. The only late write is the discriminator value, which is
//! resolved once after the whole hierarchy batch has been loaded.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, Result};
use crate::plan::ValueGenerationPlan;
use crate::property::{Property, PropertyKind};
use crate::reflection::ClassReflection;

/// Inheritance mapping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InheritanceType {
    /// No inheritance mapping.
    #[default]
    None,
    /// All classes of the hierarchy share one table.
    SingleTable,
    /// Each class has its own table joined on the identifier.
    Joined,
}

impl InheritanceType {
    /// Parse an inheritance type (case-insensitive).
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NONE" => Some(InheritanceType::None),
            "SINGLE_TABLE" | "SINGLETABLE" => Some(InheritanceType::SingleTable),
            "JOINED" => Some(InheritanceType::Joined),
            _ => None,
        }
    }
}

/// Primary table of a class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Schema name, if any.
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
}

impl TableMetadata {
    /// Create a table descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Set the schema.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// Discriminator column descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscriminatorColumn {
    pub column_name: String,
    pub type_name: String,
    pub length: Option<u32>,
}

impl DiscriminatorColumn {
    /// String discriminator column of length 255.
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            type_name: "string".to_string(),
            length: Some(255),
        }
    }
}

/// Entity lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    PrePersist,
    PostPersist,
    PreUpdate,
    PostUpdate,
    PreRemove,
    PostRemove,
    PostLoad,
    PreFlush,
}

impl LifecycleEvent {
    /// Event name as used in mappings.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::PrePersist => "prePersist",
            LifecycleEvent::PostPersist => "postPersist",
            LifecycleEvent::PreUpdate => "preUpdate",
            LifecycleEvent::PostUpdate => "postUpdate",
            LifecycleEvent::PreRemove => "preRemove",
            LifecycleEvent::PostRemove => "postRemove",
            LifecycleEvent::PostLoad => "postLoad",
            LifecycleEvent::PreFlush => "preFlush",
        }
    }

    /// Parse an event name.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "prePersist" => Some(LifecycleEvent::PrePersist),
            "postPersist" => Some(LifecycleEvent::PostPersist),
            "preUpdate" => Some(LifecycleEvent::PreUpdate),
            "postUpdate" => Some(LifecycleEvent::PostUpdate),
            "preRemove" => Some(LifecycleEvent::PreRemove),
            "postRemove" => Some(LifecycleEvent::PostRemove),
            "postLoad" => Some(LifecycleEvent::PostLoad),
            "preFlush" => Some(LifecycleEvent::PreFlush),
            _ => None,
        }
    }
}

/// An entity listener registration: listener class plus method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityListener {
    pub class_name: String,
    pub method: String,
}

/// Second-level cache usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheUsage {
    #[default]
    ReadOnly,
    NonstrictReadWrite,
    ReadWrite,
}

/// Second-level cache descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub usage: CacheUsage,
    pub region: String,
}

/// Runtime metadata of one mapped class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetadata {
    /// Fully qualified class name.
    pub class_name: String,
    /// Root entity of the hierarchy (the class itself when it is the root).
    pub root_class_name: String,
    /// Mapped ancestors, root first.
    pub parent_classes: Vec<String>,
    /// Direct subclasses.
    pub sub_classes: BTreeSet<String>,
    /// Primary table.
    pub table: TableMetadata,
    properties: Vec<Property>,
    /// Identifier property names, in declaration order.
    pub identifier: Vec<String>,
    pub inheritance_type: InheritanceType,
    pub discriminator_column: Option<DiscriminatorColumn>,
    /// Discriminator value to class name.
    pub discriminator_map: Option<BTreeMap<String, String>>,
    #[serde(with = "once_string", default)]
    discriminator_value: OnceLock<String>,
    pub is_mapped_superclass: bool,
    pub read_only: bool,
    pub cache: Option<CacheMetadata>,
    pub entity_listeners: BTreeMap<LifecycleEvent, Vec<EntityListener>>,
    pub lifecycle_callbacks: BTreeMap<LifecycleEvent, Vec<String>>,
    #[serde(skip)]
    value_generation_plan: ValueGenerationPlan,
    #[serde(skip)]
    reflection: Option<Arc<ClassReflection>>,
}

impl ClassMetadata {
    /// Create empty metadata for a class.
    pub fn new(class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        Self {
            root_class_name: class_name.clone(),
            class_name,
            parent_classes: Vec::new(),
            sub_classes: BTreeSet::new(),
            table: TableMetadata::default(),
            properties: Vec::new(),
            identifier: Vec::new(),
            inheritance_type: InheritanceType::None,
            discriminator_column: None,
            discriminator_map: None,
            discriminator_value: OnceLock::new(),
            is_mapped_superclass: false,
            read_only: false,
            cache: None,
            entity_listeners: BTreeMap::new(),
            lifecycle_callbacks: BTreeMap::new(),
            value_generation_plan: ValueGenerationPlan::Noop,
            reflection: None,
        }
    }

    // ========================================================================
    // Inheritance
    // ========================================================================

    /// Merge what a class inherits from its (already loaded) parent.
    ///
    /// Properties keep their declaring class. Inherited fields without an
    /// explicit table are pinned to the parent's table so that column
    /// resolution stays stable in the child.
    pub fn inherit_from(&mut self, parent: &ClassMetadata) {
        self.parent_classes = parent.parent_classes.clone();
        self.parent_classes.push(parent.class_name.clone());

        let parent_is_fragment_root =
            parent.is_mapped_superclass && parent.root_class_name == parent.class_name;
        if !parent_is_fragment_root {
            self.root_class_name = parent.root_class_name.clone();
        }

        if !parent.is_mapped_superclass {
            self.inheritance_type = parent.inheritance_type;
            self.discriminator_column = parent.discriminator_column.clone();
            self.discriminator_map = parent.discriminator_map.clone();
            if parent.inheritance_type == InheritanceType::SingleTable {
                self.table = parent.table.clone();
            }
        }

        for property in &parent.properties {
            let mut inherited = property.clone();
            if let Some(field) = inherited.as_field_mut() {
                if field.table_name.is_none() {
                    field.table_name = Some(parent.table.name.clone());
                }
            }
            if property.primary_key && !self.identifier.contains(&property.name) {
                self.identifier.push(property.name.clone());
            }
            self.properties.push(inherited);
        }

        for (event, methods) in &parent.lifecycle_callbacks {
            let callbacks = self.lifecycle_callbacks.entry(*event).or_default();
            for method in methods {
                if !callbacks.contains(method) {
                    callbacks.push(method.clone());
                }
            }
        }
    }

    /// Whether this class is the root of its hierarchy.
    #[must_use]
    pub fn is_root_entity(&self) -> bool {
        self.root_class_name == self.class_name
    }

    /// Nearest mapped ancestor.
    #[must_use]
    pub fn parent_class(&self) -> Option<&str> {
        self.parent_classes.last().map(String::as_str)
    }

    /// Whether an inheritance strategy is in effect.
    #[must_use]
    pub fn has_inheritance(&self) -> bool {
        self.inheritance_type != InheritanceType::None
    }

    /// Record a direct subclass.
    pub fn add_sub_class(&mut self, class_name: impl Into<String>) {
        self.sub_classes.insert(class_name.into());
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Add a property declared by this class (or a driver-supplied inherited
    /// one carrying its own declaring class).
    ///
    /// Enforces unique property names, unique `(table, column)` pairs, and the
    /// identifier restrictions on associations.
    pub fn add_property(&mut self, mut property: Property) -> Result<()> {
        if property.name.is_empty() {
            return Err(MappingError::EmptyFieldName {
                class: self.class_name.clone(),
            });
        }
        if self.has_property(&property.name) {
            return Err(MappingError::DuplicatePropertyName {
                class: self.class_name.clone(),
                property: property.name,
            });
        }
        if property.declaring_class.is_empty() {
            property.declaring_class = self.class_name.clone();
        }

        if property.primary_key {
            match &property.kind {
                PropertyKind::ToMany(_) => {
                    return Err(MappingError::IllegalToManyIdentifier {
                        class: self.class_name.clone(),
                        property: property.name,
                    });
                }
                PropertyKind::ToOne(association) => {
                    if association.orphan_removal {
                        return Err(MappingError::IllegalOrphanRemovalOnIdentifier {
                            class: self.class_name.clone(),
                            property: property.name,
                        });
                    }
                    if !association.is_owning_side() {
                        return Err(MappingError::IllegalInverseSideIdentifier {
                            class: self.class_name.clone(),
                            property: property.name,
                        });
                    }
                }
                PropertyKind::Field(_) | PropertyKind::Version(_) => {}
            }
        }

        self.check_column_collisions(&property)?;

        if property.primary_key && !self.identifier.contains(&property.name) {
            self.identifier.push(property.name.clone());
        }
        self.properties.push(property);
        Ok(())
    }

    fn check_column_collisions(&self, property: &Property) -> Result<()> {
        let own_table = self.table.name.as_str();
        for (table, column) in property.columns() {
            if column.is_empty() {
                continue;
            }
            let table = table.unwrap_or(own_table);
            let taken = self
                .properties
                .iter()
                .flat_map(Property::columns)
                .any(|(t, c)| c == column && t.unwrap_or(own_table) == table);
            if taken {
                return Err(MappingError::DuplicateColumnName {
                    class: self.class_name.clone(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Whether a property exists (declared or inherited).
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p.name == name)
    }

    /// Look up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Look up a property by name for mutation.
    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    /// All properties in insertion order (inherited first).
    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Properties declared directly on this class.
    pub fn declared_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties
            .iter()
            .filter(|p| p.declaring_class == self.class_name)
    }

    /// Properties declared directly on this class, for mutation.
    pub fn declared_properties_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        let class_name = self.class_name.as_str();
        self.properties
            .iter_mut()
            .filter(move |p| p.declaring_class == class_name)
    }

    /// Table a field's column lives in.
    #[must_use]
    pub fn column_table<'a>(&'a self, property: &'a Property) -> &'a str {
        property
            .as_field()
            .and_then(|f| f.table_name.as_deref())
            .unwrap_or(&self.table.name)
    }

    // ========================================================================
    // Identifier
    // ========================================================================

    /// Whether the identifier spans more than one property.
    #[must_use]
    pub fn is_identifier_composite(&self) -> bool {
        self.identifier.len() > 1
    }

    /// Single identifier property name, if not composite.
    #[must_use]
    pub fn single_identifier(&self) -> Option<&str> {
        match self.identifier.as_slice() {
            [name] => Some(name),
            _ => None,
        }
    }

    // ========================================================================
    // Discriminator
    // ========================================================================

    /// Resolved discriminator value.
    #[must_use]
    pub fn discriminator_value(&self) -> Option<&str> {
        self.discriminator_value.get().map(String::as_str)
    }

    /// Set the discriminator value. Returns `false` if it was already set.
    pub fn set_discriminator_value(&self, value: impl Into<String>) -> bool {
        self.discriminator_value.set(value.into()).is_ok()
    }

    // ========================================================================
    // Behavior
    // ========================================================================

    /// Register a lifecycle callback method.
    pub fn add_lifecycle_callback(&mut self, event: LifecycleEvent, method: impl Into<String>) {
        let method = method.into();
        let callbacks = self.lifecycle_callbacks.entry(event).or_default();
        if !callbacks.contains(&method) {
            callbacks.push(method);
        }
    }

    /// Register an entity listener.
    pub fn add_entity_listener(
        &mut self,
        event: LifecycleEvent,
        class_name: impl Into<String>,
        method: impl Into<String>,
    ) {
        self.entity_listeners
            .entry(event)
            .or_default()
            .push(EntityListener {
                class_name: class_name.into(),
                method: method.into(),
            });
    }

    // ========================================================================
    // Runtime binding
    // ========================================================================

    /// The compiled value generation plan.
    #[must_use]
    pub fn value_generation_plan(&self) -> &ValueGenerationPlan {
        &self.value_generation_plan
    }

    /// Replace the value generation plan.
    pub fn set_value_generation_plan(&mut self, plan: ValueGenerationPlan) {
        self.value_generation_plan = plan;
    }

    /// Reflection handle, absent for static metadata.
    #[must_use]
    pub fn reflection(&self) -> Option<&Arc<ClassReflection>> {
        self.reflection.as_ref()
    }

    /// Attach a reflection handle.
    pub fn set_reflection(&mut self, reflection: Arc<ClassReflection>) {
        self.reflection = Some(reflection);
    }

    /// Abstract classes have no reflection handle or reflect as abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.reflection.as_ref().is_none_or(|r| r.is_abstract)
    }
}

mod once_string {
    use std::sync::OnceLock;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &OnceLock<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.get().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OnceLock<String>, D::Error> {
        let lock = OnceLock::new();
        if let Some(value) = Option::<String>::deserialize(deserializer)? {
            let _ = lock.set(value);
        }
        Ok(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{AssociationMetadata, FieldMetadata, JoinColumn};

    fn users() -> ClassMetadata {
        let mut metadata = ClassMetadata::new("app::User");
        metadata.table = TableMetadata::new("users");
        metadata
    }

    #[test]
    fn test_primary_key_joins_identifier() {
        let mut metadata = users();
        metadata
            .add_property(
                Property::field("id", FieldMetadata::new("integer").column("id")).primary_key(true),
            )
            .unwrap();
        metadata
            .add_property(Property::field("name", FieldMetadata::new("string").column("name")))
            .unwrap();
        assert_eq!(metadata.identifier, vec!["id"]);
        assert_eq!(metadata.single_identifier(), Some("id"));
        assert!(!metadata.is_identifier_composite());
        assert_eq!(metadata.property("id").unwrap().declaring_class, "app::User");
    }

    #[test]
    fn test_duplicate_column_rejected_in_either_order() {
        let field = Property::field("name", FieldMetadata::new("string").column("label"));
        let join = Property::association(
            "owner",
            AssociationMetadata::many_to_one("app::Owner")
                .join_column(JoinColumn::new("label", "id")),
        );

        let mut first = users();
        first.add_property(field.clone()).unwrap();
        let err = first.add_property(join.clone()).unwrap_err();
        assert!(matches!(err, MappingError::DuplicateColumnName { ref column, .. } if column == "label"));

        let mut second = users();
        second.add_property(join).unwrap();
        let err = second.add_property(field).unwrap_err();
        assert!(matches!(err, MappingError::DuplicateColumnName { .. }));
    }

    #[test]
    fn test_same_column_in_other_table_is_allowed() {
        let mut metadata = users();
        metadata
            .add_property(Property::field("a", FieldMetadata::new("string").column("x")))
            .unwrap();
        metadata
            .add_property(Property::field(
                "b",
                FieldMetadata::new("string").column("x").table("user_details"),
            ))
            .unwrap();
    }

    #[test]
    fn test_property_name_rules() {
        let mut metadata = users();
        let err = metadata
            .add_property(Property::field("", FieldMetadata::new("string")))
            .unwrap_err();
        assert!(matches!(err, MappingError::EmptyFieldName { .. }));

        metadata
            .add_property(Property::field("team", FieldMetadata::new("string").column("team")))
            .unwrap();
        let err = metadata
            .add_property(Property::association(
                "team",
                AssociationMetadata::many_to_one("app::Team"),
            ))
            .unwrap_err();
        assert!(matches!(err, MappingError::DuplicatePropertyName { .. }));
    }

    #[test]
    fn test_association_identifier_rules() {
        let mut metadata = users();
        let err = metadata
            .add_property(
                Property::association(
                    "posts",
                    AssociationMetadata::one_to_many("app::Post", "author"),
                )
                .primary_key(true),
            )
            .unwrap_err();
        assert!(matches!(err, MappingError::IllegalToManyIdentifier { .. }));

        let err = metadata
            .add_property(
                Property::association(
                    "profile",
                    AssociationMetadata::one_to_one("app::Profile").mapped_by("user"),
                )
                .primary_key(true),
            )
            .unwrap_err();
        assert!(matches!(err, MappingError::IllegalInverseSideIdentifier { .. }));

        let err = metadata
            .add_property(
                Property::association(
                    "account",
                    AssociationMetadata::one_to_one("app::Account").orphan_removal(true),
                )
                .primary_key(true),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            MappingError::IllegalOrphanRemovalOnIdentifier { .. }
        ));
    }

    #[test]
    fn test_inherit_from_single_table_parent() {
        let mut vehicle = ClassMetadata::new("app::Vehicle");
        vehicle.table = TableMetadata::new("vehicles");
        vehicle.inheritance_type = InheritanceType::SingleTable;
        vehicle.discriminator_column = Some(DiscriminatorColumn::new("kind"));
        vehicle
            .add_property(
                Property::field("id", FieldMetadata::new("integer").column("id")).primary_key(true),
            )
            .unwrap();
        vehicle.add_lifecycle_callback(LifecycleEvent::PrePersist, "touch");

        let mut car = ClassMetadata::new("app::Car");
        car.table = TableMetadata::new("cars");
        car.inherit_from(&vehicle);

        assert_eq!(car.root_class_name, "app::Vehicle");
        assert_eq!(car.parent_classes, vec!["app::Vehicle"]);
        assert_eq!(car.parent_class(), Some("app::Vehicle"));
        assert_eq!(car.table.name, "vehicles");
        assert_eq!(car.inheritance_type, InheritanceType::SingleTable);
        assert_eq!(car.identifier, vec!["id"]);
        assert_eq!(car.declared_properties().count(), 0);
        assert_eq!(
            car.property("id").unwrap().as_field().unwrap().table_name.as_deref(),
            Some("vehicles")
        );
        assert_eq!(
            car.lifecycle_callbacks[&LifecycleEvent::PrePersist],
            vec!["touch"]
        );
    }

    #[test]
    fn test_mapped_superclass_parent_is_not_root() {
        let mut base = ClassMetadata::new("app::Base");
        base.is_mapped_superclass = true;
        base.table = TableMetadata::new("base");

        let mut child = ClassMetadata::new("app::Child");
        child.table = TableMetadata::new("child");
        child.inherit_from(&base);
        assert!(child.is_root_entity());
        assert_eq!(child.table.name, "child");
        assert_eq!(child.parent_classes, vec!["app::Base"]);
    }

    #[test]
    fn test_discriminator_value_set_once() {
        let metadata = users();
        assert_eq!(metadata.discriminator_value(), None);
        assert!(metadata.set_discriminator_value("user"));
        assert!(!metadata.set_discriminator_value("other"));
        assert_eq!(metadata.discriminator_value(), Some("user"));
    }

    #[test]
    fn test_without_reflection_counts_as_abstract() {
        let mut metadata = users();
        assert!(metadata.is_abstract());
        metadata.set_reflection(Arc::new(ClassReflection::new("app::User")));
        assert!(!metadata.is_abstract());
    }

    #[test]
    fn test_json_snapshot_keeps_discriminator_value() {
        let metadata = users();
        metadata.set_discriminator_value("user");
        let json = serde_json::to_string(&metadata).unwrap();
        let restored: ClassMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.discriminator_value(), Some("user"));
        assert!(restored.reflection().is_none());
        assert!(restored.value_generation_plan().is_empty());
    }
}
