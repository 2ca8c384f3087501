//! Property metadata: fields, versions, and associations.
//!
//! Every mapped property shares a small header (name, declaring class,
//! primary-key flag) and carries a variant-specific payload in
//! [`PropertyKind`].

use serde::{Deserialize, Serialize};

use crate::generator::{GeneratorType, ValueGeneratorMetadata};

/// Cascade keywords accepted on associations.
pub const CASCADE_OPTIONS: &[&str] = &["persist", "remove", "refresh", "merge", "detach", "all"];

/// Column-backed field (also used for version fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    /// Column name. Empty means "derive from the naming strategy".
    pub column_name: String,
    /// Table the column lives in, when it differs from the class table.
    pub table_name: Option<String>,
    /// Mapping type name (`integer`, `string`, ...).
    pub type_name: String,
    /// Whether the column is nullable.
    pub nullable: bool,
    /// Whether the column carries a unique constraint.
    pub unique: bool,
    /// Column length for string-like types.
    pub length: Option<u32>,
    /// Declared identifier generator.
    pub value_generator: Option<ValueGeneratorMetadata>,
}

impl FieldMetadata {
    /// Create field metadata for a mapping type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            column_name: String::new(),
            table_name: None,
            type_name: type_name.into(),
            nullable: false,
            unique: false,
            length: None,
            value_generator: None,
        }
    }

    /// Set the column name.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column_name = name.into();
        self
    }

    /// Set the table name.
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Set nullable flag.
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set unique flag.
    pub fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    /// Set column length.
    pub fn length(mut self, value: u32) -> Self {
        self.length = Some(value);
        self
    }

    /// Attach a generator descriptor.
    pub fn generated(mut self, generator: ValueGeneratorMetadata) -> Self {
        self.value_generator = Some(generator);
        self
    }

    /// Whether the field has an active generator (anything but `NONE`).
    #[must_use]
    pub fn has_value_generator(&self) -> bool {
        self.value_generator
            .as_ref()
            .is_some_and(|g| g.generator_type != GeneratorType::None)
    }
}

/// Kind of association between two classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssociationKind {
    /// One-to-one.
    OneToOne,
    /// Many-to-one.
    ManyToOne,
    /// One-to-many.
    OneToMany,
    /// Many-to-many via a join table.
    ManyToMany,
}

impl AssociationKind {
    /// Whether the association references a single entity.
    #[must_use]
    pub const fn is_to_one(self) -> bool {
        matches!(self, AssociationKind::OneToOne | AssociationKind::ManyToOne)
    }
}

/// Fetch mode of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FetchMode {
    #[default]
    Lazy,
    Eager,
    ExtraLazy,
}

/// A foreign key column of a to-one association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumn {
    /// Local column name. Empty means "derive from the naming strategy".
    pub column_name: String,
    /// Referenced column on the target table.
    pub referenced_column_name: String,
    /// Table holding the column, when it differs from the class table.
    pub table_name: Option<String>,
    /// Whether the column is nullable.
    pub nullable: bool,
}

impl JoinColumn {
    /// Create a join column.
    pub fn new(column_name: impl Into<String>, referenced_column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            referenced_column_name: referenced_column_name.into(),
            table_name: None,
            nullable: true,
        }
    }

    /// Set nullable flag.
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }
}

/// Link table of a many-to-many association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTable {
    /// Link table name.
    pub name: String,
    /// Columns pointing at the owning class.
    pub join_columns: Vec<JoinColumn>,
    /// Columns pointing at the target class.
    pub inverse_join_columns: Vec<JoinColumn>,
}

/// Association payload shared by to-one and to-many properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationMetadata {
    /// Association kind.
    pub kind: AssociationKind,
    /// Target class name.
    pub target_entity: String,
    /// Owning-side property on the target (set on the inverse side only).
    pub mapped_by: Option<String>,
    /// Inverse-side property on the target (set on the owning side).
    pub inversed_by: Option<String>,
    /// Declared cascade keywords.
    pub cascade: Vec<String>,
    /// Whether orphaned targets are removed.
    pub orphan_removal: bool,
    /// Fetch mode.
    pub fetch: FetchMode,
    /// Foreign key columns (owning to-one only).
    pub join_columns: Vec<JoinColumn>,
    /// Link table (owning many-to-many only).
    pub join_table: Option<JoinTable>,
}

impl AssociationMetadata {
    fn new(kind: AssociationKind, target_entity: impl Into<String>) -> Self {
        Self {
            kind,
            target_entity: target_entity.into(),
            mapped_by: None,
            inversed_by: None,
            cascade: Vec::new(),
            orphan_removal: false,
            fetch: FetchMode::default(),
            join_columns: Vec::new(),
            join_table: None,
        }
    }

    /// One-to-one association.
    pub fn one_to_one(target_entity: impl Into<String>) -> Self {
        Self::new(AssociationKind::OneToOne, target_entity)
    }

    /// Many-to-one association.
    pub fn many_to_one(target_entity: impl Into<String>) -> Self {
        Self::new(AssociationKind::ManyToOne, target_entity)
    }

    /// One-to-many association, always the inverse side.
    pub fn one_to_many(target_entity: impl Into<String>, mapped_by: impl Into<String>) -> Self {
        Self::new(AssociationKind::OneToMany, target_entity).mapped_by(mapped_by)
    }

    /// Many-to-many association.
    pub fn many_to_many(target_entity: impl Into<String>) -> Self {
        Self::new(AssociationKind::ManyToMany, target_entity)
    }

    /// Mark as inverse side.
    pub fn mapped_by(mut self, property: impl Into<String>) -> Self {
        self.mapped_by = Some(property.into());
        self
    }

    /// Name the inverse-side property.
    pub fn inversed_by(mut self, property: impl Into<String>) -> Self {
        self.inversed_by = Some(property.into());
        self
    }

    /// Add a cascade keyword.
    pub fn cascade(mut self, option: impl Into<String>) -> Self {
        self.cascade.push(option.into());
        self
    }

    /// Set orphan removal.
    pub fn orphan_removal(mut self, value: bool) -> Self {
        self.orphan_removal = value;
        self
    }

    /// Set fetch mode.
    pub fn fetch(mut self, mode: FetchMode) -> Self {
        self.fetch = mode;
        self
    }

    /// Add a join column.
    pub fn join_column(mut self, column: JoinColumn) -> Self {
        self.join_columns.push(column);
        self
    }

    /// Set the join table.
    pub fn join_table(mut self, table: JoinTable) -> Self {
        self.join_table = Some(table);
        self
    }

    /// Whether this side owns the relationship.
    #[must_use]
    pub fn is_owning_side(&self) -> bool {
        self.mapped_by.is_none()
    }

    /// Cascade keywords that are not recognized.
    pub fn invalid_cascade_options(&self) -> impl Iterator<Item = &str> {
        self.cascade
            .iter()
            .map(String::as_str)
            .filter(|option| !CASCADE_OPTIONS.contains(option))
    }
}

/// Variant payload of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Plain column-backed field.
    Field(FieldMetadata),
    /// Optimistic-lock version field.
    Version(FieldMetadata),
    /// One-to-one or many-to-one association.
    ToOne(AssociationMetadata),
    /// One-to-many or many-to-many association.
    ToMany(AssociationMetadata),
}

/// A mapped property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// Class that declared the property. Empty until added to a class.
    pub declaring_class: String,
    /// Whether the property is part of the identifier.
    pub primary_key: bool,
    /// Variant payload.
    pub kind: PropertyKind,
}

impl Property {
    /// Column-backed field.
    pub fn field(name: impl Into<String>, field: FieldMetadata) -> Self {
        Self::with_kind(name, PropertyKind::Field(field))
    }

    /// Version field.
    pub fn version(name: impl Into<String>, field: FieldMetadata) -> Self {
        Self::with_kind(name, PropertyKind::Version(field))
    }

    /// Association; the variant follows the association kind.
    pub fn association(name: impl Into<String>, association: AssociationMetadata) -> Self {
        let kind = if association.kind.is_to_one() {
            PropertyKind::ToOne(association)
        } else {
            PropertyKind::ToMany(association)
        };
        Self::with_kind(name, kind)
    }

    fn with_kind(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            declaring_class: String::new(),
            primary_key: false,
            kind,
        }
    }

    /// Set primary key flag.
    pub fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Field payload for `Field` and `Version` properties.
    #[must_use]
    pub fn as_field(&self) -> Option<&FieldMetadata> {
        match &self.kind {
            PropertyKind::Field(field) | PropertyKind::Version(field) => Some(field),
            PropertyKind::ToOne(_) | PropertyKind::ToMany(_) => None,
        }
    }

    /// Mutable field payload for `Field` and `Version` properties.
    pub fn as_field_mut(&mut self) -> Option<&mut FieldMetadata> {
        match &mut self.kind {
            PropertyKind::Field(field) | PropertyKind::Version(field) => Some(field),
            PropertyKind::ToOne(_) | PropertyKind::ToMany(_) => None,
        }
    }

    /// Association payload for `ToOne` and `ToMany` properties.
    #[must_use]
    pub fn as_association(&self) -> Option<&AssociationMetadata> {
        match &self.kind {
            PropertyKind::ToOne(association) | PropertyKind::ToMany(association) => {
                Some(association)
            }
            PropertyKind::Field(_) | PropertyKind::Version(_) => None,
        }
    }

    /// Mutable association payload.
    pub fn as_association_mut(&mut self) -> Option<&mut AssociationMetadata> {
        match &mut self.kind {
            PropertyKind::ToOne(association) | PropertyKind::ToMany(association) => {
                Some(association)
            }
            PropertyKind::Field(_) | PropertyKind::Version(_) => None,
        }
    }

    /// Columns this property occupies, as `(table override, column)`.
    pub fn columns(&self) -> Vec<(Option<&str>, &str)> {
        match &self.kind {
            PropertyKind::Field(field) | PropertyKind::Version(field) => {
                vec![(field.table_name.as_deref(), field.column_name.as_str())]
            }
            PropertyKind::ToOne(association) => association
                .join_columns
                .iter()
                .map(|jc| (jc.table_name.as_deref(), jc.column_name.as_str()))
                .collect(),
            PropertyKind::ToMany(_) => Vec::new(),
        }
    }
}
