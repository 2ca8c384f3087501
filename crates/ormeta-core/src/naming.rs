//! Naming strategies.
//!
//! A [`NamingStrategy`] derives table and column names for mappings that do
//! not spell them out. Drivers use it when building metadata drafts.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// The segment of a class name after the last `::` or `\` separator.
#[must_use]
pub fn short_class_name(class_name: &str) -> &str {
    let after_path = class_name.rsplit("::").next().unwrap_or(class_name);
    after_path.rsplit('\\').next().unwrap_or(after_path)
}

/// Derives physical names from class and property names.
pub trait NamingStrategy: Send + Sync + fmt::Debug {
    /// Table name for a class.
    fn class_to_table_name(&self, class_name: &str) -> String;

    /// Column name for a field.
    fn property_to_column_name(&self, property: &str, class_name: &str) -> String;

    /// Default referenced column of a join column.
    fn reference_column_name(&self) -> String {
        "id".to_string()
    }

    /// Join column for a to-one association.
    fn join_column_name(&self, property: &str, class_name: &str) -> String {
        format!(
            "{}_{}",
            self.property_to_column_name(property, class_name),
            self.reference_column_name()
        )
    }

    /// Link table for a many-to-many association.
    fn join_table_name(&self, source_class: &str, target_class: &str, _property: &str) -> String {
        format!(
            "{}_{}",
            self.class_to_table_name(source_class),
            self.class_to_table_name(target_class)
        )
    }

    /// Link table column pointing at `class_name`.
    fn join_key_column_name(&self, class_name: &str, referenced_column: Option<&str>) -> String {
        format!(
            "{}_{}",
            self.class_to_table_name(class_name),
            referenced_column.map_or_else(|| self.reference_column_name(), str::to_string)
        )
    }
}

/// Uses the short class name and the property name as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNamingStrategy;

impl NamingStrategy for DefaultNamingStrategy {
    fn class_to_table_name(&self, class_name: &str) -> String {
        short_class_name(class_name).to_string()
    }

    fn property_to_column_name(&self, property: &str, _class_name: &str) -> String {
        property.to_string()
    }
}

/// Letter case produced by [`UnderscoreNamingStrategy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LetterCase {
    #[default]
    Lower,
    Upper,
}

/// Converts camel case names to snake case (`UserProfile` -> `user_profile`).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnderscoreNamingStrategy {
    case: LetterCase,
}

impl UnderscoreNamingStrategy {
    /// Create an underscore strategy producing the given case.
    #[must_use]
    pub const fn new(case: LetterCase) -> Self {
        Self { case }
    }

    fn underscore(&self, name: &str) -> String {
        let snake = match word_boundary() {
            Some(regex) => regex.replace_all(name, "${1}_${2}").into_owned(),
            None => name.to_string(),
        };
        match self.case {
            LetterCase::Lower => snake.to_lowercase(),
            LetterCase::Upper => snake.to_uppercase(),
        }
    }
}

fn word_boundary() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| match Regex::new(r"([a-z0-9])([A-Z])") {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(target: "ormeta::naming", error = %e, "Invalid word boundary pattern");
                None
            }
        })
        .as_ref()
}

impl NamingStrategy for UnderscoreNamingStrategy {
    fn class_to_table_name(&self, class_name: &str) -> String {
        self.underscore(short_class_name(class_name))
    }

    fn property_to_column_name(&self, property: &str, _class_name: &str) -> String {
        self.underscore(property)
    }

    fn reference_column_name(&self) -> String {
        match self.case {
            LetterCase::Lower => "id".to_string(),
            LetterCase::Upper => "ID".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_class_name() {
        assert_eq!(short_class_name("app::model::Car"), "Car");
        assert_eq!(short_class_name("App\\Model\\Truck"), "Truck");
        assert_eq!(short_class_name("Vehicle"), "Vehicle");
    }

    #[test]
    fn test_default_strategy() {
        let naming = DefaultNamingStrategy;
        assert_eq!(naming.class_to_table_name("app::User"), "User");
        assert_eq!(naming.property_to_column_name("firstName", "app::User"), "firstName");
        assert_eq!(naming.join_column_name("team", "app::Hero"), "team_id");
        assert_eq!(
            naming.join_table_name("app::Hero", "app::Power", "powers"),
            "Hero_Power"
        );
        assert_eq!(naming.join_key_column_name("app::Hero", None), "Hero_id");
    }

    #[test]
    fn test_underscore_strategy() {
        let naming = UnderscoreNamingStrategy::default();
        assert_eq!(naming.class_to_table_name("app::UserProfile"), "user_profile");
        assert_eq!(naming.property_to_column_name("createdAt", "app::User"), "created_at");
        assert_eq!(naming.join_column_name("mainTeam", "app::Hero"), "main_team_id");

        let upper = UnderscoreNamingStrategy::new(LetterCase::Upper);
        assert_eq!(upper.class_to_table_name("app::UserProfile"), "USER_PROFILE");
        assert_eq!(upper.join_column_name("team", "app::Hero"), "TEAM_ID");
    }
}
