//! Database platform capabilities.
//!
//! Identifier generation only needs a handful of facts about the target
//! database: which generation style it prefers and how it names sequences.
//! [`Platform`] answers those questions for the built-in platforms; embedders
//! with an exotic database implement [`PlatformCapabilities`] themselves.

use std::fmt;

/// Built-in platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlatformKind {
    #[default]
    Sqlite,
    MySql,
    PostgreSql,
    Oracle,
    SqlServer,
    /// A platform that supports neither sequences nor identity columns.
    Generic,
}

impl PlatformKind {
    /// Parse a platform name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(PlatformKind::Sqlite),
            "mysql" | "mariadb" => Some(PlatformKind::MySql),
            "postgres" | "postgresql" | "pgsql" => Some(PlatformKind::PostgreSql),
            "oracle" | "oci8" => Some(PlatformKind::Oracle),
            "sqlserver" | "mssql" | "sqlsrv" => Some(PlatformKind::SqlServer),
            "generic" => Some(PlatformKind::Generic),
            _ => None,
        }
    }

    /// Detect the platform from a connection URL scheme, e.g.
    /// `postgres://user@localhost/app`.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let (scheme, _) = url.split_once(':')?;
        Self::from_name(scheme)
    }

    /// Platform name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            PlatformKind::Sqlite => "sqlite",
            PlatformKind::MySql => "mysql",
            PlatformKind::PostgreSql => "postgresql",
            PlatformKind::Oracle => "oracle",
            PlatformKind::SqlServer => "sqlserver",
            PlatformKind::Generic => "generic",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Facts about a database platform consumed by identifier generation.
///
/// All methods are pure.
pub trait PlatformCapabilities: Send + Sync + fmt::Debug {
    /// Platform name for diagnostics.
    fn name(&self) -> &str;

    /// Whether sequences are the preferred generation style.
    fn prefers_sequences(&self) -> bool;

    /// Whether identity columns are the preferred generation style.
    fn prefers_identity_columns(&self) -> bool;

    /// Whether identity columns are emulated with sequences.
    fn uses_sequence_emulated_identity_columns(&self) -> bool;

    /// Prefix used when deriving sequence names from a table.
    fn sequence_prefix(&self, table: &str, schema: Option<&str>) -> String;

    /// Adjust a generated schema element name to platform limits.
    fn fix_schema_element_name(&self, name: &str) -> String {
        name.to_string()
    }

    /// Sequence backing an emulated identity column.
    fn identity_sequence_name(&self, table: &str, column: &str) -> String {
        format!("{table}_{column}_seq")
    }
}

/// Capabilities of a built-in platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Platform {
    kind: PlatformKind,
}

/// Oracle identifiers are limited to 30 characters.
const ORACLE_MAX_IDENTIFIER_LENGTH: usize = 30;

impl Platform {
    /// Capabilities for a platform kind.
    #[must_use]
    pub const fn new(kind: PlatformKind) -> Self {
        Self { kind }
    }

    /// The platform kind.
    #[must_use]
    pub const fn kind(&self) -> PlatformKind {
        self.kind
    }

    const fn supports_schemas(&self) -> bool {
        matches!(self.kind, PlatformKind::PostgreSql | PlatformKind::SqlServer)
    }

    const fn can_emulate_schemas(&self) -> bool {
        matches!(self.kind, PlatformKind::Sqlite)
    }
}

impl PlatformCapabilities for Platform {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn prefers_sequences(&self) -> bool {
        matches!(self.kind, PlatformKind::PostgreSql | PlatformKind::Oracle)
    }

    fn prefers_identity_columns(&self) -> bool {
        matches!(
            self.kind,
            PlatformKind::MySql | PlatformKind::Sqlite | PlatformKind::SqlServer
        )
    }

    fn uses_sequence_emulated_identity_columns(&self) -> bool {
        matches!(self.kind, PlatformKind::PostgreSql | PlatformKind::Oracle)
    }

    fn sequence_prefix(&self, table: &str, schema: Option<&str>) -> String {
        match schema {
            None | Some("") => table.to_string(),
            Some(schema) if !self.supports_schemas() && self.can_emulate_schemas() => {
                format!("{schema}__{table}")
            }
            Some(schema) => format!("{schema}.{table}"),
        }
    }

    fn fix_schema_element_name(&self, name: &str) -> String {
        match self.kind {
            PlatformKind::Oracle => name.chars().take(ORACLE_MAX_IDENTIFIER_LENGTH).collect(),
            _ => name.to_string(),
        }
    }

    fn identity_sequence_name(&self, table: &str, column: &str) -> String {
        match self.kind {
            PlatformKind::Oracle => {
                let table = table.trim_matches('"').to_uppercase();
                format!("{table}_SEQ")
            }
            _ => format!("{table}_{column}_seq"),
        }
    }
}
