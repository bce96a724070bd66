//! Dialect table: the only per-database branches the core honors.

use std::fmt;

/// Database family tag controlling statement-shape variations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dialect {
    Mysql,
    Pgsql,
    Sqlite,
    Oracle,
    /// `mssql` is an alias of `freetds` at the dialect-tag level.
    Freetds,
    /// Any other driver kind the host configures; falls back to the
    /// generic `BEGIN` literal and string port option.
    Other(String),
}

impl Dialect {
    /// Parse a configured `driver_kind` string into a dialect tag.
    pub fn parse(driver_kind: &str) -> Self {
        match driver_kind.to_ascii_lowercase().as_str() {
            "mysql" => Self::Mysql,
            "pgsql" | "postgres" | "postgresql" => Self::Pgsql,
            "sqlite" | "sqlite3" => Self::Sqlite,
            "oracle" => Self::Oracle,
            "freetds" | "mssql" => Self::Freetds,
            other => Self::Other(other.to_string()),
        }
    }

    /// The `BEGIN`-transaction literal for this dialect, or `None` when the
    /// dialect has no explicit begin statement (Oracle: implicit after
    /// `COMMIT`).
    pub fn begin_literal(&self) -> Option<&'static str> {
        match self {
            Self::Freetds => Some("BEGIN TRANSACTION"),
            Self::Oracle => None,
            Self::Mysql | Self::Pgsql | Self::Sqlite | Self::Other(_) => Some("BEGIN"),
        }
    }

    /// Whether the `port` endpoint option should be sent as a numeric value
    /// to the driver.
    pub fn port_is_numeric(&self) -> bool {
        matches!(self, Self::Mysql)
    }

    /// Whether this dialect uses the length-sensitive, hashed index-naming
    /// rule.
    pub fn uses_long_index_names(&self) -> bool {
        matches!(self, Self::Oracle)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Mysql => "mysql",
            Self::Pgsql => "pgsql",
            Self::Sqlite => "sqlite",
            Self::Oracle => "oracle",
            Self::Freetds => "freetds",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mssql_aliases_freetds() {
        assert_eq!(Dialect::parse("mssql"), Dialect::Freetds);
        assert_eq!(Dialect::parse("freetds"), Dialect::Freetds);
    }

    #[test]
    fn begin_literals_match_dialect_table() {
        assert_eq!(Dialect::Mysql.begin_literal(), Some("BEGIN"));
        assert_eq!(Dialect::Freetds.begin_literal(), Some("BEGIN TRANSACTION"));
        assert_eq!(Dialect::Oracle.begin_literal(), None);
        assert_eq!(Dialect::Other("db2".into()).begin_literal(), Some("BEGIN"));
    }

    #[test]
    fn only_mysql_uses_numeric_port() {
        assert!(Dialect::Mysql.port_is_numeric());
        assert!(!Dialect::Freetds.port_is_numeric());
        assert!(!Dialect::Oracle.port_is_numeric());
    }
}
