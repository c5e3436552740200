//! Lookup query builders.
//!
//! Two deliberately separate paths build the lookup statement:
//!
//! - [`LookupQuery::safe`] only accepts a [`Column`] from the closed allow-set,
//!   so the identifier spliced into the SQL text is always one of four
//!   known values.
//! - [`LookupQuery::unsafe_identifier`] accepts any caller string and only
//!   doubles backticks before splicing it. It is injectable on purpose and
//!   backs the `/vuln` endpoint.
//!
//! In both cases `name` is carried separately and bound as a parameter.

use std::fmt;
use std::str::FromStr;

use crate::config::FRUIT_TABLE;

/// A column a caller may select through `/safe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Column {
    Id,
    #[default]
    Name,
    Color,
    Price,
}

impl Column {
    pub const ALL: [Column; 4] = [Column::Id, Column::Name, Column::Color, Column::Price];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Name => "name",
            Column::Color => "color",
            Column::Price => "price",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The requested column is not in the allow-set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid column")]
pub struct InvalidColumn;

impl FromStr for Column {
    type Err = InvalidColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or(InvalidColumn)
    }
}

/// A single-column lookup: SQL text plus the bound `name` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    pub sql: String,
    pub name: String,
}

impl LookupQuery {
    /// Build a lookup whose identifier comes from the allow-set.
    pub fn safe(column: Column, name: impl Into<String>) -> Self {
        Self {
            sql: select_backticked(column.as_str()),
            name: name.into(),
        }
    }

    /// Build a lookup from an arbitrary caller-supplied column.
    ///
    /// INSECURE: backticks are doubled and nothing else is done. Quotes, `?`,
    /// comment markers, NUL and other control bytes and SQL keywords all reach
    /// the identifier text unchanged, and the doubled backtick keeps a payload
    /// such as ``name` FROM users -- `` inside one quoted identifier. Whether
    /// that text is harmless depends on every layer between here and the
    /// server parsing it the same way; the `/vuln` endpoint echoes it so the
    /// effect of each payload can be observed.
    pub fn unsafe_identifier(raw_col: &str, name: impl Into<String>) -> Self {
        Self {
            sql: select_backticked(&escape_identifier(raw_col)),
            name: name.into(),
        }
    }
}

/// Double every backtick so the value stays inside a backtick-quoted identifier.
pub fn escape_identifier(raw: &str) -> String {
    raw.replace('`', "``")
}

fn select_backticked(ident: &str) -> String {
    format!("SELECT `{ident}` AS val FROM {FRUIT_TABLE} WHERE name = ?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_parses_allow_set() {
        assert_eq!("id".parse::<Column>(), Ok(Column::Id));
        assert_eq!("name".parse::<Column>(), Ok(Column::Name));
        assert_eq!("color".parse::<Column>(), Ok(Column::Color));
        assert_eq!("price".parse::<Column>(), Ok(Column::Price));
    }

    #[test]
    fn test_column_rejects_everything_else() {
        for bad in ["", "ID", "Name", "name ", " name", "secret", "name`", "name--", "*"] {
            assert_eq!(bad.parse::<Column>(), Err(InvalidColumn), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_column_default_is_name() {
        assert_eq!(Column::default(), Column::Name);
    }

    #[test]
    fn test_invalid_column_message() {
        assert_eq!(InvalidColumn.to_string(), "invalid column");
    }

    #[test]
    fn test_safe_query_text() {
        let q = LookupQuery::safe(Column::Color, "apple");
        assert_eq!(q.sql, "SELECT `color` AS val FROM fruit WHERE name = ?");
        assert_eq!(q.name, "apple");
    }

    #[test]
    fn test_safe_query_never_embeds_name() {
        let payload = "'; DROP TABLE fruit; --";
        for column in Column::ALL {
            let q = LookupQuery::safe(column, payload);
            assert!(!q.sql.contains("DROP"));
            assert_eq!(q.name, payload);
        }
    }

    #[test]
    fn test_escape_identifier_doubles_backticks() {
        assert_eq!(escape_identifier("name"), "name");
        assert_eq!(escape_identifier("a`b"), "a``b");
        assert_eq!(escape_identifier("``"), "````");
    }

    #[test]
    fn test_unsafe_query_escapes_backtick() {
        let q = LookupQuery::unsafe_identifier("a`b", "");
        assert_eq!(q.sql, "SELECT `a``b` AS val FROM fruit WHERE name = ?");
    }

    #[test]
    fn test_unsafe_query_passes_plain_column_through() {
        let q = LookupQuery::unsafe_identifier("price", "kiwi");
        assert_eq!(q, LookupQuery::safe(Column::Price, "kiwi"));
    }

    #[test]
    fn test_unsafe_query_keeps_closing_backtick_inside_identifier() {
        // The doubled backtick does not end the identifier, so the statement
        // keeps its shape and only the column name changes.
        let payload = "name` AS val FROM users -- ";
        let q = LookupQuery::unsafe_identifier(payload, "");
        assert_eq!(
            q.sql,
            "SELECT `name`` AS val FROM users -- ` AS val FROM fruit WHERE name = ?"
        );
        assert_eq!(q.sql, select_backticked(&escape_identifier(payload)));
        assert!(q.sql.ends_with("` AS val FROM fruit WHERE name = ?"));
    }

    #[test]
    fn test_unsafe_query_passes_other_characters_through() {
        // Quotes, '?', comment markers and NUL reach the identifier text as-is.
        for payload in ["name', 1) -- ?", "?#\0", "a\u{0}b", "x\"y"] {
            let q = LookupQuery::unsafe_identifier(payload, "");
            assert_eq!(
                q.sql,
                format!("SELECT `{payload}` AS val FROM fruit WHERE name = ?")
            );
        }
    }
}
