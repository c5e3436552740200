//! MySQL access behind the `FruitStore` trait.
//!
//! `MySqlStore` owns a lazily connected `sqlx` pool. Handlers only see the
//! trait, so the router can be driven against an in-memory store in tests.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Connection, Row, TypeInfo, ValueRef};

use crate::config::{DatabaseConfig, DB_PORT};
use crate::query::LookupQuery;

/// How the bound `name` argument reaches the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamMode {
    /// Prepare the statement server-side and bind over the binary protocol.
    #[default]
    ServerPrepared,
    /// Render arguments into the SQL text client-side and send plain text.
    ///
    /// Literals are escaped with backslashes (see [`quote_literal`]). A server
    /// running with `NO_BACKSLASH_ESCAPES` in its `sql_mode` reads those
    /// backslashes literally, so this mode must not be used against one.
    ClientInterpolated,
}

impl ParamMode {
    pub fn interpolates(&self) -> bool {
        matches!(self, ParamMode::ClientInterpolated)
    }
}

impl std::fmt::Display for ParamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamMode::ServerPrepared => write!(f, "server-prepared"),
            ParamMode::ClientInterpolated => write!(f, "client-interpolated"),
        }
    }
}

/// Errors from the database layer. The message is the driver's own text.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// A single row could not be rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

impl From<sqlx::Error> for DecodeError {
    fn from(err: sqlx::Error) -> Self {
        DecodeError(err.to_string())
    }
}

/// The `val` column of one row: text, SQL NULL, or a per-row decode failure.
pub type RowValue = Result<Option<String>, DecodeError>;

#[async_trait]
pub trait FruitStore: Send + Sync {
    /// Check that a connection can be acquired and answers a ping.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Run a lookup and return the first column of every row, in order.
    async fn fetch_values(&self, query: &LookupQuery) -> Result<Vec<RowValue>, StoreError>;

    /// Release pooled connections. Further calls fail.
    async fn close(&self);
}

/// `FruitStore` backed by a MySQL connection pool.
pub struct MySqlStore {
    pool: MySqlPool,
    mode: ParamMode,
}

impl MySqlStore {
    /// Build the pool without opening a connection; call `ping` to validate.
    pub fn connect(config: &DatabaseConfig, mode: ParamMode) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(DB_PORT)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name);

        let pool = MySqlPoolOptions::new().connect_lazy_with(options);

        Self { pool, mode }
    }

    pub fn mode(&self) -> ParamMode {
        self.mode
    }
}

#[async_trait]
impl FruitStore for MySqlStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn fetch_values(&self, query: &LookupQuery) -> Result<Vec<RowValue>, StoreError> {
        let interpolated = match self.mode {
            ParamMode::ClientInterpolated => interpolate(&query.sql, &[query.name.as_str()]),
            ParamMode::ServerPrepared => None,
        };

        let rows = match interpolated {
            Some(text) => sqlx::raw_sql(&text).fetch_all(&self.pool).await?,
            None => {
                sqlx::query(&query.sql)
                    .bind(query.name.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.iter().map(decode_text).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// How the first column is read before rendering, chosen by its SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextKind {
    /// Sent as text on both protocols; read unchecked to keep the scale.
    Decimal,
    /// Single precision; widening to `f64` would print `1.2` as `1.2000000476837158`.
    Float,
    /// Two-byte year on the binary protocol.
    Year,
    /// Big-endian bit string, rendered as its unsigned value.
    Bit,
    Other,
}

impl TextKind {
    fn of(type_name: &str) -> Self {
        match type_name {
            "DECIMAL" => TextKind::Decimal,
            "FLOAT" => TextKind::Float,
            "YEAR" => TextKind::Year,
            "BIT" => TextKind::Bit,
            _ => TextKind::Other,
        }
    }
}

/// Render the first column of a row as text, whatever its SQL type.
///
/// DATETIME and DATE become RFC 3339 timestamps in UTC, TIME keeps its
/// `HH:MM:SS` form. Anything not recognised is read as a string unchecked.
fn decode_text(row: &MySqlRow) -> RowValue {
    let raw = row.try_get_raw(0)?;
    if raw.is_null() {
        return Ok(None);
    }

    let text = match TextKind::of(raw.type_info().name()) {
        TextKind::Decimal => row.try_get_unchecked::<String, _>(0)?,
        TextKind::Float => row.try_get::<f32, _>(0)?.to_string(),
        TextKind::Year => row.try_get_unchecked::<u16, _>(0)?.to_string(),
        TextKind::Bit => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(0)?;
            bit_value(&bytes)
                .ok_or_else(|| DecodeError(format!("BIT value of {} bytes", bytes.len())))?
                .to_string()
        }
        TextKind::Other => row
            .try_get::<String, _>(0)
            .or_else(|_| row.try_get::<i64, _>(0).map(|v| v.to_string()))
            .or_else(|_| row.try_get::<u64, _>(0).map(|v| v.to_string()))
            .or_else(|_| row.try_get::<f64, _>(0).map(|v| v.to_string()))
            .or_else(|_| row.try_get::<NaiveDateTime, _>(0).map(format_datetime))
            .or_else(|_| {
                row.try_get::<NaiveDate, _>(0)
                    .map(|d| format_datetime(d.and_time(NaiveTime::MIN)))
            })
            .or_else(|_| row.try_get::<NaiveTime, _>(0).map(|t| t.to_string()))
            .or_else(|_| row.try_get_unchecked::<String, _>(0))?,
    };

    Ok(Some(text))
}

/// Interpret a BIT(n) payload (at most 64 bits, big-endian) as an integer.
fn bit_value(bytes: &[u8]) -> Option<u64> {
    if bytes.len() > 8 {
        return None;
    }
    Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn format_datetime(value: NaiveDateTime) -> String {
    value.and_utc().to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Replace each `?` in `sql` with the next argument as a quoted literal.
///
/// Returns `None` when the number of `?` characters differs from the number
/// of arguments; the caller then prepares the statement server-side instead.
/// Every `?` counts, including ones inside identifiers or literals.
pub fn interpolate(sql: &str, args: &[&str]) -> Option<String> {
    if sql.matches('?').count() != args.len() {
        return None;
    }

    let extra: usize = args.iter().map(|a| a.len() + 2).sum();
    let mut out = String::with_capacity(sql.len() + extra);
    let mut args = args.iter();
    for ch in sql.chars() {
        match ch {
            '?' => out.push_str(&quote_literal(args.next()?)),
            _ => out.push(ch),
        }
    }
    Some(out)
}

/// Quote a value as a MySQL string literal with backslash escapes.
///
/// Assumes the session does not have `NO_BACKSLASH_ESCAPES` set; under that
/// mode `'` would have to be doubled instead and `\` is an ordinary byte.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Column;

    #[test]
    fn test_param_mode_default_is_server_prepared() {
        assert_eq!(ParamMode::default(), ParamMode::ServerPrepared);
        assert!(!ParamMode::default().interpolates());
        assert!(ParamMode::ClientInterpolated.interpolates());
    }

    #[test]
    fn test_param_mode_display() {
        assert_eq!(ParamMode::ServerPrepared.to_string(), "server-prepared");
        assert_eq!(ParamMode::ClientInterpolated.to_string(), "client-interpolated");
    }

    #[test]
    fn test_quote_literal_plain() {
        assert_eq!(quote_literal("apple"), "'apple'");
        assert_eq!(quote_literal(""), "''");
    }

    #[test]
    fn test_quote_literal_escapes_specials() {
        assert_eq!(
            quote_literal("'; DROP TABLE fruit; --"),
            "'\\'; DROP TABLE fruit; --'"
        );
        assert_eq!(quote_literal("a\\b"), "'a\\\\b'");
        assert_eq!(quote_literal("\0\n\r\x1a\""), "'\\0\\n\\r\\Z\\\"'");
    }

    #[test]
    fn test_quote_literal_escapes_quote_with_backslash_not_doubling() {
        // Only valid while NO_BACKSLASH_ESCAPES is off.
        assert_eq!(quote_literal("o'neil"), "'o\\'neil'");
        assert!(!quote_literal("o'neil").contains("''"));
    }

    #[test]
    fn test_quote_literal_leaves_backticks() {
        assert_eq!(quote_literal("a`b"), "'a`b'");
    }

    #[test]
    fn test_interpolate_safe_lookup() {
        let q = LookupQuery::safe(Column::Name, "o'neil");
        assert_eq!(
            interpolate(&q.sql, &[q.name.as_str()]).unwrap(),
            "SELECT `name` AS val FROM fruit WHERE name = 'o\\'neil'"
        );
    }

    #[test]
    fn test_interpolate_count_mismatch_falls_back() {
        let q = LookupQuery::unsafe_identifier("?", "apple");
        assert_eq!(q.sql.matches('?').count(), 2);
        assert_eq!(interpolate(&q.sql, &[q.name.as_str()]), None);
    }

    #[test]
    fn test_interpolate_no_placeholders() {
        assert_eq!(interpolate("SELECT 1", &[]).as_deref(), Some("SELECT 1"));
        assert_eq!(interpolate("SELECT 1", &["x"]), None);
    }

    #[test]
    fn test_format_datetime_rfc3339() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();
        assert_eq!(format_datetime(dt), "2024-03-09T14:05:07Z");

        let midnight = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_time(NaiveTime::MIN);
        assert_eq!(format_datetime(midnight), "2024-03-09T00:00:00Z");
    }

    #[test]
    fn test_text_kind_by_type_name() {
        assert_eq!(TextKind::of("DECIMAL"), TextKind::Decimal);
        assert_eq!(TextKind::of("FLOAT"), TextKind::Float);
        assert_eq!(TextKind::of("YEAR"), TextKind::Year);
        assert_eq!(TextKind::of("BIT"), TextKind::Bit);
        for other in ["DOUBLE", "INT", "BIGINT UNSIGNED", "VARCHAR", "DATETIME"] {
            assert_eq!(TextKind::of(other), TextKind::Other, "{other}");
        }
    }

    #[test]
    fn test_float_renders_at_single_precision() {
        let stored = 1.2f32;
        assert_eq!(stored.to_string(), "1.2");
        assert_eq!(f64::from(stored).to_string(), "1.2000000476837158");
    }

    #[test]
    fn test_bit_value_big_endian() {
        assert_eq!(bit_value(&[]), Some(0));
        assert_eq!(bit_value(&[1]), Some(1));
        assert_eq!(bit_value(&[0x01, 0x00]), Some(256));
        assert_eq!(bit_value(&[0xff; 8]), Some(u64::MAX));
        assert_eq!(bit_value(&[0; 9]), None);
    }

    #[test]
    fn test_decode_error_from_sqlx() {
        let err = DecodeError::from(sqlx::Error::ColumnNotFound("val".to_string()));
        assert!(err.0.contains("val"));
    }

    #[tokio::test]
    async fn test_connect_is_lazy_and_closed_pool_fails_ping() {
        let store = MySqlStore::connect(&DatabaseConfig::default(), ParamMode::ServerPrepared);
        assert_eq!(store.mode(), ParamMode::ServerPrepared);

        store.close().await;
        let err = store.ping().await.unwrap_err();
        assert!(matches!(err, StoreError::Database(sqlx::Error::PoolClosed)));
    }
}
