//! Column lookups against the `fruit` table.
//!
//! `/safe` checks `col` against the allow-set before building any SQL.
//! `/vuln` splices `col` after backtick doubling only and echoes the SQL text
//! back so the effect of a payload is visible. `name` is a bound parameter on
//! both.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::ApiError;
use crate::query::{Column, LookupQuery};
use crate::state::AppState;
use crate::store::RowValue;

/// Query-string inputs shared by both lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupParams {
    pub name: String,
    pub col: String,
}

impl LookupParams {
    /// Build from decoded query pairs. The first occurrence of a key wins.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut name = None;
        let mut col = None;
        for (key, value) in pairs {
            match key.as_str() {
                "name" if name.is_none() => name = Some(value),
                "col" if col.is_none() => col = Some(value),
                _ => {}
            }
        }
        Self {
            name: name.unwrap_or_default(),
            col: col.unwrap_or_default(),
        }
    }

    /// Requested column, `name` when absent or empty.
    pub fn column(&self) -> &str {
        if self.col.is_empty() {
            Column::default().as_str()
        } else {
            &self.col
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RowBody {
    pub val: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RowsBody {
    pub rows: Vec<RowBody>,
}

#[derive(Debug, Serialize)]
pub struct VulnBody {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<RowBody>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Allow-listed lookup.
pub async fn safe(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<RowsBody>, ApiError> {
    let params = LookupParams::from_pairs(pairs);
    let column: Column = params.column().parse()?;
    let query = LookupQuery::safe(column, params.name);

    let values = state.store.fetch_values(&query).await?;
    let rows = values
        .into_iter()
        .filter_map(|value| match value {
            Ok(val) => Some(RowBody { val }),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping undecodable row");
                None
            }
        })
        .collect();

    Ok(Json(RowsBody { rows }))
}

/// Injectable lookup. Decode failures are dropped and the row kept as null.
pub async fn vuln(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let params = LookupParams::from_pairs(pairs);
    let query = LookupQuery::unsafe_identifier(params.column(), params.name.as_str());

    match state.store.fetch_values(&query).await {
        Ok(values) => {
            let rows = values.into_iter().map(vuln_row).collect();
            Json(VulnBody {
                query: query.sql,
                rows: Some(rows),
                error: None,
            })
            .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, sql = %query.sql, "Vulnerable lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(VulnBody {
                    query: query.sql,
                    rows: None,
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

fn vuln_row(value: RowValue) -> RowBody {
    RowBody {
        val: value.unwrap_or(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DecodeError;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_params_missing_everything() {
        let params = LookupParams::from_pairs(vec![]);
        assert_eq!(params.name, "");
        assert_eq!(params.column(), "name");
    }

    #[test]
    fn test_params_empty_col_defaults_to_name() {
        let params = LookupParams::from_pairs(pairs(&[("col", ""), ("name", "kiwi")]));
        assert_eq!(params.column(), "name");
        assert_eq!(params.name, "kiwi");
    }

    #[test]
    fn test_params_first_occurrence_wins() {
        let params = LookupParams::from_pairs(pairs(&[
            ("col", "color"),
            ("col", "secret"),
            ("name", "apple"),
            ("name", "pear"),
        ]));
        assert_eq!(params.column(), "color");
        assert_eq!(params.name, "apple");
    }

    #[test]
    fn test_params_ignore_unknown_keys() {
        let params = LookupParams::from_pairs(pairs(&[("table", "users"), ("col", "id")]));
        assert_eq!(params, LookupParams { name: String::new(), col: "id".to_string() });
    }

    #[test]
    fn test_vuln_row_keeps_failed_decode_as_null() {
        assert_eq!(vuln_row(Ok(Some("red".into()))).val.as_deref(), Some("red"));
        assert_eq!(vuln_row(Ok(None)).val, None);
        assert_eq!(vuln_row(Err(DecodeError("bad".into()))).val, None);
    }

    #[test]
    fn test_vuln_body_shape() {
        let ok = serde_json::to_value(VulnBody {
            query: "SELECT 1".into(),
            rows: Some(vec![]),
            error: None,
        })
        .unwrap();
        assert_eq!(ok, serde_json::json!({ "query": "SELECT 1", "rows": [] }));

        let failed = serde_json::to_value(VulnBody {
            query: "SELECT 1".into(),
            rows: None,
            error: Some("boom".into()),
        })
        .unwrap();
        assert_eq!(failed, serde_json::json!({ "query": "SELECT 1", "error": "boom" }));
    }
}
