use sqlx::PgPool;

use crate::app_error::{AppError, AppResult};

const MAX_JSON_LOG_LEN: usize = 200;

/// Parse a JSONB column into the target type, logging a warning on failure.
///
/// SQL NULL yields the default without a warning. Malformed values (wrong
/// shape, wrong element types) also yield the default, but are logged with
/// the entity they belong to so corrupted rows can be found.
pub fn parse_json_with_fallback<T: serde::de::DeserializeOwned + Default>(
    json: &serde_json::Value,
    field_name: &str,
    entity_type: &str,
    entity_id: &str,
) -> T {
    if json.is_null() {
        return T::default();
    }

    serde_json::from_value(json.clone()).unwrap_or_else(|err| {
        let raw_str = json.to_string();
        let truncated = if raw_str.len() > MAX_JSON_LOG_LEN {
            let mut cut = MAX_JSON_LOG_LEN;
            while !raw_str.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}...", &raw_str[..cut])
        } else {
            raw_str
        };

        tracing::warn!(
            field = field_name,
            entity_type = entity_type,
            entity_id = entity_id,
            raw_json = %truncated,
            error = %err,
            "Failed to parse JSON field, using default value"
        );
        T::default()
    })
}

/// Serialize a value for a JSONB column.
pub fn to_json<T: serde::Serialize>(value: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(format!("JSON encode failed: {e}")))
}

pub mod catalog;
pub mod collection;
pub mod invitation;
pub mod invoice;
pub mod product;
pub mod revoked_token;
pub mod session;
pub mod store;
pub mod store_role;
pub mod subscription;
pub mod subscription_plan;
pub mod usage_metric;
pub mod user;
pub mod visitor;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    AppError::Conflict {
                        field: "record",
                        message: "A record with this value already exists".into(),
                    }
                } else if msg.contains("foreign key") {
                    AppError::InvalidInput("Referenced record not found".into())
                } else if msg.contains("null value") && msg.contains("violates not-null") {
                    AppError::InvalidInput("Required field is missing".into())
                } else if msg.contains("violates check constraint") {
                    AppError::InvalidInput("Value out of allowed range".into())
                } else {
                    // Details stay in the log.
                    tracing::error!(error = ?err, "Database error");
                    AppError::Database("Database operation failed".into())
                }
            }
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Database("Database operation failed".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_json_valid_array() {
        let json = serde_json::json!(["a", "b", "c"]);
        let result: Vec<String> = parse_json_with_fallback(&json, "features", "plan", "123");
        assert_eq!(result, vec!["a", "b", "c"]);
    }

    #[test]
    fn parse_json_sql_null_returns_default() {
        let result: Vec<String> =
            parse_json_with_fallback(&serde_json::Value::Null, "tags", "product", "123");
        assert!(result.is_empty());
    }

    #[test]
    fn parse_json_type_mismatch_returns_default() {
        let json = serde_json::json!([1, 2, 3]);
        let result: Vec<String> = parse_json_with_fallback(&json, "tags", "product", "123");
        assert!(result.is_empty());
    }

    #[test]
    fn parse_json_object_into_map() {
        let json = serde_json::json!({ "size": "M", "color": "red" });
        let result: HashMap<String, String> =
            parse_json_with_fallback(&json, "option_values", "variant", "123");
        assert_eq!(result.get("size").map(String::as_str), Some("M"));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn parse_json_long_garbage_is_truncated_without_panic() {
        let long = "é".repeat(300);
        let json = serde_json::json!({ "blob": long });
        let result: Vec<String> = parse_json_with_fallback(&json, "tags", "product", "123");
        assert!(result.is_empty());
    }

    #[test]
    fn to_json_encodes_lists() {
        let value = to_json(&vec!["a".to_string()]).unwrap();
        assert_eq!(value, serde_json::json!(["a"]));
    }
}
