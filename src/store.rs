// src/store.rs

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Postgres SQLSTATE for "undefined column".
pub const UNDEFINED_COLUMN_CODE: &str = "42703";
/// Postgres SQLSTATE for "undefined table".
pub const UNDEFINED_TABLE_CODE: &str = "42P01";
/// PostgREST: relation missing from the schema cache.
pub const MISSING_RELATION_CODE: &str = "PGRST205";
/// PostgREST: single-object request did not match exactly one row.
pub const SINGLE_ROW_CODE: &str = "PGRST116";

static UNDEFINED_COLUMN_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)column .* does not exist").expect("static regex is valid")
});

/// Errors reported by the queryable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A projected or filtered column is absent from the table's schema.
    #[error("undefined column: {message}")]
    UndefinedColumn { message: String },

    /// The target table does not exist.
    #[error("undefined table: {message}")]
    UndefinedTable { message: String },

    /// A single-row request matched no row.
    #[error("no matching row")]
    RowNotFound,

    /// Any other error response from the store.
    #[error("store error (HTTP {status}, code {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("malformed store response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Classifies an error response by its machine-readable code first and
    /// its human-readable message second.
    pub fn classify(status: u16, code: &str, message: &str, details: &str) -> Self {
        if code == UNDEFINED_COLUMN_CODE || UNDEFINED_COLUMN_MESSAGE.is_match(message) {
            return StoreError::UndefinedColumn {
                message: message.to_string(),
            };
        }

        if code == UNDEFINED_TABLE_CODE || code == MISSING_RELATION_CODE {
            return StoreError::UndefinedTable {
                message: message.to_string(),
            };
        }

        if code == SINGLE_ROW_CODE && details.contains("0 rows") {
            return StoreError::RowNotFound;
        }

        StoreError::Api {
            status,
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_undefined_column(&self) -> bool {
        matches!(self, StoreError::UndefinedColumn { .. })
    }
}

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// A collection-scoped read: projection, equality filters, ordering and limit.
///
/// The projection uses the store's select syntax, so relation expansion such
/// as `id, tests(title)` is expressed in `columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<(String, String)>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Sets the projection. Whitespace is stripped so multi-line selects
    /// stay readable at the call site.
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.chars().filter(|c| !c.is_whitespace()).collect();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The queryable store the service delegates persistence to.
///
/// Rows travel as JSON objects; callers decode them into their own models.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns every row matching `query`.
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Returns exactly one row, or [`StoreError::RowNotFound`].
    async fn select_single(&self, query: &Query) -> Result<Value, StoreError>;

    /// Inserts `rows` (an object or an array of objects) and returns the
    /// inserted rows projected onto `returning`.
    async fn insert(&self, table: &str, rows: Value, returning: &str)
    -> Result<Vec<Value>, StoreError>;

    /// Deletes the rows matched by the query's filters and returns how many
    /// were removed.
    async fn delete(&self, query: &Query) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_code() {
        let err = StoreError::classify(400, "42703", "column test_results.answers does not exist", "");
        assert!(err.is_undefined_column());

        let err = StoreError::classify(404, "42P01", "relation \"public.answer\" does not exist", "");
        assert!(matches!(err, StoreError::UndefinedTable { .. }));
    }

    #[test]
    fn classify_by_message_when_code_is_missing() {
        let err = StoreError::classify(400, "", "Column \"answers\" Does Not Exist", "");
        assert!(err.is_undefined_column());
    }

    #[test]
    fn single_row_with_zero_rows_is_not_found() {
        let err = StoreError::classify(
            406,
            "PGRST116",
            "JSON object requested, multiple (or no) rows returned",
            "The result contains 0 rows",
        );
        assert!(matches!(err, StoreError::RowNotFound));

        let err = StoreError::classify(
            406,
            "PGRST116",
            "JSON object requested, multiple (or no) rows returned",
            "The result contains 2 rows",
        );
        assert!(matches!(err, StoreError::Api { status: 406, .. }));
    }

    #[test]
    fn select_strips_whitespace() {
        let query = Query::table("test_results").select(
            r#"
            id,
            tests(title),
            score
            "#,
        );
        assert_eq!(query.columns, "id,tests(title),score");
    }

    #[test]
    fn builder_collects_filters_in_order() {
        let query = Query::table("test_questions")
            .eq("test_id", "t1")
            .eq("question_type", "radio")
            .order_by("question_order", Direction::Asc)
            .limit(5);

        assert_eq!(
            query.filters,
            vec![
                ("test_id".to_string(), "t1".to_string()),
                ("question_type".to_string(), "radio".to_string())
            ]
        );
        assert_eq!(query.order, Some(("question_order".to_string(), Direction::Asc)));
        assert_eq!(query.limit, Some(5));
    }
}
