// src/locator.rs

//! Recovers the per-question answers of a stored result.
//!
//! Where those answers live is not fixed: they may sit in a JSON column of
//! `test_results`, in a sibling table keyed by the result id, behind a
//! declared relation, or in some other column of the row. The locator tries
//! each layout in a fixed order and stops at the first one that yields data.

use serde_json::{Map, Value};

use crate::{
    models::result::{AnswerDetail, RESULTS_TABLE},
    store::{Query, Store, StoreError},
};

/// Sibling tables probed when `test_results.answers` does not exist.
pub const CANDIDATE_TABLES: [&str; 9] = [
    "answers",
    "answer",
    "test_answers",
    "test_answer",
    "result_answers",
    "result_answer",
    "answer_details",
    "responses",
    "user_answers",
];

/// Foreign-key columns tried against each sibling table.
pub const CANDIDATE_KEYS: [&str; 6] = [
    "test_result_id",
    "result_id",
    "test_results_id",
    "test_id",
    "parent_id",
    "result",
];

/// Columns of a full `test_results` row that may hold the answers.
pub const CANDIDATE_FIELDS: [&str; 7] = [
    "answers",
    "responses",
    "result",
    "data",
    "payload",
    "answers_json",
    "user_answers",
];

pub struct AnswerLocator<'a> {
    store: &'a dyn Store,
}

impl<'a> AnswerLocator<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Returns the answers of `result_id`, or an empty list when none can be
    /// found. Store failures are logged, never returned.
    pub async fn locate(&self, result_id: &str) -> Vec<AnswerDetail> {
        match self.try_locate(result_id).await {
            Ok(answers) => answers,
            Err(err) => {
                tracing::error!(result_id, error = %err, "Failed to fetch answer details");
                Vec::new()
            }
        }
    }

    async fn try_locate(&self, result_id: &str) -> Result<Vec<AnswerDetail>, StoreError> {
        let mut response = self
            .store
            .select_single(&Query::table(RESULTS_TABLE).select("answers").eq("id", result_id))
            .await;

        if let Err(err) = &response {
            if err.is_undefined_column() {
                tracing::debug!(result_id, "answers column missing, probing sibling tables");
                if let Some(found) = self.probe_sibling_tables(result_id).await {
                    return Ok(found);
                }

                response = self
                    .store
                    .select_single(
                        &Query::table(RESULTS_TABLE)
                            .select("answers(*)")
                            .eq("id", result_id),
                    )
                    .await;
            }
        }

        match response {
            Ok(row) => Ok(decode_details(normalize_payload(row))),
            Err(err) => {
                tracing::debug!(result_id, error = %err, "inspecting full result row");
                let row = self
                    .store
                    .select_single(&Query::table(RESULTS_TABLE).eq("id", result_id))
                    .await?;

                match row {
                    Value::Object(fields) => {
                        let answers = introspect_row(&fields);
                        if answers.is_empty() {
                            tracing::warn!(result_id, "no answer-like column found in result row");
                        }
                        Ok(decode_details(answers))
                    }
                    _ => Ok(Vec::new()),
                }
            }
        }
    }

    /// Tries every (table, key) pair in order. The first non-empty set wins.
    async fn probe_sibling_tables(&self, result_id: &str) -> Option<Vec<AnswerDetail>> {
        for table in CANDIDATE_TABLES {
            for key in CANDIDATE_KEYS {
                tracing::debug!(table, key, "probing");
                match self
                    .store
                    .select(&Query::table(table).eq(key, result_id))
                    .await
                {
                    Ok(rows) if !rows.is_empty() => {
                        tracing::debug!(
                            table,
                            key,
                            rows = rows.len(),
                            "answers found in separate table"
                        );
                        return Some(decode_details(rows));
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!(table, key, error = %err, "probe failed");
                    }
                }
            }
        }
        None
    }
}

/// Extracts the answer list from a direct or relational read of a result.
///
/// The `answers` field (or the whole row when absent) may be an array, a JSON
/// string, or an object wrapping an `answers` array.
pub fn normalize_payload(row: Value) -> Vec<Value> {
    let payload = match row {
        Value::Object(mut fields) => match fields.remove("answers") {
            Some(value) if !value.is_null() => value,
            _ => Value::Object(fields),
        },
        other => other,
    };

    let payload = match payload {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::Null),
        other => other,
    };

    match payload {
        Value::Array(items) => items,
        Value::Object(mut fields) => match fields.remove("answers") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Looks through a full result row for something that holds the answers.
pub fn introspect_row(row: &Map<String, Value>) -> Vec<Value> {
    let preferred = CANDIDATE_FIELDS
        .iter()
        .filter_map(|name| row.get(*name))
        .find(|value| is_truthy(value));

    if let Some(Value::Array(items)) = preferred {
        return items.clone();
    }

    for value in row.values() {
        match value {
            Value::Array(items) => return items.clone(),
            Value::String(raw) => {
                if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) {
                    return items;
                }
            }
            _ => {}
        }
    }

    Vec::new()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// One detail per stored record, in order. Nothing is dropped.
fn decode_details(items: Vec<Value>) -> Vec<AnswerDetail> {
    items.into_iter().map(AnswerDetail::from_stored).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Store double that answers by matching on the query and records every call.
    struct ScriptedStore {
        script: Box<dyn Fn(&Query) -> Result<Value, StoreError> + Send + Sync>,
        calls: Mutex<Vec<Query>>,
    }

    impl ScriptedStore {
        fn new(script: impl Fn(&Query) -> Result<Value, StoreError> + Send + Sync + 'static) -> Self {
            Self {
                script: Box::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Query> {
            self.calls.lock().unwrap().clone()
        }

        fn run(&self, query: &Query) -> Result<Value, StoreError> {
            self.calls.lock().unwrap().push(query.clone());
            (self.script)(query)
        }
    }

    #[async_trait]
    impl Store for ScriptedStore {
        async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
            match self.run(query)? {
                Value::Array(rows) => Ok(rows),
                other => Ok(vec![other]),
            }
        }

        async fn select_single(&self, query: &Query) -> Result<Value, StoreError> {
            self.run(query)
        }

        async fn insert(&self, _: &str, _: Value, _: &str) -> Result<Vec<Value>, StoreError> {
            unreachable!("locator never writes")
        }

        async fn delete(&self, _: &Query) -> Result<usize, StoreError> {
            unreachable!("locator never writes")
        }
    }

    fn undefined_column() -> StoreError {
        StoreError::UndefinedColumn {
            message: "column test_results.answers does not exist".into(),
        }
    }

    fn missing_table() -> StoreError {
        StoreError::UndefinedTable {
            message: "relation does not exist".into(),
        }
    }

    fn is_direct_read(q: &Query) -> bool {
        q.table == RESULTS_TABLE && q.columns == "answers"
    }

    #[tokio::test]
    async fn probe_hit_short_circuits_remaining_strategies() {
        // Arrange
        let store = ScriptedStore::new(|q| {
            if is_direct_read(q) {
                return Err(undefined_column());
            }
            if q.table == "answers" && q.filters == [("result_id".to_string(), "r1".to_string())] {
                return Ok(json!([
                    {"question_number": 1, "user_answer": "A", "is_correct": true},
                    {"question_number": 2, "user_answer": "Temur", "is_correct": false}
                ]));
            }
            if q.table == "answers" {
                return Ok(json!([]));
            }
            Err(missing_table())
        });

        // Act
        let answers = AnswerLocator::new(&store).locate("r1").await;

        // Assert
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].question_number, Some(1));
        assert_eq!(answers[1].user_answer.as_deref(), Some("Temur"));

        let calls = store.calls();
        // direct read, answers/test_result_id, answers/result_id
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|q| q.columns != "answers(*)"));
    }

    #[tokio::test]
    async fn first_non_empty_probe_wins_whatever_its_field_types() {
        // Arrange
        let store = ScriptedStore::new(|q| {
            if is_direct_read(q) {
                return Err(undefined_column());
            }
            match (q.table.as_str(), q.filters[0].0.as_str()) {
                ("answers", "test_result_id") => Ok(json!([
                    {"question_number": "1", "user_answer": "A", "is_correct": 1},
                    {"question_number": 2.0, "options": ["x", "y", "z", "w"]}
                ])),
                ("answers", "result_id") => Ok(json!([{"question_number": 9}])),
                _ => Ok(json!([])),
            }
        });

        // Act
        let answers = AnswerLocator::new(&store).locate("r1").await;

        // Assert
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].question_number, Some(1));
        assert!(answers[0].is_correct);
        assert_eq!(answers[1].question_number, Some(2));
        assert_eq!(answers[1].options.as_ref().and_then(|o| o.a.as_deref()), Some("x"));
        assert_eq!(store.calls().len(), 2);
    }

    #[test]
    fn unwrapped_payload_keeps_every_record() {
        let payload = json!({"answers": [
            {"question_number": 1},
            {"question_number": 2.0},
            {"is_correct": 1}
        ]});

        let details = decode_details(normalize_payload(payload));

        assert_eq!(details.len(), 3);
        assert_eq!(details[1].question_number, Some(2));
        assert!(details[2].is_correct);
    }

    #[tokio::test]
    async fn probes_in_table_major_order() {
        let store = ScriptedStore::new(|q| {
            if is_direct_read(q) {
                return Err(undefined_column());
            }
            if q.table == "test_answers" && q.filters[0].0 == "test_id" {
                return Ok(json!([{"question_number": 1}]));
            }
            Ok(json!([]))
        });

        let answers = AnswerLocator::new(&store).locate("r1").await;

        assert_eq!(answers.len(), 1);
        let probes: Vec<(String, String)> = store
            .calls()
            .into_iter()
            .skip(1)
            .map(|q| (q.table, q.filters[0].0.clone()))
            .collect();
        // answers x6, answer x6, test_answers up to test_id (4th key)
        assert_eq!(probes.len(), 6 + 6 + 4);
        assert_eq!(probes[0], ("answers".to_string(), "test_result_id".to_string()));
        assert_eq!(probes[6], ("answer".to_string(), "test_result_id".to_string()));
        assert_eq!(probes[15], ("test_answers".to_string(), "test_id".to_string()));
    }

    #[tokio::test]
    async fn direct_read_string_payload_is_unwrapped() {
        let store = ScriptedStore::new(|q| {
            assert!(is_direct_read(q));
            Ok(json!({
                "answers": r#"{"answers":[{"question_number":1,"question_text":"Kim?","is_correct":true}]}"#
            }))
        });

        let answers = AnswerLocator::new(&store).locate("r1").await;

        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].question_text.as_deref(), Some("Kim?"));
        assert!(answers[0].is_correct);
        assert_eq!(store.calls().len(), 1);
    }

    #[tokio::test]
    async fn direct_read_with_null_column_is_empty() {
        let store = ScriptedStore::new(|_| Ok(json!({"answers": null})));

        let answers = AnswerLocator::new(&store).locate("r1").await;

        assert!(answers.is_empty());
        assert_eq!(store.calls().len(), 1);
    }

    #[tokio::test]
    async fn relational_select_used_after_failed_probes() {
        let store = ScriptedStore::new(|q| {
            if is_direct_read(q) {
                return Err(undefined_column());
            }
            if q.columns == "answers(*)" {
                return Ok(json!({"answers": [{"question_number": 3}]}));
            }
            Err(missing_table())
        });

        let answers = AnswerLocator::new(&store).locate("r1").await;

        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].question_number, Some(3));
        // 1 direct + 54 probes + 1 relational
        assert_eq!(store.calls().len(), 1 + 54 + 1);
    }

    #[tokio::test]
    async fn non_schema_error_skips_probing_and_inspects_row() {
        let store = ScriptedStore::new(|q| {
            if is_direct_read(q) {
                return Err(StoreError::Network("timeout".into()));
            }
            assert_eq!(q.columns, "*");
            Ok(json!({
                "id": "r1",
                "score": 3,
                "responses": "",
                "notes": "not json",
                "snapshot": "[{\"question_number\": 5}]"
            }))
        });

        let answers = AnswerLocator::new(&store).locate("r1").await;

        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].question_number, Some(5));
        assert_eq!(store.calls().len(), 2);
    }

    #[tokio::test]
    async fn everything_failing_degrades_to_empty() {
        let store = ScriptedStore::new(|q| {
            if is_direct_read(q) {
                return Err(undefined_column());
            }
            Err(StoreError::Network("connection refused".into()))
        });

        let answers = AnswerLocator::new(&store).locate("r1").await;

        assert!(answers.is_empty());
        // direct + 54 probes + relational + full row
        assert_eq!(store.calls().len(), 1 + 54 + 1 + 1);
    }

    #[test]
    fn normalize_handles_each_payload_shape() {
        assert_eq!(normalize_payload(json!({"answers": [{"a": 1}]})).len(), 1);
        assert_eq!(normalize_payload(json!({"answers": "[{\"a\":1},{\"a\":2}]"})).len(), 2);
        assert!(normalize_payload(json!({"answers": "{broken"})).is_empty());
        assert!(normalize_payload(json!({"answers": {"other": []}})).is_empty());
        assert_eq!(
            normalize_payload(json!({"answers": {"answers": [{"a": 1}]}})).len(),
            1
        );
        assert!(normalize_payload(json!({"answers": 5})).is_empty());
    }

    #[test]
    fn introspection_prefers_named_columns() {
        let row = json!({
            "first_list": [{"question_number": 9}],
            "data": [{"question_number": 1}, {"question_number": 2}]
        });

        let found = introspect_row(row.as_object().unwrap());

        assert_eq!(found.len(), 2);
    }

    #[test]
    fn introspection_scans_columns_in_order() {
        let row = json!({
            "id": "r1",
            "payload": {"not": "a list"},
            "b": "[1, 2, 3]",
            "a": [{"question_number": 1}]
        });

        let found = introspect_row(row.as_object().unwrap());

        assert_eq!(found, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn introspection_without_lists_is_empty() {
        let row = json!({"id": "r1", "score": 0, "answers": false});
        assert!(introspect_row(row.as_object().unwrap()).is_empty());
    }
}
