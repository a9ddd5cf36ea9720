use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::query_builder::{Filterable, Operation, Query};
use crate::storage::JsonStore;
use crate::utils::{
    error::{FlatrestError, FlatrestResult},
    types::{OrderDirection, QueryResult, Row},
};

/// A query described as data, the way an HTTP layer receives it:
///
/// ```json
/// {
///   "operation": "select",
///   "columns": "*",
///   "filters": [{"type": "eq", "column": "status", "value": "pending"}],
///   "order_by": "created_at",
///   "order_desc": true,
///   "limit": 10
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryRequest {
    pub operation: Option<String>,
    pub columns: String,
    pub filters: Vec<FilterSpec>,
    pub body: Option<Value>,
    pub order_by: Option<String>,
    pub order_desc: bool,
    /// Additional ordering keys, applied after `order_by`
    pub order: Vec<OrderSpec>,
    pub limit: Option<usize>,
    pub range: Option<(usize, usize)>,
    pub single: bool,
    pub maybe_single: bool,
    /// Any count mode (`exact`, `planned`, `estimated`) yields an exact count
    pub count: Option<String>,
    pub head: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterSpec {
    #[serde(rename = "type", default = "default_filter_type")]
    pub kind: String,
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderSpec {
    pub column: String,
    #[serde(default)]
    pub desc: bool,
}

fn default_filter_type() -> String {
    "eq".to_string()
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            operation: None,
            columns: "*".to_string(),
            filters: Vec::new(),
            body: None,
            order_by: None,
            order_desc: false,
            order: Vec::new(),
            limit: None,
            range: None,
            single: false,
            maybe_single: false,
            count: None,
            head: false,
        }
    }
}

impl FilterSpec {
    pub fn new(kind: &str, column: &str, value: Value) -> Self {
        Self {
            kind: kind.to_string(),
            column: column.to_string(),
            value,
        }
    }
}

impl QueryRequest {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation: Some(operation.to_string()),
            ..Self::default()
        }
    }

    pub fn from_json(payload: &str) -> FlatrestResult<Self> {
        serde_json::from_str(payload)
            .map_err(|e| FlatrestError::Configuration(format!("Invalid query request: {}", e)))
    }

    /// Translate into a builder. Modifiers the operation does not accept are ignored.
    pub fn build(&self, store: &JsonStore, table: &str) -> FlatrestResult<Query> {
        let operation: Operation = self
            .operation
            .as_deref()
            .ok_or_else(|| {
                FlatrestError::Configuration(
                    "No operation specified. Use select/insert/update/upsert/delete.".to_string(),
                )
            })?
            .parse()?;

        let base = store.table(table);
        let query = match operation {
            Operation::Select => {
                let mut query = self.apply_filters(base.select(&self.columns));
                if let Some(column) = &self.order_by {
                    query = query.order(column, OrderDirection::from_desc(self.order_desc));
                }
                for key in &self.order {
                    query = query.order(&key.column, OrderDirection::from_desc(key.desc));
                }
                if let Some(limit) = self.limit {
                    query = query.limit(limit);
                }
                if let Some((start, end)) = self.range {
                    query = query.range(start, end);
                }
                if self.single {
                    query = query.single();
                } else if self.maybe_single {
                    query = query.maybe_single();
                }
                if self.count.is_some() {
                    query = query.count();
                }
                if self.head {
                    query = query.head();
                }
                Query::Select(query)
            }
            Operation::Insert => Query::Insert(base.insert(self.body_rows()?)),
            Operation::Upsert => Query::Upsert(base.upsert(self.body_rows()?)),
            Operation::Update => {
                let mut query = self.apply_filters(base.update(self.body_object()?));
                if self.single {
                    query = query.single();
                } else if self.maybe_single {
                    query = query.maybe_single();
                }
                Query::Update(query)
            }
            Operation::Delete => Query::Delete(self.apply_filters(base.delete())),
        };

        Ok(query)
    }

    pub fn execute(&self, store: &JsonStore, table: &str) -> FlatrestResult<QueryResult> {
        self.build(store, table)?.execute()
    }

    fn apply_filters<Q: Filterable>(&self, mut query: Q) -> Q {
        for spec in &self.filters {
            query = if spec.kind == "or" {
                match &spec.value {
                    Value::String(group) => query.or(group),
                    other => {
                        tracing::warn!("Ignoring OR-group that is not a string: {}", other);
                        query
                    }
                }
            } else {
                query.filter(&spec.column, &spec.kind, spec.value.clone())
            };
        }
        query
    }

    fn body_rows(&self) -> FlatrestResult<Vec<Row>> {
        match &self.body {
            Some(Value::Object(row)) => Ok(vec![row.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row.clone()),
                    other => Err(FlatrestError::Configuration(format!(
                        "Body rows must be objects, got {}",
                        other
                    ))),
                })
                .collect(),
            Some(other) => Err(FlatrestError::Configuration(format!(
                "Body must be an object or an array of objects, got {}",
                other
            ))),
            None => Err(FlatrestError::Configuration("Missing request body".to_string())),
        }
    }

    fn body_object(&self) -> FlatrestResult<Row> {
        match &self.body {
            Some(Value::Object(row)) => Ok(row.clone()),
            Some(other) => Err(FlatrestError::Configuration(format!(
                "Update body must be an object, got {}",
                other
            ))),
            None => Err(FlatrestError::Configuration("Missing request body".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let request = QueryRequest::from_json(r#"{"operation": "select"}"#).expect("parses");
        assert_eq!(request.operation.as_deref(), Some("select"));
        assert_eq!(request.columns, "*");
        assert!(request.filters.is_empty());
        assert!(!request.single);
        assert!(request.count.is_none());
    }

    #[test]
    fn test_filter_spec_type_defaults_to_eq() {
        let request = QueryRequest::from_json(
            r#"{"operation": "delete", "filters": [{"column": "id", "value": "a"}]}"#,
        )
        .expect("parses");
        assert_eq!(request.filters[0], FilterSpec::new("eq", "id", json!("a")));
    }

    #[test]
    fn test_invalid_payload_is_configuration_error() {
        let result = QueryRequest::from_json(r#"{"operation": 5}"#);
        assert!(matches!(result, Err(FlatrestError::Configuration(_))));
    }

    #[test]
    fn test_body_rows_accepts_object_or_array() {
        let mut request = QueryRequest::new(Operation::Insert);
        request.body = Some(json!({"name": "a"}));
        assert_eq!(request.body_rows().expect("rows").len(), 1);

        request.body = Some(json!([{"name": "a"}, {"name": "b"}]));
        assert_eq!(request.body_rows().expect("rows").len(), 2);

        request.body = Some(json!([{"name": "a"}, 3]));
        assert!(request.body_rows().is_err());

        request.body = Some(json!("text"));
        assert!(request.body_rows().is_err());

        request.body = None;
        assert!(request.body_rows().is_err());
    }

    #[test]
    fn test_update_body_must_be_object() {
        let mut request = QueryRequest::new(Operation::Update);
        request.body = Some(json!([{"status": "done"}]));
        assert!(matches!(request.body_object(), Err(FlatrestError::Configuration(_))));
    }
}
