use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// A single table record: a JSON object with field order preserved
pub type Row = Map<String, Value>;

/// Outcome of reading a table file from disk
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The file existed and held a JSON array of objects
    Loaded(Vec<Row>),
    /// No file for this table yet
    Missing,
    /// The file exists but could not be read or parsed
    Corrupt { reason: String },
}

impl LoadOutcome {
    /// Rows of the table; missing and corrupt tables read as empty
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            LoadOutcome::Loaded(rows) => rows,
            LoadOutcome::Missing | LoadOutcome::Corrupt { .. } => Vec::new(),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, LoadOutcome::Corrupt { .. })
    }
}

/// Filter operators supported by the AND-chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Is,
    NotIs,
    Ilike,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
            FilterOperator::Is => "is",
            FilterOperator::NotIs => "not_is",
            FilterOperator::Ilike => "ilike",
        }
    }
}

impl FromStr for FilterOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(FilterOperator::Eq),
            "neq" => Ok(FilterOperator::Neq),
            "gt" => Ok(FilterOperator::Gt),
            "gte" => Ok(FilterOperator::Gte),
            "lt" => Ok(FilterOperator::Lt),
            "lte" => Ok(FilterOperator::Lte),
            "in" => Ok(FilterOperator::In),
            "is" => Ok(FilterOperator::Is),
            "not_is" | "notIs" => Ok(FilterOperator::NotIs),
            "ilike" => Ok(FilterOperator::Ilike),
            other => Err(format!("unknown filter operator '{}'", other)),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One predicate of the AND-chain
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub operator: FilterOperator,
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn new(operator: FilterOperator, column: &str, value: Value) -> Self {
        Self {
            operator,
            column: column.to_string(),
            value,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

impl OrderDirection {
    pub fn from_desc(desc: bool) -> Self {
        if desc {
            OrderDirection::Descending
        } else {
            OrderDirection::Ascending
        }
    }
}

/// Column ordering specification
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub column: String,
    pub direction: OrderDirection,
}

/// How many rows the caller expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultShape {
    #[default]
    Many,
    Single,
    MaybeSingle,
}

/// Payload of a query result
#[derive(Debug, Clone, PartialEq)]
pub enum ResultData {
    Rows(Vec<Row>),
    Row(Row),
    Null,
}

/// Query execution result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub data: ResultData,
    pub count: Option<usize>,
}

impl QueryResult {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            data: ResultData::Rows(rows),
            count: None,
        }
    }

    pub fn with_count(mut self, count: Option<usize>) -> Self {
        self.count = count;
        self
    }

    /// Rows carried by this result, whatever its shape
    pub fn data_rows(&self) -> Vec<&Row> {
        match &self.data {
            ResultData::Rows(rows) => rows.iter().collect(),
            ResultData::Row(row) => vec![row],
            ResultData::Null => Vec::new(),
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self.data {
            ResultData::Rows(rows) => rows,
            ResultData::Row(row) => vec![row],
            ResultData::Null => Vec::new(),
        }
    }

    pub fn single_row(&self) -> Option<&Row> {
        match &self.data {
            ResultData::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.data, ResultData::Null)
    }

    /// Number of rows carried in `data`
    pub fn row_count(&self) -> usize {
        self.data_rows().len()
    }

    /// `{"data": ..., "count": ...}` as an HTTP layer would send it
    pub fn to_json(&self) -> Value {
        let data = match &self.data {
            ResultData::Rows(rows) => Value::Array(rows.iter().cloned().map(Value::Object).collect()),
            ResultData::Row(row) => Value::Object(row.clone()),
            ResultData::Null => Value::Null,
        };
        json!({ "data": data, "count": self.count })
    }
}
