use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::engine::filter::FilterChain;
use crate::engine::query_executor;
use crate::storage::JsonStore;
use crate::utils::{
    error::{FlatrestError, FlatrestResult},
    types::{Filter, FilterOperator, OrderDirection, OrderKey, QueryResult, ResultShape, Row},
};

/// Operation a query performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Upsert,
    Delete,
}

impl FromStr for Operation {
    type Err = FlatrestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "select" => Ok(Operation::Select),
            "insert" => Ok(Operation::Insert),
            "update" => Ok(Operation::Update),
            "upsert" => Ok(Operation::Upsert),
            "delete" => Ok(Operation::Delete),
            other => Err(FlatrestError::Configuration(format!("Unknown operation: {}", other))),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A query bound to a table with no operation chosen yet
pub struct TableQuery {
    store: JsonStore,
    table: String,
}

impl TableQuery {
    pub(crate) fn new(store: JsonStore, table: &str) -> Self {
        Self {
            store,
            table: table.to_string(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Read rows, projecting `columns` (`"*"` for whole rows)
    pub fn select(self, columns: &str) -> SelectQuery {
        SelectQuery {
            store: self.store,
            table: self.table,
            columns: columns.to_string(),
            filters: FilterChain::new(),
            order: Vec::new(),
            limit: None,
            range: None,
            shape: ResultShape::Many,
            count: false,
            head: false,
        }
    }

    pub fn insert(self, rows: Vec<Row>) -> InsertQuery {
        InsertQuery {
            store: self.store,
            table: self.table,
            rows,
        }
    }

    pub fn insert_one(self, row: Row) -> InsertQuery {
        self.insert(vec![row])
    }

    /// Merge `patch` into every row the filters select
    pub fn update(self, patch: Row) -> UpdateQuery {
        UpdateQuery {
            store: self.store,
            table: self.table,
            patch,
            filters: FilterChain::new(),
            shape: ResultShape::Many,
        }
    }

    pub fn upsert(self, rows: Vec<Row>) -> UpsertQuery {
        UpsertQuery {
            store: self.store,
            table: self.table,
            rows,
        }
    }

    pub fn upsert_one(self, row: Row) -> UpsertQuery {
        self.upsert(vec![row])
    }

    pub fn delete(self) -> DeleteQuery {
        DeleteQuery {
            store: self.store,
            table: self.table,
            filters: FilterChain::new(),
        }
    }
}

/// Filter methods shared by the operations that resolve target rows
pub trait Filterable: Sized {
    fn filter_chain_mut(&mut self) -> &mut FilterChain;

    fn filter_chain(&self) -> &FilterChain;

    fn push_filter(mut self, operator: FilterOperator, column: &str, value: Value) -> Self {
        self.filter_chain_mut().push(Filter::new(operator, column, value));
        self
    }

    fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.push_filter(FilterOperator::Eq, column, value.into())
    }

    fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.push_filter(FilterOperator::Neq, column, value.into())
    }

    fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.push_filter(FilterOperator::Gt, column, value.into())
    }

    fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.push_filter(FilterOperator::Gte, column, value.into())
    }

    fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.push_filter(FilterOperator::Lt, column, value.into())
    }

    fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.push_filter(FilterOperator::Lte, column, value.into())
    }

    fn in_<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_filter(FilterOperator::In, column, Value::Array(values))
    }

    /// `is(col, Value::Null)` or `is(col, "null")` keeps rows where `col` is null
    fn is(self, column: &str, value: impl Into<Value>) -> Self {
        self.push_filter(FilterOperator::Is, column, value.into())
    }

    fn not_is(self, column: &str, value: impl Into<Value>) -> Self {
        self.push_filter(FilterOperator::NotIs, column, value.into())
    }

    fn ilike(self, column: &str, pattern: &str) -> Self {
        self.push_filter(FilterOperator::Ilike, column, Value::String(pattern.to_string()))
    }

    /// Generic form taking the operator by name. Unknown operators are ignored.
    fn filter(self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        match operator.parse::<FilterOperator>() {
            Ok(operator) => self.push_filter(operator, column, value.into()),
            Err(e) => {
                tracing::warn!("Ignoring filter on '{}': {}", column, e);
                self
            }
        }
    }

    /// Add an OR-group such as `"name.ilike.%acme%,email.ilike.%acme%"`
    fn or(mut self, group: &str) -> Self {
        self.filter_chain_mut().push_or(group);
        self
    }
}

/// Select query builder
pub struct SelectQuery {
    pub(crate) store: JsonStore,
    pub(crate) table: String,
    pub(crate) columns: String,
    pub(crate) filters: FilterChain,
    pub(crate) order: Vec<OrderKey>,
    pub(crate) limit: Option<usize>,
    pub(crate) range: Option<(usize, usize)>,
    pub(crate) shape: ResultShape,
    pub(crate) count: bool,
    pub(crate) head: bool,
}

impl SelectQuery {
    pub fn order(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order.push(OrderKey {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Inclusive row range after ordering; overrides `limit`
    pub fn range(mut self, start: usize, end: usize) -> Self {
        self.range = Some((start, end));
        self
    }

    /// Require exactly one row
    pub fn single(mut self) -> Self {
        self.shape = ResultShape::Single;
        self
    }

    /// First row or null; extra matches are not an error
    pub fn maybe_single(mut self) -> Self {
        self.shape = ResultShape::MaybeSingle;
        self
    }

    /// Report the exact number of filtered rows before pagination
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Return only the count, no rows
    pub fn head(mut self) -> Self {
        self.head = true;
        self.count = true;
        self
    }

    pub fn execute(&self) -> FlatrestResult<QueryResult> {
        query_executor::execute_select(self)
    }
}

impl Filterable for SelectQuery {
    fn filter_chain_mut(&mut self) -> &mut FilterChain {
        &mut self.filters
    }

    fn filter_chain(&self) -> &FilterChain {
        &self.filters
    }
}

/// Insert query builder
pub struct InsertQuery {
    pub(crate) store: JsonStore,
    pub(crate) table: String,
    pub(crate) rows: Vec<Row>,
}

impl InsertQuery {
    pub fn execute(&self) -> FlatrestResult<QueryResult> {
        query_executor::execute_insert(self)
    }
}

/// Update query builder
pub struct UpdateQuery {
    pub(crate) store: JsonStore,
    pub(crate) table: String,
    pub(crate) patch: Row,
    pub(crate) filters: FilterChain,
    pub(crate) shape: ResultShape,
}

impl UpdateQuery {
    /// Return the first updated row (or null) instead of a sequence
    pub fn single(mut self) -> Self {
        self.shape = ResultShape::Single;
        self
    }

    pub fn maybe_single(mut self) -> Self {
        self.shape = ResultShape::MaybeSingle;
        self
    }

    pub fn execute(&self) -> FlatrestResult<QueryResult> {
        query_executor::execute_update(self)
    }
}

impl Filterable for UpdateQuery {
    fn filter_chain_mut(&mut self) -> &mut FilterChain {
        &mut self.filters
    }

    fn filter_chain(&self) -> &FilterChain {
        &self.filters
    }
}

/// Upsert query builder, keyed by `id`
pub struct UpsertQuery {
    pub(crate) store: JsonStore,
    pub(crate) table: String,
    pub(crate) rows: Vec<Row>,
}

impl UpsertQuery {
    pub fn execute(&self) -> FlatrestResult<QueryResult> {
        query_executor::execute_upsert(self)
    }
}

/// Delete query builder
pub struct DeleteQuery {
    pub(crate) store: JsonStore,
    pub(crate) table: String,
    pub(crate) filters: FilterChain,
}

impl DeleteQuery {
    pub fn execute(&self) -> FlatrestResult<QueryResult> {
        query_executor::execute_delete(self)
    }
}

impl Filterable for DeleteQuery {
    fn filter_chain_mut(&mut self) -> &mut FilterChain {
        &mut self.filters
    }

    fn filter_chain(&self) -> &FilterChain {
        &self.filters
    }
}

/// Any fully-built query, for callers that pick the operation at runtime
pub enum Query {
    Select(SelectQuery),
    Insert(InsertQuery),
    Update(UpdateQuery),
    Upsert(UpsertQuery),
    Delete(DeleteQuery),
}

impl Query {
    pub fn operation(&self) -> Operation {
        match self {
            Query::Select(_) => Operation::Select,
            Query::Insert(_) => Operation::Insert,
            Query::Update(_) => Operation::Update,
            Query::Upsert(_) => Operation::Upsert,
            Query::Delete(_) => Operation::Delete,
        }
    }

    pub fn execute(&self) -> FlatrestResult<QueryResult> {
        match self {
            Query::Select(q) => q.execute(),
            Query::Insert(q) => q.execute(),
            Query::Update(q) => q.execute(),
            Query::Upsert(q) => q.execute(),
            Query::Delete(q) => q.execute(),
        }
    }
}
