use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::engine::query_executor::id_text;
use crate::storage::JsonStore;
use crate::utils::types::Row;

/// Parsed column-selection spec, e.g. `id, status, vendor_requests(vendor_name, email)`
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    all: bool,
    columns: Vec<String>,
    relations: Vec<RelationTerm>,
}

/// `relation(col1, col2)` inside a column spec
#[derive(Debug, Clone, PartialEq)]
pub struct RelationTerm {
    pub name: String,
    pub columns: Vec<String>,
}

fn relation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\w+)\s*\(([^)]*)\)").expect("relation pattern is valid"))
}

fn split_columns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

impl ColumnSpec {
    pub fn parse(spec: &str) -> Self {
        let mut relations: Vec<RelationTerm> = Vec::new();
        for captures in relation_pattern().captures_iter(spec) {
            let name = captures[1].to_string();
            if relations.iter().any(|r| r.name == name) {
                tracing::warn!("Relation '{}' embedded more than once, keeping the first", name);
                continue;
            }
            relations.push(RelationTerm {
                name,
                columns: split_columns(&captures[2]),
            });
        }

        let remainder = relation_pattern().replace_all(spec, "");
        let columns: Vec<String> = split_columns(&remainder);
        let all = columns.iter().any(|c| c == "*");

        Self {
            all,
            columns: columns.into_iter().filter(|c| c != "*").collect(),
            relations,
        }
    }

    /// True when rows pass through untouched
    pub fn is_passthrough(&self) -> bool {
        self.relations.is_empty() && (self.all || self.columns.is_empty())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn relations(&self) -> &[RelationTerm] {
        &self.relations
    }
}

/// Applies a column spec to the rows of one table
pub struct Projector<'a> {
    store: &'a JsonStore,
    table: &'a str,
    spec: ColumnSpec,
}

impl<'a> Projector<'a> {
    pub fn new(store: &'a JsonStore, table: &'a str, spec: &str) -> Self {
        Self {
            store,
            table,
            spec: ColumnSpec::parse(spec),
        }
    }

    /// Project `rows`. `table_rows` is the full content of `self.table` as
    /// loaded for this call and serves self-referencing relations, whose
    /// table lock is already held.
    pub fn project(&self, rows: Vec<Row>, table_rows: &[Row]) -> Vec<Row> {
        if self.spec.is_passthrough() {
            return rows;
        }

        rows.into_iter()
            .map(|row| self.project_row(&row, table_rows))
            .collect()
    }

    fn project_row(&self, row: &Row, table_rows: &[Row]) -> Row {
        let mut projected = if self.spec.all { row.clone() } else { Row::new() };

        for column in &self.spec.columns {
            if let Some(value) = row.get(column) {
                projected.insert(column.clone(), value.clone());
            }
        }

        for relation in &self.spec.relations {
            let embedded = self.embed(row, relation, table_rows);
            projected.insert(relation.name.clone(), embedded);
        }

        projected
    }

    fn embed(&self, row: &Row, relation: &RelationTerm, table_rows: &[Row]) -> Value {
        let Some(config) = self.store.config().relation(self.table, &relation.name) else {
            tracing::warn!(
                "No relation '{}' configured for table '{}', embedding null",
                relation.name,
                self.table
            );
            return Value::Null;
        };

        let foreign_key = match row.get(&config.foreign_key) {
            Some(value) if !value.is_null() => value,
            _ => return Value::Null,
        };

        let target = config.target_table(&relation.name);
        let related = if target == self.table {
            find_by_id(table_rows, foreign_key).cloned()
        } else {
            match self.store.read_snapshot(target) {
                Ok(outcome) => find_by_id(&outcome.into_rows(), foreign_key).cloned(),
                Err(e) => {
                    tracing::warn!("Cannot embed relation '{}': {}", relation.name, e);
                    None
                }
            }
        };

        match related {
            Some(related) => Value::Object(select_fields(&related, &relation.columns)),
            None => Value::Null,
        }
    }
}

fn find_by_id<'r>(rows: &'r [Row], id: &Value) -> Option<&'r Row> {
    let key = id_text(id)?;
    rows.iter()
        .find(|r| r.get("id").and_then(id_text).as_deref() == Some(key.as_str()))
}

/// Requested fields of an embedded row; `*` keeps them all, missing fields read as null
fn select_fields(row: &Row, columns: &[String]) -> Row {
    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        return row.clone();
    }
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect()
}
