use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::cmp::Ordering;

use crate::utils::types::{Filter, FilterOperator, OrderDirection, OrderKey, Row};

/// AND-chain of predicates plus OR-groups, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    filters: Vec<Filter>,
    or_groups: Vec<OrGroup>,
}

/// One `or(...)` string: comma-separated `column.operator.value` clauses
#[derive(Debug, Clone, PartialEq)]
pub struct OrGroup {
    raw: String,
    clauses: Vec<OrClause>,
}

#[derive(Debug, Clone, PartialEq)]
struct OrClause {
    column: String,
    operator: String,
    value: String,
}

/// A filter chain with its patterns compiled, ready to test rows
pub struct CompiledFilters {
    predicates: Vec<CompiledPredicate>,
    groups: Vec<Vec<CompiledClause>>,
}

struct CompiledPredicate {
    filter: Filter,
    pattern: Option<Regex>,
}

enum CompiledClause {
    Eq { column: String, value: String },
    Ilike { column: String, pattern: Option<Regex> },
    Never,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    pub fn push_or(&mut self, raw: &str) {
        self.or_groups.push(OrGroup::parse(raw));
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn or_groups(&self) -> &[OrGroup] {
        &self.or_groups
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.or_groups.is_empty()
    }

    pub fn compile(&self) -> CompiledFilters {
        let predicates = self
            .filters
            .iter()
            .map(|filter| CompiledPredicate {
                pattern: match (filter.operator, &filter.value) {
                    (FilterOperator::Ilike, Value::String(p)) => ilike_regex(p),
                    (FilterOperator::Ilike, other) => ilike_regex(&value_text(other)),
                    _ => None,
                },
                filter: filter.clone(),
            })
            .collect();

        let groups = self
            .or_groups
            .iter()
            .map(|group| group.clauses.iter().map(OrClause::compile).collect())
            .collect();

        CompiledFilters { predicates, groups }
    }

    /// Keep the rows matching every predicate and every OR-group, preserving order
    pub fn apply(&self, rows: Vec<Row>) -> Vec<Row> {
        if self.is_empty() {
            return rows;
        }
        let compiled = self.compile();
        rows.into_iter().filter(|row| compiled.matches(row)).collect()
    }
}

impl OrGroup {
    /// Parse a group string. Clauses without three dot-separated parts are dropped.
    pub fn parse(raw: &str) -> Self {
        let clauses = raw
            .split(',')
            .filter_map(|part| {
                let mut segments = part.trim().splitn(3, '.');
                match (segments.next(), segments.next(), segments.next()) {
                    (Some(column), Some(operator), Some(value)) => Some(OrClause {
                        column: column.to_string(),
                        operator: operator.to_string(),
                        value: value.to_string(),
                    }),
                    _ => None,
                }
            })
            .collect();

        Self {
            raw: raw.to_string(),
            clauses,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }
}

impl OrClause {
    fn compile(&self) -> CompiledClause {
        match self.operator.as_str() {
            "eq" => CompiledClause::Eq {
                column: self.column.clone(),
                value: self.value.clone(),
            },
            "ilike" => CompiledClause::Ilike {
                column: self.column.clone(),
                pattern: ilike_regex(&self.value),
            },
            other => {
                tracing::warn!("Unsupported operator '{}' in OR-group clause on '{}'", other, self.column);
                CompiledClause::Never
            }
        }
    }
}

impl CompiledFilters {
    pub fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
            && self
                .groups
                .iter()
                .all(|clauses| clauses.iter().any(|clause| clause.matches(row)))
    }
}

impl CompiledPredicate {
    fn matches(&self, row: &Row) -> bool {
        let value = column_value(row, &self.filter.column);
        let operand = &self.filter.value;

        match self.filter.operator {
            FilterOperator::Eq => json_eq(value, operand),
            FilterOperator::Neq => !json_eq(value, operand),
            FilterOperator::Gt => compare_present(value, operand) == Some(Ordering::Greater),
            FilterOperator::Gte => matches!(
                compare_present(value, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::Lt => compare_present(value, operand) == Some(Ordering::Less),
            FilterOperator::Lte => matches!(
                compare_present(value, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::In => match operand {
                Value::Array(candidates) => candidates.iter().any(|c| json_eq(value, c)),
                single => json_eq(value, single),
            },
            FilterOperator::Is => {
                if is_null_operand(operand) {
                    value.is_null()
                } else {
                    !value.is_null()
                }
            }
            FilterOperator::NotIs => {
                if is_null_operand(operand) {
                    !value.is_null()
                } else {
                    value.is_null()
                }
            }
            FilterOperator::Ilike => ilike_match(self.pattern.as_ref(), value),
        }
    }
}

impl CompiledClause {
    fn matches(&self, row: &Row) -> bool {
        match self {
            CompiledClause::Eq { column, value } => value_text(column_value(row, column)) == *value,
            CompiledClause::Ilike { column, pattern } => {
                ilike_match(pattern.as_ref(), column_value(row, column))
            }
            CompiledClause::Never => false,
        }
    }
}

/// Field value, with absent fields reading as null
pub fn column_value<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

/// JSON equality where numbers compare by value (`1 == 1.0`)
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(x, y)| json_eq(x, y))
        }
        _ => a == b,
    }
}

/// Ordering of a field against an operand; `None` when the field is null or
/// the two values have no meaningful order
fn compare_present(value: &Value, operand: &Value) -> Option<Ordering> {
    if value.is_null() {
        return None;
    }
    match (value, operand) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn is_null_operand(operand: &Value) -> bool {
    match operand {
        Value::Null => true,
        Value::String(s) => s.eq_ignore_ascii_case("null"),
        _ => false,
    }
}

/// Text form used by `ilike` and OR-group `eq`
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn ilike_match(pattern: Option<&Regex>, value: &Value) -> bool {
    match pattern {
        Some(regex) => is_truthy(value) && regex.is_match(&value_text(value)),
        None => false,
    }
}

/// `%` is a wildcard; everything else matches literally. The match is unanchored.
pub fn ilike_regex(pattern: &str) -> Option<Regex> {
    let translated = pattern
        .split('%')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    match RegexBuilder::new(&translated).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!("Ignoring ilike pattern '{}': {}", pattern, e);
            None
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used for sorting: nulls first, then by type rank, then by value
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(x, y)| compare_values(x, y))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Sort by every key. Keys are applied last to first through a stable sort, so
/// the first key decides and later keys break its ties.
pub fn apply_ordering(rows: &mut [Row], keys: &[OrderKey]) {
    for key in keys.iter().rev() {
        rows.sort_by(|a, b| {
            let ordering = compare_values(column_value(a, &key.column), column_value(b, &key.column));
            match key.direction {
                OrderDirection::Ascending => ordering,
                OrderDirection::Descending => ordering.reverse(),
            }
        });
    }
}

/// Inclusive `range` wins over `limit`
pub fn paginate(mut rows: Vec<Row>, limit: Option<usize>, range: Option<(usize, usize)>) -> Vec<Row> {
    if let Some((start, end)) = range {
        if start > end || start >= rows.len() {
            return Vec::new();
        }
        let end = end.min(rows.len() - 1);
        return rows.into_iter().skip(start).take(end - start + 1).collect();
    }

    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}
