use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Instant;
use uuid::Uuid;

use crate::engine::filter;
use crate::engine::projection::Projector;
use crate::engine::query_builder::{DeleteQuery, InsertQuery, SelectQuery, UpdateQuery, UpsertQuery};
use crate::utils::{
    error::{FlatrestResult, QueryError},
    types::{QueryResult, ResultData, ResultShape, Row},
};

const ID: &str = "id";
const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";

/// Current time as stored in `created_at` / `updated_at`
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// `now`, or one microsecond past the row's previous `updated_at` when that is
/// not earlier than `now`, so every refresh strictly advances the stamp
fn refreshed_timestamp(previous: Option<&Value>, now: &str) -> String {
    let previous = previous
        .and_then(Value::as_str)
        .and_then(|p| DateTime::parse_from_rfc3339(p).ok());
    match (previous, DateTime::parse_from_rfc3339(now)) {
        (Some(previous), Ok(current)) if previous >= current => {
            let advanced = previous.with_timezone(&Utc) + Duration::microseconds(1);
            advanced.to_rfc3339_opts(SecondsFormat::Micros, false)
        }
        _ => now.to_string(),
    }
}

fn has_id(row: &Row) -> bool {
    !matches!(row.get(ID), None | Some(Value::Null))
}

/// Identity of an `id` value: its text form, so `7` and `"7"` name the same row
pub(crate) fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn id_key(row: &Row) -> Option<String> {
    row.get(ID).and_then(id_text)
}

/// Shallow merge; `id`, `created_at` and `updated_at` are owned by the engine
fn merge_patch(row: &mut Row, patch: &Row) {
    for (key, value) in patch {
        if key == ID || key == CREATED_AT || key == UPDATED_AT {
            continue;
        }
        row.insert(key.clone(), value.clone());
    }
}

/// Give a new row its id and timestamps where the caller left them out
fn stamp_new_row(row: &mut Row, now: &str) {
    if !has_id(row) {
        row.insert(ID.to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    if !row.contains_key(CREATED_AT) {
        row.insert(CREATED_AT.to_string(), Value::String(now.to_string()));
    }
}

fn shaped(rows: Vec<Row>, shape: ResultShape) -> ResultData {
    match shape {
        ResultShape::Many => ResultData::Rows(rows),
        ResultShape::Single | ResultShape::MaybeSingle => {
            rows.into_iter().next().map(ResultData::Row).unwrap_or(ResultData::Null)
        }
    }
}

pub(crate) fn execute_select(query: &SelectQuery) -> FlatrestResult<QueryResult> {
    let start = Instant::now();
    let store = &query.store;

    store.with_table(&query.table, |handle| {
        let rows = handle.load().into_rows();
        let compiled = query.filters.compile();
        let mut matched: Vec<Row> = rows.iter().filter(|row| compiled.matches(row)).cloned().collect();

        let count = if query.count { Some(matched.len()) } else { None };

        if query.head {
            tracing::debug!("select head on '{}': count {:?}", query.table, count);
            return Ok(QueryResult {
                data: ResultData::Null,
                count,
            });
        }

        filter::apply_ordering(&mut matched, &query.order);
        let page = filter::paginate(matched, query.limit, query.range);
        let projected = Projector::new(store, &query.table, &query.columns).project(page, &rows);

        tracing::debug!(
            "select on '{}': {} of {} rows in {:?}",
            query.table,
            projected.len(),
            rows.len(),
            start.elapsed()
        );

        let data = match query.shape {
            ResultShape::Many => ResultData::Rows(projected),
            ResultShape::Single => {
                if projected.len() != 1 {
                    return Err(QueryError::RowCount {
                        expected: 1,
                        found: projected.len(),
                    }
                    .into());
                }
                shaped(projected, ResultShape::Single)
            }
            ResultShape::MaybeSingle => shaped(projected, ResultShape::MaybeSingle),
        };

        Ok(QueryResult { data, count })
    })
}

pub(crate) fn execute_insert(query: &InsertQuery) -> FlatrestResult<QueryResult> {
    query.store.with_table(&query.table, |handle| {
        let mut rows = handle.load().into_rows();
        let mut ids: HashSet<String> = rows.iter().filter_map(id_key).collect();
        let now = now_timestamp();

        let mut inserted = Vec::with_capacity(query.rows.len());
        for candidate in &query.rows {
            let mut row = candidate.clone();
            stamp_new_row(&mut row, &now);
            if !row.contains_key(UPDATED_AT) {
                row.insert(UPDATED_AT.to_string(), Value::String(now.clone()));
            }

            if let Some(id) = id_key(&row) {
                if !ids.insert(id.clone()) {
                    return Err(QueryError::Conflict(id).into());
                }
            }
            inserted.push(row);
        }

        rows.extend(inserted.iter().cloned());
        handle.save(&rows)?;

        tracing::debug!("insert into '{}': {} rows", query.table, inserted.len());
        Ok(QueryResult::rows(inserted))
    })
}

pub(crate) fn execute_update(query: &UpdateQuery) -> FlatrestResult<QueryResult> {
    query.store.with_table(&query.table, |handle| {
        let mut rows = handle.load().into_rows();
        let compiled = query.filters.compile();
        let now = now_timestamp();

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| compiled.matches(row)) {
            merge_patch(row, &query.patch);
            let stamp = refreshed_timestamp(row.get(UPDATED_AT), &now);
            row.insert(UPDATED_AT.to_string(), Value::String(stamp));
            updated.push(row.clone());
        }

        if !updated.is_empty() {
            handle.save(&rows)?;
        }

        tracing::debug!("update on '{}': {} rows", query.table, updated.len());
        Ok(QueryResult {
            data: shaped(updated, query.shape),
            count: None,
        })
    })
}

pub(crate) fn execute_upsert(query: &UpsertQuery) -> FlatrestResult<QueryResult> {
    query.store.with_table(&query.table, |handle| {
        let mut rows = handle.load().into_rows();
        let now = now_timestamp();

        let mut affected = Vec::with_capacity(query.rows.len());
        for candidate in &query.rows {
            let existing = id_key(candidate)
                .and_then(|key| rows.iter().position(|row| id_key(row).as_deref() == Some(key.as_str())));

            match existing {
                Some(index) => {
                    let row = &mut rows[index];
                    merge_patch(row, candidate);
                    let stamp = refreshed_timestamp(row.get(UPDATED_AT), &now);
                    row.insert(UPDATED_AT.to_string(), Value::String(stamp));
                    affected.push(row.clone());
                }
                None => {
                    let mut row = candidate.clone();
                    stamp_new_row(&mut row, &now);
                    row.insert(UPDATED_AT.to_string(), Value::String(now.clone()));
                    rows.push(row.clone());
                    affected.push(row);
                }
            }
        }

        handle.save(&rows)?;

        tracing::debug!("upsert into '{}': {} rows", query.table, affected.len());
        Ok(QueryResult::rows(affected))
    })
}

pub(crate) fn execute_delete(query: &DeleteQuery) -> FlatrestResult<QueryResult> {
    query.store.with_table(&query.table, |handle| {
        let rows = handle.load().into_rows();
        let compiled = query.filters.compile();

        let (deleted, remaining): (Vec<Row>, Vec<Row>) =
            rows.into_iter().partition(|row| compiled.matches(row));

        if !deleted.is_empty() {
            handle.save(&remaining)?;
        }

        tracing::debug!("delete from '{}': {} rows", query.table, deleted.len());
        Ok(QueryResult::rows(deleted))
    })
}
