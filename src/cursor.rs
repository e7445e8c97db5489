//! Result cursor returned by [`QueryModel::execute`](crate::model::QueryModel::execute).
//!
//! The cursor owns the materialized rows and borrows the model that produced
//! them. Positions follow the usual cursor convention: `-1` is before the
//! first row and `count()` is after the last one.

use crate::engine::RowSet;
use crate::error::{QueryError, QueryResult};
use crate::model::QueryModel;

use serde_json::Value;

/// A positioned cursor over query results.
#[derive(Debug, Clone)]
pub struct QueryCursor<'m> {
    rows: RowSet,
    position: isize,
    model: &'m QueryModel,
}

impl<'m> QueryCursor<'m> {
    pub(crate) fn new(rows: RowSet, model: &'m QueryModel) -> Self {
        Self {
            rows,
            position: -1,
            model,
        }
    }

    /// The model this cursor was produced from.
    pub fn model(&self) -> &'m QueryModel {
        self.model
    }

    pub fn columns(&self) -> &[String] {
        &self.rows.columns
    }

    pub fn rows(&self) -> &RowSet {
        &self.rows
    }

    pub fn into_rows(self) -> RowSet {
        self.rows
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn position(&self) -> isize {
        self.position
    }

    pub fn is_before_first(&self) -> bool {
        self.count() == 0 || self.position < 0
    }

    pub fn is_after_last(&self) -> bool {
        self.count() == 0 || self.position >= self.count() as isize
    }

    /// Move to `position`, clamped to the before-first/after-last sentinels.
    /// Returns whether the cursor now sits on a row.
    pub fn move_to_position(&mut self, position: isize) -> bool {
        let count = self.count() as isize;
        self.position = position.clamp(-1, count);
        self.position >= 0 && self.position < count
    }

    pub fn move_to_first(&mut self) -> bool {
        self.move_to_position(0)
    }

    pub fn move_to_last(&mut self) -> bool {
        self.move_to_position(self.count() as isize - 1)
    }

    pub fn move_to_next(&mut self) -> bool {
        self.move_to_position(self.position + 1)
    }

    pub fn move_to_previous(&mut self) -> bool {
        self.move_to_position(self.position - 1)
    }

    /// Index of `column` in the result, if present.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.rows.columns.iter().position(|c| c == column)
    }

    /// The row under the cursor.
    pub fn current_row(&self) -> Option<&[Value]> {
        usize::try_from(self.position)
            .ok()
            .and_then(|i| self.rows.rows.get(i))
            .map(Vec::as_slice)
    }

    /// Raw value of `column` in the current row.
    pub fn get_value(&self, column: &str) -> QueryResult<&Value> {
        let index = self
            .column_index(column)
            .ok_or_else(|| QueryError::ColumnNotFound(column.to_string()))?;
        let row = self.current_row().ok_or(QueryError::NoCurrentRow)?;
        row.get(index)
            .ok_or_else(|| QueryError::ColumnNotFound(column.to_string()))
    }

    /// Text value of `column`. `None` for SQL NULL; numbers and booleans are rendered.
    pub fn get_string(&self, column: &str) -> QueryResult<Option<String>> {
        match self.get_value(column)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            Value::Number(n) => Ok(Some(n.to_string())),
            _ => Err(QueryError::mismatch(column, "text")),
        }
    }

    /// Integer value of `column`. Numeric text is parsed.
    pub fn get_i64(&self, column: &str) -> QueryResult<Option<i64>> {
        match self.get_value(column)? {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| QueryError::mismatch(column, "integer")),
            Value::Bool(b) => Ok(Some(i64::from(*b))),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| QueryError::mismatch(column, "integer")),
            _ => Err(QueryError::mismatch(column, "integer")),
        }
    }

    /// Floating point value of `column`. Numeric text is parsed.
    pub fn get_f64(&self, column: &str) -> QueryResult<Option<f64>> {
        match self.get_value(column)? {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| QueryError::mismatch(column, "real")),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| QueryError::mismatch(column, "real")),
            _ => Err(QueryError::mismatch(column, "real")),
        }
    }

    /// Boolean value of `column`. SQLite stores booleans as integers, so any
    /// non-zero number is `true`; the text forms `true`/`false`/`1`/`0` are accepted.
    pub fn get_bool(&self, column: &str) -> QueryResult<Option<bool>> {
        match self.get_value(column)? {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            Value::Number(n) => Ok(Some(n.as_f64().is_some_and(|v| v != 0.0))),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                _ => Err(QueryError::mismatch(column, "boolean")),
            },
            _ => Err(QueryError::mismatch(column, "boolean")),
        }
    }

    /// Like [`get_string`](Self::get_string) but falls back to `default`
    /// when the column is missing, NULL or unreadable.
    pub fn opt_string(&self, column: &str, default: &str) -> String {
        self.get_string(column)
            .ok()
            .flatten()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn opt_i64(&self, column: &str, default: i64) -> i64 {
        self.get_i64(column).ok().flatten().unwrap_or(default)
    }

    pub fn opt_f64(&self, column: &str, default: f64) -> f64 {
        self.get_f64(column).ok().flatten().unwrap_or(default)
    }

    pub fn opt_bool(&self, column: &str, default: bool) -> bool {
        self.get_bool(column).ok().flatten().unwrap_or(default)
    }
}
