//! JSON encoding of query models.
//!
//! The document is a flat object with stable camelCase field names, so field
//! order never matters and unknown fields are ignored. Every field may be
//! absent or null; both mean "not set".
//!
//! ```json
//! {
//!   "formatVersion": 1,
//!   "queryType": 1,
//!   "version": 3,
//!   "tag": "users.active",
//!   "tables": "users",
//!   "projectionIn": ["id", "name"],
//!   "selection": "active = ?",
//!   "selectionArgs": ["1"],
//!   "distinct": false,
//!   "strict": true
//! }
//! ```
//!
//! `formatVersion` is written by [`encode`] and checked by [`decode`]: absent
//! means version 1, anything newer than [`FORMAT_VERSION`] is rejected. Add a
//! new version here whenever a field is renamed or changes meaning.

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::model::{ManagedQuery, QueryKind, QueryModel, QueryType, RawQuery};

/// Current document format.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format_version: Option<u32>,
    #[serde(default)]
    query_type: Option<i64>,
    #[serde(default)]
    version: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_sql: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    distinct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    strict: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tables: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    projection_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selection_args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    having: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sort_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    limit: Option<String>,
}

impl Document {
    fn from_model(model: &QueryModel) -> Self {
        let mut doc = Document {
            format_version: Some(FORMAT_VERSION),
            query_type: Some(model.query_type().code()),
            version: Some(model.version()),
            tag: model.tag().map(str::to_string),
            comment: model.comment().map(str::to_string),
            ..Default::default()
        };

        match model.kind() {
            QueryKind::Uninitialized => {}
            QueryKind::Raw(raw) => {
                doc.raw_sql = Some(raw.sql.clone());
                doc.selection_args = Some(raw.args.clone());
            }
            QueryKind::Managed(managed) => {
                doc.distinct = Some(managed.distinct);
                doc.strict = Some(managed.strict);
                doc.tables = Some(managed.tables.clone());
                doc.projection_in = managed.columns.clone();
                doc.selection_args = Some(managed.selection_args.clone());
                doc.selection = managed.selection.clone();
                doc.group_by = managed.group_by.clone();
                doc.having = managed.having.clone();
                doc.sort_order = managed.sort_order.clone();
                doc.limit = managed.limit.clone();
            }
        }

        doc
    }

    fn into_model(self) -> QueryResult<QueryModel> {
        let format_version = self.format_version.unwrap_or(1);
        if format_version > FORMAT_VERSION {
            return Err(QueryError::Malformed(format!(
                "format version {} is newer than supported version {}",
                format_version, FORMAT_VERSION
            )));
        }

        // Fields belonging to the other kind are dropped here
        let kind = match QueryType::from_code(self.query_type.unwrap_or(0))? {
            QueryType::Uninitialized => QueryKind::Uninitialized,
            QueryType::Raw => QueryKind::Raw(RawQuery {
                sql: self.raw_sql.unwrap_or_default(),
                args: self.selection_args.unwrap_or_default(),
            }),
            QueryType::Managed => QueryKind::Managed(ManagedQuery {
                tables: self.tables.unwrap_or_default(),
                distinct: self.distinct.unwrap_or(false),
                strict: self.strict.unwrap_or(false),
                columns: self.projection_in,
                selection: self.selection,
                selection_args: self.selection_args.unwrap_or_default(),
                group_by: self.group_by,
                having: self.having,
                sort_order: self.sort_order,
                limit: self.limit,
            }),
        };

        Ok(QueryModel::from_parts(
            self.version.unwrap_or(0),
            self.tag,
            self.comment,
            kind,
        ))
    }
}

/// Encode a model as compact JSON.
pub fn encode(model: &QueryModel) -> QueryResult<String> {
    Ok(serde_json::to_string(&Document::from_model(model))?)
}

/// Encode a model as indented JSON.
pub fn encode_pretty(model: &QueryModel) -> QueryResult<String> {
    Ok(serde_json::to_string_pretty(&Document::from_model(model))?)
}

/// Decode a model from JSON.
///
/// # Errors
///
/// [`QueryError::Malformed`] when the text is not a query model document,
/// [`QueryError::UnsupportedKind`] when `queryType` is not 0, 1 or 2.
pub fn decode(json: &str) -> QueryResult<QueryModel> {
    let doc: Document =
        serde_json::from_str(json).map_err(|e| QueryError::Malformed(e.to_string()))?;
    doc.into_model()
}

impl QueryModel {
    /// The JSON representation of this model. [`QueryModel::from_json`] reverses it.
    pub fn to_json(&self) -> QueryResult<String> {
        encode(self)
    }

    pub fn to_json_pretty(&self) -> QueryResult<String> {
        encode_pretty(self)
    }

    /// Rebuild a model from its JSON representation.
    pub fn from_json(json: &str) -> QueryResult<Self> {
        decode(json)
    }
}
