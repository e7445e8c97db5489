//! The query model.
//!
//! A [`QueryModel`] is a stored query definition: some bookkeeping metadata
//! plus exactly one clause set, either a [`RawQuery`] (SQL text run verbatim)
//! or a [`ManagedQuery`] (tables and clauses assembled into a SELECT by the
//! connection's statement builder).
//!
//! ```text
//!   QueryModel::new()                 QueryModel::builder()
//!         │                                   │
//!   Uninitialized ──set_raw_query()──► Raw    ├── .raw(..)     ──► Raw
//!         │                                   └── .managed(..) ──► Managed
//!         └────set_managed_query()──► Managed
//! ```
//!
//! The transition happens once. A second `set_*_query` call fails with
//! [`QueryError::InvalidState`] and leaves the model untouched; the builder
//! path cannot fail because its terminal methods consume it.

use crate::cursor::QueryCursor;
use crate::engine::Connection;
use crate::error::{QueryError, QueryResult};
use crate::transpiler::SelectClauses;

/// Wire tag of a model's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Uninitialized,
    Managed,
    Raw,
}

impl QueryType {
    /// Numeric code used in serialized documents.
    pub fn code(self) -> i64 {
        match self {
            QueryType::Uninitialized => 0,
            QueryType::Managed => 1,
            QueryType::Raw => 2,
        }
    }

    /// Map a serialized code back to a type.
    pub fn from_code(code: i64) -> QueryResult<Self> {
        match code {
            0 => Ok(QueryType::Uninitialized),
            1 => Ok(QueryType::Managed),
            2 => Ok(QueryType::Raw),
            other => Err(QueryError::UnsupportedKind(other)),
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryType::Uninitialized => write!(f, "UNINITIALISED"),
            QueryType::Managed => write!(f, "MANAGED"),
            QueryType::Raw => write!(f, "RAW"),
        }
    }
}

/// SQL text executed verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    /// The statement. Must not be `;` terminated.
    pub sql: String,
    /// Values for the `?` placeholders in `sql`, bound as text in order.
    pub args: Vec<String>,
}

impl RawQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// A SELECT described by its clauses.
///
/// Only `tables` is required. Every other clause starts absent and can be
/// added with the chained methods in any combination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedQuery {
    /// Table expression, e.g. `foo, bar` or `foo LEFT OUTER JOIN bar ON (foo.id = bar.foo_id)`.
    pub tables: String,
    pub distinct: bool,
    /// Ask the builder to validate clauses, where the connection supports it.
    pub strict: bool,
    /// Columns to return. `None` returns all columns.
    pub columns: Option<Vec<String>>,
    /// WHERE body without the `WHERE` keyword.
    pub selection: Option<String>,
    /// Values for the `?` placeholders in `selection`, bound as text in order.
    pub selection_args: Vec<String>,
    /// GROUP BY body without the keywords.
    pub group_by: Option<String>,
    /// HAVING body. Ignored unless `group_by` is set.
    pub having: Option<String>,
    /// ORDER BY body without the keywords.
    pub sort_order: Option<String>,
    /// LIMIT body: `count` or `offset, count`.
    pub limit: Option<String>,
}

impl ManagedQuery {
    pub fn new(tables: impl Into<String>) -> Self {
        Self {
            tables: tables.into(),
            ..Default::default()
        }
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the filter and the arguments for its placeholders.
    pub fn selection<I, S>(mut self, selection: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = Some(selection.into());
        self.selection_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn having(mut self, having: impl Into<String>) -> Self {
        self.having = Some(having.into());
        self
    }

    pub fn order_by(mut self, sort_order: impl Into<String>) -> Self {
        self.sort_order = Some(sort_order.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<String>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Borrow the optional clauses in the shape the statement builder takes.
    pub fn clauses(&self) -> SelectClauses<'_> {
        SelectClauses {
            columns: self.columns.as_deref(),
            selection: self.selection.as_deref(),
            group_by: self.group_by.as_deref(),
            having: self.having.as_deref(),
            sort_order: self.sort_order.as_deref(),
            limit: self.limit.as_deref(),
        }
    }
}

/// The clause set a model holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QueryKind {
    #[default]
    Uninitialized,
    Managed(ManagedQuery),
    Raw(RawQuery),
}

impl QueryKind {
    pub fn query_type(&self) -> QueryType {
        match self {
            QueryKind::Uninitialized => QueryType::Uninitialized,
            QueryKind::Managed(_) => QueryType::Managed,
            QueryKind::Raw(_) => QueryType::Raw,
        }
    }
}

/// A serializable query definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryModel {
    version: i32,
    tag: Option<String>,
    comment: Option<String>,
    kind: QueryKind,
}

impl QueryModel {
    /// Create an uninitialised model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a model whose kind is fixed by the terminal call.
    pub fn builder() -> QueryModelBuilder {
        QueryModelBuilder::default()
    }

    pub(crate) fn from_parts(
        version: i32,
        tag: Option<String>,
        comment: Option<String>,
        kind: QueryKind,
    ) -> Self {
        Self {
            version,
            tag,
            comment,
            kind,
        }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = Some(comment.into());
    }

    pub fn clear_tag(&mut self) {
        self.tag = None;
    }

    pub fn clear_comment(&mut self) {
        self.comment = None;
    }

    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    pub fn query_type(&self) -> QueryType {
        self.kind.query_type()
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self.kind, QueryKind::Uninitialized)
    }

    pub fn raw_query(&self) -> Option<&RawQuery> {
        match &self.kind {
            QueryKind::Raw(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn managed_query(&self) -> Option<&ManagedQuery> {
        match &self.kind {
            QueryKind::Managed(managed) => Some(managed),
            _ => None,
        }
    }

    /// Positional arguments of whichever clause set is populated.
    pub fn selection_args(&self) -> &[String] {
        match &self.kind {
            QueryKind::Uninitialized => &[],
            QueryKind::Managed(managed) => &managed.selection_args,
            QueryKind::Raw(raw) => &raw.args,
        }
    }

    /// Configure the model as a raw query. Only the first configuration call succeeds.
    pub fn set_raw_query(&mut self, raw: RawQuery) -> QueryResult<()> {
        self.initialize(QueryKind::Raw(raw))
    }

    /// Configure the model as a managed query. Only the first configuration call succeeds.
    pub fn set_managed_query(&mut self, managed: ManagedQuery) -> QueryResult<()> {
        self.initialize(QueryKind::Managed(managed))
    }

    fn initialize(&mut self, kind: QueryKind) -> QueryResult<()> {
        if self.is_initialized() {
            return Err(QueryError::InvalidState(format!(
                "query parameters can only be set once (model is already {})",
                self.query_type()
            )));
        }
        self.kind = kind;
        Ok(())
    }

    /// Execute the query described by this model.
    ///
    /// Managed queries go through the connection's statement builder, with
    /// strict mode applied only when the connection supports it. Raw queries
    /// run verbatim. The returned cursor is already on its first row.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidState`] for an uninitialised model. Builder and
    /// driver errors are returned as raised.
    pub fn execute<C: Connection + ?Sized>(&self, conn: &C) -> QueryResult<QueryCursor<'_>> {
        let rows = match &self.kind {
            QueryKind::Managed(managed) => {
                let mut builder = conn.new_statement_builder();
                builder.set_tables(managed.tables.as_str());
                builder.set_distinct(managed.distinct);
                if conn.supports_strict_mode() {
                    builder.set_strict_mode(managed.strict);
                }
                builder.build_and_run(conn, &managed.clauses(), &managed.selection_args)?
            }
            QueryKind::Raw(raw) => conn.run_raw(&raw.sql, &raw.args)?,
            QueryKind::Uninitialized => {
                return Err(QueryError::InvalidState(
                    "attempted to execute an uninitialised query model".to_string(),
                ));
            }
        };

        tracing::debug!(
            "Executed {} query model (tag: {}): {} row(s)",
            self.query_type(),
            self.tag().unwrap_or("-"),
            rows.len()
        );

        let mut cursor = QueryCursor::new(rows, self);
        cursor.move_to_first();
        Ok(cursor)
    }
}

/// Builds a [`QueryModel`] whose kind is fixed exactly once, by the terminal call.
#[derive(Debug, Clone, Default)]
pub struct QueryModelBuilder {
    version: i32,
    tag: Option<String>,
    comment: Option<String>,
}

impl QueryModelBuilder {
    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Finish as a raw query.
    pub fn raw(self, raw: RawQuery) -> QueryModel {
        self.finish(QueryKind::Raw(raw))
    }

    /// Finish as a managed query.
    pub fn managed(self, managed: ManagedQuery) -> QueryModel {
        self.finish(QueryKind::Managed(managed))
    }

    fn finish(self, kind: QueryKind) -> QueryModel {
        QueryModel::from_parts(self.version, self.tag, self.comment, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RowSet;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Records every statement it is asked to run.
    struct RecordingConnection {
        strict_supported: bool,
        calls: RefCell<Vec<(String, Vec<String>)>>,
    }

    impl RecordingConnection {
        fn new(strict_supported: bool) -> Self {
            Self {
                strict_supported,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Connection for RecordingConnection {
        fn run_raw(&self, sql: &str, args: &[String]) -> QueryResult<RowSet> {
            self.calls
                .borrow_mut()
                .push((sql.to_string(), args.to_vec()));
            Ok(RowSet::new(
                vec!["n".to_string()],
                vec![vec![serde_json::json!(1)], vec![serde_json::json!(2)]],
            ))
        }

        fn supports_strict_mode(&self) -> bool {
            self.strict_supported
        }
    }

    #[test]
    fn test_fresh_model_is_uninitialised() {
        let model = QueryModel::new();
        assert_eq!(model.query_type(), QueryType::Uninitialized);
        assert!(!model.is_initialized());
        assert!(model.selection_args().is_empty());
    }

    #[test]
    fn test_execute_uninitialised_fails() {
        let conn = RecordingConnection::new(true);
        let err = QueryModel::new().execute(&conn).unwrap_err();
        assert!(matches!(err, QueryError::InvalidState(_)));
        assert!(conn.calls.borrow().is_empty());
    }

    #[test]
    fn test_second_configuration_fails_and_keeps_fields() {
        let mut model = QueryModel::new();
        model
            .set_raw_query(RawQuery::new("SELECT 1").args(["a"]))
            .unwrap();

        let err = model.set_raw_query(RawQuery::new("SELECT 2")).unwrap_err();
        assert!(matches!(err, QueryError::InvalidState(_)));
        let err = model
            .set_managed_query(ManagedQuery::new("t"))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidState(_)));

        let raw = model.raw_query().unwrap();
        assert_eq!(raw.sql, "SELECT 1");
        assert_eq!(raw.args, vec!["a".to_string()]);
        assert!(model.managed_query().is_none());
    }

    #[test]
    fn test_managed_then_raw_fails() {
        let mut model = QueryModel::new();
        model.set_managed_query(ManagedQuery::new("t")).unwrap();
        assert!(model.set_raw_query(RawQuery::new("SELECT 1")).is_err());
        assert_eq!(model.query_type(), QueryType::Managed);
    }

    #[test]
    fn test_metadata_is_independent_of_kind() {
        let mut model = QueryModel::new();
        model.set_tag("before");
        model.set_managed_query(ManagedQuery::new("t")).unwrap();
        model.set_tag("after");
        model.set_version(4);
        model.set_comment("changed twice");
        model.set_comment("changed thrice");

        assert_eq!(model.tag(), Some("after"));
        assert_eq!(model.version(), 4);
        assert_eq!(model.comment(), Some("changed thrice"));
    }

    #[test]
    fn test_metadata_can_be_cleared() {
        let mut model = QueryModel::builder()
            .tag("users.active")
            .comment("active users")
            .raw(RawQuery::new("SELECT 1"));

        model.clear_tag();
        model.clear_comment();
        assert_eq!(model.tag(), None);
        assert_eq!(model.comment(), None);

        let decoded = QueryModel::from_json(&model.to_json().unwrap()).unwrap();
        assert_eq!(decoded, model);
        assert_eq!(decoded.tag(), None);
    }

    #[test]
    fn test_builder_fixes_kind() {
        let model = QueryModel::builder()
            .version(2)
            .tag("users.active")
            .comment("active users")
            .managed(ManagedQuery::new("users").selection("active = ?", ["1"]));

        assert_eq!(model.query_type(), QueryType::Managed);
        assert_eq!(model.version(), 2);
        assert_eq!(model.tag(), Some("users.active"));
        assert_eq!(model.selection_args(), ["1".to_string()]);
    }

    #[test]
    fn test_execute_raw_runs_verbatim() {
        let conn = RecordingConnection::new(true);
        let model =
            QueryModel::builder().raw(RawQuery::new("SELECT n FROM t WHERE n > ?").args(["0"]));

        let cursor = model.execute(&conn).unwrap();
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.count(), 2);
        assert_eq!(
            conn.calls.borrow()[0],
            ("SELECT n FROM t WHERE n > ?".to_string(), vec!["0".to_string()])
        );
    }

    #[test]
    fn test_execute_managed_builds_statement() {
        let conn = RecordingConnection::new(true);
        let model = QueryModel::builder().managed(
            ManagedQuery::new("t")
                .columns(["a", "b"])
                .selection("a = ?", ["5"]),
        );

        let cursor = model.execute(&conn).unwrap();
        assert!(std::ptr::eq(cursor.model(), &model));
        assert_eq!(
            conn.calls.borrow()[0],
            ("SELECT a, b FROM t WHERE (a = ?)".to_string(), vec!["5".to_string()])
        );
    }

    #[test]
    fn test_strict_applied_only_when_supported() {
        let model = QueryModel::builder().managed(
            ManagedQuery::new("t")
                .strict(true)
                .selection("a = 1) OR (1 = 1", Vec::<String>::new()),
        );

        let supported = RecordingConnection::new(true);
        let err = model.execute(&supported).unwrap_err();
        assert!(matches!(err, QueryError::InvalidClause { clause: "WHERE", .. }));
        assert!(supported.calls.borrow().is_empty());

        let unsupported = RecordingConnection::new(false);
        assert!(model.execute(&unsupported).is_ok());
        assert_eq!(
            unsupported.calls.borrow()[0].0,
            "SELECT * FROM t WHERE (a = 1) OR (1 = 1)"
        );
    }

    #[test]
    fn test_model_executes_repeatedly() {
        let conn = RecordingConnection::new(true);
        let model = QueryModel::builder().raw(RawQuery::new("SELECT 1"));
        model.execute(&conn).unwrap();
        model.execute(&conn).unwrap();
        assert_eq!(conn.calls.borrow().len(), 2);
    }

    struct OfflineConnection;

    impl Connection for OfflineConnection {
        fn run_raw(&self, _sql: &str, _args: &[String]) -> QueryResult<RowSet> {
            Err(QueryError::Execution("connection is offline".to_string()))
        }

        fn supports_strict_mode(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_connection_errors_returned_as_raised() {
        let raw = QueryModel::builder().raw(RawQuery::new("SELECT 1"));
        let managed = QueryModel::builder().managed(ManagedQuery::new("t"));
        for model in [raw, managed] {
            match model.execute(&OfflineConnection) {
                Err(QueryError::Execution(message)) => assert_eq!(message, "connection is offline"),
                other => panic!("expected execution error, got {:?}", other.map(|c| c.count())),
            }
        }
    }

    #[test]
    fn test_query_type_codes() {
        for ty in [QueryType::Uninitialized, QueryType::Managed, QueryType::Raw] {
            assert_eq!(QueryType::from_code(ty.code()).unwrap(), ty);
        }
        assert!(matches!(
            QueryType::from_code(3),
            Err(QueryError::UnsupportedKind(3))
        ));
    }
}
