//! SELECT statement assembly for managed queries.
//!
//! [`SelectBuilder`] turns a table expression plus optional clauses into a
//! single SELECT statement, then runs it on a [`Connection`]. Clause bodies are
//! copied verbatim; the builder only rejects LIMIT bodies that are not row
//! counts and, in strict mode, clauses whose parentheses could escape their
//! wrapper or columns outside the projection allow-list.

use crate::engine::{Connection, RowSet};
use crate::error::{QueryError, QueryResult};
use crate::parser;

/// Optional clauses of a managed query, borrowed from the model.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectClauses<'a> {
    pub columns: Option<&'a [String]>,
    pub selection: Option<&'a str>,
    pub group_by: Option<&'a str>,
    pub having: Option<&'a str>,
    pub sort_order: Option<&'a str>,
    pub limit: Option<&'a str>,
}

/// Builds and runs SELECT statements over a table expression.
#[derive(Debug, Clone, Default)]
pub struct SelectBuilder {
    tables: String,
    distinct: bool,
    strict: bool,
    projection_allow_list: Option<Vec<String>>,
}

impl SelectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table expression. May be a join, e.g.
    /// `foo LEFT OUTER JOIN bar ON (foo.id = bar.foo_id)`.
    pub fn set_tables(&mut self, tables: impl Into<String>) {
        self.tables = tables.into();
    }

    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    /// In strict mode selection and having text is checked for parenthesis
    /// escapes and projected columns must be in the allow-list, if one is set.
    pub fn set_strict_mode(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn set_projection_allow_list(&mut self, columns: Option<Vec<String>>) {
        self.projection_allow_list = columns;
    }

    pub fn tables(&self) -> &str {
        &self.tables
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Generate the SELECT statement without running it.
    pub fn build_query(&self, clauses: &SelectClauses<'_>) -> QueryResult<String> {
        let selection = non_empty(clauses.selection);
        let group_by = non_empty(clauses.group_by);
        // HAVING only means something for grouped rows
        let having = group_by.and(non_empty(clauses.having));
        let sort_order = non_empty(clauses.sort_order);
        let limit = non_empty(clauses.limit);

        if let Some(limit) = limit {
            parser::check_limit(limit)?;
        }

        if self.strict {
            if let Some(selection) = selection {
                parser::check_balanced("WHERE", selection)?;
            }
            if let Some(having) = having {
                parser::check_balanced("HAVING", having)?;
            }
            self.check_projection(clauses.columns)?;
        }

        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        // Columns
        match clauses.columns {
            Some(columns) if !columns.is_empty() => sql.push_str(&columns.join(", ")),
            _ => sql.push('*'),
        }

        // FROM
        sql.push_str(" FROM ");
        sql.push_str(&self.tables);

        // WHERE - wrapped so the selection binds as one expression
        if let Some(selection) = selection {
            sql.push_str(" WHERE (");
            sql.push_str(selection);
            sql.push(')');
        }

        if let Some(group_by) = group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }

        if let Some(having) = having {
            sql.push_str(" HAVING ");
            sql.push_str(having);
        }

        if let Some(sort_order) = sort_order {
            sql.push_str(" ORDER BY ");
            sql.push_str(sort_order);
        }

        if let Some(limit) = limit {
            sql.push_str(" LIMIT ");
            sql.push_str(limit);
        }

        Ok(sql)
    }

    /// Generate the statement and run it on `conn`, binding `args` positionally.
    pub fn build_and_run<C: Connection + ?Sized>(
        &self,
        conn: &C,
        clauses: &SelectClauses<'_>,
        args: &[String],
    ) -> QueryResult<RowSet> {
        let sql = self.build_query(clauses)?;
        tracing::debug!("Managed query built: {}", sql);
        conn.run_raw(&sql, args)
    }

    fn check_projection(&self, columns: Option<&[String]>) -> QueryResult<()> {
        let (Some(allowed), Some(columns)) = (&self.projection_allow_list, columns) else {
            return Ok(());
        };
        match columns.iter().find(|c| !allowed.contains(c)) {
            Some(column) => Err(QueryError::InvalidColumn(column.clone())),
            None => Ok(()),
        }
    }
}

fn non_empty(clause: Option<&str>) -> Option<&str> {
    clause.filter(|c| !c.trim().is_empty())
}
