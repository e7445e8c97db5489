//! # querydef: stored query definitions
//!
//! A [`QueryModel`](model::QueryModel) describes one query, either as raw SQL
//! or as managed clauses (tables, projection, filter, grouping, ordering,
//! limit), and can be stored as JSON independently of the code that runs it.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use querydef::prelude::*;
//!
//! # fn main() -> Result<(), QueryError> {
//! let model = QueryModel::builder()
//!     .version(1)
//!     .tag("users.active")
//!     .managed(
//!         ManagedQuery::new("users")
//!             .columns(["id", "email"])
//!             .selection("active = ?", ["1"])
//!             .order_by("id DESC")
//!             .limit("10"),
//!     );
//!
//! // Store it...
//! let json = model.to_json()?;
//!
//! // ...and run it later.
//! let conn = SqlxConnection::connect("sqlite://app.db")?;
//! let stored = QueryModel::from_json(&json)?;
//! let mut cursor = stored.execute(&conn)?;
//! while !cursor.is_after_last() {
//!     println!("{:?}", cursor.get_string("email")?);
//!     cursor.move_to_next();
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Query kinds
//!
//! | Kind          | Set by                              | Executed as                  |
//! |---------------|-------------------------------------|------------------------------|
//! | Uninitialised | [`QueryModel::new`](model::QueryModel::new) | error                  |
//! | Managed       | `set_managed_query` / `builder().managed(..)` | `SELECT` from the builder |
//! | Raw           | `set_raw_query` / `builder().raw(..)`         | the SQL text, verbatim   |

pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod transpiler;
pub mod wire;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::cursor::QueryCursor;
    pub use crate::engine::{Connection, ConnectionOptions, RowSet, SqlxConnection};
    pub use crate::error::*;
    pub use crate::model::{
        ManagedQuery, QueryKind, QueryModel, QueryModelBuilder, QueryType, RawQuery,
    };
    pub use crate::transpiler::{SelectBuilder, SelectClauses};
}

/// Decode a query model from its JSON representation.
///
/// # Example
///
/// ```
/// use querydef::{parse, model::QueryType};
///
/// let model = parse(r#"{"queryType":2,"rawSql":"SELECT 1"}"#).unwrap();
/// assert_eq!(model.query_type(), QueryType::Raw);
/// ```
pub fn parse(json: &str) -> Result<model::QueryModel, error::QueryError> {
    wire::decode(json)
}
