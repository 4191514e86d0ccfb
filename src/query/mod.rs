pub mod builder;
pub mod chart;
pub mod facet;
pub mod options;
pub mod predicate;
pub mod rows;
pub mod scalar;

pub use builder::{PredicateBuilder, Scope};
pub use chart::ChartData;
pub use facet::{Facet, FacetSelection};
pub use options::ProjectOption;
pub use predicate::{Column, Operand, Operator, Predicate, PredicateList};
pub use rows::RelationshipRow;
pub use scalar::Scalar;

use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::config::quote_ident;
use crate::error::Result;

/// Row count of `table` under `list`. Unsatisfiable lists never reach the store.
pub(crate) fn count_sql(conn: &Connection, table: &str, list: &PredicateList) -> Result<u64> {
    if list.is_unsatisfiable() {
        return Ok(0);
    }
    let (where_sql, params) = list.where_sql();
    let sql = format!("SELECT COUNT(*) FROM {}{where_sql}", quote_ident(table));
    log::debug!("{sql}");
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
    Ok(count as u64)
}
