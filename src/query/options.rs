use std::collections::HashMap;

use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::Serialize;

use crate::config::quote_ident;
use crate::error::Result;
use crate::metrics::MetricDescriptor;
use crate::query::builder::PredicateBuilder;
use crate::query::facet::{Facet, FacetSelection};
use crate::query::predicate::{Predicate, PredicateList};
use crate::query::scalar::{lexical_order, numeric_order, Scalar};
use crate::storage::schema::{ProjectTable, StoreLayout};
use crate::storage::Database;

/// A selectable project with its display name, when the store has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectOption {
    pub id: String,
    pub name: Option<String>,
}

/// Distinct values of `facet` still reachable under the metric's list scope
/// and every other selected facet. The facet's own selection is released.
pub async fn options(
    db: &Database,
    layout: &StoreLayout,
    descriptor: &MetricDescriptor,
    facet: Facet,
    selection: &FacetSelection,
) -> Result<Vec<Scalar>> {
    if facet == Facet::Project && !layout.has_project_column() {
        log::debug!("{}: store has no project column", descriptor.metric);
        return Ok(Vec::new());
    }

    let released = selection.without(facet);
    let mut list = PredicateBuilder::new(descriptor, &released).build();
    list.push(Predicate::present(facet.column()));
    let table = layout.fact_table.clone();

    let mut values = db
        .read(move |conn| distinct_sql(conn, &table, facet, &list))
        .await?;

    if facet.is_numeric() {
        values = values.into_iter().map(Scalar::normalized).collect();
        values.sort_by(numeric_order);
    } else {
        values.sort_by(lexical_order);
    }
    values.dedup_by(|a, b| a.to_key() == b.to_key());
    Ok(values)
}

/// The project facet, with short names from the project reference table.
pub async fn projects(
    db: &Database,
    layout: &StoreLayout,
    descriptor: &MetricDescriptor,
    selection: &FacetSelection,
) -> Result<Vec<ProjectOption>> {
    let ids = options(db, layout, descriptor, Facet::Project, selection).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let names = match layout.project_table.clone() {
        Some(table) => db.read(move |conn| project_names_sql(conn, &table)).await?,
        None => HashMap::new(),
    };

    Ok(ids
        .into_iter()
        .map(|id| {
            let id = id.to_key();
            ProjectOption {
                name: names.get(&id).cloned(),
                id,
            }
        })
        .collect())
}

fn distinct_sql(
    conn: &Connection,
    table: &str,
    facet: Facet,
    list: &PredicateList,
) -> Result<Vec<Scalar>> {
    if list.is_unsatisfiable() {
        return Ok(Vec::new());
    }
    let column = facet.column().sql();
    let (where_sql, params) = list.where_sql();
    let sql = format!("SELECT DISTINCT {column} FROM {}{where_sql}", quote_ident(table));
    log::debug!("{sql}");

    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| row.get::<_, Scalar>(0))?;
    let mut values = Vec::new();
    for value in rows {
        let value = value?;
        if !value.is_missing() {
            values.push(value);
        }
    }
    Ok(values)
}

fn project_names_sql(conn: &Connection, table: &ProjectTable) -> Result<HashMap<String, String>> {
    let sql = format!(
        "SELECT {}, {} FROM {}",
        quote_ident(&table.id_column),
        quote_ident(&table.name_column),
        quote_ident(&table.name)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, Scalar>(0)?, row.get::<_, Scalar>(1)?))
    })?;
    let mut names = HashMap::new();
    for row in rows {
        let (id, name) = row?;
        if !id.is_missing() && !name.is_missing() {
            names.insert(id.to_key(), name.to_key());
        }
    }
    Ok(names)
}
