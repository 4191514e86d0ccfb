use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::query::predicate::Column;

/// The precomputed KPI view, when the store has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiView {
    pub name: String,
    pub columns: Vec<String>,
}

impl KpiView {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }
}

/// The project reference table and the columns the catalog reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectTable {
    pub name: String,
    pub id_column: String,
    pub name_column: String,
}

/// What the store actually provides, probed once when the engine starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreLayout {
    pub fact_table: String,
    /// Empty when the fact table is missing.
    pub fact_columns: Vec<String>,
    pub project_table: Option<ProjectTable>,
    pub kpi_view: Option<KpiView>,
}

impl StoreLayout {
    pub fn has_fact_table(&self) -> bool {
        !self.fact_columns.is_empty()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.fact_columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(column.name()))
    }

    /// Older stores predate the project column.
    pub fn has_project_column(&self) -> bool {
        self.has_column(Column::ProjectId)
    }
}

/// Probe the fact table, the project reference table, and the KPI view.
/// SQLite names are case-insensitive, so one lookup per object covers every
/// spelling a store may use.
pub fn probe(conn: &Connection, config: &EngineConfig) -> Result<StoreLayout, rusqlite::Error> {
    let fact_columns = match resolve_name(conn, &config.fact_table)? {
        Some(name) => table_columns(conn, &name)?,
        None => Vec::new(),
    };

    let project_table = match resolve_name(conn, &config.project_table)? {
        Some(name) => {
            let columns = table_columns(conn, &name)?;
            let has = |wanted: &str| columns.iter().any(|c| c.eq_ignore_ascii_case(wanted));
            (has(&config.project_id_column) && has(&config.project_name_column)).then(|| {
                ProjectTable {
                    name,
                    id_column: config.project_id_column.clone(),
                    name_column: config.project_name_column.clone(),
                }
            })
        }
        None => None,
    };

    let kpi_view = match resolve_name(conn, &config.kpi_view)? {
        Some(name) => {
            let columns = table_columns(conn, &name)?;
            Some(KpiView { name, columns })
        }
        None => None,
    };

    Ok(StoreLayout {
        fact_table: config.fact_table.clone(),
        fact_columns,
        project_table,
        kpi_view,
    })
}

/// The stored spelling of a table or view name, if it exists.
fn resolve_name(conn: &Connection, name: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT name FROM sqlite_master
         WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE
         ORDER BY type LIMIT 1",
        params![name],
        |row| row.get(0),
    )
    .optional()
}

fn table_columns(conn: &Connection, name: &str) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let rows = stmt.query_map(params![name], |row| row.get(0))?;
    rows.collect()
}
