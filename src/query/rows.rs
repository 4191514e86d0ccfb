use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::Serialize;

use crate::config::quote_ident;
use crate::error::Result;
use crate::metrics::MetricDescriptor;
use crate::query::builder::PredicateBuilder;
use crate::query::facet::FacetSelection;
use crate::query::predicate::{Column, PredicateList};
use crate::query::scalar::Scalar;
use crate::storage::schema::StoreLayout;
use crate::storage::Database;

/// One relationship as shown in every list view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipRow {
    #[serde(rename = "Pred. ID")]
    pub pred_id: Scalar,
    #[serde(rename = "Succ. ID")]
    pub succ_id: Scalar,
    #[serde(rename = "Pred. Name")]
    pub pred_name: Scalar,
    #[serde(rename = "Succ. Name")]
    pub succ_name: Scalar,
    #[serde(rename = "Relationship type")]
    pub relationship_type: Scalar,
    #[serde(rename = "Lag")]
    pub lag: Scalar,
    #[serde(rename = "Driving")]
    pub driving: Scalar,
    #[serde(rename = "FreeFloat")]
    pub free_float: Scalar,
    #[serde(rename = "Lead")]
    pub lead: Scalar,
    #[serde(rename = "ExcessiveLag")]
    pub excessive_lag: Scalar,
    #[serde(rename = "Relationship_Status")]
    pub status: Scalar,
}

impl RelationshipRow {
    /// Public keys, in projection order.
    pub const HEADERS: [&'static str; 11] = [
        "Pred. ID",
        "Succ. ID",
        "Pred. Name",
        "Succ. Name",
        "Relationship type",
        "Lag",
        "Driving",
        "FreeFloat",
        "Lead",
        "ExcessiveLag",
        "Relationship_Status",
    ];

    fn values(&self) -> [&Scalar; 11] {
        [
            &self.pred_id,
            &self.succ_id,
            &self.pred_name,
            &self.succ_name,
            &self.relationship_type,
            &self.lag,
            &self.driving,
            &self.free_float,
            &self.lead,
            &self.excessive_lag,
            &self.status,
        ]
    }
}

/// Rows matching the metric's list scope, in store order.
pub async fn project(
    db: &Database,
    layout: &StoreLayout,
    descriptor: &MetricDescriptor,
    selection: &FacetSelection,
) -> Result<Vec<RelationshipRow>> {
    let list = PredicateBuilder::new(descriptor, selection).build();
    let table = layout.fact_table.clone();
    db.read(move |conn| rows_sql(conn, &table, &list)).await
}

/// Number of rows `project` would return.
pub async fn count(
    db: &Database,
    layout: &StoreLayout,
    descriptor: &MetricDescriptor,
    selection: &FacetSelection,
) -> Result<u64> {
    let list = PredicateBuilder::new(descriptor, selection).build();
    let table = layout.fact_table.clone();
    db.read(move |conn| super::count_sql(conn, &table, &list)).await
}

pub(crate) fn rows_sql(
    conn: &Connection,
    table: &str,
    list: &PredicateList,
) -> Result<Vec<RelationshipRow>> {
    if list.is_unsatisfiable() {
        return Ok(Vec::new());
    }
    let select: Vec<String> = Column::PROJECTED.iter().map(|c| c.sql()).collect();
    let (where_sql, params) = list.where_sql();
    let sql = format!(
        "SELECT {} FROM {}{where_sql}",
        select.join(", "),
        quote_ident(table)
    );
    log::debug!("{sql}");

    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok(RelationshipRow {
            pred_id: row.get(0)?,
            succ_id: row.get(1)?,
            pred_name: row.get(2)?,
            succ_name: row.get(3)?,
            relationship_type: row.get(4)?,
            lag: row.get(5)?,
            driving: row.get(6)?,
            free_float: row.get(7)?,
            lead: row.get(8)?,
            excessive_lag: row.get(9)?,
            status: row.get(10)?,
        })
    })?;
    let result: std::result::Result<Vec<RelationshipRow>, _> = rows.collect();
    Ok(result?)
}

/// Rows as a pretty-printed JSON array.
pub fn to_json(rows: &[RelationshipRow]) -> Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

/// Rows as CSV with a header line. Null cells are empty.
pub fn to_csv(rows: &[RelationshipRow]) -> String {
    let mut out = RelationshipRow::HEADERS
        .iter()
        .map(|h| csv_escape(h))
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = row
            .values()
            .iter()
            .map(|v| match v {
                Scalar::Null => String::new(),
                other => csv_escape(&other.to_key()),
            })
            .collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

pub(crate) fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::metrics::{Metric, MetricTable};
    use crate::storage::repository::fixtures::{example_store, schedule_store};
    use crate::storage::schema::probe;

    async fn layout(db: &Database, config: &EngineConfig) -> StoreLayout {
        let config = config.clone();
        db.read(move |conn| Ok(probe(conn, &config)?)).await.unwrap()
    }

    fn example_config() -> EngineConfig {
        EngineConfig {
            finish_to_start_types: vec!["FS".into(), "FS-1".into()],
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_leads_rows() {
        let db = example_store().await;
        let config = example_config();
        let layout = layout(&db, &config).await;
        let table = MetricTable::from_config(&config);

        let rows = project(&db, &layout, table.get(Metric::Leads), &FacetSelection::new())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pred_id, Scalar::from("C"));
        assert_eq!(rows[0].lag, Scalar::Integer(-2));
        assert_eq!(rows[0].relationship_type, Scalar::from("FS-1"));
    }

    #[tokio::test]
    async fn test_rows_respect_status_and_facets() {
        let db = schedule_store().await;
        let config = EngineConfig::default();
        let layout = layout(&db, &config).await;
        let table = MetricTable::from_config(&config);

        // Incomplete PR_FS/PR_FS1 rows: A100, A110, A120, A160.
        let all = count(&db, &layout, table.get(Metric::TypicalFs0d), &FacetSelection::new())
            .await
            .unwrap();
        assert_eq!(all, 4);

        let driving = FacetSelection::new().driving("Yes");
        let rows = project(&db, &layout, table.get(Metric::TypicalFs0d), &driving)
            .await
            .unwrap();
        let ids: Vec<String> = rows.iter().map(|r| r.pred_id.to_key()).collect();
        assert_eq!(ids, vec!["A100", "A110"]);
        assert!(rows.iter().all(|r| r.status == Scalar::from("Incomplete")));
    }

    #[tokio::test]
    async fn test_text_lag_filter_matches_numeric_value() {
        let db = schedule_store().await;
        let config = EngineConfig::default();
        let layout = layout(&db, &config).await;
        let table = MetricTable::from_config(&config);

        let selection = FacetSelection::new().lag("10.0");
        let rows = project(&db, &layout, table.get(Metric::Lags), &selection)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pred_id, Scalar::from("A120"));
    }

    #[test]
    fn test_json_uses_public_keys() {
        let row = RelationshipRow {
            pred_id: "A".into(),
            succ_id: "B".into(),
            pred_name: "Dig".into(),
            succ_name: "Pour".into(),
            relationship_type: "PR_FS".into(),
            lag: Scalar::Integer(2),
            driving: "Yes".into(),
            free_float: Scalar::Null,
            lead: Scalar::Null,
            excessive_lag: Scalar::Null,
            status: "Incomplete".into(),
        };
        let json = to_json(std::slice::from_ref(&row)).unwrap();
        assert!(json.contains("\"Pred. ID\": \"A\""));
        assert!(json.contains("\"Relationship type\": \"PR_FS\""));
        assert!(json.contains("\"FreeFloat\": null"));

        let csv = to_csv(&[row]);
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Pred. ID,Succ. ID,"));
        assert_eq!(lines.next().unwrap(), "A,B,Dig,Pour,PR_FS,2,Yes,,,,Incomplete");
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
