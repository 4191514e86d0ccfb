use std::collections::BTreeMap;

use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::config::quote_ident;
use crate::error::Result;
use crate::metrics::MetricDescriptor;
use crate::query::builder::{PredicateBuilder, Scope};
use crate::query::facet::FacetSelection;
use crate::query::predicate::{Column, PredicateList};
use crate::query::scalar::{numeric_order, Scalar};
use crate::storage::schema::StoreLayout;
use crate::storage::Database;

/// Counts per lag value, each broken down by relationship type.
///
/// Lags are ordered numerically with unparseable values last; types within
/// a lag are ordered lexically. Serializes as `{lag: {type: count}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartData {
    series: Vec<(Scalar, BTreeMap<String, u64>)>,
}

impl ChartData {
    fn from_groups(groups: Vec<(Scalar, Scalar, u64)>) -> Self {
        // "10", "10.0" and 10 land in the same bucket
        let mut groups: Vec<(Scalar, Scalar, u64)> = groups
            .into_iter()
            .map(|(lag, relationship_type, count)| (lag.normalized(), relationship_type, count))
            .collect();
        groups.sort_by(|a, b| numeric_order(&a.0, &b.0));
        let mut series: Vec<(Scalar, BTreeMap<String, u64>)> = Vec::new();
        for (lag, relationship_type, count) in groups {
            let same_lag = series
                .last()
                .is_some_and(|(last, _)| last.to_key() == lag.to_key());
            if !same_lag {
                series.push((lag, BTreeMap::new()));
            }
            if let Some((_, bucket)) = series.last_mut() {
                *bucket.entry(relationship_type.to_key()).or_insert(0) += count;
            }
        }
        Self { series }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Lag keys in chart order.
    pub fn lags(&self) -> Vec<String> {
        self.series.iter().map(|(lag, _)| lag.to_key()).collect()
    }

    pub fn get(&self, lag: &str, relationship_type: &str) -> Option<u64> {
        self.series
            .iter()
            .find(|(l, _)| l.to_key() == lag)
            .and_then(|(_, bucket)| bucket.get(relationship_type).copied())
    }

    /// Sum over every bucket; equals the metric's live subset count.
    pub fn total(&self) -> u64 {
        self.series
            .iter()
            .flat_map(|(_, bucket)| bucket.values())
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (String, &BTreeMap<String, u64>)> {
        self.series.iter().map(|(lag, bucket)| (lag.to_key(), bucket))
    }
}

impl Serialize for ChartData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.series.len()))?;
        for (lag, bucket) in &self.series {
            map.serialize_entry(&lag.to_key(), bucket)?;
        }
        map.end()
    }
}

/// Subset rows grouped by (lag, relationship type).
pub async fn chart(
    db: &Database,
    layout: &StoreLayout,
    descriptor: &MetricDescriptor,
    selection: &FacetSelection,
) -> Result<ChartData> {
    let list = PredicateBuilder::new(descriptor, selection)
        .scope(Scope::Subset)
        .build();
    let table = layout.fact_table.clone();
    let groups = db
        .read(move |conn| {
            group_sql(conn, &table, &[Column::Lag, Column::RelationshipType], &list)
        })
        .await?;

    Ok(ChartData::from_groups(
        groups
            .into_iter()
            .filter_map(|(mut keys, count)| {
                let relationship_type = keys.pop()?;
                let lag = keys.pop()?;
                Some((lag, relationship_type, count))
            })
            .collect(),
    ))
}

/// Listed rows per relationship type.
pub async fn type_counts(
    db: &Database,
    layout: &StoreLayout,
    descriptor: &MetricDescriptor,
    selection: &FacetSelection,
) -> Result<BTreeMap<String, u64>> {
    let list = PredicateBuilder::new(descriptor, selection).build();
    let table = layout.fact_table.clone();
    let groups = db
        .read(move |conn| group_sql(conn, &table, &[Column::RelationshipType], &list))
        .await?;

    let mut counts = BTreeMap::new();
    for (keys, count) in groups {
        if let Some(relationship_type) = keys.first() {
            *counts.entry(relationship_type.to_key()).or_insert(0) += count;
        }
    }
    Ok(counts)
}

fn group_sql(
    conn: &Connection,
    table: &str,
    columns: &[Column],
    list: &PredicateList,
) -> Result<Vec<(Vec<Scalar>, u64)>> {
    if list.is_unsatisfiable() {
        return Ok(Vec::new());
    }
    let group: Vec<String> = columns.iter().map(|c| c.sql()).collect();
    let group = group.join(", ");
    let (where_sql, params) = list.where_sql();
    let sql = format!(
        "SELECT {group}, COUNT(*) FROM {}{where_sql} GROUP BY {group}",
        quote_ident(table)
    );
    log::debug!("{sql}");

    let width = columns.len();
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        let mut keys = Vec::with_capacity(width);
        for i in 0..width {
            keys.push(row.get::<_, Scalar>(i)?);
        }
        let count: i64 = row.get(width)?;
        Ok((keys, count as u64))
    })?;
    let result: std::result::Result<Vec<_>, _> = rows.collect();
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::metrics::{Metric, MetricTable};
    use crate::storage::repository::fixtures::schedule_store;
    use crate::storage::schema::probe;

    async fn setup(db: &Database) -> (StoreLayout, MetricTable) {
        let config = EngineConfig::default();
        let table = MetricTable::from_config(&config);
        let layout = db.read(move |conn| Ok(probe(conn, &config)?)).await.unwrap();
        (layout, table)
    }

    #[test]
    fn test_groups_order_and_merge() {
        let chart = ChartData::from_groups(vec![
            (Scalar::from("TBD"), Scalar::from("PR_FF"), 1),
            (Scalar::Integer(10), Scalar::from("PR_SS"), 2),
            (Scalar::Integer(-2), Scalar::from("PR_FS"), 1),
            (Scalar::Real(10.0), Scalar::from("PR_FS"), 2),
            (Scalar::from("10.0"), Scalar::from("PR_FS"), 1),
            (Scalar::Null, Scalar::from("PR_FS"), 4),
        ]);
        assert_eq!(chart.lags(), vec!["-2", "10", "TBD", "null"]);
        assert_eq!(chart.get("10", "PR_FS"), Some(3));
        assert_eq!(chart.get("10", "PR_SS"), Some(2));
        assert_eq!(chart.total(), 11);

        let json = serde_json::to_string(&chart).unwrap();
        assert_eq!(
            json,
            r#"{"-2":{"PR_FS":1},"10":{"PR_FS":3,"PR_SS":2},"TBD":{"PR_FF":1},"null":{"PR_FS":4}}"#
        );
    }

    #[tokio::test]
    async fn test_lags_chart() {
        let db = schedule_store().await;
        let (layout, table) = setup(&db).await;

        let chart = chart(&db, &layout, table.get(Metric::Lags), &FacetSelection::new())
            .await
            .unwrap();
        assert_eq!(chart.lags(), vec!["-4", "-1", "3", "10", "30"]);
        assert_eq!(chart.get("10", "PR_FS1"), Some(1));
        assert_eq!(chart.get("30", "PR_SF"), Some(1));
        assert_eq!(chart.total(), 5);
    }

    #[tokio::test]
    async fn test_fs0d_chart_uses_subset_scope() {
        let db = schedule_store().await;
        let (layout, table) = setup(&db).await;
        let d = table.get(Metric::TypicalFs0d);

        let chart = chart(&db, &layout, d, &FacetSelection::new()).await.unwrap();
        assert_eq!(chart.lags(), vec!["3", "10"]);

        let zero = FacetSelection::new().lag("0");
        assert!(super::chart(&db, &layout, d, &zero).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_type_counts() {
        let db = schedule_store().await;
        let (layout, table) = setup(&db).await;

        let counts = type_counts(&db, &layout, table.get(Metric::NonFs0d), &FacetSelection::new())
            .await
            .unwrap();
        let expected: BTreeMap<String, u64> =
            [("PR_FF".to_string(), 1), ("PR_SF".to_string(), 1), ("PR_SS".to_string(), 1)]
                .into_iter()
                .collect();
        assert_eq!(counts, expected);
    }
}
