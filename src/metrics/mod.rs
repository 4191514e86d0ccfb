pub mod descriptor;
pub mod types;

pub use descriptor::{Metric, MetricDescriptor, MetricTable};
pub use types::*;

use rusqlite::{Connection, OptionalExtension};

use crate::config::quote_ident;
use crate::error::Result;
use crate::query::builder::{PredicateBuilder, Scope};
use crate::query::count_sql;
use crate::query::facet::FacetSelection;
use crate::query::scalar::Scalar;
use crate::storage::schema::StoreLayout;
use crate::storage::Database;

/// Compute a metric's subset, superset, and percentage under a selection.
///
/// Both counts are always taken live in one read, so the pair is consistent.
/// When nothing is selected and the precomputed KPI view carries the
/// metric's count column, the stored count is checked against the live
/// subset; a disagreeing (stale) view is logged and ignored.
pub async fn compute_kpi(
    db: &Database,
    layout: &StoreLayout,
    descriptor: &MetricDescriptor,
    selection: &FacetSelection,
) -> Result<KpiReport> {
    let builder = PredicateBuilder::new(descriptor, selection);
    let subset_list = builder.clone().scope(Scope::Subset).build();
    let superset_list = builder.clone().scope(Scope::Superset).build();
    let total_list = descriptor
        .has_field(KpiField::Total)
        .then(|| builder.scope(Scope::List).build());

    let precomputed = match (&layout.kpi_view, descriptor.precomputed_column) {
        (Some(view), Some(column)) if selection.is_unconstrained() && view.has_column(column) => {
            Some((view.name.clone(), column))
        }
        _ => None,
    };

    let metric = descriptor.metric;
    let table = layout.fact_table.clone();
    let (subset, superset, total, source) = db
        .read(move |conn| {
            let superset = count_sql(conn, &table, &superset_list)?;
            let total = match &total_list {
                Some(list) => Some(count_sql(conn, &table, list)?),
                None => None,
            };

            let stored = match &precomputed {
                Some((view, column)) => match precomputed_count_sql(conn, view, column) {
                    Ok(count) => count,
                    Err(e) if e.is_recoverable() => {
                        log::warn!("{metric}: precomputed view unusable, counting live: {e}");
                        None
                    }
                    Err(e) => return Err(e),
                },
                None => None,
            };

            let live = count_sql(conn, &table, &subset_list)?;
            let source = match stored {
                Some(count) if count == live => KpiSource::Precomputed,
                Some(count) => {
                    log::warn!(
                        "{metric}: precomputed count {count} disagrees with live count {live}, using live"
                    );
                    KpiSource::Live
                }
                None => KpiSource::Live,
            };
            let subset = live;
            Ok((subset, superset, total, source))
        })
        .await?;

    Ok(KpiReport {
        metric,
        result: KpiResult::new(subset, superset, descriptor.precision),
        total,
        source,
        fields: descriptor.fields,
    })
}

/// First-row value of `column` in the KPI view, when it is a usable count.
fn precomputed_count_sql(conn: &Connection, view: &str, column: &str) -> Result<Option<u64>> {
    let sql = format!(
        "SELECT {} FROM {} LIMIT 1",
        quote_ident(column),
        quote_ident(view)
    );
    let value: Option<Scalar> = conn.query_row(&sql, [], |row| row.get(0)).optional()?;
    Ok(value
        .and_then(|v| v.as_number())
        .filter(|n| *n >= 0.0)
        .map(|n| n.round() as u64))
}
