pub mod config;
pub mod error;
pub mod metrics;
pub mod query;
pub mod storage;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use metrics::{KpiReport, KpiResult, KpiSource, Metric, MetricDescriptor, MetricTable};
pub use query::{ChartData, Facet, FacetSelection, ProjectOption, RelationshipRow, Scalar};
pub use storage::schema::StoreLayout;
pub use storage::Database;

use std::collections::BTreeMap;
use std::sync::Arc;

use storage::schema;

/// Main entry point for the schedule KPI engine.
///
/// Every read operation degrades a recoverable failure (missing table or
/// column, bad SQL against an older schema) to an empty or zero answer and
/// logs it. `StoreUnavailable` is always returned to the caller.
#[derive(Clone)]
pub struct ScheduleKpi {
    db: Database,
    config: Arc<EngineConfig>,
    metrics: Arc<MetricTable>,
    layout: Arc<StoreLayout>,
}

impl ScheduleKpi {
    /// Validate `config`, build the metric table, and probe the store once.
    pub async fn new(db: Database, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let probe_config = config.clone();
        let layout = db
            .read(move |conn| Ok(schema::probe(conn, &probe_config)?))
            .await?;

        if layout.has_fact_table() {
            log::info!(
                "{}: {} columns, project column: {}",
                layout.fact_table,
                layout.fact_columns.len(),
                layout.has_project_column()
            );
        } else {
            log::warn!("fact table {} not found; every query will be empty", layout.fact_table);
        }
        match &layout.kpi_view {
            Some(view) => log::info!("precomputed KPI view {} available", view.name),
            None => log::info!("no precomputed KPI view; counting live"),
        }

        Ok(Self {
            db,
            metrics: Arc::new(MetricTable::from_config(&config)),
            config: Arc::new(config),
            layout: Arc::new(layout),
        })
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// What the store provided when the engine started.
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn descriptor(&self, metric: Metric) -> &MetricDescriptor {
        self.metrics.get(metric)
    }

    // ── Row listing ────────────────────────────────────────────────

    pub async fn rows(&self, metric: Metric, selection: &FacetSelection) -> Result<Vec<RelationshipRow>> {
        let result =
            query::rows::project(&self.db, &self.layout, self.descriptor(metric), selection).await;
        degrade(metric, "rows", result, Vec::new)
    }

    pub async fn count(&self, metric: Metric, selection: &FacetSelection) -> Result<u64> {
        let result =
            query::rows::count(&self.db, &self.layout, self.descriptor(metric), selection).await;
        degrade(metric, "count", result, || 0)
    }

    // ── Facet catalog ──────────────────────────────────────────────

    pub async fn options(
        &self,
        metric: Metric,
        facet: Facet,
        selection: &FacetSelection,
    ) -> Result<Vec<Scalar>> {
        let result = query::options::options(
            &self.db,
            &self.layout,
            self.descriptor(metric),
            facet,
            selection,
        )
        .await;
        degrade(metric, "options", result, Vec::new)
    }

    pub async fn projects(
        &self,
        metric: Metric,
        selection: &FacetSelection,
    ) -> Result<Vec<ProjectOption>> {
        let result =
            query::options::projects(&self.db, &self.layout, self.descriptor(metric), selection)
                .await;
        degrade(metric, "projects", result, Vec::new)
    }

    // ── Aggregates ─────────────────────────────────────────────────

    pub async fn kpi(&self, metric: Metric, selection: &FacetSelection) -> Result<KpiReport> {
        let descriptor = self.descriptor(metric);
        let result = metrics::compute_kpi(&self.db, &self.layout, descriptor, selection).await;
        degrade(metric, "kpi", result, || KpiReport::empty(metric, descriptor.fields))
    }

    pub async fn chart(&self, metric: Metric, selection: &FacetSelection) -> Result<ChartData> {
        let result =
            query::chart::chart(&self.db, &self.layout, self.descriptor(metric), selection).await;
        degrade(metric, "chart", result, ChartData::default)
    }

    /// Listed rows per relationship type.
    pub async fn type_counts(
        &self,
        metric: Metric,
        selection: &FacetSelection,
    ) -> Result<BTreeMap<String, u64>> {
        let result =
            query::chart::type_counts(&self.db, &self.layout, self.descriptor(metric), selection)
                .await;
        degrade(metric, "type_counts", result, BTreeMap::new)
    }
}

fn degrade<T>(
    metric: Metric,
    operation: &str,
    result: Result<T>,
    fallback: impl FnOnce() -> T,
) -> Result<T> {
    match result {
        Err(e) if e.is_recoverable() => {
            log::warn!("{metric} {operation}: {e}; answering empty");
            Ok(fallback())
        }
        other => other,
    }
}
