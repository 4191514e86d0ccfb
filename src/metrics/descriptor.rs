use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::types::KpiField;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::query::predicate::{Column, Operator, Predicate};

/// The five schedule-quality metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    TypicalFs0d,
    #[serde(rename = "typical-non-fs0d")]
    NonFs0d,
    Leads,
    Lags,
    ExcessiveLags,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::TypicalFs0d,
        Metric::NonFs0d,
        Metric::Leads,
        Metric::Lags,
        Metric::ExcessiveLags,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Metric::TypicalFs0d => "typical-fs0d",
            Metric::NonFs0d => "typical-non-fs0d",
            Metric::Leads => "leads",
            Metric::Lags => "lags",
            Metric::ExcessiveLags => "excessive-lags",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Metric::TypicalFs0d => "Finish-to-start relationships carrying a positive lag",
            Metric::NonFs0d => "Non finish-to-start relationships with a missing or non-zero lag",
            Metric::Leads => "Relationships with a negative lag",
            Metric::Lags => "Relationships with a non-zero lag",
            Metric::ExcessiveLags => "Relationships flagged for excessive lag",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "typical-fs0d" | "fs0d" => Ok(Metric::TypicalFs0d),
            "typical-non-fs0d" | "non-fs0d" => Ok(Metric::NonFs0d),
            "leads" => Ok(Metric::Leads),
            "lags" => Ok(Metric::Lags),
            "excessive-lags" | "excessive" => Ok(Metric::ExcessiveLags),
            _ => Err(Error::Config(format!("unknown metric: {s}"))),
        }
    }
}

/// The rule set one metric layers on top of the shared facets.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub metric: Metric,
    /// Shared "still open" filter, present in every scope.
    pub status: Predicate,
    /// Mandatory clauses that define the metric's population.
    pub base: Vec<Predicate>,
    /// Relationship-type clause used when no type is selected.
    pub default_type: Option<Predicate>,
    /// Extra clause applied only to the KPI subset count. Dropped when the
    /// user constrains the same column.
    pub subset_clause: Option<Predicate>,
    /// Columns whose user constraints are left out of the superset.
    pub defining_columns: Vec<Column>,
    /// Whether the superset carries the relationship-type clause.
    pub superset_keeps_type: bool,
    /// KPI output fields, in output order.
    pub fields: &'static [(&'static str, KpiField)],
    /// Decimal places of the KPI percentage.
    pub precision: u32,
    /// Count column in the precomputed KPI view, if the view carries one.
    pub precomputed_column: Option<&'static str>,
}

impl MetricDescriptor {
    pub fn new(metric: Metric, config: &EngineConfig) -> Self {
        let status = Predicate::text_eq(Column::Status, &config.incomplete_status);
        let fs = &config.finish_to_start_types;

        match metric {
            Metric::TypicalFs0d => Self {
                metric,
                status,
                base: Vec::new(),
                default_type: Some(Predicate::in_set(Column::RelationshipType, fs)),
                subset_clause: Some(Predicate::number(Column::Lag, Operator::Gt, 0.0)),
                defining_columns: vec![Column::Lag],
                superset_keeps_type: false,
                fields: &[
                    ("Total_Relationship_Count", KpiField::Total),
                    ("Remaining_Relationship_Count", KpiField::Superset),
                    ("Lag_Count", KpiField::Subset),
                    ("Relationship_Percentage", KpiField::Percentage),
                ],
                precision: 2,
                precomputed_column: None,
            },
            Metric::NonFs0d => Self {
                metric,
                status,
                base: vec![Predicate::missing_or_ne(Column::Lag, 0.0)],
                default_type: Some(Predicate::not_in_set(Column::RelationshipType, fs)),
                subset_clause: None,
                defining_columns: vec![Column::Lag],
                superset_keeps_type: true,
                fields: &[
                    ("NonFS_Count", KpiField::Subset),
                    ("Remaining_Relationships", KpiField::Superset),
                    ("NonFS_Percentage", KpiField::Percentage),
                ],
                precision: 2,
                precomputed_column: None,
            },
            Metric::Leads => Self {
                metric,
                status,
                base: vec![Predicate::number(Column::Lag, Operator::Lt, 0.0)],
                default_type: None,
                subset_clause: None,
                defining_columns: vec![Column::Lag],
                superset_keeps_type: true,
                fields: &[
                    ("Total_Relationship_Count", KpiField::Total),
                    ("Remaining_Relationship_Count", KpiField::Superset),
                    ("Leads_Count", KpiField::Subset),
                    ("Lead_Percentage", KpiField::Percentage),
                ],
                precision: 2,
                precomputed_column: Some("Leads_Count"),
            },
            Metric::Lags => Self {
                metric,
                status,
                base: vec![
                    Predicate::present(Column::Lag),
                    Predicate::number(Column::Lag, Operator::Ne, 0.0),
                ],
                default_type: None,
                subset_clause: None,
                defining_columns: vec![Column::Lag],
                superset_keeps_type: true,
                fields: &[
                    ("Lag_Count", KpiField::Subset),
                    ("Remaining_Relationships", KpiField::Superset),
                    ("Lag_Percentage", KpiField::Percentage),
                ],
                precision: 1,
                precomputed_column: Some("Lag_Count"),
            },
            Metric::ExcessiveLags => Self {
                metric,
                status,
                base: vec![Predicate::text_eq(Column::ExcessiveLag, &config.excessive_lag_flag)],
                default_type: None,
                subset_clause: None,
                defining_columns: vec![Column::ExcessiveLag, Column::Lag],
                superset_keeps_type: true,
                fields: &[
                    ("Lag_Count", KpiField::Subset),
                    ("Remaining_Relationships", KpiField::Superset),
                    ("Lag_Percentage", KpiField::Percentage),
                ],
                precision: 1,
                precomputed_column: Some("Excessive_Lag_Count"),
            },
        }
    }

    pub fn has_field(&self, field: KpiField) -> bool {
        self.fields.iter().any(|(_, f)| *f == field)
    }
}

/// Descriptors for every metric, built once per engine.
#[derive(Debug, Clone)]
pub struct MetricTable {
    descriptors: Vec<MetricDescriptor>,
}

impl MetricTable {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            descriptors: Metric::ALL
                .into_iter()
                .map(|m| MetricDescriptor::new(m, config))
                .collect(),
        }
    }

    pub fn get(&self, metric: Metric) -> &MetricDescriptor {
        // Built from Metric::ALL, so the index always matches.
        &self.descriptors[metric as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.descriptors.iter()
    }
}
