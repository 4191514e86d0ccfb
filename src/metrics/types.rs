use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::descriptor::Metric;

/// A value slot in a metric's KPI payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiField {
    /// Rows listed for the metric under the current selection.
    Total,
    /// Rows the metric counts against the schedule.
    Subset,
    /// "Remaining" relationships the subset is measured against.
    Superset,
    Percentage,
}

/// Subset and superset counts with the derived percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KpiResult {
    pub subset: u64,
    pub superset: u64,
    pub percentage: f64,
}

impl KpiResult {
    /// Percentage is measured against the superset, 0 when it is empty.
    pub fn new(subset: u64, superset: u64, precision: u32) -> Self {
        let percentage = if superset > 0 {
            round_to(100.0 * subset as f64 / superset as f64, precision)
        } else {
            0.0
        };
        Self {
            subset,
            superset,
            percentage,
        }
    }
}

pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Where the subset count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiSource {
    Live,
    Precomputed,
}

/// A metric's KPI answer, serialized under the metric's own field names.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiReport {
    pub metric: Metric,
    pub result: KpiResult,
    /// List-scope row count, for metrics that report one.
    pub total: Option<u64>,
    pub source: KpiSource,
    pub(crate) fields: &'static [(&'static str, KpiField)],
}

impl KpiReport {
    /// All-zero report, returned when the store cannot answer.
    pub fn empty(metric: Metric, fields: &'static [(&'static str, KpiField)]) -> Self {
        let total = fields
            .iter()
            .any(|(_, f)| *f == KpiField::Total)
            .then_some(0);
        Self {
            metric,
            result: KpiResult::default(),
            total,
            source: KpiSource::Live,
            fields,
        }
    }

    /// Named values in output order.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        self.fields
            .iter()
            .map(|(name, field)| {
                let value = match field {
                    KpiField::Total => self.total.unwrap_or(0) as f64,
                    KpiField::Subset => self.result.subset as f64,
                    KpiField::Superset => self.result.superset as f64,
                    KpiField::Percentage => self.result.percentage,
                };
                (*name, value)
            })
            .collect()
    }
}

impl Serialize for KpiReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, field) in self.fields {
            match field {
                KpiField::Total => map.serialize_entry(name, &self.total.unwrap_or(0))?,
                KpiField::Subset => map.serialize_entry(name, &self.result.subset)?,
                KpiField::Superset => map.serialize_entry(name, &self.result.superset)?,
                KpiField::Percentage => map.serialize_entry(name, &self.result.percentage)?,
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(KpiResult::new(1, 3, 2).percentage, 33.33);
        assert_eq!(KpiResult::new(2, 3, 1).percentage, 66.7);
        assert_eq!(KpiResult::new(3, 3, 2).percentage, 100.0);
    }

    #[test]
    fn test_empty_superset_is_zero_percent() {
        let result = KpiResult::new(0, 0, 2);
        assert_eq!(result.percentage, 0.0);
    }

    #[test]
    fn test_report_serializes_metric_field_names_in_order() {
        let report = KpiReport {
            metric: Metric::Lags,
            result: KpiResult::new(2, 8, 1),
            total: None,
            source: KpiSource::Live,
            fields: &[
                ("Lag_Count", KpiField::Subset),
                ("Remaining_Relationships", KpiField::Superset),
                ("Lag_Percentage", KpiField::Percentage),
            ],
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"Lag_Count":2,"Remaining_Relationships":8,"Lag_Percentage":25.0}"#
        );
    }

    #[test]
    fn test_empty_report_keeps_total_slot() {
        let report = KpiReport::empty(
            Metric::Leads,
            &[
                ("Total_Relationship_Count", KpiField::Total),
                ("Leads_Count", KpiField::Subset),
            ],
        );
        assert_eq!(report.total, Some(0));
        assert_eq!(report.entries(), vec![("Total_Relationship_Count", 0.0), ("Leads_Count", 0.0)]);
    }
}
