use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

static RE_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Explicit engine configuration, passed to `ScheduleKpi` at construction.
///
/// Table and column names are the only parts of a query that cannot be bound
/// as parameters, so `validate` must accept every one of them before any SQL
/// is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Table or view holding one row per predecessor/successor relationship.
    pub fact_table: String,
    /// Optional precomputed KPI view.
    pub kpi_view: String,
    /// Optional project reference table.
    pub project_table: String,
    pub project_id_column: String,
    pub project_name_column: String,
    /// Status value marking a relationship as still open.
    pub incomplete_status: String,
    /// Flag value marking a relationship whose lag exceeds the threshold.
    pub excessive_lag_flag: String,
    /// Relationship-type codes that count as finish-to-start.
    pub finish_to_start_types: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fact_table: "ActivityRelationshipView".into(),
            kpi_view: "FinalActivityKPIView".into(),
            project_table: "PROJECT".into(),
            project_id_column: "proj_id".into(),
            project_name_column: "proj_short_name".into(),
            incomplete_status: "Incomplete".into(),
            excessive_lag_flag: "Excessive Lag".into(),
            finish_to_start_types: vec!["PR_FS".into(), "PR_FS1".into()],
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file; missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: EngineConfig = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (what, ident) in [
            ("fact_table", &self.fact_table),
            ("kpi_view", &self.kpi_view),
            ("project_table", &self.project_table),
            ("project_id_column", &self.project_id_column),
            ("project_name_column", &self.project_name_column),
        ] {
            if !RE_IDENTIFIER.is_match(ident) {
                return Err(Error::Config(format!("{what} is not a valid identifier: {ident:?}")));
            }
        }
        if self.finish_to_start_types.is_empty() {
            return Err(Error::Config("finish_to_start_types must not be empty".into()));
        }
        Ok(())
    }
}

/// Default store location (`~/.schedkpi/schedule.db`).
pub fn default_db_path() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
        .join(".schedkpi");
    Ok(dir.join("schedule.db"))
}

/// Quote a validated identifier for interpolation into SQL.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{ident}\"")
}
