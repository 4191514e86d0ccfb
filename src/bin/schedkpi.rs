use clap::{Args, Parser, Subcommand};

use schedkpi::{EngineConfig, Facet, FacetSelection, Metric, ScheduleKpi};

#[derive(Parser)]
#[command(name = "schedkpi", about = "Schedule relationship KPI CLI")]
struct Cli {
    /// Database path (default: ~/.schedkpi/schedule.db)
    #[arg(long)]
    db: Option<String>,

    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Facet filters shared by every metric command. "All" or omitted means
/// unconstrained.
#[derive(Args, Debug, Clone, Default)]
struct FacetArgs {
    /// Relationship type code (e.g. PR_FS)
    #[arg(long)]
    relationship_type: Option<String>,
    /// Driving flag
    #[arg(long)]
    driving: Option<String>,
    /// Lag value
    #[arg(long, allow_hyphen_values = true)]
    lag: Option<String>,
    /// Free float value
    #[arg(long, allow_hyphen_values = true)]
    free_float: Option<String>,
    /// Project identifier
    #[arg(long)]
    project: Option<String>,
}

impl FacetArgs {
    fn selection(&self) -> FacetSelection {
        let mut selection = FacetSelection::new();
        for (facet, value) in [
            (Facet::RelationshipType, &self.relationship_type),
            (Facet::Driving, &self.driving),
            (Facet::Lag, &self.lag),
            (Facet::FreeFloat, &self.free_float),
            (Facet::Project, &self.project),
        ] {
            if let Some(value) = value {
                selection = selection.with(facet, value);
            }
        }
        selection
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List relationships matching a metric and facets
    Rows {
        /// Metric: typical-fs0d, typical-non-fs0d, leads, lags, excessive-lags
        metric: Metric,
        #[command(flatten)]
        facets: FacetArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Output as CSV
        #[arg(long)]
        csv: bool,
        /// Count only (no output rows)
        #[arg(long)]
        count: bool,
    },
    /// Values still selectable for one facet
    Options {
        metric: Metric,
        /// Facet: relationship_type, driving, lag, free_float, project_id
        facet: Facet,
        #[command(flatten)]
        facets: FacetArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// KPI counts and percentage for a metric
    Kpi {
        metric: Metric,
        #[command(flatten)]
        facets: FacetArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Counts by lag and relationship type
    Chart {
        metric: Metric,
        #[command(flatten)]
        facets: FacetArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Counts by relationship type
    Types {
        metric: Metric,
        #[command(flatten)]
        facets: FacetArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Selectable projects with their names
    Projects {
        metric: Metric,
        #[command(flatten)]
        facets: FacetArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the available metrics
    Metrics {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what the store provides
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    if let Commands::Metrics { json } = cli.command {
        print_metrics(&config, json)?;
        return Ok(());
    }

    let db = match &cli.db {
        Some(path) => schedkpi::Database::open_at(path).await?,
        None => schedkpi::Database::open().await?,
    };
    let engine = ScheduleKpi::new(db, config).await?;

    match cli.command {
        Commands::Rows {
            metric,
            facets,
            json,
            csv,
            count,
        } => {
            handle_rows(&engine, metric, &facets.selection(), json, csv, count).await?;
        }
        Commands::Options {
            metric,
            facet,
            facets,
            json,
        } => {
            let values = engine.options(metric, facet, &facets.selection()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&values)?);
            } else if values.is_empty() {
                println!("No {facet} values available.");
            } else {
                for value in &values {
                    println!("{value}");
                }
            }
        }
        Commands::Kpi {
            metric,
            facets,
            json,
        } => {
            let report = engine.kpi(metric, &facets.selection()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{metric} ({:?})", report.source);
                for (name, value) in report.entries() {
                    println!("  {name}: {value}");
                }
            }
        }
        Commands::Chart {
            metric,
            facets,
            json,
        } => {
            let chart = engine.chart(metric, &facets.selection()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&chart)?);
            } else if chart.is_empty() {
                println!("No relationships found.");
            } else {
                for (lag, bucket) in chart.iter() {
                    let parts: Vec<String> =
                        bucket.iter().map(|(t, n)| format!("{t}={n}")).collect();
                    println!("lag {lag}: {}", parts.join(", "));
                }
                println!("\n{} relationships", chart.total());
            }
        }
        Commands::Types {
            metric,
            facets,
            json,
        } => {
            let counts = engine.type_counts(metric, &facets.selection()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&counts)?);
            } else if counts.is_empty() {
                println!("No relationships found.");
            } else {
                for (relationship_type, n) in &counts {
                    println!("{relationship_type:<12} {n}");
                }
            }
        }
        Commands::Projects {
            metric,
            facets,
            json,
        } => {
            let projects = engine.projects(metric, &facets.selection()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else if projects.is_empty() {
                println!("No projects found.");
            } else {
                for project in &projects {
                    println!("{} {}", project.id, project.name.as_deref().unwrap_or(""));
                }
            }
        }
        Commands::Status { json } => {
            print_status(&engine, json)?;
        }
        Commands::Metrics { .. } => {}
    }

    Ok(())
}

async fn handle_rows(
    engine: &ScheduleKpi,
    metric: Metric,
    selection: &FacetSelection,
    json: bool,
    csv: bool,
    count: bool,
) -> anyhow::Result<()> {
    if count {
        let n = engine.count(metric, selection).await?;
        println!("{n}");
        return Ok(());
    }

    let rows = engine.rows(metric, selection).await?;
    if json {
        println!("{}", schedkpi::query::rows::to_json(&rows)?);
    } else if csv {
        print!("{}", schedkpi::query::rows::to_csv(&rows));
    } else if rows.is_empty() {
        println!("No relationships found.");
    } else {
        for row in &rows {
            println!(
                "{} -> {} [{}] lag {} | driving: {} | float: {}",
                row.pred_id, row.succ_id, row.relationship_type, row.lag, row.driving, row.free_float
            );
        }
        println!("\n{} relationships", rows.len());
    }
    Ok(())
}

fn print_metrics(config: &EngineConfig, json: bool) -> anyhow::Result<()> {
    let table = schedkpi::MetricTable::from_config(config);
    if json {
        let metrics: Vec<serde_json::Value> = table
            .iter()
            .map(|d| {
                serde_json::json!({
                    "metric": d.metric,
                    "description": d.metric.description(),
                    "fields": d.fields.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
                    "precision": d.precision,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        for d in table.iter() {
            println!("{:<18} {}", d.metric.slug(), d.metric.description());
        }
    }
    Ok(())
}

fn print_status(engine: &ScheduleKpi, json: bool) -> anyhow::Result<()> {
    let layout = engine.layout();
    if json {
        println!("{}", serde_json::to_string_pretty(layout)?);
        return Ok(());
    }
    println!("Store Status");
    println!(
        "  Fact table:     {} ({})",
        layout.fact_table,
        if layout.has_fact_table() {
            format!("{} columns", layout.fact_columns.len())
        } else {
            "missing".to_string()
        }
    );
    println!(
        "  Project column: {}",
        if layout.has_project_column() { "yes" } else { "no" }
    );
    println!(
        "  Project table:  {}",
        layout
            .project_table
            .as_ref()
            .map_or("none".to_string(), |t| t.name.clone())
    );
    println!(
        "  KPI view:       {}",
        layout
            .kpi_view
            .as_ref()
            .map_or("none".to_string(), |v| v.name.clone())
    );
    Ok(())
}
