use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod error;
mod export;
mod feedback;
mod filter;
mod grouping;
mod kpi;
mod loader;
mod models;
mod offenders;
mod quartile;
mod report;

use crate::config::Config;
use crate::error::EngineError;
use crate::filter::{
    apply_filter, cascading_values, distinct_values, DateRange, FilterConfig, Selection,
};
use crate::models::{AuditRecord, Dimension};
use crate::report::{QuartileSection, Scorecard};

#[derive(Parser)]
#[command(name = "quality-scorecard")]
#[command(about = "Quality audit scorecards: KPIs, quartiles and repeat offenders", long_about = None)]
#[command(after_help = "Filter flags accept \"all\" or \"TODOS\" to leave a dimension unrestricted.")]
struct Cli {
    /// Configuration file (defaults to quality-scorecard.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import audits from a CSV file into the database
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        strict_timestamps: bool,
    },
    /// Print headline KPIs for the selected audits
    Summary {
        #[command(flatten)]
        view: ViewArgs,
        #[command(flatten)]
        goal: TargetArgs,
    },
    /// Segment evaluatees into score quartiles
    Quartiles {
        #[command(flatten)]
        view: ViewArgs,
    },
    /// List evaluatees with repeated zero scores
    Offenders {
        #[command(flatten)]
        view: ViewArgs,
        /// Minimum number of zero scores to be listed
        #[arg(long)]
        min_zero_scores: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the values still selectable for a dimension
    Values {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, value_enum)]
        dimension: DimensionArg,
    },
    /// Generate the full scorecard report
    Report {
        #[command(flatten)]
        view: ViewArgs,
        #[command(flatten)]
        goal: TargetArgs,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        min_zero_scores: Option<usize>,
    },
    /// Export the selected audits as CSV
    Export {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Clone)]
struct ViewArgs {
    /// Read audits from this CSV instead of the database
    #[arg(long)]
    csv: Option<PathBuf>,
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
    #[arg(long)]
    strict_timestamps: bool,

    #[arg(long)]
    month: Option<String>,
    #[arg(long)]
    week: Option<String>,
    #[arg(long)]
    account: Option<String>,
    #[arg(long)]
    supervisor: Option<String>,
    #[arg(long)]
    coordinator: Option<String>,
    #[arg(long)]
    cell: Option<String>,
    #[arg(long)]
    hierarchy: Option<String>,
    #[arg(long)]
    monitoring_type: Option<String>,
    #[arg(long)]
    tenure: Option<String>,
    /// First audit date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last audit date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,
}

/// Quality goal for the commands that compare against it.
#[derive(Args, Clone)]
struct TargetArgs {
    /// Fixed quality goal
    #[arg(long, conflicts_with = "per_record_target")]
    target: Option<f64>,
    /// Derive the goal from the audits' target column
    #[arg(long)]
    per_record_target: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum DimensionArg {
    Month,
    Week,
    Account,
    Supervisor,
    Coordinator,
    Cell,
    Hierarchy,
    MonitoringType,
    Tenure,
}

impl From<DimensionArg> for Dimension {
    fn from(arg: DimensionArg) -> Self {
        match arg {
            DimensionArg::Month => Dimension::Month,
            DimensionArg::Week => Dimension::Week,
            DimensionArg::Account => Dimension::Account,
            DimensionArg::Supervisor => Dimension::Supervisor,
            DimensionArg::Coordinator => Dimension::Coordinator,
            DimensionArg::Cell => Dimension::Cell,
            DimensionArg::Hierarchy => Dimension::Hierarchy,
            DimensionArg::MonitoringType => Dimension::MonitoringType,
            DimensionArg::Tenure => Dimension::Tenure,
        }
    }
}

impl ViewArgs {
    fn filter(&self) -> anyhow::Result<FilterConfig> {
        let choices = [
            (Dimension::Month, &self.month),
            (Dimension::Week, &self.week),
            (Dimension::Account, &self.account),
            (Dimension::Supervisor, &self.supervisor),
            (Dimension::Coordinator, &self.coordinator),
            (Dimension::Cell, &self.cell),
            (Dimension::Hierarchy, &self.hierarchy),
            (Dimension::MonitoringType, &self.monitoring_type),
            (Dimension::Tenure, &self.tenure),
        ];

        let mut filter = FilterConfig::default();
        for (dimension, value) in choices {
            let selection = Selection::from_arg(value.as_deref());
            if selection != Selection::All {
                filter = filter.select(dimension, selection);
            }
        }

        if self.from.is_some() || self.to.is_some() {
            filter = filter.with_range(DateRange::new(
                self.from.unwrap_or(NaiveDate::MIN),
                self.to.unwrap_or(NaiveDate::MAX),
            )?);
        }
        Ok(filter)
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

fn require_database_url(database_url: Option<String>) -> anyhow::Result<String> {
    database_url.context("DATABASE_URL must be set, or pass --csv to read audits from a file")
}

async fn load_records(
    view: &ViewArgs,
    config: &Config,
    filter: &FilterConfig,
) -> anyhow::Result<Vec<AuditRecord>> {
    if let Some(path) = &view.csv {
        let outcome = loader::load_csv(path, &config.loader)?;
        if outcome.dropped_timestamps > 0 {
            warn!(
                dropped = outcome.dropped_timestamps,
                "some audits were skipped because their timestamp could not be read"
            );
        }
        if outcome.dropped_evaluatees > 0 {
            warn!(
                dropped = outcome.dropped_evaluatees,
                "some audits were skipped because they name no evaluatee"
            );
        }
        return Ok(outcome.records);
    }

    let database_url = require_database_url(view.database_url.clone())?;
    let pool = connect(&database_url).await?;
    Ok(db::fetch_audits(&pool, filter.date_range).await?)
}

fn print_output(
    format: OutputFormat,
    markdown: String,
    json: anyhow::Result<String>,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Markdown => print!("{markdown}"),
        OutputFormat::Json => println!("{}", json?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    debug!(?config, "loaded configuration");

    match cli.command {
        Commands::InitDb => {
            let database_url = require_database_url(std::env::var("DATABASE_URL").ok())?;
            let pool = connect(&database_url).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import {
            csv,
            strict_timestamps,
        } => {
            config.apply_overrides(None, false, None, None, strict_timestamps);
            let outcome = loader::load_csv(&csv, &config.loader)?;
            let database_url = require_database_url(std::env::var("DATABASE_URL").ok())?;
            let pool = connect(&database_url).await?;
            let inserted = db::import_records(&pool, &outcome.records).await?;
            println!(
                "Inserted {inserted} audits from {} ({} rows dropped for unreadable timestamps, {} for blank evaluatees).",
                csv.display(),
                outcome.dropped_timestamps,
                outcome.dropped_evaluatees
            );
        }
        Commands::Summary { view, goal } => {
            config.apply_overrides(
                goal.target,
                goal.per_record_target,
                None,
                None,
                view.strict_timestamps,
            );
            let filter = view.filter()?;
            let records = load_records(&view, &config, &filter).await?;
            let filtered = apply_filter(&records, &filter)?;
            let kpis = kpi::compute_kpis(
                &filtered,
                &config.target.to_target_config(),
                filter.selection(Dimension::Account),
            );

            if kpis.count == 0 {
                info!("no audits match the selected filters");
            }
            let mut markdown = String::new();
            report::render_kpis(&mut markdown, &kpis);
            print_output(view.format, markdown, report::to_json(&kpis).map_err(Into::into))?;
        }
        Commands::Quartiles { view } => {
            config.apply_overrides(None, false, None, None, view.strict_timestamps);
            let filter = view.filter()?;
            let records = load_records(&view, &config, &filter).await?;
            let filtered = apply_filter(&records, &filter)?;

            let section = match quartile::segment(&filtered) {
                Ok(report) => QuartileSection::Segmented(report),
                Err(EngineError::InsufficientData { found, required }) => {
                    QuartileSection::Insufficient { found, required }
                }
                Err(other) => return Err(other.into()),
            };
            let mut markdown = String::new();
            report::render_quartiles(&mut markdown, &section);
            print_output(view.format, markdown, report::to_json(&section).map_err(Into::into))?;
        }
        Commands::Offenders {
            view,
            min_zero_scores,
            limit,
        } => {
            config.apply_overrides(None, false, min_zero_scores, limit, view.strict_timestamps);
            let filter = view.filter()?;
            let records = load_records(&view, &config, &filter).await?;
            let filtered = apply_filter(&records, &filter)?;
            let rows = offenders::find_offenders(&filtered, &config.offenders);

            let mut markdown = String::new();
            report::render_offenders(&mut markdown, &rows, config.offenders.min_occurrences);
            print_output(view.format, markdown, report::to_json(&rows).map_err(Into::into))?;
        }
        Commands::Values { view, dimension } => {
            config.apply_overrides(None, false, None, None, view.strict_timestamps);
            let filter = view.filter()?;
            let records = load_records(&view, &config, &filter).await?;
            let values = if filter.selections.is_empty() && filter.date_range.is_none() {
                distinct_values(&records, dimension.into())
            } else {
                cascading_values(&records, &filter, dimension.into())?
            };

            let markdown: String = values.iter().map(|value| format!("{value}\n")).collect();
            print_output(view.format, markdown, report::to_json(&values).map_err(Into::into))?;
        }
        Commands::Report {
            view,
            goal,
            out,
            min_zero_scores,
        } => {
            config.apply_overrides(
                goal.target,
                goal.per_record_target,
                min_zero_scores,
                None,
                view.strict_timestamps,
            );
            let filter = view.filter()?;
            let records = load_records(&view, &config, &filter).await?;
            let scorecard = Scorecard::compute(&records, &filter, &config)?;

            let rendered = match view.format {
                OutputFormat::Markdown => {
                    report::build_report(&scorecard, config.offenders.min_occurrences)
                }
                OutputFormat::Json => report::to_json(&scorecard)?,
            };
            let out = out.unwrap_or_else(|| config.report.output.clone());
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { view, out } => {
            config.apply_overrides(None, false, None, None, view.strict_timestamps);
            let filter = view.filter()?;
            let records = load_records(&view, &config, &filter).await?;
            let filtered = apply_filter(&records, &filter)?;
            if filtered.is_empty() {
                bail!("no audits match the selected filters; nothing to export");
            }

            let bytes = export::to_csv_bytes(&filtered)?;
            std::fs::write(&out, bytes)
                .with_context(|| format!("failed to write export to {}", out.display()))?;
            println!("Exported {} audits to {}.", filtered.len(), out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(args: &[&str]) -> ViewArgs {
        let mut argv = vec!["quality-scorecard", "summary"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Summary { view, .. } => view,
            _ => unreachable!("summary subcommand"),
        }
    }

    #[test]
    fn flags_become_filter_selections() {
        let filter = view(&["--account", "Retail", "--supervisor", "all"])
            .filter()
            .expect("filter");
        assert_eq!(
            filter.selection(Dimension::Account),
            &Selection::Value("Retail".to_string())
        );
        assert_eq!(filter.selection(Dimension::Supervisor), &Selection::All);
        assert_eq!(filter.date_range, None);
    }

    #[test]
    fn open_ended_range_uses_calendar_bounds() {
        let filter = view(&["--from", "2026-02-01"]).filter().expect("filter");
        let range = filter.date_range.expect("range");
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2026, 2, 1).expect("date"));
        assert_eq!(range.end, NaiveDate::MAX);
    }

    #[test]
    fn todos_leaves_a_dimension_unrestricted() {
        let filter = view(&["--account", "TODOS", "--cell", "Cell A"])
            .filter()
            .expect("filter");
        assert_eq!(filter.selection(Dimension::Account), &Selection::All);
        assert_eq!(
            filter.selection(Dimension::Cell),
            &Selection::Value("Cell A".to_string())
        );
    }

    #[test]
    fn target_flags_belong_to_summary_and_report_only() {
        let parsed = Cli::try_parse_from(["quality-scorecard", "summary", "--target", "85"])
            .expect("summary accepts a target");
        match parsed.command {
            Commands::Summary { goal, .. } => {
                assert_eq!(goal.target, Some(85.0));
                assert!(!goal.per_record_target);
            }
            _ => unreachable!("summary subcommand"),
        }

        let parsed = Cli::try_parse_from(["quality-scorecard", "report", "--per-record-target"])
            .expect("report accepts a target mode");
        assert!(matches!(
            parsed.command,
            Commands::Report { goal, .. } if goal.per_record_target
        ));

        let rejected: [&[&str]; 4] = [
            &["quartiles", "--target", "80"],
            &["offenders", "--target", "80"],
            &["export", "--out", "audits.csv", "--target", "80"],
            &["values", "--dimension", "account", "--per-record-target"],
        ];
        for args in rejected {
            let argv = std::iter::once("quality-scorecard").chain(args.iter().copied());
            assert!(Cli::try_parse_from(argv).is_err(), "{args:?}");
        }
    }

    #[test]
    fn inverted_range_is_rejected() {
        let result = view(&["--from", "2026-03-01", "--to", "2026-02-01"]).filter();
        assert!(result.is_err());
    }
}
