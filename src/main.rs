mod config;
mod data;
mod output;
mod table;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use config::{Config, EnvConfig, OutputFormat};
use data::cost_explorer::AwsConnectionManager;
use data::window::{Clock, FixedClock, SystemClock};
use table::cost_forecast::{list_cost_forecast, table_aws_cost_forecast};
use table::{KeyColumnQuals, QueryData, TableDef};

/// Stream AWS Cost Explorer cost forecasts as table rows
#[derive(Parser, Debug)]
#[command(name = "cost-forecast", version, about)]
struct Args {
    /// Forecast granularity (MONTHLY or DAILY, case-insensitive)
    #[arg(short, long, required_unless_present = "describe")]
    granularity: Option<String>,

    /// Compute the forecast window as of this date (YYYY-MM-DD) instead of today
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Print the table's columns and exit
    #[arg(long)]
    describe: bool,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format (overrides the config file)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Output path; CSV is written to stdout when omitted
    #[arg(short, long)]
    output: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let env_config = EnvConfig::load();
    config.apply_env(&env_config);

    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(path) = args.output {
        config.output.path = Some(path);
    }

    init_tracing(&config.logging.level, args.verbose);

    tracing::debug!("Region: {}", config.connection.region);
    tracing::debug!("Output: {:?} {:?}", config.output.format, config.output.path);

    let table = table_aws_cost_forecast();
    if args.describe {
        describe(&table);
        return Ok(());
    }
    let granularity = args.granularity.unwrap_or_default();

    let mut sink = output::open_sink(&config.output, &table)?;

    let connections = AwsConnectionManager::new(config.connection.clone(), env_config.credentials);
    let query = QueryData::new(KeyColumnQuals::new().with("granularity", &granularity));
    let clock: Box<dyn Clock> = match args.as_of {
        Some(date) => Box::new(FixedClock(date)),
        None => Box::new(SystemClock),
    };

    list_cost_forecast(&query, &connections, clock.as_ref(), sink.as_mut()).await?;
    sink.finish()?;

    Ok(())
}

fn describe(table: &TableDef) {
    println!("{}: {}", table.name, table.description);
    println!("key columns: {}", table.key_columns.join(", "));
    for column in &table.columns {
        println!(
            "  {:<14} {:<10} {}",
            column.name,
            column.column_type.sql_type(),
            column.description
        );
    }
}

/// Logs go to stderr so CSV on stdout stays clean. `RUST_LOG` wins when set.
fn init_tracing(level: &str, verbose: u8) {
    let level = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
