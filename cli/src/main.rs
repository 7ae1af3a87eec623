//! Solsight CLI
//!
//! Command-line interface for bridging cloud inverter data to PVOutput.
//!
//! # Usage
//!
//! ```bash
//! solsight --help
//! solsight devices
//! solsight report --start 2024-03-01 --end 2024-03-07
//! solsight upload
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use shared::client::CloudClient;
use shared::config::Config;
use shared::daterange::{DateList, Latest, Span};
use shared::pvoutput::{self, PvOutputClient, PvOutputError, MAX_UPLOAD_DAYS};
use shared::tariff::Tariff;

/// Solsight CLI - cloud inverter data to PVOutput
#[derive(Parser)]
#[command(name = "solsight")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Device serial number (or unique prefix) to query
    #[arg(short, long, env = "SOLSIGHT_DEVICE_SN")]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the inverters on the account
    Devices,
    /// List the raw variables the device can report
    Vars,
    /// Print PVOutput CSV lines for a date range (for the bulk loader)
    Report(RangeArgs),
    /// Upload daily records straight to PVOutput
    Upload(RangeArgs),
}

/// Date-range selection shared by `report` and `upload`.
#[derive(Args, Default)]
struct RangeArgs {
    /// First date (YYYY-MM-DD)
    #[arg(short, long)]
    start: Option<NaiveDate>,

    /// Last date (YYYY-MM-DD)
    #[arg(short, long)]
    end: Option<NaiveDate>,

    /// Maximum number of days
    #[arg(short, long)]
    limit: Option<usize>,

    /// Relative window: day, 2days, weekday, week, month, or year
    #[arg(long)]
    span: Option<Span>,

    /// Allow today as the final date (data for today is incomplete)
    #[arg(long)]
    today: bool,

    /// Split import/export into time-of-use buckets using the
    /// configured tariff (SOLSIGHT_TARIFF, default "Octopus Flux")
    #[arg(long)]
    tou: bool,

    /// Tariff preset for the time-of-use split, e.g. "Octopus Go"
    /// (implies --tou)
    #[arg(long)]
    tariff: Option<String>,
}

impl RangeArgs {
    /// Builds the date list, falling back to `default_span` when no
    /// range was given at all.
    fn dates(&self, default_span: Option<Span>) -> Result<Vec<NaiveDate>> {
        let mut list = DateList::new();
        if let Some(start) = self.start {
            list = list.start(start);
        }
        if let Some(end) = self.end {
            list = list.end(end);
        }
        if let Some(limit) = self.limit {
            list = list.limit(limit);
        }
        let mut today = self.today;
        match self.span {
            Some(span) => list = list.span(span),
            None if self.start.is_none() && self.end.is_none() && self.limit.is_none() => {
                if let Some(span) = default_span {
                    list = list.span(span);
                    today = true;
                }
            }
            None => {}
        }
        if today {
            list = list.latest(Latest::Today);
        }
        Ok(list.build()?)
    }

    fn tariff(&self, config: &Config) -> Result<Option<Tariff>> {
        match self.tariff.as_deref() {
            Some(name) => Ok(Some(Tariff::preset(name).context("unknown tariff")?)),
            None if self.tou => Ok(Some(config.tariff.clone())),
            None => Ok(None),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let client = CloudClient::new(config)?;

    match cli.command {
        Commands::Devices => devices(&client).await,
        Commands::Vars => vars(&client).await,
        Commands::Report(args) => report(&client, cli.device.as_deref(), &args).await,
        Commands::Upload(args) => upload(&client, cli.device.as_deref(), &args).await,
    }
}

async fn devices(client: &CloudClient) -> Result<()> {
    for device in client.device_list().await? {
        match client.device_detail(&device.device_sn).await {
            Ok(detail) => {
                let attrs = detail.model_info().map_or_else(String::new, |info| {
                    format!(
                        ", model {} ({} phase{})",
                        info.model,
                        info.phase,
                        info.power
                            .map_or_else(String::new, |p| format!(", {p} kW"))
                    )
                });
                println!("SN={}, Type={}{attrs}", detail.device_sn, detail.device_type);
                if let Ok(totals) = client.generation(&detail.device_sn).await {
                    println!(
                        "  generation: today {} kWh, month {} kWh, total {} kWh",
                        totals.today, totals.month, totals.cumulative
                    );
                }
            }
            Err(e) => {
                println!("SN={}, Type={}", device.device_sn, device.device_type);
                tracing::warn!(error = %e, sn = %device.device_sn, "no device detail");
            }
        }
    }
    Ok(())
}

async fn vars(client: &CloudClient) -> Result<()> {
    for var in client.variables().await? {
        if var.unit.is_empty() {
            println!("{} - {}", var.variable, var.name);
        } else {
            println!("{} [{}] - {}", var.variable, var.unit, var.name);
        }
    }
    Ok(())
}

async fn report(client: &CloudClient, device: Option<&str>, args: &RangeArgs) -> Result<()> {
    let dates = args.dates(None)?;
    let tariff = args.tariff(client.config())?;
    let sn = client.resolve_device(device).await?;

    print_banner("report", &dates, tariff.as_ref());
    for date in dates {
        match pvoutput::daily_output(client, &sn, date, tariff.as_ref()).await {
            Ok(record) => println!("{record}"),
            Err(e) if is_day_error(&e) => println!("# error: {e}"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn upload(client: &CloudClient, device: Option<&str>, args: &RangeArgs) -> Result<()> {
    let pv_config = client
        .config()
        .pvoutput
        .clone()
        .context("SOLSIGHT_PV_API_KEY / SOLSIGHT_PV_SYSTEM_ID are not configured")?;
    let uploader = PvOutputClient::new(pv_config)?;

    // Default window: yesterday and today.
    let dates = args.dates(Some(Span::TwoDays))?;
    let tariff = args.tariff(client.config())?;
    let sn = client.resolve_device(device).await?;

    print_banner("upload", &dates, tariff.as_ref());
    for date in dates.into_iter().take(MAX_UPLOAD_DAYS) {
        match pvoutput::daily_output(client, &sn, date, tariff.as_ref()).await {
            Ok(record) => {
                uploader.upload(&record).await?;
                println!("{record}  # uploaded OK");
            }
            Err(e) if is_day_error(&e) => println!("# error: {e}"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// True for errors that spoil one day but not the whole run.
fn is_day_error(e: &PvOutputError) -> bool {
    matches!(
        e,
        PvOutputError::NoGenerationData { .. } | PvOutputError::PowerOutOfRange { .. }
    )
}

fn print_banner(action: &str, dates: &[NaiveDate], tariff: Option<&Tariff>) {
    println!("------------------ {action} ------------------");
    if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
        println!("Date range {first} to {last} has {} days", dates.len());
    }
    if let Some(tariff) = tariff {
        println!("Time of use: {}", tariff.name);
    }
    println!("------------------------------------------------");
}
