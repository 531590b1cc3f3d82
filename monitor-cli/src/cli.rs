use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, Text};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use weather_monitor_core::{
    AlertEngine, ChartSink, Config, CycleReport, OpenWeatherSource, ReadingStore, Scheduler,
    SvgTrendChart, report, summarize,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-monitor", version, about = "Poll, store and alert on city weather")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the configured cities until interrupted.
    Run {
        /// Seconds to sleep between cycles; overrides the config file.
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many cycles instead of running forever.
        #[arg(long)]
        cycles: Option<u64>,

        /// Skip writing the trend chart after each cycle.
        #[arg(long)]
        no_chart: bool,
    },

    /// Interactively set the API key, cities and poll interval.
    Configure,

    /// Print the summary for the latest stored date.
    Summary,

    /// Render the trend chart from everything stored so far.
    Chart,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Run { interval, cycles, no_chart } => run_monitor(interval, cycles, no_chart).await,
            Command::Configure => configure(),
            Command::Summary => show_summary(),
            Command::Chart => render_chart(),
        }
    }
}

async fn run_monitor(interval: Option<u64>, cycles: Option<u64>, no_chart: bool) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(secs) = interval {
        config.poll_interval_secs = secs;
    }
    config.validate()?;

    let api_key = config.require_api_key()?.to_owned();
    let offset = config.display_offset()?;

    let source = OpenWeatherSource::new(api_key, config.request_timeout())
        .context("Failed to build HTTP client")?;
    let store = ReadingStore::open(&config.resolved_db_path()?)?;
    let alerts = AlertEngine::new(
        config.temp_threshold_c,
        config.breach_count,
        config.hazard_conditions.iter().cloned(),
        config.breach_scope,
    );

    let mut scheduler = Scheduler::new(
        Arc::new(source),
        store,
        alerts,
        config.cities.clone(),
        config.poll_interval(),
    );
    if !no_chart {
        let chart = SvgTrendChart::new(config.resolved_chart_path()?, offset);
        info!("Trend chart will be written to {}", chart.path().display());
        scheduler = scheduler.with_chart(Box::new(chart));
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
        ctrl_c.cancel();
    });

    scheduler
        .run(cancel, cycles, |report| print_cycle(report, offset))
        .await;

    scheduler.into_store().close()
}

fn print_cycle(report: &CycleReport, offset: chrono::FixedOffset) {
    let now = Utc::now().with_timezone(&offset).format("%Y-%m-%d %I:%M %p");
    println!("\nWeather Data in Tabular Form (cycle {}, {now}):", report.cycle);
    println!("{}", report::readings_table(&report.readings, offset));

    for failure in &report.failures {
        println!("Skipped {}: {}", failure.city, failure.error);
    }

    match &report.summary {
        Some(summary) => println!("{summary}"),
        None => println!("No data for today yet."),
    }

    for alert in &report.alerts {
        println!("{alert}");
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.api_key = Some(api_key.trim().to_string());
    }

    let cities = Text::new("Cities (comma separated):")
        .with_default(&config.cities.join(", "))
        .prompt()
        .context("Failed to read cities")?;
    config.cities = cities
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    config.poll_interval_secs = CustomType::<u64>::new("Poll interval (seconds):")
        .with_default(config.poll_interval_secs)
        .prompt()
        .context("Failed to read poll interval")?;

    config.validate()?;
    let path = config.save()?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn show_summary() -> Result<()> {
    let config = Config::load()?;
    let store = ReadingStore::open(&config.resolved_db_path()?)?;

    match summarize(&store)? {
        Some(summary) => println!("{summary}"),
        None => println!("No data for today yet."),
    }

    store.close()
}

fn render_chart() -> Result<()> {
    let config = Config::load()?;
    let store = ReadingStore::open(&config.resolved_db_path()?)?;
    let history = store.query_all()?;
    store.close()?;

    if history.is_empty() {
        warn!("No data available for plotting.");
        return Ok(());
    }

    let chart = SvgTrendChart::new(config.resolved_chart_path()?, config.display_offset()?);
    chart.render(&history)?;
    println!("Chart written to {}", chart.path().display());
    Ok(())
}
