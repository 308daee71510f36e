use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use pulse::alerts::{AlertRecord, AlertSink, DeliveryStatus};
use pulse::analytics::Timeframe;
use pulse::config::MonitorConfig;
use pulse::events::{AttemptSample, FailureEvent};
use pulse::monitor::PaymentMonitor;
use pulse::store::MemoryEventStore;
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Command-line arguments for the payment failure monitor
#[derive(Parser)]
#[command(
    name = "pulse",
    about = "Payment failure monitor - pattern detection and alerting for checkout flows",
    long_about = "Replays payment failure events and checkout attempt samples through the \
                  monitoring engine, printing the alerts that fire and finishing with an \
                  analytics summary for the selected timeframe."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Event file to replay (newline-delimited JSON); reads stdin when omitted
    #[arg(short, long, value_name = "FILE", help = "NDJSON event file to replay")]
    replay: Option<PathBuf>,

    /// Timeframe for the closing analytics summary
    #[arg(short, long, default_value = "24h", help = "Summary timeframe: 1h, 24h, 7d or 30d")]
    timeframe: Timeframe,

    /// Restrict the summary to one gateway
    #[arg(short, long, help = "Gateway filter for the summary")]
    gateway: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging output")]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            if config_path.exists() && !config_path.is_file() {
                return Err(format!(
                    "Configuration path is not a file: {}",
                    config_path.display()
                ));
            }
        }

        if let Some(ref replay_path) = self.replay {
            if !replay_path.is_file() {
                return Err(format!("Replay file not found: {}", replay_path.display()));
            }
        }

        Ok(())
    }
}

/// One line of the NDJSON ingestion stream
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum IngestRecord {
    Failure(FailureEvent),
    Attempt(AttemptSample),
}

/// Sink that prints fired alerts to stdout as they happen
struct ConsoleSink;

impl AlertSink for ConsoleSink {
    fn deliver(&self, record: &AlertRecord) -> DeliveryStatus {
        println!(
            "[{}] {}: {}",
            record.severity.to_string().to_uppercase(),
            record.rule,
            record.message
        );
        DeliveryStatus::Delivered
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(message) = cli.validate() {
        anyhow::bail!(message);
    }

    let mut builder = env_logger::Builder::from_default_env();
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    let config = match &cli.config {
        Some(path) if path.exists() => MonitorConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        Some(path) => {
            warn!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
            MonitorConfig::default()
        }
        None => MonitorConfig::default(),
    };

    let store = Arc::new(MemoryEventStore::new());
    let monitor = PaymentMonitor::new(store, config, Arc::new(ConsoleSink))
        .context("initializing monitor")?;

    let running = Arc::new(AtomicBool::new(true));
    let running_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_flag.store(false, Ordering::SeqCst);
    })
    .context("installing signal handler")?;

    let reader: Box<dyn BufRead> = match &cli.replay {
        Some(path) => Box::new(BufReader::new(
            std::fs::File::open(path)
                .with_context(|| format!("opening replay file {}", path.display()))?,
        )),
        None => {
            info!("Reading events from stdin (ctrl-c to stop)");
            Box::new(BufReader::new(std::io::stdin()))
        }
    };

    let (failures, attempts, skipped) = ingest(&monitor, reader, &running)?;
    info!(
        "Ingested {} failures and {} attempts ({} lines skipped)",
        failures, attempts, skipped
    );

    print_summary(&monitor, cli.timeframe, cli.gateway.as_deref())?;

    Ok(())
}

/// Feed ingest records into the monitor until EOF or shutdown
fn ingest(
    monitor: &PaymentMonitor,
    reader: Box<dyn BufRead>,
    running: &AtomicBool,
) -> anyhow::Result<(u64, u64, u64)> {
    let mut failures = 0u64;
    let mut attempts = 0u64;
    let mut skipped = 0u64;

    for (line_number, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            info!("Shutdown requested, stopping ingestion");
            break;
        }

        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: IngestRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed line {}: {}", line_number + 1, e);
                skipped += 1;
                continue;
            }
        };

        match record {
            IngestRecord::Failure(event) => match monitor.record_failure(event) {
                Ok(Some(_)) => failures += 1,
                Ok(None) => skipped += 1,
                Err(e) => {
                    warn!("Skipping failure on line {}: {}", line_number + 1, e);
                    skipped += 1;
                }
            },
            IngestRecord::Attempt(sample) => match monitor.record_attempt(sample) {
                Ok(()) => attempts += 1,
                Err(e) => {
                    warn!("Skipping attempt on line {}: {}", line_number + 1, e);
                    skipped += 1;
                }
            },
        }
    }

    Ok((failures, attempts, skipped))
}

/// Print the analytics summary for the selected timeframe
fn print_summary(
    monitor: &PaymentMonitor,
    timeframe: Timeframe,
    gateway: Option<&str>,
) -> anyhow::Result<()> {
    let report = monitor
        .analytics(timeframe, gateway)
        .context("building analytics report")?;
    let overview = &report.overview.current;

    println!();
    println!("=== Summary ===");
    println!(
        "Failures: {} ({} orders, {} customers)",
        overview.total_failures, overview.unique_failed_orders, overview.unique_customers
    );
    println!(
        "Amount lost: {:.2} (avg {:.2})",
        overview.total_amount_lost, overview.avg_failure_amount
    );
    println!(
        "Failure rate: {:.1}% over {} attempts",
        overview.failure_rate, overview.total_attempts
    );

    if !report.gateways.gateways.is_empty() {
        println!();
        println!("Gateways (best first):");
        for gw in &report.gateways.gateways {
            println!(
                "  {:<12} score {:>5.1}  {:<9} {} failures, {:.1}% success",
                gw.gateway, gw.performance_score, gw.status, gw.failure_count, gw.success_rate
            );
        }
    }

    if !report.errors.errors.is_empty() {
        println!();
        println!(
            "Top errors ({} distinct, diversity {:.2}):",
            report.errors.total_unique_errors, report.errors.diversity_index
        );
        for error in &report.errors.errors {
            println!(
                "  {:<24} {:>5} ({:.1}%)",
                error.error_code, error.count, error.percentage
            );
        }
    }

    if !report.trends.anomalies.is_empty() {
        println!();
        println!("Anomalous periods:");
        for anomaly in &report.trends.anomalies {
            println!(
                "  {}: {} failures (threshold {:.1}, {:?})",
                anomaly.period, anomaly.value, anomaly.threshold, anomaly.severity
            );
        }
    }

    Ok(())
}
