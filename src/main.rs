use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use angie_api_input::config::parse_duration;
use angie_api_input::metrics::line_protocol;
use angie_api_input::{AngieApi, MetricsCollector, ShimConfig};

/// Standalone runner: gathers from the Angie status API and writes the
/// measurements to stdout for a metrics agent to pick up.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the config file for this plugin
    #[arg(long)]
    config: Option<PathBuf>,

    /// How often to send metrics
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    poll_interval: Duration,

    /// Poll every `--poll-interval` instead of once per line on stdin
    #[arg(long)]
    poll_interval_enabled: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Influx)]
    format: OutputFormat,

    /// Print the sample configuration and exit
    #[arg(long)]
    sample_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// InfluxDB line protocol
    Influx,
    /// One JSON object per line
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // ── 1. Logging (stderr; stdout carries measurements) ─────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.sample_config {
        print!("{}", angie_api_input::sample_config());
        return Ok(());
    }

    // ── 2. Load plugin instances ─────────────────────────────────
    let shim = match &args.config {
        Some(path) => ShimConfig::load(path).context("loading input config")?,
        None => ShimConfig::default(),
    };
    let plugins: Vec<AngieApi> = shim.instances().into_iter().map(AngieApi::new).collect();
    info!(instances = plugins.len(), "angie_api input loaded");

    let collector = Arc::new(MetricsCollector::new());

    // ── 3. Gather per stdin line, or on every tick; stop at EOF ──
    if !args.poll_interval_enabled {
        let (plugins, collector, format) = (&plugins[..], &collector, args.format);
        let cycles = gather_per_line(BufReader::new(tokio::io::stdin()), move || {
            cycle(plugins, collector, format)
        })
        .await?;
        info!(cycles, "stdin closed, shutting down");
        return Ok(());
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut ticks = IntervalStream::new(tokio::time::interval(args.poll_interval));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                return Ok(());
            }
            line = stdin.next_line() => {
                if line?.is_none() {
                    info!("stdin closed, shutting down");
                    return Ok(());
                }
            }
            Some(_) = ticks.next() => {
                if let Err(err) = cycle(&plugins, &collector, args.format).await {
                    error!(%err, "poll cycle failed");
                }
            }
        }
    }
}

/// Run `gather` once for every line read from `input`, until EOF.
/// Returns the number of cycles run; a failed cycle is logged and the
/// loop keeps waiting for the next line.
async fn gather_per_line<R, F, Fut>(input: R, mut gather: F) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut lines = input.lines();
    let mut cycles = 0;
    while lines.next_line().await?.is_some() {
        if let Err(err) = gather().await {
            error!(%err, "poll cycle failed");
        }
        cycles += 1;
    }
    Ok(cycles)
}

/// One poll cycle over every plugin instance, then flush to stdout.
async fn cycle(
    plugins: &[AngieApi],
    collector: &Arc<MetricsCollector>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    for plugin in plugins {
        plugin.gather(collector.clone()).await?;
    }

    let gathered = collector.drain();
    for err in &gathered.errors {
        error!(%err, "gather error");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for m in &gathered.measurements {
        match format {
            OutputFormat::Influx => {
                if let Some(line) = line_protocol::encode(m) {
                    writeln!(out, "{line}")?;
                }
            }
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(m)?)?,
        }
    }
    out.flush()?;
    Ok(())
}
