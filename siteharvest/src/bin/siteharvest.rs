//! Command-line entry point: run one harvest configuration.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
#[cfg(feature = "browser")]
use std::time::Duration;
use tracing::{info, warn};

use siteharvest::config::RunConfig;
#[cfg(feature = "browser")]
use siteharvest::driver::{BrowserLaunch, BrowserPageDriver};
use siteharvest::driver::{FetchConfig, HtmlPageDriver, PageDriver, ReqwestFetcher};
use siteharvest::events::LoggingEventSink;
use siteharvest::observability::{init_tracing, LogFormat, DEFAULT_FILTER};
use siteharvest::orchestrator::{Harvester, RunSummary};
use siteharvest::output::sink_for_path;

/// Which page driver performs the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DriverKind {
    /// Fetch documents over HTTP; scripts never run.
    Static,
    /// Drive a Chromium-family browser over DevTools.
    Browser,
}

/// Extract tabular records from listing pages.
#[derive(Debug, Parser)]
#[command(name = "siteharvest", version, about)]
struct Cli {
    /// JSON run configuration.
    #[arg(short, long)]
    config: PathBuf,

    /// Output file; overrides `output_file` from the configuration.
    /// `.jsonl`/`.ndjson` write JSON lines, anything else writes CSV.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Request and navigation timeout in seconds.
    #[arg(long, default_value_t = 30.0)]
    timeout: f64,

    /// Page driver.
    #[arg(long, value_enum, default_value_t = DriverKind::Static)]
    driver: DriverKind,

    /// Browser executable for `--driver browser` (defaults to `$CHROME_PATH`
    /// or `chromium`).
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Attach to this DevTools page endpoint instead of starting a browser.
    #[arg(long)]
    devtools: Option<String>,
}

async fn harvest<D: PageDriver>(config: RunConfig, driver: D) -> anyhow::Result<RunSummary> {
    let output_file = config.output_file.clone();
    let harvester =
        Harvester::new(config, driver)?.with_event_sink(Arc::new(LoggingEventSink::debug()));

    let mut sink = sink_for_path(&output_file);
    let summary = harvester.run(sink.as_mut()).await?;
    info!(output = %output_file.display(), "Output written");
    Ok(summary)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(DEFAULT_FILTER, cli.log_format)?;

    let mut config = RunConfig::from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(output) = cli.output {
        config = config.with_output_file(output);
    }
    let output_file = config.output_file.clone();

    let summary = match cli.driver {
        DriverKind::Static => {
            if config.headful {
                warn!("headful requested; the static page driver never opens a window");
            }
            let fetcher = ReqwestFetcher::new(FetchConfig::new().with_timeout(cli.timeout))?;
            harvest(config, HtmlPageDriver::new(fetcher)).await?
        }
        #[cfg(feature = "browser")]
        DriverKind::Browser => {
            let timeout = Duration::from_secs_f64(cli.timeout.max(0.0));
            let driver = match cli.devtools {
                Some(endpoint) => BrowserPageDriver::connect(&endpoint).await,
                None => {
                    let mut launch = BrowserLaunch::default().with_headful(config.headful);
                    if let Some(chrome) = cli.chrome {
                        launch = launch.with_executable(chrome);
                    }
                    BrowserPageDriver::launch(launch).await
                }
            }
            .context("starting the browser driver")?
            .with_navigation_timeout(timeout);
            harvest(config, driver).await?
        }
        #[cfg(not(feature = "browser"))]
        DriverKind::Browser => {
            let _ = (cli.chrome, cli.devtools);
            anyhow::bail!("this build has no browser driver; rebuild with the `browser` feature")
        }
    };

    println!("{} -> {}", summary.describe(), output_file.display());
    Ok(())
}
