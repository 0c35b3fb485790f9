use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use docket_bulk::downloader::LogProgress;
use docket_bulk::{download_documents, Config, LinkExtractor};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Set default log level to INFO if not specified
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "docket_bulk=info");
    }

    // Initialize logging to both console and file
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let file_appender = tracing_appender::rolling::never(".", "docket-bulk.log");

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env()),
        )
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match &cli.command {
        Commands::Download {
            input,
            output,
            reports,
            client_matter,
            concurrency,
        } => {
            input.apply(&mut config);
            if let Some(output) = output {
                config.output_dir = output.clone();
            }
            if let Some(reports) = reports {
                config.report_dir = reports.clone();
            }
            if client_matter.is_some() {
                config.client_matter = client_matter.clone();
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = *concurrency;
            }
            config.validate()?;

            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, finishing in-flight downloads");
                    interrupt.cancel();
                }
            });

            match download_documents(&config, Arc::new(LogProgress), cancel).await {
                Ok(summary) => {
                    println!(
                        "Downloaded {} of {} documents in {} seconds ({} failed{})",
                        summary.succeeded,
                        summary.total,
                        summary.elapsed.as_secs(),
                        summary.failed,
                        if summary.cancelled {
                            format!(", {} not attempted", summary.not_started)
                        } else {
                            String::new()
                        }
                    );
                    println!("Error report: {}", summary.report_path.display());
                }
                Err(e) => {
                    error!("Download failed: {}", e);
                    return Err(e.into());
                }
            }
        }

        Commands::List { input } => {
            input.apply(&mut config);
            config.validate()?;

            let tasks = LinkExtractor::new(&config.record_extension).extract(&config.input_dir)?;
            for task in &tasks {
                println!("{}/{}.pdf\t{}", task.subfolder, task.filename, task.url);
            }
            println!("{} documents", tasks.len());
        }
    }

    Ok(())
}
