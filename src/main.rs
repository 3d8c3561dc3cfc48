use clap::Parser;
use futures::StreamExt;
use log_tailer::{Config, RecordStream};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Tail a log source and print extracted records.
#[derive(Debug, Parser)]
#[command(name = "log-tailer", version, about)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone())),
        )
        .init();

    let config = match Config::from_file(&args.config).await {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            process::exit(1);
        }
    };

    let mut stream = match RecordStream::new(config).await {
        Ok(stream) => stream,
        Err(err) => {
            error!(error = %err, "failed to start the tail pipeline");
            process::exit(1);
        }
    };

    let mut failed = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; shutting down");
                break;
            }
            record = stream.next() => match record {
                Some(Ok(record)) => println!("{} {}", record.channel, record.payload),
                Some(Err(err)) => {
                    error!(error = %err, "pipeline failed");
                    failed = true;
                    break;
                }
                None => break,
            }
        }
    }

    // dropping the stream requests shutdown; wait for the pipeline to
    // finish its reverse-order teardown before exiting
    let health = stream.health();
    drop(stream);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while health.is_live() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    if failed {
        process::exit(1);
    }
    info!("stream ended");
}
