use argh::FromArgs;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};

use wll_bridge::{HttpSource, PollConfig, Poller, TickError, WeatherRecord};

/// WeatherLink Live poller: writes one JSON weather record per line to stdout.
#[derive(FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c', default = "default_config_path()")]
    config: PathBuf,

    /// device hostname or IP, overrides the config file
    #[argh(option)]
    host: Option<String>,

    /// poll a single time, print the record and exit
    #[argh(switch)]
    once: bool,
}

fn default_config_path() -> PathBuf {
    PathBuf::from("config.yaml")
}

fn write_record(record: &WeatherRecord) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, record)?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();
    let config = PollConfig::resolve(&args.config, args.host.as_deref())?;

    let endpoint = config.endpoint();
    log::info!(
        "Polling {} every {}s (timeout {}s){}",
        endpoint.current_conditions_url(),
        config.poll_interval_secs,
        config.request_timeout_secs,
        config
            .hardware
            .as_ref()
            .map(|h| format!(" - {}", h))
            .unwrap_or_default()
    );

    let source = HttpSource::new(&endpoint, config.request_timeout())?;
    let mut poller = Poller::new(source, &config);

    if args.once {
        let now = chrono::Utc::now().timestamp();
        let record = poller.tick(now).await?;
        return write_record(&record);
    }

    // Graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    {
        let shutdown_tx = shutdown_tx.clone();
        ctrlc::set_handler(move || {
            log::info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown_tx.send(());
        })?;
    }

    let (records_tx, mut records_rx) = mpsc::channel(16);
    let poll_task = tokio::spawn(poller.run(records_tx, shutdown_rx));

    let mut fatal = None;
    while let Some(outcome) = records_rx.recv().await {
        match outcome {
            Ok(record) => write_record(&record)?,
            // Already logged by the poll loop with its tick time.
            Err(TickError::Recoverable(_)) => {}
            Err(TickError::Fatal(e)) => {
                fatal = Some(e);
                let _ = shutdown_tx.send(());
                break;
            }
        }
    }
    drop(records_rx);
    poll_task.await?;

    match fatal {
        Some(e) => Err(e.into()),
        None => {
            log::info!("Poller shut down, exiting");
            Ok(())
        }
    }
}
