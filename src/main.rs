mod api;
mod dispatcher;
mod gateway;
mod numbers;

use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use wablast_channels::WhatsAppBridge;
use wablast_core::{config, traits::MessagingClient};
use wablast_store::{MediaStager, SettingsFile, Store};

#[derive(Parser)]
#[command(
    name = "wablast",
    version,
    about = "WhatsApp blast dispatcher: contacts, bulk sends, delivery history"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", env = "WABLAST_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dispatcher and the HTTP API.
    Start,
    /// Check configuration, storage, and the WhatsApp bridge.
    Status,
    /// Print random Indonesian mobile numbers.
    GenerateNumbers {
        /// How many numbers to print.
        #[arg(default_value_t = 10)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let cfg = config::load(&cli.config)?;
            let data_dir = cfg.blast.data_path();
            let _log_guard = init_logging(&cfg.blast.log_level, &data_dir)?;

            let store = Store::new(&cfg.storage).await?;
            let settings = Arc::new(SettingsFile::for_data_dir(&data_dir).await?);
            let bridge = Arc::new(WhatsAppBridge::new(&cfg.whatsapp)?);
            let client: Arc<dyn MessagingClient> = bridge.clone();

            let dispatcher = Arc::new(dispatcher::Dispatcher::new(
                client.clone(),
                Arc::new(store.clone()),
                MediaStager::for_data_dir(&data_dir),
                &cfg.dispatch,
            ));
            let initial = settings.get().await;
            dispatcher.set_message_delay(Duration::from_secs(initial.message_delay));

            let inbound = bridge.start().await;

            let state = api::ApiState::new(
                dispatcher,
                client,
                Some(bridge),
                store,
                settings,
                &cfg.api,
            );

            println!("wablast: starting {}...", cfg.blast.name);
            let gw = Arc::new(gateway::Gateway::new(state, cfg.api.clone()));
            gw.run(inbound).await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("wablast status\n");
            println!("Config: {}", cli.config);
            println!("Data dir: {}", cfg.blast.data_path().display());
            println!("API: http://{}:{}", cfg.api.host, cfg.api.port);
            println!(
                "Auth: {}",
                if cfg.api.api_key.trim().is_empty() {
                    "disabled"
                } else {
                    "enforced"
                }
            );
            println!("Dispatch: {:?}", cfg.dispatch.mode);
            println!();

            match Store::new(&cfg.storage).await {
                Ok(store) => {
                    let size = store.db_size().await.unwrap_or(0);
                    let contacts = store.count_contacts().await.unwrap_or(0);
                    println!("  storage: ok ({contacts} contacts, {size} bytes)");
                    store.close().await;
                }
                Err(e) => println!("  storage: {e}"),
            }

            let bridge = WhatsAppBridge::new(&cfg.whatsapp)?;
            match bridge.initialize().await {
                Ok(()) => println!("  whatsapp bridge: reachable ({})", cfg.whatsapp.bridge_url),
                Err(e) => println!("  whatsapp bridge: {e}"),
            }
        }
        Commands::GenerateNumbers { count } => {
            if !(1..=numbers::MAX_GENERATED).contains(&count) {
                anyhow::bail!("count must be between 1 and {}", numbers::MAX_GENERATED);
            }
            for number in numbers::generate_numbers(count) {
                println!("{number}");
            }
        }
    }

    Ok(())
}

/// Console plus `{data_dir}/logs/wablast.log`. `RUST_LOG` overrides the
/// configured level. The guard must live until exit.
fn init_logging(level: &str, data_dir: &Path) -> anyhow::Result<WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "wablast.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    info!("logging to {}", log_dir.join("wablast.log").display());
    Ok(guard)
}
