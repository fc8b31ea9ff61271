mod app;
mod view;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use pulse_core::{
    AlertSource, BackendMode, CategoryFilter, FeedbackTransport, HttpBackend, InterestStore,
    LocationDirectory, MockAlertSource, MockFeedbackTransport, MockInterestStore, PulseConfig,
};
use reqwest::{redirect, ClientBuilder};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::{App, Backend};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Mock,
    Http,
}

#[derive(Debug, Parser)]
#[command(name = "pulse", version, about = "Live traffic, weather and safety alerts for Bengaluru")]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where alerts come from
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,
    /// Base URL of the alert API when using the http backend
    #[arg(long)]
    base_url: Option<String>,
    /// Category shown after the first load: all, traffic, weather or safety
    #[arg(long, default_value = "all")]
    filter: CategoryFilter,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PulseConfig::from_file(path)?,
        None => PulseConfig::load(),
    };
    if let Some(backend) = cli.backend {
        config.backend.mode = match backend {
            BackendArg::Mock => BackendMode::Mock,
            BackendArg::Http => BackendMode::Http,
        };
    }
    if let Some(base_url) = cli.base_url {
        config.backend.base_url = base_url;
    }
    config.validate()?;

    let backend = build_backend(&config)?;
    info!(mode = ?config.backend.mode, "starting Pulse Bengaluru");

    let app = App::new(backend, LocationDirectory::new(&config.source), &config);
    app.run(cli.filter).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_backend(config: &PulseConfig) -> Result<Backend, Box<dyn std::error::Error>> {
    match config.backend.mode {
        BackendMode::Mock => Ok(Backend {
            source: Arc::new(MockAlertSource::new(&config.source)) as Arc<dyn AlertSource>,
            transport: Arc::new(MockFeedbackTransport::new(&config.source))
                as Arc<dyn FeedbackTransport>,
            interests: Arc::new(MockInterestStore::new(&config.source)) as Arc<dyn InterestStore>,
        }),
        BackendMode::Http => {
            let client = ClientBuilder::new()
                .redirect(redirect::Policy::limited(5))
                .user_agent("PulseBengaluru/0.1")
                .timeout(config.feed.request_timeout())
                .build()?;
            let http = Arc::new(HttpBackend::new(client, &config.backend.base_url)?);
            Ok(Backend {
                source: http.clone(),
                transport: http.clone(),
                interests: http,
            })
        }
    }
}
