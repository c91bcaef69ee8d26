//! Gabriel client entry point.
//!
//! ```text
//! gabriel-client                        Stream with defaults
//! gabriel-client --config <path>        Use custom config TOML
//! gabriel-client --host 10.0.0.5        Override the service host
//! gabriel-client --input ./frames       Stream a directory of images
//! gabriel-client --gen-config           Dump default config and exit
//! gabriel-client --gen-config <path>    Write default config to a file
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gabriel_core::{Client, JpegEncoder, open_source};

use gabriel_client::config::FileConfig;
use gabriel_client::presenter::{ConsolePresenter, countdown};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "gabriel-client", about = "Stream frames to a Gabriel service")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "gabriel-client.toml")]
    config: PathBuf,

    /// Service host (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Frame input (overrides config): `synthetic`, `synthetic:<n>`, an
    /// image file, or a directory of images.
    #[arg(short, long)]
    input: Option<String>,

    /// Use the legacy inline-result protocol.
    #[arg(long)]
    legacy: bool,

    /// Print the default configuration and exit, or write it to PATH.
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    gen_config: Option<Option<PathBuf>>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.gen_config {
        Some(Some(path)) => {
            FileConfig::write_default(&path)?;
            println!("wrote default config to {}", path.display());
            return Ok(());
        }
        Some(None) => {
            let text = toml::to_string_pretty(&FileConfig::default())?;
            println!("{text}");
            return Ok(());
        }
        None => {}
    }

    let mut config = FileConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(input) = cli.input {
        config.stream.input = input;
    }
    if cli.legacy {
        config.server.legacy = true;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("gabriel-client v{}", env!("CARGO_PKG_VERSION"));

    let presenter = Arc::new(ConsolePresenter::from_config(&config.presentation)?);
    let source = open_source(&config.stream.input)?;
    let encoder = Box::new(JpegEncoder::new(config.stream.jpeg_quality));

    let client = Client::new(config.to_client_config()).with_presenter(presenter.clone());
    let stop = client.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted; stopping session");
            stop.cancel();
        }
    });

    countdown(presenter.as_ref(), config.stream.countdown_secs, Duration::from_secs(1)).await;

    match client.run(source, encoder).await {
        Ok(summary) => {
            info!(
                frames_sent = summary.frames_sent,
                responses = summary.responses,
                "session finished: {:?}",
                summary.end
            );
            Ok(())
        }
        Err(e) => {
            error!("session failed: {e}");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_config_takes_an_optional_path() {
        let cli = Cli::try_parse_from(["gabriel-client"]).unwrap();
        assert_eq!(cli.gen_config, None);

        let cli = Cli::try_parse_from(["gabriel-client", "--gen-config"]).unwrap();
        assert_eq!(cli.gen_config, Some(None));

        let cli = Cli::try_parse_from(["gabriel-client", "--gen-config", "out.toml"]).unwrap();
        assert_eq!(cli.gen_config, Some(Some(PathBuf::from("out.toml"))));
    }
}
