use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ocr_gateway_core::config_file::{self, ConfigFile, OcrConfig, ServerConfig};
use ocr_gateway_core::{OcrBackend, TesseractBackend};
use ocr_gateway_web::OcrServer;

/// OCR Gateway - upload an image, get its text back as JSON
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (default 6000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a TOML config file (replaces the default config lookup)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tesseract language pack(s), e.g. "eng" or "eng+jpn"
    #[arg(long)]
    language: Option<String>,

    /// Seconds a single OCR call may take
    #[arg(long)]
    timeout: Option<u64>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "ocr_gateway_core=debug,ocr_gateway_web=debug,tower_http=debug"
    } else {
        "ocr_gateway_core=info,ocr_gateway_web=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    // Resolve configuration: CLI flags > env vars > config file > defaults
    let file = match &cli.config {
        Some(path) => config_file::read_config(path)?,
        None => config_file::load_config(),
    };
    let merged = config_file::merge(config_file::merge(file, env_overrides()), cli_overrides(&cli));
    let config = config_file::resolve(&merged).context("invalid configuration")?;

    let backend = Arc::new(TesseractBackend::with_options(config.tesseract_options()));
    if !backend.is_available() {
        tracing::warn!(
            binary = %config.tesseract.binary.display(),
            "tesseract is not runnable; OCR requests will fail until it is installed"
        );
    }

    let server = OcrServer::new(config, backend);
    let running = server
        .start()
        .await
        .with_context(|| format!("failed to bind {}", server.config().bind_addr()))?;

    tokio::signal::ctrl_c().await?;
    running.stop().await?;

    Ok(())
}

fn env_overrides() -> ConfigFile {
    ConfigFile {
        server: Some(ServerConfig {
            host: std::env::var("OCR_GATEWAY_HOST").ok(),
            port: std::env::var("OCR_GATEWAY_PORT")
                .ok()
                .and_then(|v| v.parse().ok()),
            max_upload_mb: None,
        }),
        ocr: Some(OcrConfig {
            tesseract_path: std::env::var("TESSERACT_PATH").ok(),
            language: std::env::var("OCR_GATEWAY_LANGUAGE").ok(),
            page_segmentation_mode: None,
            timeout_secs: std::env::var("OCR_GATEWAY_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok()),
        }),
        images: None,
    }
}

fn cli_overrides(cli: &Cli) -> ConfigFile {
    ConfigFile {
        server: Some(ServerConfig {
            host: cli.host.clone(),
            port: cli.port,
            max_upload_mb: None,
        }),
        ocr: Some(OcrConfig {
            language: cli.language.clone(),
            timeout_secs: cli.timeout,
            ..Default::default()
        }),
        images: None,
    }
}
