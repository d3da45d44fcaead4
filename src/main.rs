//! # Souvy CLI
//!
//! Command-line interface for the design editor backend.
//!
//! ## Usage
//!
//! ```bash
//! # Host editor sessions over HTTP
//! souvy serve --listen 0.0.0.0:8080
//!
//! # Composite a saved design onto a product photo
//! souvy render design.json --base mug.jpg -o preview.png
//!
//! # Ask the model where the printable surface is
//! GEMINI_API_KEY=... souvy zone https://shop.example/mug.jpg
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use souvy::{
    Customization, SouvyError,
    gateway::{AiGateway, GeminiBackend, ModelNames},
    render::{
        ExportOptions, Exporter, RasterResult, context::RenderContext, fetch::HttpFetcher,
        text::FontRegistry,
    },
    server::{self, SESSION_EXPIRATION_SECS, ServerConfig},
};

/// Souvy - personalised gift design editor backend
#[derive(Parser, Debug)]
#[command(name = "souvy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server hosting editor sessions
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,

        /// Prefix remote asset URLs are appended to (percent-encoded)
        #[arg(long, env = "SOUVY_ASSET_PROXY")]
        asset_proxy: Option<String>,

        /// Directory of font files named Family-Style.ttf
        #[arg(long, env = "SOUVY_FONTS_DIR")]
        fonts_dir: Option<PathBuf>,

        /// Gemini API key (AI features fall back without one)
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Model used for safe-zone detection
        #[arg(long, default_value = souvy::gateway::DEFAULT_SPATIAL_MODEL)]
        spatial_model: String,

        /// Model used for notes and receipt checks
        #[arg(long, default_value = souvy::gateway::DEFAULT_CREATIVE_MODEL)]
        creative_model: String,

        /// Seconds of inactivity before a session is discarded
        #[arg(long, default_value_t = SESSION_EXPIRATION_SECS)]
        session_ttl: u64,
    },

    /// Render a saved customization onto a base image
    Render {
        /// Customization JSON file
        design: PathBuf,

        /// Base image URL or file path
        #[arg(long)]
        base: String,

        /// Output PNG path
        #[arg(short, long, default_value = "preview.png")]
        output: PathBuf,

        /// Directory of font files named Family-Style.ttf
        #[arg(long, env = "SOUVY_FONTS_DIR")]
        fonts_dir: Option<PathBuf>,

        /// Prefix remote asset URLs are appended to (percent-encoded)
        #[arg(long, env = "SOUVY_ASSET_PROXY")]
        asset_proxy: Option<String>,

        /// Smaller output, slower encode
        #[arg(long)]
        best: bool,
    },

    /// Detect the printable safe zone of a product image
    Zone {
        /// Image URL or file path
        image: String,

        /// Gemini API key
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Model used for safe-zone detection
        #[arg(long, default_value = souvy::gateway::DEFAULT_SPATIAL_MODEL)]
        model: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), SouvyError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            listen,
            asset_proxy,
            fonts_dir,
            api_key,
            spatial_model,
            creative_model,
            session_ttl,
        } => {
            let config = ServerConfig {
                listen_addr: listen,
                asset_proxy,
                fonts_dir,
                gemini_api_key: api_key,
                models: ModelNames {
                    spatial: spatial_model,
                    creative: creative_model,
                },
                session_expiration_secs: session_ttl,
            };
            server::serve(config).await
        }

        Commands::Render {
            design,
            base,
            output,
            fonts_dir,
            asset_proxy,
            best,
        } => {
            let customization: Customization = serde_json::from_slice(&tokio::fs::read(&design).await?)?;
            let fonts = match fonts_dir {
                Some(dir) => FontRegistry::load_dir(&dir)?,
                None => FontRegistry::new(),
            };
            let fetcher = HttpFetcher::new(asset_proxy)?.with_local_files(true);
            let exporter = Exporter::with_options(
                RenderContext::new(Arc::new(fetcher), fonts),
                ExportOptions {
                    best_compression: best,
                    ..Default::default()
                },
            );

            match exporter.export(&base, &customization.elements).await {
                RasterResult::Rendered { width, height, png } => {
                    tokio::fs::write(&output, &png).await?;
                    println!(
                        "Rendered {} elements at {}x{} to {}",
                        customization.elements.len(),
                        width,
                        height,
                        output.display()
                    );
                    Ok(())
                }
                RasterResult::Empty => Err(SouvyError::Image(format!(
                    "Base image {} could not be loaded",
                    base
                ))),
            }
        }

        Commands::Zone {
            image,
            api_key,
            model,
        } => {
            let fetcher = Arc::new(HttpFetcher::new(None)?.with_local_files(true));
            let models = ModelNames {
                spatial: model,
                ..Default::default()
            };
            let gateway = match api_key.filter(|k| !k.is_empty()) {
                Some(key) => AiGateway::with_models(Arc::new(GeminiBackend::new(key)?), fetcher, models),
                None => {
                    tracing::warn!("GEMINI_API_KEY not set, reporting the fallback zone");
                    AiGateway::offline(fetcher)
                }
            };
            let zone = gateway.detect_safe_zone(&image).await;
            println!("{}", serde_json::to_string_pretty(&zone)?);
            Ok(())
        }
    }
}
