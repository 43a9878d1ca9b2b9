//! Widget REST Web Server Binary
//!
//! This binary starts the web server that exposes a site's sidebars and
//! widgets over a REST API.
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings (port 3001, built-in site, ~/.config/WidgetRest/options.json)
//! widget-rest-web
//!
//! # Serve a site definition and keep placements in a specific file
//! widget-rest-web --port 8080 --site site.toml --data widgets.json
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use widget_rest::config::Config;
use widget_rest::web;

/// Widget REST Web Server - REST API for sidebar and widget placement
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Site definition file (TOML) listing sidebars and widget types
    #[arg(short, long)]
    site: Option<PathBuf>,

    /// JSON file holding placements and widget settings.
    /// Defaults to the platform-specific config directory:
    /// - Linux: ~/.config/WidgetRest/options.json
    /// - macOS: ~/Library/Application Support/WidgetRest/options.json
    /// - Windows: %APPDATA%\WidgetRest\options.json
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Configuration file (defaults to the platform-specific config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration, then apply command-line overrides
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(site) = args.site {
        config.paths.site_file = Some(site);
    }
    if let Some(data) = args.data {
        config.paths.data_file = Some(data);
    }
    config.validate().context("Invalid configuration")?;

    info!("Data file: {}", config.paths.data_file()?.display());

    // Build socket address
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid host or port")?;

    // Start the server
    web::run_server(config, addr).await
}
