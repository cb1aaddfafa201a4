//! maas-mcp - Model Context Protocol bridge for MAAS.
//!
//! Serves MAAS machine, network, tag and storage operations to MCP clients
//! over stdio or HTTP.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use maas_mcp::core::{logging, BackendKind, Config, TransportKind};
use maas_mcp::maas::{build_backend, BackendClient, MemoryBackend};
use maas_mcp::mcp::{Dispatcher, DispatcherOptions, MCPServerInfo, Registry};
use maas_mcp::transport::http::serve_http;
use maas_mcp::transport::stdio::{serve_stdio, StdioOptions};
use maas_mcp::{tools, APP_NAME, VERSION};

/// How long runtime teardown waits for outstanding blocking tasks.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// MCP bridge for MAAS bare-metal provisioning
#[derive(Parser)]
#[command(name = "maas-mcp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend implementation (overrides the config file)
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendKind>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP requests (default)
    Serve {
        /// Transport to serve on
        #[arg(short, long, value_enum)]
        transport: Option<TransportKind>,

        /// Host to bind when serving HTTP
        #[arg(long)]
        host: Option<String>,

        /// Port to bind when serving HTTP
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the tool and resource catalogue and exit
    Tools {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the effective configuration
    Config {
        /// Print the global config file path instead
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Events from config resolution go to a bootstrap subscriber until the
    // configured one can be built.
    let mut config = tracing::subscriber::with_default(logging::bootstrap(cli.verbose), || {
        Config::load(cli.config.as_deref())
    })?;
    if let Some(backend) = cli.backend {
        config.maas.backend = backend;
    }
    logging::init(&config.logging, cli.verbose);

    match cli.command {
        None => cmd_serve(config, None, None, None),
        Some(Commands::Serve { transport, host, port }) => cmd_serve(config, transport, host, port),
        Some(Commands::Tools { format }) => cmd_tools(&config, format),
        Some(Commands::Config { path }) => cmd_config(&config, path, cli.config.as_deref()),
    }
}

/// Build the dispatcher over the full catalogue.
fn build_dispatcher(config: &Config, backend: Arc<dyn BackendClient>) -> Result<Dispatcher> {
    let mut registry = Registry::new();
    tools::register_all(&mut registry, backend, config.retry_policy()?)?;

    let server_info = MCPServerInfo::new(config.server.name.clone(), VERSION);
    let options = DispatcherOptions { strict_jsonrpc: config.protocol.strict_jsonrpc };
    Ok(Dispatcher::new(Arc::new(registry), server_info, options))
}

fn cmd_serve(
    mut config: Config,
    transport: Option<TransportKind>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(transport) = transport {
        config.server.transport = transport;
    }
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate().context("invalid configuration")?;

    let backend = build_backend(&config.maas).context("failed to initialize MAAS backend")?;
    let dispatcher = Arc::new(build_dispatcher(&config, backend)?);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received");
        signal.cancel();
    })?;

    tracing::info!(
        version = VERSION,
        transport = ?config.server.transport,
        backend = ?config.maas.backend,
        tools = dispatcher.registry().tool_count(),
        resources = dispatcher.registry().resource_count(),
        "starting {APP_NAME}"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        match config.server.transport {
            TransportKind::Stdio => {
                serve_stdio(dispatcher, StdioOptions::from(&config.protocol), shutdown).await
            }
            TransportKind::Http => {
                serve_http(dispatcher, &config.server.host, config.server.port, shutdown).await
            }
        }
    });

    // A blocking stdin read may still be parked on a runtime thread while the
    // client keeps the pipe open; do not wait for it.
    rt.shutdown_timeout(SHUTDOWN_GRACE);
    result?;

    tracing::info!("shutdown complete");
    Ok(())
}

fn cmd_tools(config: &Config, format: OutputFormat) -> Result<()> {
    // The catalogue does not depend on the backend, so listing works offline.
    let backend: Arc<dyn BackendClient> = match config.maas.backend {
        BackendKind::Memory => Arc::new(MemoryBackend::seeded()),
        BackendKind::Http => {
            build_backend(&config.maas).unwrap_or_else(|_| Arc::new(MemoryBackend::new()))
        }
    };
    let document = build_dispatcher(config, backend)?.discover();

    match format {
        OutputFormat::Text => print!("{}", document.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&document)?),
    }
    Ok(())
}

fn cmd_config(config: &Config, show_path: bool, explicit: Option<&Path>) -> Result<()> {
    if show_path {
        match explicit.map(Path::to_path_buf).or_else(Config::global_config_path) {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("no config directory on this platform"),
        }
        return Ok(());
    }

    let mut shown = config.clone();
    if shown.maas.api_key.is_some() {
        shown.maas.api_key = Some("<redacted>".to_string());
    }
    print!("{}", shown.to_toml()?);
    Ok(())
}
