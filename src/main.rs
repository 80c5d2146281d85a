//! WolfShare - Peer-to-Peer File Sharing Node
//!
//! Runs a sharing node or the name directory the nodes use to find
//! each other.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfshare::config::WolfShareConfig;
use wolfshare::directory::{DirectoryServer, RemoteDirectory};
use wolfshare::error::Result;
use wolfshare::network::{MessageHandler, NetworkClient, NetworkServer, Transport};
use wolfshare::node::{Node, NodeParts, NodeService};

/// WolfShare - Peer-to-Peer File Sharing Node
#[derive(Parser)]
#[command(name = "wolfshare")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolfshare.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a sharing node
    Start,

    /// Run the name directory
    Directory {
        /// Address to listen on
        #[arg(short, long, default_value = "0.0.0.0:9090")]
        listen: String,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfshare.toml")]
        output: PathBuf,

        /// Node ID
        #[arg(long, default_value = "node-1")]
        node_id: String,
    },

    /// Validate configuration file
    Validate,

    /// Show node information
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The config file's level applies unless overridden on the command line
    let level = match (&cli.log_level, &cli.command) {
        (Some(level), _) => level.clone(),
        (None, Commands::Start) => WolfShareConfig::from_file(&cli.config)
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string()),
        (None, _) => "info".to_string(),
    };
    init_logging(&level);

    match cli.command {
        Commands::Start => run_start(cli.config).await,
        Commands::Directory { listen } => run_directory(listen).await,
        Commands::Init { output, node_id } => run_init(output, node_id),
        Commands::Validate => run_validate(cli.config),
        Commands::Info => run_info(cli.config),
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Start a sharing node
async fn run_start(config_path: PathBuf) -> Result<()> {
    tracing::info!("Starting WolfShare node...");

    let config = match WolfShareConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load configuration from {:?}: {}", config_path, e);
            tracing::error!("Please check that the config file exists and is valid TOML");
            return Err(e);
        }
    };
    tracing::info!("Loaded configuration for node: {}", config.node.id);

    let server = match NetworkServer::bind(&config.node.bind_address).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.node.bind_address, e);
            return Err(e);
        }
    };

    let transport: Arc<dyn Transport> = Arc::new(NetworkClient::default());
    let directory = Arc::new(RemoteDirectory::new(
        Arc::clone(&transport),
        config.directory.address.clone(),
        config.directory.call_timeout(),
    ));
    tracing::info!("Using directory at {}", config.directory.address);

    let node = Arc::new(Node::new(NodeParts::from_config(&config, directory, transport)));
    let service: Arc<dyn MessageHandler> = Arc::new(NodeService::new(Arc::clone(&node)));

    let server_task = tokio::spawn(server.serve(service, node.shutdown_signal()));

    if let Err(e) = node.join().await {
        tracing::error!("Failed to join: {}", e);
        tracing::error!("Please check that the directory is running at {}", config.directory.address);
        node.shutdown().await;
        return Err(e);
    }

    let monitor = node.spawn_heartbeat();

    println!();
    println!("WolfShare node {} running", config.node.id);
    println!("  Listening:   {}", config.advertise_address());
    println!("  Sharing:     {}", config.shared_dir().display());
    println!("  Directory:   {}", config.directory.address);
    println!();
    println!("Press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }

    tracing::info!("Shutting down...");
    node.shutdown().await;
    let _ = monitor.await;
    match server_task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Server task failed: {}", e);
            Ok(())
        }
    }
}

/// Run the name directory
async fn run_directory(listen: String) -> Result<()> {
    let server = NetworkServer::bind(&listen).await?;
    let handler: Arc<dyn MessageHandler> = Arc::new(DirectoryServer::default());
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    println!("WolfShare directory listening on {}", server.local_addr());

    tokio::select! {
        result = server.serve(handler, shutdown_rx) => {
            if let Err(e) = result {
                tracing::error!("Directory server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down directory...");
            let _ = shutdown_tx.send(true);
        }
    }

    Ok(())
}

/// Generate a configuration file
fn run_init(output: PathBuf, node_id: String) -> Result<()> {
    let config_content = format!(r#"# WolfShare Configuration
# Generated configuration file

[node]
id = "{node_id}"
bind_address = "0.0.0.0:7700"
# advertise_address = "my-public-ip:7700"
shared_dir = "shared/{node_id}"
request_timeout_ms = 5000

[directory]
address = "127.0.0.1:9090"
call_timeout_ms = 1000

[election]
vote_timeout_ms = 600
max_parallel_requests = 32
notice_ttl_ms = 3000

[heartbeat]
probe_timeout_ms = 400
interval_min_ms = 200
interval_max_ms = 400
startup_jitter_min_ms = 500
startup_jitter_max_ms = 2000
absent_wait_ms = 1500
error_backoff_ms = 1000

[logging]
level = "info"
"#);

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to set the advertised address and directory.");
    println!("Then start with: wolfshare --config {} start", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    match WolfShareConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Node ID: {}", config.node.id);
            println!("  Bind Address: {}", config.node.bind_address);
            println!("  Directory: {}", config.directory.address);
            println!("  Shared Directory: {}", config.shared_dir().display());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Show node information
fn run_info(config_path: PathBuf) -> Result<()> {
    let config = WolfShareConfig::from_file(&config_path)?;

    println!("WolfShare Node Information");
    println!("==========================");
    println!();
    println!("Node ID:          {}", config.node.id);
    println!("Bind Address:     {}", config.node.bind_address);
    println!("Advertise:        {}", config.advertise_address());
    println!("Shared Directory: {}", config.shared_dir().display());
    println!("Request Timeout:  {} ms", config.node.request_timeout_ms);
    println!();
    println!("Directory:");
    println!("  Address:        {}", config.directory.address);
    println!("  Call Timeout:   {} ms", config.directory.call_timeout_ms);
    println!();
    println!("Election:");
    println!("  Vote Timeout:   {} ms", config.election.vote_timeout_ms);
    println!("  Parallelism:    {}", config.election.max_parallel_requests);
    println!("  Notice TTL:     {} ms", config.election.notice_ttl_ms);
    println!();
    println!("Heartbeat:");
    println!("  Probe Timeout:  {} ms", config.heartbeat.probe_timeout_ms);
    println!(
        "  Interval:       {}-{} ms",
        config.heartbeat.interval_min_ms, config.heartbeat.interval_max_ms
    );
    println!("  Absent Wait:    {} ms", config.heartbeat.absent_wait_ms);

    Ok(())
}
