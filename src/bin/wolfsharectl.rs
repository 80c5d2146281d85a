//! WolfShareCtl - Command line tool for a running WolfShare node
//!
//! Usage:
//!   wolfsharectl status           - Show node role and epoch
//!   wolfsharectl tracker          - Show the current tracker
//!   wolfsharectl elect            - Start an election on the node
//!   wolfsharectl list             - List files shared by the node
//!   wolfsharectl list-all         - List every file known to the tracker
//!   wolfsharectl add <name>       - Share a file
//!   wolfsharectl remove <name>    - Stop sharing a file
//!   wolfsharectl download <name>  - Download a file from another node

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use wolfshare::config::WolfShareConfig;
use wolfshare::network::{Message, NetworkClient, Transport};

/// WolfShare Node Control Tool
#[derive(Parser)]
#[command(name = "wolfsharectl")]
#[command(about = "Control and monitor a WolfShare node", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "wolfshare.toml")]
    config: PathBuf,

    /// Node address to connect to (overrides config)
    #[arg(short, long)]
    node: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Print status and listings as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show status of the node
    Status,
    /// Show which node is the tracker
    Tracker,
    /// Start an election on the node
    Elect,
    /// List files shared by the node
    List,
    /// List every file in the network
    ListAll,
    /// Share a file
    Add {
        /// File name in the shared directory
        name: String,
        /// Local file to copy the content from (empty file if omitted)
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Stop sharing a file
    Remove {
        /// File name in the shared directory
        name: String,
    },
    /// Download a file from another node
    Download {
        /// File name to fetch
        name: String,
    },
}

type CtlResult = Result<(), Box<dyn std::error::Error>>;

/// Node endpoint from the command line or the config file
fn resolve_endpoint(cli: &Cli) -> String {
    if let Some(node) = &cli.node {
        return node.clone();
    }

    match WolfShareConfig::from_file(&cli.config) {
        Ok(config) => {
            // Convert bind address to localhost if it's 0.0.0.0
            let addr = config.advertise_address();
            if let Some(port) = addr.strip_prefix("0.0.0.0:") {
                format!("127.0.0.1:{}", port)
            } else {
                addr.to_string()
            }
        }
        Err(_) => "127.0.0.1:7700".to_string(),
    }
}

struct Control {
    client: NetworkClient,
    endpoint: String,
    timeout: Duration,
    json: bool,
}

impl Control {
    async fn call(&self, message: Message) -> Result<Message, Box<dyn std::error::Error>> {
        match self.client.call(&self.endpoint, message, self.timeout).await? {
            Message::Error { code, message } => Err(format!("{:?}: {}", code, message).into()),
            reply => Ok(reply),
        }
    }
}

fn unexpected(reply: Message) -> Box<dyn std::error::Error> {
    format!("unexpected reply: {}", reply.type_name()).into()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let control = Control {
        client: NetworkClient::default(),
        endpoint: resolve_endpoint(&cli),
        timeout: Duration::from_millis(cli.timeout_ms),
        json: cli.json,
    };

    let result = match &cli.command {
        Commands::Status => show_status(&control).await,
        Commands::Tracker => show_tracker(&control).await,
        Commands::Elect => elect(&control).await,
        Commands::List => list_local(&control).await,
        Commands::ListAll => list_all(&control).await,
        Commands::Add { name, from } => add(&control, name, from.as_deref()).await,
        Commands::Remove { name } => remove(&control, name).await,
        Commands::Download { name } => download(&control, name).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ============ Commands ============

async fn show_status(control: &Control) -> CtlResult {
    match control.call(Message::StatusRequest).await? {
        Message::StatusResponse {
            node_id,
            address,
            epoch,
            role,
            election_in_progress,
            tracker_address,
            joined_at,
        } => {
            if control.json {
                let status = serde_json::json!({
                    "node_id": node_id,
                    "address": address,
                    "role": role,
                    "epoch": epoch,
                    "election_in_progress": election_in_progress,
                    "tracker_address": tracker_address,
                    "joined_at": joined_at,
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(());
            }

            println!();
            println!("WolfShare Node Status (wolfsharectl v{})", env!("CARGO_PKG_VERSION"));
            println!("=========================================");
            println!();
            println!("Node ID:     {}", node_id);
            println!("Address:     {}", address);
            println!("Role:        {}", role);
            println!("Epoch:       {}", epoch);
            println!("Election:    {}", if election_in_progress { "in progress" } else { "idle" });
            println!("Tracker:     {}", tracker_address.as_deref().unwrap_or("NONE"));
            println!("Joined:      {}", joined_at);
            println!();
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

async fn show_tracker(control: &Control) -> CtlResult {
    match control.call(Message::StatusRequest).await? {
        Message::StatusResponse {
            epoch,
            tracker_address,
            ..
        } => {
            match tracker_address {
                Some(address) => println!("Tracker: {} (epoch {})", address, epoch),
                None => println!("Tracker: NONE"),
            }
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

async fn elect(control: &Control) -> CtlResult {
    match control.call(Message::TriggerElection).await? {
        Message::ElectionReport {
            won,
            epoch,
            granted,
            respondents,
            skipped,
        } => {
            if skipped {
                println!("Election not started, another election is in progress");
            } else if won {
                println!(
                    "\x1b[32mWon\x1b[0m election for epoch {} ({}/{} votes)",
                    epoch, granted, respondents
                );
            } else {
                println!(
                    "\x1b[33mLost\x1b[0m election ({}/{} votes), epoch stays {}",
                    granted, respondents, epoch
                );
            }
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

async fn list_local(control: &Control) -> CtlResult {
    match control.call(Message::ListLocal).await? {
        Message::LocalFiles { filenames } => {
            if control.json {
                println!("{}", serde_json::to_string_pretty(&filenames)?);
                return Ok(());
            }
            if filenames.is_empty() {
                println!("No files shared");
            }
            for name in filenames {
                println!("{}", name);
            }
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

async fn list_all(control: &Control) -> CtlResult {
    match control.call(Message::ListNetwork).await? {
        Message::FileIndex { files } if control.json => {
            println!("{}", serde_json::to_string_pretty(&files)?);
            Ok(())
        }
        Message::FileIndex { files } => print_index(files),
        other => Err(unexpected(other)),
    }
}

fn print_index(files: std::collections::BTreeMap<String, Vec<String>>) -> CtlResult {
    if files.is_empty() {
        println!("No files in the network");
        return Ok(());
    }

    println!("{:<30} {}", "FILE", "OWNERS");
    println!("{}", "-".repeat(60));
    for (name, owners) in files {
        println!("{:<30} {}", name, owners.join(", "));
    }
    Ok(())
}

async fn add(control: &Control, name: &str, from: Option<&std::path::Path>) -> CtlResult {
    let data = match from {
        Some(path) => std::fs::read(path)?,
        None => Vec::new(),
    };
    let size = data.len();

    match control
        .call(Message::ShareFile {
            filename: name.to_string(),
            data,
        })
        .await?
    {
        Message::Ack => {
            println!("Sharing {} ({} bytes)", name, size);
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

async fn remove(control: &Control, name: &str) -> CtlResult {
    match control
        .call(Message::UnshareFile {
            filename: name.to_string(),
        })
        .await?
    {
        Message::Ack => {
            println!("Removed {}", name);
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

async fn download(control: &Control, name: &str) -> CtlResult {
    match control
        .call(Message::Download {
            filename: name.to_string(),
        })
        .await?
    {
        Message::Downloaded { source, size } => {
            println!("Downloaded {} ({} bytes) from {}", name, size, source);
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}
