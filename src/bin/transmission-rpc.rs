//! transmission-rpc CLI - Command-line front end for the Transmission daemon
//!
//! Provides subcommands for listing torrents and driving their lifecycle
//! over the daemon's JSON-RPC endpoint.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use transmission_rpc::rpc::{
    ClientConfig, RpcClient, Shape, TorrentAction, TorrentAddRequest, TorrentGetRequest,
    TorrentIds, TorrentInfo, TorrentRemoveRequest,
};

const DEFAULT_FIELDS: &[&str] = &["id", "name", "status", "percent_done", "rate_download", "rate_upload"];

#[derive(Parser)]
#[command(name = "transmission-rpc")]
#[command(about = "Talk to a Transmission daemon over JSON-RPC", long_about = None)]
struct Cli {
    /// Client configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RPC endpoint URL, overriding configuration and environment
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IdArgs {
    /// Torrent ids or info-hashes (all torrents when omitted)
    #[arg(long, value_delimiter = ',')]
    ids: Vec<String>,
}

impl IdArgs {
    fn into_ids(self) -> TorrentIds {
        TorrentIds::parse_list(self.ids)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List torrents with the requested attributes
    Get {
        #[command(flatten)]
        ids: IdArgs,

        /// Attributes to fetch, by logical name
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Only torrents changed recently (also reports removed ids)
        #[arg(long, conflicts_with = "ids")]
        recently_active: bool,
    },

    /// Start torrents
    Start {
        #[command(flatten)]
        ids: IdArgs,

        /// Skip the download queue
        #[arg(long)]
        now: bool,
    },

    /// Stop torrents
    Stop(IdArgs),

    /// Re-check local data
    Verify(IdArgs),

    /// Ask trackers for more peers
    Reannounce(IdArgs),

    /// Remove torrents
    Remove {
        #[command(flatten)]
        ids: IdArgs,

        /// Also delete downloaded data
        #[arg(long)]
        delete_data: bool,
    },

    /// Add a torrent by path, URL, or magnet link
    Add {
        /// .torrent path/URL or magnet link
        filename: String,

        /// Download directory
        #[arg(long)]
        download_dir: Option<String>,

        /// Add without starting
        #[arg(long)]
        paused: bool,
    },
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{text}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let client = RpcClient::from_config(&config)
        .with_context(|| format!("Failed to set up client for {}", config.url))?;

    match cli.command {
        Commands::Get {
            ids,
            fields,
            recently_active,
        } => {
            let shape = if fields.is_empty() {
                Shape::<TorrentInfo>::new(DEFAULT_FIELDS.iter().copied())?
            } else {
                Shape::<TorrentInfo>::new(&fields)?
            };
            let mut request = TorrentGetRequest::new(shape);
            request.ids = if recently_active {
                TorrentIds::RecentlyActive
            } else {
                ids.into_ids()
            };
            let result = client.torrent_get(&request).await?;
            print_json(&result)?;
        }

        Commands::Start { ids, now } => {
            let action = if now {
                TorrentAction::StartNow
            } else {
                TorrentAction::Start
            };
            client.torrent_action(action, ids.into_ids()).await?;
            println!("Started");
        }

        Commands::Stop(ids) => {
            client.torrent_action(TorrentAction::Stop, ids.into_ids()).await?;
            println!("Stopped");
        }

        Commands::Verify(ids) => {
            client.torrent_action(TorrentAction::Verify, ids.into_ids()).await?;
            println!("Verification queued");
        }

        Commands::Reannounce(ids) => {
            client
                .torrent_action(TorrentAction::Reannounce, ids.into_ids())
                .await?;
            println!("Reannounce requested");
        }

        Commands::Remove { ids, delete_data } => {
            let request = TorrentRemoveRequest {
                ids: ids.into_ids(),
                delete_local_data: delete_data.then_some(true),
            };
            client.torrent_remove(request).await?;
            println!("Removed");
        }

        Commands::Add {
            filename,
            download_dir,
            paused,
        } => {
            let request = TorrentAddRequest {
                filename: Some(filename),
                download_dir,
                paused: paused.then_some(true),
                ..Default::default()
            };
            let added = client.torrent_add(request).await?;
            print_json(&added)?;
        }
    }

    Ok(())
}
