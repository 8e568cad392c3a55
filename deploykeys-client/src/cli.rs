use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use deploykeys_shared::{pagination::ApiOptions, repository::RepositoryRef, ssh::NewDeployKey};

use crate::config::Config;
use crate::connection::HttpConnection;
use crate::keys::DeployKeysClient;
use crate::tui;
use crate::util::{logging, shutdown};

#[derive(Parser)]
#[command(name = "deploykeys")]
#[command(version, about = "Manage SSH deploy keys of hosted repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy key commands
    #[command(subcommand)]
    Keys(KeysCommands),

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum KeysCommands {
    /// List the deploy keys of a repository
    List {
        /// Repository as owner/name or numeric id
        repo: RepositoryRef,

        #[command(flatten)]
        paging: PagingArgs,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single deploy key
    Get {
        repo: RepositoryRef,
        id: u64,

        #[arg(long)]
        json: bool,
    },

    /// Add a deploy key
    Add {
        repo: RepositoryRef,

        #[arg(short, long)]
        title: String,

        /// Public key material
        #[arg(short, long, conflicts_with = "key_file", required_unless_present = "key_file")]
        key: Option<String>,

        /// Read the public key from a file, e.g. ~/.ssh/id_ed25519.pub
        #[arg(long)]
        key_file: Option<PathBuf>,

        /// Grant read-only access
        #[arg(long)]
        read_only: bool,
    },

    /// Remove a deploy key
    Remove { repo: RepositoryRef, id: u64 },
}

#[derive(Args, Debug, Default)]
struct PagingArgs {
    /// Keys per page
    #[arg(long)]
    page_size: Option<u32>,

    /// Stop after this many pages
    #[arg(long)]
    page_count: Option<u32>,

    /// First page to fetch
    #[arg(long)]
    start_page: Option<u32>,
}

impl PagingArgs {
    fn into_options(self, config: &Config) -> ApiOptions {
        ApiOptions {
            page_size: self.page_size.or(config.default_page_size),
            page_count: self.page_count,
            start_page: self.start_page,
        }
    }
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
}

fn client(config: &Config) -> Result<DeployKeysClient> {
    if config.token().is_none() {
        warn!("{} is not set, requests will be unauthenticated", config.token_env);
    }
    let connection = HttpConnection::from_config(config).context("Failed to create HTTP client")?;
    Ok(DeployKeysClient::new(Arc::new(connection)))
}

fn read_key(key: Option<String>, key_file: Option<PathBuf>) -> Result<String> {
    match (key, key_file) {
        (Some(key), _) => Ok(key),
        (None, Some(path)) => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read key file {}", path.display()))?;
            Ok(contents.trim().to_string())
        }
        (None, None) => bail!("either --key or --key-file is required"),
    }
}

/// Awaits `fut`, failing with "Interrupted" once `token` is cancelled.
async fn interruptible<F: Future>(token: &CancellationToken, fut: F) -> Result<F::Output> {
    match shutdown::until_cancelled(token, fut).await {
        Some(out) => Ok(out),
        None => bail!("Interrupted"),
    }
}

async fn keys(cmd: KeysCommands, config: &Config) -> Result<()> {
    let client = client(config)?;

    match cmd {
        KeysCommands::List { repo, paging, json } => {
            let options = paging.into_options(config);
            let mut stream = client.get_all_with_options(repo.clone(), options).stream();
            let mut keys = Vec::new();

            loop {
                match shutdown::until_cancelled(&shutdown::SHUTDOWN, stream.next()).await {
                    None => {
                        warn!("Interrupted, stopped after {} keys", keys.len());
                        break;
                    }
                    Some(None) => break,
                    Some(Some(item)) => {
                        keys.push(item.with_context(|| format!("Failed to list deploy keys of {repo}"))?)
                    }
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&keys)?);
            } else {
                tui::keys::print_keys_table(&repo, &keys);
            }
        }
        KeysCommands::Get { repo, id, json } => {
            let key = interruptible(&shutdown::SHUTDOWN, client.get(&repo, id))
                .await?
                .with_context(|| format!("Failed to get deploy key {id} of {repo}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&key)?);
            } else {
                tui::keys::print_key(&key);
            }
        }
        KeysCommands::Add {
            repo,
            title,
            key,
            key_file,
            read_only,
        } => {
            let mut new_key = NewDeployKey::new(title, read_key(key, key_file)?);
            if read_only {
                new_key = new_key.read_only(true);
            }
            let created = interruptible(&shutdown::SHUTDOWN, client.create(&repo, &new_key))
                .await?
                .with_context(|| format!("Failed to add deploy key to {repo}"))?;
            println!("Added deploy key {} ({})", created.id, created.title);
        }
        KeysCommands::Remove { repo, id } => {
            interruptible(&shutdown::SHUTDOWN, client.delete(&repo, id))
                .await?
                .with_context(|| format!("Failed to remove deploy key {id} from {repo}"))?;
            println!("Removed deploy key {id}");
        }
    }
    Ok(())
}

pub async fn cli() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("Failed to load configuration")?;
    logging::init_tracing(&config.log_level);
    info!(api_url = %config.api_url, "configuration loaded");

    match cli.command {
        Commands::Keys(cmd) => keys(cmd, &config).await?,
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => println!("{}", serde_json::to_string_pretty(&config)?),
            ConfigCommands::Path => println!("{}", Config::config_file_path()?.display()),
        },
        Commands::Version => {
            println!("deploykeys version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
