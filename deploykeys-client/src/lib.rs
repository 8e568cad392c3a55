// === Library ===
pub mod config;
pub mod connection;
pub mod error;
pub mod keys;
pub mod pagination;

pub mod tui;
pub mod util;

// === CLI entrypoint ===
pub mod cli;

pub use connection::{ApiRequest, ApiResponse, Connection, HttpConnection};
pub use deploykeys_shared::{
    ValidationError, pagination::ApiOptions, repository::RepositoryRef,
    ssh::{DeployKey, NewDeployKey},
};
pub use error::{ApiError, ApiResult};
pub use keys::{DeployKeysClient, KeyListing};

/// Entrypoint used by `main.rs` to run the full CLI.
pub async fn run_cli() -> anyhow::Result<()> {
    cli::cli().await
}
