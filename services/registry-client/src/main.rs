//! Explore a container registry from the command line.
//!
//! Results are printed to stdout as JSON; logs go to stderr and are
//! controlled with `RUST_LOG`.

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use registry_client::{ConfigError, RegistryClient, RegistryConfig, RegistryError};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit status after Ctrl-C, as a shell reports it.
const INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    /// Base URL of the registry, overriding the configuration file
    #[arg(long, env = "REGISTRY_URL", global = true)]
    url: Option<http::Uri>,

    /// Username for basic authentication
    #[arg(long, env = "REGISTRY_USERNAME", global = true)]
    username: Option<String>,

    /// Password for basic authentication
    #[arg(long, env = "REGISTRY_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every repository with its tags
    Images,

    /// Show one manifest
    Manifest {
        /// Repository name
        repository: String,
        /// Tag or digest
        reference: String,
    },

    /// Storage used by tags of a repository
    Size {
        /// Repository name
        repository: String,
        /// Tags to include; all tags when omitted
        #[arg(long, num_args = 1..)]
        tags: Vec<String>,
        /// Count layers shared between tags once per tag
        #[arg(long)]
        no_shared: bool,
    },

    /// Delete a tag
    Delete {
        /// Repository name
        repository: String,
        /// Tag to delete
        tag: String,
        /// Report success even if the registry refuses
        #[arg(long)]
        force: bool,
    },

    /// Ask the registry to collect unreferenced blobs
    Gc,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no registry URL: pass --url, set REGISTRY_URL, or use --config")]
    MissingUrl,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("writing output: {0}")]
    Output(#[from] serde_json::Error),
}

impl Cli {
    fn registry_config(&self) -> Result<RegistryConfig, CliError> {
        let mut config = match (&self.config, &self.url) {
            (Some(path), _) => RegistryConfig::from_file(path)?,
            (None, Some(url)) => RegistryConfig::new(url.clone()),
            (None, None) => return Err(CliError::MissingUrl),
        };

        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(username) = &self.username {
            config.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone().into());
        }
        Ok(config)
    }
}

fn json<T: Serialize>(value: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}

async fn run(
    client: &RegistryClient,
    command: Command,
    cancel: &CancellationToken,
) -> Result<String, CliError> {
    match command {
        Command::Images => json(&client.fetch_all_images(cancel).await?),
        Command::Manifest {
            repository,
            reference,
        } => json(&*client.fetch_manifest(&repository, &reference, cancel).await?),
        Command::Size {
            repository,
            tags,
            no_shared,
        } => {
            let tags = if tags.is_empty() {
                client.fetch_tags(&repository, cancel).await?
            } else {
                tags
            };
            json(
                &client
                    .cumulative_size(&repository, &tags, !no_shared, cancel)
                    .await?,
            )
        }
        Command::Delete {
            repository,
            tag,
            force,
        } => {
            client.delete_tag(&repository, &tag, force, cancel).await?;
            json(&serde_json::json!({ "deleted": format!("{repository}:{tag}") }))
        }
        Command::Gc => json(&client.garbage_collect(cancel).await?),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let client = match cli.registry_config() {
        Ok(config) => RegistryClient::new(config),
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    match run(&client, cli.command, &cancel).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(CliError::Registry(error)) if error.is_cancelled() => ExitCode::from(INTERRUPTED),
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
