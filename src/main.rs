use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;

use gcs_files_adapter::{
    AdapterOptions, Config, FilesAdapter, GcsAdapter, HostConfig, SaveOptions, StreamRequest,
    WriterSink,
};

#[derive(Parser)]
#[command(name = "gcs-files")]
#[command(about = "Store and fetch files in Google Cloud Storage through the files adapter")]
struct Cli {
    /// Configuration file path; GCP_*/GCS_* environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration template
    Init {
        /// Output file for the template
        #[arg(short, long, default_value = "gcs-files.toml")]
        output: PathBuf,
    },
    /// Upload a local file
    Put {
        /// Logical filename
        name: String,
        /// Local file to upload
        path: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Download a file
    Get {
        name: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Stream a file to stdout, optionally a byte range such as `bytes=0-99`
    Cat {
        name: String,
        #[arg(long)]
        range: Option<String>,
    },
    /// Delete a file
    Delete { name: String },
    /// Check whether a file exists
    Exists { name: String },
    /// Show object metadata
    Stat { name: String },
    /// Print the URL a client should fetch the file from
    Url {
        name: String,
        /// Host mount URL, overrides [host] from the config file
        #[arg(long)]
        mount: Option<String>,
        /// Host application id, overrides [host] from the config file
        #[arg(long)]
        app_id: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Config::load(path)
        }
        None => Ok(Config {
            gcs: AdapterOptions::from_env(),
            host: None,
        }),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init { output } = &cli.command {
        std::fs::write(output, Config::default_config())
            .with_context(|| format!("Failed to write {:?}", output))?;
        info!("Configuration template saved to {:?}", output);
        return Ok(());
    }

    let config = load_config(cli.config.as_ref())?;
    let adapter = GcsAdapter::new(config.gcs.clone())?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Put {
            name,
            path,
            content_type,
        } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {:?}", path))?;
            info!("Uploading {:?} as {}", path, adapter.resolve_key(&name));
            adapter
                .save_file(
                    &name,
                    Bytes::from(data),
                    content_type.as_deref(),
                    &SaveOptions::default(),
                )
                .await?;
        }
        Commands::Get { name, output } => {
            let data = adapter.read_file(&name).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &data)
                        .await
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    info!("Saved {} bytes to {:?}", data.len(), path);
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
            }
        }
        Commands::Cat { name, range } => {
            let request = match range {
                Some(range) => StreamRequest::with_range(range),
                None => StreamRequest::full(),
            };
            let mut sink = WriterSink::new(tokio::io::stdout());
            adapter
                .handle_file_stream(&name, &request, &mut sink, None)
                .await?;
            if let Some(head) = sink.head() {
                info!("Status {}", head.status);
            }
        }
        Commands::Delete { name } => {
            let response = adapter.delete_file(&name).await?;
            println!("{}", response);
        }
        Commands::Exists { name } => {
            println!("{}", adapter.file_exists(&name).await?);
        }
        Commands::Stat { name } => {
            let meta = adapter.get_file_metadata(&name).await?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        Commands::Url {
            name,
            mount,
            app_id,
        } => {
            let mount = mount.or_else(|| config.host.as_ref().map(|h| h.mount.clone()));
            let application_id =
                app_id.or_else(|| config.host.as_ref().map(|h| h.application_id.clone()));
            let host = match (mount, application_id) {
                (Some(mount), Some(application_id)) => HostConfig {
                    mount,
                    application_id,
                },
                // Direct links never look at the host.
                (mount, application_id) if adapter.config().direct_access => HostConfig {
                    mount: mount.unwrap_or_default(),
                    application_id: application_id.unwrap_or_default(),
                },
                _ => anyhow::bail!("--mount and --app-id (or a [host] table) are required"),
            };
            println!("{}", adapter.get_file_location(&host, &name));
        }
    }

    Ok(())
}
