//! blazer command-line client.
//!
//! Commands:
//!   list-buckets      List the account's buckets
//!   get-file-info     Print metadata of one file version
//!   upload-file       Upload a local file (multipart above the size threshold)
//!   get-file-by-id    Download a file version (multipart above the size threshold)
//!   get-file-by-name  Download the latest version of a named file

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use blazer::{Blazer, Config, Credentials, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Content type that asks the service to detect the MIME type itself
const AUTO_CONTENT_TYPE: &str = "b2/x-auto";

#[derive(Parser)]
#[command(name = "blazer", version)]
#[command(about = "Command-line client for B2 cloud object storage")]
struct Cli {
    /// Credentials file (default: ./.blazer, then ~/.blazer)
    #[arg(short = 'c', long, global = true)]
    credentials: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the account's buckets
    ListBuckets,

    /// Print metadata of one file version
    GetFileInfo {
        /// File id
        file_id: String,
    },

    /// Upload a local file
    UploadFile {
        /// Target bucket name
        bucket: String,
        /// Local file to upload
        local_path: PathBuf,
        /// Name in the bucket (default: the local file name)
        remote_name: Option<String>,
        /// Content type
        #[arg(short = 't', long = "content-type", default_value = AUTO_CONTENT_TYPE)]
        content_type: String,
        /// Concurrent part uploads
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Download a file version by id
    GetFileById {
        /// File id
        file_id: String,
        /// Destination (default: the remote file name in the current directory)
        local_path: Option<PathBuf>,
        /// Concurrent part downloads
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Download the latest version of a file by name
    GetFileByName {
        /// Bucket name
        bucket: String,
        /// File name in the bucket
        remote_name: String,
        /// Destination
        local_path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let credentials = Credentials::discover(cli.credentials.as_deref())?;
    let client = Blazer::connect(config, credentials).await?;

    match cli.command {
        Commands::ListBuckets => {
            for bucket in client.list_buckets().await? {
                println!(
                    "{}  {:<12}  {}",
                    bucket.bucket_id, bucket.bucket_type, bucket.bucket_name
                );
            }
        }
        Commands::GetFileInfo { file_id } => {
            let info = client.get_file_info(&file_id).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::UploadFile {
            bucket,
            local_path,
            remote_name,
            content_type,
            threads,
        } => {
            let remote_name = match remote_name {
                Some(name) => name,
                None => file_name_of(&local_path)?,
            };
            let info = client
                .upload_file(&bucket, &local_path, &remote_name, &content_type, threads)
                .await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::GetFileById {
            file_id,
            local_path,
            threads,
        } => match local_path {
            Some(destination) => {
                client
                    .download_file_by_id(&file_id, &destination, threads)
                    .await?;
            }
            None => {
                // Name the local file after the remote one; the metadata is reused for the transfer
                let info = client.get_file_info(&file_id).await?;
                let destination = PathBuf::from(file_name_of(Path::new(&info.file_name))?);
                client.download_file(&info, &destination, threads).await?;
            }
        },
        Commands::GetFileByName {
            bucket,
            remote_name,
            local_path,
        } => {
            client
                .download_file_by_name(&bucket, &remote_name, &local_path)
                .await?;
        }
    }
    Ok(())
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| blazer::Error::Other(format!("no file name in '{}'", path.display())))
}
