//! bucketfs command-line client.
//!
//! Loads a mount table from TOML and runs one filesystem operation against
//! it.
//!
//! ```bash
//! bucketfs --config bucketfs.toml ls /
//! bucketfs ls /docs --json
//! bucketfs put ./report.pdf /docs/reports/report.pdf
//! bucketfs cat /docs/readme.md > readme.md
//! bucketfs mv /docs/old/ /docs/new/
//! bucketfs rm /docs/tmp/ /docs/scratch.txt
//! ```
//!
//! Set `RUST_LOG=bucketfs_kernel=debug` to see cache hits and storage calls.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bucketfs_kernel::{
    BucketfsConfig, ConfigParts, DirectoryCache, FileDb, FileMetadataStore, Filesystem,
    FilesystemContext, MemoryConnector, MountRegistry, PlaintextCipher, StoreConnector,
};
use bucketfs_s3::S3Connector;
use bucketfs_types::{Caller, ListingResult};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

/// One path hierarchy over many S3-compatible buckets.
#[derive(Parser, Debug)]
#[command(name = "bucketfs")]
#[command(about = "Browse and modify a bucketfs mount table")]
struct Args {
    /// Mount table
    #[arg(short, long, env = "BUCKETFS_CONFIG", default_value = "bucketfs.toml")]
    config: PathBuf,

    /// File metadata database (in-memory when omitted)
    #[arg(long, env = "BUCKETFS_DB")]
    db: Option<PathBuf>,

    /// Act as this API key instead of as an admin
    #[arg(long)]
    api_key: Option<String>,

    /// Use an in-process object store instead of the configured endpoints
    #[arg(long)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        path: String,
        #[arg(long)]
        json: bool,
    },
    /// Show file or directory metadata
    Stat { path: String },
    /// Write a file's contents to stdout
    Cat { path: String },
    /// Upload a local file
    Put {
        local: PathBuf,
        remote: String,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Create a directory
    Mkdir { path: String },
    /// Remove files or directories (trailing slash for directories)
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Move a file or directory within a mount
    Mv { from: String, to: String },
    /// Show the mounts visible to the caller
    Mounts,
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("bucketfs: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path) -> Result<BucketfsConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn build_filesystem(args: &Args) -> Result<Filesystem> {
    let ConfigParts {
        registry,
        storage,
        cache,
        fs,
    } = load_config(&args.config)?.into_parts()?;

    let files: Arc<dyn FileMetadataStore> = match &args.db {
        Some(path) => Arc::new(
            FileDb::open(path).with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Arc::new(FileDb::in_memory()?),
    };
    let connector: Arc<dyn StoreConnector> = if args.memory {
        Arc::new(MemoryConnector::default())
    } else {
        Arc::new(S3Connector::new())
    };

    Ok(Filesystem::new(FilesystemContext {
        registry: Arc::new(registry),
        storage_configs: Arc::new(storage),
        cipher: Arc::new(PlaintextCipher),
        connector,
        cache: Arc::new(DirectoryCache::new(cache)),
        files,
        config: fs,
    }))
}

async fn run(args: Args) -> Result<ExitCode> {
    let fs = build_filesystem(&args)?;
    let caller = match &args.api_key {
        Some(key) => Caller::api_key(key.clone()),
        None => Caller::admin("cli"),
    };
    tracing::debug!("running {:?} as {}", args.command, caller);

    match args.command {
        Command::Ls { path, json } => {
            let listing = fs.list_directory(&caller, &path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                print_listing(&listing);
            }
        }
        Command::Stat { path } => {
            let info = fs.get_file_info(&caller, &path).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Cat { path } => {
            let content = fs.download_file(&caller, &path).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content.body)?;
            stdout.flush()?;
        }
        Command::Put {
            local,
            remote,
            content_type,
        } => {
            let data = std::fs::read(&local)
                .with_context(|| format!("reading {}", local.display()))?;
            let result = fs
                .upload_file(&caller, &remote, data, content_type.as_deref())
                .await?;
            println!(
                "{} ({} bytes, {}{})",
                result.path,
                result.size,
                result.content_type,
                if result.multipart { ", multipart" } else { "" }
            );
        }
        Command::Mkdir { path } => {
            let info = fs.create_directory(&caller, &path).await?;
            println!("{}", info.path);
        }
        Command::Rm { paths } => {
            let result = fs.batch_remove_items(&caller, &paths).await;
            for path in &result.removed {
                println!("removed {}", path);
            }
            for failure in &result.failed {
                eprintln!("{}: {} ({})", failure.path, failure.message, failure.kind);
            }
            if !result.is_complete() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Mv { from, to } => {
            fs.rename_item(&caller, &from, &to).await?;
            println!("{} -> {}", from, to);
        }
        Command::Mounts => {
            let mounts = fs.context().registry.list_accessible_mounts(&caller).await?;
            if mounts.is_empty() {
                bail!("no mounts visible to {}", caller);
            }
            for mount in mounts {
                println!(
                    "{:<20} {:<12} ttl={}s {}",
                    mount.virtual_prefix,
                    mount.id,
                    mount.cache_ttl_seconds,
                    mount.storage_config_ref
                );
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_listing(listing: &ListingResult) {
    for item in &listing.items {
        let marker = match (item.is_mount, item.is_directory) {
            (true, _) => 'm',
            (false, true) => 'd',
            (false, false) => '-',
        };
        let size = item.size.map(|s| s.to_string()).unwrap_or_default();
        println!("{} {:>12} {}", marker, size, item.path);
    }
}
