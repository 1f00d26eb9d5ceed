use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cosfs_path::BlobPath;

#[derive(Parser)]
#[command(
    name = "cosfs",
    about = "Files as chains of immutable blobs in an object store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store objects below this directory (overrides the configured backend)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Disable the blob listing cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Property for credential resolution, e.g. -D aws.accessKeyId=AKID
    #[arg(short = 'D', value_parser = parse_property, global = true)]
    pub properties: Vec<(String, String)>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Append data to a file as one new blob
    Append(AppendArgs),
    /// Create an empty file if it does not exist
    Touch(PathArgs),
    /// Print file contents
    Cat(CatArgs),
    /// List a directory
    Ls(PathArgs),
    /// Show what lives at a path
    Stat(PathArgs),
    /// Delete a file
    Rm(PathArgs),
    /// Create a directory marker
    Mkdir(MkdirArgs),
    /// Shorten a file
    Truncate(TruncateArgs),
    /// Copy a file
    Cp(TransferArgs),
    /// Move a file
    Mv(TransferArgs),
    /// Append many small strings and read them back
    Demo(DemoArgs),
}

#[derive(Args)]
pub struct PathArgs {
    /// Path as bucket/dir/.../name
    pub path: BlobPath,
}

#[derive(Args)]
pub struct AppendArgs {
    pub path: BlobPath,
    /// Literal data to append
    #[arg(short, long, conflicts_with = "input")]
    pub data: Option<String>,
    /// Read the data from a local file instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

#[derive(Args)]
pub struct CatArgs {
    pub path: BlobPath,
    #[arg(long, default_value = "0")]
    pub offset: u64,
    /// Bytes to read; defaults to the rest of the file
    #[arg(long)]
    pub length: Option<u64>,
}

#[derive(Args)]
pub struct MkdirArgs {
    pub path: BlobPath,
    /// Create ancestor markers too
    #[arg(short, long)]
    pub parents: bool,
}

#[derive(Args)]
pub struct TruncateArgs {
    pub path: BlobPath,
    pub length: u64,
}

#[derive(Args)]
pub struct TransferArgs {
    pub source: BlobPath,
    pub target: BlobPath,
}

#[derive(Args)]
pub struct DemoArgs {
    /// Number of strings to write
    #[arg(short = 'n', long, default_value = "1000000")]
    pub count: u64,
    /// Strings per appended blob
    #[arg(long, default_value = "1000")]
    pub batch: usize,
    #[arg(long, default_value = "cosfs-demo/strings/channel_0.dat")]
    pub path: BlobPath,
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty property name in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}
