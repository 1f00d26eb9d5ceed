use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use bytes::{Bytes, BytesMut};
use colored::Colorize;
use cosfs_fs::{BackendConfig, BlobFileSystem, Entry, FileSystemConfig, FileSystemCreator};
use cosfs_path::BlobPath;
use serde::Serialize;
use tracing::info;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let fs = open_fs(&cli)?;
    let json = matches!(cli.format, OutputFormat::Json);
    match cli.command {
        Command::Append(args) => cmd_append(&fs, args, json),
        Command::Touch(args) => cmd_touch(&fs, args, json),
        Command::Cat(args) => cmd_cat(&fs, args),
        Command::Ls(args) => cmd_ls(&fs, args, json),
        Command::Stat(args) => cmd_stat(&fs, args, json),
        Command::Rm(args) => cmd_rm(&fs, args, json),
        Command::Mkdir(args) => cmd_mkdir(&fs, args, json),
        Command::Truncate(args) => cmd_truncate(&fs, args, json),
        Command::Cp(args) => cmd_cp(&fs, args, json, false),
        Command::Mv(args) => cmd_cp(&fs, args, json, true),
        Command::Demo(args) => cmd_demo(&fs, args, json),
    }
}

/// Load the configuration and apply command-line overrides.
fn build_config(cli: &Cli) -> anyhow::Result<FileSystemConfig> {
    let mut config = match &cli.config {
        Some(path) => FileSystemConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => FileSystemConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.backend = BackendConfig::Local { root: root.clone() };
    }
    if cli.no_cache {
        config.cache = false;
    }
    Ok(config)
}

fn open_fs(cli: &Cli) -> anyhow::Result<BlobFileSystem> {
    let config = build_config(cli)?;
    let properties: BTreeMap<String, String> = cli.properties.iter().cloned().collect();
    let fs = FileSystemCreator::new(config)
        .with_properties(properties)
        .create()?;
    Ok(fs)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct Written<'a> {
    path: &'a BlobPath,
    bytes: u64,
}

fn cmd_append(fs: &BlobFileSystem, args: AppendArgs, json: bool) -> anyhow::Result<()> {
    let data = match (args.data, &args.input) {
        (Some(text), _) => Bytes::from(text.into_bytes()),
        (None, Some(input)) => Bytes::from(
            std::fs::read(input).with_context(|| format!("reading {}", input.display()))?,
        ),
        (None, None) => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).context("reading stdin")?;
            Bytes::from(buf)
        }
    };
    let bytes = fs.append(&args.path, &[data])?;
    if json {
        return print_json(&Written { path: &args.path, bytes });
    }
    println!("{} Appended {} bytes to {}", "✓".green(), bytes, args.path.to_string().bold());
    Ok(())
}

fn cmd_touch(fs: &BlobFileSystem, args: PathArgs, json: bool) -> anyhow::Result<()> {
    let created = fs.create_file(&args.path)?;
    if json {
        return print_json(&serde_json::json!({ "path": args.path, "created": created }));
    }
    if created {
        println!("{} Created {}", "✓".green(), args.path.to_string().bold());
    } else {
        println!("{} already exists", args.path.to_string().bold());
    }
    Ok(())
}

fn cmd_cat(fs: &BlobFileSystem, args: CatArgs) -> anyhow::Result<()> {
    let length = match args.length {
        Some(length) => length,
        None => fs
            .file_size(&args.path)?
            .checked_sub(args.offset)
            .with_context(|| format!("offset {} is past the end of {}", args.offset, args.path))?,
    };
    let data = fs.read(&args.path, args.offset, length)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}

fn cmd_ls(fs: &BlobFileSystem, args: PathArgs, json: bool) -> anyhow::Result<()> {
    let listing = fs.list(&args.path)?;
    if json {
        return print_json(&listing);
    }
    for dir in &listing.directories {
        println!("{}/", dir.blue().bold());
    }
    for file in &listing.files {
        println!("{file}");
    }
    Ok(())
}

fn cmd_stat(fs: &BlobFileSystem, args: PathArgs, json: bool) -> anyhow::Result<()> {
    let entry = fs.stat(&args.path)?;
    if json {
        return print_json(&serde_json::json!({ "path": args.path, "entry": entry }));
    }
    match entry {
        Entry::File { size, blobs } => println!(
            "{}  {} bytes in {} blob(s)",
            args.path.to_string().bold(),
            size,
            blobs.to_string().cyan()
        ),
        Entry::Directory => println!("{}  {}", args.path.to_string().bold(), "directory".blue()),
        Entry::Missing => bail!("{}: no such file or directory", args.path),
    }
    Ok(())
}

fn cmd_rm(fs: &BlobFileSystem, args: PathArgs, json: bool) -> anyhow::Result<()> {
    let blobs = fs.delete(&args.path)?;
    if json {
        return print_json(&serde_json::json!({ "path": args.path, "deleted_blobs": blobs }));
    }
    if blobs == 0 {
        bail!("{}: no such file", args.path);
    }
    println!("{} Removed {} ({} blobs)", "✓".green(), args.path.to_string().bold(), blobs);
    Ok(())
}

fn cmd_mkdir(fs: &BlobFileSystem, args: MkdirArgs, json: bool) -> anyhow::Result<()> {
    if args.parents {
        fs.ensure_directory(&args.path)?;
    } else {
        fs.create_directory(&args.path)?;
    }
    if json {
        return print_json(&serde_json::json!({ "path": args.path, "created": true }));
    }
    println!("{} Created directory {}", "✓".green(), args.path.to_string().bold());
    Ok(())
}

fn cmd_truncate(fs: &BlobFileSystem, args: TruncateArgs, json: bool) -> anyhow::Result<()> {
    fs.truncate(&args.path, args.length)?;
    if json {
        return print_json(&serde_json::json!({ "path": args.path, "size": args.length }));
    }
    println!(
        "{} Truncated {} to {} bytes",
        "✓".green(),
        args.path.to_string().bold(),
        args.length
    );
    Ok(())
}

fn cmd_cp(
    fs: &BlobFileSystem,
    args: TransferArgs,
    json: bool,
    remove_source: bool,
) -> anyhow::Result<()> {
    let bytes = if remove_source {
        fs.rename(&args.source, &args.target)?
    } else {
        fs.copy(&args.source, &args.target)?
    };
    if json {
        return print_json(&Written { path: &args.target, bytes });
    }
    let verb = if remove_source { "Moved" } else { "Copied" };
    println!(
        "{} {} {} → {} ({} bytes)",
        "✓".green(),
        verb,
        args.source.to_string().bold(),
        args.target.to_string().bold(),
        bytes
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct DemoReport {
    path: BlobPath,
    strings: u64,
    blobs: usize,
    bytes: u64,
    #[serde(with = "millis")]
    write_time: Duration,
    #[serde(with = "millis")]
    read_time: Duration,
}

mod millis {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

fn demo_string(i: u64) -> String {
    format!("This is string number {i}\n")
}

/// Append `count` strings in blobs of `batch`, then read the file back and
/// check every string.
fn run_demo(
    fs: &BlobFileSystem,
    path: &BlobPath,
    count: u64,
    batch: usize,
) -> anyhow::Result<DemoReport> {
    if batch == 0 {
        bail!("batch size must be at least 1");
    }
    if fs.file_exists(path)? {
        fs.delete(path)?;
    }
    if let Some(parent) = path.parent() {
        fs.ensure_directory(&parent)?;
    }

    let started = Instant::now();
    let mut pending: Vec<Bytes> = Vec::with_capacity(batch);
    for i in 0..count {
        pending.push(Bytes::from(demo_string(i)));
        if pending.len() == batch {
            fs.append(path, &pending)?;
            pending.clear();
        }
    }
    if !pending.is_empty() || count == 0 {
        fs.append(path, &pending)?;
    }
    let write_time = started.elapsed();

    let started = Instant::now();
    let data = fs.read_all(path)?;
    let mut expected = BytesMut::with_capacity(data.len());
    for i in 0..count {
        expected.extend_from_slice(demo_string(i).as_bytes());
    }
    if data != expected.freeze() {
        bail!("{path}: read back content differs from what was written");
    }
    let read_time = started.elapsed();

    let blobs = match fs.stat(path)? {
        Entry::File { blobs, .. } => blobs,
        _ => 0,
    };
    let report = DemoReport {
        path: path.clone(),
        strings: count,
        blobs,
        bytes: data.len() as u64,
        write_time,
        read_time,
    };
    info!(?report, "demo finished");
    Ok(report)
}

fn cmd_demo(fs: &BlobFileSystem, args: DemoArgs, json: bool) -> anyhow::Result<()> {
    let report = run_demo(fs, &args.path, args.count, args.batch)?;
    if json {
        return print_json(&report);
    }
    println!(
        "{} Wrote {} strings to {}",
        "✓".green().bold(),
        report.strings,
        report.path.to_string().bold()
    );
    println!("  Blobs: {}", report.blobs.to_string().cyan());
    println!("  Bytes: {}", report.bytes);
    println!("  Write: {:?}", report.write_time);
    println!("  Read:  {:?} ({})", report.read_time, "verified".green());
    Ok(())
}
