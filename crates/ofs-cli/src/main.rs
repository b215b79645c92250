#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ofs_block::FileByteSource;
use ofs_core::{Image, OpenOptions, ProgressUpdate};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ofs", about = "OpticFS — read, inspect, and extract ISO 9660 images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show volume identity, timestamps, and extension flags.
    Info {
        /// Path to the image.
        image: PathBuf,
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },
    /// List the files and directories of the active hierarchy.
    List {
        /// Path to the image.
        image: PathBuf,
        /// Prefer a Joliet hierarchy when one exists.
        #[arg(long)]
        joliet: bool,
        /// List directories instead of files.
        #[arg(long)]
        dirs: bool,
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },
    /// Extract the image contents into a directory.
    Extract {
        /// Path to the image.
        image: PathBuf,
        /// Destination directory.
        dst: PathBuf,
        /// Prefer a Joliet hierarchy when one exists.
        #[arg(long)]
        joliet: bool,
        /// Report per-file progress on stderr.
        #[arg(long)]
        progress: bool,
    },
    /// List El Torito boot entries.
    Boot {
        /// Path to the image.
        image: PathBuf,
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    volume_id: String,
    system_id: String,
    volume_set_id: String,
    publisher_id: String,
    preparer_id: String,
    application_id: String,
    created: String,
    modified: String,
    volume_size_blocks: u32,
    root_lba: u32,
    has_joliet: bool,
    has_rock_ridge: bool,
    has_el_torito: bool,
}

#[derive(Debug, Serialize)]
struct EntryOutput {
    path: String,
    size: u64,
    mode: String,
    mtime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    symlink_target: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Info { image, json } => info(&image, json),
        Command::List {
            image,
            joliet,
            dirs,
            json,
        } => list(&image, joliet, dirs, json),
        Command::Extract {
            image,
            dst,
            joliet,
            progress,
        } => extract(&image, &dst, joliet, progress),
        Command::Boot { image, json } => boot(&image, json),
    }
}

fn open_image(path: &PathBuf, prefer_joliet: bool) -> Result<Image<FileByteSource>> {
    let options = OpenOptions {
        prefer_joliet,
        ..OpenOptions::default()
    };
    Image::open_path(path, options)
        .with_context(|| format!("failed to open ISO image: {}", path.display()))
}

fn info(path: &PathBuf, json: bool) -> Result<()> {
    let image = open_image(path, false)?;
    let output = InfoOutput {
        volume_id: image.volume_id().to_owned(),
        system_id: image.system_id().to_owned(),
        volume_set_id: image.volume_set_id().to_owned(),
        publisher_id: image.publisher_id().to_owned(),
        preparer_id: image.preparer_id().to_owned(),
        application_id: image.application_id().to_owned(),
        created: image.created().to_string(),
        modified: image.modified().to_string(),
        volume_size_blocks: image.volume_size(),
        root_lba: image.root_lba().0,
        has_joliet: image.has_joliet(),
        has_rock_ridge: image.has_rock_ridge().context("walking directory tree")?,
        has_el_torito: image.has_el_torito(),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("serialize output")?
        );
    } else {
        println!("volume_id: {}", output.volume_id);
        println!("system_id: {}", output.system_id);
        println!("volume_set_id: {}", output.volume_set_id);
        println!("publisher_id: {}", output.publisher_id);
        println!("preparer_id: {}", output.preparer_id);
        println!("application_id: {}", output.application_id);
        println!("created: {}", output.created);
        println!("modified: {}", output.modified);
        println!("volume_size_blocks: {}", output.volume_size_blocks);
        println!("root_lba: {}", output.root_lba);
        println!("joliet: {}", output.has_joliet);
        println!("rock_ridge: {}", output.has_rock_ridge);
        println!("el_torito: {}", output.has_el_torito);
    }
    Ok(())
}

fn list(path: &PathBuf, joliet: bool, dirs: bool, json: bool) -> Result<()> {
    let image = open_image(path, joliet)?;
    let entries = if dirs {
        image.list_directories().context("listing directories")?
    } else {
        image.list_files().context("listing files")?
    };

    if json {
        let output: Vec<EntryOutput> = entries
            .iter()
            .map(|entry| EntryOutput {
                path: entry.path.clone(),
                size: entry.size,
                mode: format!("{:o}", entry.mode),
                mtime: entry.mtime.to_string(),
                symlink_target: entry.symlink_target.clone(),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("serialize output")?
        );
    } else {
        for entry in entries {
            println!("{:>12}  {}", entry.size, entry.path);
        }
    }
    Ok(())
}

fn extract(path: &PathBuf, dst: &PathBuf, joliet: bool, progress: bool) -> Result<()> {
    let progress_callback: Option<ofs_core::ProgressCallback> = if progress {
        Some(Arc::new(|update: &ProgressUpdate<'_>| {
            if update.bytes_transferred == update.total_bytes {
                eprintln!(
                    "[{}/{}] {} ({} bytes)",
                    update.file_number, update.file_count, update.path, update.total_bytes
                );
            }
        }))
    } else {
        None
    };
    let options = OpenOptions {
        prefer_joliet: joliet,
        extraction_progress: progress_callback,
        ..OpenOptions::default()
    };
    let image = Image::open_path(path, options)
        .with_context(|| format!("failed to open ISO image: {}", path.display()))?;

    let summary = image
        .extract(dst)
        .with_context(|| format!("extraction to {} failed", dst.display()))?;

    eprintln!(
        "extracted {} files ({} bytes) and {} directories",
        summary.files_written, summary.bytes_written, summary.directories_created
    );
    if !summary.is_complete() {
        for (file, error) in &summary.failures {
            eprintln!("failed: {file}: {error}");
        }
        std::process::exit(2);
    }
    Ok(())
}

fn boot(path: &PathBuf, json: bool) -> Result<()> {
    let image = open_image(path, false)?;
    if !image.has_el_torito() {
        println!("no El Torito boot record");
        return Ok(());
    }
    let entries = image.list_boot_entries();

    if json {
        let output: Vec<EntryOutput> = entries
            .iter()
            .map(|entry| EntryOutput {
                path: entry.path.clone(),
                size: entry.size,
                mode: format!("{:o}", entry.mode),
                mtime: entry.mtime.to_string(),
                symlink_target: None,
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("serialize output")?
        );
    } else {
        for entry in &entries {
            println!("{:>12}  {}  (sector {})", entry.size, entry.path, entry.extent);
        }
    }
    Ok(())
}
