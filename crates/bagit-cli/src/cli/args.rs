use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "bagit",
    version,
    about = "Build, validate and package BagIt bags against a BagIt profile"
)]
pub struct Cli {
    /// YAML configuration file (defaults come from BAGIT_* environment variables)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Profile location (URL or path); overrides the configuration
    #[arg(long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a bag from local payload and tag files
    Create(CreateArgs),
    /// Check an existing bag against its profile and its manifests
    Validate(ValidateArgs),
    /// Package a written bag directory as a .tar.gz archive
    Package(PackageArgs),
    /// Assemble a fetch-only bag from a collection file and package it
    Collect(CollectArgs),
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Bag root directory (created if missing)
    #[arg(long)]
    pub bag: PathBuf,

    /// Directory whose files are copied into data/, keeping relative paths
    #[arg(long)]
    pub payload: Option<PathBuf>,

    /// Tag file copied to the bag root (repeatable)
    #[arg(long = "tag-file")]
    pub tag_files: Vec<PathBuf>,

    /// Descriptive metadata document copied to metadata/ (repeatable)
    #[arg(long = "metadata-file")]
    pub metadata_files: Vec<PathBuf>,

    /// bag-info.txt property as KEY=VALUE (repeatable)
    #[arg(long = "property", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,

    /// Verify checksums after writing
    #[arg(long)]
    pub verify: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Bag root directory
    #[arg(long)]
    pub bag: PathBuf,

    /// Treat fetch.txt destinations as downloaded; absent files then fail verification
    #[arg(long)]
    pub fetch_files_downloaded: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PackageArgs {
    /// Bag root directory
    #[arg(long)]
    pub bag: PathBuf,

    /// Output archive (default: <bag>.tar.gz next to the bag)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// Collection file (YAML) listing content items and metadata documents
    #[arg(long)]
    pub collection: PathBuf,

    /// Output archive
    #[arg(long)]
    pub output: PathBuf,
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {:?}", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
