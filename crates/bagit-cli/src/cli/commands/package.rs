use std::path::PathBuf;

use anyhow::Context;
use bagit_core::{ArchivePackager, TarGzPackager};

use super::super::args::PackageArgs;
use crate::exit_codes;

pub fn run(args: PackageArgs) -> anyhow::Result<i32> {
    let packager = TarGzPackager;
    let output = match args.output {
        Some(output) => output,
        None => default_output(&args.bag, packager.extension())?,
    };
    packager
        .package(&args.bag, &output)
        .with_context(|| format!("failed to package bag: {}", args.bag.display()))?;
    eprintln!("packaged: {}", output.display());
    Ok(exit_codes::SUCCESS)
}

fn default_output(bag: &std::path::Path, extension: &str) -> anyhow::Result<PathBuf> {
    let name = bag
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("bag path has no directory name: {}", bag.display()))?;
    Ok(bag.with_file_name(format!("{}.{}", name, extension)))
}
