use anyhow::Context;
use bagit_core::{BagBuilder, BagitConfig};

use super::super::args::ValidateArgs;
use super::create::report;
use crate::exit_codes;

pub fn run(args: ValidateArgs, config: &BagitConfig) -> anyhow::Result<i32> {
    let builder = BagBuilder::load(&args.bag, config)
        .with_context(|| format!("failed to load bag: {}", args.bag.display()))?;

    if let Err(e) = builder.validate_profile_conformance() {
        return report(e);
    }
    if let Err(e) = builder.validate_checksums(args.fetch_files_downloaded) {
        return report(e);
    }

    eprintln!("bag valid: OK ({})", args.bag.display());
    Ok(exit_codes::SUCCESS)
}
