use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{ensure, Context};
use bagit_core::{collect_files, BagBuilder, BagError, BagitConfig, ErrorClass};
use tracing::info;

use super::super::args::CreateArgs;
use crate::exit_codes;

pub fn run(args: CreateArgs, config: &BagitConfig) -> anyhow::Result<i32> {
    std::fs::create_dir_all(&args.bag)
        .with_context(|| format!("failed to create bag directory: {}", args.bag.display()))?;
    let mut builder = BagBuilder::create(&args.bag, config).context("failed to load profile")?;

    if let Some(payload) = &args.payload {
        ensure!(
            payload.is_dir(),
            "payload is not a directory: {}",
            payload.display()
        );
        let files = collect_files(payload)
            .with_context(|| format!("failed to list payload directory: {}", payload.display()))?;
        for file in &files {
            builder.add_payload(file, Some(payload.as_path()), None)?;
        }
        info!(count = files.len(), "admitted payload");
    }
    for file in &args.tag_files {
        builder.add_tagfile(file, None, Some(file_name(file)?))?;
    }
    for file in &args.metadata_files {
        builder.add_metadata_file(file, None, Some(file_name(file)?))?;
    }

    let properties: BTreeMap<String, String> = args.properties.iter().cloned().collect();
    let checked = builder
        .validate_and_apply_properties(&properties)
        .and_then(|()| builder.validate_profile_conformance());
    if let Err(e) = checked {
        return report(e);
    }

    builder.write().context("failed to write bag")?;
    if args.verify {
        if let Err(e) = builder.validate_checksums(false) {
            return report(e);
        }
    }

    eprintln!(
        "bag created: {} ({} payload bytes)",
        args.bag.display(),
        builder.payload_size()
    );
    Ok(exit_codes::SUCCESS)
}

/// Validation errors end the command with a readable report; others are fatal.
pub(super) fn report(err: BagError) -> anyhow::Result<i32> {
    if err.class() != ErrorClass::Validation {
        return Err(err.into());
    }
    match &err {
        BagError::MetadataRejected { violations } => {
            for v in violations {
                eprintln!("error: {}", v);
            }
        }
        BagError::ProfileNonConformant { details, .. } => {
            for d in details {
                eprintln!("error: {}", d);
            }
        }
        BagError::VerificationFailed { failures } => {
            for f in failures {
                eprintln!("error: {}", f);
            }
        }
        other => eprintln!("error: {}", other),
    }
    Ok(exit_codes::VALIDATION_FAILED)
}

fn file_name(path: &Path) -> anyhow::Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file path: {}", path.display()))
}
