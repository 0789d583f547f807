//! `bagit collect`: assemble a fetch-only bag from a collection file.
//!
//! ```yaml
//! resource_id: dataset-42
//! items:
//!   - content_url: https://repo.example/api/v1/dataset-42/data/a.csv
//!     relative_path: a.csv
//!     length: 1024
//!     algorithm: sha256
//!     checksum: 9f86d0...
//! documents:
//!   - path: metadata/datacite.xml
//!     file: ./datacite.xml
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bagit_core::{
    Algorithm, BagitConfig, CollectionProvider, ContentDescriptor, StreamSink, TagDocument,
};
use serde::Deserialize;
use url::Url;

use super::super::args::CollectArgs;
use crate::exit_codes;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CollectionFile {
    resource_id: String,
    #[serde(default)]
    items: Vec<ItemEntry>,
    #[serde(default)]
    documents: Vec<DocumentEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ItemEntry {
    content_url: String,
    #[serde(default)]
    fetch_url: Option<String>,
    relative_path: String,
    length: u64,
    algorithm: Algorithm,
    checksum: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DocumentEntry {
    path: String,
    /// Relative to the collection file.
    file: PathBuf,
}

pub fn run(args: CollectArgs, config: &BagitConfig) -> anyhow::Result<i32> {
    let text = std::fs::read_to_string(&args.collection).with_context(|| {
        format!("failed to read collection: {}", args.collection.display())
    })?;
    let collection: CollectionFile = serde_yaml::from_str(&text).with_context(|| {
        format!("failed to parse collection: {}", args.collection.display())
    })?;

    let base = args.collection.parent().unwrap_or_else(|| Path::new("."));
    let descriptors = collection
        .items
        .iter()
        .map(descriptor)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let documents = collection
        .documents
        .iter()
        .map(|d| {
            let file = base.join(&d.file);
            let content = std::fs::read(&file)
                .with_context(|| format!("failed to read document: {}", file.display()))?;
            Ok(TagDocument::new(&d.path, content))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let provider = CollectionProvider::new(config.clone()).context("failed to load profile")?;
    let out = File::create(&args.output)
        .with_context(|| format!("failed to create output: {}", args.output.display()))?;
    let mut sink = StreamSink::new(BufWriter::new(out));

    if let Err(e) = provider.provide(&collection.resource_id, &descriptors, &documents, &mut sink)
    {
        drop(sink);
        let _ = std::fs::remove_file(&args.output);
        eprintln!("error: {}", e);
        return Ok(exit_codes::VALIDATION_FAILED);
    }

    eprintln!(
        "collected {} items into {} ({})",
        descriptors.len(),
        args.output.display(),
        provider.media_type()
    );
    Ok(exit_codes::SUCCESS)
}

fn descriptor(item: &ItemEntry) -> anyhow::Result<ContentDescriptor> {
    let content_url = Url::parse(&item.content_url)
        .with_context(|| format!("invalid content_url: {}", item.content_url))?;
    let d = ContentDescriptor::new(
        content_url,
        &item.relative_path,
        item.length,
        item.algorithm,
        &item.checksum,
    );
    Ok(match &item.fetch_url {
        Some(raw) => d.with_fetch_url(
            Url::parse(raw).with_context(|| format!("invalid fetch_url: {}", raw))?,
        ),
        None => d,
    })
}
