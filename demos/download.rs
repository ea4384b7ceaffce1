//! A small CLI that downloads every object under a bucket prefix using the
//! compose-optimized engine, for manual testing against a real bucket.

use anyhow::{Context as _, Result};
use clap::Parser;
use dataflux_download::{dataflux_download, ObjectRef, OptimizationParams};

/// Download objects from Google Cloud Storage, composing small ones together
/// to cut down on per-object request overhead.
#[derive(Debug, Parser)]
struct Opt {
    /// The Google Cloud project to authenticate against.
    #[clap(long)]
    project: String,

    /// The bucket to download from.
    #[clap(long)]
    bucket: String,

    /// Soft cap, in bytes, on a composed group's total size.
    #[clap(long, default_value = "32000000")]
    max_composite_object_size: u64,

    /// Object names to download, each followed by its known size in bytes,
    /// given as `name:size` (normally this list comes from a prior listing
    /// call, which is outside this crate's scope).
    #[clap(required = true)]
    objects: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("no other rustls crypto provider installed yet");
    let opt = Opt::parse();

    let inputs = opt
        .objects
        .iter()
        .map(|spec| parse_object_spec(spec))
        .collect::<Result<Vec<_>>>()?;

    let results = dataflux_download(
        &opt.project,
        &opt.bucket,
        inputs,
        None,
        OptimizationParams::new(opt.max_composite_object_size),
    )
    .await?;

    for bytes in &results {
        println!("downloaded {} bytes", bytes.len());
    }

    Ok(())
}

fn parse_object_spec(spec: &str) -> Result<ObjectRef> {
    let (name, size) = spec
        .rsplit_once(':')
        .with_context(|| format!("expected `name:size`, got {:?}", spec))?;
    let size: u64 = size
        .parse()
        .with_context(|| format!("invalid size in {:?}", spec))?;
    Ok(ObjectRef::new(name, size))
}
