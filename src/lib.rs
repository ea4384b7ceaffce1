//! A download-optimization engine for Google Cloud Storage.
//!
//! Downloading many small objects one request at a time is dominated by
//! per-request latency, not transfer time. This crate amortizes that cost by
//! opportunistically composing runs of small objects into one temporary
//! server-side object, downloading that single composite, and splitting it
//! back apart on the client; large objects bypass composition and are
//! fetched directly. See [`dataflux_download`] for the entry point.

pub(crate) mod common;
mod compose;
mod decompose;
pub mod error;
mod fetch;
mod gcs;
pub mod model;
mod planner;
pub mod retry;
pub mod store;

pub use error::AdapterError;
pub use gcs::GcsObjectStore;
pub use model::{CompositeHandle, ObjectGroup, ObjectRef, OptimizationParams, COMPOSED_PREFIX, MAX_COMPOSE};
pub use planner::{dataflux_download, dataflux_download_with_cancellation};
pub use retry::RetryPolicy;
pub use store::ObjectStore;

/// Standard error type for this crate.
pub use anyhow::Error;

/// Standard result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
