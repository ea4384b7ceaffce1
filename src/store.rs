//! The capability surface the engine needs from an object store.
//!
//! The engine is polymorphic over any [`ObjectStore`] implementation; the
//! only shipped implementation is [`crate::gcs::GcsObjectStore`], but tests
//! substitute a [`MockObjectStore`] (generated by `mockall`) or a
//! hand-written in-memory fake.

use bytes::Bytes;

use crate::error::AdapterError;
use crate::retry::RetryPolicy;

/// Low-level operations against a bucket-scoped object store.
///
/// Implementations must be safe to share across concurrent calls: the
/// orchestrator may run several group tasks against the same store instance
/// at once (see the concurrency notes on
/// [`crate::planner::dataflux_download`]).
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download the full contents of `name` in `bucket`.
    async fn download(
        &self,
        bucket: &str,
        name: &str,
        retry: &RetryPolicy,
    ) -> Result<Bytes, AdapterError>;

    /// Create a composite object at `bucket`/`dest_name` that is the ordered
    /// byte-concatenation of `sources`. Callers are responsible for ensuring
    /// `sources.len() <= `[`crate::model::MAX_COMPOSE`]` before calling this;
    /// implementations may still reject an oversized call.
    async fn compose(
        &self,
        bucket: &str,
        dest_name: &str,
        sources: &[String],
        retry: &RetryPolicy,
    ) -> Result<(), AdapterError>;

    /// Delete `name` from `bucket`. Implementations should treat deleting an
    /// already-absent object as success (idempotent removal).
    async fn delete(
        &self,
        bucket: &str,
        name: &str,
        retry: &RetryPolicy,
    ) -> Result<(), AdapterError>;
}
