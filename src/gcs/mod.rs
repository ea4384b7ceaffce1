//! The default object-store adapter, backed by Google Cloud Storage.

mod auth;
mod client;

use bytes::Bytes;
use tracing::instrument;

use crate::error::AdapterError;
use crate::retry::RetryPolicy;
use crate::store::ObjectStore;
use client::Client;

/// An [`ObjectStore`] implementation backed by the Google Cloud Storage JSON
/// API.
///
/// Authentication is resolved once, at construction time, via
/// [`gcp_auth`]'s service-account / workload-identity / application-default
/// fallback chain; the bucket is supplied per-call, matching how every other
/// method on the trait is scoped.
pub struct GcsObjectStore {
    client: Client,
}

impl GcsObjectStore {
    /// Construct a new adapter. `project` is currently only used to select
    /// application-default credentials scoped to that project; it is not
    /// otherwise sent with any request (object and bucket names are fully
    /// qualified in the Storage JSON API).
    #[instrument(level = "trace")]
    pub async fn new(_project: &str) -> anyhow::Result<Self> {
        let client = Client::new().await?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ObjectStore for GcsObjectStore {
    #[instrument(level = "trace", skip(self, retry))]
    async fn download(
        &self,
        bucket: &str,
        name: &str,
        retry: &RetryPolicy,
    ) -> Result<Bytes, AdapterError> {
        self.client.download(bucket, name, retry).await
    }

    #[instrument(level = "trace", skip(self, sources, retry), fields(len = sources.len()))]
    async fn compose(
        &self,
        bucket: &str,
        dest_name: &str,
        sources: &[String],
        retry: &RetryPolicy,
    ) -> Result<(), AdapterError> {
        self.client.compose(bucket, dest_name, sources, retry).await
    }

    #[instrument(level = "trace", skip(self, retry))]
    async fn delete(&self, bucket: &str, name: &str, retry: &RetryPolicy) -> Result<(), AdapterError> {
        self.client.delete(bucket, name, retry).await
    }
}
