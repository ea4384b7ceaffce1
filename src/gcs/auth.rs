//! OAuth2 authentication for the Google Cloud Storage adapter.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use gcp_auth::{Token, TokenProvider};
use tracing::instrument;

/// The OAuth2 scope our adapter needs: read/write access to Cloud Storage
/// objects. We deliberately don't request the broader `devstorage.full_control`
/// scope, since the engine never touches bucket ACLs or metadata.
pub(crate) const SCOPES: &[&str] = &["https://www.googleapis.com/auth/devstorage.read_write"];

/// Wraps a [`gcp_auth::TokenProvider`], which already implements the
/// service-account / workload-identity / application-default-credentials
/// fallback chain, so the adapter doesn't have to reimplement it.
pub(crate) struct Authenticator {
    provider: Arc<dyn TokenProvider>,
}

impl Authenticator {
    /// Discover credentials the same way `gcloud` and the official client
    /// libraries do: a service account key file, a workload identity
    /// provider, or the operator's own `gcloud auth application-default
    /// login` credentials, in that order.
    #[instrument(level = "trace")]
    pub(crate) async fn new() -> Result<Self> {
        let provider = gcp_auth::provider()
            .await
            .context("could not set up Google Cloud authentication")?;
        Ok(Self { provider })
    }

    /// Fetch a bearer token scoped to [`SCOPES`].
    #[instrument(level = "trace", skip(self))]
    pub(crate) async fn token(&self) -> Result<Arc<Token>> {
        self.provider
            .token(SCOPES)
            .await
            .context("could not get Google Cloud OAuth2 token")
    }
}
