//! A small REST client for the Google Cloud Storage JSON API.
//!
//! This only implements the three operations the engine needs (media
//! download, compose, delete) rather than the full Storage surface; it plays
//! the same role as a hand-rolled Google Cloud client library, just scoped
//! down to this crate's needs.

use std::fmt;

use anyhow::Error;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE},
    StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument, trace};

use super::auth::Authenticator;
use crate::error::AdapterError;
use crate::retry::{wait, RetryPolicy, WaitStatus};

const STORAGE_API_BASE: &str = "https://storage.googleapis.com/storage/v1";

/// A small REST client for Google Cloud Storage, backed by `reqwest` and
/// authenticated via [`Authenticator`].
pub(crate) struct Client {
    authenticator: Authenticator,
    http: reqwest::Client,
}

impl Client {
    #[instrument(level = "trace")]
    pub(crate) async fn new() -> Result<Self, AdapterError> {
        let authenticator = Authenticator::new().await?;
        Ok(Self {
            authenticator,
            http: reqwest::Client::new(),
        })
    }

    /// Download the full contents of `bucket`/`name` as `?alt=media`.
    #[instrument(level = "trace", skip(self, retry))]
    pub(crate) async fn download(
        &self,
        bucket: &str,
        name: &str,
        retry: &RetryPolicy,
    ) -> Result<bytes::Bytes, AdapterError> {
        let url = format!(
            "{}/b/{}/o/{}?alt=media",
            STORAGE_API_BASE,
            percent_encode(bucket),
            percent_encode(name),
        );

        wait(retry, || {
            let url = url.clone();
            async move {
                match self.send(self.http.get(&url)).await {
                    Ok(resp) if resp.status().is_success() => {
                        match resp.bytes().await {
                            Ok(bytes) => WaitStatus::Finished(bytes),
                            Err(err) => WaitStatus::FailedTemporarily(err.into()),
                        }
                    }
                    Ok(resp) => {
                        let err = self.handle_error("GET", &url, bucket, name, resp).await;
                        classify(err)
                    }
                    Err(err) => classify(err.into()),
                }
            }
        })
        .await
    }

    /// Compose `sources` (in order) into a new object at `bucket`/`dest_name`.
    #[instrument(level = "trace", skip(self, sources, retry), fields(len = sources.len()))]
    pub(crate) async fn compose(
        &self,
        bucket: &str,
        dest_name: &str,
        sources: &[String],
        retry: &RetryPolicy,
    ) -> Result<(), AdapterError> {
        let url = format!(
            "{}/b/{}/o/{}/compose",
            STORAGE_API_BASE,
            percent_encode(bucket),
            percent_encode(dest_name),
        );
        let body = ComposeRequest {
            kind: "storage#composeRequest",
            source_objects: sources.iter().map(|name| SourceObject { name: name.clone() }).collect(),
        };

        wait(retry, || {
            let url = url.clone();
            let body = &body;
            async move {
                match self.send(self.http.post(&url).json(body)).await {
                    Ok(resp) if resp.status().is_success() => WaitStatus::Finished(()),
                    Ok(resp) => {
                        let err = self
                            .handle_error("POST", &url, bucket, dest_name, resp)
                            .await;
                        classify(err)
                    }
                    Err(err) => classify(err.into()),
                }
            }
        })
        .await
    }

    /// Delete `bucket`/`name`. A `404` is treated as success.
    #[instrument(level = "trace", skip(self, retry))]
    pub(crate) async fn delete(
        &self,
        bucket: &str,
        name: &str,
        retry: &RetryPolicy,
    ) -> Result<(), AdapterError> {
        let url = format!(
            "{}/b/{}/o/{}",
            STORAGE_API_BASE,
            percent_encode(bucket),
            percent_encode(name),
        );

        wait(retry, || {
            let url = url.clone();
            async move {
                match self.send(self.http.delete(&url)).await {
                    Ok(resp) if resp.status().is_success() => WaitStatus::Finished(()),
                    Ok(resp) if resp.status() == StatusCode::NOT_FOUND => WaitStatus::Finished(()),
                    Ok(resp) => {
                        let err = self.handle_error("DELETE", &url, bucket, name, resp).await;
                        classify(err)
                    }
                    Err(err) => classify(err.into()),
                }
            }
        })
        .await
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        let token = self.authenticator.token().await?;
        builder
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(Into::into)
    }

    /// Turn a non-2xx response into an [`AdapterError`], special-casing 404.
    async fn handle_error(
        &self,
        method: &str,
        url: &str,
        bucket: &str,
        name: &str,
        resp: reqwest::Response,
    ) -> AdapterError {
        if resp.status() == StatusCode::NOT_FOUND {
            return AdapterError::NotFound {
                bucket: bucket.to_owned(),
                name: name.to_owned(),
            };
        }

        let status = resp.status();
        let should_parse_as_json = response_claims_to_be_json(&resp);
        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(err) => return AdapterError::Transient(err.into()),
        };

        if should_parse_as_json {
            if let Ok(parsed) = serde_json::from_slice::<ErrorResponse>(&body) {
                let err = anyhow::Error::new(parsed.error)
                    .context(format!("{} {} failed", method, url));
                return if status.is_server_error() {
                    AdapterError::Transient(err)
                } else {
                    AdapterError::Fatal(err)
                };
            }
        }

        let raw = String::from_utf8_lossy(&body);
        error!(%method, %url, %status, body = %raw, "unrecognized Google Cloud Storage error response");
        let err = anyhow::anyhow!("{} {} failed with status {}: {}", method, url, status, raw);
        if status.is_server_error() {
            AdapterError::Transient(err)
        } else {
            AdapterError::Fatal(err)
        }
    }
}

/// Map a generic `anyhow::Error` coming from a failed `send()` into a
/// `WaitStatus`, treating connection/timeout failures as retryable.
fn classify<T>(err: AdapterError) -> WaitStatus<T, AdapterError> {
    match &err {
        AdapterError::Transient(_) => WaitStatus::FailedTemporarily(err),
        AdapterError::NotFound { .. } => WaitStatus::FailedPermanently(err),
        AdapterError::Fatal(inner) => {
            if let Some(reqwest_err) = original_http_error(inner) {
                if reqwest_err.is_timeout() || reqwest_err.is_connect() {
                    return WaitStatus::FailedTemporarily(err);
                }
            }
            WaitStatus::FailedPermanently(err)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ComposeRequest {
    kind: &'static str,
    source_objects: Vec<SourceObject>,
}

#[derive(Debug, Serialize)]
struct SourceObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: GCloudError,
}

/// Information about a Google Cloud Storage error, as returned in the body of
/// a non-2xx JSON response.
#[derive(Debug, Deserialize)]
pub(crate) struct GCloudError {
    pub(crate) code: i32,
    pub(crate) message: String,
}

impl fmt::Display for GCloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Google Cloud Storage error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for GCloudError {}

/// Percent-encode a string for use as a URL path component.
fn percent_encode(s: &str) -> impl fmt::Display + '_ {
    utf8_percent_encode(s, NON_ALPHANUMERIC)
}

/// Returns `true` if `resp` claims to carry a JSON body.
fn response_claims_to_be_json(resp: &reqwest::Response) -> bool {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false)
}

/// If `err` wraps a [`reqwest::Error`] anywhere in its chain, return it.
fn original_http_error(err: &Error) -> Option<&reqwest::Error> {
    err.chain().find_map(|cause| cause.downcast_ref::<reqwest::Error>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_encode_escapes_slashes_in_object_names() {
        let encoded = percent_encode("dataflux-composed-objects/abc").to_string();
        assert!(encoded.contains("%2F"));
    }
}
