//! Single-object fetching.

use bytes::Bytes;
use tracing::instrument;

use crate::error::AdapterError;
use crate::retry::RetryPolicy;
use crate::store::ObjectStore;

/// Download one object's full contents.
///
/// This is a thin pass-through to the adapter; it exists as its own function
/// so the planner can call it uniformly whether an item is being fetched
/// singly (Rule A, or a singleton group under Rule C) or is the inner
/// download step of a composited group (see [`crate::decompose::decompose`]).
#[instrument(level = "trace", skip(store))]
pub(crate) async fn fetch(
    store: &dyn ObjectStore,
    bucket: &str,
    name: &str,
    retry: &RetryPolicy,
) -> Result<Bytes, AdapterError> {
    store.download(bucket, name, retry).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockObjectStore;

    #[tokio::test]
    async fn fetch_delegates_to_the_store() {
        let mut store = MockObjectStore::new();
        store
            .expect_download()
            .withf(|bucket, name, _| bucket == "my-bucket" && name == "a.txt")
            .returning(|_, _, _| Ok(Bytes::from_static(b"hello")));

        let bytes = fetch(&store, "my-bucket", "a.txt", &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from_static(b"hello"));
    }
}
