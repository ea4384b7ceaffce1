//! Splitting a downloaded composite back into its per-source payloads.

use bytes::Bytes;
use tracing::error;

use crate::error::AdapterError;
use crate::fetch::fetch;
use crate::model::{CompositeHandle, ObjectGroup};
use crate::retry::RetryPolicy;
use crate::store::ObjectStore;

/// Download `handle` and slice its bytes back apart according to `group`'s
/// size vector, in order.
///
/// If the composite's total length does not match the sum of `group`'s
/// member sizes, this logs an error (the one mandatory length-mismatch log
/// event) but still returns whatever slices it can compute, clamped to the
/// buffer's actual length. It does not raise: a stale size on one
/// `ObjectRef` should not discard the correct payloads for every other
/// member of the group.
#[tracing::instrument(level = "trace", skip(store, group), fields(len = group.len()))]
pub(crate) async fn decompose(
    store: &dyn ObjectStore,
    handle: &CompositeHandle,
    group: &ObjectGroup,
    retry: &RetryPolicy,
) -> Result<Vec<Bytes>, AdapterError> {
    let buffer = fetch(store, &handle.bucket, &handle.name, retry).await?;

    let got_bytes: u64 = group.total_size();
    let want_bytes = buffer.len() as u64;
    if got_bytes != want_bytes {
        error!(
            got_bytes,
            want_bytes, composite = %handle.name, "composite length mismatch during decomposition"
        );
    }

    let mut slices = Vec::with_capacity(group.len());
    let mut start = 0usize;
    for member in group.members() {
        let clamped_start = start.min(buffer.len());
        let end = start.saturating_add(member.size as usize);
        let clamped_end = end.min(buffer.len());
        slices.push(buffer.slice(clamped_start..clamped_end.max(clamped_start)));
        start = end;
    }

    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectRef;
    use crate::store::MockObjectStore;

    #[tokio::test]
    async fn splits_a_composite_into_its_members() {
        let mut store = MockObjectStore::new();
        store
            .expect_download()
            .returning(|_, _, _| Ok(Bytes::from_static(b"abcdefghij")));

        let handle = CompositeHandle {
            bucket: "b".to_string(),
            name: "dataflux-composed-objects/x".to_string(),
        };
        let group = ObjectGroup::new(vec![
            ObjectRef::new("a", 3),
            ObjectRef::new("b", 3),
            ObjectRef::new("c", 4),
        ]);

        let slices = decompose(&store, &handle, &group, &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(slices[0], Bytes::from_static(b"abc"));
        assert_eq!(slices[1], Bytes::from_static(b"def"));
        assert_eq!(slices[2], Bytes::from_static(b"ghij"));
    }

    #[tokio::test]
    async fn tolerates_a_length_mismatch_by_clamping() {
        let mut store = MockObjectStore::new();
        store
            .expect_download()
            .returning(|_, _, _| Ok(Bytes::from_static(b"abcde")));

        let handle = CompositeHandle {
            bucket: "b".to_string(),
            name: "dataflux-composed-objects/x".to_string(),
        };
        // Sizes sum to 60, but the composite is only 5 bytes long.
        let group = ObjectGroup::new(vec![ObjectRef::new("a", 50), ObjectRef::new("b", 10)]);

        let slices = decompose(&store, &handle, &group, &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0], Bytes::from_static(b"abcde"));
        assert_eq!(slices[1], Bytes::new());
    }

    #[tokio::test]
    async fn handles_zero_byte_members() {
        let mut store = MockObjectStore::new();
        store
            .expect_download()
            .returning(|_, _, _| Ok(Bytes::from_static(b"ab")));

        let handle = CompositeHandle {
            bucket: "b".to_string(),
            name: "dataflux-composed-objects/x".to_string(),
        };
        let group = ObjectGroup::new(vec![
            ObjectRef::new("a", 1),
            ObjectRef::new("empty", 0),
            ObjectRef::new("b", 1),
        ]);

        let slices = decompose(&store, &handle, &group, &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(slices[0], Bytes::from_static(b"a"));
        assert_eq!(slices[1], Bytes::new());
        assert_eq!(slices[2], Bytes::from_static(b"b"));
    }
}
