//! The batch planner: partitions input objects into single fetches and
//! composite groups, then drives the compose/download/split/delete pipeline.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::common::*;
use crate::compose::compose;
use crate::decompose::decompose;
use crate::error::AdapterError;
use crate::fetch::fetch;
use crate::gcs::GcsObjectStore;
use crate::model::{CompositeHandle, ObjectGroup, ObjectRef, OptimizationParams, MAX_COMPOSE};
use crate::retry::RetryPolicy;
use crate::store::ObjectStore;

/// How many groups/single-fetches the orchestrator runs concurrently.
///
/// The sequential baseline the invariants are defined against is the
/// degenerate case of this value being `1`; concurrency is safe because
/// every composite name is uuid-unique and every group writes into disjoint,
/// positionally-determined result slots (see the module-level docs on
/// [`dataflux_download`]).
const DEFAULT_PARALLELISM: usize = 8;

/// One unit of planned work: either a single object to fetch directly, or a
/// group of objects to compose, download and split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlannedItem {
    Single(ObjectRef),
    Composite(ObjectGroup),
}

impl PlannedItem {
    fn len(&self) -> usize {
        match self {
            PlannedItem::Single(_) => 1,
            PlannedItem::Composite(group) => group.len(),
        }
    }
}

/// Partition `inputs` into single fetches and composite groups.
///
/// This is a pure, synchronous function with no I/O: it decides group
/// boundaries only, leaving execution to [`dataflux_download`]. Pulled apart
/// this way so the admission rule below can be pinned with direct unit tests
/// that need neither an adapter nor an async runtime.
///
/// Admission rule (Rule B): starting from an empty group, keep admitting the
/// next input while the group has fewer than [`MAX_COMPOSE`] members *and*
/// the group's running total, *before* adding the next item, is still within
/// `params.max_composite_object_size`. This is intentionally a one-overshoot
/// rule: the item that tips the group over the cap is still admitted, so the
/// final member of a group may push its total strictly above the cap. This
/// predicate must not be "fixed" to check the total after admission — that
/// would change group boundaries observably and is not what this algorithm
/// does.
pub(crate) fn plan(inputs: &[ObjectRef], params: OptimizationParams) -> Vec<PlannedItem> {
    let mut items = Vec::new();
    let mut i = 0;

    while i < inputs.len() {
        // Rule A: objects bigger than the cap are never composited.
        if inputs[i].size > params.max_composite_object_size {
            items.push(PlannedItem::Single(inputs[i].clone()));
            i += 1;
            continue;
        }

        // Rule B: build a group, admitting items under the one-overshoot rule.
        let mut members = Vec::new();
        let mut total = 0u64;
        while i < inputs.len() && total <= params.max_composite_object_size && members.len() < MAX_COMPOSE {
            total += inputs[i].size;
            members.push(inputs[i].clone());
            i += 1;
        }

        // Rule C: a group of one is just a single fetch.
        if members.len() == 1 {
            items.push(PlannedItem::Single(members.into_iter().next().expect("len == 1")));
        } else {
            items.push(PlannedItem::Composite(ObjectGroup::new(members)));
        }
    }

    items
}

/// Run one planned item to completion, returning its member payloads in
/// order.
///
/// For a composite group this drives the full
/// `PLANNED -> COMPOSED -> DOWNLOADED -> SPLIT -> DELETED` state machine: a
/// compose failure leaves no composite to clean up and propagates directly;
/// any failure after a successful compose still attempts delete before the
/// error (if any) propagates, and delete failures are logged, never raised.
/// The cancellation token is checked between pipeline stages so a cancelled
/// call still cleans up a composite it already created.
#[instrument(level = "trace", skip(store, item, cancel), fields(len = item.len()))]
async fn run_item(
    store: &dyn ObjectStore,
    bucket: &str,
    item: PlannedItem,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<Bytes>> {
    match item {
        PlannedItem::Single(obj) => {
            let bytes = fetch(store, bucket, &obj.name, retry)
                .await
                .map_err(adapter_err_to_anyhow)?;
            Ok(vec![bytes])
        }
        PlannedItem::Composite(group) => {
            let handle = CompositeHandle::fresh(bucket);

            if cancel.is_cancelled() {
                return Err(Error::msg("dataflux_download cancelled before compose"));
            }
            compose(store, &handle, &group, retry)
                .await
                .map_err(adapter_err_to_anyhow)?;

            let download_result = if cancel.is_cancelled() {
                Err(Error::msg("dataflux_download cancelled before download"))
            } else {
                decompose(store, &handle, &group, retry)
                    .await
                    .map_err(adapter_err_to_anyhow)
            };

            // Best-effort cleanup runs on every exit path once the composite
            // exists, regardless of whether decomposition succeeded.
            if let Err(delete_err) = store.delete(&handle.bucket, &handle.name, retry).await {
                error!(
                    composite = %handle.name,
                    error = %delete_err,
                    "failed to delete temporary composite object"
                );
            }

            download_result
        }
    }
}

fn adapter_err_to_anyhow(err: AdapterError) -> Error {
    Error::new(err)
}

/// Download every object named in `inputs` from `bucket`, transparently
/// composing small objects together to cut down on per-object request
/// overhead.
///
/// If `adapter` is `None`, a default [`GcsObjectStore`] bound to `project` is
/// constructed. Results are returned in the same order as `inputs`,
/// regardless of how planned items are interleaved internally.
pub async fn dataflux_download(
    project: &str,
    bucket: &str,
    inputs: Vec<ObjectRef>,
    adapter: Option<Arc<dyn ObjectStore>>,
    params: OptimizationParams,
) -> Result<Vec<Bytes>> {
    dataflux_download_with_cancellation(
        project,
        bucket,
        inputs,
        adapter,
        params,
        CancellationToken::new(),
    )
    .await
}

/// Like [`dataflux_download`], but accepts a [`CancellationToken`] the caller
/// can trigger to abort in-flight work early. Composites already created by
/// the time cancellation is observed are still cleaned up on a best-effort
/// basis.
pub async fn dataflux_download_with_cancellation(
    project: &str,
    bucket: &str,
    inputs: Vec<ObjectRef>,
    adapter: Option<Arc<dyn ObjectStore>>,
    params: OptimizationParams,
    cancel: CancellationToken,
) -> Result<Vec<Bytes>> {
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    let store: Arc<dyn ObjectStore> = match adapter {
        Some(store) => store,
        None => Arc::new(GcsObjectStore::new(project).await?),
    };
    let retry = RetryPolicy::default();

    let planned = plan(&inputs, params);

    // Assign each planned item its starting offset into the flat result
    // vector before dispatching, so results can be written positionally
    // regardless of completion order.
    let mut offset = 0usize;
    let dispatch: Vec<(usize, PlannedItem)> = planned
        .into_iter()
        .map(|item| {
            let start = offset;
            offset += item.len();
            (start, item)
        })
        .collect();

    let mut results: Vec<Option<Bytes>> = (0..inputs.len()).map(|_| None).collect();

    let store = &store;
    let bucket = bucket;
    let retry = &retry;
    let cancel = &cancel;
    let mut completed = stream::iter(dispatch.into_iter().map(|(start, item)| {
        let store = Arc::clone(store);
        async move {
            let bytes = run_item(store.as_ref(), bucket, item, retry, cancel).await?;
            Ok::<_, Error>((start, bytes))
        }
    }))
    .buffer_unordered(DEFAULT_PARALLELISM);

    while let Some(outcome) = completed.next().await {
        let (start, bytes) = outcome?;
        for (offset_in_group, payload) in bytes.into_iter().enumerate() {
            results[start + offset_in_group] = Some(payload);
        }
    }

    Ok(results
        .into_iter()
        .map(|b| b.expect("every slot is filled by exactly one planned item"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn refs(sizes: &[u64]) -> Vec<ObjectRef> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| ObjectRef::new(format!("o{i}"), size))
            .collect()
    }

    #[test]
    fn empty_input_plans_to_nothing() {
        let planned = plan(&[], OptimizationParams::new(1000));
        assert_eq!(planned.len(), 0);
    }

    #[test]
    fn a_single_oversized_item_is_fetched_alone() {
        let planned = plan(&refs(&[10_000]), OptimizationParams::new(1000));
        assert_eq!(planned.len(), 1);
        assert!(matches!(planned[0], PlannedItem::Single(_)));
    }

    #[test]
    fn thirty_two_small_items_form_one_group() {
        let planned = plan(&refs(&[1; 32]), OptimizationParams::new(1000));
        assert_eq!(planned.len(), 1);
        match &planned[0] {
            PlannedItem::Composite(group) => assert_eq!(group.len(), 32),
            other => panic!("expected a composite group, got {other:?}"),
        }
    }

    #[test]
    fn thirty_three_small_items_split_into_two_groups() {
        let planned = plan(&refs(&[1; 33]), OptimizationParams::new(1000));
        assert_eq!(planned.len(), 2);
        match &planned[0] {
            PlannedItem::Composite(group) => assert_eq!(group.len(), 32),
            other => panic!("expected a composite group, got {other:?}"),
        }
        assert!(matches!(planned[1], PlannedItem::Single(_)));
    }

    #[test]
    fn one_overshoot_admits_the_item_that_tips_the_cap() {
        // After admitting the first item (size 50), the running total is 50,
        // which is <= the cap of 100, so the second item (size 5000) is still
        // admitted by the pre-add check, even though it blows the cap.
        let planned = plan(&refs(&[50, 5000, 50, 50]), OptimizationParams::new(100));
        match &planned[0] {
            PlannedItem::Composite(group) => {
                assert_eq!(group.len(), 2);
                assert_eq!(group.total_size(), 5050);
            }
            other => panic!("expected a composite group, got {other:?}"),
        }
    }

    #[test]
    fn zero_size_objects_form_a_degenerate_group_at_zero_cap() {
        let planned = plan(&refs(&[0]), OptimizationParams::new(0));
        assert_eq!(planned.len(), 1);
        assert!(matches!(planned[0], PlannedItem::Single(_)));
    }

    #[tokio::test]
    async fn end_to_end_empty_input_makes_no_adapter_calls() {
        let store: Arc<dyn ObjectStore> = Arc::new(crate::store::MockObjectStore::new());
        let result = dataflux_download(
            "proj",
            "bucket",
            Vec::new(),
            Some(store),
            OptimizationParams::new(1000),
        )
        .await
        .unwrap();
        assert_eq!(result.len(), 0);
    }

    #[tokio::test]
    async fn end_to_end_preserves_order_across_mixed_groups() {
        use crate::store::MockObjectStore;

        // 32 one-byte items fill the first group to MAX_COMPOSE, forcing it
        // to close before the oversized item is ever considered for
        // admission; the oversized item is then fetched singly under Rule A;
        // the final two one-byte items form a second, smaller group.
        // Both composites (the 32-item group and the trailing 2-item group)
        // are served the same fixed payload here; it's long enough to cover
        // either group's total size, so only ordering and the "big" payload
        // are asserted below.
        let mut mock = MockObjectStore::new();
        mock.expect_compose().returning(|_, _, _, _| Ok(()));
        mock.expect_delete().returning(|_, _, _| Ok(()));
        mock.expect_download().returning(|_bucket, name, _retry| {
            if name.starts_with("dataflux-composed-objects/") {
                Ok(Bytes::from_static(b"0123456789012345678901234567890112"))
            } else if name == "big" {
                Ok(Bytes::from_static(b"big-bytes"))
            } else {
                panic!("unexpected download of {name}")
            }
        });

        let store: Arc<dyn ObjectStore> = Arc::new(mock);
        let mut inputs = refs(&[1; 32]);
        inputs.push(ObjectRef::new("big", 10_000));
        inputs.push(ObjectRef::new("y", 1));
        inputs.push(ObjectRef::new("z", 1));

        let result = dataflux_download(
            "proj",
            "bucket",
            inputs,
            Some(store),
            OptimizationParams::new(1000),
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 35);
        assert_eq!(result[32], Bytes::from_static(b"big-bytes"));
    }
}
