//! Server-side composition of many small objects into one temporary object.

use tracing::instrument;

use crate::error::{AdapterError, TooManySources};
use crate::model::{CompositeHandle, ObjectGroup, MAX_COMPOSE};
use crate::retry::RetryPolicy;
use crate::store::ObjectStore;

/// Create a composite object referencing every member of `group`, in order.
///
/// Fails synchronously, before any network call, if `group` has more members
/// than the server allows in one compose request.
#[instrument(level = "trace", skip(store, group), fields(len = group.len()))]
pub(crate) async fn compose(
    store: &dyn ObjectStore,
    handle: &CompositeHandle,
    group: &ObjectGroup,
    retry: &RetryPolicy,
) -> Result<(), AdapterError> {
    if group.len() > MAX_COMPOSE {
        return Err(AdapterError::Fatal(
            TooManySources {
                count: group.len(),
                max: MAX_COMPOSE,
            }
            .into(),
        ));
    }

    let sources: Vec<String> = group.members().iter().map(|m| m.name.clone()).collect();
    store
        .compose(&handle.bucket, &handle.name, &sources, retry)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectRef;
    use crate::store::MockObjectStore;

    #[tokio::test]
    async fn composes_members_in_order() {
        let mut store = MockObjectStore::new();
        store
            .expect_compose()
            .withf(|bucket, dest, sources, _| {
                bucket == "b"
                    && dest == "dataflux-composed-objects/fixed"
                    && sources == ["a".to_string(), "b".to_string()]
            })
            .returning(|_, _, _, _| Ok(()));

        let handle = CompositeHandle {
            bucket: "b".to_string(),
            name: "dataflux-composed-objects/fixed".to_string(),
        };
        let group = ObjectGroup::new(vec![ObjectRef::new("a", 1), ObjectRef::new("b", 2)]);

        compose(&store, &handle, &group, &RetryPolicy::default())
            .await
            .unwrap();
    }

    #[test]
    #[should_panic]
    fn object_group_rejects_too_many_members_at_construction() {
        let members = (0..40).map(|i| ObjectRef::new(format!("o{i}"), 1)).collect();
        ObjectGroup::new(members);
    }
}
