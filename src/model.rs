//! Core data types shared by the planner, composer and decomposer.

/// Maximum number of source objects the server will accept in a single
/// compose call.
pub const MAX_COMPOSE: usize = 32;

/// Path prefix under which every temporary composite object is created.
///
/// Operators may use this well-known prefix to garbage-collect orphaned
/// composites left behind by a process that crashed before cleanup. Clients
/// must not place non-composite data under this prefix.
pub const COMPOSED_PREFIX: &str = "dataflux-composed-objects/";

/// One object the caller wants downloaded: its name and its known size.
///
/// `size` is authoritative: it drives both group admission and, for
/// composited objects, where each member's bytes are sliced out of the
/// downloaded composite. A stale size here is the classic cause of a
/// [`crate::error`] length mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// The object's name within the bucket.
    pub name: String,
    /// The object's size in bytes, as reported by the listing that produced
    /// this `ObjectRef`.
    pub size: u64,
}

impl ObjectRef {
    /// Construct a new `ObjectRef`.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// An ordered, non-empty run of [`ObjectRef`]s the planner has decided to
/// fetch together.
///
/// Groups of length 1 are fetched as plain single-object downloads; groups of
/// length 2 or more are composed, downloaded once, and split back apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectGroup {
    members: Vec<ObjectRef>,
}

impl ObjectGroup {
    /// Wrap `members` as a group. Panics if `members` is empty or exceeds
    /// [`MAX_COMPOSE`], since those are planner invariants that must never be
    /// violated by construction.
    pub fn new(members: Vec<ObjectRef>) -> Self {
        assert!(!members.is_empty(), "an ObjectGroup may not be empty");
        assert!(
            members.len() <= MAX_COMPOSE,
            "an ObjectGroup may not exceed {} members",
            MAX_COMPOSE
        );
        Self { members }
    }

    /// The group's members, in the order they will be composed and spliced.
    pub fn members(&self) -> &[ObjectRef] {
        &self.members
    }

    /// How many objects are in this group.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether this group has no members. Always `false` for a constructed
    /// `ObjectGroup`, present for parity with the standard collection idiom.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The sum of every member's size.
    pub fn total_size(&self) -> u64 {
        self.members.iter().map(|m| m.size).sum()
    }
}

/// A handle to a temporary composite object living at `bucket`/`name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeHandle {
    /// The bucket the composite lives in.
    pub bucket: String,
    /// The composite's name, always under [`COMPOSED_PREFIX`].
    pub name: String,
}

impl CompositeHandle {
    /// Generate a fresh, globally-unique composite handle in `bucket`.
    pub fn fresh(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: format!("{}{}", COMPOSED_PREFIX, uuid::Uuid::new_v4()),
        }
    }
}

/// Tuning parameters for the batch planner.
///
/// This is the engine's sole user-facing knob today, but kept as a struct
/// (rather than a bare `u64` parameter) to leave room for future additions
/// without breaking the [`crate::planner::dataflux_download`] signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationParams {
    /// The soft cap on a composed group's total size. The planner's
    /// admission rule may let the final member of a group push the running
    /// total past this value by up to that member's own size (the
    /// "one-overshoot" rule); see [`crate::planner::plan`].
    pub max_composite_object_size: u64,
}

impl OptimizationParams {
    /// Construct params with the given cap.
    pub fn new(max_composite_object_size: u64) -> Self {
        Self {
            max_composite_object_size,
        }
    }
}
