//! # External Representations
//!
//! Every instancer has a twin outside this crate: the physics/render
//! particle group that actually gets simulated and drawn. This module
//! defines the narrow capability used to create and destroy those twins.
//!
//! The registry and the factory move in lock-step:
//!
//! ```text
//! registry.insert  <=>  factory.create_representation
//! registry.remove  <=>  factory.destroy_representation
//! ```

use std::collections::BTreeSet;

use crate::buffer::{InstancerId, ParticleGroup};

/// Everything a factory needs to allocate a representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepresentationDesc {
    /// Instancer id the representation is keyed by.
    pub id: InstancerId,
    /// Collision group.
    pub group: ParticleGroup,
    /// Particle count.
    pub count: usize,
    /// Whether particles of the same group collide with each other.
    pub self_collision: bool,
}

/// Creates and destroys physics/render representations of instancers.
pub trait RepresentationFactory {
    /// Opaque handle returned on creation and consumed on destruction.
    type Handle;

    /// Allocates the representation of a new instancer.
    fn create_representation(&mut self, desc: &RepresentationDesc) -> Self::Handle;

    /// Tears a representation down. Called exactly once per handle.
    fn destroy_representation(&mut self, handle: Self::Handle);
}

/// Handle issued by [`HeadlessFactory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeadlessHandle {
    /// Instancer the representation was created for.
    pub id: InstancerId,
    /// Particle count at creation.
    pub count: usize,
}

/// Factory without a physics backend.
///
/// Tracks which representations are alive and how many were created and
/// destroyed. Used by offline checkpoint tooling and tests.
#[derive(Clone, Debug, Default)]
pub struct HeadlessFactory {
    live: BTreeSet<InstancerId>,
    created: usize,
    destroyed: usize,
}

impl HeadlessFactory {
    /// Creates a factory with nothing alive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids with a live representation, ascending.
    #[must_use]
    pub fn live_ids(&self) -> Vec<InstancerId> {
        self.live.iter().copied().collect()
    }

    /// Returns true if instancer `id` has a live representation.
    #[must_use]
    pub fn is_live(&self, id: InstancerId) -> bool {
        self.live.contains(&id)
    }

    /// Number of live representations.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Total representations created.
    #[inline]
    #[must_use]
    pub const fn created(&self) -> usize {
        self.created
    }

    /// Total representations destroyed.
    #[inline]
    #[must_use]
    pub const fn destroyed(&self) -> usize {
        self.destroyed
    }
}

impl RepresentationFactory for HeadlessFactory {
    type Handle = HeadlessHandle;

    fn create_representation(&mut self, desc: &RepresentationDesc) -> HeadlessHandle {
        if !self.live.insert(desc.id) {
            tracing::warn!(id = desc.id, "representation created twice without destroy");
        }
        self.created += 1;
        HeadlessHandle {
            id: desc.id,
            count: desc.count,
        }
    }

    fn destroy_representation(&mut self, handle: HeadlessHandle) {
        if !self.live.remove(&handle.id) {
            tracing::warn!(id = handle.id, "destroying a representation that is not live");
        }
        self.destroyed += 1;
    }
}
