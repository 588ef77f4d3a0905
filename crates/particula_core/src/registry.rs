//! # Instancer Registry
//!
//! Insertion-ordered mapping from [`InstancerId`] to the instancer's
//! [`ParticleBuffer`] and its external representation handle.
//!
//! Entries live in a `Vec` (iteration order = checkpoint order) with an
//! `id -> slot` side table for O(1) lookups.
//!
//! The registry only does bookkeeping. Pairing every insert with a factory
//! `create` and every remove with a `destroy` is the caller's job
//! (see [`crate::sync::SyncEngine`]).

use std::collections::{HashMap, HashSet};

use crate::buffer::{InstancerId, ParticleBuffer};
use crate::error::{ParticleError, ParticleResult};
use crate::manifest::{Manifest, ManifestEntry};

/// A registered instancer: particle data plus the handle of its external
/// representation.
#[derive(Debug)]
pub struct Instancer<H> {
    buffer: ParticleBuffer,
    handle: H,
}

impl<H> Instancer<H> {
    /// Returns the particle buffer.
    #[inline]
    #[must_use]
    pub const fn buffer(&self) -> &ParticleBuffer {
        &self.buffer
    }

    /// Returns the particle buffer mutably.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut ParticleBuffer {
        &mut self.buffer
    }

    /// Returns the representation handle.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> &H {
        &self.handle
    }

    /// Splits the instancer into its buffer and handle.
    #[must_use]
    pub fn into_parts(self) -> (ParticleBuffer, H) {
        (self.buffer, self.handle)
    }
}

/// Ordered collection of instancers, keyed by id.
#[derive(Debug)]
pub struct InstancerRegistry<H> {
    /// Entries in insertion order.
    entries: Vec<Instancer<H>>,
    /// Id to slot in `entries`.
    index: HashMap<InstancerId, usize>,
}

impl<H> Default for InstancerRegistry<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<H> InstancerRegistry<H> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `buffer` under its own id.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleError::DuplicateId`] if the id is already present.
    pub fn insert(&mut self, buffer: ParticleBuffer, handle: H) -> ParticleResult<()> {
        let id = buffer.id();
        if self.index.contains_key(&id) {
            return Err(ParticleError::DuplicateId(id));
        }

        self.index.insert(id, self.entries.len());
        self.entries.push(Instancer { buffer, handle });
        Ok(())
    }

    /// Detaches instancer `id` and hands it back to the caller, who is
    /// responsible for destroying its representation.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleError::NotFound`] if the id is absent.
    pub fn remove(&mut self, id: InstancerId) -> ParticleResult<Instancer<H>> {
        let slot = self.index.remove(&id).ok_or(ParticleError::NotFound(id))?;
        let removed = self.entries.remove(slot);
        self.reindex_from(slot);
        Ok(removed)
    }

    /// Returns the buffer of instancer `id`.
    #[must_use]
    pub fn get(&self, id: InstancerId) -> Option<&ParticleBuffer> {
        self.index.get(&id).map(|&slot| &self.entries[slot].buffer)
    }

    /// Returns the buffer of instancer `id` mutably.
    pub fn get_mut(&mut self, id: InstancerId) -> Option<&mut ParticleBuffer> {
        let slot = *self.index.get(&id)?;
        Some(&mut self.entries[slot].buffer)
    }

    /// Returns the representation handle of instancer `id`.
    #[must_use]
    pub fn handle(&self, id: InstancerId) -> Option<&H> {
        self.index.get(&id).map(|&slot| &self.entries[slot].handle)
    }

    /// Returns true if instancer `id` is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: InstancerId) -> bool {
        self.index.contains_key(&id)
    }

    /// Iterates over buffers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ParticleBuffer> {
        self.entries.iter().map(|e| &e.buffer)
    }

    /// Iterates over buffers mutably in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ParticleBuffer> {
        self.entries.iter_mut().map(|e| &mut e.buffer)
    }

    /// Iterates over full entries (buffer and handle) in insertion order.
    pub fn instancers(&self) -> impl Iterator<Item = &Instancer<H>> {
        self.entries.iter()
    }

    /// Returns the ids in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<InstancerId> {
        self.entries.iter().map(|e| e.buffer.id()).collect()
    }

    /// Returns the number of instancers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no instancers are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of every instancer's particle count.
    #[must_use]
    pub fn total_particle_count(&self) -> usize {
        self.entries.iter().map(|e| e.buffer.count()).sum()
    }

    /// Returns an id not used by any instancer: one past the largest id,
    /// or 0 for an empty registry. Once the largest id is
    /// `InstancerId::MAX`, the smallest unused id is returned instead.
    /// `None` only when every id is taken.
    #[must_use]
    pub fn next_id(&self) -> Option<InstancerId> {
        match self.entries.iter().map(|e| e.buffer.id()).max() {
            None => Some(0),
            Some(max) => max
                .checked_add(1)
                .or_else(|| (0..=InstancerId::MAX).find(|id| !self.index.contains_key(id))),
        }
    }

    /// Returns the registry's current shape, in iteration order.
    #[must_use]
    pub fn manifest(&self) -> Manifest {
        self.entries
            .iter()
            .map(|e| ManifestEntry::new(e.buffer.id(), e.buffer.group(), e.buffer.count()))
            .collect()
    }

    /// Moves the listed instancers to the front, in the given order.
    /// Unlisted instancers follow, keeping their relative order.
    ///
    /// # Errors
    ///
    /// - [`ParticleError::NotFound`] if a listed id is not registered
    /// - [`ParticleError::DuplicateId`] if an id is listed twice
    ///
    /// On error the order is unchanged.
    pub fn reorder(&mut self, order: &[InstancerId]) -> ParticleResult<()> {
        let mut seen = HashSet::with_capacity(order.len());
        for &id in order {
            if !self.index.contains_key(&id) {
                return Err(ParticleError::NotFound(id));
            }
            if !seen.insert(id) {
                return Err(ParticleError::DuplicateId(id));
            }
        }

        let mut slots: Vec<Option<Instancer<H>>> =
            std::mem::take(&mut self.entries).into_iter().map(Some).collect();
        let mut reordered = Vec::with_capacity(slots.len());
        for id in order {
            if let Some(entry) = slots[self.index[id]].take() {
                reordered.push(entry);
            }
        }
        reordered.extend(slots.into_iter().flatten());

        self.entries = reordered;
        self.reindex_from(0);
        Ok(())
    }

    /// Rewrites side-table slots from `start` onwards.
    fn reindex_from(&mut self, start: usize) {
        for (slot, entry) in self.entries.iter().enumerate().skip(start) {
            self.index.insert(entry.buffer.id(), slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(ids: &[InstancerId]) -> InstancerRegistry<()> {
        let mut registry = InstancerRegistry::new();
        for &id in ids {
            registry
                .insert(ParticleBuffer::zeroed(id, 0, id as usize), ())
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let mut registry = registry_with(&[1, 2]);
        let err = registry.insert(ParticleBuffer::zeroed(2, 1, 9), ()).unwrap_err();

        assert_eq!(err, ParticleError::DuplicateId(2));
        assert_eq!(registry.get(2).map(ParticleBuffer::count), Some(2));
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let mut registry = registry_with(&[1]);
        assert!(matches!(registry.remove(7), Err(ParticleError::NotFound(7))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_keeps_order_and_lookups() {
        let mut registry = registry_with(&[5, 3, 8, 1]);
        let removed = registry.remove(3).unwrap();

        assert_eq!(removed.buffer().id(), 3);
        assert_eq!(registry.ids(), vec![5, 8, 1]);
        assert_eq!(registry.get(8).map(ParticleBuffer::id), Some(8));
        assert_eq!(registry.get(1).map(ParticleBuffer::id), Some(1));
        assert!(!registry.contains(3));
    }

    #[test]
    fn test_total_particle_count() {
        let registry = registry_with(&[2, 3, 0]);
        assert_eq!(registry.total_particle_count(), 5);
        assert_eq!(InstancerRegistry::<()>::new().total_particle_count(), 0);
    }

    #[test]
    fn test_next_id_starts_at_zero() {
        assert_eq!(InstancerRegistry::<()>::new().next_id(), Some(0));
        assert_eq!(registry_with(&[4, 9, 2]).next_id(), Some(10));
    }

    #[test]
    fn test_next_id_after_max_id_reuses_smallest_gap() {
        let mut registry = registry_with(&[0, 1, 3]);
        registry
            .insert(ParticleBuffer::zeroed(InstancerId::MAX, 0, 1), ())
            .unwrap();

        assert_eq!(registry.next_id(), Some(2));
    }

    #[test]
    fn test_manifest_follows_iteration_order() {
        let registry = registry_with(&[3, 1]);
        let manifest = registry.manifest();

        assert_eq!(
            manifest.entries(),
            &[ManifestEntry::new(3, 0, 3), ManifestEntry::new(1, 0, 1)]
        );
    }

    #[test]
    fn test_reorder() {
        let mut registry = registry_with(&[1, 2, 3, 4]);
        registry.reorder(&[3, 1]).unwrap();

        assert_eq!(registry.ids(), vec![3, 1, 2, 4]);
        assert_eq!(registry.get(2).map(ParticleBuffer::id), Some(2));
        assert_eq!(registry.get(3).map(ParticleBuffer::id), Some(3));
    }

    #[test]
    fn test_reorder_rejects_unknown_or_repeated_ids() {
        let mut registry = registry_with(&[1, 2]);

        assert_eq!(registry.reorder(&[2, 9]), Err(ParticleError::NotFound(9)));
        assert_eq!(registry.reorder(&[2, 2]), Err(ParticleError::DuplicateId(2)));
        assert_eq!(registry.ids(), vec![1, 2]);
    }

    #[test]
    fn test_get_mut_and_handle() {
        let mut registry = InstancerRegistry::new();
        registry.insert(ParticleBuffer::zeroed(4, 0, 1), "handle-4").unwrap();

        if let Some(buffer) = registry.get_mut(4) {
            buffer.set_origin([1.0, 0.0, 0.0]);
        }
        assert_eq!(registry.get(4).map(ParticleBuffer::origin), Some([1.0, 0.0, 0.0]));
        assert_eq!(registry.handle(4), Some(&"handle-4"));
        assert_eq!(registry.handle(5), None);
    }
}
