//! # Instancer Manifests
//!
//! A manifest is the desired *shape* of a registry: an ordered list of
//! `(id, group, count)` triples with no per-particle data.

use std::collections::HashSet;

use crate::buffer::{InstancerId, ParticleGroup};
use crate::error::{ParticleError, ParticleResult};

/// Desired shape of one instancer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ManifestEntry {
    /// Instancer id.
    pub id: InstancerId,
    /// Particle group.
    pub group: ParticleGroup,
    /// Particle count.
    pub count: usize,
}

impl ManifestEntry {
    /// Creates a new manifest entry.
    #[inline]
    #[must_use]
    pub const fn new(id: InstancerId, group: ParticleGroup, count: usize) -> Self {
        Self { id, group, count }
    }
}

/// Ordered list of desired instancer shapes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Creates an empty manifest. Reconciling against it clears a registry.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a manifest from entries, keeping their order.
    #[must_use]
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Checks that no id appears twice.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleError::DuplicateId`] naming the first repeated id.
    pub fn validate(&self) -> ParticleResult<()> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !seen.insert(entry.id) {
                return Err(ParticleError::DuplicateId(entry.id));
            }
        }
        Ok(())
    }

    /// Returns the entry for `id`.
    #[must_use]
    pub fn get(&self, id: InstancerId) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Returns the entries in order.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Iterates over entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    /// Returns the ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<InstancerId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Returns the number of instancers described.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no instancers are described.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all entries' particle counts.
    #[must_use]
    pub fn total_particle_count(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }
}

impl FromIterator<ManifestEntry> for Manifest {
    fn from_iter<I: IntoIterator<Item = ManifestEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_order() {
        let manifest = Manifest::new(vec![
            ManifestEntry::new(4, 0, 10),
            ManifestEntry::new(1, 1, 0),
            ManifestEntry::new(9, 0, 3),
        ]);

        assert_eq!(manifest.ids(), vec![4, 1, 9]);
        assert_eq!(manifest.get(1), Some(&ManifestEntry::new(1, 1, 0)));
        assert_eq!(manifest.get(2), None);
        assert_eq!(manifest.total_particle_count(), 13);
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let manifest: Manifest = [
            ManifestEntry::new(1, 0, 1),
            ManifestEntry::new(2, 0, 1),
            ManifestEntry::new(1, 1, 5),
        ]
        .into_iter()
        .collect();

        assert_eq!(manifest.validate(), Err(ParticleError::DuplicateId(1)));
        assert!(Manifest::empty().validate().is_ok());
    }
}
