//! # Registry Synchronization
//!
//! Brings a live registry into structural agreement with a [`Manifest`].
//!
//! ## Algorithm
//!
//! ```text
//! current ∖ desired            -> delete
//! desired ∖ current            -> create
//! current ∩ desired, shape ≠   -> delete, then create (never resized in place)
//! ```
//!
//! All deletes run before any create, so the factory may reuse whatever the
//! destroy phase freed. Afterwards the registry iterates in manifest order.
//!
//! Reconciling against the empty manifest is the only way everything gets
//! removed.

use std::collections::HashMap;

use crate::buffer::{InstancerId, ParticleBuffer};
use crate::codec;
use crate::error::ParticleResult;
use crate::manifest::{Manifest, ManifestEntry};
use crate::registry::InstancerRegistry;
use crate::representation::{RepresentationDesc, RepresentationFactory};

/// Configuration for reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Self-collision flag for instancers created during reconciliation.
    pub self_collision: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            self_collision: true,
        }
    }
}

/// What one reconciliation did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Instancers destroyed, recreated ones included.
    pub deleted: usize,
    /// Instancers created, recreated ones included.
    pub created: usize,
    /// Instancers destroyed and recreated because their shape changed.
    pub recreated: usize,
    /// Instancers left untouched.
    pub unchanged: usize,
}

impl SyncStats {
    /// Returns true if nothing was created or destroyed.
    #[inline]
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.deleted == 0 && self.created == 0
    }
}

/// Diff-and-repair engine keeping a registry and its factory in lock-step.
#[derive(Debug, Default)]
pub struct SyncEngine {
    config: SyncConfig,
    last_stats: SyncStats,
}

impl SyncEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            last_stats: SyncStats::default(),
        }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the stats of the most recent reconciliation.
    #[inline]
    #[must_use]
    pub const fn last_stats(&self) -> SyncStats {
        self.last_stats
    }

    /// Reconciles `registry` against `manifest`.
    ///
    /// New and recreated instancers start as zeroed buffers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ParticleError::DuplicateId`] if the manifest lists an
    /// id twice. The manifest is checked before anything is touched.
    pub fn reconcile<F: RepresentationFactory>(
        &mut self,
        registry: &mut InstancerRegistry<F::Handle>,
        factory: &mut F,
        manifest: &Manifest,
    ) -> ParticleResult<SyncStats> {
        manifest.validate()?;

        let desired: HashMap<InstancerId, &ManifestEntry> =
            manifest.iter().map(|entry| (entry.id, entry)).collect();
        let mut stats = SyncStats::default();

        let mut to_delete = Vec::new();
        for buffer in registry.iter() {
            match desired.get(&buffer.id()) {
                None => to_delete.push(buffer.id()),
                Some(entry) if entry.group != buffer.group() || entry.count != buffer.count() => {
                    tracing::info!(
                        id = buffer.id(),
                        group = buffer.group(),
                        count = buffer.count(),
                        new_group = entry.group,
                        new_count = entry.count,
                        "instancer shape changed, recreating"
                    );
                    to_delete.push(buffer.id());
                    stats.recreated += 1;
                }
                Some(_) => stats.unchanged += 1,
            }
        }

        tracing::debug!(
            current = registry.len(),
            desired = manifest.len(),
            delete = to_delete.len(),
            recreate = stats.recreated,
            "reconciling instancers"
        );

        for id in to_delete {
            let (_, handle) = registry.remove(id)?.into_parts();
            factory.destroy_representation(handle);
            stats.deleted += 1;
            tracing::debug!(id, "instancer deleted");
        }

        for entry in manifest.iter() {
            if registry.contains(entry.id) {
                continue;
            }
            let desc = RepresentationDesc {
                id: entry.id,
                group: entry.group,
                count: entry.count,
                self_collision: self.config.self_collision,
            };
            let handle = factory.create_representation(&desc);
            registry.insert(ParticleBuffer::zeroed(entry.id, entry.group, entry.count), handle)?;
            stats.created += 1;
            tracing::debug!(id = entry.id, count = entry.count, "instancer created");
        }

        registry.reorder(&manifest.ids())?;

        self.last_stats = stats;
        Ok(stats)
    }

    /// Restores a registry from a checkpoint stream: decodes the header,
    /// reconciles against it, then decodes every instancer payload.
    ///
    /// Returns the manifest and the number of scalars consumed.
    ///
    /// # Errors
    ///
    /// Any error of [`codec::decode_registry`] or [`Self::reconcile`].
    pub fn restore<F: RepresentationFactory>(
        &mut self,
        stream: &[f64],
        registry: &mut InstancerRegistry<F::Handle>,
        factory: &mut F,
    ) -> ParticleResult<(Manifest, usize)> {
        let (manifest, used) = codec::decode_registry(stream, registry, |manifest, registry| {
            self.reconcile(registry, factory, manifest).map(|_| ())
        })?;
        tracing::debug!(
            scalars = used,
            instancers = manifest.len(),
            "restored instancer registry"
        );
        Ok((manifest, used))
    }

    /// Removes every instancer, destroying each representation.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reconcile`]; cannot fail for the empty manifest in
    /// practice.
    pub fn clear<F: RepresentationFactory>(
        &mut self,
        registry: &mut InstancerRegistry<F::Handle>,
        factory: &mut F,
    ) -> ParticleResult<SyncStats> {
        self.reconcile(registry, factory, &Manifest::empty())
    }
}
