//! # Particle-System Context
//!
//! One [`ParticleSystem`] per simulation. It owns the instancer registry,
//! the representation factory, the scale limits and the sampling RNG, and
//! is the only place instancers are generated or removed outside of
//! reconciliation.
//!
//! ```text
//! generate_instancer ──► validate ──► factory.create ──► registry.insert
//! remove_instancer   ──► registry.remove ──► factory.destroy
//! deserialize        ──► header ──► reconcile ──► payloads
//! ```

use particula_core::{
    codec, Frame, InstancerId, InstancerRegistry, Manifest, ParticleBuffer, ParticleError,
    ParticleGroup, Quat, RepresentationDesc, RepresentationFactory, SyncEngine, SyncStats, Vec3,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::{KindProfile, SystemConfig};
use crate::error::{SystemError, SystemResult};
use crate::sampling::{PointSampler, PrototypeChoice, SampleRequest, ScaleLimits};

/// Everything needed to generate one instancer from explicit arrays.
///
/// Unset arrays fall back to: positions and velocities zero, identity
/// orientation, scales sampled within the system's scale limits,
/// prototype 0.
#[derive(Clone, Debug, PartialEq)]
pub struct InstancerDesc {
    /// Id to use; `None` picks the next free id.
    pub id: Option<InstancerId>,
    /// Collision group.
    pub group: ParticleGroup,
    /// Particle count.
    pub count: usize,
    /// Absolute positions.
    pub positions: Option<Vec<Vec3>>,
    /// Velocities.
    pub velocities: Option<Vec<Vec3>>,
    /// Orientations.
    pub orientations: Option<Vec<Quat>>,
    /// Scales.
    pub scales: Option<Vec<Vec3>>,
    /// Whether particles of the same group collide.
    pub self_collision: bool,
    /// Prototype indices.
    pub prototype_indices: Option<Vec<u32>>,
}

impl Default for InstancerDesc {
    fn default() -> Self {
        Self {
            id: None,
            group: 0,
            count: 0,
            positions: None,
            velocities: None,
            orientations: None,
            scales: None,
            self_collision: true,
            prototype_indices: None,
        }
    }
}

impl InstancerDesc {
    /// Describes `count` particles with every array defaulted and
    /// self-collision on.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    /// Describes one particle per position.
    #[must_use]
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        let count = positions.len();
        Self {
            positions: Some(positions),
            ..Self::new(count)
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: InstancerId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the group.
    #[must_use]
    pub fn with_group(mut self, group: ParticleGroup) -> Self {
        self.group = group;
        self
    }

    /// Sets the velocities.
    #[must_use]
    pub fn with_velocities(mut self, velocities: Vec<Vec3>) -> Self {
        self.velocities = Some(velocities);
        self
    }

    /// Sets the orientations.
    #[must_use]
    pub fn with_orientations(mut self, orientations: Vec<Quat>) -> Self {
        self.orientations = Some(orientations);
        self
    }

    /// Sets the scales.
    #[must_use]
    pub fn with_scales(mut self, scales: Vec<Vec3>) -> Self {
        self.scales = Some(scales);
        self
    }

    /// Sets the prototype indices.
    #[must_use]
    pub fn with_prototype_indices(mut self, indices: Vec<u32>) -> Self {
        self.prototype_indices = Some(indices);
        self
    }

    /// Sets self-collision.
    #[must_use]
    pub fn with_self_collision(mut self, self_collision: bool) -> Self {
        self.self_collision = self_collision;
        self
    }
}

/// Structured snapshot of a system: its shape plus every buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemState {
    /// Registry shape, in iteration order.
    pub manifest: Manifest,
    /// Buffers, in iteration order.
    pub instancers: Vec<ParticleBuffer>,
}

/// The particle-system context.
pub struct ParticleSystem<F: RepresentationFactory> {
    config: SystemConfig,
    profile: KindProfile,
    registry: InstancerRegistry<F::Handle>,
    sync: SyncEngine,
    scale_limits: ScaleLimits,
    rng: ChaCha8Rng,
    factory: F,
}

impl<F: RepresentationFactory> ParticleSystem<F> {
    /// Creates a context with no instancers. Scale limits start at the
    /// contact offset on every axis.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: SystemConfig, factory: F) -> SystemResult<Self> {
        config.validate()?;
        tracing::info!(
            name = %config.name,
            kind = ?config.kind,
            contact_offset = config.contact_offset,
            "particle system initialized"
        );

        Ok(Self {
            profile: config.profile(),
            sync: SyncEngine::new(config.sync_config()),
            scale_limits: ScaleLimits::fixed(config.contact_offset),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            registry: InstancerRegistry::new(),
            config,
            factory,
        })
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Returns the kind's capability record.
    #[inline]
    #[must_use]
    pub const fn profile(&self) -> KindProfile {
        self.profile
    }

    /// Returns the registry.
    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &InstancerRegistry<F::Handle> {
        &self.registry
    }

    /// Returns the representation factory.
    #[inline]
    #[must_use]
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// Returns the current scale limits.
    #[inline]
    #[must_use]
    pub const fn scale_limits(&self) -> ScaleLimits {
        self.scale_limits
    }

    /// Total particles across every instancer.
    #[must_use]
    pub fn n_particles(&self) -> usize {
        self.registry.total_particle_count()
    }

    /// Number of instancers.
    #[must_use]
    pub fn instancer_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns the buffer of instancer `id`.
    #[must_use]
    pub fn instancer(&self, id: InstancerId) -> Option<&ParticleBuffer> {
        self.registry.get(id)
    }

    /// Returns the buffer of instancer `id` mutably.
    pub fn instancer_mut(&mut self, id: InstancerId) -> Option<&mut ParticleBuffer> {
        self.registry.get_mut(id)
    }

    /// Name of instancer `id`: `{system name}Instancer{id}`.
    #[must_use]
    pub fn instancer_name(&self, id: InstancerId) -> String {
        format!("{}Instancer{id}", self.config.name)
    }

    /// Parses an instancer name produced by [`Self::instancer_name`].
    #[must_use]
    pub fn instancer_id_from_name(&self, name: &str) -> Option<InstancerId> {
        name.strip_prefix(self.config.name.as_str())?
            .strip_prefix("Instancer")?
            .parse()
            .ok()
    }

    /// Sets the scale limits. A `None` bound is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::InvalidScaleLimits`] if the resulting minimum
    /// exceeds the maximum on any axis; the limits are then unchanged.
    pub fn set_scale_limits(&mut self, min: Option<Vec3>, max: Option<Vec3>) -> SystemResult<()> {
        self.scale_limits = ScaleLimits::new(
            min.unwrap_or(self.scale_limits.min()),
            max.unwrap_or(self.scale_limits.max()),
        )?;
        Ok(())
    }

    /// Generates an instancer from explicit arrays and returns its id.
    ///
    /// Everything is validated before the factory is called, so a failed
    /// call leaves both the registry and the factory untouched.
    ///
    /// # Errors
    ///
    /// - [`ParticleError::DuplicateId`] if the id is taken
    /// - [`ParticleError::ShapeMismatch`] if an array's length is not `count`
    /// - [`SystemError::UnknownPrototype`] for an index past `prototype_count`
    /// - [`SystemError::IdsExhausted`] if no id is given and none is free
    pub fn generate_instancer(&mut self, desc: InstancerDesc) -> SystemResult<InstancerId> {
        let id = match desc.id {
            Some(id) => id,
            None => self.registry.next_id().ok_or(SystemError::IdsExhausted)?,
        };
        if self.registry.contains(id) {
            return Err(ParticleError::DuplicateId(id).into());
        }

        let mut buffer = ParticleBuffer::zeroed(id, desc.group, desc.count);
        if let Some(positions) = &desc.positions {
            buffer.set_positions(positions, Frame::Absolute)?;
        }
        if let Some(velocities) = &desc.velocities {
            buffer.set_velocities(velocities)?;
        }
        if let Some(orientations) = &desc.orientations {
            buffer.set_orientations(orientations)?;
        }
        if let Some(indices) = &desc.prototype_indices {
            let available = self.config.prototype_count;
            if let Some(&index) = indices.iter().find(|&&i| i >= available) {
                return Err(SystemError::UnknownPrototype { index, available });
            }
            buffer.set_prototype_indices(indices)?;
        }
        match &desc.scales {
            Some(scales) => buffer.set_scales(scales)?,
            None => {
                let scales: Vec<Vec3> = (0..desc.count)
                    .map(|_| self.scale_limits.sample(&mut self.rng))
                    .collect();
                buffer.set_scales(&scales)?;
            }
        }

        let handle = self.factory.create_representation(&RepresentationDesc {
            id,
            group: desc.group,
            count: desc.count,
            self_collision: desc.self_collision,
        });
        self.registry.insert(buffer, handle)?;

        tracing::debug!(
            id,
            group = desc.group,
            count = desc.count,
            name = %self.instancer_name(id),
            "instancer generated"
        );
        Ok(id)
    }

    /// Generates instancer `id` from points produced by `sampler`.
    ///
    /// At most `request.max_samples` points are used. Scales are sampled
    /// within the scale limits; prototype indices follow `prototypes`.
    ///
    /// # Errors
    ///
    /// - [`ParticleError::SamplingFailed`] if the sampler yields no points
    /// - [`SystemError::InvalidConfig`] for an empty uniform prototype list
    /// - any error of [`Self::generate_instancer`]
    pub fn generate_instancer_from_sampler<S: PointSampler + ?Sized>(
        &mut self,
        id: InstancerId,
        group: ParticleGroup,
        sampler: &mut S,
        request: &SampleRequest,
        self_collision: bool,
        prototypes: &PrototypeChoice,
    ) -> SystemResult<InstancerId> {
        let mut points = sampler.sample_points(request);
        if points.is_empty() {
            return Err(ParticleError::SamplingFailed(id).into());
        }
        points.truncate(request.max_samples);

        let count = points.len();
        let prototype_indices = prototypes.resolve(count, &mut self.rng)?;
        self.generate_instancer(InstancerDesc {
            id: Some(id),
            group,
            count,
            positions: Some(points),
            self_collision,
            prototype_indices,
            ..InstancerDesc::default()
        })
    }

    /// Removes instancer `id` and destroys its representation.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleError::NotFound`] if the id is absent.
    pub fn remove_instancer(&mut self, id: InstancerId) -> SystemResult<()> {
        let (_, handle) = self.registry.remove(id)?.into_parts();
        self.factory.destroy_representation(handle);
        tracing::debug!(id, "instancer removed");
        Ok(())
    }

    /// Removes every instancer by reconciling against the empty manifest.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reconcile`].
    pub fn remove_all_instancers(&mut self) -> SystemResult<SyncStats> {
        Ok(self.sync.clear(&mut self.registry, &mut self.factory)?)
    }

    /// Reconciles the registry against `manifest`.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleError::DuplicateId`] if the manifest repeats an id.
    pub fn reconcile(&mut self, manifest: &Manifest) -> SystemResult<SyncStats> {
        Ok(self
            .sync
            .reconcile(&mut self.registry, &mut self.factory, manifest)?)
    }

    /// Number of scalars [`Self::serialize`] produces.
    #[must_use]
    pub fn state_size(&self) -> usize {
        codec::registry_state_size(&self.registry)
    }

    /// Encodes every instancer into a flat checkpoint stream.
    #[must_use]
    pub fn serialize(&self) -> Vec<f64> {
        codec::encode_registry(&self.registry)
    }

    /// Restores from a checkpoint stream; returns the scalars consumed.
    ///
    /// # Errors
    ///
    /// Any codec or reconciliation error. The registry shape is applied
    /// before payloads are read, so a bad payload leaves a registry that
    /// still agrees with the factory.
    pub fn deserialize(&mut self, stream: &[f64]) -> SystemResult<usize> {
        let (manifest, used) = self
            .sync
            .restore(stream, &mut self.registry, &mut self.factory)?;
        tracing::debug!(
            scalars = used,
            instancers = manifest.len(),
            particles = self.n_particles(),
            "particle system deserialized"
        );
        Ok(used)
    }

    /// Takes a structured snapshot.
    #[must_use]
    pub fn dump_state(&self) -> SystemState {
        SystemState {
            manifest: self.registry.manifest(),
            instancers: self.registry.iter().cloned().collect(),
        }
    }

    /// Restores a structured snapshot: reconciles to its manifest, then
    /// loads every buffer.
    ///
    /// # Errors
    ///
    /// - any error of [`Self::reconcile`]
    /// - [`ParticleError::NotFound`] if a buffer is not in the manifest
    /// - [`ParticleError::IdentityMismatch`] / [`ParticleError::ShapeMismatch`]
    ///   if a buffer disagrees with its manifest entry
    pub fn load_state(&mut self, state: &SystemState) -> SystemResult<()> {
        self.reconcile(&state.manifest)?;
        for buffer in &state.instancers {
            let target = self
                .registry
                .get_mut(buffer.id())
                .ok_or(ParticleError::NotFound(buffer.id()))?;
            target.assign_from(buffer)?;
        }
        Ok(())
    }

    /// Destroys every representation and hands the factory back.
    pub fn teardown(mut self) -> F {
        if let Err(err) = self.sync.clear(&mut self.registry, &mut self.factory) {
            tracing::warn!(%err, "teardown left instancers behind");
        }
        tracing::info!(name = %self.config.name, "particle system torn down");
        self.factory
    }
}
