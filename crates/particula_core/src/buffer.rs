//! # Particle Buffers
//!
//! A [`ParticleBuffer`] holds the parallel per-particle arrays of a single
//! instancer plus its identity (id, group).
//!
//! ## Invariants
//!
//! 1. **Fixed count**: every per-particle array has exactly `count` elements.
//!    `count` never changes; a different count means a different buffer.
//! 2. **Frame**: positions are stored relative to `origin` and handed out in
//!    the absolute frame (`absolute = relative + origin`).
//! 3. **Lazy defaults**: orientation, scale, prototype index and visibility
//!    are synthesized on read until first written.
//!
//! ```text
//! id, group, count, origin
//! positions     [count x 3]   always stored (relative)
//! velocities    [count x 3]   always stored
//! orientations  [count x 4]   default (0, 0, 0, 1)
//! scales        [count x 3]   default (1, 1, 1)
//! prototypes    [count]       default 0
//! visibilities  [count]       default visible
//! ```

use std::borrow::Cow;
use std::fmt;

use crate::error::{ParticleError, ParticleResult};

/// Stable identifier of an instancer.
pub type InstancerId = u32;

/// Collision/interaction group tag.
pub type ParticleGroup = u32;

/// (x, y, z) vector.
pub type Vec3 = [f32; 3];

/// (x, y, z, w) unit quaternion, scalar last.
pub type Quat = [f32; 4];

/// Orientation reported for particles whose orientation was never set.
pub const IDENTITY_ORIENTATION: Quat = [0.0, 0.0, 0.0, 1.0];

/// Scale reported for particles whose scale was never set.
pub const UNIT_SCALE: Vec3 = [1.0, 1.0, 1.0];

/// Names the per-particle fields of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParticleField {
    /// Per-particle position.
    Position,
    /// Per-particle linear velocity.
    Velocity,
    /// Per-particle orientation quaternion.
    Orientation,
    /// Per-particle (x, y, z) scale.
    Scale,
    /// Per-particle prototype index.
    PrototypeIndex,
    /// Per-particle visibility flag.
    Visibility,
}

impl ParticleField {
    /// Returns the field's name as used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Velocity => "velocity",
            Self::Orientation => "orientation",
            Self::Scale => "scale",
            Self::PrototypeIndex => "prototype_index",
            Self::Visibility => "visibility",
        }
    }

    /// Number of scalars per particle.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Position | Self::Velocity | Self::Scale => 3,
            Self::Orientation => 4,
            Self::PrototypeIndex | Self::Visibility => 1,
        }
    }
}

impl fmt::Display for ParticleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coordinate frame of a position array handed to [`ParticleBuffer::set_positions`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Frame {
    /// Frame-independent coordinates.
    #[default]
    Absolute,
    /// Coordinates relative to the buffer's origin.
    Relative,
}

/// Per-instancer container of parallel particle arrays.
#[derive(Clone, Debug)]
pub struct ParticleBuffer {
    id: InstancerId,
    group: ParticleGroup,
    count: usize,
    origin: Vec3,
    /// Relative to `origin`.
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    orientations: Option<Vec<Quat>>,
    scales: Option<Vec<Vec3>>,
    prototype_indices: Option<Vec<u32>>,
    visibilities: Option<Vec<bool>>,
}

impl ParticleBuffer {
    /// Creates a buffer of `count` particles at the origin, at rest, with
    /// every optional field left at its default.
    #[must_use]
    pub fn zeroed(id: InstancerId, group: ParticleGroup, count: usize) -> Self {
        Self {
            id,
            group,
            count,
            origin: [0.0; 3],
            positions: vec![[0.0; 3]; count],
            velocities: vec![[0.0; 3]; count],
            orientations: None,
            scales: None,
            prototype_indices: None,
            visibilities: None,
        }
    }

    /// Creates a buffer whose particle count is taken from `positions`.
    ///
    /// The origin starts at zero, so both frames coincide.
    #[must_use]
    pub fn from_positions(id: InstancerId, group: ParticleGroup, positions: Vec<Vec3>) -> Self {
        let count = positions.len();
        Self {
            positions,
            ..Self::zeroed(id, group, count)
        }
    }

    /// Returns the instancer id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> InstancerId {
        self.id
    }

    /// Returns the particle group.
    #[inline]
    #[must_use]
    pub const fn group(&self) -> ParticleGroup {
        self.group
    }

    /// Returns the number of particles.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Returns true if the buffer holds no particles.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the instancer's placement offset.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Moves the instancer. Particles keep their relative placement and
    /// therefore move with it.
    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
    }

    /// Returns particle positions in the absolute frame.
    #[must_use]
    pub fn positions(&self) -> Vec<Vec3> {
        let o = self.origin;
        self.positions
            .iter()
            .map(|p| [p[0] + o[0], p[1] + o[1], p[2] + o[2]])
            .collect()
    }

    /// Returns particle positions relative to the origin, as stored.
    #[inline]
    #[must_use]
    pub fn relative_positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Sets particle positions given in `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleError::ShapeMismatch`] if `positions.len() != count`.
    pub fn set_positions(&mut self, positions: &[Vec3], frame: Frame) -> ParticleResult<()> {
        self.check_len(ParticleField::Position, positions.len())?;
        match frame {
            Frame::Relative => self.positions.copy_from_slice(positions),
            Frame::Absolute => {
                let o = self.origin;
                for (dst, p) in self.positions.iter_mut().zip(positions) {
                    *dst = [p[0] - o[0], p[1] - o[1], p[2] - o[2]];
                }
            }
        }
        Ok(())
    }

    /// Returns particle velocities.
    #[inline]
    #[must_use]
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    /// Sets particle velocities.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleError::ShapeMismatch`] if `velocities.len() != count`.
    pub fn set_velocities(&mut self, velocities: &[Vec3]) -> ParticleResult<()> {
        self.check_len(ParticleField::Velocity, velocities.len())?;
        self.velocities.copy_from_slice(velocities);
        Ok(())
    }

    /// Returns particle orientations, identity if never set.
    #[must_use]
    pub fn orientations(&self) -> Cow<'_, [Quat]> {
        match &self.orientations {
            Some(o) => Cow::Borrowed(o),
            None => Cow::Owned(vec![IDENTITY_ORIENTATION; self.count]),
        }
    }

    /// Sets particle orientations.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleError::ShapeMismatch`] if `orientations.len() != count`.
    pub fn set_orientations(&mut self, orientations: &[Quat]) -> ParticleResult<()> {
        self.check_len(ParticleField::Orientation, orientations.len())?;
        self.orientations = Some(orientations.to_vec());
        Ok(())
    }

    /// Returns particle scales, unit if never set.
    #[must_use]
    pub fn scales(&self) -> Cow<'_, [Vec3]> {
        match &self.scales {
            Some(s) => Cow::Borrowed(s),
            None => Cow::Owned(vec![UNIT_SCALE; self.count]),
        }
    }

    /// Sets particle scales.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleError::ShapeMismatch`] if `scales.len() != count`.
    pub fn set_scales(&mut self, scales: &[Vec3]) -> ParticleResult<()> {
        self.check_len(ParticleField::Scale, scales.len())?;
        self.scales = Some(scales.to_vec());
        Ok(())
    }

    /// Returns particle prototype indices, 0 if never set.
    #[must_use]
    pub fn prototype_indices(&self) -> Cow<'_, [u32]> {
        match &self.prototype_indices {
            Some(p) => Cow::Borrowed(p),
            None => Cow::Owned(vec![0; self.count]),
        }
    }

    /// Sets particle prototype indices.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleError::ShapeMismatch`] if `indices.len() != count`.
    pub fn set_prototype_indices(&mut self, indices: &[u32]) -> ParticleResult<()> {
        self.check_len(ParticleField::PrototypeIndex, indices.len())?;
        self.prototype_indices = Some(indices.to_vec());
        Ok(())
    }

    /// Returns particle visibility flags, all visible if never set.
    #[must_use]
    pub fn visibilities(&self) -> Cow<'_, [bool]> {
        match &self.visibilities {
            Some(v) => Cow::Borrowed(v),
            None => Cow::Owned(vec![true; self.count]),
        }
    }

    /// Sets particle visibility flags.
    ///
    /// # Errors
    ///
    /// Returns [`ParticleError::ShapeMismatch`] if `visibilities.len() != count`.
    pub fn set_visibilities(&mut self, visibilities: &[bool]) -> ParticleResult<()> {
        self.check_len(ParticleField::Visibility, visibilities.len())?;
        self.visibilities = Some(visibilities.to_vec());
        Ok(())
    }

    /// Returns the number of visible particles.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.visibilities
            .as_ref()
            .map_or(self.count, |v| v.iter().filter(|&&visible| visible).count())
    }

    /// Returns true if `field` holds explicitly written data rather than
    /// synthesized defaults.
    #[must_use]
    pub const fn has_explicit(&self, field: ParticleField) -> bool {
        match field {
            ParticleField::Position | ParticleField::Velocity => true,
            ParticleField::Orientation => self.orientations.is_some(),
            ParticleField::Scale => self.scales.is_some(),
            ParticleField::PrototypeIndex => self.prototype_indices.is_some(),
            ParticleField::Visibility => self.visibilities.is_some(),
        }
    }

    /// Number of scalars this buffer occupies in a checkpoint stream.
    #[inline]
    #[must_use]
    pub const fn state_size(&self) -> usize {
        crate::codec::instancer_state_size(self.count)
    }

    /// Loads origin and per-particle state from a snapshot of the same
    /// instancer. Visibility is not part of the state and is left as is.
    ///
    /// # Errors
    ///
    /// - [`ParticleError::IdentityMismatch`] if id or group differ
    /// - [`ParticleError::ShapeMismatch`] if the particle counts differ
    ///
    /// On error `self` is unchanged.
    pub fn assign_from(&mut self, state: &Self) -> ParticleResult<()> {
        if state.id != self.id || state.group != self.group {
            return Err(ParticleError::IdentityMismatch {
                expected_id: self.id,
                expected_group: self.group,
                found_id: state.id,
                found_group: state.group,
            });
        }
        self.check_len(ParticleField::Position, state.count)?;

        self.origin = state.origin;
        self.positions.clone_from(&state.positions);
        self.velocities.clone_from(&state.velocities);
        self.orientations.clone_from(&state.orientations);
        self.scales.clone_from(&state.scales);
        self.prototype_indices.clone_from(&state.prototype_indices);
        Ok(())
    }

    #[inline]
    fn check_len(&self, field: ParticleField, len: usize) -> ParticleResult<()> {
        if len == self.count {
            Ok(())
        } else {
            Err(ParticleError::ShapeMismatch {
                field,
                expected: self.count,
                actual: len,
            })
        }
    }
}

impl PartialEq for ParticleBuffer {
    /// Compares observable state: explicit data equal to the defaults is
    /// equal to never-set data.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.group == other.group
            && self.count == other.count
            && self.origin == other.origin
            && self.positions == other.positions
            && self.velocities == other.velocities
            && self.orientations() == other.orientations()
            && self.scales() == other.scales()
            && self.prototype_indices() == other.prototype_indices()
            && self.visibilities() == other.visibilities()
    }
}
