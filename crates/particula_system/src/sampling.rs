//! # Sampling
//!
//! Randomized choices made when generating instancers: per-particle scales
//! within the system's scale limits, prototype indices, and the external
//! geometry sampler producing initial positions.

use particula_core::Vec3;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{SystemError, SystemResult};

/// Default cap on sampled points.
pub const DEFAULT_MAX_SAMPLES: usize = 500_000;

/// Parameters handed to a [`PointSampler`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleRequest {
    /// Distance between sampled points; `None` lets the sampler choose.
    pub sampling_distance: Option<f32>,
    /// Maximum number of points.
    pub max_samples: usize,
    /// Sample the whole volume rather than only the surface.
    pub sample_volume: bool,
}

impl Default for SampleRequest {
    fn default() -> Self {
        Self {
            sampling_distance: None,
            max_samples: DEFAULT_MAX_SAMPLES,
            sample_volume: true,
        }
    }
}

/// Produces initial particle positions from external geometry.
pub trait PointSampler {
    /// Samples points in the absolute frame. An empty result means sampling
    /// failed.
    fn sample_points(&mut self, request: &SampleRequest) -> Vec<Vec3>;
}

impl<F> PointSampler for F
where
    F: FnMut(&SampleRequest) -> Vec<Vec3>,
{
    fn sample_points(&mut self, request: &SampleRequest) -> Vec<Vec3> {
        self(request)
    }
}

/// How prototype indices are picked for sampled particles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PrototypeChoice {
    /// Every particle uses prototype 0.
    #[default]
    Default,
    /// Every particle uses the given prototype.
    Fixed(u32),
    /// Each particle draws uniformly from the given prototypes.
    Uniform(Vec<u32>),
}

impl PrototypeChoice {
    /// Resolves per-particle indices for `count` particles. `None` leaves
    /// the buffer's default in place.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::InvalidConfig`] for an empty `Uniform` list.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> SystemResult<Option<Vec<u32>>> {
        match self {
            Self::Default => Ok(None),
            Self::Fixed(index) => Ok(Some(vec![*index; count])),
            Self::Uniform(choices) => {
                if choices.is_empty() {
                    return Err(SystemError::InvalidConfig(
                        "uniform prototype choice needs at least one index".into(),
                    ));
                }
                Ok(Some(
                    (0..count)
                        .filter_map(|_| choices.choose(rng).copied())
                        .collect(),
                ))
            }
        }
    }
}

/// Per-axis bounds for randomly sampled particle scales.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleLimits {
    min: Vec3,
    max: Vec3,
}

impl ScaleLimits {
    /// Creates limits, checking `min <= max` on every axis.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::InvalidScaleLimits`] for inverted or
    /// non-finite bounds, or a span `max - min` too wide to sample from
    /// without overflowing `f32`.
    pub fn new(min: Vec3, max: Vec3) -> SystemResult<Self> {
        let valid = min
            .iter()
            .zip(&max)
            .all(|(lo, hi)| lo <= hi && ((hi - lo) / (1.0 - f32::EPSILON)).is_finite());
        if !valid {
            return Err(SystemError::InvalidScaleLimits { min, max });
        }
        Ok(Self { min, max })
    }

    /// Limits that always yield `value` on every axis.
    #[must_use]
    pub const fn fixed(value: f32) -> Self {
        Self {
            min: [value; 3],
            max: [value; 3],
        }
    }

    /// Lower bound.
    #[inline]
    #[must_use]
    pub const fn min(&self) -> Vec3 {
        self.min
    }

    /// Upper bound.
    #[inline]
    #[must_use]
    pub const fn max(&self) -> Vec3 {
        self.max
    }

    /// Draws one scale uniformly within the limits.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        std::array::from_fn(|axis| rng.gen_range(self.min[axis]..=self.max[axis]))
    }

    /// Returns true if `scale` lies within the limits.
    #[must_use]
    pub fn contains(&self, scale: Vec3) -> bool {
        (0..3).all(|axis| self.min[axis] <= scale[axis] && scale[axis] <= self.max[axis])
    }
}
