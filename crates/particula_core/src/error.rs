//! # Particle Error Types
//!
//! Every failure in this crate is a hard, local error: each one means the
//! registry and the stream (or the caller) disagree about shape or identity.

use thiserror::Error;

use crate::buffer::{InstancerId, ParticleField, ParticleGroup};

/// Errors that can occur in instancer bookkeeping and state decoding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParticleError {
    /// A per-particle array does not match the buffer's particle count.
    #[error("shape mismatch on {field}: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        /// The field being assigned.
        field: ParticleField,
        /// The buffer's particle count.
        expected: usize,
        /// The length that was supplied.
        actual: usize,
    },

    /// An instancer with this id is already registered.
    #[error("duplicate instancer id: {0}")]
    DuplicateId(InstancerId),

    /// No instancer with this id is registered.
    #[error("instancer not found: {0}")]
    NotFound(InstancerId),

    /// The stream (or snapshot) belongs to a different instancer.
    #[error(
        "identity mismatch: target is instancer {expected_id} (group {expected_group}), \
         state is for instancer {found_id} (group {found_group})"
    )]
    IdentityMismatch {
        /// Id of the buffer being written.
        expected_id: InstancerId,
        /// Group of the buffer being written.
        expected_group: ParticleGroup,
        /// Id carried by the state.
        found_id: InstancerId,
        /// Group carried by the state.
        found_group: ParticleGroup,
    },

    /// The geometry sampler produced no points.
    #[error("failed to sample particle points for instancer {0}")]
    SamplingFailed(InstancerId),

    /// The stream ended before a derived field width was satisfied.
    #[error("state stream too short: need {needed} values, {available} available")]
    StreamTooShort {
        /// Values required from the current cursor.
        needed: usize,
        /// Values left after the current cursor.
        available: usize,
    },

    /// An integer-valued slot holds a value that is not a valid integer.
    #[error("invalid value {value} for {field}")]
    InvalidScalar {
        /// Which slot was being read.
        field: &'static str,
        /// The raw value found in the stream.
        value: f64,
    },
}

/// Result type for particle operations.
pub type ParticleResult<T> = Result<T, ParticleError>;
