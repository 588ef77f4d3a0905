//! # System Error Types
//!
//! All errors that can occur in the particle-system context.

use particula_core::{ParticleError, Vec3};
use thiserror::Error;

/// Errors that can occur in the particle-system context.
#[derive(Error, Debug)]
pub enum SystemError {
    /// Registry, codec or reconciliation failure.
    #[error(transparent)]
    Particle(#[from] ParticleError),

    /// Invalid configuration value or file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// A prototype index names a prototype the system does not have.
    #[error("prototype index {index} out of range: system has {available} prototypes")]
    UnknownPrototype {
        /// The offending index.
        index: u32,
        /// Number of prototypes the system has.
        available: u32,
    },

    /// Every instancer id is already taken.
    #[error("no free instancer id left")]
    IdsExhausted,

    /// Scale limits with a minimum above the maximum, or non-finite bounds.
    #[error("invalid scale limits: min {min:?}, max {max:?}")]
    InvalidScaleLimits {
        /// Requested minimum.
        min: Vec3,
        /// Requested maximum.
        max: Vec3,
    },
}

/// Result type for particle-system operations.
pub type SystemResult<T> = Result<T, SystemError>;
