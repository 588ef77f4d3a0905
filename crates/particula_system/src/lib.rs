//! # PARTICULA System
//!
//! The particle-system context: one explicit object per simulation owning
//! the instancer registry, its representation factory and the sampling
//! state.
//!
//! ## Design Principles
//!
//! 1. **No hidden globals** - every operation goes through a constructed [`ParticleSystem`]
//! 2. **Static kind dispatch** - fluid/granular behaviour is a [`KindProfile`] resolved at construction
//! 3. **Deterministic sampling** - scales and prototype choices come from a seeded `ChaCha8` stream
//! 4. **External configuration** - system settings load from TOML
//!
//! ## Example
//!
//! ```rust
//! use particula_core::HeadlessFactory;
//! use particula_system::{InstancerDesc, ParticleSystem, SystemConfig};
//!
//! let mut system = ParticleSystem::new(SystemConfig::water(), HeadlessFactory::new())?;
//! let id = system.generate_instancer(InstancerDesc::new(128))?;
//!
//! let checkpoint = system.serialize();
//! system.remove_all_instancers()?;
//! system.deserialize(&checkpoint)?;
//! assert_eq!(system.instancer(id).map(|b| b.count()), Some(128));
//! # Ok::<(), particula_system::SystemError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod context;
pub mod error;
pub mod sampling;

pub use config::{KindProfile, SystemConfig, SystemKind};
pub use context::{InstancerDesc, ParticleSystem, SystemState};
pub use error::{SystemError, SystemResult};
pub use sampling::{PointSampler, PrototypeChoice, SampleRequest, ScaleLimits, DEFAULT_MAX_SAMPLES};
