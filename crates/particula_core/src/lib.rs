//! # PARTICULA Core
//!
//! Instancer bookkeeping and checkpoint serialization for particle systems
//! (fluids, granular media).
//!
//! ## Design Principles
//!
//! 1. **Lock-step representations** - every registry insert/remove is paired with a factory create/destroy
//! 2. **Never resize in place** - a shape change means destroy, then recreate under the same id
//! 3. **Derived layout** - checkpoint streams carry counts, never per-field lengths or tags
//! 4. **Hard failures** - a stream that disagrees with the registry is rejected, never patched up
//!
//! ## Thread Safety
//!
//! Single-threaded. The registry is mutated only from the simulation's
//! stepping context; callers serialize access themselves.
//!
//! ## Example
//!
//! ```rust
//! use particula_core::{codec, HeadlessFactory, InstancerRegistry, SyncEngine};
//!
//! let mut registry = InstancerRegistry::new();
//! let mut factory = HeadlessFactory::new();
//! let mut engine = SyncEngine::default();
//!
//! // Checkpoint...
//! let stream = codec::encode_registry(&registry);
//!
//! // ...and restore: reconcile shape first, then decode payloads.
//! let (manifest, used) = engine.restore(&stream, &mut registry, &mut factory)?;
//! assert_eq!(used, stream.len());
//! assert!(manifest.is_empty());
//! # Ok::<(), particula_core::ParticleError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod buffer;
pub mod codec;
pub mod error;
pub mod manifest;
pub mod registry;
pub mod representation;
pub mod sync;

pub use buffer::{
    Frame, InstancerId, ParticleBuffer, ParticleField, ParticleGroup, Quat, Vec3,
    IDENTITY_ORIENTATION, UNIT_SCALE,
};
pub use error::{ParticleError, ParticleResult};
pub use manifest::{Manifest, ManifestEntry};
pub use registry::{Instancer, InstancerRegistry};
pub use representation::{HeadlessFactory, HeadlessHandle, RepresentationDesc, RepresentationFactory};
pub use sync::{SyncConfig, SyncEngine, SyncStats};
