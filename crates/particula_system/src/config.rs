//! # System Configuration
//!
//! Per-system settings, loaded from TOML once at startup:
//!
//! ```toml
//! name = "Water"
//! kind = "fluid"
//! contact_offset = 0.004
//! density = 1000.0
//! prototype_count = 1
//! seed = 0
//! self_collision = true
//! ```
//!
//! The `kind` resolves statically into a [`KindProfile`]; profile flags are
//! carried as data for the physics/render backend.

use std::path::Path;

use particula_core::SyncConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SystemError, SystemResult};

/// Closed set of particle-system kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemKind {
    /// Liquid simulated as fluid particles.
    Fluid,
    /// Solid grains (sand, rice, ...).
    Granular,
}

/// Capability record of a system kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KindProfile {
    /// Particles are simulated as a fluid.
    pub is_fluid: bool,
    /// Particles are simulated at all (not frozen).
    pub is_dynamic: bool,
    /// Position smoothing at render time.
    pub use_smoothing: bool,
    /// Anisotropic particle rendering.
    pub use_anisotropy: bool,
    /// Isosurface rendering.
    pub use_isosurface: bool,
}

impl SystemKind {
    /// Resolves the kind's capability record.
    #[must_use]
    pub const fn profile(self) -> KindProfile {
        match self {
            Self::Fluid => KindProfile {
                is_fluid: true,
                is_dynamic: true,
                use_smoothing: false,
                use_anisotropy: false,
                use_isosurface: false,
            },
            Self::Granular => KindProfile {
                is_fluid: false,
                is_dynamic: true,
                use_smoothing: false,
                use_anisotropy: false,
                use_isosurface: false,
            },
        }
    }
}

fn default_prototype_count() -> u32 {
    1
}

fn default_self_collision() -> bool {
    true
}

/// Configuration of one particle system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// System name; instancers are named `{name}Instancer{id}`.
    pub name: String,
    /// System kind.
    pub kind: SystemKind,
    /// Particle contact offset in metres. Also the initial scale limit.
    pub contact_offset: f32,
    /// Particle density in kg/m^3.
    pub density: f32,
    /// Number of particle prototypes.
    #[serde(default = "default_prototype_count")]
    pub prototype_count: u32,
    /// Seed for scale and prototype sampling.
    #[serde(default)]
    pub seed: u64,
    /// Self-collision used for instancers created by reconciliation.
    #[serde(default = "default_self_collision")]
    pub self_collision: bool,
}

impl SystemConfig {
    /// Water: a fluid with a 4 mm contact offset at 1000 kg/m^3.
    #[must_use]
    pub fn water() -> Self {
        Self {
            name: "Water".to_string(),
            kind: SystemKind::Fluid,
            contact_offset: 0.004,
            density: 1000.0,
            prototype_count: 1,
            seed: 0,
            self_collision: true,
        }
    }

    /// A granular system with a 1 cm contact offset at 1500 kg/m^3.
    #[must_use]
    pub fn granular(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SystemKind::Granular,
            contact_offset: 0.01,
            density: 1500.0,
            prototype_count: 1,
            seed: 0,
            self_collision: true,
        }
    }

    /// Sets the sampling seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the number of prototypes.
    #[must_use]
    pub fn with_prototype_count(mut self, count: u32) -> Self {
        self.prototype_count = count;
        self
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::InvalidConfig`] if parsing or validation fails.
    pub fn from_toml_str(content: &str) -> SystemResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SystemError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// - [`SystemError::Io`] if the file cannot be read
    /// - [`SystemError::InvalidConfig`] if parsing or validation fails
    pub fn load(path: &Path) -> SystemResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> SystemResult<String> {
        toml::to_string_pretty(self).map_err(|e| SystemError::InvalidConfig(e.to_string()))
    }

    /// Checks every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> SystemResult<()> {
        if self.name.is_empty() {
            return Err(SystemError::InvalidConfig("system name is empty".into()));
        }
        if !(self.contact_offset.is_finite() && self.contact_offset > 0.0) {
            return Err(SystemError::InvalidConfig(format!(
                "contact offset must be positive, got {}",
                self.contact_offset
            )));
        }
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(SystemError::InvalidConfig(format!(
                "density must be positive, got {}",
                self.density
            )));
        }
        if self.prototype_count == 0 {
            return Err(SystemError::InvalidConfig(
                "system needs at least one prototype".into(),
            ));
        }
        Ok(())
    }

    /// Returns the kind's capability record.
    #[inline]
    #[must_use]
    pub const fn profile(&self) -> KindProfile {
        self.kind.profile()
    }

    /// Reconciliation settings derived from this config.
    #[must_use]
    pub const fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            self_collision: self.self_collision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let config = SystemConfig::from_toml_str(
            r#"
name = "Sand"
kind = "granular"
contact_offset = 0.01
density = 1600.0
prototype_count = 3
seed = 42
self_collision = false
"#,
        )
        .unwrap();

        assert_eq!(config.name, "Sand");
        assert_eq!(config.kind, SystemKind::Granular);
        assert_eq!(config.prototype_count, 3);
        assert_eq!(config.seed, 42);
        assert!(!config.sync_config().self_collision);
        assert!(!config.profile().is_fluid);
    }

    #[test]
    fn test_optional_fields_default() {
        let config = SystemConfig::from_toml_str(
            r#"
name = "Water"
kind = "fluid"
contact_offset = 0.004
density = 1000.0
"#,
        )
        .unwrap();

        assert_eq!(config, SystemConfig::water());
    }

    #[test]
    fn test_rejects_unknown_kind_and_fields() {
        let bad_kind = "name = \"X\"\nkind = \"plasma\"\ncontact_offset = 0.1\ndensity = 1.0\n";
        assert!(matches!(
            SystemConfig::from_toml_str(bad_kind),
            Err(SystemError::InvalidConfig(_))
        ));

        let extra = "name = \"X\"\nkind = \"fluid\"\ncontact_offset = 0.1\ndensity = 1.0\nviscosity = 2.0\n";
        assert!(matches!(
            SystemConfig::from_toml_str(extra),
            Err(SystemError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(SystemConfig::water().validate().is_ok());

        let mut config = SystemConfig::water();
        config.contact_offset = 0.0;
        assert!(config.validate().is_err());

        let mut config = SystemConfig::granular("");
        assert!(config.validate().is_err());
        config.name = "Rice".into();
        config.density = f32::NAN;
        assert!(config.validate().is_err());

        assert!(SystemConfig::water().with_prototype_count(0).validate().is_err());
    }

    #[test]
    fn test_fluid_profile() {
        let profile = SystemConfig::water().profile();
        assert!(profile.is_fluid);
        assert!(profile.is_dynamic);
        assert!(!profile.use_isosurface);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SystemConfig::granular("Rice").with_seed(7);
        let text = config.to_toml_string().unwrap();
        assert_eq!(SystemConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("particula_missing_config_file.toml");
        assert!(matches!(SystemConfig::load(&path), Err(SystemError::Io(_))));
    }
}
