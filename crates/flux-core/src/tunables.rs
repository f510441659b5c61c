//! Runtime-tunable collision constants.
//!
//! Two tiers are kept: `local` governs contacts between entities of the
//! same group, `global` governs contacts between different groups. Both
//! are plain data; they are swapped wholesale between frames when a
//! reload hook delivers new values, never mutated in place.

use serde::{Deserialize, Serialize};

use crate::error::TunablesError;

/// Constants for one tier of narrow-phase resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionParams {
    /// Squared contact radius. Pairs closer than this collide.
    pub radius_sq: f32,
    /// Divisor applied to the cross-group impulse. Smaller values
    /// exaggerate the response. The same-group pass divides by
    /// `radius_sq` instead and never reads this.
    pub impulse_factor: f32,
    /// Maximum partners considered per entity. Bounds the worst-case
    /// work per particle.
    pub max_per_entity: u32,
    /// Maximum collisions resolved by a single resolve pass.
    pub max_total: u32,
    /// Maximum broad-phase candidates scanned per entity in the
    /// cross-group pass, independent of how many of them collide.
    pub candidate_window: u32,
}

impl CollisionParams {
    /// Default cross-group squared radius.
    pub const DEFAULT_RADIUS_SQ: f32 = 1.2;
    /// Default cross-group impulse divisor.
    pub const DEFAULT_IMPULSE_FACTOR: f32 = 0.4;
    /// Default per-entity partner cap.
    pub const DEFAULT_MAX_PER_ENTITY: u32 = 2;
    /// Default total collision cap for a cross-group pass.
    pub const DEFAULT_MAX_TOTAL: u32 = 8000;
    /// Default broad-phase candidate window.
    pub const DEFAULT_CANDIDATE_WINDOW: u32 = 32;

    /// Parameters for the given radius and per-entity cap, with defaults
    /// for everything else.
    pub fn new(radius_sq: f32, max_per_entity: u32) -> Self {
        Self {
            radius_sq,
            max_per_entity,
            ..Self::default()
        }
    }

    /// Same-group defaults: a tighter radius and no total cap.
    /// `impulse_factor` keeps its default only so the tier validates;
    /// same-group impulses scale by `1 / radius_sq`.
    pub fn local_default() -> Self {
        Self {
            radius_sq: 0.2,
            impulse_factor: Self::DEFAULT_IMPULSE_FACTOR,
            max_per_entity: Self::DEFAULT_MAX_PER_ENTITY,
            max_total: u32::MAX,
            candidate_window: Self::DEFAULT_CANDIDATE_WINDOW,
        }
    }

    fn validate(&self, tier: &'static str) -> Result<(), TunablesError> {
        for (name, value) in [
            ("radius_sq", self.radius_sq),
            ("impulse_factor", self.impulse_factor),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TunablesError::NotPositive { tier, name, value });
            }
        }
        for (name, value) in [
            ("max_per_entity", self.max_per_entity),
            ("max_total", self.max_total),
            ("candidate_window", self.candidate_window),
        ] {
            if value == 0 {
                return Err(TunablesError::ZeroCap { tier, name });
            }
        }
        Ok(())
    }
}

impl Default for CollisionParams {
    fn default() -> Self {
        Self {
            radius_sq: Self::DEFAULT_RADIUS_SQ,
            impulse_factor: Self::DEFAULT_IMPULSE_FACTOR,
            max_per_entity: Self::DEFAULT_MAX_PER_ENTITY,
            max_total: Self::DEFAULT_MAX_TOTAL,
            candidate_window: Self::DEFAULT_CANDIDATE_WINDOW,
        }
    }
}

/// Both tiers of collision constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollisionTunables {
    /// Same-group resolution.
    #[serde(default = "CollisionParams::local_default")]
    pub local: CollisionParams,
    /// Cross-group resolution.
    #[serde(default)]
    pub global: CollisionParams,
}

impl CollisionTunables {
    /// Use the same parameters for both tiers.
    pub fn uniform(params: CollisionParams) -> Self {
        Self {
            local: params.clone(),
            global: params,
        }
    }

    /// Check every parameter of both tiers.
    pub fn validate(&self) -> Result<(), TunablesError> {
        self.local.validate("local")?;
        self.global.validate("global")
    }
}

impl Default for CollisionTunables {
    fn default() -> Self {
        Self {
            local: CollisionParams::local_default(),
            global: CollisionParams::default(),
        }
    }
}
