//! Constraints applied to streamed particle state.
//!
//! A [`Constraint`] is a tagged variant over response kinds. It is
//! satisfied over a contiguous run of entities at a time: the constraint
//! runner hands it each newly streamed prefix as soon as the producer
//! reveals it, so every solver here works on the chunk it is given and
//! keeps no state between calls.

use std::fmt;
use std::sync::Arc;

use glam::Vec3;

use crate::error::ConstraintError;

/// Velocities below this squared speed are considered at rest and are
/// left alone by contact response.
const IDLE_SPEED_SQ: f32 = 0.001;

/// Lengths below this are treated as degenerate.
const EPSILON: f32 = 1e-6;

/// User-supplied constraint callback.
///
/// Receives the chunk's positions and velocities (same length) and
/// returns how many entities it corrected.
pub trait SatisfyFn: Send + Sync + 'static {
    /// Apply the constraint to one chunk.
    fn satisfy(&self, positions: &mut [Vec3], velocities: &mut [Vec3]) -> u32;
}

impl<F> SatisfyFn for F
where
    F: Fn(&mut [Vec3], &mut [Vec3]) -> u32 + Send + Sync + 'static,
{
    fn satisfy(&self, positions: &mut [Vec3], velocities: &mut [Vec3]) -> u32 {
        self(positions, velocities)
    }
}

/// An infinite plane `dot(normal, p) = offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    normal: Vec3,
    offset: f32,
}

impl Plane {
    /// The ground plane through the origin, facing +Y.
    pub const GROUND: Plane = Plane {
        normal: Vec3::Y,
        offset: 0.0,
    };

    /// Plane with the given normal (normalized here) and offset along it.
    /// A zero normal falls back to +Y.
    pub fn new(normal: Vec3, offset: f32) -> Self {
        Self {
            normal: normal.try_normalize().unwrap_or(Vec3::Y),
            offset,
        }
    }

    /// Unit normal.
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Signed distance of `p` from the plane along its normal.
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.offset
    }
}

/// Discriminant of a [`Constraint`], used for sorting and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintKind {
    /// Clothing-style distance springs.
    Distance,
    /// Rigid or plastic shape matching.
    Shape,
    /// Fluid density.
    Density,
    /// Inflatable volume.
    Volume,
    /// Plane contact with restitution and friction.
    Contact,
    /// User callback.
    Custom,
}

/// A constraint response applied to a contiguous run of entities.
#[derive(Clone)]
pub enum Constraint {
    /// Springs between consecutive entities pulling them toward
    /// `rest_length`.
    Distance {
        /// Separation the springs relax toward.
        rest_length: f32,
        /// Fraction of the error corrected when closer than rest, `[0, 1]`.
        compression_stiffness: f32,
        /// Fraction of the error corrected when further than rest, `[0, 1]`.
        stretch_stiffness: f32,
    },
    /// Shape matching. Carried as data; no chunk-local solver exists.
    Shape {
        /// Strength of the constraint in `[0, 1]`.
        stiffness: f32,
        /// Whether the shape may stretch.
        allow_stretch: bool,
    },
    /// Fluid density. Carried as data; no chunk-local solver exists.
    Density {
        /// Rest density.
        value: f32,
        /// Whether boundary particles are handled.
        handle_boundary: bool,
    },
    /// Scales the chunk about its centroid toward a rest bounding volume.
    Volume {
        /// Target axis-aligned bounding volume of the chunk.
        rest_volume: f32,
        /// Correction fraction when the chunk is smaller than rest.
        neg_volume_stiffness: f32,
        /// Correction fraction when the chunk is larger than rest.
        pos_volume_stiffness: f32,
    },
    /// Entities within `radius` of the plane bounce off it.
    Contact {
        /// The contact plane.
        plane: Plane,
        /// Entity radius; penetrating entities are pushed back to it.
        radius: f32,
        /// Fraction of normal speed kept after the bounce.
        restitution: f32,
        /// Fraction of tangential speed removed by the bounce.
        friction: f32,
    },
    /// User callback.
    Custom(Arc<dyn SatisfyFn>),
}

impl Constraint {
    /// Ground contact for particles of radius 0.2: a damped bounce with
    /// a little planar friction.
    pub fn floor() -> Self {
        Self::Contact {
            plane: Plane::GROUND,
            radius: 0.2,
            restitution: 0.3,
            friction: 0.005,
        }
    }

    /// Wrap a callback.
    pub fn custom<F: SatisfyFn>(f: F) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// The variant's discriminant.
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Self::Distance { .. } => ConstraintKind::Distance,
            Self::Shape { .. } => ConstraintKind::Shape,
            Self::Density { .. } => ConstraintKind::Density,
            Self::Volume { .. } => ConstraintKind::Volume,
            Self::Contact { .. } => ConstraintKind::Contact,
            Self::Custom(_) => ConstraintKind::Custom,
        }
    }

    /// Apply the constraint to one chunk of entities in place.
    ///
    /// Returns the number of entities the constraint corrected.
    pub fn satisfy(
        &self,
        positions: &mut [Vec3],
        velocities: &mut [Vec3],
    ) -> Result<u32, ConstraintError> {
        if positions.len() != velocities.len() {
            return Err(ConstraintError::LengthMismatch {
                positions: positions.len(),
                velocities: velocities.len(),
            });
        }
        match self {
            Self::Distance {
                rest_length,
                compression_stiffness,
                stretch_stiffness,
            } => Ok(satisfy_distance(
                positions,
                *rest_length,
                *compression_stiffness,
                *stretch_stiffness,
            )),
            Self::Volume {
                rest_volume,
                neg_volume_stiffness,
                pos_volume_stiffness,
            } => Ok(satisfy_volume(
                positions,
                *rest_volume,
                *neg_volume_stiffness,
                *pos_volume_stiffness,
            )),
            Self::Contact {
                plane,
                radius,
                restitution,
                friction,
            } => Ok(satisfy_contact(
                positions,
                velocities,
                plane,
                *radius,
                *restitution,
                *friction,
            )),
            Self::Custom(f) => Ok(f.satisfy(positions, velocities)),
            Self::Shape { .. } | Self::Density { .. } => {
                Err(ConstraintError::Unsupported { kind: self.kind() })
            }
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Distance {
                rest_length,
                compression_stiffness,
                stretch_stiffness,
            } => f
                .debug_struct("Distance")
                .field("rest_length", rest_length)
                .field("compression_stiffness", compression_stiffness)
                .field("stretch_stiffness", stretch_stiffness)
                .finish(),
            Self::Shape {
                stiffness,
                allow_stretch,
            } => f
                .debug_struct("Shape")
                .field("stiffness", stiffness)
                .field("allow_stretch", allow_stretch)
                .finish(),
            Self::Density {
                value,
                handle_boundary,
            } => f
                .debug_struct("Density")
                .field("value", value)
                .field("handle_boundary", handle_boundary)
                .finish(),
            Self::Volume {
                rest_volume,
                neg_volume_stiffness,
                pos_volume_stiffness,
            } => f
                .debug_struct("Volume")
                .field("rest_volume", rest_volume)
                .field("neg_volume_stiffness", neg_volume_stiffness)
                .field("pos_volume_stiffness", pos_volume_stiffness)
                .finish(),
            Self::Contact {
                plane,
                radius,
                restitution,
                friction,
            } => f
                .debug_struct("Contact")
                .field("plane", plane)
                .field("radius", radius)
                .field("restitution", restitution)
                .field("friction", friction)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn satisfy_distance(positions: &mut [Vec3], rest: f32, compression: f32, stretch: f32) -> u32 {
    let mut corrected = 0;
    for i in 1..positions.len() {
        let delta = positions[i] - positions[i - 1];
        let len = delta.length();
        if len <= EPSILON {
            continue;
        }
        let error = len - rest;
        if error.abs() <= EPSILON {
            continue;
        }
        let stiffness = if error < 0.0 { compression } else { stretch };
        let correction = delta * (error / len * stiffness * 0.5);
        positions[i - 1] += correction;
        positions[i] -= correction;
        corrected += 1;
    }
    corrected
}

fn satisfy_volume(positions: &mut [Vec3], rest: f32, neg: f32, pos: f32) -> u32 {
    if positions.len() < 2 || rest <= 0.0 {
        return 0;
    }
    let (min, max) = positions
        .iter()
        .fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(lo, hi), p| {
            (lo.min(*p), hi.max(*p))
        });
    let extent = max - min;
    let volume = extent.x * extent.y * extent.z;
    if volume <= EPSILON {
        return 0;
    }
    let stiffness = if volume < rest { neg } else { pos };
    let scale = 1.0 + ((rest / volume).cbrt() - 1.0) * stiffness;
    if (scale - 1.0).abs() <= EPSILON {
        return 0;
    }
    let centroid = positions.iter().copied().sum::<Vec3>() / positions.len() as f32;
    for p in positions.iter_mut() {
        *p = centroid + (*p - centroid) * scale;
    }
    positions.len() as u32
}

fn satisfy_contact(
    positions: &mut [Vec3],
    velocities: &mut [Vec3],
    plane: &Plane,
    radius: f32,
    restitution: f32,
    friction: f32,
) -> u32 {
    let n = plane.normal();
    let mut contacts = 0;
    for (p, v) in positions.iter_mut().zip(velocities.iter_mut()) {
        let depth = plane.signed_distance(*p);
        if depth > radius || v.length_squared() <= IDLE_SPEED_SQ {
            continue;
        }
        let reflected = *v - n * (2.0 * v.dot(n));
        let normal_part = n * reflected.dot(n);
        let tangent_part = reflected - normal_part;
        *v = tangent_part * (1.0 - friction) + normal_part * restitution;
        *p += n * (radius - depth);
        contacts += 1;
    }
    contacts
}
