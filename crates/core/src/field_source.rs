//! Closed-form vector functions over the unit square, and the registry of
//! named generator kinds built from them.
//!
//! A [`FieldSource`] returns a velocity at any normalized point `p` in
//! `[0, 1] x [0, 1]`. [`VectorField::generate`](crate::VectorField::generate)
//! evaluates one at every grid cell. All sources are deterministic: the same
//! point (and seed, for [`UniformRandom`]) always yields the same vector.

use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use glam::DVec2;

use crate::error::FlowError;
use crate::prng::Xorshift64;

/// Center of the unit square; every built-in kind is organized around it.
const CENTER: DVec2 = DVec2::new(0.5, 0.5);

/// Distances below this are treated as zero.
const SINGULARITY_EPS: f64 = 1e-10;

/// A deterministic source of 2D velocity vectors.
pub trait FieldSource: Send + Sync {
    /// Velocity at normalized position `p`.
    fn sample(&self, p: DVec2) -> DVec2;
}

// ---------------------------------------------------------------------------
// Linear sources
// ---------------------------------------------------------------------------

/// Linear pull toward a point: `v = strength * (center - p)`.
pub struct PointAttractor {
    pub center: DVec2,
    pub strength: f64,
}

/// Linear push away from a point: `v = strength * (p - center)`.
pub struct PointRepulsor {
    pub center: DVec2,
    pub strength: f64,
}

/// Hyperbolic saddle: outflow along x, inflow along y.
pub struct Saddle {
    pub center: DVec2,
}

/// Rigid clockwise rotation: `v = (r.y, -r.x)` with `r = p - center`.
pub struct Rotation {
    pub center: DVec2,
}

/// Clockwise rotation plus a linear inflow, giving an inward spiral.
pub struct Swirl {
    pub center: DVec2,
    pub inflow: f64,
}

// ---------------------------------------------------------------------------
// Nonlinear sources
// ---------------------------------------------------------------------------

/// Counter-clockwise vortex with Gaussian distance falloff.
pub struct Vortex {
    pub center: DVec2,
    pub strength: f64,
    pub radius: f64,
}

/// Downhill flow on a bowl `|r|^2` roughened by a grid of sinusoidal hills.
pub struct HillyBowl {
    pub center: DVec2,
    pub amplitude: f64,
    pub frequency: f64,
}

/// Uniform random components in `[-1, 1)`, hashed from the position and a seed.
pub struct UniformRandom {
    pub seed: u64,
}

impl FieldSource for PointAttractor {
    fn sample(&self, p: DVec2) -> DVec2 {
        (self.center - p) * self.strength
    }
}

impl FieldSource for PointRepulsor {
    fn sample(&self, p: DVec2) -> DVec2 {
        (p - self.center) * self.strength
    }
}

impl FieldSource for Saddle {
    fn sample(&self, p: DVec2) -> DVec2 {
        let r = p - self.center;
        DVec2::new(r.x, -r.y)
    }
}

impl FieldSource for Rotation {
    fn sample(&self, p: DVec2) -> DVec2 {
        let r = p - self.center;
        DVec2::new(r.y, -r.x)
    }
}

impl FieldSource for Swirl {
    fn sample(&self, p: DVec2) -> DVec2 {
        let r = p - self.center;
        DVec2::new(r.y, -r.x) - r * self.inflow
    }
}

impl FieldSource for Vortex {
    fn sample(&self, p: DVec2) -> DVec2 {
        let r = p - self.center;
        let dist_sq = r.length_squared();
        let dist = dist_sq.sqrt();
        if dist < SINGULARITY_EPS || self.radius.abs() < SINGULARITY_EPS {
            return DVec2::ZERO;
        }
        let falloff = (-dist_sq / (2.0 * self.radius * self.radius)).exp();
        r.perp() / dist * self.strength * falloff
    }
}

impl FieldSource for HillyBowl {
    fn sample(&self, p: DVec2) -> DVec2 {
        let r = p - self.center;
        let k = TAU * self.frequency;
        let (sx, cx) = (k * p.x).sin_cos();
        let (sy, cy) = (k * p.y).sin_cos();
        let grad = DVec2::new(
            2.0 * r.x + self.amplitude * k * cx * sy,
            2.0 * r.y + self.amplitude * k * sx * cy,
        );
        -grad
    }
}

impl UniformRandom {
    /// Mixes the seed with the coordinate bits (splitmix-style finalizer).
    fn hash(&self, p: DVec2) -> u64 {
        let mut h = self.seed ^ 0x9E37_79B9_7F4A_7C15;
        for word in [p.x.to_bits(), p.y.to_bits()] {
            h ^= word;
            h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
            h ^= h >> 31;
        }
        h
    }
}

impl FieldSource for UniformRandom {
    fn sample(&self, p: DVec2) -> DVec2 {
        let mut rng = Xorshift64::new(self.hash(p));
        rng.next_u64();
        let x = rng.next_range(-1.0, 1.0);
        let y = rng.next_range(-1.0, 1.0);
        DVec2::new(x, y)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// All registered generator names.
const KIND_NAMES: &[&str] = &[
    "random",
    "repel",
    "attract",
    "saddle",
    "circle",
    "swirl",
    "hilly_bowl",
    "vortex",
];

/// The fixed set of named field generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Random,
    Repel,
    Attract,
    Saddle,
    Circle,
    Swirl,
    HillyBowl,
    Vortex,
}

impl FieldKind {
    /// Looks up a kind by name.
    ///
    /// Returns `FlowError::UnknownKind` if the name is not registered.
    pub fn from_name(name: &str) -> Result<Self, FlowError> {
        match name {
            "random" => Ok(FieldKind::Random),
            "repel" => Ok(FieldKind::Repel),
            "attract" => Ok(FieldKind::Attract),
            "saddle" => Ok(FieldKind::Saddle),
            "circle" => Ok(FieldKind::Circle),
            "swirl" => Ok(FieldKind::Swirl),
            "hilly_bowl" => Ok(FieldKind::HillyBowl),
            "vortex" => Ok(FieldKind::Vortex),
            _ => Err(FlowError::UnknownKind(name.to_string())),
        }
    }

    /// Registered name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Random => "random",
            FieldKind::Repel => "repel",
            FieldKind::Attract => "attract",
            FieldKind::Saddle => "saddle",
            FieldKind::Circle => "circle",
            FieldKind::Swirl => "swirl",
            FieldKind::HillyBowl => "hilly_bowl",
            FieldKind::Vortex => "vortex",
        }
    }

    /// Every registered name.
    pub fn list_names() -> &'static [&'static str] {
        KIND_NAMES
    }

    /// Builds the source for this kind. `seed` is only used by `random`.
    pub fn source(self, seed: u64) -> Box<dyn FieldSource> {
        match self {
            FieldKind::Random => Box::new(UniformRandom { seed }),
            FieldKind::Repel => Box::new(PointRepulsor {
                center: CENTER,
                strength: 1.0,
            }),
            FieldKind::Attract => Box::new(PointAttractor {
                center: CENTER,
                strength: 1.0,
            }),
            FieldKind::Saddle => Box::new(Saddle { center: CENTER }),
            FieldKind::Circle => Box::new(Rotation { center: CENTER }),
            FieldKind::Swirl => Box::new(Swirl {
                center: CENTER,
                inflow: 0.3,
            }),
            FieldKind::HillyBowl => Box::new(HillyBowl {
                center: CENTER,
                amplitude: 0.02,
                frequency: 3.0,
            }),
            FieldKind::Vortex => Box::new(Vortex {
                center: CENTER,
                strength: 1.0,
                radius: 0.25,
            }),
        }
    }
}

impl FromStr for FieldKind {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
