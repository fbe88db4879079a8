//! Particle advection with per-particle trails.
//!
//! Particles live in normalized `[0, 1] x [0, 1]` coordinates and move by one
//! explicit Euler step per tick. A particle that leaves the domain or stalls
//! is reseeded at a random point. Trails are a ring buffer per particle, all
//! rings sharing one write cursor.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::trace;

use crate::error::FlowError;
use crate::field::{Sampling, VectorField};
use crate::params::{param_f64, param_string, param_u64, param_usize};
use crate::prng::Xorshift64;

const DEFAULT_COUNT: usize = 100;
const DEFAULT_SPEED: f64 = 0.1;
const DEFAULT_HISTORY_LENGTH: usize = 32;
const DEFAULT_SEED: u64 = 1;

/// Squared displacement below which a particle counts as stalled.
const STALL_DISTANCE_SQ: f64 = 1e-8;

/// Upper bound on `count * history_length` trail slots.
pub const MAX_TRAIL_SLOTS: usize = 1 << 24;

/// Parameters of a [`ParticleAdvector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleConfig {
    pub count: usize,
    /// Multiplier applied to the field velocity.
    pub speed: f64,
    /// Trail slots per particle.
    pub history_length: usize,
    /// Seed for initial positions and reseeding.
    pub seed: u64,
    pub sampling: Sampling,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            speed: DEFAULT_SPEED,
            history_length: DEFAULT_HISTORY_LENGTH,
            seed: DEFAULT_SEED,
            sampling: Sampling::Linear,
        }
    }
}

impl ParticleConfig {
    /// Extracts a config from a JSON object, falling back to defaults for
    /// missing keys, then validates it.
    pub fn from_json(params: &Value) -> Result<Self, FlowError> {
        let config = Self {
            count: param_usize(params, "count", DEFAULT_COUNT),
            speed: param_f64(params, "speed", DEFAULT_SPEED),
            history_length: param_usize(params, "history_length", DEFAULT_HISTORY_LENGTH),
            seed: param_u64(params, "seed", DEFAULT_SEED),
            sampling: Sampling::from_name(&param_string(params, "sampling", "linear"))?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if self.history_length == 0 {
            return Err(FlowError::InvalidConfig(
                "history_length must be at least 1".into(),
            ));
        }
        if !(self.speed.is_finite() && self.speed >= 0.0) {
            return Err(FlowError::InvalidConfig(format!(
                "speed must be non-negative and finite, got {}",
                self.speed
            )));
        }
        match self.count.checked_mul(self.history_length) {
            Some(slots) if slots <= MAX_TRAIL_SLOTS => Ok(()),
            _ => Err(FlowError::InvalidConfig(format!(
                "count * history_length must not exceed {MAX_TRAIL_SLOTS}, got {} * {}",
                self.count, self.history_length
            ))),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "count": self.count,
            "speed": self.speed,
            "history_length": self.history_length,
            "seed": self.seed,
            "sampling": self.sampling.name(),
        })
    }

    pub fn param_schema() -> Value {
        json!({
            "count": {
                "type": "integer",
                "default": DEFAULT_COUNT,
                "description": "Number of particles"
            },
            "speed": {
                "type": "number",
                "default": DEFAULT_SPEED,
                "description": "Velocity multiplier"
            },
            "history_length": {
                "type": "integer",
                "default": DEFAULT_HISTORY_LENGTH,
                "description": "Trail length per particle"
            },
            "seed": {
                "type": "integer",
                "default": DEFAULT_SEED,
                "description": "Seed for positions and reseeding"
            },
            "sampling": {
                "type": "string",
                "default": "linear",
                "enum": ["nearest", "linear"],
                "description": "Field interpolation between lattice points"
            }
        })
    }
}

fn inside_unit_square(p: DVec2) -> bool {
    (0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y)
}

/// A pool of particles advected through a [`VectorField`].
#[derive(Debug, Clone)]
pub struct ParticleAdvector {
    config: ParticleConfig,
    rng: Xorshift64,
    positions: Vec<DVec2>,
    /// `count` rows of `history_length` slots.
    history: Vec<DVec2>,
    history_index: usize,
}

impl ParticleAdvector {
    /// Creates `config.count` particles at uniformly random positions.
    pub fn new(config: ParticleConfig) -> Result<Self, FlowError> {
        config.validate()?;
        let mut rng = Xorshift64::new(config.seed);
        let positions = (0..config.count).map(|_| rng.next_unit_point()).collect();
        Ok(Self::with_positions(positions, config, rng))
    }

    /// Creates particles at explicit positions; `config.count` is replaced by
    /// `positions.len()`.
    ///
    /// Every position must lie in `[0, 1] x [0, 1]`.
    pub fn from_positions(
        positions: Vec<DVec2>,
        mut config: ParticleConfig,
    ) -> Result<Self, FlowError> {
        config.count = positions.len();
        config.validate()?;
        if let Some((i, p)) = positions
            .iter()
            .enumerate()
            .find(|(_, p)| !inside_unit_square(**p))
        {
            return Err(FlowError::InvalidConfig(format!(
                "particle {i} at {p} is outside the unit square"
            )));
        }
        let rng = Xorshift64::new(config.seed);
        Ok(Self::with_positions(positions, config, rng))
    }

    fn with_positions(positions: Vec<DVec2>, config: ParticleConfig, rng: Xorshift64) -> Self {
        let history = positions
            .iter()
            .flat_map(|&p| std::iter::repeat(p).take(config.history_length))
            .collect();
        Self {
            config,
            rng,
            positions,
            history,
            history_index: 0,
        }
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[DVec2] {
        &self.positions
    }

    /// Position of particle `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len()`.
    pub fn position(&self, i: usize) -> DVec2 {
        self.positions[i]
    }

    /// Slot that the next tick writes to.
    pub fn history_index(&self) -> usize {
        self.history_index
    }

    /// Raw trail ring of particle `i`, in slot order.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len()`.
    pub fn history(&self, i: usize) -> &[DVec2] {
        let n = self.config.history_length;
        &self.history[i * n..(i + 1) * n]
    }

    /// Trail of particle `i` from oldest to newest.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len()`.
    pub fn trail(&self, i: usize) -> impl Iterator<Item = DVec2> + '_ {
        let ring = self.history(i);
        let (newer, older) = ring.split_at(self.history_index);
        older.iter().chain(newer).copied()
    }

    /// Advances every particle by one Euler step of length `dt * speed`.
    pub fn tick(&mut self, field: &VectorField, dt: f64) {
        let n = self.config.history_length;
        let mut reseeded = 0usize;
        for i in 0..self.positions.len() {
            let p = self.positions[i];
            let velocity = field.sample_normalized(p, self.config.sampling);
            let next = p + velocity * dt * self.config.speed;

            if !inside_unit_square(next) || (next - p).length_squared() < STALL_DISTANCE_SQ {
                self.reset(i);
                reseeded += 1;
            } else {
                self.positions[i] = next;
                self.history[i * n + self.history_index] = next;
            }
        }
        self.history_index = (self.history_index + 1) % n;
        trace!(particles = self.positions.len(), reseeded, "particle tick");
    }

    /// Moves particle `i` to a random point and collapses its trail onto it.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len()`.
    pub fn reset(&mut self, i: usize) {
        let p = self.rng.next_unit_point();
        let n = self.config.history_length;
        self.positions[i] = p;
        self.history[i * n..(i + 1) * n].fill(p);
    }

    /// Reseeds every particle and rewinds the trail cursor.
    pub fn reset_all(&mut self) {
        for i in 0..self.positions.len() {
            self.reset(i);
        }
        self.history_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(v: DVec2) -> VectorField {
        VectorField::new(4, 4, vec![v; 16]).unwrap()
    }

    fn single(p: DVec2, config: ParticleConfig) -> ParticleAdvector {
        ParticleAdvector::from_positions(vec![p], config).unwrap()
    }

    // -- Config --

    #[test]
    fn config_from_empty_json_uses_defaults() {
        assert_eq!(
            ParticleConfig::from_json(&json!({})).unwrap(),
            ParticleConfig::default()
        );
    }

    #[test]
    fn config_from_json_extracts_custom_values() {
        let config = ParticleConfig::from_json(&json!({
            "count": 7,
            "speed": 0.5,
            "history_length": 4,
            "seed": 11,
        }))
        .unwrap();
        assert_eq!(config.count, 7);
        assert_eq!(config.history_length, 4);
        assert_eq!(config.seed, 11);
        assert!((config.speed - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn config_rejects_bad_values() {
        assert!(ParticleConfig::from_json(&json!({"history_length": 0})).is_err());
        assert!(ParticleConfig::from_json(&json!({"speed": -1.0})).is_err());
    }

    #[test]
    fn config_rejects_oversized_trail_buffer() {
        let result = ParticleConfig::from_json(&json!({"count": 1_000_000_000_000_u64}));
        assert!(matches!(result, Err(FlowError::InvalidConfig(msg)) if msg.contains("history_length")));
        let overflow = ParticleConfig {
            count: usize::MAX,
            history_length: 2,
            ..ParticleConfig::default()
        };
        assert!(overflow.validate().is_err());
        let at_limit = ParticleConfig {
            count: MAX_TRAIL_SLOTS,
            history_length: 1,
            ..ParticleConfig::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    // -- Construction --

    #[test]
    fn new_places_count_particles_with_collapsed_trails() {
        let advector = ParticleAdvector::new(ParticleConfig {
            count: 25,
            history_length: 5,
            ..ParticleConfig::default()
        })
        .unwrap();
        assert_eq!(advector.len(), 25);
        assert_eq!(advector.history_index(), 0);
        for i in 0..advector.len() {
            let p = advector.position(i);
            assert!(inside_unit_square(p));
            assert_eq!(advector.history(i), &[p; 5]);
        }
    }

    #[test]
    fn same_seed_gives_same_positions() {
        let a = ParticleAdvector::new(ParticleConfig::default()).unwrap();
        let b = ParticleAdvector::new(ParticleConfig::default()).unwrap();
        assert_eq!(a.positions(), b.positions());
    }

    #[test]
    fn from_positions_rejects_points_outside_domain() {
        let result = ParticleAdvector::from_positions(
            vec![DVec2::new(0.2, 0.2), DVec2::new(1.5, 0.2)],
            ParticleConfig::default(),
        );
        assert!(matches!(result, Err(FlowError::InvalidConfig(_))));
    }

    #[test]
    fn from_positions_overrides_count() {
        let advector = ParticleAdvector::from_positions(
            vec![DVec2::ZERO, DVec2::ONE, DVec2::splat(0.5)],
            ParticleConfig::default(),
        )
        .unwrap();
        assert_eq!(advector.config().count, 3);
        assert_eq!(advector.len(), 3);
    }

    // -- Tick --

    #[test]
    fn particle_moves_by_velocity_times_dt_times_speed() {
        let config = ParticleConfig {
            speed: 2.0,
            history_length: 4,
            ..ParticleConfig::default()
        };
        let mut advector = single(DVec2::new(0.2, 0.5), config);
        advector.tick(&uniform(DVec2::new(0.1, 0.0)), 0.25);

        let p = advector.position(0);
        assert!((p.x - 0.25).abs() < 1e-12, "x = {}", p.x);
        assert!((p.y - 0.5).abs() < 1e-12);
        assert_eq!(advector.history_index(), 1);
        assert_eq!(advector.history(0)[0], p);

        let trail: Vec<DVec2> = advector.trail(0).collect();
        assert_eq!(trail.len(), 4);
        assert_eq!(trail[3], p);
        assert_eq!(trail[0], DVec2::new(0.2, 0.5));
    }

    #[test]
    fn particle_leaving_domain_is_reseeded_with_collapsed_trail() {
        let config = ParticleConfig {
            history_length: 6,
            ..ParticleConfig::default()
        };
        let start = DVec2::new(0.999, 0.5);
        let mut advector = single(start, config);
        advector.tick(&uniform(DVec2::X), 1.0);

        let p = advector.position(0);
        assert_ne!(p, start);
        assert!(inside_unit_square(p));
        assert!(advector.history(0).iter().all(|&h| h == p));
        assert!(advector.trail(0).all(|h| h == p));
    }

    #[test]
    fn stalled_particles_are_reseeded() {
        let field = VectorField::zeros(4, 4).unwrap();
        let mut advector = ParticleAdvector::new(ParticleConfig {
            count: 10,
            ..ParticleConfig::default()
        })
        .unwrap();
        let before = advector.positions().to_vec();
        advector.tick(&field, 1.0);
        for (old, new) in before.iter().zip(advector.positions()) {
            assert_ne!(old, new);
        }
    }

    #[test]
    fn history_index_wraps_after_history_length_ticks() {
        let config = ParticleConfig {
            count: 3,
            history_length: 5,
            ..ParticleConfig::default()
        };
        let field = VectorField::generate("circle", 16, 16, 1).unwrap();
        let mut advector = ParticleAdvector::new(config).unwrap();
        for expected in [1, 2, 3, 4, 0, 1] {
            advector.tick(&field, 0.1);
            assert_eq!(advector.history_index(), expected);
        }
    }

    #[test]
    fn trail_is_ordered_oldest_to_newest() {
        let config = ParticleConfig {
            speed: 1.0,
            history_length: 3,
            ..ParticleConfig::default()
        };
        let mut advector = single(DVec2::new(0.1, 0.5), config);
        let field = uniform(DVec2::new(0.1, 0.0));
        for _ in 0..4 {
            advector.tick(&field, 1.0);
        }
        let xs: Vec<f64> = advector.trail(0).map(|p| p.x).collect();
        assert_eq!(xs.len(), 3);
        assert!(xs.windows(2).all(|w| w[0] < w[1]), "trail not increasing: {xs:?}");
        assert!((xs[2] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn reset_all_reseeds_everything_and_rewinds_cursor() {
        let field = VectorField::generate("swirl", 16, 16, 1).unwrap();
        let mut advector = ParticleAdvector::new(ParticleConfig {
            count: 8,
            history_length: 4,
            ..ParticleConfig::default()
        })
        .unwrap();
        advector.tick(&field, 0.1);
        let before = advector.positions().to_vec();
        advector.reset_all();
        assert_eq!(advector.history_index(), 0);
        for i in 0..advector.len() {
            assert_ne!(advector.position(i), before[i]);
            assert!(advector.history(i).iter().all(|&h| h == advector.position(i)));
        }
    }

    #[test]
    fn empty_pool_ticks_without_panicking() {
        let mut advector = ParticleAdvector::from_positions(Vec::new(), ParticleConfig::default())
            .unwrap();
        assert!(advector.is_empty());
        advector.tick(&uniform(DVec2::X), 1.0);
        assert_eq!(advector.history_index(), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn particles_never_leave_the_domain(
                seed: u64,
                ticks in 1_usize..40,
                dt in 0.01_f64..5.0,
            ) {
                let field = VectorField::generate("random", 8, 8, seed).unwrap();
                let config = ParticleConfig { count: 20, seed, speed: 1.0, history_length: 4, ..ParticleConfig::default() };
                let mut advector = ParticleAdvector::new(config).unwrap();
                for _ in 0..ticks {
                    advector.tick(&field, dt);
                }
                for i in 0..advector.len() {
                    prop_assert!(inside_unit_square(advector.position(i)));
                    for h in advector.trail(i) {
                        prop_assert!(inside_unit_square(h));
                    }
                }
            }
        }
    }
}
