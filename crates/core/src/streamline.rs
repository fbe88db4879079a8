//! Streamline tracing with classical 4th-order Runge-Kutta integration.
//!
//! Positions are normalized `[0, 1] x [0, 1]` coordinates; the field is
//! sampled through [`VectorField::sample_normalized`]. A trace never fails:
//! every way it can end (fixed point, leaving the domain, landing on the
//! domain edge, convergence, step cap) is recorded as a flag on the
//! resulting [`Streamline`].

use glam::DVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::error::FlowError;
use crate::field::{Sampling, VectorField};
use crate::params::{param_f64, param_string, param_usize};
use crate::prng::Xorshift64;

const DEFAULT_STEP_SIZE: f64 = 0.01;
const DEFAULT_MIN_STEPS: usize = 100;
const DEFAULT_MAX_STEPS: usize = 1000;
const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Parameters of the RK4 tracer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegratorConfig {
    /// Integration time step per RK4 step.
    pub step_size: f64,
    /// Steps that must be taken before convergence may end the trace.
    pub min_steps: usize,
    /// Hard cap on the number of steps.
    pub max_steps: usize,
    /// Step displacement below which the line counts as converged.
    pub tolerance: f64,
    /// How the field is sampled between lattice points.
    pub sampling: Sampling,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            step_size: DEFAULT_STEP_SIZE,
            min_steps: DEFAULT_MIN_STEPS,
            max_steps: DEFAULT_MAX_STEPS,
            tolerance: DEFAULT_TOLERANCE,
            sampling: Sampling::Linear,
        }
    }
}

impl IntegratorConfig {
    /// Extracts a config from a JSON object, falling back to defaults for
    /// missing keys, then validates it.
    pub fn from_json(params: &Value) -> Result<Self, FlowError> {
        let config = Self {
            step_size: param_f64(params, "step_size", DEFAULT_STEP_SIZE),
            min_steps: param_usize(params, "min_steps", DEFAULT_MIN_STEPS),
            max_steps: param_usize(params, "max_steps", DEFAULT_MAX_STEPS),
            tolerance: param_f64(params, "tolerance", DEFAULT_TOLERANCE),
            sampling: Sampling::from_name(&param_string(params, "sampling", "linear"))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable by the tracer.
    pub fn validate(&self) -> Result<(), FlowError> {
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(FlowError::InvalidConfig(format!(
                "step_size must be positive and finite, got {}",
                self.step_size
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(FlowError::InvalidConfig(format!(
                "tolerance must be non-negative and finite, got {}",
                self.tolerance
            )));
        }
        if self.max_steps == 0 {
            return Err(FlowError::InvalidConfig(
                "max_steps must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Current values as a JSON object.
    pub fn to_json(&self) -> Value {
        json!({
            "step_size": self.step_size,
            "min_steps": self.min_steps,
            "max_steps": self.max_steps,
            "tolerance": self.tolerance,
            "sampling": self.sampling.name(),
        })
    }

    /// Schema describing the accepted keys, their types and defaults.
    pub fn param_schema() -> Value {
        json!({
            "step_size": {
                "type": "number",
                "default": DEFAULT_STEP_SIZE,
                "description": "Time step of one RK4 step"
            },
            "min_steps": {
                "type": "integer",
                "default": DEFAULT_MIN_STEPS,
                "description": "Steps taken before convergence may stop the trace"
            },
            "max_steps": {
                "type": "integer",
                "default": DEFAULT_MAX_STEPS,
                "description": "Hard cap on steps per streamline"
            },
            "tolerance": {
                "type": "number",
                "default": DEFAULT_TOLERANCE,
                "description": "Step length below which the line has converged"
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

/// A traced curve plus the reasons it stopped.
///
/// Built and mutated only by [`Integrator`]; read-only for everyone else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Streamline {
    start: DVec2,
    direction: DVec2,
    position: DVec2,
    points: Vec<DVec2>,
    valid: bool,
    reached_boundary: bool,
    reached_end: bool,
    converged: bool,
}

impl Streamline {
    fn new(start: DVec2, direction: DVec2) -> Self {
        Self {
            start,
            direction: direction.normalize_or_zero(),
            position: start,
            points: Vec::new(),
            valid: true,
            reached_boundary: false,
            reached_end: false,
            converged: false,
        }
    }

    /// Seed point. Never changes during integration.
    pub fn start(&self) -> DVec2 {
        self.start
    }

    /// Unit direction of the field at the start of the last step taken.
    pub fn direction(&self) -> DVec2 {
        self.direction
    }

    /// Final position.
    pub fn position(&self) -> DVec2 {
        self.position
    }

    /// Positions after each completed step, in order. The seed is not included.
    pub fn points(&self) -> &[DVec2] {
        &self.points
    }

    /// Number of completed steps.
    pub fn steps(&self) -> usize {
        self.points.len()
    }

    /// False once the trace hit a zero of the field.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// The trace left `[0, 1] x [0, 1]`.
    pub fn reached_boundary(&self) -> bool {
        self.reached_boundary
    }

    /// The trace landed exactly on the domain edge.
    pub fn reached_end(&self) -> bool {
        self.reached_end
    }

    /// A step was shorter than the tolerance.
    pub fn converged(&self) -> bool {
        self.converged
    }
}

/// Returns true if any component is outside `[0, 1]`.
fn outside_unit_square(p: DVec2) -> bool {
    p.x < 0.0 || p.x > 1.0 || p.y < 0.0 || p.y > 1.0
}

/// Returns true if any component is exactly `0` or `1`.
fn on_unit_square_edge(p: DVec2) -> bool {
    p.x == 0.0 || p.x == 1.0 || p.y == 0.0 || p.y == 1.0
}

/// RK4 streamline tracer.
#[derive(Debug, Clone)]
pub struct Integrator {
    config: IntegratorConfig,
}

impl Integrator {
    /// Creates a tracer after validating `config`.
    pub fn new(config: IntegratorConfig) -> Result<Self, FlowError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The tracer's configuration.
    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    /// Traces one streamline from `start`.
    ///
    /// Stops when the field vanishes, the line leaves or lands on the edge of
    /// the unit square, or it has converged after at least `min_steps` steps.
    /// Reaching `max_steps` is a normal outcome with only `valid` set.
    pub fn integrate(&self, field: &VectorField, start: DVec2, direction: DVec2) -> Streamline {
        let mut line = Streamline::new(start, direction);
        for steps_taken in 1..=self.config.max_steps {
            self.step(field, &mut line);
            if !line.valid
                || line.reached_boundary
                || line.reached_end
                || (steps_taken >= self.config.min_steps && line.converged)
            {
                break;
            }
        }
        trace!(
            steps = line.steps(),
            valid = line.valid,
            reached_boundary = line.reached_boundary,
            reached_end = line.reached_end,
            converged = line.converged,
            "streamline terminated"
        );
        line
    }

    /// Traces `count` streamlines from uniformly random seeds and directions.
    ///
    /// Seeds are drawn sequentially from `rng`, then traced in parallel. The
    /// result has exactly `count` entries in seed order.
    pub fn integrate_random_streamlines(
        &self,
        field: &VectorField,
        count: usize,
        rng: &mut Xorshift64,
    ) -> Vec<Streamline> {
        let seeds: Vec<(DVec2, DVec2)> = (0..count)
            .map(|_| {
                let start = rng.next_unit_point();
                let direction = rng.next_direction();
                (start, direction)
            })
            .collect();

        let lines: Vec<Streamline> = seeds
            .par_iter()
            .map(|&(start, direction)| self.integrate(field, start, direction))
            .collect();

        debug!(
            count,
            converged = lines.iter().filter(|l| l.converged).count(),
            left_domain = lines.iter().filter(|l| l.reached_boundary).count(),
            "integrated random streamlines"
        );
        lines
    }

    fn velocity(&self, field: &VectorField, p: DVec2) -> DVec2 {
        field.sample_normalized(p, self.config.sampling)
    }

    /// One RK4 step, updating position, direction and flags in place.
    fn step(&self, field: &VectorField, line: &mut Streamline) {
        let p = line.position;
        let velocity = self.velocity(field, p);
        if velocity.length() == 0.0 {
            line.valid = false;
            return;
        }

        let h = self.config.step_size;
        let k1 = velocity * h;
        let k2 = self.velocity(field, p + k1 * 0.5) * h;
        let k3 = self.velocity(field, p + k2 * 0.5) * h;
        let k4 = self.velocity(field, p + k3) * h;
        let delta = (k1 + k2 * 2.0 + k3 * 2.0 + k4) / 6.0;

        line.position = p + delta;
        line.direction = velocity.normalize();
        line.points.push(line.position);

        if outside_unit_square(line.position) {
            line.reached_boundary = true;
        }
        if on_unit_square_edge(line.position) {
            line.reached_end = true;
        }
        if delta.length() < self.config.tolerance {
            line.converged = true;
        }
    }
}
