//! Reproducible description of a visualization run.
//!
//! A [`RunSpec`] captures everything needed to recreate a result: field kind,
//! grid dimensions, PRNG seed and a parameter object with one optional section
//! per component:
//!
//! ```json
//! { "streamlines": { "step_size": 0.005 }, "lic": { "half_length": 12 }, "particles": { "count": 500 } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FlowError;
use crate::field::VectorField;
use crate::field_source::FieldKind;
use crate::lic::LicConfig;
use crate::particles::ParticleConfig;
use crate::streamline::IntegratorConfig;

/// Reproducible run description.
///
/// Two identical `RunSpec` values produce bit-identical fields, LIC textures
/// and particle states.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSpec {
    pub kind: String,
    pub width: usize,
    pub height: usize,
    pub seed: u64,
    #[serde(default = "empty_params")]
    pub params: Value,
}

/// Parameter section read by [`RunSpec::integrator_config`].
pub const STREAMLINES: &str = "streamlines";
/// Parameter section read by [`RunSpec::lic_config`].
pub const LIC: &str = "lic";
/// Parameter section read by [`RunSpec::particle_config`].
pub const PARTICLES: &str = "particles";

fn empty_params() -> Value {
    Value::Object(Map::new())
}

impl RunSpec {
    /// Creates a run description with an empty parameter object.
    pub fn new(kind: &str, width: usize, height: usize, seed: u64) -> Self {
        Self {
            kind: kind.to_string(),
            width,
            height,
            seed,
            params: empty_params(),
        }
    }

    /// Replaces the parameter object.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Checks the dimensions, the field kind and the parameter object.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.width == 0 || self.height == 0 {
            return Err(FlowError::InvalidDimensions);
        }
        self.width
            .checked_mul(self.height)
            .ok_or(FlowError::InvalidDimensions)?;
        FieldKind::from_name(&self.kind)?;
        if !(self.params.is_object() || self.params.is_null()) {
            return Err(FlowError::InvalidConfig(
                "params must be a JSON object".into(),
            ));
        }
        Ok(())
    }

    /// Builds the vector field this run uses.
    pub fn generate_field(&self) -> Result<VectorField, FlowError> {
        self.validate()?;
        VectorField::generate(&self.kind, self.width, self.height, self.seed)
    }

    /// Integrator config from the `streamlines` section.
    pub fn integrator_config(&self) -> Result<IntegratorConfig, FlowError> {
        IntegratorConfig::from_json(&Value::Object(self.section(STREAMLINES)))
    }

    /// LIC config from the `lic` section; `noise_seed` defaults to the run seed.
    pub fn lic_config(&self) -> Result<LicConfig, FlowError> {
        LicConfig::from_json(&self.section_with_seed(LIC, "noise_seed"))
    }

    /// Particle config from the `particles` section; `seed` defaults to the run seed.
    pub fn particle_config(&self) -> Result<ParticleConfig, FlowError> {
        ParticleConfig::from_json(&self.section_with_seed(PARTICLES, "seed"))
    }

    /// Copy of `params[name]`, empty if absent or not an object.
    fn section(&self, name: &str) -> Map<String, Value> {
        match self.params.get(name) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    fn section_with_seed(&self, name: &str, key: &str) -> Value {
        let mut map = self.section(name);
        map.entry(key).or_insert_with(|| Value::from(self.seed));
        Value::Object(map)
    }
}
