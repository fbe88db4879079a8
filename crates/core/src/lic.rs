//! Fast line integral convolution.
//!
//! A white-noise texture is box-filtered along streamlines traced through the
//! field. Each traced line is reused for up to `2 * window_steps - 1` output
//! pixels by sliding the filter window along it, and a pixel that already has
//! `coverage_quota` hits is never used as a seed again.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::FlowError;
use crate::field::{Sampling, VectorField};
use crate::params::{param_f64, param_string, param_u64, param_usize};
use crate::prng::Xorshift64;

const DEFAULT_HALF_LENGTH: usize = 10;
const DEFAULT_WINDOW_STEPS: usize = 20;
const DEFAULT_COVERAGE_QUOTA: u32 = 1;
const DEFAULT_STEP_SIZE: f64 = 0.5;
const DEFAULT_SEED_STRIDE: usize = 1;
const DEFAULT_NOISE_SEED: u64 = 1;

/// Parameters of a [`FastLic`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LicConfig {
    /// Filter half-width `L` in samples; the kernel spans `2L + 1` samples.
    pub half_length: usize,
    /// Number of sliding positions `M` per direction, including the seed.
    pub window_steps: usize,
    /// Hit count at which a pixel stops being eligible as a seed.
    pub coverage_quota: u32,
    /// Tracer step length in pixels.
    pub step_size: f64,
    /// Spacing of the seed sweep.
    pub seed_stride: usize,
    /// Seed of the noise texture.
    pub noise_seed: u64,
    /// How the field is sampled between lattice points.
    pub sampling: Sampling,
}

impl Default for LicConfig {
    fn default() -> Self {
        Self {
            half_length: DEFAULT_HALF_LENGTH,
            window_steps: DEFAULT_WINDOW_STEPS,
            coverage_quota: DEFAULT_COVERAGE_QUOTA,
            step_size: DEFAULT_STEP_SIZE,
            seed_stride: DEFAULT_SEED_STRIDE,
            noise_seed: DEFAULT_NOISE_SEED,
            sampling: Sampling::Linear,
        }
    }
}

impl LicConfig {
    /// Extracts a config from a JSON object, falling back to defaults for
    /// missing keys, then validates it.
    pub fn from_json(params: &Value) -> Result<Self, FlowError> {
        let quota = param_u64(params, "coverage_quota", u64::from(DEFAULT_COVERAGE_QUOTA));
        let config = Self {
            half_length: param_usize(params, "half_length", DEFAULT_HALF_LENGTH),
            window_steps: param_usize(params, "window_steps", DEFAULT_WINDOW_STEPS),
            coverage_quota: u32::try_from(quota).map_err(|_| {
                FlowError::InvalidConfig(format!("coverage_quota {quota} does not fit in u32"))
            })?,
            step_size: param_f64(params, "step_size", DEFAULT_STEP_SIZE),
            seed_stride: param_usize(params, "seed_stride", DEFAULT_SEED_STRIDE),
            noise_seed: param_u64(params, "noise_seed", DEFAULT_NOISE_SEED),
            sampling: Sampling::from_name(&param_string(params, "sampling", "linear"))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable by the convolution.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.half_length == 0 {
            return Err(FlowError::InvalidConfig("half_length must be at least 1".into()));
        }
        if self.window_steps == 0 {
            return Err(FlowError::InvalidConfig("window_steps must be at least 1".into()));
        }
        if self.coverage_quota == 0 {
            return Err(FlowError::InvalidConfig("coverage_quota must be at least 1".into()));
        }
        if self.seed_stride == 0 {
            return Err(FlowError::InvalidConfig("seed_stride must be at least 1".into()));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(FlowError::InvalidConfig(format!(
                "step_size must be positive and finite, got {}",
                self.step_size
            )));
        }
        Ok(())
    }

    /// Current values as a JSON object.
    pub fn to_json(&self) -> Value {
        json!({
            "half_length": self.half_length,
            "window_steps": self.window_steps,
            "coverage_quota": self.coverage_quota,
            "step_size": self.step_size,
            "seed_stride": self.seed_stride,
            "noise_seed": self.noise_seed,
            "sampling": self.sampling.name(),
        })
    }

    /// Schema describing the accepted keys, their types and defaults.
    pub fn param_schema() -> Value {
        json!({
            "half_length": {
                "type": "integer",
                "default": DEFAULT_HALF_LENGTH,
                "description": "Box filter half-width in samples"
            },
            "window_steps": {
                "type": "integer",
                "default": DEFAULT_WINDOW_STEPS,
                "description": "Pixels written per direction from one traced line"
            },
            "coverage_quota": {
                "type": "integer",
                "default": DEFAULT_COVERAGE_QUOTA,
                "description": "Hits after which a pixel is no longer a seed"
            },
            "step_size": {
                "type": "number",
                "default": DEFAULT_STEP_SIZE,
                "description": "Tracer step length in pixels"
            },
            "seed_stride": {
                "type": "integer",
                "default": DEFAULT_SEED_STRIDE,
                "description": "Spacing of the seed sweep"
            },
            "noise_seed": {
                "type": "integer",
                "default": DEFAULT_NOISE_SEED,
                "description": "Seed of the white-noise texture"
            },
            "sampling": {
                "type": "string",
                "default": "linear",
                "enum": ["nearest", "linear"],
                "description": "Field interpolation between lattice points"
            }
        })
    }

    /// Index of the seed sample within a traced line.
    fn mid(&self) -> usize {
        self.half_length + self.window_steps - 1
    }
}

/// Work summary of the last [`FastLic::compute`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LicStats {
    /// Streamlines traced.
    pub seeds_traced: usize,
    /// Pixels with at least one hit.
    pub pixels_covered: usize,
}

/// Fast LIC engine owning its noise texture and accumulators.
#[derive(Debug, Clone)]
pub struct FastLic {
    width: usize,
    height: usize,
    config: LicConfig,
    noise: Vec<f64>,
    intensity: Vec<f64>,
    counts: Vec<u32>,
    stats: LicStats,
}

impl FastLic {
    /// Allocates a `width x height` texture set and fills the noise texture
    /// from `config.noise_seed`.
    ///
    /// The texture resolution is independent of the field grid: pixel
    /// `(px, py)` covers the normalized cell starting at `(px / width, py / height)`.
    pub fn new(width: usize, height: usize, config: LicConfig) -> Result<Self, FlowError> {
        config.validate()?;
        if width == 0 || height == 0 {
            return Err(FlowError::InvalidDimensions);
        }
        let len = width
            .checked_mul(height)
            .ok_or(FlowError::InvalidDimensions)?;

        let mut rng = Xorshift64::new(config.noise_seed);
        let noise = (0..len).map(|_| rng.next_f64()).collect();

        Ok(Self {
            width,
            height,
            config,
            noise,
            intensity: vec![0.0; len],
            counts: vec![0; len],
            stats: LicStats::default(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn config(&self) -> &LicConfig {
        &self.config
    }

    /// White-noise input texture, values in `[0, 1)`.
    pub fn noise(&self) -> &[f64] {
        &self.noise
    }

    /// Output of the last pass, row-major.
    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    /// Hits per pixel in the last pass.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn stats(&self) -> LicStats {
        self.stats
    }

    /// Runs one full convolution pass over `field` and returns the intensity.
    ///
    /// Accumulators are cleared first; the noise texture is reused.
    pub fn compute(&mut self, field: &VectorField) -> &[f64] {
        self.intensity.fill(0.0);
        self.counts.fill(0);

        let half_w = self.width.div_ceil(2);
        let half_h = self.height.div_ceil(2);
        let stride = self.config.seed_stride;
        let mut seeds_traced = 0;

        for y in (0..half_h).step_by(stride) {
            for x in (0..half_w).step_by(stride) {
                for (sx, sy) in [(x, y), (x + half_w, y), (x, y + half_h), (x + half_w, y + half_h)] {
                    if sx >= self.width || sy >= self.height {
                        continue;
                    }
                    if self.counts[sy * self.width + sx] >= self.config.coverage_quota {
                        continue;
                    }
                    let line = self.trace(field, sx, sy);
                    self.convolve(&line);
                    seeds_traced += 1;
                }
            }
        }

        for (value, &count) in self.intensity.iter_mut().zip(&self.counts) {
            *value /= f64::from(count.max(1));
        }

        let pixels_covered = self.counts.iter().filter(|&&c| c > 0).count();
        self.stats = LicStats {
            seeds_traced,
            pixels_covered,
        };
        info!(
            width = self.width,
            height = self.height,
            seeds_traced,
            pixels_covered,
            "LIC pass complete"
        );
        if pixels_covered < self.intensity.len() {
            warn!(
                uncovered = self.intensity.len() - pixels_covered,
                seed_stride = stride,
                "LIC pass left pixels uncovered"
            );
        }

        &self.intensity
    }

    /// Unit flow direction in pixel space at continuous pixel coordinate `q`.
    fn direction(&self, field: &VectorField, q: DVec2) -> DVec2 {
        let size = DVec2::new(self.width as f64, self.height as f64);
        let v = field.sample_normalized(q / size, self.config.sampling);
        (v * size).normalize_or_zero()
    }

    fn rk4(&self, field: &VectorField, q: DVec2, h: f64) -> DVec2 {
        let k1 = self.direction(field, q) * h;
        let k2 = self.direction(field, q + k1 * 0.5) * h;
        let k3 = self.direction(field, q + k2 * 0.5) * h;
        let k4 = self.direction(field, q + k3) * h;
        q + (k1 + k2 * 2.0 + k3 * 2.0 + k4) / 6.0
    }

    /// Floor-quantized texture index of `q`, or `None` outside the texture.
    fn pixel_index(&self, q: DVec2) -> Option<usize> {
        let x = q.x.floor();
        let y = q.y.floor();
        if x < 0.0 || y < 0.0 || x >= self.width as f64 || y >= self.height as f64 {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    /// Traces `mid` steps each way from the center of the seed pixel.
    ///
    /// The result has `2 * mid + 1` entries ordered backward end, seed,
    /// forward end; the seed sits at index `mid`.
    fn trace(&self, field: &VectorField, sx: usize, sy: usize) -> Vec<Option<usize>> {
        let mid = self.config.mid();
        let h = self.config.step_size;
        let seed = DVec2::new(sx as f64 + 0.5, sy as f64 + 0.5);

        let mut line = vec![None; 2 * mid + 1];
        line[mid] = self.pixel_index(seed);

        let mut forward = seed;
        let mut backward = seed;
        for j in 1..=mid {
            forward = self.rk4(field, forward, h);
            backward = self.rk4(field, backward, -h);
            line[mid + j] = self.pixel_index(forward);
            line[mid - j] = self.pixel_index(backward);
        }
        line
    }

    fn noise_at(&self, sample: Option<usize>) -> f64 {
        sample.map_or(0.0, |p| self.noise[p])
    }

    fn deposit(&mut self, pixel: Option<usize>, value: f64) {
        if let Some(p) = pixel {
            self.intensity[p] += value;
            self.counts[p] = self.counts[p].saturating_add(1);
        }
    }

    /// Box-filters the noise along `line`, writing the seed and up to
    /// `window_steps - 1` further pixels in each direction.
    fn convolve(&mut self, line: &[Option<usize>]) {
        let l = self.config.half_length;
        let mid = self.config.mid();

        let window = &line[mid - l..=mid + l];
        let k = window.iter().flatten().count();
        if k == 0 {
            return;
        }
        let k = k as f64;
        let center = window.iter().map(|&s| self.noise_at(s)).sum::<f64>() / k;
        self.deposit(line[mid], center);

        let mut forward = center;
        let mut backward = center;
        for i in 1..self.config.window_steps {
            forward += (self.noise_at(line[mid + i + l]) - self.noise_at(line[mid + i - l - 1])) / k;
            self.deposit(line[mid + i], forward);

            backward += (self.noise_at(line[mid - i - l]) - self.noise_at(line[mid - i + l + 1])) / k;
            self.deposit(line[mid - i], backward);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(v: DVec2, width: usize, height: usize) -> VectorField {
        VectorField::new(width, height, vec![v; width * height]).unwrap()
    }

    /// Mean noise over the in-texture pixels of row `y` within `l` of `x`.
    fn row_mean(lic: &FastLic, x: usize, y: usize, l: usize) -> f64 {
        let lo = x.saturating_sub(l);
        let hi = (x + l).min(lic.width() - 1);
        let row = &lic.noise()[y * lic.width()..(y + 1) * lic.width()];
        row[lo..=hi].iter().sum::<f64>() / (hi - lo + 1) as f64
    }

    // -- Config --

    #[test]
    fn config_from_empty_json_uses_defaults() {
        assert_eq!(LicConfig::from_json(&json!({})).unwrap(), LicConfig::default());
    }

    #[test]
    fn config_from_json_extracts_custom_values() {
        let config = LicConfig::from_json(&json!({
            "half_length": 4,
            "window_steps": 8,
            "coverage_quota": 3,
            "step_size": 1.0,
            "seed_stride": 2,
            "noise_seed": 99,
            "sampling": "nearest",
        }))
        .unwrap();
        assert_eq!(config.half_length, 4);
        assert_eq!(config.window_steps, 8);
        assert_eq!(config.coverage_quota, 3);
        assert_eq!(config.seed_stride, 2);
        assert_eq!(config.noise_seed, 99);
        assert_eq!(config.sampling, Sampling::Nearest);
    }

    #[test]
    fn config_rejects_zero_values() {
        for key in ["half_length", "window_steps", "coverage_quota", "seed_stride", "step_size"] {
            let params = json!({ key: 0 });
            assert!(
                matches!(LicConfig::from_json(&params), Err(FlowError::InvalidConfig(_))),
                "{key} = 0 accepted"
            );
        }
    }

    #[test]
    fn config_rejects_oversized_quota() {
        let params = json!({"coverage_quota": u64::from(u32::MAX) + 1});
        assert!(LicConfig::from_json(&params).is_err());
    }

    #[test]
    fn config_to_json_matches_schema_keys() {
        let values = LicConfig::default().to_json();
        let schema = LicConfig::param_schema();
        for (key, _) in schema.as_object().unwrap() {
            assert!(values.get(key).is_some(), "to_json missing {key}");
        }
    }

    // -- Construction --

    #[test]
    fn new_rejects_zero_dimensions() {
        assert!(matches!(
            FastLic::new(0, 8, LicConfig::default()),
            Err(FlowError::InvalidDimensions)
        ));
    }

    #[test]
    fn noise_is_deterministic_and_in_unit_interval() {
        let a = FastLic::new(16, 8, LicConfig::default()).unwrap();
        let b = FastLic::new(16, 8, LicConfig::default()).unwrap();
        assert_eq!(a.noise(), b.noise());
        assert_eq!(a.noise().len(), 128);
        assert!(a.noise().iter().all(|n| (0.0..1.0).contains(n)));

        let other = LicConfig {
            noise_seed: 2,
            ..LicConfig::default()
        };
        assert_ne!(a.noise(), FastLic::new(16, 8, other).unwrap().noise());
    }

    // -- Coverage --

    #[test]
    fn stride_one_covers_every_pixel() {
        for kind in ["attract", "circle", "saddle", "random", "vortex"] {
            let field = VectorField::generate(kind, 24, 24, 3).unwrap();
            let mut lic = FastLic::new(40, 30, LicConfig::default()).unwrap();
            lic.compute(&field);
            assert!(
                lic.counts().iter().all(|&c| c > 0),
                "{kind}: uncovered pixel"
            );
            assert_eq!(lic.stats().pixels_covered, 40 * 30);
        }
    }

    #[test]
    fn zero_field_makes_every_pixel_its_own_seed() {
        let field = VectorField::zeros(8, 8).unwrap();
        let mut lic = FastLic::new(10, 6, LicConfig::default()).unwrap();
        lic.compute(&field);
        assert_eq!(lic.stats().seeds_traced, 60);
        assert!(lic.counts().iter().all(|&c| c > 0));
    }

    #[test]
    fn unvisited_pixels_stay_zero() {
        let config = LicConfig {
            seed_stride: 16,
            half_length: 2,
            window_steps: 3,
            ..LicConfig::default()
        };
        let field = uniform(DVec2::X, 8, 8);
        let mut lic = FastLic::new(16, 16, config).unwrap();
        lic.compute(&field);

        // Seeds at (0,0), (8,0), (0,8), (8,8) with horizontal flow touch rows 0 and 8 only.
        assert_eq!(lic.stats().seeds_traced, 4);
        for y in 0..16 {
            for x in 0..16 {
                let i = y * 16 + x;
                if lic.counts()[i] == 0 {
                    assert_eq!(lic.intensity()[i], 0.0, "pixel ({x},{y})");
                }
                if y != 0 && y != 8 {
                    assert_eq!(lic.counts()[i], 0, "pixel ({x},{y}) visited");
                }
            }
        }
        assert!(lic.stats().pixels_covered < 256);
    }

    #[test]
    fn quota_bounds_the_number_of_seeds() {
        let field = uniform(DVec2::X, 8, 8);
        let mut lic = FastLic::new(32, 32, LicConfig::default()).unwrap();
        lic.compute(&field);
        let single = lic.stats().seeds_traced;
        assert!(single < 32 * 32);

        let mut greedy = FastLic::new(
            32,
            32,
            LicConfig {
                coverage_quota: 50,
                ..LicConfig::default()
            },
        )
        .unwrap();
        greedy.compute(&field);
        assert!(greedy.stats().seeds_traced > single);
    }

    // -- Values --

    #[test]
    fn center_only_pass_is_a_row_mean_for_horizontal_flow() {
        let config = LicConfig {
            half_length: 2,
            window_steps: 1,
            step_size: 1.0,
            ..LicConfig::default()
        };
        let mut lic = FastLic::new(12, 4, config).unwrap();
        lic.compute(&uniform(DVec2::X, 6, 6));
        for y in 0..4 {
            for x in 0..12 {
                let got = lic.intensity()[y * 12 + x];
                let want = row_mean(&lic, x, y, 2);
                assert!((got - want).abs() < 1e-12, "({x},{y}): {got} vs {want}");
            }
        }
    }

    #[test]
    fn sliding_window_matches_direct_mean_away_from_edges() {
        let (l, m) = (2, 4);
        let config = LicConfig {
            half_length: l,
            window_steps: m,
            step_size: 1.0,
            ..LicConfig::default()
        };
        let width = 40;
        let mut lic = FastLic::new(width, 1, config).unwrap();
        lic.compute(&uniform(DVec2::X, 8, 2));
        for x in (l + m - 1)..=(width - l - m) {
            let got = lic.intensity()[x];
            let want = row_mean(&lic, x, 0, l);
            assert!((got - want).abs() < 1e-9, "x={x}: {got} vs {want}");
        }
    }

    #[test]
    fn compute_resets_accumulators_between_passes() {
        let field = VectorField::generate("swirl", 16, 16, 1).unwrap();
        let mut lic = FastLic::new(20, 20, LicConfig::default()).unwrap();
        let first = lic.compute(&field).to_vec();
        let first_counts = lic.counts().to_vec();
        let second = lic.compute(&field).to_vec();
        assert_eq!(first, second);
        assert_eq!(first_counts, lic.counts());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn covered_pixels_are_bounded_by_noise_range(
                seed: u64,
                width in 1_usize..24,
                height in 1_usize..24,
                stride in 1_usize..4,
            ) {
                let field = VectorField::generate("random", 8, 8, seed).unwrap();
                let config = LicConfig {
                    half_length: 3,
                    window_steps: 4,
                    seed_stride: stride,
                    noise_seed: seed,
                    ..LicConfig::default()
                };
                let mut lic = FastLic::new(width, height, config).unwrap();
                lic.compute(&field);
                for (i, (&value, &count)) in lic.intensity().iter().zip(lic.counts()).enumerate() {
                    if count == 0 {
                        prop_assert_eq!(value, 0.0, "unvisited pixel {} has {}", i, value);
                    }
                    prop_assert!(value.is_finite());
                }
                if stride == 1 {
                    prop_assert_eq!(lic.stats().pixels_covered, width * height);
                }
            }
        }
    }
}
