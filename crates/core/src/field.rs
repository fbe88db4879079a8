//! Two-dimensional vector field on a regular grid.
//!
//! A `VectorField` stores `width * height` [`DVec2`] values in row-major
//! layout. It is immutable once built: consumers (the streamline integrator,
//! the LIC engine, the particle advector) only ever hold `&VectorField`, and
//! [`VectorField::resize`] returns a new instance.
//!
//! Two coordinate systems are in play:
//! - grid coordinates, `[0, width-1] x [0, height-1]`, used by [`get`](VectorField::get)
//!   and [`sample`](VectorField::sample);
//! - normalized coordinates, `[0, 1] x [0, 1]`, used by every consumer through
//!   [`sample_normalized`](VectorField::sample_normalized). Normalized `(u, v)`
//!   maps to grid `(u * width, v * height)`.

use std::fmt;
use std::str::FromStr;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FlowError;
use crate::field_source::{FieldKind, FieldSource};

/// How a continuous coordinate is turned into a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sampling {
    /// Value of the nearest lattice point.
    Nearest,
    /// Bilinear interpolation of the four enclosing lattice points.
    #[default]
    Linear,
}

impl Sampling {
    /// Parses a sampling mode name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, FlowError> {
        match name.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Sampling::Nearest),
            "linear" => Ok(Sampling::Linear),
            _ => Err(FlowError::UnknownSampling(name.to_string())),
        }
    }

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Sampling::Nearest => "nearest",
            Sampling::Linear => "linear",
        }
    }
}

impl FromStr for Sampling {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for Sampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 2D grid of vectors with indexed and continuously interpolated sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField {
    width: usize,
    height: usize,
    data: Vec<DVec2>,
}

/// Validates grid dimensions and returns the cell count.
fn cell_count(width: usize, height: usize) -> Result<usize, FlowError> {
    if width == 0 || height == 0 {
        return Err(FlowError::InvalidDimensions);
    }
    width
        .checked_mul(height)
        .ok_or(FlowError::InvalidDimensions)
}

impl VectorField {
    /// Creates a field from row-major vectors.
    ///
    /// Returns `FlowError::InvalidDimensions` for a zero or overflowing size and
    /// `FlowError::LengthMismatch` if `data.len() != width * height`.
    pub fn new(width: usize, height: usize, data: Vec<DVec2>) -> Result<Self, FlowError> {
        let expected = cell_count(width, height)?;
        if data.len() != expected {
            return Err(FlowError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Creates a field where every vector is zero.
    pub fn zeros(width: usize, height: usize) -> Result<Self, FlowError> {
        let len = cell_count(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![DVec2::ZERO; len],
        })
    }

    /// Creates a field from interleaved components `(x0, y0, x1, y1, ...)`.
    ///
    /// Inverse of [`to_flat`](Self::to_flat).
    pub fn from_flat(width: usize, height: usize, flat: &[f64]) -> Result<Self, FlowError> {
        let expected = cell_count(width, height)?;
        if flat.len() != expected * 2 {
            return Err(FlowError::LengthMismatch {
                expected: expected * 2,
                actual: flat.len(),
            });
        }
        let data = flat
            .chunks_exact(2)
            .map(|c| DVec2::new(c[0], c[1]))
            .collect();
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Evaluates `source` at the normalized coordinate `(x / width, y / height)` of every cell.
    pub fn from_source(
        width: usize,
        height: usize,
        source: &dyn FieldSource,
    ) -> Result<Self, FlowError> {
        let len = cell_count(width, height)?;
        let (w, h) = (width as f64, height as f64);
        let data = (0..len)
            .map(|i| {
                let p = DVec2::new((i % width) as f64 / w, (i / width) as f64 / h);
                source.sample(p)
            })
            .collect();
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Builds a field from a registered generator name.
    ///
    /// `seed` only matters for the `random` kind. Returns
    /// `FlowError::UnknownKind` if `kind` is not one of
    /// [`FieldKind::list_names`].
    pub fn generate(kind: &str, width: usize, height: usize, seed: u64) -> Result<Self, FlowError> {
        let kind = FieldKind::from_name(kind)?;
        Self::generate_kind(kind, width, height, seed)
    }

    /// Builds a field from an already-parsed [`FieldKind`].
    pub fn generate_kind(
        kind: FieldKind,
        width: usize,
        height: usize,
        seed: u64,
    ) -> Result<Self, FlowError> {
        debug!(kind = kind.name(), width, height, "generating vector field");
        let source = kind.source(seed);
        Self::from_source(width, height, source.as_ref())
    }

    /// Field width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Field height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of vectors, always `width * height`.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: a field has at least one cell.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read-only access to the row-major vectors.
    pub fn data(&self) -> &[DVec2] {
        &self.data
    }

    /// Vector at lattice point `(x, y)`.
    ///
    /// Coordinates must lie in `[0, width) x [0, height)`; callers clamp first.
    /// Out-of-range access is a contract violation and panics in debug builds.
    /// Use [`try_get`](Self::try_get) for a checked lookup.
    pub fn get(&self, x: usize, y: usize) -> DVec2 {
        debug_assert!(
            x < self.width && y < self.height,
            "get({x}, {y}) out of range for {}x{} field",
            self.width,
            self.height
        );
        self.data[y * self.width + x]
    }

    /// Checked lattice lookup.
    pub fn try_get(&self, x: usize, y: usize) -> Result<DVec2, FlowError> {
        if x >= self.width || y >= self.height {
            return Err(FlowError::OutOfRange {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(self.data[y * self.width + x])
    }

    /// Bilinear sample at real-valued grid coordinates.
    ///
    /// Coordinates are clamped to `[0, width-1] x [0, height-1]`. When all four
    /// bilinear weights are zero (the coordinate sits on a grid line), the
    /// nearest corner is returned instead: per axis the upper corner wins only
    /// if strictly closer, ties go to the lower index.
    pub fn sample(&self, x: f64, y: f64) -> DVec2 {
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);

        let x0 = x.floor();
        let x1 = x.min(max_x).ceil();
        let y0 = y.floor();
        let y1 = y.min(max_y).ceil();

        let mut w00 = (x1 - x) * (y1 - y);
        let mut w01 = (x1 - x) * (y - y0);
        let mut w10 = (x - x0) * (y1 - y);
        let mut w11 = (x - x0) * (y - y0);

        if w00 + w01 + w10 + w11 == 0.0 {
            let upper_x = x1 - x < x - x0;
            let upper_y = y1 - y < y - y0;
            w00 = f64::from(u8::from(!upper_x && !upper_y));
            w01 = f64::from(u8::from(!upper_x && upper_y));
            w10 = f64::from(u8::from(upper_x && !upper_y));
            w11 = f64::from(u8::from(upper_x && upper_y));
        }

        let (ix0, ix1) = (x0 as usize, x1 as usize);
        let (iy0, iy1) = (y0 as usize, y1 as usize);
        self.get(ix0, iy0) * w00
            + self.get(ix0, iy1) * w01
            + self.get(ix1, iy0) * w10
            + self.get(ix1, iy1) * w11
    }

    /// Nearest-lattice sample at real-valued grid coordinates (clamped).
    pub fn sample_nearest(&self, x: f64, y: f64) -> DVec2 {
        let x = x.clamp(0.0, (self.width - 1) as f64).round();
        let y = y.clamp(0.0, (self.height - 1) as f64).round();
        self.get(x as usize, y as usize)
    }

    /// Samples at grid coordinates using the given mode.
    pub fn sample_with(&self, x: f64, y: f64, sampling: Sampling) -> DVec2 {
        match sampling {
            Sampling::Nearest => self.sample_nearest(x, y),
            Sampling::Linear => self.sample(x, y),
        }
    }

    /// Samples at normalized coordinates `(u, v)` in `[0, 1] x [0, 1]`.
    pub fn sample_normalized(&self, p: DVec2, sampling: Sampling) -> DVec2 {
        self.sample_with(
            p.x * self.width as f64,
            p.y * self.height as f64,
            sampling,
        )
    }

    /// Resamples the continuous reconstruction of this field onto a new grid.
    ///
    /// Cell `(x, y)` of the result is `sample(x * width / new_width, y * height / new_height)`.
    /// Lossy: resizing back does not reproduce the original bit for bit.
    pub fn resize(&self, new_width: usize, new_height: usize) -> Result<VectorField, FlowError> {
        let len = cell_count(new_width, new_height)?;
        let scale_x = self.width as f64 / new_width as f64;
        let scale_y = self.height as f64 / new_height as f64;
        debug!(
            from_width = self.width,
            from_height = self.height,
            new_width,
            new_height,
            "resizing vector field"
        );
        let data = (0..len)
            .map(|i| {
                let x = (i % new_width) as f64 * scale_x;
                let y = (i / new_width) as f64 * scale_y;
                self.sample(x, y)
            })
            .collect();
        Ok(VectorField {
            width: new_width,
            height: new_height,
            data,
        })
    }

    /// Interleaved components `(x0, y0, x1, y1, ...)` for a two-channel texture upload.
    pub fn to_flat(&self) -> Vec<f64> {
        self.data.iter().flat_map(|v| [v.x, v.y]).collect()
    }

    /// Largest vector magnitude in the field.
    pub fn max_magnitude(&self) -> f64 {
        self.data.iter().map(|v| v.length()).fold(0.0, f64::max)
    }
}
