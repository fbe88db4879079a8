#![deny(unsafe_code)]
//! Core numerics for 2D vector-field visualization.
//!
//! Provides the grid-sampled [`VectorField`] with its closed-form generators,
//! the RK4 streamline [`Integrator`], the sliding-window [`FastLic`] engine, the
//! [`ParticleAdvector`] with circular trails, the reproducible [`RunSpec`],
//! the `Xorshift64` PRNG and parameter helpers.

pub mod config;
pub mod error;
pub mod field;
pub mod field_source;
pub mod lic;
pub mod params;
pub mod particles;
pub mod prng;
pub mod streamline;

pub use config::RunSpec;
pub use error::FlowError;
pub use field::{Sampling, VectorField};
pub use field_source::{FieldKind, FieldSource};
pub use glam::DVec2;
pub use lic::{FastLic, LicConfig, LicStats};
pub use particles::{ParticleAdvector, ParticleConfig};
pub use prng::Xorshift64;
pub use streamline::{Integrator, IntegratorConfig, Streamline};
