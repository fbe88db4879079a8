#![deny(unsafe_code)]
//! CPU-side image output for flowviz.
//!
//! [`pixel`] turns LIC intensities, vector fields and traced points into RGBA8
//! buffers and is always available. [`snapshot`] writes those buffers as PNG
//! files and is gated behind the `png` feature (default on) so the pixel
//! conversion can be used without pulling in the `image` crate.

pub mod pixel;

#[cfg(feature = "png")]
pub mod snapshot;

pub use pixel::{field_to_rgba, intensity_to_rgba, magnitude_to_rgba, plot_points};

#[cfg(feature = "png")]
pub use snapshot::write_png;
