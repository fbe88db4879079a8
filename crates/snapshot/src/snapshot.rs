//! PNG output of RGBA8 buffers.
//!
//! Feature-gated behind `png` (default on). The buffers themselves come from
//! [`crate::pixel`].

use std::path::Path;

use flowviz_core::FlowError;

/// Writes an RGBA8 buffer of `width x height` pixels as a PNG image.
///
/// Returns `FlowError::InvalidDimensions` if a dimension is zero or does not
/// fit in `u32`, or `FlowError::Io` if the buffer length is wrong or the
/// write fails.
pub fn write_png(rgba: Vec<u8>, width: usize, height: usize, path: &Path) -> Result<(), FlowError> {
    if width == 0 || height == 0 {
        return Err(FlowError::InvalidDimensions);
    }
    let w = u32::try_from(width).map_err(|_| FlowError::InvalidDimensions)?;
    let h = u32::try_from(height).map_err(|_| FlowError::InvalidDimensions)?;
    let img = image::RgbaImage::from_raw(w, h, rgba)
        .ok_or_else(|| FlowError::Io("RGBA buffer size mismatch".into()))?;
    img.save(path).map_err(|e| FlowError::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{field_to_rgba, intensity_to_rgba};
    use flowviz_core::VectorField;

    #[test]
    fn write_png_round_trip() {
        let field = VectorField::generate("circle", 16, 12, 1).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.png");

        write_png(field_to_rgba(&field), 16, 12, &path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.width(), 16);
        assert_eq!(img.height(), 12);
    }

    #[test]
    fn write_png_preserves_pixels() {
        let values: Vec<f64> = (0..8).map(f64::from).collect();
        let rgba = intensity_to_rgba(&values);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.png");

        write_png(rgba.clone(), 4, 2, &path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.into_raw(), rgba);
    }

    #[test]
    fn write_png_rejects_wrong_buffer_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        let result = write_png(vec![0u8; 7], 2, 2, &path);
        assert!(matches!(result, Err(FlowError::Io(_))));
        assert!(!path.exists());
    }

    #[test]
    fn write_png_rejects_zero_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_png(Vec::new(), 0, 4, &dir.path().join("empty.png"));
        assert!(matches!(result, Err(FlowError::InvalidDimensions)));
    }

    #[test]
    fn write_png_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.png");
        let result = write_png(vec![0u8; 16], 2, 2, &path);
        assert!(matches!(result, Err(FlowError::Io(_))));
    }
}
