//! Pure-computation RGBA8 buffer conversion.
//!
//! Always available (no feature gate) so that the PNG path and any other
//! consumer share the same conversion.

use std::f64::consts::TAU;

use flowviz_core::{DVec2, VectorField};

fn to_byte(c: f64) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Fully saturated HSV to RGB, `hue` in turns.
fn hsv_to_rgb(hue: f64, value: f64) -> [f64; 3] {
    let h6 = hue.rem_euclid(1.0) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let (q, t) = (value * (1.0 - f), value * f);
    match sector as u8 {
        0 => [value, t, 0.0],
        1 => [q, value, 0.0],
        2 => [0.0, value, t],
        3 => [0.0, q, value],
        4 => [t, 0.0, value],
        _ => [value, 0.0, q],
    }
}

/// Maps scalar values to grayscale, stretching `[min, max]` to `[0, 255]`.
///
/// Non-finite values and constant inputs map to black. The buffer length is
/// `values.len() * 4`.
pub fn intensity_to_rgba(values: &[f64]) -> Vec<u8> {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = max - min;
    values
        .iter()
        .flat_map(|&v| {
            let t = if v.is_finite() && span > 0.0 {
                (v - min) / span
            } else {
                0.0
            };
            let g = to_byte(t);
            [g, g, g, 255u8]
        })
        .collect()
}

/// Colors each cell by flow direction (hue) and relative magnitude (value).
///
/// East is red, north (+y) is yellow-green, and so on around the wheel; the
/// longest vector in the field gets full brightness.
pub fn field_to_rgba(field: &VectorField) -> Vec<u8> {
    let max = field.max_magnitude();
    field
        .data()
        .iter()
        .flat_map(|v| {
            if max <= 0.0 {
                return [0, 0, 0, 255u8];
            }
            let hue = v.y.atan2(v.x) / TAU;
            let [r, g, b] = hsv_to_rgb(hue, v.length() / max);
            [to_byte(r), to_byte(g), to_byte(b), 255u8]
        })
        .collect()
}

/// Grayscale of each cell's magnitude relative to the longest vector.
///
/// A zero field maps to black.
pub fn magnitude_to_rgba(field: &VectorField) -> Vec<u8> {
    let max = field.max_magnitude();
    field
        .data()
        .iter()
        .flat_map(|v| {
            let g = if max > 0.0 { to_byte(v.length() / max) } else { 0 };
            [g, g, g, 255u8]
        })
        .collect()
}

/// Paints normalized `[0, 1] x [0, 1]` points into an RGBA8 buffer.
///
/// Points outside the unit square are skipped; a coordinate of exactly `1`
/// lands in the last row or column.
pub fn plot_points(
    rgba: &mut [u8],
    width: usize,
    height: usize,
    points: impl IntoIterator<Item = DVec2>,
    color: [u8; 4],
) {
    if width == 0 || height == 0 {
        return;
    }
    for p in points {
        if !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y) {
            continue;
        }
        let x = ((p.x * width as f64) as usize).min(width - 1);
        let y = ((p.y * height as f64) as usize).min(height - 1);
        let i = (y * width + x) * 4;
        if let Some(pixel) = rgba.get_mut(i..i + 4) {
            pixel.copy_from_slice(&color);
        }
    }
}
