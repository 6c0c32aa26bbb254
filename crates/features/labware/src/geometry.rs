//! Inner well geometry and liquid volume/height conversion.
//!
//! A well is either a stack of frusta and spherical caps, listed top to bottom, or
//! a user-measured height→volume table. Heights are measured from the well bottom
//! in mm, volumes are in µL (mm³).
//!
//! Volume from height is closed form for every section shape. Height from volume
//! inverts the section polynomial by solving a cubic and keeping the single
//! physically valid root.

use crate::error::{LabwareError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Slack allowed when checking a root against a section's height range.
const HEIGHT_TOLERANCE: f64 = 1e-6;
/// Roots closer than this are considered the same root.
const ROOT_MERGE_TOLERANCE: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WellGeometry {
    Sections { sections: Vec<WellSection> },
    #[serde(rename_all = "camelCase")]
    UserDefinedVolumes { height_to_volume_map: Vec<HeightVolumePair> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightVolumePair {
    pub height: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum WellSection {
    #[serde(rename = "conical", rename_all = "camelCase")]
    ConicalFrustum { top_diameter: f64, bottom_diameter: f64, top_height: f64, bottom_height: f64 },
    #[serde(rename = "cuboidal", rename_all = "camelCase")]
    CuboidalFrustum {
        top_x_dimension: f64,
        top_y_dimension: f64,
        bottom_x_dimension: f64,
        bottom_y_dimension: f64,
        top_height: f64,
        bottom_height: f64,
    },
    #[serde(rename = "spherical", rename_all = "camelCase")]
    SphericalSegment { radius_of_curvature: f64, top_height: f64, bottom_height: f64 },
}

impl WellSection {
    #[must_use]
    pub const fn top_height(&self) -> f64 {
        match *self {
            Self::ConicalFrustum { top_height, .. }
            | Self::CuboidalFrustum { top_height, .. }
            | Self::SphericalSegment { top_height, .. } => top_height,
        }
    }

    #[must_use]
    pub const fn bottom_height(&self) -> f64 {
        match *self {
            Self::ConicalFrustum { bottom_height, .. }
            | Self::CuboidalFrustum { bottom_height, .. }
            | Self::SphericalSegment { bottom_height, .. } => bottom_height,
        }
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.top_height() - self.bottom_height()
    }

    /// Volume of liquid filling this section up to `h` above its bottom.
    #[must_use]
    pub fn volume_at(&self, h: f64) -> f64 {
        let (a, b, c) = self.polynomial();
        a * h.powi(3) + b * h.powi(2) + c * h
    }

    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.volume_at(self.height())
    }

    /// Height above the section bottom holding `volume`.
    ///
    /// # Errors
    /// Returns [`LabwareError::InvalidLiquidHeight`] when the cubic has zero or several
    /// roots inside the section.
    pub fn height_at(&self, volume: f64) -> Result<f64> {
        if volume <= 0.0 {
            return Ok(0.0);
        }
        let (a, b, c) = self.polynomial();
        let roots = solve_cubic(a, b, c, -volume);
        reject_unacceptable_heights(self.height(), &roots)
    }

    /// Coefficients `(a, b, c)` of `V(h) = a·h³ + b·h² + c·h`.
    fn polynomial(&self) -> (f64, f64, f64) {
        let height = self.height();
        match *self {
            Self::ConicalFrustum { top_diameter, bottom_diameter, .. } => {
                let (top, bottom) = (top_diameter / 2.0, bottom_diameter / 2.0);
                let k = (top - bottom) / height;
                (PI / 3.0 * k * k, PI * bottom * k, PI * bottom * bottom)
            },
            Self::CuboidalFrustum {
                top_x_dimension,
                top_y_dimension,
                bottom_x_dimension,
                bottom_y_dimension,
                ..
            } => rectangular_frustum_polynomial(
                top_y_dimension,
                bottom_y_dimension,
                top_x_dimension,
                bottom_x_dimension,
                height,
            ),
            Self::SphericalSegment { radius_of_curvature, .. } => (-PI / 3.0, PI * radius_of_curvature, 0.0),
        }
    }
}

/// Coefficients of the cubic giving the volume of a rectangular frustum.
#[must_use]
pub fn rectangular_frustum_polynomial(
    top_length: f64,
    bottom_length: f64,
    top_width: f64,
    bottom_width: f64,
    height: f64,
) -> (f64, f64, f64) {
    let a = (top_length - bottom_length) * (top_width - bottom_width) / (3.0 * height * height);
    let b = (bottom_length * (top_width - bottom_width) + bottom_width * (top_length - bottom_length)) / (2.0 * height);
    let c = bottom_length * bottom_width;
    (a, b, c)
}

impl WellGeometry {
    /// # Errors
    /// Returns an error message for empty, overlapping or gapped sections, and for a
    /// user table that is not strictly increasing.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Self::Sections { sections } => {
                if sections.is_empty() {
                    return Err("no sections".into());
                }
                let sorted = sorted_sections(sections);
                if sorted[0].bottom_height().abs() > HEIGHT_TOLERANCE {
                    return Err("lowest section must start at height 0".into());
                }
                for pair in sorted.windows(2) {
                    if (pair[0].top_height() - pair[1].bottom_height()).abs() > HEIGHT_TOLERANCE {
                        return Err(format!("gap or overlap at height {}", pair[0].top_height()));
                    }
                }
                if let Some(section) = sorted.iter().find(|s| s.height() <= 0.0) {
                    return Err(format!("section at {} has no height", section.bottom_height()));
                }
                Ok(())
            },
            Self::UserDefinedVolumes { height_to_volume_map } => {
                if height_to_volume_map.is_empty() {
                    return Err("empty height to volume map".into());
                }
                let increasing = std::iter::once(&HeightVolumePair { height: 0.0, volume: 0.0 })
                    .chain(height_to_volume_map)
                    .collect::<Vec<_>>()
                    .windows(2)
                    .all(|w| w[1].height > w[0].height && w[1].volume >= w[0].volume);
                if increasing { Ok(()) } else { Err("height to volume map must increase".into()) }
            },
        }
    }

    /// Height of the top of the described geometry.
    #[must_use]
    pub fn max_height(&self) -> f64 {
        match self {
            Self::Sections { sections } => sections.iter().map(WellSection::top_height).fold(0.0, f64::max),
            Self::UserDefinedVolumes { height_to_volume_map } => {
                height_to_volume_map.iter().map(|p| p.height).fold(0.0, f64::max)
            },
        }
    }

    /// Total volume the geometry holds.
    #[must_use]
    pub fn max_volume(&self) -> f64 {
        match self {
            Self::Sections { sections } => sections.iter().map(WellSection::capacity).sum(),
            Self::UserDefinedVolumes { height_to_volume_map } => {
                height_to_volume_map.iter().map(|p| p.volume).fold(0.0, f64::max)
            },
        }
    }
}

/// Volume held below `height`.
///
/// # Errors
/// Returns [`LabwareError::OutOfRange`] for a height below 0 or above the geometry.
pub fn volume_from_height(geometry: &WellGeometry, height: f64) -> Result<f64> {
    let max = geometry.max_height();
    if !(0.0..=max + HEIGHT_TOLERANCE).contains(&height) {
        return Err(LabwareError::out_of_range("height", height, max));
    }

    match geometry {
        WellGeometry::Sections { sections } => {
            let mut volume = 0.0;
            for section in sorted_sections(sections) {
                if height >= section.top_height() {
                    volume += section.capacity();
                } else {
                    if height > section.bottom_height() {
                        volume += section.volume_at(height - section.bottom_height());
                    }
                    break;
                }
            }
            Ok(volume)
        },
        WellGeometry::UserDefinedVolumes { height_to_volume_map } => {
            Ok(interpolate(height_to_volume_map.iter().map(|p| (p.height, p.volume)), height))
        },
    }
}

/// Liquid height holding `volume`.
///
/// # Errors
/// Returns [`LabwareError::OutOfRange`] for a volume below 0 or above capacity, or
/// [`LabwareError::InvalidLiquidHeight`] when no unique height matches.
pub fn height_from_volume(geometry: &WellGeometry, volume: f64) -> Result<f64> {
    let max = geometry.max_volume();
    let tolerance = max * 1e-9;
    if volume < 0.0 || volume > max + tolerance {
        return Err(LabwareError::out_of_range("volume", volume, max));
    }

    match geometry {
        WellGeometry::Sections { sections } => {
            let mut remaining = volume;
            let sorted = sorted_sections(sections);
            for section in &sorted {
                let capacity = section.capacity();
                if remaining <= capacity + tolerance {
                    let h = section.height_at(remaining.min(capacity))?;
                    return Ok(section.bottom_height() + h);
                }
                remaining -= capacity;
            }
            Ok(geometry.max_height())
        },
        WellGeometry::UserDefinedVolumes { height_to_volume_map } => {
            Ok(interpolate(height_to_volume_map.iter().map(|p| (p.volume, p.height)), volume))
        },
    }
}

fn sorted_sections(sections: &[WellSection]) -> Vec<&WellSection> {
    let mut sorted: Vec<&WellSection> = sections.iter().collect();
    sorted.sort_by(|a, b| a.bottom_height().total_cmp(&b.bottom_height()));
    sorted
}

/// Piecewise linear lookup through `(0, 0)` and the given points, clamped at the end.
fn interpolate(points: impl Iterator<Item = (f64, f64)>, x: f64) -> f64 {
    let mut previous = (0.0, 0.0);
    for (px, py) in points {
        if x <= px {
            let span = px - previous.0;
            if span <= 0.0 {
                return py;
            }
            return previous.1 + (py - previous.1) * (x - previous.0) / span;
        }
        previous = (px, py);
    }
    previous.1
}

/// Keeps the single real root within `[0, max_height]`.
fn reject_unacceptable_heights(max_height: f64, roots: &[f64]) -> Result<f64> {
    let mut valid: Vec<f64> = roots
        .iter()
        .copied()
        .filter(|h| h.is_finite() && *h >= -HEIGHT_TOLERANCE && *h <= max_height + HEIGHT_TOLERANCE)
        .map(|h| h.clamp(0.0, max_height))
        .collect();
    valid.sort_by(f64::total_cmp);
    valid.dedup_by(|a, b| (*a - *b).abs() < ROOT_MERGE_TOLERANCE * max_height.max(1.0));

    match valid.as_slice() {
        [height] => Ok(*height),
        [] => Err(LabwareError::invalid_height(format!("no valid height within 0..{max_height}"))),
        many => Err(LabwareError::invalid_height(format!("{} candidate heights within 0..{max_height}", many.len()))),
    }
}

/// Real roots of `a·x³ + b·x² + c·x + d`.
///
/// Degenerate leading coefficients fall back to the quadratic or linear formula.
/// Every root is polished with a couple of Newton steps.
#[must_use]
pub fn solve_cubic(a: f64, b: f64, c: f64, d: f64) -> Vec<f64> {
    let scale = b.abs().max(c.abs()).max(d.abs()).max(f64::MIN_POSITIVE);
    if a.abs() <= 1e-14 * scale {
        return solve_quadratic(b, c, d);
    }

    let (p2, p1, p0) = (b / a, c / a, d / a);
    // depressed cubic t³ + p·t + q with x = t − p2/3
    let shift = p2 / 3.0;
    let p = p1 - p2 * p2 / 3.0;
    let q = 2.0 * p2.powi(3) / 27.0 - p2 * p1 / 3.0 + p0;
    let discriminant = (q / 2.0).powi(2) + (p / 3.0).powi(3);
    // a near-zero discriminant is a repeated root; keep it on the three-root branch
    let noise = 1e-12 * ((q / 2.0).powi(2) + (p / 3.0).powi(3).abs());

    let roots = if discriminant > noise {
        let sqrt = discriminant.sqrt();
        vec![(-q / 2.0 + sqrt).cbrt() + (-q / 2.0 - sqrt).cbrt() - shift]
    } else if p.abs() < f64::EPSILON {
        vec![(-q).cbrt() - shift]
    } else {
        let m = 2.0 * (-p / 3.0).sqrt();
        let theta = (3.0 * q / (p * m)).clamp(-1.0, 1.0).acos() / 3.0;
        (0..3).map(|k| m * (theta - 2.0 * PI * f64::from(k) / 3.0).cos() - shift).collect()
    };

    roots.into_iter().map(|x| polish(a, b, c, d, x)).collect()
}

fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    let scale = b.abs().max(c.abs()).max(f64::MIN_POSITIVE);
    if a.abs() <= 1e-14 * scale {
        return if b == 0.0 { Vec::new() } else { vec![-c / b] };
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return Vec::new();
    }
    // numerically stable form
    let q = -0.5 * (b + b.signum() * discriminant.sqrt());
    if q == 0.0 {
        return vec![0.0];
    }
    vec![q / a, c / q]
}

fn polish(a: f64, b: f64, c: f64, d: f64, mut x: f64) -> f64 {
    for _ in 0..2 {
        let f = ((a * x + b) * x + c) * x + d;
        let df = (3.0 * a * x + 2.0 * b) * x + c;
        if df == 0.0 {
            break;
        }
        x -= f / df;
    }
    x
}
