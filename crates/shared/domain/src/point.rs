use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// A point (or offset) in deck coordinates, in millimeters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns a copy of the point with `z` replaced.
    #[must_use]
    pub const fn with_z(self, z: f64) -> Self {
        Self { z, ..self }
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn magnitude_to(&self, other: &Self) -> f64 {
        let d = *other - *self;
        d.z.mul_add(d.z, d.x.mul_add(d.x, d.y * d.y)).sqrt()
    }

    /// Compares each axis with a relative and an absolute tolerance.
    #[must_use]
    pub fn elementwise_isclose(&self, other: &Self, rel_tol: f64, abs_tol: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= f64::max(rel_tol * a.abs().max(b.abs()), abs_tol);
        close(self.x, other.x) && close(self.y, other.y) && close(self.z, other.z)
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
