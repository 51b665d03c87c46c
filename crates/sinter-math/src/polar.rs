//! Polar coordinates and angle helpers.
//!
//! Particle centers are stored in polar coordinates about the system
//! origin and node positions in polar coordinates about their particle
//! center, in the particle's body frame.

use std::f64::consts::{PI, TAU};

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A point in polar coordinates: radius and angle (radians).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PolarCoordinates {
    pub r: f64,
    pub phi: f64,
}

impl PolarCoordinates {
    pub const ORIGIN: Self = Self { r: 0.0, phi: 0.0 };

    pub fn new(r: f64, phi: f64) -> Self {
        Self { r, phi }
    }

    /// Converts a Cartesian vector to polar form. The origin maps to `(0, 0)`.
    pub fn from_cartesian(v: DVec2) -> Self {
        let r = v.length();
        if r == 0.0 {
            return Self::ORIGIN;
        }
        Self {
            r,
            phi: v.y.atan2(v.x),
        }
    }

    /// Cartesian form of this point.
    #[inline]
    pub fn to_cartesian(self) -> DVec2 {
        DVec2::new(self.r * self.phi.cos(), self.r * self.phi.sin())
    }

    /// Cartesian form after rotating the frame by `rotation` radians.
    #[inline]
    pub fn to_cartesian_rotated(self, rotation: f64) -> DVec2 {
        let angle = self.phi + rotation;
        DVec2::new(self.r * angle.cos(), self.r * angle.sin())
    }

    /// Unit radial direction `e_r` at this angle.
    #[inline]
    pub fn radial_direction(self) -> DVec2 {
        DVec2::new(self.phi.cos(), self.phi.sin())
    }

    /// Unit angular direction `e_φ` at this angle.
    #[inline]
    pub fn angular_direction(self) -> DVec2 {
        DVec2::new(-self.phi.sin(), self.phi.cos())
    }

    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.phi.is_finite()
    }
}

/// Maps an angle into `(-π, π]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle.rem_euclid(TAU);
    if a > PI {
        a -= TAU;
    }
    a
}

/// Rotates a vector by `angle` radians counter-clockwise.
#[inline]
pub fn rotate(v: DVec2, angle: f64) -> DVec2 {
    DVec2::from_angle(angle).rotate(v)
}

/// Two-dimensional cross product (z component of `a × b`).
#[inline]
pub fn cross(a: DVec2, b: DVec2) -> f64 {
    a.x * b.y - a.y * b.x
}
