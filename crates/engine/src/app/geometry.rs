use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction, or zero when the length is zero or not finite.
    pub fn normalized_or_zero(self) -> Self {
        let length = self.length();
        if !length.is_finite() || length <= f32::EPSILON {
            return Self::ZERO;
        }
        Self {
            x: self.x / length,
            y: self.y / length,
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Axis-aligned box described by its center and half size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl Aabb {
    pub fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }

    pub fn bottom_left(&self) -> Vec2 {
        self.min()
    }

    pub fn bottom_right(&self) -> Vec2 {
        Vec2::new(self.max().x, self.min().y)
    }

    /// Overlap test where boxes closer than `tolerance` also count as touching.
    pub fn overlaps(&self, other: &Aabb, tolerance: f32) -> bool {
        let dx = (self.center.x - other.center.x).abs();
        let dy = (self.center.y - other.center.y).abs();
        dx <= self.half_extents.x + other.half_extents.x + tolerance
            && dy <= self.half_extents.y + other.half_extents.y + tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_or_zero_handles_zero_vector() {
        assert_eq!(Vec2::ZERO.normalized_or_zero(), Vec2::ZERO);
        let unit = Vec2::new(3.0, 4.0).normalized_or_zero();
        assert!((unit.x - 0.6).abs() < 0.0001);
        assert!((unit.y - 0.8).abs() < 0.0001);
    }

    #[test]
    fn aabb_overlap_respects_tolerance() {
        let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.5));
        let touching = Aabb::new(Vec2::new(1.005, 0.0), Vec2::new(0.5, 0.5));
        let apart = Aabb::new(Vec2::new(1.5, 0.0), Vec2::new(0.5, 0.5));

        assert!(a.overlaps(&touching, 0.01));
        assert!(!a.overlaps(&touching, 0.0));
        assert!(!a.overlaps(&apart, 0.01));
        assert_eq!(a.bottom_right(), Vec2::new(0.5, -0.5));
    }
}
