//! Plain 2D geometry shared by the graph model and every layout pass.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Grid every coordinate produced by the formatter is aligned to.
pub const ALIGN_GRID: f64 = 8.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Self) -> f64 {
        (other - self).length()
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Per-side extension applied to a [`Rect`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Margin {
    pub const fn uniform(value: f64) -> Self {
        Self {
            left: value,
            top: value,
            right: value,
            bottom: value,
        }
    }

    pub const fn symmetric(horizontal: f64, vertical: f64) -> Self {
        Self {
            left: horizontal,
            top: vertical,
            right: horizontal,
            bottom: vertical,
        }
    }

    pub const fn horizontal(value: f64) -> Self {
        Self::symmetric(value, 0.0)
    }

    pub const fn bottom(value: f64) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: 0.0,
            bottom: value,
        }
    }
}

/// Axis-aligned rectangle in graph space (y grows downwards).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self::new(origin.x, origin.y, origin.x + size.x, origin.y + size.y)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn top_left(&self) -> Vec2 {
        Vec2::new(self.left, self.top)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width(), self.height())
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.left + self.right) * 0.5,
            (self.top + self.bottom) * 0.5,
        )
    }

    /// Strict overlap test: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        self.left <= p.x && p.x <= self.right && self.top <= p.y && p.y <= self.bottom
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    pub fn extend_by(&self, margin: Margin) -> Rect {
        Rect::new(
            self.left - margin.left,
            self.top - margin.top,
            self.right + margin.right,
            self.bottom + margin.bottom,
        )
    }

    pub fn offset_by(&self, delta: Vec2) -> Rect {
        Rect::new(
            self.left + delta.x,
            self.top + delta.y,
            self.right + delta.x,
            self.bottom + delta.y,
        )
    }

    /// Whether the segment `a`-`b` passes through the interior of this rectangle.
    ///
    /// Liang-Barsky clipping; a segment that only grazes an edge does not count.
    pub fn intersects_segment(&self, a: Vec2, b: Vec2) -> bool {
        let d = b - a;
        let mut t0 = 0.0_f64;
        let mut t1 = 1.0_f64;
        let checks = [
            (-d.x, a.x - self.left),
            (d.x, self.right - a.x),
            (-d.y, a.y - self.top),
            (d.y, self.bottom - a.y),
        ];
        for (p, q) in checks {
            if p == 0.0 {
                if q <= 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return false;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return false;
                }
                t1 = t1.min(r);
            }
        }
        t0 < t1
    }
}

/// Smallest rectangle enclosing every input, or `None` for an empty input.
pub fn grouped_bounds<I>(rects: I) -> Option<Rect>
where
    I: IntoIterator<Item = Rect>,
{
    rects.into_iter().reduce(|acc, r| acc.union(&r))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoundingMethod {
    #[default]
    Round,
    Ceil,
    Floor,
}

impl RoundingMethod {
    fn apply(self, value: f64) -> f64 {
        match self {
            Self::Round => value.round(),
            Self::Ceil => value.ceil(),
            Self::Floor => value.floor(),
        }
    }
}

/// Rounds `value` to the nearest multiple of [`ALIGN_GRID`].
pub fn align_to_grid(value: f64) -> f64 {
    snap_to_grid(value, ALIGN_GRID, RoundingMethod::Round)
}

pub fn snap_to_grid(value: f64, grid: f64, method: RoundingMethod) -> f64 {
    if !(grid > 0.0) || !value.is_finite() {
        return value;
    }
    method.apply(value / grid) * grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&b.offset_by(Vec2::new(-1.0, 0.0))));
    }

    #[test]
    fn segment_clipping() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(r.intersects_segment(Vec2::new(0.0, 15.0), Vec2::new(30.0, 15.0)));
        assert!(!r.intersects_segment(Vec2::new(0.0, 10.0), Vec2::new(30.0, 10.0)));
        assert!(!r.intersects_segment(Vec2::new(0.0, 15.0), Vec2::new(5.0, 15.0)));
        assert!(r.intersects_segment(Vec2::new(0.0, 0.0), Vec2::new(30.0, 30.0)));
    }

    #[test]
    fn grid_rounding() {
        assert_eq!(align_to_grid(13.0), 16.0);
        assert_eq!(align_to_grid(11.0), 8.0);
        assert_eq!(snap_to_grid(9.0, 8.0, RoundingMethod::Ceil), 16.0);
        assert_eq!(snap_to_grid(15.0, 8.0, RoundingMethod::Floor), 8.0);
        assert_eq!(snap_to_grid(5.0, 0.0, RoundingMethod::Round), 5.0);
    }
}
