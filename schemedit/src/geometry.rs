//! Geometry primitives
//!
//! Points, vectors and the small amount of affine math the editor needs:
//! distances, 90° rotation, grid snapping and the symbol transform handed to
//! the sketcher.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Two positions closer than this are treated as the same point.
pub const POSITION_EPSILON: f64 = 1e-9;

/// Position in the schematic (schematic units, y up)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        (*self - *other).length()
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction, `None` for the zero vector.
    pub fn unit(&self) -> Option<Position> {
        let r = self.length();
        if r < POSITION_EPSILON {
            None
        } else {
            Some(*self / r)
        }
    }

    /// Rotate by -90° (clockwise with y up).
    pub fn rot90_cw(&self) -> Position {
        Position::new(self.y, -self.x)
    }

    /// Rotate counter-clockwise by `degrees`.
    pub fn rotate(&self, degrees: f64) -> Position {
        let (s, c) = degrees.to_radians().sin_cos();
        Position::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }

    pub fn midpoint(&self, other: &Position) -> Position {
        (*self + *other) / 2.0
    }

    /// Angle of this vector in degrees, measured from +x.
    pub fn angle_deg(&self) -> f64 {
        self.y.atan2(self.x).to_degrees()
    }

    pub fn coincides(&self, other: &Position) -> bool {
        self.distance_to(other) < POSITION_EPSILON
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Position::new(x, y)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", format_number(self.x), format_number(self.y))
    }
}

impl Add for Position {
    type Output = Position;
    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;
    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Position {
    type Output = Position;
    fn mul(self, rhs: f64) -> Position {
        Position::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Position {
    type Output = Position;
    fn div(self, rhs: f64) -> Position {
        Position::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Position {
    type Output = Position;
    fn neg(self) -> Position {
        Position::new(-self.x, -self.y)
    }
}

/// Round each axis to the nearest multiple of `spacing`, halves rounding up.
pub fn snap_to_grid(position: Position, spacing: f64) -> Position {
    if spacing <= 0.0 {
        return position;
    }
    let snap = |v: f64| ((v + 0.5 * spacing) / spacing).floor() * spacing;
    Position::new(snap(position.x), snap(position.y))
}

/// Format a coordinate or size without trailing zeros ("2", "0.5", "-1.25").
pub fn format_number(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        let s = format!("{:.6}", rounded);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Placement of a symbol sketch: translate to `offset`, rotate by `angle`
/// degrees, scale uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub offset: Position,
    pub angle: f64,
    pub scale: f64,
}

impl Transform {
    pub fn new(offset: Position, angle: f64, scale: f64) -> Self {
        Self { offset, angle, scale }
    }

    /// Map a point from symbol-local coordinates into the schematic.
    pub fn apply(&self, local: Position) -> Position {
        (local * self.scale).rotate(self.angle) + self.offset
    }

    /// Map a schematic point into symbol-local coordinates.
    pub fn invert(&self, world: Position) -> Position {
        let scale = if self.scale.abs() < POSITION_EPSILON { 1.0 } else { self.scale };
        (world - self.offset).rotate(-self.angle) / scale
    }
}

/// Pose of a component derived from its body terminals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub midpoint: Position,
    /// Degrees from +x, direction first body terminal -> second.
    pub angle: f64,
    pub length: f64,
    pub scale: f64,
}

impl Pose {
    pub fn from_endpoints(p1: Position, p2: Position, scale: f64) -> Self {
        let d = p2 - p1;
        Self {
            midpoint: p1.midpoint(&p2),
            angle: d.angle_deg(),
            length: d.length(),
            scale,
        }
    }

    /// Transform that maps the body-local frame (x along the body axis,
    /// origin at the midpoint) into the schematic, without scaling.
    pub fn frame(&self) -> Transform {
        Transform::new(self.midpoint, self.angle, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let p1 = Position::new(0.0, 0.0);
        let p2 = Position::new(3.0, 4.0);
        assert!((p1.distance_to(&p2) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_rot90_cw() {
        let up = Position::new(0.0, 1.0);
        assert_eq!(up.rot90_cw(), Position::new(1.0, 0.0));
        let right = Position::new(1.0, 0.0);
        assert_eq!(right.rot90_cw(), Position::new(0.0, -1.0));
    }

    #[test]
    fn test_snap_rounds_half_up() {
        assert_eq!(snap_to_grid(Position::new(0.5, -0.5), 1.0), Position::new(1.0, 0.0));
        assert_eq!(snap_to_grid(Position::new(1.49, 2.51), 1.0), Position::new(1.0, 3.0));
        assert_eq!(snap_to_grid(Position::new(3.0, 1.1), 2.0), Position::new(4.0, 2.0));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(1.25), "1.25");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
    }

    #[test]
    fn test_transform_roundtrip() {
        let tf = Transform::new(Position::new(1.0, 2.0), 90.0, 2.0);
        let local = Position::new(0.5, 0.0);
        let world = tf.apply(local);
        assert!(world.distance_to(&Position::new(1.0, 3.0)) < 1e-9);
        assert!(tf.invert(world).distance_to(&local) < 1e-9);
    }

    #[test]
    fn test_pose() {
        let pose = Pose::from_endpoints(Position::new(0.0, 0.0), Position::new(0.0, 4.0), 1.0);
        assert_eq!(pose.midpoint, Position::new(0.0, 2.0));
        assert!((pose.angle - 90.0).abs() < 1e-9);
        assert!((pose.length - 4.0).abs() < 1e-12);
    }
}
