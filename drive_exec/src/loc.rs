//! # Localisation types

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A point in a 2D frame.
///
/// The frame (logical or display) is implied by whoever produced the position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The origin of the frame.
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Returns true if both components are finite.
    pub fn is_finite(&self) -> bool {
        util::maths::all_finite(&[self.x, self.y])
    }

    /// Euclidian distance to another position in the same frame.
    pub fn distance_to(&self, other: &Position) -> f64 {
        (other.to_vector() - self.to_vector()).norm()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<Vector2<f64>> for Position {
    fn from(v: Vector2<f64>) -> Self {
        Self::new(v.x, v.y)
    }
}

impl From<(i32, i32)> for Position {
    fn from(p: (i32, i32)) -> Self {
        Self::new(p.0 as f64, p.1 as f64)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}
