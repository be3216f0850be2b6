//! # Coordinate mapping
//!
//! The logical frame is centred on the agent's start point with Y up. The display frame has its
//! origin in the top left corner with Y down, and the logical origin sits at the configured
//! display centre:
//!
//! ```text
//! display = (origin_x + logical.x, origin_y - logical.y)
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::loc::Position;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the display frame.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayParams {
    /// X position of the logical origin in the display frame.
    pub origin_x: f64,

    /// Y position of the logical origin in the display frame.
    pub origin_y: f64,
}

/// Converts positions between the logical and display frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordMapper {
    origin_x: f64,
    origin_y: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for DisplayParams {
    fn default() -> Self {
        Self {
            origin_x: 300.0,
            origin_y: 300.0,
        }
    }
}

impl CoordMapper {
    pub fn new(params: &DisplayParams) -> Self {
        Self {
            origin_x: params.origin_x,
            origin_y: params.origin_y,
        }
    }

    /// Convert a logical position into the display frame.
    pub fn to_display(&self, logical: Position) -> Position {
        Position::new(self.origin_x + logical.x, self.origin_y - logical.y)
    }

    /// Convert a display position into the logical frame.
    pub fn to_logical(&self, display: Position) -> Position {
        Position::new(display.x - self.origin_x, self.origin_y - display.y)
    }
}

impl Default for CoordMapper {
    fn default() -> Self {
        Self::new(&DisplayParams::default())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_to_display() {
        let m = CoordMapper::default();

        assert_eq!(m.to_display(Position::origin()), Position::new(300.0, 300.0));
        assert_eq!(m.to_display(Position::new(20.0, 10.0)), Position::new(320.0, 290.0));
        assert_eq!(m.to_display(Position::new(-5.0, -50.0)), Position::new(295.0, 350.0));
    }

    #[test]
    fn test_round_trip() {
        let m = CoordMapper::new(&DisplayParams { origin_x: 12.5, origin_y: -400.25 });

        for &(x, y) in &[(0.0, 0.0), (1.0, -1.0), (1e6, 3.3e-3), (-271.828, 314.159)] {
            let p = Position::new(x, y);

            let back = m.to_logical(m.to_display(p));
            assert!((back.x - p.x).abs() < EPS && (back.y - p.y).abs() < EPS);

            let back = m.to_display(m.to_logical(p));
            assert!((back.x - p.x).abs() < EPS && (back.y - p.y).abs() < EPS);
        }
    }
}
