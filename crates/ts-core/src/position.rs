use std::fmt;

use serde::{Deserialize, Serialize};

/// A continuous point in world space. One grid cell spans one world unit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate (column axis).
    pub x: f64,
    /// Vertical coordinate (row axis).
    pub y: f64,
}

impl Position {
    /// Create a position from its coordinates.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance(self, other: Position) -> f64 {
        self.distance_sq(other).sqrt()
    }

    /// Squared Euclidean distance, for comparisons without a square root.
    pub fn distance_sq(self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Midpoint between two positions.
    pub fn midpoint(self, other: Position) -> Position {
        Position::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Move from `self` toward `target`, covering at most `max_distance`.
    pub fn step_toward(self, target: Position, max_distance: f64) -> Position {
        let dist = self.distance(target);
        if dist <= max_distance || dist == 0.0 {
            return target;
        }
        let scale = max_distance / dist;
        Position::new(
            self.x + (target.x - self.x) * scale,
            self.y + (target.y - self.y) * scale,
        )
    }

    /// Returns `true` if both coordinates are finite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}
