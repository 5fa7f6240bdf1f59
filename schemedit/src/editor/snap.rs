//! Pointer snapping
//!
//! Candidates are tried in order and the first that applies wins:
//! an existing node (only when asked), an existing cursor, axis alignment
//! with the most recent cursor, the grid, and finally the raw position.

use crate::circuit::Circuit;
use crate::editor::cursor::Cursors;
use crate::geometry::{snap_to_grid, Position};

/// Inputs to a snap
#[derive(Debug, Clone, Copy)]
pub struct Snapper<'a> {
    pub circuit: &'a Circuit,
    pub cursors: &'a Cursors,
    pub threshold: f64,
    /// Grid spacing, `None` when grid snapping is off.
    pub grid: Option<f64>,
}

impl<'a> Snapper<'a> {
    pub fn snap(&self, position: Position, snap_to_component: bool) -> Position {
        if snap_to_component {
            if let Some(p) = self
                .circuit
                .closest_node(position, self.threshold)
                .and_then(|n| n.position)
            {
                return p;
            }
        }

        if let Some(p) = self.cursors.near(position, self.threshold) {
            return p;
        }

        if let Some(aligned) = self.align(position) {
            return aligned;
        }

        match self.grid {
            Some(spacing) => snap_to_grid(position, spacing),
            None => position,
        }
    }

    /// Align each axis with the last cursor when within the threshold. The
    /// other axis still goes to the grid.
    fn align(&self, position: Position) -> Option<Position> {
        let anchor = self.cursors.last()?.position;
        let x_aligned = (position.x - anchor.x).abs() < self.threshold;
        let y_aligned = (position.y - anchor.y).abs() < self.threshold;
        if !x_aligned && !y_aligned {
            return None;
        }
        let gridded = match self.grid {
            Some(spacing) => snap_to_grid(position, spacing),
            None => position,
        };
        Some(Position::new(
            if x_aligned { anchor.x } else { gridded.x },
            if y_aligned { anchor.y } else { gridded.y },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::ComponentType;

    #[test]
    fn test_snap_order() {
        let mut circuit = Circuit::new();
        circuit.add_component(ComponentType::Resistor, "", &["1", "2"]).unwrap();
        circuit.set_node_position("1", Position::new(0.0, 0.0)).unwrap();
        circuit.set_node_position("2", Position::new(0.0, 4.0)).unwrap();
        let mut cursors = Cursors::new();
        cursors.place(Position::new(3.0, 3.0));
        let snapper = Snapper {
            circuit: &circuit,
            cursors: &cursors,
            threshold: 0.3,
            grid: Some(1.0),
        };

        // Node only when requested.
        assert_eq!(snapper.snap(Position::new(0.1, 3.9), true), Position::new(0.0, 4.0));
        assert_eq!(snapper.snap(Position::new(0.1, 3.9), false), Position::new(0.0, 4.0));
        assert_eq!(snapper.snap(Position::new(0.2, 0.1), true), Position::new(0.0, 0.0));

        // Cursor.
        assert_eq!(snapper.snap(Position::new(3.1, 2.9), false), Position::new(3.0, 3.0));
        // Alignment on x, grid on y.
        assert_eq!(snapper.snap(Position::new(3.2, 7.4), false), Position::new(3.0, 7.0));
        // Grid.
        assert_eq!(snapper.snap(Position::new(5.6, 7.4), false), Position::new(6.0, 7.0));
    }

    #[test]
    fn test_raw_without_grid() {
        let circuit = Circuit::new();
        let cursors = Cursors::new();
        let snapper = Snapper {
            circuit: &circuit,
            cursors: &cursors,
            threshold: 0.3,
            grid: None,
        };
        assert_eq!(snapper.snap(Position::new(1.23, 4.56), false), Position::new(1.23, 4.56));
    }
}
