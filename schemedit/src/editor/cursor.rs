//! Placement cursors and the crosshair

use crate::circuit::Thing;
use crate::geometry::Position;

/// A placement cursor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    pub position: Position,
}

impl Cursor {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

/// Up to two placement cursors. The first marks where a new component
/// starts, the second where it ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursors {
    items: Vec<Cursor>,
}

impl Cursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cursor> {
        self.items.iter()
    }

    /// The most recently placed cursor.
    pub fn last(&self) -> Option<&Cursor> {
        self.items.last()
    }

    /// Both cursor positions once two are placed.
    pub fn pair(&self) -> Option<(Position, Position)> {
        match self.items.as_slice() {
            [first, second] => Some((first.position, second.position)),
            _ => None,
        }
    }

    /// Add a cursor. With two already placed, a click closer to the first
    /// replaces the second; otherwise the second becomes the first and the
    /// click becomes the second.
    pub fn place(&mut self, position: Position) {
        let cursor = Cursor::new(position);
        if self.items.len() < 2 {
            self.items.push(cursor);
            return;
        }
        let to_first = position.distance_to(&self.items[0].position);
        let to_second = position.distance_to(&self.items[1].position);
        if to_first < to_second {
            self.items[1] = cursor;
        } else {
            self.items[0] = self.items[1];
            self.items[1] = cursor;
        }
    }

    /// Replace both cursors.
    pub fn set_pair(&mut self, first: Position, second: Position) {
        self.items = vec![Cursor::new(first), Cursor::new(second)];
    }

    /// Position of a cursor within `radius` of `position`.
    pub fn near(&self, position: Position, radius: f64) -> Option<Position> {
        self.items
            .iter()
            .map(|c| c.position)
            .find(|p| p.distance_to(&position) < radius)
    }
}

/// Pointer crosshair, optionally carrying a thing waiting to be placed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossHair {
    pub position: Position,
    thing: Option<Thing>,
}

impl CrossHair {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, thing: Thing) {
        self.thing = Some(thing);
    }

    pub fn disarm(&mut self) -> Option<Thing> {
        self.thing.take()
    }

    pub fn thing(&self) -> Option<&Thing> {
        self.thing.as_ref()
    }

    pub fn is_armed(&self) -> bool {
        self.thing.is_some()
    }

    pub fn update(&mut self, position: Position) {
        self.position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacement_rule() {
        let mut cursors = Cursors::new();
        cursors.place(Position::new(0.0, 0.0));
        cursors.place(Position::new(4.0, 0.0));

        // Closer to the first: second replaced.
        cursors.place(Position::new(1.0, 0.0));
        assert_eq!(cursors.pair(), Some((Position::new(0.0, 0.0), Position::new(1.0, 0.0))));

        // Closer to the second: second shifts to first.
        cursors.place(Position::new(2.0, 0.0));
        assert_eq!(cursors.pair(), Some((Position::new(1.0, 0.0), Position::new(2.0, 0.0))));
    }

    #[test]
    fn test_near() {
        let mut cursors = Cursors::new();
        cursors.place(Position::new(2.0, 2.0));
        assert_eq!(cursors.near(Position::new(2.1, 2.0), 0.3), Some(Position::new(2.0, 2.0)));
        assert_eq!(cursors.near(Position::new(3.0, 2.0), 0.3), None);
    }
}
