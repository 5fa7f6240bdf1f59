//! Adapters to the outside world
//!
//! The editor never talks to a toolkit or a solver directly. It draws
//! through a [`Sketcher`], reports through a [`Notifier`] and asks for
//! analysis through an [`analysis::AnalysisBackend`]. Headless
//! implementations of the first two live in [`headless`].

pub mod analysis;
pub mod headless;

use uuid::Uuid;

use crate::geometry::{Position, Transform};

/// Handle to something drawn, used to undraw it later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawHandle(Uuid);

impl DrawHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DrawHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Stroke appearance
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f64,
    pub dashed: bool,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: "black".to_string(),
            width: 2.0,
            dashed: false,
        }
    }
}

impl StrokeStyle {
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn dashed(mut self) -> Self {
        self.dashed = true;
        self
    }
}

/// Drawing surface
pub trait Sketcher {
    fn stroke_line(&mut self, from: Position, to: Position, style: &StrokeStyle) -> DrawHandle;

    fn stroke_circle(&mut self, center: Position, radius: f64, style: &StrokeStyle) -> DrawHandle;

    fn stroke_filled_circle(
        &mut self,
        center: Position,
        radius: f64,
        style: &StrokeStyle,
    ) -> DrawHandle;

    fn text(&mut self, position: Position, text: &str, size: f64) -> DrawHandle;

    /// Draw a named symbol sketch placed by `transform`.
    fn sketch(&mut self, symbol: &str, transform: Transform, style: &StrokeStyle) -> DrawHandle;

    /// Undraw one item. Unknown handles are ignored.
    fn remove(&mut self, handle: DrawHandle);

    fn clear(&mut self);

    /// Flush pending drawing to the screen.
    fn refresh(&mut self);
}

/// User-visible messages
pub trait Notifier {
    fn info(&mut self, message: &str);
    fn warning(&mut self, message: &str);
    fn error(&mut self, message: &str);
}
