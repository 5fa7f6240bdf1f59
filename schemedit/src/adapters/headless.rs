//! Headless adapters
//!
//! A sketcher that records primitives instead of drawing them, a notifier
//! that collects messages, and an analysis backend that echoes requests.
//! Clones share state so a caller can hand one clone to the editor and
//! inspect the other.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use super::analysis::{AnalysisBackend, AnalysisError, AnalysisRequest};
use super::{DrawHandle, Notifier, Sketcher, StrokeStyle};
use crate::geometry::{Position, Transform};

/// A recorded drawing primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Line { from: Position, to: Position },
    Circle { center: Position, radius: f64, filled: bool },
    Text { position: Position, text: String },
    Symbol { name: String, transform: Transform },
}

#[derive(Debug, Default)]
struct SketchLog {
    items: IndexMap<DrawHandle, Primitive>,
    refreshes: usize,
}

/// Sketcher that keeps what is currently drawn
#[derive(Debug, Clone, Default)]
pub struct HeadlessSketcher {
    log: Rc<RefCell<SketchLog>>,
}

impl HeadlessSketcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primitives currently on the surface, in drawing order.
    pub fn primitives(&self) -> Vec<Primitive> {
        self.log.borrow().items.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.log.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn texts(&self) -> Vec<String> {
        self.log
            .borrow()
            .items
            .values()
            .filter_map(|p| match p {
                Primitive::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.log
            .borrow()
            .items
            .values()
            .filter_map(|p| match p {
                Primitive::Symbol { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn refresh_count(&self) -> usize {
        self.log.borrow().refreshes
    }

    fn record(&mut self, primitive: Primitive) -> DrawHandle {
        let handle = DrawHandle::new();
        self.log.borrow_mut().items.insert(handle, primitive);
        handle
    }
}

impl Sketcher for HeadlessSketcher {
    fn stroke_line(&mut self, from: Position, to: Position, _style: &StrokeStyle) -> DrawHandle {
        self.record(Primitive::Line { from, to })
    }

    fn stroke_circle(&mut self, center: Position, radius: f64, _style: &StrokeStyle) -> DrawHandle {
        self.record(Primitive::Circle {
            center,
            radius,
            filled: false,
        })
    }

    fn stroke_filled_circle(
        &mut self,
        center: Position,
        radius: f64,
        _style: &StrokeStyle,
    ) -> DrawHandle {
        self.record(Primitive::Circle {
            center,
            radius,
            filled: true,
        })
    }

    fn text(&mut self, position: Position, text: &str, _size: f64) -> DrawHandle {
        self.record(Primitive::Text {
            position,
            text: text.to_string(),
        })
    }

    fn sketch(&mut self, symbol: &str, transform: Transform, _style: &StrokeStyle) -> DrawHandle {
        self.record(Primitive::Symbol {
            name: symbol.to_string(),
            transform,
        })
    }

    fn remove(&mut self, handle: DrawHandle) {
        self.log.borrow_mut().items.shift_remove(&handle);
    }

    fn clear(&mut self) {
        self.log.borrow_mut().items.clear();
    }

    fn refresh(&mut self) {
        self.log.borrow_mut().refreshes += 1;
    }
}

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// Notifier that collects messages
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Rc<RefCell<Vec<(Level, String)>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.borrow().clone()
    }

    pub fn at_level(&self, level: Level) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.at_level(Level::Warning)
    }

    pub fn errors(&self) -> Vec<String> {
        self.at_level(Level::Error)
    }

    pub fn last(&self) -> Option<(Level, String)> {
        self.messages.borrow().last().cloned()
    }

    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
    }

    fn push(&mut self, level: Level, message: &str) {
        self.messages.borrow_mut().push((level, message.to_string()));
    }
}

impl Notifier for MessageLog {
    fn info(&mut self, message: &str) {
        self.push(Level::Info, message);
    }

    fn warning(&mut self, message: &str) {
        self.push(Level::Warning, message);
    }

    fn error(&mut self, message: &str) {
        self.push(Level::Error, message);
    }
}

/// Backend that answers every request with its own description, e.g.
/// `V(R1)`, and remembers the netlists it was given.
#[derive(Debug, Clone, Default)]
pub struct EchoBackend {
    seen: Arc<Mutex<Vec<String>>>,
}

impl EchoBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Netlists received so far.
    pub fn netlists(&self) -> Vec<String> {
        match self.seen.lock() {
            Ok(seen) => seen.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AnalysisBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn evaluate(&self, netlist: &str, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        match self.seen.lock() {
            Ok(mut seen) => seen.push(netlist.to_string()),
            Err(poisoned) => poisoned.into_inner().push(netlist.to_string()),
        }
        Ok(request.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sketcher_remove_and_clear() {
        let mut sketcher = HeadlessSketcher::new();
        let observer = sketcher.clone();
        let line = sketcher.stroke_line(Position::origin(), Position::new(1.0, 0.0), &StrokeStyle::default());
        sketcher.text(Position::origin(), "R1", 1.0);
        assert_eq!(observer.len(), 2);
        sketcher.remove(line);
        assert_eq!(observer.texts(), vec!["R1"]);
        sketcher.clear();
        assert!(observer.is_empty());
    }

    #[test]
    fn test_message_log_levels() {
        let mut log = MessageLog::new();
        let observer = log.clone();
        log.info("loaded");
        log.warning("too close");
        log.error("boom");
        assert_eq!(observer.warnings(), vec!["too close"]);
        assert_eq!(observer.last(), Some((Level::Error, "boom".to_string())));
    }
}
