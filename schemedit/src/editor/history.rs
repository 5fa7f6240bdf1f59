//! Undo/redo history
//!
//! Every mutating user action pushes exactly one reversible record. A new
//! record discards the redo stack; the undo stack is capped at the
//! configured depth, dropping the oldest record first.

use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, ComponentDef};
use crate::core::SchematicError;
use crate::geometry::Position;

/// Terminal bindings of one component before and after a move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveEntry {
    pub component: String,
    /// (node, position) per terminal.
    pub before: Vec<(String, Position)>,
    pub after: Vec<(String, Position)>,
}

impl MoveEntry {
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }
}

/// A reversible edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HistoryEvent {
    Add(ComponentDef),
    Delete(ComponentDef),
    /// Node moves, including any rebinding done by joins, splits and
    /// detaches in the same gesture.
    Move(Vec<MoveEntry>),
    /// Property edit of a single component (name, kind, value, control).
    Modify { before: ComponentDef, after: ComponentDef },
}

impl HistoryEvent {
    pub fn describe(&self) -> String {
        match self {
            HistoryEvent::Add(def) => format!("add {}", def.component.name),
            HistoryEvent::Delete(def) => format!("delete {}", def.component.name),
            HistoryEvent::Move(entries) => {
                let names: Vec<&str> = entries.iter().map(|e| e.component.as_str()).collect();
                format!("move {}", names.join(", "))
            }
            HistoryEvent::Modify { after, .. } => format!("edit {}", after.component.name),
        }
    }

    /// Reverse this event on `circuit`.
    pub fn undo(&self, circuit: &mut Circuit) -> Result<(), SchematicError> {
        match self {
            HistoryEvent::Add(def) => circuit.remove_component(&def.component.name).map(|_| ()),
            HistoryEvent::Delete(def) => circuit.restore_def(def),
            HistoryEvent::Move(entries) => circuit.apply_terminal_states(&states(entries, |e| &e.before)),
            HistoryEvent::Modify { before, after } => apply_fields(circuit, after, before),
        }
    }

    /// Apply this event again on `circuit`.
    pub fn redo(&self, circuit: &mut Circuit) -> Result<(), SchematicError> {
        match self {
            HistoryEvent::Add(def) => circuit.restore_def(def),
            HistoryEvent::Delete(def) => circuit.remove_component(&def.component.name).map(|_| ()),
            HistoryEvent::Move(entries) => circuit.apply_terminal_states(&states(entries, |e| &e.after)),
            HistoryEvent::Modify { before, after } => apply_fields(circuit, before, after),
        }
    }
}

fn states<'a>(
    entries: &'a [MoveEntry],
    pick: impl Fn(&'a MoveEntry) -> &'a Vec<(String, Position)>,
) -> Vec<(String, Vec<(String, Position)>)> {
    entries
        .iter()
        .map(|e| (e.component.clone(), pick(e).clone()))
        .collect()
}

fn apply_fields(circuit: &mut Circuit, from: &ComponentDef, to: &ComponentDef) -> Result<(), SchematicError> {
    let (old, new) = (&from.component.name, &to.component.name);
    if old != new {
        circuit.rename_component(old, new)?;
    }
    let component = circuit
        .component_mut(new)
        .ok_or_else(|| SchematicError::not_found("component", new.as_str()))?;
    component.kind = to.component.kind.clone();
    component.value = to.component.value.clone();
    component.control = to.component.control.clone();
    component.attributes = to.component.attributes.clone();
    circuit.recompute_visibility_flags();
    Ok(())
}

/// Undo and redo stacks
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<HistoryEvent>,
    redo_stack: Vec<HistoryEvent>,
    max_depth: usize,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Record a completed edit.
    pub fn push(&mut self, event: HistoryEvent) {
        tracing::debug!("History: {}", event.describe());
        self.undo_stack.push(event);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
    }

    /// Undo the most recent edit. Returns the reversed event, or `None` when
    /// there is nothing to undo. On failure the record stays on the undo
    /// stack and `circuit` is unchanged.
    pub fn undo(&mut self, circuit: &mut Circuit) -> Result<Option<&HistoryEvent>, SchematicError> {
        let Some(event) = self.undo_stack.pop() else {
            return Ok(None);
        };
        let mut scratch = circuit.clone();
        if let Err(e) = event.undo(&mut scratch) {
            self.undo_stack.push(event);
            return Err(e);
        }
        *circuit = scratch;
        self.redo_stack.push(event);
        Ok(self.redo_stack.last())
    }

    pub fn redo(&mut self, circuit: &mut Circuit) -> Result<Option<&HistoryEvent>, SchematicError> {
        let Some(event) = self.redo_stack.pop() else {
            return Ok(None);
        };
        let mut scratch = circuit.clone();
        if let Err(e) = event.redo(&mut scratch) {
            self.redo_stack.push(event);
            return Err(e);
        }
        *circuit = scratch;
        self.undo_stack.push(event);
        Ok(self.undo_stack.last())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_size(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_size(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth.max(1);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
    }

    pub fn last(&self) -> Option<&HistoryEvent> {
        self.undo_stack.last()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Component, ComponentType};

    fn resistor_def(name: &str, a: &str, b: &str) -> ComponentDef {
        ComponentDef {
            component: Component::new(name, ComponentType::Resistor, vec![a.into(), b.into()]),
            terminals: vec![
                (a.to_string(), Some(Position::new(0.0, 0.0))),
                (b.to_string(), Some(Position::new(0.0, 4.0))),
            ],
        }
    }

    #[test]
    fn test_undo_redo_add() {
        let mut circuit = Circuit::new();
        let mut history = History::default();
        let def = resistor_def("R1", "1", "2");
        circuit.restore_def(&def).unwrap();
        history.push(HistoryEvent::Add(def));

        assert!(history.undo(&mut circuit).unwrap().is_some());
        assert!(circuit.is_empty());
        assert_eq!(circuit.node_count(), 0);
        assert!(history.can_redo());

        history.redo(&mut circuit).unwrap();
        assert_eq!(circuit.node("2").unwrap().position, Some(Position::new(0.0, 4.0)));
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut circuit = Circuit::new();
        let mut history = History::default();
        assert!(history.undo(&mut circuit).unwrap().is_none());
        assert!(history.redo(&mut circuit).unwrap().is_none());
    }

    #[test]
    fn test_push_clears_redo_and_caps_depth() {
        let mut circuit = Circuit::new();
        let mut history = History::new(2);
        for (i, name) in ["R1", "R2", "R3"].iter().enumerate() {
            let a = format!("{}", 2 * i + 1);
            let b = format!("{}", 2 * i + 2);
            let def = resistor_def(name, &a, &b);
            circuit.restore_def(&def).unwrap();
            history.push(HistoryEvent::Add(def));
        }
        assert_eq!(history.undo_size(), 2);

        history.undo(&mut circuit).unwrap();
        assert_eq!(history.redo_size(), 1);
        history.push(HistoryEvent::Delete(resistor_def("R9", "8", "9")));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_failed_move_undo_leaves_circuit_unchanged() {
        let mut circuit = Circuit::new();
        circuit.restore_def(&resistor_def("R1", "1", "2")).unwrap();
        let snapshot = circuit.clone();
        let mut history = History::default();
        history.push(HistoryEvent::Move(vec![
            MoveEntry {
                component: "R1".to_string(),
                before: vec![
                    ("5".to_string(), Position::new(8.0, 0.0)),
                    ("2".to_string(), Position::new(0.0, 4.0)),
                ],
                after: vec![
                    ("1".to_string(), Position::new(0.0, 0.0)),
                    ("2".to_string(), Position::new(0.0, 4.0)),
                ],
            },
            MoveEntry {
                component: "R7".to_string(),
                before: vec![("3".to_string(), Position::new(4.0, 0.0))],
                after: vec![("3".to_string(), Position::new(4.0, 4.0))],
            },
        ]));

        assert!(history.undo(&mut circuit).is_err());

        assert_eq!(circuit, snapshot);
        assert!(circuit.node("5").is_none());
        assert_eq!(history.undo_size(), 1);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_failed_undo_keeps_record() {
        let mut circuit = Circuit::new();
        let mut history = History::default();
        history.push(HistoryEvent::Add(resistor_def("R1", "1", "2")));
        assert!(history.undo(&mut circuit).is_err());
        assert_eq!(history.undo_size(), 1);
    }
}
