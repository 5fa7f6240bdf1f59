//! Interactive editor
//!
//! [`Editor`] owns the circuit, the undo history and all interaction state
//! (cursors, crosshair, selection) and turns pointer and key gestures into
//! store edits. It draws through a [`Sketcher`] and reports through a
//! [`Notifier`]; both are handed in at construction.
//!
//! Gesture handlers (`on_*`) never fail. Errors are reported through the
//! notifier, the gesture is rolled back and the editor returns to
//! [`EditorState::Idle`]. The named operations underneath them return
//! `Result` and can be driven directly.
//!
//! Every successful mutating operation pushes exactly one
//! [`HistoryEvent`].

pub mod cursor;
pub mod history;
pub mod keymap;
pub mod render;
pub mod snap;

pub use cursor::{CrossHair, Cursor, Cursors};
pub use history::{History, HistoryEvent, MoveEntry};
pub use keymap::{Command, KeyBinding};
pub use render::{DrawIssue, Drawings, Renderer};
pub use snap::Snapper;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::analysis::{
    analysis_netlist, AnalysisCompletion, AnalysisDispatcher, AnalysisError, AnalysisRequest, Quantity,
};
use crate::adapters::{Notifier, Sketcher};
use crate::circuit::{Circuit, Component, ComponentDef, ComponentType, Thing};
use crate::core::{load_schematic, save_schematic, schematic_text, SchematicError};
use crate::geometry::{snap_to_grid, Position};
use crate::preferences::{EditMode, EditorConfig, Preferences};

/// Padding around the circuit for [`Editor::best_fit`].
const VIEW_MARGIN: f64 = 2.0;

/// Terminal (node, position) pairs per component.
type TerminalStates = Vec<(String, Vec<(String, Position)>)>;

/// What is selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected {
    Node(String),
    Component(String),
}

impl Selected {
    pub fn name(&self) -> &str {
        match self {
            Selected::Node(name) | Selected::Component(name) => name,
        }
    }
}

impl std::fmt::Display for Selected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selected::Node(name) => write!(f, "node {}", name),
            Selected::Component(name) => write!(f, "component {}", name),
        }
    }
}

/// Context menu requested by a right click
#[derive(Debug, Clone, PartialEq)]
pub enum ContextMenu {
    Component(String),
    Node(String),
    /// Nothing under the pointer and the clipboard is full.
    Paste { at: Position },
}

/// An in-progress node or component drag
#[derive(Debug, Clone, PartialEq)]
pub struct Drag {
    /// Nodes following the pointer, with their positions at mouse-down.
    pub nodes: Vec<(String, Position)>,
    /// Snapped pointer position at mouse-down.
    pub origin: Position,
    /// Terminal states of every affected component at mouse-down.
    pub before: Vec<(String, Vec<(String, Position)>)>,
}

/// Interaction state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditorState {
    #[default]
    Idle,
    /// One cursor placed.
    CursorAdd,
    /// Two cursors placed; a component key creates between them.
    CursorReady,
    /// A component key armed the crosshair (drag-to-place).
    Armed,
    /// Mouse is down on a component being placed.
    Placing { component: String, anchor: Position },
    Dragging(Drag),
}

/// The schematic editor
pub struct Editor {
    circuit: Circuit,
    history: History,
    preferences: Preferences,
    cursors: Cursors,
    crosshair: CrossHair,
    selected: Option<Selected>,
    state: EditorState,
    clipboard: Option<ComponentDef>,
    sketcher: Box<dyn Sketcher>,
    notifier: Box<dyn Notifier>,
    analysis: Option<AnalysisDispatcher>,
    drawings: Drawings,
    filename: Option<PathBuf>,
    dirty: bool,
}

impl Editor {
    pub fn new(sketcher: Box<dyn Sketcher>, notifier: Box<dyn Notifier>) -> Self {
        let preferences = Preferences::default();
        Self {
            circuit: Circuit::new(),
            history: History::new(preferences.undo_depth),
            preferences,
            cursors: Cursors::new(),
            crosshair: CrossHair::new(),
            selected: None,
            state: EditorState::Idle,
            clipboard: None,
            sketcher,
            notifier,
            analysis: None,
            drawings: Drawings::default(),
            filename: None,
            dirty: false,
        }
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.set_preferences(preferences);
        self
    }

    /// Enable inspection through `dispatcher`.
    pub fn with_analysis(mut self, dispatcher: AnalysisDispatcher) -> Self {
        self.analysis = Some(dispatcher);
        self
    }

    /// Start from an existing circuit. History starts empty.
    pub fn with_circuit(mut self, circuit: Circuit) -> Self {
        self.circuit = circuit;
        self.history.clear();
        self.redraw();
        self
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn cursors(&self) -> &Cursors {
        &self.cursors
    }

    pub fn crosshair(&self) -> &CrossHair {
        &self.crosshair
    }

    pub fn selected(&self) -> Option<&Selected> {
        self.selected.as_ref()
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn clipboard(&self) -> Option<&ComponentDef> {
        self.clipboard.as_ref()
    }

    pub fn drawings(&self) -> &Drawings {
        &self.drawings
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// True when there are edits not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mode(&self) -> EditMode {
        self.preferences.mode
    }

    /// Replace the preferences and redraw.
    pub fn set_preferences(&mut self, preferences: Preferences) {
        self.history.set_max_depth(preferences.undo_depth);
        self.preferences = preferences;
        self.redraw();
    }

    // ====================================================================
    // Gestures
    // ====================================================================

    /// Left click: select what is under the pointer and place cursors.
    pub fn on_left_click(&mut self, position: Position) {
        if !matches!(
            self.state,
            EditorState::Idle | EditorState::CursorAdd | EditorState::CursorReady
        ) {
            return;
        }

        match self.select_at(position) {
            Some(Selected::Component(name)) => {
                let endpoints = self.circuit.component(&name).and_then(|c| {
                    let positions = self.circuit.terminal_positions(&name)?;
                    c.ctype.body_endpoints(&positions)
                });
                if let Some((p1, p2)) = endpoints {
                    debug!("Selected {}", name);
                    self.cursors.set_pair(p1, p2);
                    self.state = EditorState::CursorReady;
                }
            }
            Some(Selected::Node(name)) => {
                if let Some(p) = self.circuit.node(&name).and_then(|n| n.position) {
                    self.add_cursor(p);
                }
            }
            None => {
                let p = self.snap(position, false);
                self.add_cursor(p);
            }
        }
        self.draw_cursors();
        self.sketcher.refresh();
    }

    /// Right click. Cancels a cursor or placement sequence; otherwise
    /// selects under the pointer and returns the menu to show.
    pub fn on_right_click(&mut self, position: Position) -> Option<ContextMenu> {
        if self.state != EditorState::Idle {
            self.cancel();
            self.sketcher.refresh();
            return None;
        }

        match self.select_at(position) {
            Some(Selected::Component(name)) => Some(ContextMenu::Component(name)),
            Some(Selected::Node(name)) => Some(ContextMenu::Node(name)),
            None if self.clipboard.is_some() => Some(ContextMenu::Paste {
                at: self.snap(position, false),
            }),
            None => None,
        }
    }

    /// Mouse button pressed. Armed: start placing the pending thing. Idle in
    /// drag-to-place mode: start dragging the node or component under the
    /// pointer; `shift` first detaches the component from its neighbours.
    pub fn on_mouse_down(&mut self, position: Position, shift: bool) {
        let result = match self.state {
            EditorState::Armed => self.begin_placing(position),
            EditorState::Idle if self.preferences.mode == EditMode::DragToPlace => {
                self.begin_drag(position, shift)
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            self.report(e);
        }
        self.sketcher.refresh();
    }

    /// Pointer moved with no button down.
    pub fn on_mouse_move(&mut self, position: Position) {
        let position = match self.grid() {
            Some(spacing) => snap_to_grid(position, spacing),
            None => position,
        };
        self.crosshair.update(position);
        if self.crosshair.is_armed() {
            self.draw_crosshair();
            self.sketcher.refresh();
        }
    }

    /// Pointer moved with the button down.
    pub fn on_mouse_drag(&mut self, position: Position) {
        if let Err(e) = self.drag_to(position) {
            self.report(e);
        }
        self.sketcher.refresh();
    }

    /// Mouse button released: finish a placement or drag.
    pub fn on_mouse_release(&mut self, position: Position) {
        if let Err(e) = self.drag_to(position) {
            self.report(e);
            self.sketcher.refresh();
            return;
        }

        match std::mem::take(&mut self.state) {
            EditorState::Placing { component, .. } => match self.finish_placing(&component) {
                Ok(true) => {
                    self.crosshair.disarm();
                    self.draw_crosshair();
                }
                Ok(false) => self.state = EditorState::Armed,
                Err(e) => {
                    if self.circuit.component(&component).is_some() {
                        self.discard(&component);
                    }
                    self.report(e);
                }
            },
            EditorState::Dragging(drag) => {
                if let Err(e) = self.finish_drag(&drag) {
                    if let Err(restore) = self.circuit.apply_terminal_states(&drag.before) {
                        tracing::error!("Could not restore drag start: {}", restore);
                    }
                    self.redraw();
                    self.report(e);
                }
            }
            other => self.state = other,
        }
        self.sketcher.refresh();
    }

    /// Key press: editing chords, then component and connection keys.
    pub fn on_key(&mut self, key: &str) {
        if let Some(command) = keymap::command_for_key(key) {
            if let Err(e) = self.run_command(command) {
                self.report(e);
            }
            self.sketcher.refresh();
            return;
        }

        let Some(thing) = keymap::thing_for_key(key) else {
            debug!("Unbound key {}", key);
            return;
        };

        match self.preferences.mode {
            EditMode::TwoCursor => {
                let Some((p1, p2)) = self.cursors.pair() else {
                    let message = if self.cursors.is_empty() {
                        "To add component, first create nodes by clicking on grid"
                    } else {
                        "To add component, add negative node by clicking on grid"
                    };
                    self.notifier.info(message);
                    return;
                };
                match self.thing_create(&thing, p1, p2) {
                    Ok(_) => {
                        self.cursors.clear();
                        self.state = EditorState::Idle;
                        self.draw_cursors();
                    }
                    Err(e) => self.report(e),
                }
            }
            EditMode::DragToPlace => {
                if matches!(self.state, EditorState::Idle | EditorState::Armed) {
                    debug!("Armed with {} {}", thing.ctype, thing.kind);
                    self.crosshair.arm(thing);
                    self.state = EditorState::Armed;
                    self.draw_crosshair();
                }
            }
        }
        self.sketcher.refresh();
    }

    fn run_command(&mut self, command: Command) -> Result<(), SchematicError> {
        match command {
            Command::Undo => self.undo().map(|_| ()),
            Command::Redo => self.redo().map(|_| ()),
            Command::Escape => {
                self.cancel();
                self.selected = None;
                Ok(())
            }
            Command::Delete => self.delete_selected().map(|_| ()),
            Command::Copy => {
                self.copy_selected();
                Ok(())
            }
            Command::Cut => self.cut_selected().map(|_| ()),
            Command::Paste => self.paste().map(|_| ()),
        }
    }

    /// Abandon the current gesture, undoing whatever it did to the store,
    /// and return to idle.
    pub fn cancel(&mut self) {
        match std::mem::take(&mut self.state) {
            EditorState::Placing { component, .. } => self.discard(&component),
            EditorState::Dragging(drag) => {
                if let Err(e) = self.circuit.apply_terminal_states(&drag.before) {
                    tracing::error!("Could not restore drag start: {}", e);
                }
                self.redraw();
            }
            _ => {}
        }
        self.cursors.clear();
        self.crosshair.disarm();
        self.draw_cursors();
        self.draw_crosshair();
    }

    fn report(&mut self, error: SchematicError) {
        warn!("{}", error);
        self.notifier.error(&error.to_string());
        self.cancel();
    }

    fn add_cursor(&mut self, position: Position) {
        self.cursors.place(position);
        self.state = if self.cursors.len() >= 2 {
            EditorState::CursorReady
        } else {
            EditorState::CursorAdd
        };
    }

    // ====================================================================
    // Selection and snapping
    // ====================================================================

    /// Select what is under `position`. Nodes win over components.
    pub fn select_at(&mut self, position: Position) -> Option<Selected> {
        let hit = match self.circuit.closest_node(position, EditorConfig::CLOSE_THRESHOLD) {
            Some(node) => Some(Selected::Node(node.name.clone())),
            None => self
                .circuit
                .closest_component(position)
                .map(|c| Selected::Component(c.name.clone())),
        };
        self.selected = hit.clone();
        hit
    }

    pub fn select(&mut self, selected: Option<Selected>) {
        self.selected = selected;
    }

    fn selected_component(&self) -> Option<&str> {
        match &self.selected {
            Some(Selected::Component(name)) => Some(name),
            _ => None,
        }
    }

    fn grid(&self) -> Option<f64> {
        self.preferences
            .snap_grid
            .then_some(self.preferences.grid_spacing)
    }

    /// Snap a pointer position (see [`Snapper`]).
    pub fn snap(&self, position: Position, snap_to_component: bool) -> Position {
        Snapper {
            circuit: &self.circuit,
            cursors: &self.cursors,
            threshold: EditorConfig::CLOSE_THRESHOLD,
            grid: self.grid(),
        }
        .snap(position, snap_to_component)
    }

    // ====================================================================
    // Creation
    // ====================================================================

    /// Create `thing` between `p1` and `p2`, reusing nodes already at the
    /// terminal positions. Returns the new component's name.
    pub fn thing_create(&mut self, thing: &Thing, p1: Position, p2: Position) -> Result<String, SchematicError> {
        let template = Component::new(String::new(), thing.ctype, Vec::new()).with_kind(thing.kind.clone());
        self.create(template, p1, p2)
    }

    /// Create the component bound to `key`.
    pub fn cpt_create(&mut self, key: &str, p1: Position, p2: Position) -> Result<String, SchematicError> {
        let binding =
            keymap::component_binding(key).ok_or_else(|| SchematicError::not_found("component key", key))?;
        self.thing_create(&binding.thing(), p1, p2)
    }

    /// Create the connection bound to `key`.
    pub fn con_create(&mut self, key: &str, p1: Position, p2: Position) -> Result<String, SchematicError> {
        let binding =
            keymap::connection_binding(key).ok_or_else(|| SchematicError::not_found("connection key", key))?;
        self.thing_create(&binding.thing(), p1, p2)
    }

    fn create(&mut self, template: Component, p1: Position, p2: Position) -> Result<String, SchematicError> {
        let distance = p1.distance_to(&p2);
        if distance < EditorConfig::MIN_DISTANCE {
            return Err(SchematicError::TooClose {
                distance,
                minimum: EditorConfig::MIN_DISTANCE,
            });
        }
        let positions = template.ctype.assign_positions(p1, p2);
        let name = self.insert_at(template, &positions, |_| true)?;
        self.record_add(&name)?;
        self.draw_component(&name);
        Ok(name)
    }

    /// Insert `template` under a fresh name with terminals at `positions`.
    /// Terminals for which `attach` holds reuse a node already at their
    /// position; terminals sharing a position share a node.
    fn insert_at(
        &mut self,
        template: Component,
        positions: &[Position],
        attach: impl Fn(usize) -> bool,
    ) -> Result<String, SchematicError> {
        let ctype = template.ctype;
        if !ctype.accepts_kind(&template.kind) {
            return Err(SchematicError::InvalidKind {
                ctype,
                kind: template.kind,
            });
        }
        let connection = ctype == ComponentType::Wire && !template.kind.is_empty();

        let mut names: Vec<String> = Vec::with_capacity(positions.len());
        let mut fresh: Vec<(String, Position)> = Vec::new();
        let mut reserved = HashSet::new();
        for (index, position) in positions.iter().enumerate() {
            if let Some(earlier) = positions[..index].iter().position(|p| p.coincides(position)) {
                names.push(names[earlier].clone());
                continue;
            }
            if attach(index) {
                if let Some(existing) = self.circuit.node_at(*position, None) {
                    names.push(existing.to_string());
                    continue;
                }
            }
            let name = if connection && index == 1 {
                self.circuit.choose_ground_node_name(&reserved)
            } else {
                self.circuit.choose_node_name_excluding(&reserved)
            };
            reserved.insert(name.clone());
            fresh.push((name.clone(), *position));
            names.push(name);
        }

        let name = self.circuit.choose_component_name(ctype.prefix());
        let mut component = template;
        component.name = name.clone();
        component.nodes = names;
        if ctype.needs_control() {
            let valid = component
                .control
                .as_deref()
                .map(|c| self.circuit.component(c).is_some())
                .unwrap_or(false);
            if !valid {
                component.control = self
                    .circuit
                    .possible_control_names()
                    .into_iter()
                    .find(|n| *n != name)
                    .map(str::to_string);
            }
        }

        self.circuit.insert_component(component)?;
        for (node, position) in fresh {
            self.circuit.set_node_position(&node, position)?;
        }
        Ok(name)
    }

    fn record_add(&mut self, name: &str) -> Result<(), SchematicError> {
        let def = self
            .circuit
            .component_def(name)
            .ok_or_else(|| SchematicError::not_found("component", name))?;
        self.record(HistoryEvent::Add(def));
        Ok(())
    }

    fn record(&mut self, event: HistoryEvent) {
        self.history.push(event);
        self.dirty = true;
    }

    /// Remove a component without recording it.
    fn discard(&mut self, name: &str) {
        if let Err(e) = self.circuit.remove_component(name) {
            warn!("Could not discard {}: {}", name, e);
        }
        self.undraw_component(name);
    }

    // ====================================================================
    // Drag-to-place and dragging
    // ====================================================================

    fn begin_placing(&mut self, position: Position) -> Result<(), SchematicError> {
        let Some(thing) = self.crosshair.thing().cloned() else {
            self.state = EditorState::Idle;
            return Ok(());
        };
        let anchor = self.snap(position, true);
        let end = anchor + Position::new(EditorConfig::PLACEMENT_DELTA, 0.0);
        let positions = thing.ctype.assign_positions(anchor, end);
        let anchor_terminal = thing.ctype.anchor_terminal();

        let template = Component::new(String::new(), thing.ctype, Vec::new()).with_kind(thing.kind.clone());
        let component = self.insert_at(template, &positions, |i| Some(i) == anchor_terminal)?;
        debug!("Placing {} from {}", component, anchor);
        self.draw_component(&component);
        self.state = EditorState::Placing { component, anchor };
        Ok(())
    }

    fn begin_drag(&mut self, position: Position, shift: bool) -> Result<(), SchematicError> {
        let nodes: Vec<String> = match self.select_at(position) {
            Some(Selected::Node(node)) => vec![node],
            Some(Selected::Component(name)) => self
                .circuit
                .component(&name)
                .map(|c| c.nodes().to_vec())
                .unwrap_or_default(),
            None => return Ok(()),
        };
        let before = self.affected_states(&nodes);

        let nodes = match &self.selected {
            Some(Selected::Component(name)) if shift => {
                let name = name.clone();
                self.circuit.cpt_detach(&name)?;
                self.circuit
                    .component(&name)
                    .map(|c| c.nodes().to_vec())
                    .unwrap_or_default()
            }
            _ => nodes,
        };

        let mut starts: Vec<(String, Position)> = Vec::new();
        for node in nodes {
            if starts.iter().any(|(n, _)| *n == node) {
                continue;
            }
            if let Some(p) = self.circuit.node(&node).and_then(|n| n.position) {
                starts.push((node, p));
            }
        }
        debug!("Dragging {:?}", starts);
        self.state = EditorState::Dragging(Drag {
            nodes: starts,
            origin: self.snap(position, false),
            before,
        });
        Ok(())
    }

    /// Terminal states of every component touching `nodes`.
    fn affected_states(&self, nodes: &[String]) -> TerminalStates {
        let mut states: TerminalStates = Vec::new();
        for node in nodes {
            for component in self.circuit.components_on_node(node) {
                if states.iter().any(|(c, _)| c == component) {
                    continue;
                }
                if let Some(terminals) = self.circuit.terminal_states(component) {
                    states.push((component.to_string(), terminals));
                }
            }
        }
        states
    }

    fn drag_to(&mut self, position: Position) -> Result<(), SchematicError> {
        match &self.state {
            EditorState::Placing { component, anchor } => {
                let (component, anchor) = (component.clone(), *anchor);
                let Some(ctype) = self.circuit.component(&component).map(|c| c.ctype) else {
                    return Ok(());
                };
                let end = self.snap(position, true);
                if end.coincides(&anchor) {
                    return Ok(());
                }
                let positions = ctype.assign_positions(anchor, end);
                let anchor_terminal = ctype.anchor_terminal();
                let nodes = self
                    .circuit
                    .component(&component)
                    .map(|c| c.nodes().to_vec())
                    .unwrap_or_default();
                let anchor_node = anchor_terminal.and_then(|i| nodes.get(i).cloned());
                for (node, p) in nodes.iter().zip(positions) {
                    if Some(node) != anchor_node.as_ref() {
                        self.circuit.set_node_position(node, p)?;
                    }
                }
                self.draw_component(&component);
            }
            EditorState::Dragging(drag) => {
                let delta = self.snap(position, false) - drag.origin;
                let moves: Vec<(String, Position)> = drag
                    .nodes
                    .iter()
                    .map(|(node, start)| (node.clone(), *start + delta))
                    .collect();
                for (node, p) in &moves {
                    self.circuit.set_node_position(node, *p)?;
                }
                let nodes: Vec<String> = moves.into_iter().map(|(n, _)| n).collect();
                self.draw_around(&nodes);
            }
            _ => {}
        }
        Ok(())
    }

    /// Join the free terminals of a placed component onto coincident nodes
    /// and record it. A component left shorter than the minimum length is
    /// discarded instead; returns false then.
    fn finish_placing(&mut self, component: &str) -> Result<bool, SchematicError> {
        let (ctype, nodes) = self
            .circuit
            .component(component)
            .map(|c| (c.ctype, c.nodes().to_vec()))
            .ok_or_else(|| SchematicError::not_found("component", component))?;
        let length = self
            .circuit
            .terminal_positions(component)
            .and_then(|p| ctype.body_endpoints(&p))
            .map(|(p1, p2)| p1.distance_to(&p2))
            .unwrap_or(0.0);
        if length < EditorConfig::MIN_DISTANCE {
            debug!("Discarding {}, too short", component);
            self.discard(component);
            return Ok(false);
        }

        let anchor_node = ctype.anchor_terminal().and_then(|i| nodes.get(i).cloned());
        let mut joined = HashSet::new();
        for node in &nodes {
            if Some(node) == anchor_node.as_ref() || !joined.insert(node.clone()) {
                continue;
            }
            if self.circuit.node(node).is_some() {
                self.circuit.node_join(node, None)?;
            }
        }
        self.record_add(component)?;
        self.draw_component(component);
        Ok(true)
    }

    fn finish_drag(&mut self, drag: &Drag) -> Result<(), SchematicError> {
        for (node, _) in &drag.nodes {
            if self.circuit.node(node).is_some() {
                self.circuit.node_join(node, None)?;
            }
        }
        let entries: Vec<MoveEntry> = drag
            .before
            .iter()
            .filter_map(|(component, before)| {
                let after = self.circuit.terminal_states(component)?;
                Some(MoveEntry {
                    component: component.clone(),
                    before: before.clone(),
                    after,
                })
            })
            .filter(|entry| !entry.is_noop())
            .collect();
        if !entries.is_empty() {
            self.record(HistoryEvent::Move(entries));
        }
        self.redraw();
        Ok(())
    }

    // ====================================================================
    // Deletion and clipboard
    // ====================================================================

    pub fn delete(&mut self, name: &str) -> Result<(), SchematicError> {
        let def = self
            .circuit
            .component_def(name)
            .ok_or_else(|| SchematicError::not_found("component", name))?;
        self.circuit.remove_component(name)?;
        self.record(HistoryEvent::Delete(def));
        if self.selected_component() == Some(name) {
            self.selected = None;
        }
        self.undraw_component(name);
        // Neighbours may have lost a junction dot.
        self.redraw();
        Ok(())
    }

    /// Delete the selected component. Returns false when no component is
    /// selected.
    pub fn delete_selected(&mut self) -> Result<bool, SchematicError> {
        let Some(name) = self.selected_component().map(str::to_string) else {
            return Ok(false);
        };
        self.delete(&name)?;
        Ok(true)
    }

    /// Copy the selected component. Returns false when no component is
    /// selected.
    pub fn copy_selected(&mut self) -> bool {
        let Some(def) = self.selected_component().and_then(|n| self.circuit.component_def(n)) else {
            return false;
        };
        debug!("Copied {}", def.component.name);
        self.clipboard = Some(def);
        true
    }

    pub fn cut_selected(&mut self) -> Result<bool, SchematicError> {
        if !self.copy_selected() {
            return Ok(false);
        }
        self.delete_selected()
    }

    /// Paste the clipboard between the two cursors.
    pub fn paste(&mut self) -> Result<Option<String>, SchematicError> {
        if self.clipboard.is_none() {
            return Ok(None);
        }
        let Some((p1, p2)) = self.cursors.pair() else {
            self.notifier.info("To paste, first place two cursors");
            return Ok(None);
        };
        let name = self.paste_between(p1, p2)?;
        self.cursors.clear();
        self.state = EditorState::Idle;
        self.draw_cursors();
        Ok(Some(name))
    }

    /// Paste the clipboard starting at `position`, keeping the copied
    /// component's length and direction.
    pub fn paste_at(&mut self, position: Position) -> Result<Option<String>, SchematicError> {
        let Some(def) = &self.clipboard else {
            return Ok(None);
        };
        let positions: Option<Vec<Position>> = def.terminals.iter().map(|(_, p)| *p).collect();
        let span = positions
            .and_then(|p| def.component.ctype.body_endpoints(&p))
            .map(|(p1, p2)| p2 - p1)
            .filter(|d| d.length() >= EditorConfig::MIN_DISTANCE)
            .unwrap_or(Position::new(EditorConfig::STEP, 0.0));
        self.paste_between(position, position + span).map(Some)
    }

    fn paste_between(&mut self, p1: Position, p2: Position) -> Result<String, SchematicError> {
        let def = self
            .clipboard
            .clone()
            .ok_or_else(|| SchematicError::not_found("clipboard", "contents"))?;
        self.create(def.component, p1, p2)
    }

    // ====================================================================
    // Property edits
    // ====================================================================

    fn modify(
        &mut self,
        name: &str,
        edit: impl FnOnce(&mut Circuit) -> Result<String, SchematicError>,
    ) -> Result<(), SchematicError> {
        let before = self
            .circuit
            .component_def(name)
            .ok_or_else(|| SchematicError::not_found("component", name))?;
        let renamed = edit(&mut self.circuit)?;
        self.circuit.recompute_visibility_flags();
        let after = self
            .circuit
            .component_def(&renamed)
            .ok_or_else(|| SchematicError::not_found("component", renamed.as_str()))?;
        if before != after {
            self.record(HistoryEvent::Modify { before, after });
        }
        Ok(())
    }

    /// Set or clear (empty string) a component's value.
    pub fn set_component_value(&mut self, name: &str, value: &str) -> Result<(), SchematicError> {
        self.modify(name, |circuit| {
            let component = circuit
                .component_mut(name)
                .ok_or_else(|| SchematicError::not_found("component", name))?;
            component.value = (!value.is_empty()).then(|| value.to_string());
            Ok(name.to_string())
        })?;
        self.draw_component(name);
        Ok(())
    }

    pub fn set_component_kind(&mut self, name: &str, kind: &str) -> Result<(), SchematicError> {
        self.modify(name, |circuit| {
            let component = circuit
                .component_mut(name)
                .ok_or_else(|| SchematicError::not_found("component", name))?;
            if !component.ctype.accepts_kind(kind) {
                return Err(SchematicError::InvalidKind {
                    ctype: component.ctype,
                    kind: kind.to_string(),
                });
            }
            component.kind = kind.to_string();
            Ok(name.to_string())
        })?;
        self.redraw();
        Ok(())
    }

    /// Toggle one of the type's extra editable fields (`mirror`, `invert`).
    pub fn set_component_flag(&mut self, name: &str, flag: &str, on: bool) -> Result<(), SchematicError> {
        self.modify(name, |circuit| {
            let component = circuit
                .component_mut(name)
                .ok_or_else(|| SchematicError::not_found("component", name))?;
            if !component.ctype.extra_fields().iter().any(|(field, _)| *field == flag) {
                return Err(SchematicError::not_found("field", flag));
            }
            component.set_flag(flag, on);
            Ok(name.to_string())
        })?;
        self.draw_component(name);
        Ok(())
    }

    /// Point a current-controlled source at `control`.
    pub fn set_control(&mut self, name: &str, control: &str) -> Result<(), SchematicError> {
        self.modify(name, |circuit| {
            if !circuit.possible_control_names().contains(&control) || control == name {
                return Err(SchematicError::not_found("control component", control));
            }
            let component = circuit
                .component_mut(name)
                .ok_or_else(|| SchematicError::not_found("component", name))?;
            if !component.ctype.needs_control() {
                return Err(SchematicError::not_found("controlled source", name));
            }
            component.control = Some(control.to_string());
            Ok(name.to_string())
        })
    }

    pub fn rename_component(&mut self, old: &str, new: &str) -> Result<(), SchematicError> {
        self.modify(old, |circuit| {
            circuit.rename_component(old, new)?;
            Ok(new.to_string())
        })?;
        if self.selected_component() == Some(old) {
            self.selected = Some(Selected::Component(new.to_string()));
        }
        self.redraw();
        Ok(())
    }

    /// Rename a node, merging into `new` when it already exists. Recorded
    /// as a move of the components on the node.
    pub fn rename_node(&mut self, old: &str, new: &str) -> Result<(), SchematicError> {
        let before = self.affected_states(&[old.to_string()]);
        self.circuit.rename_node(old, new)?;
        let entries: Vec<MoveEntry> = before
            .into_iter()
            .filter_map(|(component, before)| {
                let after = self.circuit.terminal_states(&component)?;
                Some(MoveEntry {
                    component,
                    before,
                    after,
                })
            })
            .filter(|entry| !entry.is_noop())
            .collect();
        if !entries.is_empty() {
            self.record(HistoryEvent::Move(entries));
        }
        if self.selected == Some(Selected::Node(old.to_string())) {
            self.selected = Some(Selected::Node(new.to_string()));
        }
        self.redraw();
        Ok(())
    }

    // ====================================================================
    // History
    // ====================================================================

    /// Undo the last edit. Returns false when there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool, SchematicError> {
        let undone = self.history.undo(&mut self.circuit)?.map(|e| e.describe());
        let Some(description) = undone else {
            self.notifier.info("Nothing to undo");
            return Ok(false);
        };
        debug!("Undid {}", description);
        self.after_history();
        Ok(true)
    }

    /// Redo the last undone edit. Returns false when there was nothing to
    /// redo.
    pub fn redo(&mut self) -> Result<bool, SchematicError> {
        let redone = self.history.redo(&mut self.circuit)?.map(|e| e.describe());
        let Some(description) = redone else {
            self.notifier.info("Nothing to redo");
            return Ok(false);
        };
        debug!("Redid {}", description);
        self.after_history();
        Ok(true)
    }

    fn after_history(&mut self) {
        self.dirty = true;
        let stale = match &self.selected {
            Some(Selected::Component(name)) => self.circuit.component(name).is_none(),
            Some(Selected::Node(name)) => self.circuit.node(name).is_none(),
            None => false,
        };
        if stale {
            self.selected = None;
        }
        self.redraw();
    }

    // ====================================================================
    // Analysis
    // ====================================================================

    /// Send `request` to the analysis backend. The answer arrives through
    /// [`Editor::poll_analysis`].
    pub fn inspect(&mut self, request: AnalysisRequest) -> Result<Uuid, SchematicError> {
        let netlist = analysis_netlist(&self.circuit, &request)?;
        let dispatcher = self.analysis.as_mut().ok_or_else(|| {
            AnalysisError::Backend(anyhow::anyhow!("No analysis backend configured"))
        })?;
        Ok(dispatcher.dispatch(netlist, request))
    }

    /// Inspect `quantity` of the current selection.
    pub fn inspect_selected(&mut self, quantity: Quantity) -> Result<Uuid, SchematicError> {
        let request = match &self.selected {
            Some(Selected::Component(name)) => AnalysisRequest::component(name.clone(), quantity),
            Some(Selected::Node(name)) => AnalysisRequest::node(name.clone(), quantity),
            None => return Err(SchematicError::not_found("selection", "")),
        };
        self.inspect(request)
    }

    /// Collect finished analyses and show their results.
    pub fn poll_analysis(&mut self) -> Vec<AnalysisCompletion> {
        let completions = match self.analysis.as_mut() {
            Some(dispatcher) => dispatcher.drain(),
            None => return Vec::new(),
        };
        self.show_completions(&completions);
        completions
    }

    /// Wait for the next finished analysis and show its result.
    pub async fn next_analysis(&mut self) -> Option<AnalysisCompletion> {
        let completion = self.analysis.as_mut()?.next_completion().await?;
        self.show_completions(std::slice::from_ref(&completion));
        Some(completion)
    }

    fn show_completions(&mut self, completions: &[AnalysisCompletion]) {
        for completion in completions {
            match &completion.result {
                Ok(value) => self.notifier.info(&format!("{} = {}", completion.request, value)),
                Err(e) => {
                    warn!("{} failed: {}", completion.request, e);
                    self.notifier.error(&format!("{} failed: {}", completion.request, e));
                }
            }
        }
    }

    // ====================================================================
    // Documents
    // ====================================================================

    /// Load a schematic, replacing the current circuit and history. The
    /// file's preferences directive is applied on top of the current
    /// preferences.
    pub fn load(&mut self, path: &Path) -> Result<(), SchematicError> {
        let file = load_schematic(path)?;
        let mut preferences = self.preferences.clone();
        file.apply_preferences(&mut preferences)?;

        self.cancel();
        self.circuit = file.circuit;
        self.preferences = preferences;
        self.history.clear();
        self.selected = None;
        self.filename = Some(path.to_path_buf());
        self.dirty = false;
        self.redraw();
        Ok(())
    }

    pub fn save(&mut self, path: &Path) -> Result<(), SchematicError> {
        save_schematic(path, &self.circuit, &self.preferences)?;
        self.filename = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    /// Discard everything and start an empty schematic.
    pub fn new_schematic(&mut self) {
        self.cancel();
        self.circuit = Circuit::new();
        self.history.clear();
        self.selected = None;
        self.clipboard = None;
        self.filename = None;
        self.dirty = false;
        info!("New schematic");
        self.redraw();
    }

    /// Netlist, nodes, cursors and selection as text.
    pub fn debug_report(&self) -> String {
        let mut report = String::from("Netlist.........\n");
        report.push_str(&schematic_text(&self.circuit, &self.preferences));
        report.push_str("Nodes...........\n");
        for node in self.circuit.nodes() {
            report.push_str(&format!("{} count={}\n", node, node.count));
        }
        report.push_str("Cursors.........\n");
        for cursor in self.cursors.iter() {
            report.push_str(&format!("{}\n", cursor.position));
        }
        report.push_str("Selected.........\n");
        match &self.selected {
            Some(selected) => report.push_str(&format!("{}\n", selected)),
            None => report.push_str("None\n"),
        }
        report
    }

    /// View extents covering the circuit with a margin.
    pub fn best_fit(&self) -> Option<(Position, Position)> {
        let (lo, hi) = self.circuit.bounding_box()?;
        let margin = Position::new(VIEW_MARGIN, VIEW_MARGIN);
        Some((lo - margin, hi + margin))
    }

    // ====================================================================
    // Drawing
    // ====================================================================

    /// Mark a component's first terminal `+` and its second `-`.
    pub fn voltage_annotate(&mut self, name: &str) -> Result<(), SchematicError> {
        let handles = Renderer::new(self.sketcher.as_mut(), &self.circuit, &self.preferences)
            .voltage_annotation(name)
            .ok_or_else(|| SchematicError::not_found("component", name))?;
        self.drawings.annotations.extend(handles);
        self.sketcher.refresh();
        Ok(())
    }

    pub fn clear_annotations(&mut self) {
        for handle in std::mem::take(&mut self.drawings.annotations) {
            self.sketcher.remove(handle);
        }
        self.sketcher.refresh();
    }

    /// Clear the canvas and draw everything again.
    pub fn redraw(&mut self) {
        self.sketcher.clear();
        self.drawings = Drawings::default();
        let names: Vec<String> = self.circuit.components().map(|c| c.name.clone()).collect();
        for name in &names {
            if let Some(DrawIssue::ZeroLength(_)) = self.draw_component(name) {
                self.notifier.warning(&format!("Zero length component {}", name));
            }
        }
        self.draw_cursors();
        self.draw_crosshair();
        self.sketcher.refresh();
    }

    fn undraw_component(&mut self, name: &str) {
        for handle in self.drawings.take_component(name) {
            self.sketcher.remove(handle);
        }
    }

    fn draw_component(&mut self, name: &str) -> Option<DrawIssue> {
        self.undraw_component(name);
        let drawn = Renderer::new(self.sketcher.as_mut(), &self.circuit, &self.preferences).component(name);
        match drawn {
            Ok(handles) => {
                self.drawings.components.insert(name.to_string(), handles);
                None
            }
            Err(issue) => {
                debug!("{}", issue);
                Some(issue)
            }
        }
    }

    /// Redraw every component touching `nodes`.
    fn draw_around(&mut self, nodes: &[String]) {
        let mut names: Vec<String> = Vec::new();
        for node in nodes {
            for name in self.circuit.components_on_node(node) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        for name in &names {
            self.draw_component(name);
        }
    }

    fn draw_cursors(&mut self) {
        for handle in std::mem::take(&mut self.drawings.cursors) {
            self.sketcher.remove(handle);
        }
        self.drawings.cursors =
            Renderer::new(self.sketcher.as_mut(), &self.circuit, &self.preferences).cursors(&self.cursors);
    }

    fn draw_crosshair(&mut self) {
        for handle in std::mem::take(&mut self.drawings.crosshair) {
            self.sketcher.remove(handle);
        }
        if self.crosshair.is_armed() {
            self.drawings.crosshair = Renderer::new(self.sketcher.as_mut(), &self.circuit, &self.preferences)
                .crosshair(&self.crosshair);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::headless::{HeadlessSketcher, MessageLog};

    fn editor() -> (Editor, MessageLog) {
        let log = MessageLog::new();
        let editor = Editor::new(Box::new(HeadlessSketcher::new()), Box::new(log.clone()));
        (editor, log)
    }

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn test_two_cursor_create() {
        let (mut editor, _) = editor();
        editor.on_left_click(p(0.1, -0.1));
        assert_eq!(editor.state(), &EditorState::CursorAdd);
        editor.on_left_click(p(3.9, 0.2));
        assert_eq!(editor.state(), &EditorState::CursorReady);
        assert_eq!(editor.cursors().pair(), Some((p(0.0, 0.0), p(4.0, 0.0))));

        editor.on_key("r");
        assert_eq!(editor.state(), &EditorState::Idle);
        assert!(editor.cursors().is_empty());
        let r1 = editor.circuit().component("R1").unwrap();
        assert_eq!(r1.nodes(), ["1", "2"]);
        assert_eq!(editor.history().undo_size(), 1);
        assert!(editor.is_dirty());
    }

    #[test]
    fn test_key_without_cursors() {
        let (mut editor, log) = editor();
        editor.on_key("r");
        assert!(editor.circuit().is_empty());
        assert_eq!(log.messages().len(), 1);
    }

    #[test]
    fn test_too_close() {
        let (mut editor, log) = editor();
        let result = editor.thing_create(&Thing::new(ComponentType::Resistor), p(0.0, 0.0), p(0.1, 0.0));
        assert!(matches!(result, Err(SchematicError::TooClose { .. })));
        assert!(editor.circuit().is_empty());
        assert!(!editor.history().can_undo());

        // Exactly the minimum is allowed.
        editor
            .thing_create(&Thing::new(ComponentType::Resistor), p(0.0, 0.0), p(0.2, 0.0))
            .unwrap();
        assert!(log.errors().is_empty());
    }

    #[test]
    fn test_reuses_nodes_at_positions() {
        let (mut editor, _) = editor();
        let r = Thing::new(ComponentType::Resistor);
        editor.thing_create(&r, p(0.0, 0.0), p(4.0, 0.0)).unwrap();
        editor.thing_create(&r, p(4.0, 0.0), p(4.0, 4.0)).unwrap();
        assert_eq!(editor.circuit().component("R2").unwrap().nodes(), ["2", "3"]);
        assert_eq!(editor.circuit().node("2").unwrap().count, 2);
    }

    #[test]
    fn test_ground_connection() {
        let (mut editor, _) = editor();
        editor.con_create("0", p(0.0, 0.0), p(0.0, -1.0)).unwrap();
        editor.con_create("0", p(4.0, 0.0), p(4.0, -1.0)).unwrap();
        assert_eq!(editor.circuit().component("W1").unwrap().nodes(), ["1", "0"]);
        assert_eq!(editor.circuit().component("W2").unwrap().nodes(), ["2", "0_1"]);
        assert!(editor.circuit().node("0").unwrap().implicit);
    }

    #[test]
    fn test_controlled_source_gets_control() {
        let (mut editor, _) = editor();
        editor.cpt_create("v", p(0.0, 0.0), p(0.0, 4.0)).unwrap();
        let name = editor.cpt_create("f", p(4.0, 0.0), p(4.0, 4.0)).unwrap();
        assert_eq!(name, "F1");
        assert_eq!(editor.circuit().component("F1").unwrap().control.as_deref(), Some("V1"));
    }

    #[test]
    fn test_right_click_cancels_cursors() {
        let (mut editor, _) = editor();
        editor.on_left_click(p(0.0, 0.0));
        assert_eq!(editor.on_right_click(p(5.0, 5.0)), None);
        assert_eq!(editor.state(), &EditorState::Idle);
        assert!(editor.cursors().is_empty());
    }

    #[test]
    fn test_escape_clears() {
        let (mut editor, _) = editor();
        editor.on_left_click(p(0.0, 0.0));
        editor.on_left_click(p(2.0, 0.0));
        editor.on_key("escape");
        assert_eq!(editor.state(), &EditorState::Idle);
        assert!(editor.cursors().is_empty());
    }

    #[test]
    fn test_best_fit() {
        let (mut editor, _) = editor();
        assert_eq!(editor.best_fit(), None);
        editor.cpt_create("r", p(0.0, 0.0), p(4.0, 0.0)).unwrap();
        assert_eq!(editor.best_fit(), Some((p(-2.0, -2.0), p(6.0, 2.0))));
    }

    #[test]
    fn test_debug_report_sections() {
        let (mut editor, _) = editor();
        editor.cpt_create("r", p(0.0, 0.0), p(4.0, 0.0)).unwrap();
        editor.on_left_click(p(0.0, 0.0));
        let report = editor.debug_report();
        assert!(report.starts_with("Netlist.........\n"));
        assert!(report.contains("R1 1 2; right=2\n"));
        assert!(report.contains("Nodes...........\n1@(0, 0) count=1\n"));
        assert!(report.contains("Cursors.........\n(0, 0)\n"));
        assert!(report.ends_with("Selected.........\nnode 1\n"));
    }
}
