//! Drawing components, nodes, cursors and annotations through a sketcher

use std::collections::HashMap;

use crate::adapters::{DrawHandle, Sketcher, StrokeStyle};
use crate::circuit::{Circuit, Component, ComponentType};
use crate::editor::cursor::{CrossHair, Cursors};
use crate::geometry::{Pose, Position, Transform, POSITION_EPSILON};
use crate::preferences::{DrawNodes, LabelComponents, LabelNodes, Preferences};

const LABEL_OFFSET: f64 = 0.5;
const LABEL_SIZE: f64 = 18.0;
const NODE_LABEL_OFFSET: f64 = 0.1;
const CURSOR_RADIUS: f64 = 0.3;
const CROSSHAIR_SIZE: f64 = 0.5;
const CURSOR_COLORS: [&str; 2] = ["red", "blue"];

/// Why a component could not be drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawIssue {
    /// Body terminals coincide.
    ZeroLength(String),
    /// Some terminal node has no position.
    Unplaced(String),
}

impl std::fmt::Display for DrawIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawIssue::ZeroLength(name) => write!(f, "Zero length component {}", name),
            DrawIssue::Unplaced(name) => write!(f, "Component {} has unplaced nodes", name),
        }
    }
}

/// Handles of everything the editor has drawn
#[derive(Debug, Default)]
pub struct Drawings {
    pub components: HashMap<String, Vec<DrawHandle>>,
    pub cursors: Vec<DrawHandle>,
    pub crosshair: Vec<DrawHandle>,
    pub annotations: Vec<DrawHandle>,
}

impl Drawings {
    pub fn take_component(&mut self, name: &str) -> Vec<DrawHandle> {
        self.components.remove(name).unwrap_or_default()
    }
}

/// Text placed next to a component per the `label_cpts` preference.
pub fn component_label(component: &Component, mode: LabelComponents) -> Option<String> {
    if matches!(component.ctype, ComponentType::Wire | ComponentType::Opamp) {
        return None;
    }
    let name = component.name.clone();
    let value = component.value.clone().filter(|v| !v.is_empty());
    let label = match mode {
        LabelComponents::None => return None,
        LabelComponents::Name => name,
        LabelComponents::Value => value.unwrap_or(name),
        LabelComponents::NameAndValue => match value {
            Some(value) if value != name && component.ctype != ComponentType::Port => {
                format!("{}={}", name, value)
            }
            _ => name,
        },
    };
    Some(label)
}

/// Symbol sketch name, e.g. `Q:pnp`.
pub fn symbol_name(component: &Component) -> Option<String> {
    let symbol = component.ctype.info().sketch?;
    if component.kind.is_empty() || component.ctype == ComponentType::Opamp {
        Some(symbol.to_string())
    } else {
        Some(format!("{}:{}", symbol, component.kind))
    }
}

pub struct Renderer<'a> {
    pub sketcher: &'a mut dyn Sketcher,
    pub circuit: &'a Circuit,
    pub preferences: &'a Preferences,
}

impl<'a> Renderer<'a> {
    pub fn new(sketcher: &'a mut dyn Sketcher, circuit: &'a Circuit, preferences: &'a Preferences) -> Self {
        Self {
            sketcher,
            circuit,
            preferences,
        }
    }

    /// Draw a component with its label and nodes.
    pub fn component(&mut self, name: &str) -> Result<Vec<DrawHandle>, DrawIssue> {
        let circuit = self.circuit;
        let unplaced = || DrawIssue::Unplaced(name.to_string());
        let component = circuit.component(name).ok_or_else(unplaced)?;
        let positions = circuit.terminal_positions(name).ok_or_else(unplaced)?;
        let (p1, p2) = component.ctype.body_endpoints(&positions).ok_or_else(unplaced)?;
        let length = p1.distance_to(&p2);
        if length < POSITION_EPSILON {
            return Err(DrawIssue::ZeroLength(name.to_string()));
        }

        let scale = component.scale();
        let pose = Pose::from_endpoints(p1, p2, scale);
        let style = StrokeStyle::default();
        let mut handles = Vec::new();

        match symbol_name(component) {
            None => {
                handles.push(self.sketcher.stroke_line(p1, p2, &style));
                if component.ctype == ComponentType::Wire && !component.kind.is_empty() {
                    let transform = Transform::new(p2, pose.angle, scale);
                    handles.push(self.sketcher.sketch(&component.kind, transform, &style));
                }
            }
            Some(symbol) => {
                let info = component.ctype.info();
                if info.can_stretch {
                    // Fixed-size body centred on the segment, stubs to the terminals.
                    let width = (info.symbol_width * scale.min(length)).min(length);
                    let direction = (p2 - p1) / length;
                    let start = pose.midpoint - direction * (width / 2.0);
                    let end = pose.midpoint + direction * (width / 2.0);
                    if !start.coincides(&p1) {
                        handles.push(self.sketcher.stroke_line(p1, start, &style));
                    }
                    if !end.coincides(&p2) {
                        handles.push(self.sketcher.stroke_line(end, p2, &style));
                    }
                }
                let transform = Transform::new(pose.midpoint, pose.angle, scale);
                handles.push(self.sketcher.sketch(&symbol, transform, &style));
            }
        }

        if let Some(label) = component_label(component, self.preferences.label_cpts) {
            let direction = (p2 - p1) / length;
            let at = pose.midpoint - direction.rot90_cw() * LABEL_OFFSET;
            handles.push(self.sketcher.text(at, &label, LABEL_SIZE));
        }

        handles.extend(self.nodes(component));
        Ok(handles)
    }

    fn nodes(&mut self, component: &Component) -> Vec<DrawHandle> {
        let circuit = self.circuit;
        let preferences = self.preferences;
        let style = StrokeStyle::default().with_color(preferences.node_color.clone());
        let mut handles = Vec::new();

        for node in component.nodes().iter().filter_map(|n| circuit.node(n)) {
            let Some(position) = node.position else {
                continue;
            };
            if !node.drawn || node.implicit {
                continue;
            }

            let draw = node.port
                || match preferences.draw_nodes {
                    DrawNodes::None => false,
                    DrawNodes::All => true,
                    DrawNodes::Connections => node.count >= 3,
                    DrawNodes::Primary => node.is_primary(),
                };
            if draw {
                let handle = if node.port {
                    self.sketcher.stroke_circle(position, preferences.node_size, &style)
                } else {
                    self.sketcher.stroke_filled_circle(position, preferences.node_size, &style)
                };
                handles.push(handle);
            }

            let label = match preferences.label_nodes {
                LabelNodes::None => false,
                LabelNodes::All => !node.name.starts_with('_'),
                LabelNodes::Alpha => node.is_labelled(),
            };
            if label {
                let at = position + Position::new(NODE_LABEL_OFFSET, NODE_LABEL_OFFSET);
                handles.push(self.sketcher.text(at, &node.name, LABEL_SIZE));
            }
        }
        handles
    }

    pub fn cursors(&mut self, cursors: &Cursors) -> Vec<DrawHandle> {
        cursors
            .iter()
            .zip(CURSOR_COLORS)
            .map(|(cursor, color)| {
                let style = StrokeStyle::default().with_color(color);
                self.sketcher.stroke_circle(cursor.position, CURSOR_RADIUS, &style)
            })
            .collect()
    }

    pub fn crosshair(&mut self, crosshair: &CrossHair) -> Vec<DrawHandle> {
        let style = StrokeStyle::default().dashed();
        let c = crosshair.position;
        let dx = Position::new(CROSSHAIR_SIZE, 0.0);
        let dy = Position::new(0.0, CROSSHAIR_SIZE);
        vec![
            self.sketcher.stroke_line(c - dx, c + dx, &style),
            self.sketcher.stroke_line(c - dy, c + dy, &style),
        ]
    }

    /// `+` and `-` markers on the first two terminals.
    pub fn voltage_annotation(&mut self, name: &str) -> Option<Vec<DrawHandle>> {
        let positions = self.circuit.terminal_positions(name)?;
        let (plus, minus) = (positions.first()?, positions.get(1)?);
        Some(vec![
            self.sketcher.text(*plus, "+", 2.0 * LABEL_SIZE),
            self.sketcher.text(*minus, "-", 2.0 * LABEL_SIZE),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::headless::{HeadlessSketcher, Primitive};

    fn resistor() -> Circuit {
        let mut circuit = Circuit::new();
        circuit.add_component(ComponentType::Resistor, "", &["1", "2"]).unwrap();
        circuit.set_node_position("1", Position::new(0.0, 0.0)).unwrap();
        circuit.set_node_position("2", Position::new(4.0, 0.0)).unwrap();
        circuit
    }

    #[test]
    fn test_labels() {
        let cpt = Component::new("R1", ComponentType::Resistor, vec!["1".into(), "2".into()])
            .with_value("10");
        assert_eq!(component_label(&cpt, LabelComponents::NameAndValue).as_deref(), Some("R1=10"));
        assert_eq!(component_label(&cpt, LabelComponents::Value).as_deref(), Some("10"));
        assert_eq!(component_label(&cpt, LabelComponents::None), None);
        let wire = Component::new("W1", ComponentType::Wire, vec!["1".into(), "2".into()]);
        assert_eq!(component_label(&wire, LabelComponents::Name), None);
    }

    #[test]
    fn test_stretch_rule() {
        let circuit = resistor();
        let preferences = Preferences::default();
        let mut sketcher = HeadlessSketcher::new();
        let observer = sketcher.clone();
        let mut renderer = Renderer {
            sketcher: &mut sketcher,
            circuit: &circuit,
            preferences: &preferences,
        };
        renderer.component("R1").unwrap();

        let primitives = observer.primitives();
        assert!(primitives.contains(&Primitive::Line {
            from: Position::new(0.0, 0.0),
            to: Position::new(1.25, 0.0),
        }));
        assert!(primitives.contains(&Primitive::Line {
            from: Position::new(2.75, 0.0),
            to: Position::new(4.0, 0.0),
        }));
        assert_eq!(observer.symbols(), vec!["R"]);
        assert_eq!(observer.texts(), vec!["R1"]);
    }

    #[test]
    fn test_zero_length() {
        let mut circuit = resistor();
        circuit.set_node_position("2", Position::new(0.0, 0.0)).unwrap();
        let preferences = Preferences::default();
        let mut sketcher = HeadlessSketcher::new();
        let mut renderer = Renderer {
            sketcher: &mut sketcher,
            circuit: &circuit,
            preferences: &preferences,
        };
        assert_eq!(renderer.component("R1"), Err(DrawIssue::ZeroLength("R1".to_string())));
        assert!(sketcher.is_empty());
    }
}
