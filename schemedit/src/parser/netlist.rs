//! Netlist text codec
//!
//! Reads and writes the schematic netlist format:
//!
//! ```text
//! # Created by schemedit V0.1.0
//! ; nodes={1@(0, 0), 2@(0, 4)}
//! R1 1 2 10; down=2
//! E1 6 7 opamp 8 9; right=2
//! ; label_nodes=alpha, draw_nodes=connections, label_cpts=name, style=american
//! ```
//!
//! The header, the `nodes=` directive and the preferences directive are
//! stripped on load and regenerated on save. Direction attributes are
//! regenerated from node positions; on load they only matter when the
//! positions are missing.

use std::collections::HashMap;
use thiserror::Error;

use crate::circuit::schema::{split_attributes, Component, ComponentType, OPAMP_KIND};
use crate::circuit::Circuit;
use crate::geometry::{format_number, Position};
use crate::parser::format_detector::detect_format;
use crate::preferences::EditorConfig;

const HEADER_PREFIX: &str = "# Created by ";
const NODES_DIRECTIVE: &str = "nodes=";
/// Kind keywords written inline for independent sources.
const SOURCE_KEYWORDS: &[&str] = &["dc", "ac", "step"];
/// Angles closer than this to an axis are written as a direction.
const ANGLE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum NetlistParseError {
    #[error("{0} files cannot be edited")]
    UnsupportedFormat(String),
    #[error("line {line}: unknown component {name}")]
    UnknownComponent { line: usize, name: String },
    #[error("line {line}: {message}")]
    InvalidLine { line: usize, message: String },
    #[error("invalid nodes directive near {0:?}")]
    InvalidNodes(String),
}

/// Result of parsing netlist text
#[derive(Debug, Clone)]
pub struct ParsedNetlist {
    pub circuit: Circuit,
    /// Last preferences directive seen, without the leading `;`.
    pub preferences: Option<String>,
    /// Body vector of each component with a direction attribute.
    pub hints: HashMap<String, Position>,
}

impl ParsedNetlist {
    /// Place nodes the text stored no position for by following the
    /// direction attributes.
    pub fn layout_unplaced(&mut self) {
        if self.circuit.nodes().any(|n| n.position.is_none()) {
            tracing::debug!("Laying out nodes without stored positions");
            self.circuit.layout_unplaced(&self.hints);
        }
    }
}

/// Netlist parser
pub struct NetlistParser {
    circuit: Circuit,
    positions: Vec<(String, Position)>,
    hints: HashMap<String, Position>,
    preferences: Option<String>,
}

impl NetlistParser {
    /// Parse netlist text into a circuit. Nodes without a stored position
    /// are left unplaced; see [`ParsedNetlist::layout_unplaced`].
    pub fn parse(content: &str) -> Result<ParsedNetlist, NetlistParseError> {
        let format = detect_format(content);
        if !format.is_supported() {
            return Err(NetlistParseError::UnsupportedFormat(format.as_str().to_string()));
        }

        let mut parser = NetlistParser {
            circuit: Circuit::new(),
            positions: Vec::new(),
            hints: HashMap::new(),
            preferences: None,
        };
        for (index, raw) in content.lines().enumerate() {
            parser.parse_line(index + 1, raw.trim())?;
        }
        parser.finish()
    }

    fn parse_line(&mut self, line: usize, text: &str) -> Result<(), NetlistParseError> {
        if text.is_empty() {
            return Ok(());
        }
        if text.starts_with('#') {
            self.parse_header(text);
            return Ok(());
        }
        if let Some(directive) = text.strip_prefix(';') {
            let directive = directive.trim();
            if let Some(nodes) = directive.strip_prefix(NODES_DIRECTIVE) {
                self.positions.extend(parse_node_positions(nodes)?);
            } else if !directive.is_empty() {
                self.preferences = Some(directive.to_string());
            }
            return Ok(());
        }

        let component = self.parse_component(line, text)?;
        self.circuit
            .insert_component(component)
            .map_err(|e| NetlistParseError::InvalidLine {
                line,
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Only the first `# Created by` comment is metadata; other comments
    /// are dropped.
    fn parse_header(&mut self, text: &str) {
        let metadata = &mut self.circuit.metadata;
        if metadata.created_by.is_some() {
            return;
        }
        let Some(rest) = text.strip_prefix(HEADER_PREFIX) else {
            return;
        };
        let rest = rest.trim();
        match rest.rsplit_once(' ') {
            Some((tool, version)) if version.starts_with('V') => {
                metadata.created_by = Some(tool.trim().to_string());
                metadata.version = Some(version[1..].to_string());
            }
            _ => metadata.created_by = Some(rest.to_string()),
        }
    }

    fn parse_component(&mut self, line: usize, text: &str) -> Result<Component, NetlistParseError> {
        let (definition, attributes) = match text.split_once(';') {
            Some((definition, attributes)) => (definition.trim(), attributes.trim()),
            None => (text, ""),
        };
        let tokens: Vec<&str> = definition.split_whitespace().collect();
        let Some(&name) = tokens.first() else {
            return Err(NetlistParseError::InvalidLine {
                line,
                message: "missing component name".to_string(),
            });
        };

        let kind = tokens.get(3).copied().unwrap_or("");
        let ctype =
            ComponentType::from_name(name, kind).ok_or_else(|| NetlistParseError::UnknownComponent {
                line,
                name: name.to_string(),
            })?;

        let arity = ctype.arity();
        let (nodes, mut rest): (Vec<&str>, &[&str]) = if ctype == ComponentType::Opamp {
            if tokens.len() < 6 {
                return Err(NetlistParseError::InvalidLine {
                    line,
                    message: format!("{} needs out ref opamp in+ in-", name),
                });
            }
            (vec![tokens[1], tokens[2], tokens[4], tokens[5]], &tokens[6..])
        } else {
            if tokens.len() < arity + 1 {
                return Err(NetlistParseError::InvalidLine {
                    line,
                    message: format!("{} needs {} nodes", name, arity),
                });
            }
            (tokens[1..=arity].to_vec(), &tokens[arity + 1..])
        };

        let mut component = Component::new(
            name,
            ctype,
            nodes.into_iter().map(str::to_string).collect(),
        );

        if ctype.is_source() {
            component.kind = match rest.split_first() {
                Some((keyword, tail)) if SOURCE_KEYWORDS.contains(keyword) => {
                    rest = tail;
                    keyword.to_string()
                }
                _ => String::new(),
            };
        }
        if ctype.needs_control() {
            if let Some((control, tail)) = rest.split_first() {
                component.control = Some(control.to_string());
                rest = tail;
            }
        }
        if !rest.is_empty() {
            component.value = Some(rest.join(" "));
        }

        let mut kept = Vec::new();
        for (key, value) in split_attributes(attributes) {
            if key == "kind" {
                component.kind = value.unwrap_or_default().to_string();
            } else if value.is_none() && !ctype.is_source() && !key.is_empty() && ctype.accepts_kind(key) {
                component.kind = key.to_string();
            } else if let Some(hint) = direction_hint(key, value) {
                self.hints.insert(name.to_string(), hint);
            } else {
                kept.push(match value {
                    Some(value) => format!("{}={}", key, value),
                    None => key.to_string(),
                });
            }
        }
        component.attributes = kept.join(", ");
        Ok(component)
    }

    fn finish(mut self) -> Result<ParsedNetlist, NetlistParseError> {
        for (name, position) in &self.positions {
            if self.circuit.node(name).is_none() {
                tracing::debug!("Ignoring position of unused node {}", name);
                continue;
            }
            self.circuit
                .set_node_position(name, *position)
                .map_err(|e| NetlistParseError::InvalidNodes(e.to_string()))?;
        }
        Ok(ParsedNetlist {
            circuit: self.circuit,
            preferences: self.preferences,
            hints: self.hints,
        })
    }
}

/// Vector from the first body anchor to the second for a direction
/// attribute, `None` if the attribute is not a direction.
fn direction_hint(key: &str, value: Option<&str>) -> Option<Position> {
    let size = || value.and_then(|v| v.parse::<f64>().ok()).unwrap_or(1.0) * EditorConfig::STEP;
    match key {
        "right" => Some(Position::new(size(), 0.0)),
        "left" => Some(Position::new(-size(), 0.0)),
        "up" => Some(Position::new(0.0, size())),
        "down" => Some(Position::new(0.0, -size())),
        "rotate" => {
            let angle = value?.parse::<f64>().ok()?;
            Some(Position::new(EditorConfig::STEP, 0.0).rotate(angle))
        }
        _ => None,
    }
}

/// Direction attribute describing the body from `p1` to `p2`.
pub fn direction_attribute(p1: Position, p2: Position) -> Option<String> {
    let delta = p2 - p1;
    let length = delta.length();
    if length < crate::geometry::POSITION_EPSILON {
        return None;
    }
    let size = format_number(length / EditorConfig::STEP);
    let angle = delta.angle_deg();
    let near = |target: f64| (angle - target).abs() < ANGLE_TOLERANCE;
    let attribute = if near(0.0) {
        format!("right={}", size)
    } else if near(180.0) || near(-180.0) {
        format!("left={}", size)
    } else if near(90.0) {
        format!("up={}", size)
    } else if near(-90.0) {
        format!("down={}", size)
    } else {
        format!("rotate={}", format_number(angle))
    };
    Some(attribute)
}

/// Parse the body of a `nodes=` directive: `{1@(0, 0), 2@(0, 4)}`.
fn parse_node_positions(text: &str) -> Result<Vec<(String, Position)>, NetlistParseError> {
    let invalid = |near: &str| NetlistParseError::InvalidNodes(near.to_string());
    let inner = text
        .trim()
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| invalid(text))?;

    let mut positions = Vec::new();
    let mut rest = inner.trim();
    while !rest.is_empty() {
        let (name, tail) = rest.split_once('@').ok_or_else(|| invalid(rest))?;
        let tail = tail.trim_start().strip_prefix('(').ok_or_else(|| invalid(rest))?;
        let (coords, tail) = tail.split_once(')').ok_or_else(|| invalid(rest))?;
        let (x, y) = coords.split_once(',').ok_or_else(|| invalid(coords))?;
        let x: f64 = x.trim().parse().map_err(|_| invalid(coords))?;
        let y: f64 = y.trim().parse().map_err(|_| invalid(coords))?;
        positions.push((name.trim().to_string(), Position::new(x, y)));
        rest = tail.trim_start().trim_start_matches(',').trim_start();
    }
    Ok(positions)
}

/// Netlist writer
pub struct NetlistWriter<'a> {
    circuit: &'a Circuit,
    header: Option<(String, String)>,
    preferences: Option<String>,
    bare: bool,
}

impl<'a> NetlistWriter<'a> {
    pub fn new(circuit: &'a Circuit) -> Self {
        Self {
            circuit,
            header: None,
            preferences: None,
            bare: false,
        }
    }

    pub fn with_header(mut self, tool: &str, version: &str) -> Self {
        self.header = Some((tool.to_string(), version.to_string()));
        self
    }

    pub fn with_preferences(mut self, preferences: impl Into<String>) -> Self {
        self.preferences = Some(preferences.into());
        self
    }

    /// Component lines only: no positions, directions or style attributes.
    /// This is the form handed to a solver.
    pub fn bare(mut self) -> Self {
        self.bare = true;
        self
    }

    pub fn write(&self) -> String {
        let mut out = String::new();
        if let Some((tool, version)) = &self.header {
            out.push_str(&format!("{}{} V{}\n", HEADER_PREFIX, tool, version));
        }

        if !self.bare {
            let placed: Vec<String> = self
                .circuit
                .nodes()
                .filter_map(|n| n.position.map(|p| format!("{}@({}, {})", n.name, p.x, p.y)))
                .collect();
            if !placed.is_empty() {
                out.push_str(&format!("; {}{{{}}}\n", NODES_DIRECTIVE, placed.join(", ")));
            }
        }

        for component in self.circuit.components() {
            out.push_str(&self.component_line(component));
            out.push('\n');
        }

        if let Some(preferences) = self.preferences.as_deref().filter(|p| !p.is_empty()) {
            out.push_str(&format!("; {}\n", preferences));
        }
        out
    }

    /// One component line, without trailing newline.
    pub fn component_line(&self, component: &Component) -> String {
        let ctype = component.ctype;
        let nodes = component.nodes();
        let mut parts: Vec<&str> = vec![component.name.as_str()];
        if ctype == ComponentType::Opamp {
            parts.extend([nodes[0].as_str(), nodes[1].as_str(), OPAMP_KIND]);
            parts.extend([nodes[2].as_str(), nodes[3].as_str()]);
        } else {
            parts.extend(nodes.iter().map(String::as_str));
        }
        if ctype.is_source() && !component.kind.is_empty() {
            parts.push(&component.kind);
        }
        if let Some(control) = component.control.as_deref().filter(|_| ctype.needs_control()) {
            parts.push(control);
        }
        if let Some(value) = component.value.as_deref() {
            parts.push(value);
        }
        let mut line = parts.join(" ");

        let mut attributes = Vec::new();
        if !self.bare {
            let direction = self
                .circuit
                .terminal_positions(&component.name)
                .and_then(|positions| ctype.body_endpoints(&positions))
                .and_then(|(p1, p2)| direction_attribute(p1, p2));
            attributes.extend(direction);
        }
        let inline_kind = ctype.is_source() || ctype == ComponentType::Opamp;
        if !inline_kind && component.kind != ctype.default_kind() {
            attributes.push(format!("kind={}", component.kind));
        }
        if !self.bare && !component.attributes.is_empty() {
            attributes.push(component.attributes.clone());
        }
        if !attributes.is_empty() {
            line.push_str("; ");
            line.push_str(&attributes.join(", "));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Created by schemedit V0.1.0
; nodes={1@(0, 4), 2@(0, 0), 3@(4, 4), 0@(4, 0)}
R1 1 2 10; down=2
V1 3 0 dc 5; down=2
W1 2 0; right=2
W2 1 3; right=2, color=blue
; label_nodes=alpha, draw_nodes=connections, label_cpts=name, style=american
";

    #[test]
    fn test_parse_sample() {
        let parsed = NetlistParser::parse(SAMPLE).unwrap();
        let circuit = &parsed.circuit;
        assert_eq!(circuit.component_count(), 4);
        assert_eq!(circuit.metadata.created_by.as_deref(), Some("schemedit"));
        assert_eq!(circuit.metadata.version.as_deref(), Some("0.1.0"));

        let v1 = circuit.component("V1").unwrap();
        assert_eq!(v1.kind, "dc");
        assert_eq!(v1.value.as_deref(), Some("5"));

        let w2 = circuit.component("W2").unwrap();
        assert_eq!(w2.attributes, "color=blue");

        assert_eq!(circuit.node("2").unwrap().position, Some(Position::new(0.0, 0.0)));
        assert_eq!(
            parsed.preferences.as_deref(),
            Some("label_nodes=alpha, draw_nodes=connections, label_cpts=name, style=american")
        );
    }

    #[test]
    fn test_last_preferences_directive_wins() {
        let parsed = NetlistParser::parse("R1 1 2\n; style=british\n; style=european\n").unwrap();
        assert_eq!(parsed.preferences.as_deref(), Some("style=european"));
    }

    #[test]
    fn test_rejects_circuitikz() {
        let err = NetlistParser::parse("\\begin{tikzpicture}\n\\end{tikzpicture}\n").unwrap_err();
        assert!(matches!(err, NetlistParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_unknown_component() {
        let err = NetlistParser::parse("R1 1 2\nX1 3 4\n").unwrap_err();
        assert!(matches!(err, NetlistParseError::UnknownComponent { line: 2, .. }));
    }

    #[test]
    fn test_short_line() {
        let err = NetlistParser::parse("M1 1 2").unwrap_err();
        assert!(matches!(err, NetlistParseError::InvalidLine { line: 1, .. }));
    }

    #[test]
    fn test_opamp_and_controlled_sources() {
        let parsed = NetlistParser::parse("E1 6 7 opamp 8 9\nE2 1 2 3 4 10\nV1 5 0 1\nF1 4 5 V1 2\n").unwrap();
        let circuit = parsed.circuit;
        let opamp = circuit.component("E1").unwrap();
        assert_eq!(opamp.ctype, ComponentType::Opamp);
        assert_eq!(opamp.nodes(), &["6", "7", "8", "9"]);
        assert_eq!(circuit.component("E2").unwrap().ctype, ComponentType::Vcvs);
        assert_eq!(circuit.component("V1").unwrap().kind, "");
        let f1 = circuit.component("F1").unwrap();
        assert_eq!(f1.control.as_deref(), Some("V1"));
        assert_eq!(f1.value.as_deref(), Some("2"));
    }

    #[test]
    fn test_kind_attribute_and_flag() {
        let parsed = NetlistParser::parse("M1 1 2 3; up=2, kind=pmos\nW1 4 0; down, ground\n").unwrap();
        assert_eq!(parsed.circuit.component("M1").unwrap().kind, "pmos");
        assert_eq!(parsed.circuit.component("W1").unwrap().kind, "ground");
        assert!(parsed.circuit.component("W1").unwrap().attributes.is_empty());
    }

    #[test]
    fn test_node_positions_directive() {
        let positions = parse_node_positions("{1@(0, 0), out@(2.5, -1)}").unwrap();
        assert_eq!(positions[1], ("out".to_string(), Position::new(2.5, -1.0)));
        assert!(parse_node_positions("{1@(0 0)}").is_err());
        assert!(parse_node_positions("1@(0, 0)").is_err());
    }

    #[test]
    fn test_direction_attribute() {
        let origin = Position::origin();
        assert_eq!(direction_attribute(origin, Position::new(0.0, -4.0)).unwrap(), "down=2");
        assert_eq!(direction_attribute(origin, Position::new(-1.0, 0.0)).unwrap(), "left=0.5");
        assert_eq!(direction_attribute(origin, Position::new(2.0, 2.0)).unwrap(), "rotate=45");
        assert!(direction_attribute(origin, origin).is_none());
    }

    #[test]
    fn test_positions_written_exactly() {
        let mut circuit = Circuit::new();
        circuit.add_component(ComponentType::Resistor, "", &["1", "2"]).unwrap();
        circuit.set_node_position("1", Position::new(0.0, -4.0)).unwrap();
        circuit
            .set_node_position("2", Position::new(1.0 / 3.0, 2.123456789))
            .unwrap();

        let text = NetlistWriter::new(&circuit).write();
        assert!(text.starts_with("; nodes={1@(0, -4), 2@(0.3333333333333333, 2.123456789)}\n"));

        let parsed = NetlistParser::parse(&text).unwrap();
        assert_eq!(parsed.circuit, circuit);
    }

    #[test]
    fn test_unplaced_nodes_wait_for_layout() {
        let mut parsed = NetlistParser::parse("R1 1 2; right=2\n").unwrap();
        assert!(parsed.circuit.nodes().all(|n| n.position.is_none()));

        parsed.layout_unplaced();
        let p1 = parsed.circuit.node("1").unwrap().position.unwrap();
        let p2 = parsed.circuit.node("2").unwrap().position.unwrap();
        assert_eq!(p2 - p1, Position::new(4.0, 0.0));
    }

    #[test]
    fn test_descriptive_component_names() {
        let parsed = NetlistParser::parse("Vin 1 0 dc 5\nRload 1 0 1k\nTF1 1 0 2 3\n").unwrap();
        let circuit = parsed.circuit;
        assert_eq!(circuit.component("Vin").unwrap().ctype, ComponentType::VoltageSource);
        assert_eq!(circuit.component("Vin").unwrap().value.as_deref(), Some("5"));
        assert_eq!(circuit.component("Rload").unwrap().ctype, ComponentType::Resistor);
        assert_eq!(circuit.component("TF1").unwrap().ctype, ComponentType::Transformer);
    }

    #[test]
    fn test_write_component_lines() {
        let parsed = NetlistParser::parse(SAMPLE).unwrap();
        let text = NetlistWriter::new(&parsed.circuit).write();
        assert!(text.starts_with("; nodes={"));
        assert!(text.contains("R1 1 2 10; down=2\n"));
        assert!(text.contains("V1 3 0 dc 5; down=2\n"));
        assert!(text.contains("W2 1 3; right=2, color=blue\n"));

        let bare = NetlistWriter::new(&parsed.circuit).bare().write();
        assert_eq!(bare, "R1 1 2 10\nV1 3 0 dc 5\nW1 2 0\nW2 1 3\n");
    }
}
