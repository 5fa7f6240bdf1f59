//! Circuit data types
//!
//! Nodes (electrical junctions), components (typed elements bound to nodes
//! through ordered terminals) and the closed set of component types.

use serde::{Deserialize, Serialize};

use crate::geometry::Position;

/// Electrical type of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Resistor,
    Capacitor,
    Inductor,
    Impedance,
    Admittance,
    VoltageSource,
    CurrentSource,
    /// Voltage-controlled voltage source
    Vcvs,
    /// Voltage-controlled current source
    Vccs,
    /// Current-controlled current source
    Cccs,
    /// Current-controlled voltage source
    Ccvs,
    Opamp,
    Diode,
    Bjt,
    Jfet,
    Mosfet,
    Transformer,
    Wire,
    Port,
}

impl ComponentType {
    pub const ALL: [ComponentType; 19] = [
        ComponentType::Resistor,
        ComponentType::Capacitor,
        ComponentType::Inductor,
        ComponentType::Impedance,
        ComponentType::Admittance,
        ComponentType::VoltageSource,
        ComponentType::CurrentSource,
        ComponentType::Vcvs,
        ComponentType::Vccs,
        ComponentType::Cccs,
        ComponentType::Ccvs,
        ComponentType::Opamp,
        ComponentType::Diode,
        ComponentType::Bjt,
        ComponentType::Jfet,
        ComponentType::Mosfet,
        ComponentType::Transformer,
        ComponentType::Wire,
        ComponentType::Port,
    ];

    /// Name prefix encoding the type ("R", "TF", ...). The opamp shares "E"
    /// with the VCVS and is told apart by its kind.
    pub fn prefix(&self) -> &'static str {
        self.info().prefix
    }

    /// Resolve the type from a component name and kind. The longest
    /// matching prefix wins ("TF1" is a transformer, "Rload" a resistor).
    pub fn from_name(name: &str, kind: &str) -> Option<ComponentType> {
        let ctype = Self::ALL
            .iter()
            .copied()
            .filter(|t| *t != ComponentType::Opamp && name.starts_with(t.prefix()))
            .max_by_key(|t| t.prefix().len())?;
        if ctype == ComponentType::Vcvs && kind == OPAMP_KIND {
            return Some(ComponentType::Opamp);
        }
        Some(ctype)
    }

    /// Whether `name` names a component of this type: its prefix followed
    /// by at least one more character.
    pub fn accepts_name(&self, name: &str) -> bool {
        name.len() > self.prefix().len()
            && Self::from_name(name, "").map(|t| t.prefix()) == Some(self.prefix())
    }

    pub fn arity(&self) -> usize {
        self.info().arity
    }

    pub fn default_kind(&self) -> &'static str {
        self.info().default_kind
    }

    /// Current-controlled sources name their controlling component.
    pub fn needs_control(&self) -> bool {
        matches!(self, ComponentType::Cccs | ComponentType::Ccvs)
    }

    pub fn is_source(&self) -> bool {
        matches!(self, ComponentType::VoltageSource | ComponentType::CurrentSource)
    }

    /// Attribute flags editable on this type, with their labels.
    pub fn extra_fields(&self) -> &'static [(&'static str, &'static str)] {
        self.info().extra_fields
    }

    pub fn accepts_kind(&self, kind: &str) -> bool {
        self.info().kinds.contains(&kind)
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.info().label)
    }
}

/// Kind keyword that turns an "E" component into an opamp.
pub const OPAMP_KIND: &str = "opamp";

/// Name of the reference (ground) node.
pub const GROUND_NODE: &str = "0";

/// Ground node or one of its aliases (`0_2`), which are the same
/// electrical node drawn at different places.
pub fn is_ground_node(name: &str) -> bool {
    name == GROUND_NODE || name.strip_prefix("0_").map(|s| !s.is_empty()).unwrap_or(false)
}

/// Electrical junction shared by component terminals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub position: Option<Position>,
    /// Number of terminal bindings referencing this node.
    pub count: usize,
    /// Terminal of a port component.
    pub port: bool,
    /// False for nodes a component deliberately leaves undrawn.
    pub drawn: bool,
    /// Rendered as a symbol (e.g. ground) rather than a junction.
    pub implicit: bool,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: None,
            count: 0,
            port: false,
            drawn: true,
            implicit: false,
        }
    }

    /// Auto-generated or user-facing node. Underscore-prefixed names and
    /// multi-part generated names (`3_1`) are secondary.
    pub fn is_primary(&self) -> bool {
        let name = self.name.as_str();
        let parts = name.split('_').count();
        let starts_digit = name.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false);
        !name.starts_with('_') && parts <= 2 && !(starts_digit && parts != 1)
    }

    /// User-labelled nodes start with a letter.
    pub fn is_labelled(&self) -> bool {
        self.name.chars().next().map(|c| c.is_alphabetic()).unwrap_or(false)
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.position {
            Some(p) => write!(f, "{}@{}", self.name, p),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A typed circuit element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub ctype: ComponentType,
    pub kind: String,
    /// Terminal bindings in terminal order. Only the store rebinds these so
    /// node counts stay consistent.
    pub(crate) nodes: Vec<String>,
    pub value: Option<String>,
    /// Name of the controlling component (current-controlled sources).
    pub control: Option<String>,
    /// Free-form style and placement directives.
    pub attributes: String,
}

impl Component {
    pub fn new(name: impl Into<String>, ctype: ComponentType, nodes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            ctype,
            kind: ctype.default_kind().to_string(),
            nodes,
            value: None,
            control: None,
            attributes: String::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_control(mut self, control: impl Into<String>) -> Self {
        self.control = Some(control.into());
        self
    }

    pub fn with_attributes(mut self, attributes: impl Into<String>) -> Self {
        self.attributes = attributes.into();
        self
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// `scale=` attribute, 1 when absent or malformed.
    pub fn scale(&self) -> f64 {
        attribute_value(&self.attributes, "scale")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|s| *s > 0.0)
            .unwrap_or(1.0)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        split_attributes(&self.attributes)
            .any(|(key, value)| key == flag && value.is_none())
    }

    /// Add or drop a bare attribute flag, keeping the other attributes in
    /// order.
    pub fn set_flag(&mut self, flag: &str, on: bool) {
        let mut items: Vec<String> = split_attributes(&self.attributes)
            .filter(|(key, _)| *key != flag)
            .map(|(key, value)| match value {
                Some(value) => format!("{}={}", key, value),
                None => key.to_string(),
            })
            .collect();
        if on {
            items.push(flag.to_string());
        }
        self.attributes = items.join(", ");
    }
}

/// Split an attribute string into `(key, Some(value))` / `(flag, None)` pairs.
pub fn split_attributes(attributes: &str) -> impl Iterator<Item = (&str, Option<&str>)> {
    attributes
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| match item.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (item, None),
        })
}

pub fn attribute_value<'a>(attributes: &'a str, key: &str) -> Option<&'a str> {
    split_attributes(attributes)
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| v)
}

/// A type + kind pair waiting to be placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    pub ctype: ComponentType,
    pub kind: String,
}

impl Thing {
    pub fn new(ctype: ComponentType) -> Self {
        Self {
            ctype,
            kind: ctype.default_kind().to_string(),
        }
    }

    pub fn with_kind(ctype: ComponentType, kind: impl Into<String>) -> Self {
        Self {
            ctype,
            kind: kind.into(),
        }
    }
}

/// Everything needed to recreate a component verbatim, including where its
/// terminal nodes were.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDef {
    pub component: Component,
    pub terminals: Vec<(String, Option<Position>)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_from_name() {
        assert_eq!(ComponentType::from_name("R12", ""), Some(ComponentType::Resistor));
        assert_eq!(ComponentType::from_name("TF1", ""), Some(ComponentType::Transformer));
        assert_eq!(ComponentType::from_name("E1", ""), Some(ComponentType::Vcvs));
        assert_eq!(ComponentType::from_name("E1", "opamp"), Some(ComponentType::Opamp));
        assert_eq!(ComponentType::from_name("X1", ""), None);
    }

    #[test]
    fn test_descriptive_names() {
        assert_eq!(ComponentType::from_name("Vin", ""), Some(ComponentType::VoltageSource));
        assert_eq!(ComponentType::from_name("Rload", ""), Some(ComponentType::Resistor));
        assert_eq!(ComponentType::from_name("TFout", ""), Some(ComponentType::Transformer));
        assert_eq!(ComponentType::from_name("Eamp", "opamp"), Some(ComponentType::Opamp));

        assert!(ComponentType::VoltageSource.accepts_name("Vin"));
        assert!(ComponentType::Transformer.accepts_name("TF1"));
        assert!(ComponentType::Opamp.accepts_name("E1"));
        assert!(!ComponentType::VoltageSource.accepts_name("V"));
        assert!(!ComponentType::VoltageSource.accepts_name("I1"));
    }

    #[test]
    fn test_node_primary() {
        assert!(Node::new("1").is_primary());
        assert!(Node::new("out").is_primary());
        assert!(Node::new("out_1").is_primary());
        assert!(!Node::new("_3").is_primary());
        assert!(!Node::new("3_1").is_primary());
        assert!(!Node::new("a_b_c").is_primary());
    }

    #[test]
    fn test_ground_aliases() {
        assert!(is_ground_node("0"));
        assert!(is_ground_node("0_3"));
        assert!(!is_ground_node("0_"));
        assert!(!is_ground_node("10"));
    }

    #[test]
    fn test_attributes() {
        let cpt = Component::new("R1", ComponentType::Resistor, vec!["1".into(), "2".into()])
            .with_attributes("scale=0.5, mirror, color=blue");
        assert!((cpt.scale() - 0.5).abs() < 1e-12);
        assert!(cpt.has_flag("mirror"));
        assert!(!cpt.has_flag("invert"));

        let mut cpt = cpt;
        cpt.set_flag("mirror", false);
        cpt.set_flag("invert", true);
        assert_eq!(cpt.attributes, "scale=0.5, color=blue, invert");
        assert_eq!(attribute_value(&cpt.attributes, "color"), Some("blue"));
    }
}
