//! Geometric component kinds
//!
//! Each [`ComponentType`] resolves to a static [`TypeInfo`] capability
//! record: arity, kinds, which terminals form the drawn body, and how the
//! terminals are laid out from the two anchor points the user supplies.

use crate::circuit::schema::{ComponentType, OPAMP_KIND};
use crate::geometry::{Pose, Position, Transform, POSITION_EPSILON};

/// Offset of a transistor's third terminal from the body midpoint.
pub const TRANSISTOR_OFFSET: f64 = 2.0;
/// Half the spacing between opamp inputs, and the reference node offset.
pub const OPAMP_OFFSET: f64 = 1.0;
/// Hit-test margin around a component body, before scaling.
pub const BBOX_MARGIN: f64 = 0.3;

/// Where the drawn body of a component runs between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    /// Between two terminals.
    Terminals(usize, usize),
    /// From the midpoint of two terminals to a third (opamp inputs -> output).
    Midpoint(usize, usize, usize),
}

/// Capability record of a component type
#[derive(Debug)]
pub struct TypeInfo {
    pub prefix: &'static str,
    pub label: &'static str,
    pub arity: usize,
    pub default_kind: &'static str,
    pub kinds: &'static [&'static str],
    /// Extra editable fields: (attribute flag, label).
    pub extra_fields: &'static [(&'static str, &'static str)],
    pub body: Body,
    pub can_stretch: bool,
    /// Width of the symbol body at scale 1, in schematic units.
    pub symbol_width: f64,
    /// Name of the symbol sketch handed to the sketcher, `None` if drawn
    /// with primitives only.
    pub sketch: Option<&'static str>,
}

const NO_KINDS: &[&str] = &[""];
const SOURCE_KINDS: &[&str] = &["dc", "ac", "step", ""];
const NO_FIELDS: &[(&str, &str)] = &[];
const TRANSISTOR_FIELDS: &[(&str, &str)] = &[("mirror", "Mirror"), ("invert", "Invert")];

macro_rules! two_terminal {
    ($prefix:expr, $label:expr, $sketch:expr) => {
        TypeInfo {
            prefix: $prefix,
            label: $label,
            arity: 2,
            default_kind: "",
            kinds: NO_KINDS,
            extra_fields: NO_FIELDS,
            body: Body::Terminals(0, 1),
            can_stretch: true,
            symbol_width: 1.5,
            sketch: Some($sketch),
        }
    };
}

static RESISTOR: TypeInfo = two_terminal!("R", "Resistor", "R");
static CAPACITOR: TypeInfo = two_terminal!("C", "Capacitor", "C");
static INDUCTOR: TypeInfo = two_terminal!("L", "Inductor", "L");
static IMPEDANCE: TypeInfo = two_terminal!("Z", "Impedance", "Z");
static ADMITTANCE: TypeInfo = two_terminal!("Y", "Admittance", "Y");
static CCCS: TypeInfo = two_terminal!("F", "CCCS", "F");
static CCVS: TypeInfo = two_terminal!("H", "CCVS", "H");

static VOLTAGE_SOURCE: TypeInfo = TypeInfo {
    prefix: "V",
    label: "Voltage source",
    arity: 2,
    default_kind: "dc",
    kinds: SOURCE_KINDS,
    extra_fields: NO_FIELDS,
    body: Body::Terminals(0, 1),
    can_stretch: true,
    symbol_width: 1.5,
    sketch: Some("V"),
};

static CURRENT_SOURCE: TypeInfo = TypeInfo {
    prefix: "I",
    label: "Current source",
    arity: 2,
    default_kind: "dc",
    kinds: SOURCE_KINDS,
    extra_fields: NO_FIELDS,
    body: Body::Terminals(0, 1),
    can_stretch: true,
    symbol_width: 1.5,
    sketch: Some("I"),
};

static VCVS: TypeInfo = TypeInfo {
    prefix: "E",
    label: "VCVS",
    arity: 4,
    default_kind: "",
    kinds: NO_KINDS,
    extra_fields: NO_FIELDS,
    body: Body::Terminals(0, 1),
    can_stretch: true,
    symbol_width: 1.5,
    sketch: Some("E"),
};

static VCCS: TypeInfo = TypeInfo {
    prefix: "G",
    label: "VCCS",
    arity: 4,
    default_kind: "",
    kinds: NO_KINDS,
    extra_fields: NO_FIELDS,
    body: Body::Terminals(0, 1),
    can_stretch: true,
    symbol_width: 1.5,
    sketch: Some("G"),
};

static OPAMP: TypeInfo = TypeInfo {
    prefix: "E",
    label: "Opamp",
    arity: 4,
    default_kind: OPAMP_KIND,
    kinds: &[OPAMP_KIND],
    extra_fields: &[("mirror", "Mirror")],
    body: Body::Midpoint(2, 3, 0),
    can_stretch: false,
    symbol_width: 2.0,
    sketch: Some("opamp"),
};

static DIODE: TypeInfo = TypeInfo {
    prefix: "D",
    label: "Diode",
    arity: 2,
    default_kind: "",
    kinds: &["", "led", "zener", "schottky"],
    extra_fields: NO_FIELDS,
    body: Body::Terminals(0, 1),
    can_stretch: true,
    symbol_width: 1.0,
    sketch: Some("D"),
};

static BJT: TypeInfo = TypeInfo {
    prefix: "Q",
    label: "BJT",
    arity: 3,
    default_kind: "npn",
    kinds: &["npn", "pnp"],
    extra_fields: TRANSISTOR_FIELDS,
    body: Body::Terminals(0, 2),
    can_stretch: true,
    symbol_width: 1.5,
    sketch: Some("Q"),
};

static JFET: TypeInfo = TypeInfo {
    prefix: "J",
    label: "JFET",
    arity: 3,
    default_kind: "njf",
    kinds: &["njf", "pjf"],
    extra_fields: TRANSISTOR_FIELDS,
    body: Body::Terminals(0, 2),
    can_stretch: true,
    symbol_width: 1.5,
    sketch: Some("J"),
};

static MOSFET: TypeInfo = TypeInfo {
    prefix: "M",
    label: "MOSFET",
    arity: 3,
    default_kind: "nmos",
    kinds: &["nmos", "pmos", "nmosd", "pmosd", "nfet", "pfet"],
    extra_fields: TRANSISTOR_FIELDS,
    body: Body::Terminals(0, 2),
    can_stretch: true,
    symbol_width: 1.5,
    sketch: Some("M"),
};

static TRANSFORMER: TypeInfo = TypeInfo {
    prefix: "TF",
    label: "Transformer",
    arity: 4,
    default_kind: "",
    kinds: &["", "core", "tap", "tapcore"],
    extra_fields: NO_FIELDS,
    body: Body::Terminals(2, 3),
    can_stretch: false,
    symbol_width: 1.0,
    sketch: Some("TF"),
};

static WIRE: TypeInfo = TypeInfo {
    prefix: "W",
    label: "Wire",
    arity: 2,
    default_kind: "",
    kinds: &["", "ground", "sground", "rground", "cground", "0V"],
    extra_fields: NO_FIELDS,
    body: Body::Terminals(0, 1),
    can_stretch: true,
    symbol_width: 0.0,
    sketch: None,
};

static PORT: TypeInfo = TypeInfo {
    prefix: "P",
    label: "Port",
    arity: 2,
    default_kind: "",
    kinds: NO_KINDS,
    extra_fields: NO_FIELDS,
    body: Body::Terminals(0, 1),
    can_stretch: true,
    symbol_width: 0.0,
    sketch: None,
};

impl ComponentType {
    pub fn info(&self) -> &'static TypeInfo {
        match self {
            ComponentType::Resistor => &RESISTOR,
            ComponentType::Capacitor => &CAPACITOR,
            ComponentType::Inductor => &INDUCTOR,
            ComponentType::Impedance => &IMPEDANCE,
            ComponentType::Admittance => &ADMITTANCE,
            ComponentType::VoltageSource => &VOLTAGE_SOURCE,
            ComponentType::CurrentSource => &CURRENT_SOURCE,
            ComponentType::Vcvs => &VCVS,
            ComponentType::Vccs => &VCCS,
            ComponentType::Cccs => &CCCS,
            ComponentType::Ccvs => &CCVS,
            ComponentType::Opamp => &OPAMP,
            ComponentType::Diode => &DIODE,
            ComponentType::Bjt => &BJT,
            ComponentType::Jfet => &JFET,
            ComponentType::Mosfet => &MOSFET,
            ComponentType::Transformer => &TRANSFORMER,
            ComponentType::Wire => &WIRE,
            ComponentType::Port => &PORT,
        }
    }

    /// Terminal positions, in terminal order, from the two anchor points.
    pub fn assign_positions(&self, p1: Position, p2: Position) -> Vec<Position> {
        match self {
            ComponentType::Bjt | ComponentType::Jfet | ComponentType::Mosfet => {
                let third = p1.midpoint(&p2) + perpendicular(p1, p2) * TRANSISTOR_OFFSET;
                vec![p1, third, p2]
            }
            ComponentType::Transformer => {
                let dx = 0.5 * (p1.y - p2.y);
                vec![
                    Position::new(p1.x + dx, p1.y),
                    Position::new(p2.x + dx, p2.y),
                    p1,
                    p2,
                ]
            }
            ComponentType::Vcvs | ComponentType::Vccs => vec![p1, p2, p1, p2],
            ComponentType::Opamp => {
                let perp = perpendicular(p1, p2) * OPAMP_OFFSET;
                let reference = p1.midpoint(&p2) + perp;
                vec![p2, reference, p1 - perp, p1 + perp]
            }
            _ => vec![p1, p2],
        }
    }

    /// Terminal that sits exactly on the first anchor, if any.
    pub fn anchor_terminal(&self) -> Option<usize> {
        match self.info().body {
            Body::Terminals(a, _) => Some(a),
            Body::Midpoint(..) => None,
        }
    }

    /// End points of the drawn body given the terminal positions.
    pub fn body_endpoints(&self, positions: &[Position]) -> Option<(Position, Position)> {
        match self.info().body {
            Body::Terminals(a, b) => Some((*positions.get(a)?, *positions.get(b)?)),
            Body::Midpoint(a, b, c) => {
                let start = positions.get(a)?.midpoint(positions.get(b)?);
                Some((start, *positions.get(c)?))
            }
        }
    }

    pub fn pose(&self, positions: &[Position], scale: f64) -> Option<Pose> {
        let (p1, p2) = self.body_endpoints(positions)?;
        Some(Pose::from_endpoints(p1, p2, scale))
    }

    /// Hit-test `point` against the component's box in its local frame.
    pub fn is_within_bbox(&self, positions: &[Position], scale: f64, point: Position) -> bool {
        if *self == ComponentType::Transformer {
            return axis_aligned_contains(positions, point, 0.0);
        }
        let Some(pose) = self.pose(positions, scale) else {
            return false;
        };
        if pose.length < POSITION_EPSILON {
            return false;
        }
        let frame: Transform = pose.frame();
        let local: Vec<Position> = positions.iter().map(|p| frame.invert(*p)).collect();
        axis_aligned_contains(&local, frame.invert(point), BBOX_MARGIN * scale)
    }
}

/// Unit vector perpendicular to p1 -> p2, rotated clockwise. Falls back to
/// +x for coincident points.
fn perpendicular(p1: Position, p2: Position) -> Position {
    (p2 - p1)
        .unit()
        .map(|u| u.rot90_cw())
        .unwrap_or(Position::new(1.0, 0.0))
}

fn axis_aligned_contains(points: &[Position], point: Position, margin: f64) -> bool {
    if points.is_empty() {
        return false;
    }
    let (mut xmin, mut ymin) = (f64::INFINITY, f64::INFINITY);
    let (mut xmax, mut ymax) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        xmin = xmin.min(p.x);
        xmax = xmax.max(p.x);
        ymin = ymin.min(p.y);
        ymax = ymax.max(p.y);
    }
    point.x >= xmin - margin
        && point.x <= xmax + margin
        && point.y >= ymin - margin
        && point.y <= ymax + margin
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Position, b: Position) -> bool {
        a.distance_to(&b) < 1e-9
    }

    #[test]
    fn test_bipole_identity() {
        let p1 = Position::new(1.0, 2.0);
        let p2 = Position::new(5.0, 2.0);
        assert_eq!(ComponentType::Resistor.assign_positions(p1, p2), vec![p1, p2]);
    }

    #[test]
    fn test_transistor_third_terminal() {
        let positions = ComponentType::Mosfet
            .assign_positions(Position::new(0.0, 0.0), Position::new(0.0, 4.0));
        assert_eq!(positions.len(), 3);
        assert!(close(positions[1], Position::new(2.0, 2.0)));
        let mid = Position::new(0.0, 2.0);
        assert!((positions[1].distance_to(&mid) - TRANSISTOR_OFFSET).abs() < 1e-9);
    }

    #[test]
    fn test_transformer_positions() {
        let positions = ComponentType::Transformer
            .assign_positions(Position::new(0.0, 4.0), Position::new(0.0, 0.0));
        assert_eq!(positions.len(), 4);
        assert!(close(positions[0], Position::new(2.0, 4.0)));
        assert!(close(positions[1], Position::new(2.0, 0.0)));
        assert!(close(positions[2], Position::new(0.0, 4.0)));
        assert!(close(positions[3], Position::new(0.0, 0.0)));
    }

    #[test]
    fn test_opamp_positions() {
        let positions = ComponentType::Opamp
            .assign_positions(Position::new(0.0, 0.0), Position::new(4.0, 0.0));
        assert!(close(positions[0], Position::new(4.0, 0.0)));
        let (start, end) = ComponentType::Opamp.body_endpoints(&positions).unwrap();
        assert!(close(start, Position::new(0.0, 0.0)));
        assert!(close(end, Position::new(4.0, 0.0)));
    }

    #[test]
    fn test_bbox_rotated() {
        let positions = vec![Position::new(0.0, 0.0), Position::new(0.0, 4.0)];
        let r = ComponentType::Resistor;
        assert!(r.is_within_bbox(&positions, 1.0, Position::new(0.1, 2.0)));
        assert!(!r.is_within_bbox(&positions, 1.0, Position::new(1.0, 2.0)));
        assert!(!r.is_within_bbox(&positions, 1.0, Position::new(0.0, 5.0)));
    }

    #[test]
    fn test_every_type_has_arity_positions() {
        for t in ComponentType::ALL {
            let positions = t.assign_positions(Position::new(0.0, 0.0), Position::new(0.0, 4.0));
            assert_eq!(positions.len(), t.arity(), "{}", t);
            assert!(t.accepts_kind(t.default_kind()), "{}", t);
        }
    }
}
