//! Key bindings
//!
//! Single-letter keys create components; connection keys create ground
//! connections; control chords drive editing commands.

use crate::circuit::{ComponentType, Thing, OPAMP_KIND};

/// A key that creates something
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub key: &'static str,
    pub label: &'static str,
    pub ctype: ComponentType,
    pub kind: &'static str,
}

impl KeyBinding {
    pub fn thing(&self) -> Thing {
        Thing::with_kind(self.ctype, self.kind)
    }
}

const fn bind(key: &'static str, label: &'static str, ctype: ComponentType, kind: &'static str) -> KeyBinding {
    KeyBinding { key, label, ctype, kind }
}

pub const COMPONENT_KEYS: &[KeyBinding] = &[
    bind("c", "Capacitor", ComponentType::Capacitor, ""),
    bind("d", "Diode", ComponentType::Diode, ""),
    bind("e", "VCVS", ComponentType::Vcvs, ""),
    bind("f", "CCCS", ComponentType::Cccs, ""),
    bind("g", "VCCS", ComponentType::Vccs, ""),
    bind("h", "CCVS", ComponentType::Ccvs, ""),
    bind("i", "Current source", ComponentType::CurrentSource, "dc"),
    bind("j", "JFET", ComponentType::Jfet, "njf"),
    bind("l", "Inductor", ComponentType::Inductor, ""),
    bind("m", "MOSFET", ComponentType::Mosfet, "nmos"),
    bind("o", "Opamp", ComponentType::Opamp, OPAMP_KIND),
    bind("p", "Port", ComponentType::Port, ""),
    bind("q", "BJT", ComponentType::Bjt, "npn"),
    bind("r", "Resistor", ComponentType::Resistor, ""),
    bind("t", "Transformer", ComponentType::Transformer, ""),
    bind("v", "Voltage source", ComponentType::VoltageSource, "dc"),
    bind("w", "Wire", ComponentType::Wire, ""),
    bind("y", "Admittance", ComponentType::Admittance, ""),
    bind("z", "Impedance", ComponentType::Impedance, ""),
];

pub const CONNECTION_KEYS: &[KeyBinding] = &[
    bind("0", "Ground", ComponentType::Wire, "ground"),
    bind("0V", "0V", ComponentType::Wire, "0V"),
    bind("ground", "Ground", ComponentType::Wire, "ground"),
    bind("sground", "Signal ground", ComponentType::Wire, "sground"),
    bind("rground", "Rail ground", ComponentType::Wire, "rground"),
    bind("cground", "Chassis ground", ComponentType::Wire, "cground"),
];

pub fn component_binding(key: &str) -> Option<&'static KeyBinding> {
    COMPONENT_KEYS.iter().find(|b| b.key == key)
}

pub fn connection_binding(key: &str) -> Option<&'static KeyBinding> {
    CONNECTION_KEYS.iter().find(|b| b.key == key)
}

/// Component or connection created by `key`.
pub fn thing_for_key(key: &str) -> Option<Thing> {
    component_binding(key)
        .or_else(|| connection_binding(key))
        .map(KeyBinding::thing)
}

/// Editing command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Undo,
    Redo,
    Escape,
    Delete,
    Copy,
    Cut,
    Paste,
}

pub fn command_for_key(key: &str) -> Option<Command> {
    match key {
        "ctrl+z" => Some(Command::Undo),
        "ctrl+y" => Some(Command::Redo),
        "escape" => Some(Command::Escape),
        "delete" | "backspace" => Some(Command::Delete),
        "ctrl+c" => Some(Command::Copy),
        "ctrl+x" => Some(Command::Cut),
        "ctrl+v" => Some(Command::Paste),
        _ => None,
    }
}
