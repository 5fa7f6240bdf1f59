//! Schematic format detection
//!
//! Schematic files are plain netlists. Circuitikz macro files share the
//! extension family but cannot be edited, so they are recognised and
//! rejected before parsing.

/// Kind of text handed to the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetlistFormat {
    /// Netlist with optional header and directives
    Schematic,
    /// Circuitikz `\begin{tikzpicture}` source
    CircuitikzMacro,
    /// Nothing but whitespace
    Empty,
}

impl NetlistFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetlistFormat::Schematic => "schematic",
            NetlistFormat::CircuitikzMacro => "circuitikz macro",
            NetlistFormat::Empty => "empty",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, NetlistFormat::CircuitikzMacro)
    }
}

/// Classify file content by its first non-blank line.
pub fn detect_format(content: &str) -> NetlistFormat {
    let Some(first) = content.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return NetlistFormat::Empty;
    };
    if first.starts_with(r"\begin{tikz") {
        NetlistFormat::CircuitikzMacro
    } else {
        NetlistFormat::Schematic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(detect_format(""), NetlistFormat::Empty);
        assert_eq!(detect_format("  \n\n"), NetlistFormat::Empty);
        assert_eq!(detect_format("R1 1 2\n"), NetlistFormat::Schematic);
        assert_eq!(
            detect_format("\n\\begin{tikzpicture}\n\\draw (0,0) to[R] (2,0);\n"),
            NetlistFormat::CircuitikzMacro
        );
        assert!(!NetlistFormat::CircuitikzMacro.is_supported());
    }
}
