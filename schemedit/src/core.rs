//! Error taxonomy and file-level schematic API.
//! No UI or solver dependencies.

use std::path::Path;

use crate::adapters::analysis::AnalysisError;
use crate::circuit::{Circuit, ComponentType};
use crate::parser::netlist::{NetlistParseError, NetlistParser, NetlistWriter};
use crate::preferences::Preferences;

/// Tool name written into the schematic header.
pub const TOOL_NAME: &str = "schemedit";
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum SchematicError {
    #[error("Unknown {what} {name}")]
    NotFound { what: &'static str, name: String },
    #[error("Duplicate name: {0}")]
    DuplicateName(String),
    #[error("{ctype} {name} needs {expected} terminals, got {actual}")]
    InvalidTerminalCount {
        name: String,
        ctype: ComponentType,
        expected: usize,
        actual: usize,
    },
    #[error("Nodes too close to create component ({distance} < {minimum})")]
    TooClose { distance: f64, minimum: f64 },
    #[error("Cannot merge node {0} with itself")]
    SelfMerge(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Cannot rename {from} to {to}: name must be {prefix} followed by a suffix")]
    InvalidRename {
        from: String,
        to: String,
        prefix: String,
    },
    #[error("Invalid kind {kind:?} for {ctype}")]
    InvalidKind { ctype: ComponentType, kind: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Preferences error: {0}")]
    Preferences(String),
}

impl SchematicError {
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        SchematicError::NotFound {
            what,
            name: name.into(),
        }
    }
}

impl From<NetlistParseError> for SchematicError {
    fn from(e: NetlistParseError) -> Self {
        match e {
            NetlistParseError::UnsupportedFormat(what) => SchematicError::UnsupportedFormat(what),
            other => SchematicError::Parse(other.to_string()),
        }
    }
}

/// A loaded schematic: the circuit plus the preferences directive it
/// carried, if any.
#[derive(Debug, Clone)]
pub struct SchematicFile {
    pub circuit: Circuit,
    pub preferences: Option<String>,
}

impl SchematicFile {
    /// Apply the carried directive on top of `preferences`.
    pub fn apply_preferences(&self, preferences: &mut Preferences) -> Result<(), SchematicError> {
        match &self.preferences {
            Some(directive) => preferences.apply_schematic_preferences(directive),
            None => Ok(()),
        }
    }
}

/// Parse schematic text.
pub fn parse_schematic(content: &str) -> Result<SchematicFile, SchematicError> {
    let mut parsed = NetlistParser::parse(content)?;
    parsed.layout_unplaced();
    Ok(SchematicFile {
        circuit: parsed.circuit,
        preferences: parsed.preferences,
    })
}

/// Read and parse a schematic file.
pub fn load_schematic(path: &Path) -> Result<SchematicFile, SchematicError> {
    let content = std::fs::read_to_string(path)?;
    let file = parse_schematic(&content)?;
    tracing::info!(
        "Loaded {} ({} components, {} nodes)",
        path.display(),
        file.circuit.component_count(),
        file.circuit.node_count()
    );
    Ok(file)
}

/// Schematic text with header, node positions and preferences directive.
pub fn schematic_text(circuit: &Circuit, preferences: &Preferences) -> String {
    NetlistWriter::new(circuit)
        .with_header(TOOL_NAME, TOOL_VERSION)
        .with_preferences(preferences.schematic_preferences())
        .write()
}

pub fn save_schematic(
    path: &Path,
    circuit: &Circuit,
    preferences: &Preferences,
) -> Result<(), SchematicError> {
    std::fs::write(path, schematic_text(circuit, preferences))?;
    tracing::info!("Saved {}", path.display());
    Ok(())
}
