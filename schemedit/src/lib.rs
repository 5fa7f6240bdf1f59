//! schemedit - interactive schematic-capture editing core
//!
//! This library holds everything a schematic editor needs except the
//! toolkit: a circuit store with exact node bookkeeping, geometric
//! component kinds, a netlist text codec, a cursor/drag interaction state
//! machine and undo/redo history.
//!
//! # Quick Start
//!
//! ```no_run
//! use schemedit::prelude::*;
//! use schemedit::adapters::headless::{HeadlessSketcher, MessageLog};
//!
//! let mut editor = Editor::new(Box::new(HeadlessSketcher::new()), Box::new(MessageLog::new()));
//!
//! // Two clicks place the cursors, a key creates the component.
//! editor.on_left_click(Position::new(0.0, 0.0));
//! editor.on_left_click(Position::new(0.0, 4.0));
//! editor.on_key("r");
//!
//! println!("{}", editor.circuit().serialize());
//! ```
//!
//! # Features
//!
//! - **Circuit store**: components, nodes, join/split/detach, connectivity
//! - **Netlist codec**: load and save schematic files with node positions
//! - **Editor**: two-cursor and drag-to-place interaction, clipboard
//! - **History**: reversible add/delete/move/edit records
//! - **Analysis**: off-thread requests to an external solver

pub mod adapters;
pub mod circuit;
pub mod core;
pub mod editor;
pub mod geometry;
pub mod parser;
pub mod preferences;

// Re-export main types
pub use crate::core::{
    load_schematic, parse_schematic, save_schematic, schematic_text, SchematicError, SchematicFile,
};
pub use adapters::analysis::{AnalysisBackend, AnalysisError, AnalysisRequest, Quantity, Target};
pub use adapters::{DrawHandle, Notifier, Sketcher};
pub use circuit::{Circuit, Component, ComponentDef, ComponentType, Node, Thing};
pub use editor::{ContextMenu, Editor, EditorState, History, HistoryEvent, Selected};
pub use geometry::Position;
pub use parser::{NetlistFormat, NetlistParser, NetlistWriter};
pub use preferences::{EditMode, EditorConfig, Preferences};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Circuit, Component, ComponentType, ContextMenu, Editor, EditMode, EditorState, HistoryEvent,
        Position, Preferences, SchematicError, Selected, Thing,
    };
}
