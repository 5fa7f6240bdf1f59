//! Editor preferences and fixed editing constants
//!
//! Preferences persist as pretty JSON. The subset that affects how a
//! schematic looks also travels inside the schematic file as the `;`
//! preferences directive.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::core::SchematicError;

/// Fixed editing constants (schematic units)
pub struct EditorConfig;

impl EditorConfig {
    /// Schematic units per unit of direction-attribute size.
    pub const STEP: f64 = 2.0;
    /// Default grid snap spacing.
    pub const SNAP: f64 = 1.0;
    /// Smallest body length a component can be created with.
    pub const MIN_DISTANCE: f64 = 0.2;
    /// Pick and snap radius.
    pub const CLOSE_THRESHOLD: f64 = 0.3;
    pub const TRANSISTOR_OFFSET: f64 = crate::circuit::kinds::TRANSISTOR_OFFSET;
    /// Initial length of a component created by mouse-down.
    pub const PLACEMENT_DELTA: f64 = 0.1;
}

/// Placement interaction style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Place two cursors, then press a component key.
    #[default]
    TwoCursor,
    /// Arm with a component key, then press-drag-release.
    DragToPlace,
}

/// What to write next to each component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LabelComponents {
    #[serde(rename = "none")]
    None,
    #[default]
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "value")]
    Value,
    #[serde(rename = "name+value")]
    NameAndValue,
}

/// Which nodes get a junction dot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawNodes {
    None,
    All,
    /// Only nodes joining three or more terminals.
    #[default]
    Connections,
    Primary,
}

/// Which nodes get a name label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelNodes {
    None,
    All,
    /// User-labelled (alphabetic) nodes only.
    #[default]
    Alpha,
}

/// Symbol style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    American,
    British,
    European,
}

macro_rules! keyword_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = SchematicError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(SchematicError::Preferences(format!(
                        "invalid {} value: {}",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

keyword_enum!(LabelComponents {
    None => "none",
    Name => "name",
    Value => "value",
    NameAndValue => "name+value",
});

keyword_enum!(DrawNodes {
    None => "none",
    All => "all",
    Connections => "connections",
    Primary => "primary",
});

keyword_enum!(LabelNodes {
    None => "none",
    All => "all",
    Alpha => "alpha",
});

keyword_enum!(Style {
    American => "american",
    British => "british",
    European => "european",
});

/// User preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub label_cpts: LabelComponents,
    pub draw_nodes: DrawNodes,
    pub label_nodes: LabelNodes,
    pub style: Style,
    /// Junction dot radius.
    pub node_size: f64,
    pub node_color: String,
    pub grid: bool,
    pub snap_grid: bool,
    pub grid_spacing: f64,
    pub mode: EditMode,
    /// Maximum number of undo records kept.
    pub undo_depth: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            label_cpts: LabelComponents::default(),
            draw_nodes: DrawNodes::default(),
            label_nodes: LabelNodes::default(),
            style: Style::default(),
            node_size: 0.1,
            node_color: "black".to_string(),
            grid: true,
            snap_grid: true,
            grid_spacing: EditorConfig::SNAP,
            mode: EditMode::default(),
            undo_depth: 100,
        }
    }
}

impl Preferences {
    pub fn with_mode(mut self, mode: EditMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_snap_grid(mut self, snap: bool) -> Self {
        self.snap_grid = snap;
        self
    }

    /// Load preferences from a JSON file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self, SchematicError> {
        let content = std::fs::read_to_string(path)?;
        let prefs = serde_json::from_str(&content)
            .map_err(|e| SchematicError::Preferences(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Loaded preferences from {}", path.display());
        Ok(prefs)
    }

    pub fn save(&self, path: &Path) -> Result<(), SchematicError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SchematicError::Preferences(e.to_string()))?;
        std::fs::write(path, content)?;
        tracing::info!("Saved preferences to {}", path.display());
        Ok(())
    }

    /// The schematic-affecting subset as a netlist directive body.
    pub fn schematic_preferences(&self) -> String {
        format!(
            "label_nodes={}, draw_nodes={}, label_cpts={}, style={}",
            self.label_nodes, self.draw_nodes, self.label_cpts, self.style
        )
    }

    /// Apply a directive produced by [`Preferences::schematic_preferences`].
    /// Unknown keys are ignored; a bad value for a known key is an error and
    /// leaves the preferences unchanged.
    pub fn apply_schematic_preferences(&mut self, directive: &str) -> Result<(), SchematicError> {
        let mut updated = self.clone();
        for (key, value) in crate::circuit::schema::split_attributes(directive) {
            let Some(value) = value else {
                continue;
            };
            match key {
                "label_nodes" => updated.label_nodes = value.parse()?,
                "draw_nodes" => updated.draw_nodes = value.parse()?,
                "label_cpts" => updated.label_cpts = value.parse()?,
                "style" => updated.style = value.parse()?,
                other => tracing::debug!("Ignoring schematic preference {}", other),
            }
        }
        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schematic_preferences_roundtrip() {
        let prefs = Preferences {
            label_cpts: LabelComponents::NameAndValue,
            draw_nodes: DrawNodes::All,
            ..Default::default()
        };
        let directive = prefs.schematic_preferences();
        assert_eq!(
            directive,
            "label_nodes=alpha, draw_nodes=all, label_cpts=name+value, style=american"
        );

        let mut other = Preferences::default();
        other.apply_schematic_preferences(&directive).unwrap();
        assert_eq!(other.label_cpts, LabelComponents::NameAndValue);
        assert_eq!(other.draw_nodes, DrawNodes::All);
    }

    #[test]
    fn test_bad_value_leaves_preferences() {
        let mut prefs = Preferences::default();
        let err = prefs.apply_schematic_preferences("draw_nodes=all, style=gothic");
        assert!(matches!(err, Err(SchematicError::Preferences(_))));
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn test_json_missing_fields_default() {
        let prefs: Preferences = serde_json::from_str(r#"{"mode": "drag_to_place"}"#).unwrap();
        assert_eq!(prefs.mode, EditMode::DragToPlace);
        assert_eq!(prefs.undo_depth, 100);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let prefs = Preferences::default().with_mode(EditMode::DragToPlace);
        prefs.save(&path).unwrap();
        assert_eq!(Preferences::load(&path).unwrap(), prefs);
    }
}
