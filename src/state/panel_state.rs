use serde::{Deserialize, Serialize};

/// What a primary-button drag does in the plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DragMode {
    #[default]
    Orbit,
    Lasso,
    Pan,
}

impl DragMode {
    pub const ALL: [DragMode; 3] = [DragMode::Orbit, DragMode::Lasso, DragMode::Pan];

    pub fn label(&self) -> &'static str {
        match self {
            DragMode::Orbit => "Orbit",
            DragMode::Lasso => "Lasso",
            DragMode::Pan => "Pan",
        }
    }

    pub fn tooltip(&self) -> &'static str {
        match self {
            DragMode::Orbit => "Orbit mode - rotate and zoom",
            DragMode::Lasso => "Lasso mode - select points",
            DragMode::Pan => "Pan mode - move the plot",
        }
    }
}

/// Panel-scoped choices that survive re-renders of one panel instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelState {
    pub visualization_key: Option<String>,
    /// Colour-by field path; `None` means uncoloured.
    pub color_by: Option<String>,
    pub drag_mode: DragMode,
}
