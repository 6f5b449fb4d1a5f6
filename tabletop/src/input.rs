//! Input model: tools, fog draw modes, and the gesture state machine.
//!
//! This module defines the types consumed by the interaction engine. `Tool`
//! captures the user's intent at the time of a pointer event and gates which
//! component a gesture reaches. `InputState` is the active gesture being
//! tracked between pointer-down and pointer-up, carrying all context needed to
//! compute incremental deltas and emit final mutations on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::doc::TokenId;

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pointer / token-selection tool (default).
    #[default]
    Select,
    /// Drag the viewport.
    Pan,
    /// Distance ruler.
    Measure,
    /// Draw fog shapes.
    Fog,
}

/// Whether fog drawing hides or reveals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FogMode {
    /// Paint more fog (source-over).
    #[default]
    Hide,
    /// Punch a reveal hole (destination-out).
    Reveal,
}

/// Which fog shape the fog tool draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FogShapeKind {
    #[default]
    Rect,
    Circle,
    Polygon,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// Grid overlay rendering style. Display-only, never synchronized.
#[derive(Debug, Clone)]
pub struct GridStyle {
    /// Whether the grid overlay is drawn at all.
    pub visible: bool,
    /// Line color as a CSS color string.
    pub color: String,
    /// Line opacity in `[0, 1]`.
    pub opacity: f64,
}

impl Default for GridStyle {
    fn default() -> Self {
        Self { visible: true, color: "#1F1A17".into(), opacity: 0.3 }
    }
}

/// Ambient weather overlay. Display-only, never synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeatherKind {
    #[default]
    None,
    Rain,
    Snow,
    Embers,
}

/// Weather overlay settings.
#[derive(Debug, Clone, Copy)]
pub struct Weather {
    pub kind: WeatherKind,
    /// Particle density in `[0, 1]`.
    pub intensity: f64,
}

impl Default for Weather {
    fn default() -> Self {
        Self { kind: WeatherKind::None, intensity: 0.5 }
    }
}

/// Persistent UI state visible to the renderer.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    /// Currently active tool.
    pub tool: Tool,
    /// Hide/reveal mode for the fog tool.
    pub fog_mode: FogMode,
    /// Shape kind for the fog tool.
    pub fog_shape: FogShapeKind,
    /// The id of the currently selected token, if any.
    pub selected_id: Option<TokenId>,
    /// Grid overlay style.
    pub grid: GridStyle,
    /// Active weather overlay.
    pub weather: Weather,
}

/// Internal state for the gesture state machine.
///
/// Each active variant carries gesture context needed to compute deltas and
/// emit final actions on pointer-up.
#[derive(Debug, Clone)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    Idle,
    /// The user is panning the viewport (tool = pan).
    Panning {
        /// Screen-space position of the previous pointer event.
        last_screen: Point,
    },
    /// The user is dragging a token across the map (tool = select).
    DraggingToken {
        /// Id of the token being dragged.
        id: TokenId,
        /// Map-space pointer position at the previous event.
        last_world: Point,
        /// Token x at the start of the drag, used to revert on cancel.
        orig_x: f64,
        /// Token y at the start of the drag, used to revert on cancel.
        orig_y: f64,
    },
    /// The user is measuring distance from an anchor (tool = measure).
    Measuring {
        /// Map-space anchor where the measurement started.
        anchor_world: Point,
    },
    /// The user is drawing a fog shape; the shape itself lives in the
    /// engine's `DrawSession` (tool = fog).
    DrawingFog,
}

impl Default for InputState {
    fn default() -> Self {
        Self::Idle
    }
}
