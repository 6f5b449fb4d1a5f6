//! Interaction engine: tool dispatch, gestures, and optimistic mutations.
//!
//! DESIGN
//! ======
//! `EngineCore` owns the map store, camera, and gesture state, and contains
//! all logic that doesn't depend on a rendering surface, so it can be tested
//! headless. Pointer handlers mutate local state immediately (optimistic) and
//! return [`Action`]s for the host to ship to the server; incoming server
//! broadcasts are applied through the `apply_*` methods, which report whether
//! anything observably changed so redundant echoes cause no re-render.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use crate::camera::{Camera, Point};
use crate::doc::{FogShape, MapStore, PartialToken, Token, TokenId};
use crate::fog::DrawSession;
use crate::hit::hit_test;
use crate::input::{Button, InputState, Tool, UiState, WheelDelta};

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone)]
pub enum Action {
    /// A token moved optimistically mid-drag. Persist debounced.
    TokenDragged { id: TokenId, x: f64, y: f64 },
    /// A token drag finished at a snapped position. Persist immediately.
    TokenMoved { id: TokenId, x: f64, y: f64 },
    /// The selection changed (None = cleared).
    SelectionChanged(Option<TokenId>),
    /// A fog shape was committed; the full list is the unit of persistence.
    FogCommitted(Vec<FogShape>),
    /// The measurement ruler changed.
    MeasureUpdated { from: Point, to: Point, distance: f64, cells: f64 },
    RenderNeeded,
}

/// Round `value` to the nearest multiple of `grid`. Idempotent; a non-positive
/// grid disables snapping.
#[must_use]
pub fn snap_to_grid(value: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        return value;
    }
    (value / grid).round() * grid
}

/// Core engine state: map store, camera, UI, and the active gesture.
pub struct EngineCore {
    pub store: MapStore,
    pub camera: Camera,
    pub ui: UiState,
    pub input: InputState,
    fog_session: DrawSession,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self {
            store: MapStore::new(),
            camera: Camera::default(),
            ui: UiState::default(),
            input: InputState::default(),
            fog_session: DrawSession::new(),
            viewport_width: 0.0,
            viewport_height: 0.0,
        }
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Data inputs (server broadcasts) ---

    /// Hydrate the store from a server snapshot.
    pub fn load_snapshot(&mut self, tokens: Vec<Token>) {
        self.store.load_snapshot(tokens);
    }

    /// Apply a server broadcast: token created. Returns `true` if new state.
    pub fn apply_token_create(&mut self, token: Token) -> bool {
        self.store.upsert_token(token)
    }

    /// Apply a server broadcast: token updated. An echo of our own write with
    /// equal values is a no-op, so a fast local drag never visually regresses.
    pub fn apply_token_update(&mut self, id: &TokenId, fields: &PartialToken) -> bool {
        self.store.apply_partial(id, fields)
    }

    /// Apply a server broadcast: token deleted.
    pub fn apply_token_delete(&mut self, id: &TokenId) {
        self.store.remove_token(id);
        if self.ui.selected_id.as_ref() == Some(id) {
            self.ui.selected_id = None;
        }
        // A token deleted out from under an in-flight drag ends the gesture.
        if matches!(&self.input, InputState::DraggingToken { id: drag_id, .. } if drag_id == id) {
            self.input = InputState::Idle;
        }
    }

    /// Apply a server broadcast: fog document replaced.
    pub fn apply_fog(&mut self, fog: crate::doc::FogDocument) -> bool {
        self.store.set_fog(fog)
    }

    // --- Tool ---

    /// Set the active tool, cancelling any gesture that belonged to the old one.
    pub fn set_tool(&mut self, tool: Tool) {
        if self.ui.tool != tool {
            self.cancel_gesture();
        }
        self.ui.tool = tool;
    }

    /// Abandon the in-progress gesture, reverting an uncommitted token drag.
    pub fn cancel_gesture(&mut self) {
        if let InputState::DraggingToken { id, orig_x, orig_y, .. } = &self.input {
            let id = *id;
            let revert = PartialToken { x: Some(*orig_x), y: Some(*orig_y), ..Default::default() };
            self.store.apply_partial(&id, &revert);
        }
        self.fog_session.cancel();
        self.input = InputState::Idle;
    }

    // --- Queries ---

    /// The currently selected token, if any.
    #[must_use]
    pub fn selection(&self) -> Option<TokenId> {
        self.ui.selected_id
    }

    /// The current camera state.
    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    /// Look up a token by id.
    #[must_use]
    pub fn token(&self, id: &TokenId) -> Option<&Token> {
        self.store.get(id)
    }

    /// The fog shape currently being drawn, for preview rendering.
    #[must_use]
    pub fn fog_preview(&self) -> Option<&FogShape> {
        self.fog_session.current()
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button) -> Vec<Action> {
        if button != Button::Primary {
            return vec![];
        }
        let world = self.camera.screen_to_world(screen_pt);

        match self.ui.tool {
            Tool::Select => match hit_test(world, &self.store) {
                Some(id) => {
                    let Some(token) = self.store.get(&id) else {
                        return vec![];
                    };
                    let (orig_x, orig_y) = (token.x, token.y);
                    let selection_changed = self.ui.selected_id != Some(id);
                    self.ui.selected_id = Some(id);
                    self.input = InputState::DraggingToken { id, last_world: world, orig_x, orig_y };

                    let mut actions = vec![Action::RenderNeeded];
                    if selection_changed {
                        actions.insert(0, Action::SelectionChanged(Some(id)));
                    }
                    actions
                }
                None => {
                    // Clicking empty space under select clears the selection.
                    if self.ui.selected_id.take().is_some() {
                        vec![Action::SelectionChanged(None), Action::RenderNeeded]
                    } else {
                        vec![]
                    }
                }
            },
            Tool::Pan => {
                self.input = InputState::Panning { last_screen: screen_pt };
                vec![]
            }
            Tool::Measure => {
                self.input = InputState::Measuring { anchor_world: world };
                // A zero-distance measurement is valid, not an error.
                vec![self.measure_action(world, world), Action::RenderNeeded]
            }
            Tool::Fog => {
                self.fog_session
                    .begin_shape(self.ui.fog_shape, self.ui.fog_mode, world);
                self.input = InputState::DrawingFog;
                vec![Action::RenderNeeded]
            }
        }
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        let world = self.camera.screen_to_world(screen_pt);

        match &mut self.input {
            InputState::Idle => vec![],
            InputState::Panning { last_screen } => {
                self.camera.pan_x += screen_pt.x - last_screen.x;
                self.camera.pan_y += screen_pt.y - last_screen.y;
                *last_screen = screen_pt;
                vec![Action::RenderNeeded]
            }
            InputState::DraggingToken { id, last_world, .. } => {
                let id = *id;
                let (dx, dy) = (world.x - last_world.x, world.y - last_world.y);
                *last_world = world;

                let Some(token) = self.store.get(&id) else {
                    return vec![];
                };
                let (nx, ny) = (token.x + dx, token.y + dy);
                let partial = PartialToken { x: Some(nx), y: Some(ny), ..Default::default() };
                self.store.apply_partial(&id, &partial);
                vec![Action::TokenDragged { id, x: nx, y: ny }, Action::RenderNeeded]
            }
            InputState::Measuring { anchor_world } => {
                let anchor = *anchor_world;
                vec![self.measure_action(anchor, world), Action::RenderNeeded]
            }
            InputState::DrawingFog => {
                if self.fog_session.update_shape(world) {
                    vec![Action::RenderNeeded]
                } else {
                    vec![]
                }
            }
        }
    }

    pub fn on_pointer_up(&mut self, _screen_pt: Point, button: Button) -> Vec<Action> {
        if button != Button::Primary {
            return vec![];
        }
        let state = std::mem::replace(&mut self.input, InputState::Idle);

        match state {
            InputState::Idle => vec![],
            InputState::Panning { .. } => vec![],
            InputState::DraggingToken { id, .. } => {
                let grid = self.store.grid_size;
                let Some(token) = self.store.get(&id) else {
                    return vec![];
                };
                let (sx, sy) = (snap_to_grid(token.x, grid), snap_to_grid(token.y, grid));
                let partial = PartialToken { x: Some(sx), y: Some(sy), ..Default::default() };
                self.store.apply_partial(&id, &partial);
                vec![Action::TokenMoved { id, x: sx, y: sy }, Action::RenderNeeded]
            }
            InputState::Measuring { .. } => vec![Action::RenderNeeded],
            InputState::DrawingFog => match self.fog_session.commit_shape() {
                Some(shape) => {
                    self.store.fog_mut().shapes.push(shape);
                    vec![
                        Action::FogCommitted(self.store.fog().shapes.clone()),
                        Action::RenderNeeded,
                    ]
                }
                None => vec![],
            },
        }
    }

    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta) -> Vec<Action> {
        // One wheel notch (|dy| = 100) is one ±10% zoom step.
        let notches = -delta.dy / 100.0;
        self.camera.zoom_about(screen_pt, notches);
        vec![Action::RenderNeeded]
    }

    // --- Helpers ---

    fn measure_action(&self, from: Point, to: Point) -> Action {
        let distance = from.distance_to(to);
        let cells = if self.store.grid_size > 0.0 { distance / self.store.grid_size } else { 0.0 };
        Action::MeasureUpdated { from, to, distance, cells }
    }
}
