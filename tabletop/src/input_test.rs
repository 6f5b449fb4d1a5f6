use super::*;

#[test]
fn default_tool_is_select() {
    assert_eq!(Tool::default(), Tool::Select);
}

#[test]
fn default_fog_mode_hides() {
    assert_eq!(FogMode::default(), FogMode::Hide);
}

#[test]
fn default_fog_shape_is_rect() {
    assert_eq!(FogShapeKind::default(), FogShapeKind::Rect);
}

#[test]
fn default_input_state_is_idle() {
    assert!(matches!(InputState::default(), InputState::Idle));
}

#[test]
fn ui_state_default_has_no_selection() {
    let ui = UiState::default();
    assert!(ui.selected_id.is_none());
    assert_eq!(ui.tool, Tool::Select);
}

#[test]
fn default_grid_is_visible_and_faint() {
    let grid = GridStyle::default();
    assert!(grid.visible);
    assert!(grid.opacity < 1.0);
}

#[test]
fn default_weather_is_none() {
    assert_eq!(Weather::default().kind, WeatherKind::None);
}
