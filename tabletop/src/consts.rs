//! Shared numeric constants for the tabletop crate.

// ── Camera ──────────────────────────────────────────────────────

/// Minimum zoom scale.
pub const ZOOM_MIN: f64 = 0.1;

/// Maximum zoom scale.
pub const ZOOM_MAX: f64 = 10.0;

/// Multiplicative zoom step per wheel notch (±10%).
pub const ZOOM_STEP: f64 = 1.1;

// ── Grid ────────────────────────────────────────────────────────

/// Default grid cell size in map pixels, used until the map row loads.
pub const DEFAULT_GRID_SIZE: f64 = 50.0;
