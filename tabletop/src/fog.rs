//! Fog-of-war: the draw-session state machine and the mask compositor.
//!
//! DESIGN
//! ======
//! A `DrawSession` tracks one in-progress shape between pointer-down and
//! pointer-up (`idle → drawing → idle`). Committing normalizes the geometry,
//! assigns a fresh id, and hands the shape back to the caller, which appends
//! it to the document and persists the whole shape list as one atomic value.
//!
//! `MaskBitmap` is a headless raster of the composited fog layer: an opaque
//! base with each shape applied strictly in list order, painting more hide
//! (source-over) or punching a reveal hole (destination-out). Renderers can
//! mirror the same rule with real compositing operations; tests read the
//! bitmap directly.

#[cfg(test)]
#[path = "fog_test.rs"]
mod fog_test;

use uuid::Uuid;

use crate::camera::Point;
use crate::doc::{FogDocument, FogGeometry, FogPoint, FogShape};
use crate::input::{FogMode, FogShapeKind};

// =============================================================================
// DRAW SESSION
// =============================================================================

/// The in-progress drawing state.
#[derive(Debug, Clone, Default)]
enum SessionState {
    #[default]
    Idle,
    Drawing(FogShape),
}

/// Draw-session state machine: `idle → drawing → idle`.
#[derive(Debug, Clone, Default)]
pub struct DrawSession {
    state: SessionState,
}

impl DrawSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a shape is currently being drawn.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        matches!(self.state, SessionState::Drawing(_))
    }

    /// The shape under construction, for preview rendering.
    #[must_use]
    pub fn current(&self) -> Option<&FogShape> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Drawing(shape) => Some(shape),
        }
    }

    /// Open a new shape of `kind` anchored at `pos`. A reveal-mode shape is
    /// tagged `subtracted`. No-op if a shape is already being drawn.
    pub fn begin_shape(&mut self, kind: FogShapeKind, mode: FogMode, pos: Point) {
        if self.is_drawing() {
            return;
        }
        let geometry = match kind {
            FogShapeKind::Rect => FogGeometry::Rect { x: pos.x, y: pos.y, width: 0.0, height: 0.0 },
            FogShapeKind::Circle => FogGeometry::Circle { x: pos.x, y: pos.y, radius: 0.0 },
            FogShapeKind::Polygon => {
                FogGeometry::Polygon { points: vec![FogPoint { x: pos.x, y: pos.y }] }
            }
        };
        // Provisional id; commit assigns the real one.
        self.state = SessionState::Drawing(FogShape {
            id: Uuid::nil(),
            geometry,
            subtracted: mode == FogMode::Reveal,
        });
    }

    /// Extend the in-progress shape toward `pos`. Returns `false` when idle.
    ///
    /// Rect extents stay signed until commit; circle radius is the Euclidean
    /// distance from center; polygon appends a point per move event.
    pub fn update_shape(&mut self, pos: Point) -> bool {
        let SessionState::Drawing(shape) = &mut self.state else {
            return false;
        };
        match &mut shape.geometry {
            FogGeometry::Rect { x, y, width, height } => {
                *width = pos.x - *x;
                *height = pos.y - *y;
            }
            FogGeometry::Circle { x, y, radius } => {
                *radius = Point::new(*x, *y).distance_to(pos);
            }
            FogGeometry::Polygon { points } => {
                points.push(FogPoint { x: pos.x, y: pos.y });
            }
        }
        true
    }

    /// Finish the shape: normalize rect extents to non-negative (flipping the
    /// origin so the visual rectangle is unchanged), assign a fresh id, and
    /// return it. Zero-size shapes are committed as-is; they are harmless.
    pub fn commit_shape(&mut self) -> Option<FogShape> {
        let state = std::mem::take(&mut self.state);
        let SessionState::Drawing(mut shape) = state else {
            return None;
        };
        if let FogGeometry::Rect { x, y, width, height } = &mut shape.geometry {
            if *width < 0.0 {
                *x += *width;
                *width = -*width;
            }
            if *height < 0.0 {
                *y += *height;
                *height = -*height;
            }
        }
        shape.id = Uuid::new_v4();
        Some(shape)
    }

    /// Abandon the in-progress shape without committing.
    pub fn cancel(&mut self) {
        self.state = SessionState::Idle;
    }
}

// =============================================================================
// MASK COMPOSITING
// =============================================================================

/// Headless raster of the composited fog mask. One cell per map pixel at the
/// sampled resolution; `true` means hidden (black).
pub struct MaskBitmap {
    width: u32,
    height: u32,
    hidden: Vec<bool>,
}

impl MaskBitmap {
    /// Composite a fog document over a `width × height` map.
    ///
    /// The base layer is fully opaque. Shapes apply in list order: a normal
    /// shape paints hide, a subtracted shape erases to reveal. The document
    /// `revealed` flag bypasses the whole layer (nothing hidden).
    #[must_use]
    pub fn from_document(doc: &FogDocument, width: u32, height: u32) -> Self {
        let size = (width as usize) * (height as usize);
        if doc.revealed {
            return Self { width, height, hidden: vec![false; size] };
        }

        let mut hidden = vec![true; size];
        for shape in &doc.shapes {
            for cy in 0..height {
                for cx in 0..width {
                    // Sample at the cell center.
                    let px = f64::from(cx) + 0.5;
                    let py = f64::from(cy) + 0.5;
                    if shape_contains(&shape.geometry, px, py) {
                        hidden[(cy as usize) * (width as usize) + (cx as usize)] = !shape.subtracted;
                    }
                }
            }
        }
        Self { width, height, hidden }
    }

    /// Whether the cell at `(x, y)` is hidden. Out-of-bounds reads as hidden.
    #[must_use]
    pub fn is_hidden(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return true;
        }
        self.hidden[(y as usize) * (self.width as usize) + (x as usize)]
    }

    /// Total number of hidden cells.
    #[must_use]
    pub fn hidden_count(&self) -> usize {
        self.hidden.iter().filter(|h| **h).count()
    }
}

/// Point-in-shape test for mask rasterization.
#[must_use]
pub fn shape_contains(geometry: &FogGeometry, px: f64, py: f64) -> bool {
    match geometry {
        FogGeometry::Rect { x, y, width, height } => {
            // Signed extents from an in-progress drag still test correctly.
            let (x0, x1) = if *width >= 0.0 { (*x, *x + *width) } else { (*x + *width, *x) };
            let (y0, y1) = if *height >= 0.0 { (*y, *y + *height) } else { (*y + *height, *y) };
            px >= x0 && px < x1 && py >= y0 && py < y1
        }
        FogGeometry::Circle { x, y, radius } => {
            Point::new(*x, *y).distance_to(Point::new(px, py)) <= *radius
        }
        FogGeometry::Polygon { points } => point_in_polygon(points, px, py),
    }
}

/// Ray-casting point-in-polygon test.
fn point_in_polygon(points: &[FogPoint], px: f64, py: f64) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (a, b) = (points[i], points[j]);
        if (a.y > py) != (b.y > py) {
            let x_cross = (b.x - a.x) * (py - a.y) / (b.y - a.y) + a.x;
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
