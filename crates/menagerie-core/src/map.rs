//! # Map Geometry
//!
//! The zoo map is drawn in layout units (the integers stored in habitat
//! outlines) multiplied by [`SCALE_FACTOR`]. A [`Viewport`] is the visible
//! window over that drawing: a uniform scale plus a translation, both
//! clamped so the map can never be zoomed out past its padded outline or
//! dragged out of view.
//!
//! Outlines are flat lists: `[x1, y1, x2, y2, ...]`.

use crate::model::Habitat;
use crate::HabitatId;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

// =============================================================================
// LAYOUT
// =============================================================================

/// Layout units to drawing units.
pub const SCALE_FACTOR: f64 = 10.0;

/// Margin around the perimeter, in layout units.
pub const PADDING: f64 = 50.0;

/// Largest allowed zoom.
pub const MAX_SCALE: f64 = 1.0;

/// Multiplier applied by one zoom step.
pub const ZOOM_STEP: f64 = 1.1;

/// Fill used for habitat kinds without a palette entry.
pub const FALLBACK_COLOR: &str = "#FBBF24";

/// Outer fence of the zoo.
pub const PERIMETER: [i32; 22] = [
    56, 23, 1, 8, 21, 156, 87, 161, 100, 226, 246, 208, 300, 74, 197, 10, 151, 1, 142, 25, 69, 11,
];

/// Main gate, in layout units.
pub const ENTRANCE: Point = Point { x: 175.0, y: 222.0 };

const PALETTE: &[(&str, &str)] = &[
    ("forest", "#22C55E"),
    ("desert", "#FACC15"),
    ("water", "#3B82F6"),
    ("mountain", "#64748B"),
    ("urban", "#A855F7"),
    ("grassland", "#4ADE80"),
    ("jungle", "#16A34A"),
    ("savanna", "#EAB308"),
    ("swamp", "#065F46"),
    ("tundra", "#CBD5E1"),
    ("ice", "#5DD3B6"),
];

/// Badge color for a habitat kind.
#[must_use]
pub fn habitat_color(kind: &str) -> &'static str {
    PALETTE
        .iter()
        .find(|(name, _)| *name == kind)
        .map_or(FALLBACK_COLOR, |&(_, color)| color)
}

// =============================================================================
// GEOMETRY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Axis-aligned bounds of an outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl BoundingBox {
    #[must_use]
    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }
}

fn vertices(points: &[i32]) -> impl Iterator<Item = (i32, i32)> + '_ {
    points.chunks_exact(2).map(|pair| (pair[0], pair[1]))
}

/// Bounds of an outline; `None` without a single complete vertex.
#[must_use]
pub fn bounding_box(points: &[i32]) -> Option<BoundingBox> {
    let mut iter = vertices(points);
    let (x, y) = iter.next()?;
    let init = BoundingBox {
        min_x: x,
        min_y: y,
        max_x: x,
        max_y: y,
    };
    Some(iter.fold(init, |b, (x, y)| BoundingBox {
        min_x: b.min_x.min(x),
        min_y: b.min_y.min(y),
        max_x: b.max_x.max(x),
        max_y: b.max_y.max(y),
    }))
}

/// Area centroid of a closed polygon (shoelace formula).
///
/// Returns `None` for outlines with zero signed area (fewer than three
/// vertices, or all vertices collinear).
#[must_use]
pub fn polygon_centroid(points: &[i32]) -> Option<Point> {
    let pts: Vec<(f64, f64)> = vertices(points)
        .map(|(x, y)| (f64::from(x), f64::from(y)))
        .collect();
    let n = pts.len();
    if n < 3 {
        return None;
    }

    let (mut area, mut cx, mut cy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let (x1, y1) = pts[i];
        let (x2, y2) = pts[(i + 1) % n];
        let cross = x1 * y2 - x2 * y1;
        area += cross;
        cx += (x1 + x2) * cross;
        cy += (y1 + y2) * cross;
    }
    area *= 0.5;

    if area.abs() < f64::EPSILON {
        return None;
    }
    Some(Point {
        x: cx / (6.0 * area),
        y: cy / (6.0 * area),
    })
}

/// SVG `points` attribute for an outline, in drawing units.
#[must_use]
pub fn svg_points(points: &[i32]) -> String {
    let mut out = String::new();
    for (i, (x, y)) in vertices(points).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(
            out,
            "{},{}",
            f64::from(x) * SCALE_FACTOR,
            f64::from(y) * SCALE_FACTOR
        );
    }
    out
}

// =============================================================================
// VIEWPORT
// =============================================================================

/// Visible window over the map drawing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Window size in screen pixels.
    pub width: f64,
    pub height: f64,
    /// Drawing units to screen pixels.
    pub scale: f64,
    /// Screen position of the drawing origin.
    pub x: f64,
    pub y: f64,
}

fn perimeter_box() -> BoundingBox {
    bounding_box(&PERIMETER).unwrap_or(BoundingBox {
        min_x: 0,
        min_y: 0,
        max_x: 0,
        max_y: 0,
    })
}

impl Viewport {
    /// A window of the given size centered on the entrance at the default zoom.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        let mut viewport = Self {
            width: sanitize(width, 1.0).max(1.0),
            height: sanitize(height, 1.0).max(1.0),
            scale: MAX_SCALE,
            x: 0.0,
            y: 0.0,
        };
        viewport.center_on_entrance();
        viewport
    }

    /// Rebuild a window from untrusted values, re-applying every clamp.
    /// Missing or non-finite values fall back to the entrance view.
    #[must_use]
    pub fn restore(width: f64, height: f64, scale: Option<f64>, x: Option<f64>, y: Option<f64>) -> Self {
        let mut viewport = Self::new(width, height);
        let scale = scale.filter(|s| s.is_finite() && *s > 0.0);
        if let (Some(scale), Some(x), Some(y)) = (scale, x, y) {
            viewport.set_scale(Some(scale));
            viewport.set_position(sanitize(x, viewport.x), sanitize(y, viewport.y));
        }
        viewport
    }

    /// Smallest scale at which the padded perimeter still fills the window.
    #[must_use]
    pub fn min_scale(&self) -> f64 {
        let bounds = perimeter_box();
        let map_w = f64::from(bounds.width()) * SCALE_FACTOR;
        let map_h = f64::from(bounds.height()) * SCALE_FACTOR;
        let pad = PADDING * 2.0 * SCALE_FACTOR;
        (self.width / (map_w + pad)).max(self.height / (map_h + pad))
    }

    /// Clamp a requested scale; `None` asks for the default (twice the minimum).
    #[must_use]
    pub fn clamp_scale(&self, requested: Option<f64>) -> f64 {
        let min = self.min_scale();
        requested.unwrap_or(min * 2.0).max(min).min(MAX_SCALE)
    }

    pub fn set_scale(&mut self, requested: Option<f64>) {
        self.scale = self.clamp_scale(requested);
    }

    /// Allowed `(min, max)` for the x translation at the current scale.
    #[must_use]
    pub fn x_bounds(&self) -> (f64, f64) {
        let map_w = f64::from(perimeter_box().width()) * SCALE_FACTOR * self.scale;
        let pad = PADDING * SCALE_FACTOR * self.scale;
        (-(map_w - self.width + pad), pad)
    }

    /// Allowed `(min, max)` for the y translation at the current scale.
    #[must_use]
    pub fn y_bounds(&self) -> (f64, f64) {
        let map_h = f64::from(perimeter_box().height()) * SCALE_FACTOR * self.scale;
        let pad = PADDING * SCALE_FACTOR * self.scale;
        (-(map_h - self.height + pad), pad)
    }

    /// Move the drawing origin, clamped to the allowed range.
    pub fn set_position(&mut self, x: f64, y: f64) {
        let (min_x, max_x) = self.x_bounds();
        let (min_y, max_y) = self.y_bounds();
        self.x = x.min(max_x).max(min_x);
        self.y = y.min(max_y).max(min_y);
    }

    /// Shift by a screen-pixel offset.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.set_position(self.x + dx, self.y + dy);
    }

    /// Zoom one step around a screen point, keeping the drawing point under
    /// it fixed (before clamping).
    pub fn zoom_at(&mut self, pointer: Point, zoom_in: bool) {
        let old = self.scale;
        let anchor = Point {
            x: (pointer.x - self.x) / old,
            y: (pointer.y - self.y) / old,
        };
        let requested = if zoom_in { old * ZOOM_STEP } else { old / ZOOM_STEP };
        self.set_scale(Some(requested));
        self.set_position(
            pointer.x - anchor.x * self.scale,
            pointer.y - anchor.y * self.scale,
        );
    }

    /// Zoom one step around the window center.
    pub fn zoom(&mut self, zoom_in: bool) {
        let center = Point {
            x: self.width / 2.0,
            y: self.height / 2.0,
        };
        self.zoom_at(center, zoom_in);
    }

    /// Reset to the default zoom with the entrance in the middle.
    pub fn center_on_entrance(&mut self) {
        self.set_scale(None);
        let ex = ENTRANCE.x * SCALE_FACTOR;
        let ey = ENTRANCE.y * SCALE_FACTOR;
        self.set_position(
            -ex * self.scale + self.width / 2.0,
            -ey * self.scale + self.height / 2.0,
        );
    }

    /// SVG transform placing the drawing inside the window.
    #[must_use]
    pub fn transform(&self) -> String {
        format!(
            "translate({:.2} {:.2}) scale({:.4})",
            self.x, self.y, self.scale
        )
    }
}

fn sanitize(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

// =============================================================================
// SCENE
// =============================================================================

/// One habitat ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct HabitatShape {
    pub id: HabitatId,
    pub number: u32,
    pub name: String,
    /// SVG points, drawing units.
    pub points: String,
    pub fill: String,
    /// Badge center in drawing units; absent for degenerate outlines.
    pub badge: Option<Point>,
    pub badge_color: &'static str,
    pub closed: bool,
}

impl HabitatShape {
    #[must_use]
    pub fn from_habitat(habitat: &Habitat) -> Self {
        let badge = polygon_centroid(&habitat.coordinates).map(|c| Point {
            x: c.x * SCALE_FACTOR,
            y: (c.y + 4.0) * SCALE_FACTOR,
        });
        Self {
            id: habitat.id,
            number: habitat.number,
            name: habitat.name.clone(),
            points: svg_points(&habitat.coordinates),
            fill: habitat
                .color
                .clone()
                .unwrap_or_else(|| habitat_color(&habitat.kind).to_string()),
            badge,
            badge_color: habitat_color(&habitat.kind),
            closed: habitat.closed,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
