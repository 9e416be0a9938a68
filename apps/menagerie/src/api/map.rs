//! Zoo map: SVG rendering with a query-string viewport.
//!
//! The viewport travels in the query string (`scale`, `x`, `y`, `w`, `h`) and
//! is re-clamped on every request, so hand-edited URLs still land inside the
//! padded perimeter. `action` applies one pan or zoom step before rendering.

use super::session::CurrentUser;
use super::{AppState, html};
use crate::error::AppResult;
use axum::extract::{Query, State};
use axum::response::Html;
use menagerie_core::map::{
    ENTRANCE, HabitatShape, PERIMETER, Point, SCALE_FACTOR, Viewport, svg_points,
};
use serde::Deserialize;
use std::fmt::Write as _;

const DEFAULT_WIDTH: f64 = 1000.0;
const DEFAULT_HEIGHT: f64 = 700.0;
/// Screen pixels moved by one pan step.
const PAN_STEP: f64 = 100.0;

#[derive(Debug, Default, Deserialize)]
pub(super) struct MapQuery {
    scale: Option<f64>,
    x: Option<f64>,
    y: Option<f64>,
    w: Option<f64>,
    h: Option<f64>,
    action: Option<String>,
}

/// Viewport described by `query`, after its action has been applied.
fn viewport(query: &MapQuery) -> Viewport {
    let mut view = Viewport::restore(
        query.w.unwrap_or(DEFAULT_WIDTH),
        query.h.unwrap_or(DEFAULT_HEIGHT),
        query.scale,
        query.x,
        query.y,
    );
    match query.action.as_deref() {
        Some("in") => view.zoom(true),
        Some("out") => view.zoom(false),
        // Moving the view left shifts the drawing right.
        Some("left") => view.pan(PAN_STEP, 0.0),
        Some("right") => view.pan(-PAN_STEP, 0.0),
        Some("up") => view.pan(0.0, PAN_STEP),
        Some("down") => view.pan(0.0, -PAN_STEP),
        Some("reset") => view.center_on_entrance(),
        _ => {}
    }
    view
}

fn control(view: &Viewport, action: &str, label: &str) -> String {
    let href = format!(
        "/home/map?scale={:.4}&x={:.2}&y={:.2}&w={}&h={}&action={action}",
        view.scale, view.x, view.y, view.width, view.height
    );
    format!(
        "<a class=\"btn btn-secondary\" href=\"{}\" title=\"{action}\">{}</a>",
        html::escape(&href),
        html::escape(label)
    )
}

fn svg(view: &Viewport, shapes: &[HabitatShape]) -> String {
    let mut out = format!(
        "<svg class=\"map\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" xmlns=\"http://www.w3.org/2000/svg\">",
        w = view.width,
        h = view.height
    );
    let _ = write!(out, "<g transform=\"{}\">", view.transform());
    let _ = write!(
        out,
        "<polygon points=\"{}\" fill=\"#F5F1E6\" stroke=\"#6B7A5E\" stroke-width=\"12\"/>",
        svg_points(&PERIMETER)
    );

    for shape in shapes {
        let opacity = if shape.closed { "0.35" } else { "0.85" };
        let _ = write!(
            out,
            "<polygon points=\"{}\" fill=\"{}\" fill-opacity=\"{opacity}\" stroke=\"#1F2937\" stroke-width=\"4\"><title>#{} {}{}</title></polygon>",
            shape.points,
            html::escape(&shape.fill),
            shape.number,
            html::escape(&shape.name),
            if shape.closed { " (closed)" } else { "" }
        );
    }
    for shape in shapes {
        let Some(badge) = shape.badge else {
            continue;
        };
        let _ = write!(
            out,
            "<circle cx=\"{x:.1}\" cy=\"{y:.1}\" r=\"60\" fill=\"{}\" stroke=\"#FFFFFF\" stroke-width=\"8\"/>\
             <text x=\"{x:.1}\" y=\"{y:.1}\" font-size=\"64\" font-weight=\"700\" text-anchor=\"middle\" dominant-baseline=\"central\" fill=\"#111827\">{}</text>",
            shape.badge_color,
            shape.number,
            x = badge.x,
            y = badge.y,
        );
    }

    let gate = Point {
        x: ENTRANCE.x * SCALE_FACTOR,
        y: ENTRANCE.y * SCALE_FACTOR,
    };
    let _ = write!(
        out,
        "<circle cx=\"{x:.1}\" cy=\"{y:.1}\" r=\"45\" fill=\"#DC2626\"/>\
         <text x=\"{x:.1}\" y=\"{ty:.1}\" font-size=\"56\" text-anchor=\"middle\" fill=\"#DC2626\">Entrance</text>",
        x = gate.x,
        y = gate.y,
        ty = gate.y + 120.0,
    );
    out.push_str("</g></svg>");
    out
}

fn legend(shapes: &[HabitatShape]) -> String {
    let rows: Vec<Vec<String>> = shapes
        .iter()
        .map(|shape| {
            let status = if shape.closed {
                html::badge("Closed", "red")
            } else {
                html::badge("Open", "green")
            };
            vec![
                format!(
                    "<span class=\"badge\" style=\"background:{}\">{}</span>",
                    shape.badge_color, shape.number
                ),
                html::escape(&shape.name),
                status,
            ]
        })
        .collect();
    html::table(&["#", "Habitat", "Status"], &rows)
}

pub(super) async fn page(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Query(query): Query<MapQuery>,
) -> AppResult<Html<String>> {
    let view = viewport(&query);
    let shapes: Vec<HabitatShape> = state
        .store
        .list_habitats()?
        .iter()
        .map(HabitatShape::from_habitat)
        .collect();

    let mut content = String::from("<div class=\"toolbar\">");
    for (action, label) in [
        ("in", "+"),
        ("out", "-"),
        ("left", "←"),
        ("up", "↑"),
        ("down", "↓"),
        ("right", "→"),
        ("reset", "Entrance"),
    ] {
        content.push_str(&control(&view, action, label));
    }
    content.push_str("</div>");
    content.push_str(&html::card("Zoo Map", &svg(&view, &shapes)));
    content.push_str(&html::card("Legend", &legend(&shapes)));

    Ok(Html(html::page("Map", &viewer, "/home/map", &content)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(action: Option<&str>) -> MapQuery {
        MapQuery {
            action: action.map(str::to_string),
            ..MapQuery::default()
        }
    }

    #[test]
    fn test_missing_params_start_at_entrance() {
        let view = viewport(&query(None));
        assert_eq!(view, Viewport::new(DEFAULT_WIDTH, DEFAULT_HEIGHT));
    }

    #[test]
    fn test_zoom_in_action_grows_scale() {
        let base = viewport(&query(None));
        let zoomed = viewport(&query(Some("in")));
        assert!(zoomed.scale > base.scale);
    }

    #[test]
    fn test_unknown_action_is_ignored() {
        assert_eq!(viewport(&query(Some("spin"))), viewport(&query(None)));
    }

    #[test]
    fn test_controls_carry_viewport() {
        let view = Viewport::new(800.0, 600.0);
        let link = control(&view, "in", "+");
        assert!(link.contains("w=800"));
        assert!(link.contains("h=600"));
        assert!(link.contains("action=in"));
    }
}
