//! Projection and painting of a plot generation with the current selection.

use eframe::egui::{self, Color32, Pos2, Stroke};
use glam::Vec3;
use crate::data::colors;
use crate::plot3d::camera::Projector;
use crate::state::plot_data::{ColorScheme, PlotData, PointColors, SelectionPartition};
use crate::state::theme::Theme;
use crate::sync::selection::ResolvedSelection;

/// Axis titles, in x/y/z order.
pub const AXIS_TITLES: [&str; 3] = ["Component 1", "Component 2", "Component 3"];

/// Extra diameter of selected points, in pixels.
pub const SELECTED_SIZE_BOOST: f32 = 2.0;

/// Opacity of unselected points.
pub fn unselected_alpha(has_selection: bool) -> f32 {
    if has_selection {
        0.3
    } else {
        0.7
    }
}

/// Map a data point into the normalized [-1, 1]^3 cube.
pub fn normalize_point(p: [f64; 3], min: [f64; 3], max: [f64; 3]) -> Vec3 {
    let n = |axis: usize| ((p[axis] - min[axis]) / (max[axis] - min[axis]) * 2.0 - 1.0) as f32;
    Vec3::new(n(0), n(1), n(2))
}

/// Geometry and base colours derived from one plot generation. Rebuilt
/// only when the generation changes.
#[derive(Debug, Clone)]
pub struct Scene {
    pub generation: u64,
    pub min: [f64; 3],
    pub max: [f64; 3],
    /// Normalized positions; `None` for points with non-finite coordinates.
    pub positions: Vec<Option<Vec3>>,
    pub colors: Vec<Color32>,
}

impl Scene {
    pub fn build(data: &PlotData, generation: u64) -> Self {
        let (min, max) = data.bounds();
        let positions = (0..data.len())
            .map(|i| {
                let p = data.position(i);
                p.iter().all(|v| v.is_finite()).then(|| normalize_point(p, min, max))
            })
            .collect();
        Self { generation, min, max, positions, colors: base_colors(data) }
    }
}

/// Per-point fill colours: hex strings as given, numbers through Viridis
/// scaled to their own range.
pub fn base_colors(data: &PlotData) -> Vec<Color32> {
    match (&data.colors, data.color_scheme) {
        (PointColors::Numeric(values), _) => {
            let (lo, hi) = values
                .iter()
                .filter(|v| v.is_finite())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            let span = if hi > lo { hi - lo } else { 1.0 };
            values
                .iter()
                .map(|&v| {
                    let [r, g, b] = colors::viridis((v - lo) / span);
                    Color32::from_rgb(r, g, b)
                })
                .collect()
        }
        (PointColors::Named(hex), scheme) => hex
            .iter()
            .map(|h| {
                let fallback = if scheme == ColorScheme::Uniform { [31, 119, 180, 255] } else { [128, 128, 128, 255] };
                let [r, g, b, a] = colors::parse_hex(h).unwrap_or(fallback);
                Color32::from_rgba_unmultiplied(r, g, b, a)
            })
            .collect(),
    }
}

/// Visual parameters for one frame of point drawing.
#[derive(Debug, Clone, Copy)]
pub struct PointStyle {
    pub point_size: f32,
    pub theme: Theme,
}

/// Projected screen positions of every drawable point, by point index.
pub fn project_points(scene: &Scene, projector: &Projector) -> Vec<Option<(Pos2, f32)>> {
    scene
        .positions
        .iter()
        .map(|p| p.and_then(|p| projector.project(p)))
        .collect()
}

/// Paint unselected points, then selected ones on top. Within each group
/// points are painted far to near.
pub fn draw_points(
    painter: &egui::Painter,
    scene: &Scene,
    screen: &[Option<(Pos2, f32)>],
    partition: &SelectionPartition,
    selection: Option<&ResolvedSelection>,
    style: PointStyle,
) {
    let clip = painter.clip_rect();
    let alpha = unselected_alpha(selection.is_some());
    let radius = style.point_size / 2.0;

    for idx in far_to_near(&partition.unselected, screen) {
        let Some((pos, _)) = screen[idx] else { continue };
        if clip.contains(pos) {
            painter.circle_filled(pos, radius, scene.colors[idx].gamma_multiply(alpha));
        }
    }

    let Some(selection) = selection else { return };
    let fill = style.theme.selection_color(selection.style);
    let outline = Stroke::new(1.0, style.theme.selection_outline());
    let selected_radius = (style.point_size + SELECTED_SIZE_BOOST) / 2.0;
    for idx in far_to_near(&partition.selected, screen) {
        let Some((pos, _)) = screen[idx] else { continue };
        if clip.contains(pos) {
            painter.circle(pos, selected_radius, fill, outline);
        }
    }
}

fn far_to_near(indices: &[usize], screen: &[Option<(Pos2, f32)>]) -> Vec<usize> {
    let depth = |i: usize| screen[i].map_or(f32::NEG_INFINITY, |(_, z)| z);
    let mut sorted = indices.to_vec();
    sorted.sort_by(|&a, &b| depth(b).total_cmp(&depth(a)));
    sorted
}

/// Wireframe box of the normalized cube plus interior grid lines.
pub fn grid_segments() -> Vec<[Vec3; 2]> {
    let corners = [
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(1.0, 1.0, -1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
    ];
    let edges = [
        (0, 1), (1, 2), (2, 3), (3, 0),
        (4, 5), (5, 6), (6, 7), (7, 4),
        (0, 4), (1, 5), (2, 6), (3, 7),
    ];
    let mut segments: Vec<[Vec3; 2]> = edges.iter().map(|&(a, b)| [corners[a], corners[b]]).collect();

    for i in 1..5 {
        let t = -1.0 + i as f32 / 5.0 * 2.0;
        // floor (y = -1)
        segments.push([Vec3::new(t, -1.0, -1.0), Vec3::new(t, -1.0, 1.0)]);
        segments.push([Vec3::new(-1.0, -1.0, t), Vec3::new(1.0, -1.0, t)]);
        // back wall (z = -1)
        segments.push([Vec3::new(t, -1.0, -1.0), Vec3::new(t, 1.0, -1.0)]);
        segments.push([Vec3::new(-1.0, t, -1.0), Vec3::new(1.0, t, -1.0)]);
    }
    segments
}

pub fn draw_grid(painter: &egui::Painter, projector: &Projector, theme: Theme) {
    let stroke = Stroke::new(1.0, theme.grid_color());
    for [a, b] in grid_segments() {
        if let (Some(a), Some(b)) = (projector.project_pos(a), projector.project_pos(b)) {
            painter.line_segment([a, b], stroke);
        }
    }
}

/// Axis titles at the edge midpoints and five tick labels per axis in
/// data units.
pub fn draw_axis_labels(painter: &egui::Painter, projector: &Projector, scene: &Scene) {
    let text_color = painter.ctx().style().visuals.text_color();
    let dim_color = text_color.gamma_multiply(0.7);
    let font = egui::FontId::proportional(10.0);
    let title_font = egui::FontId::proportional(12.0);
    let clip = painter.clip_rect();

    let title_positions = [
        Vec3::new(0.0, -1.25, -1.25),
        Vec3::new(-1.25, 0.0, -1.25),
        Vec3::new(-1.25, -1.25, 0.0),
    ];
    for (title, pos) in AXIS_TITLES.iter().zip(title_positions) {
        if let Some(screen) = projector.project_pos(pos).filter(|p| clip.contains(*p)) {
            painter.text(screen, egui::Align2::CENTER_CENTER, *title, title_font.clone(), text_color);
        }
    }

    for i in 0..=4 {
        let t = i as f32 / 4.0;
        let n = -1.0 + t * 2.0;
        let ticks = [
            (Vec3::new(n, -1.0, -1.1), 0, egui::Align2::CENTER_TOP),
            (Vec3::new(-1.1, n, -1.0), 1, egui::Align2::RIGHT_CENTER),
            (Vec3::new(-1.1, -1.0, n), 2, egui::Align2::RIGHT_CENTER),
        ];
        for (pos, axis, align) in ticks {
            let value = scene.min[axis] + t as f64 * (scene.max[axis] - scene.min[axis]);
            if let Some(screen) = projector.project_pos(pos).filter(|p| clip.contains(*p)) {
                painter.text(screen, align, format_tick_value(value), font.clone(), dim_color);
            }
        }
    }
}

/// Compact tick label: scientific for very large/small magnitudes,
/// otherwise trailing zeros trimmed.
pub fn format_tick_value(val: f64) -> String {
    if val.abs() >= 1e6 || (val != 0.0 && val.abs() < 1e-3) {
        format!("{val:.2e}")
    } else if val == 0.0 {
        "0".to_string()
    } else {
        let s = format!("{val:.6}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub fn draw_lasso(painter: &egui::Painter, lasso: &[[f32; 2]], theme: Theme) {
    if lasso.len() < 2 {
        return;
    }
    let points: Vec<Pos2> = lasso.iter().map(|p| egui::pos2(p[0], p[1])).collect();
    let color = theme.lasso_color();
    painter.add(egui::Shape::closed_line(points, Stroke::new(1.5, color)));
}
