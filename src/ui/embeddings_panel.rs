use eframe::egui;
use crate::data::schema::UNCOLORED;
use crate::plot3d::camera::{Projector, SyncedCamera};
use crate::plot3d::picking::{ScreenIndex, PICK_RADIUS};
use crate::plot3d::scene::{self, PointStyle, Scene};
use crate::state::host::HostState;
use crate::state::panel_state::DragMode;
use crate::state::plot_data::PlotData;
use crate::sync::view_change::LoadState;
use crate::sync::EmbeddingsPanel;

/// Render-side state of the plot widget: camera, cached scene and the
/// lasso being drawn.
#[derive(Default)]
pub struct PlotView {
    camera: SyncedCamera,
    scene: Option<Scene>,
    lasso_path: Vec<[f32; 2]>,
}

/// Pointer gestures resolved against the frame's points.
enum Interaction {
    Toggle(String),
    Lasso(Vec<String>, Vec<[f32; 2]>),
    Clear,
}

fn toolbar_btn(ui: &mut egui::Ui, label: &str) -> egui::Response {
    ui.add(egui::Button::new(label).min_size(egui::vec2(0.0, 26.0)))
}

fn toolbar_toggle_btn(ui: &mut egui::Ui, label: &str, active: bool) -> egui::Response {
    let btn = if active {
        egui::Button::new(egui::RichText::new(label).strong())
            .fill(ui.visuals().selection.bg_fill)
            .min_size(egui::vec2(0.0, 26.0))
    } else {
        egui::Button::new(label).min_size(egui::vec2(0.0, 26.0))
    };
    ui.add(btn)
}

/// Control bar plus plot area.
pub fn show_embeddings_panel(
    ui: &mut egui::Ui,
    panel: &mut EmbeddingsPanel,
    view: &mut PlotView,
    host: &mut HostState,
    style: PointStyle,
) {
    show_control_bar(ui, panel, host);
    ui.separator();

    if let LoadState::Error(message) = panel.load_state() {
        let message = message.clone();
        ui.add_space(40.0);
        ui.vertical_centered(|ui| {
            ui.label(egui::RichText::new("Error loading visualization").strong().size(16.0));
            ui.add_space(6.0);
            ui.colored_label(ui.visuals().error_fg_color, message);
            ui.add_space(6.0);
            if ui.button("Retry").clicked() {
                panel.retry();
            }
        });
        return;
    }

    if panel.plot_data().is_none() {
        ui.add_space(40.0);
        ui.vertical_centered(|ui| {
            if panel.load_state() == &LoadState::Loading {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading visualization...");
                });
            } else {
                ui.label(egui::RichText::new("No visualization selected").weak());
            }
        });
        return;
    }

    show_plot(ui, panel, view, host, style);
}

fn show_control_bar(ui: &mut egui::Ui, panel: &mut EmbeddingsPanel, host: &mut HostState) {
    ui.horizontal_wrapped(|ui| {
        let eligible: Vec<String> = panel.eligible_methods(host).iter().map(|m| m.key.clone()).collect();
        let current = panel.state().visualization_key.clone();
        if eligible.is_empty() {
            ui.add_enabled_ui(false, |ui| {
                egui::ComboBox::from_id_salt("visualization")
                    .selected_text("No visualizations")
                    .show_ui(ui, |_| {});
            });
            let hint = if host.dataset().is_none() {
                "Open a dataset to begin"
            } else {
                "No 3D embeddings available. Compute 3D embeddings first"
            };
            ui.label(egui::RichText::new(hint).weak());
        } else {
            let mut choice = current.clone();
            egui::ComboBox::from_id_salt("visualization")
                .selected_text(current.as_deref().unwrap_or("Select visualization"))
                .show_ui(ui, |ui| {
                    for key in &eligible {
                        ui.selectable_value(&mut choice, Some(key.clone()), key);
                    }
                });
            if choice != current {
                panel.select_visualization(choice);
            }
        }

        let choices = panel.color_by_choices(host);
        let current_color = panel.state().color_by.clone().unwrap_or_else(|| UNCOLORED.to_string());
        let mut color_choice = current_color.clone();
        egui::ComboBox::from_id_salt("color_by")
            .selected_text(format!("Color by: {current_color}"))
            .show_ui(ui, |ui| {
                for c in &choices {
                    ui.selectable_value(&mut color_choice, c.clone(), c);
                }
            });
        if color_choice != current_color {
            panel.set_color_by(Some(&color_choice));
        }

        ui.separator();
        for mode in DragMode::ALL {
            let active = panel.state().drag_mode == mode;
            if toolbar_toggle_btn(ui, mode.label(), active).on_hover_text(mode.tooltip()).clicked() {
                panel.set_drag_mode(mode);
            }
        }

        ui.separator();
        if panel.can_clear_selection(host) && toolbar_btn(ui, "Clear Selection").clicked() {
            panel.clear_selection(host);
        }
        if toolbar_btn(ui, "Reset Zoom").on_hover_text("Reset zoom and pan").clicked() {
            panel.reset_zoom();
        }
        if toolbar_btn(ui, "Reset View").on_hover_text("Reset the camera orbit").clicked() {
            panel.reset_camera();
        }

        ui.separator();
        let selected = panel.resolved_selection(host).map_or(0, |r| r.ids.len());
        let points = panel.plot_data().map_or(0, PlotData::len);
        ui.label(format!("Selected: {selected}"));
        ui.label(format!("Points: {points}"));
        if panel.load_state() == &LoadState::Loading {
            ui.spinner();
        }
    });
}

fn show_plot(
    ui: &mut egui::Ui,
    panel: &mut EmbeddingsPanel,
    view: &mut PlotView,
    host: &mut HostState,
    style: PointStyle,
) {
    let Some(data) = panel.plot_data() else { return };

    let size = egui::vec2(ui.available_width(), ui.available_height().max(200.0));
    let rect = ui.allocate_space(size).1;
    let response = ui.interact(rect, egui::Id::new("embeddings_plot"), egui::Sense::click_and_drag());
    let drag_mode = panel.state().drag_mode;

    view.camera.sync(panel.camera());
    view.camera.camera.handle_input(&response, drag_mode);

    let generation = panel.data_generation();
    if view.scene.as_ref().map(|s| s.generation) != Some(generation) {
        view.scene = Some(Scene::build(data, generation));
    }
    let Some(scene) = view.scene.as_ref() else { return };

    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 0.0, style.theme.plot_bg());

    let projector = Projector::new(&view.camera.camera, rect);
    scene::draw_grid(&painter, &projector, style.theme);
    scene::draw_axis_labels(&painter, &projector, scene);

    let screen = scene::project_points(scene, &projector);
    let resolved = panel.resolved_selection(host);
    let partition = data.partition(resolved.as_ref().map(|r| r.ids.as_slice()));
    scene::draw_points(&painter, scene, &screen, &partition, resolved.as_ref(), style);

    let index = ScreenIndex::build(&screen);
    let mut interaction = None;

    if drag_mode == DragMode::Lasso {
        if response.drag_started_by(egui::PointerButton::Primary) {
            view.lasso_path.clear();
        }
        if response.dragged_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                view.lasso_path.push([pos.x, pos.y]);
            }
        }
        if response.drag_stopped_by(egui::PointerButton::Primary) {
            let path = std::mem::take(&mut view.lasso_path);
            let ids = index.within(&path).into_iter().map(|i| data.sample_ids[i].clone()).collect();
            interaction = Some(Interaction::Lasso(ids, path));
        }
        if response.double_clicked() {
            interaction = Some(Interaction::Clear);
        }
        if view.lasso_path.is_empty() {
            scene::draw_lasso(&painter, panel.lasso(), style.theme);
        } else {
            scene::draw_lasso(&painter, &view.lasso_path, style.theme);
        }
    }

    if interaction.is_none() && response.clicked() {
        if let Some(i) = response.interact_pointer_pos().and_then(|p| index.pick(p, PICK_RADIUS)) {
            interaction = Some(Interaction::Toggle(data.sample_ids[i].clone()));
        }
    }
    let escape = ui.input(|i| i.key_pressed(egui::Key::Escape));
    if escape_clears_selection(escape, ui.ctx().memory(|m| m.focused())) {
        interaction = Some(Interaction::Clear);
    }

    if let Some(hover) = response.hover_pos() {
        if let Some(i) = index.pick(hover, PICK_RADIUS) {
            if let Some((pos, _)) = screen[i] {
                draw_hover_tooltip(&painter, data, i, pos, scene.colors[i]);
            }
        }
    }

    match interaction {
        Some(Interaction::Toggle(id)) => panel.toggle_point(host, &id),
        Some(Interaction::Lasso(ids, path)) => panel.select_points(host, ids, path),
        Some(Interaction::Clear) => panel.clear_selection(host),
        None => {}
    }
}

/// Esc belongs to a focused widget (e.g. a sidebar text field) when there is one.
fn escape_clears_selection(escape_pressed: bool, focused: Option<egui::Id>) -> bool {
    escape_pressed && focused.is_none()
}

/// Label and coordinates of the hovered point.
fn draw_hover_tooltip(painter: &egui::Painter, data: &PlotData, index: usize, pos: egui::Pos2, color: egui::Color32) {
    let [x, y, z] = data.position(index);
    let text = format!("{}\n({x:.3}, {y:.3}, {z:.3})", data.labels[index]);

    painter.circle_stroke(pos, 5.0, egui::Stroke::new(1.0, egui::Color32::WHITE));

    let font = egui::FontId::proportional(11.0);
    let text_color = painter.ctx().style().visuals.text_color();
    let galley = painter.layout_no_wrap(text.clone(), font.clone(), text_color);
    let text_rect = galley.rect;
    let tooltip_pos = egui::pos2(pos.x + 10.0, pos.y - text_rect.height() - 8.0);
    let bg_rect = egui::Rect::from_min_size(
        egui::pos2(tooltip_pos.x - 4.0, tooltip_pos.y - 2.0),
        egui::vec2(text_rect.width() + 8.0, text_rect.height() + 4.0),
    );

    let bg_color = painter.ctx().style().visuals.window_fill;
    painter.rect_filled(bg_rect, 3.0, bg_color.gamma_multiply(0.9));
    painter.rect_stroke(bg_rect, 3.0, egui::Stroke::new(0.5, color), egui::StrokeKind::Outside);
    painter.text(tooltip_pos, egui::Align2::LEFT_TOP, text, font, text_color);
}
