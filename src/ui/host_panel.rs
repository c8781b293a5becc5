use std::collections::BTreeSet;
use std::path::PathBuf;
use eframe::egui;
use serde_json::{json, Value};
use crate::config::{AppConfig, DimensionPolicy};
use crate::data::schema::FieldKind;
use crate::state::host::{HostState, SelectedLabel, StageExpression, ViewStage};

/// Scope used when another panel imposes a selection on the host.
pub const FOREIGN_SCOPE: &str = "sample-grid";

/// Actions the sidebar requests from the app.
pub enum HostAction {
    None,
    OpenDataset(PathBuf),
    SaveSettings,
    DimensionPolicyChanged,
}

/// One table row, copied out of the host so the table can mutate it.
struct SampleRow {
    id: String,
    tags: String,
    slice: String,
    labels: Vec<(String, String)>,
}

/// Dataset controls and the sample grid standing in for the rest of the
/// host application.
pub fn show_host_panel(ui: &mut egui::Ui, host: &mut HostState, config: &mut AppConfig) -> HostAction {
    let mut action = HostAction::None;

    ui.horizontal(|ui| {
        if ui.button("Open Dataset...").clicked() {
            if let Some(path) = rfd::FileDialog::new().pick_folder() {
                action = HostAction::OpenDataset(path);
            }
        }
        if ui.button("Save Settings").clicked() {
            action = HostAction::SaveSettings;
        }
    });

    egui::CollapsingHeader::new("Settings").default_open(false).show(ui, |ui| {
        ui.horizontal(|ui| {
            ui.label("Theme:");
            if ui.button(config.theme.label()).clicked() {
                config.theme = config.theme.toggle();
            }
        });
        ui.add(egui::Slider::new(&mut config.point_size, 1.0..=12.0).text("Point size"));
        let before = config.dimension_policy;
        egui::ComboBox::from_id_salt("dimension_policy")
            .selected_text(config.dimension_policy.label())
            .show_ui(ui, |ui| {
                for policy in [DimensionPolicy::Strict3d, DimensionPolicy::Permissive] {
                    ui.selectable_value(&mut config.dimension_policy, policy, policy.label());
                }
            });
        if config.dimension_policy != before {
            action = HostAction::DimensionPolicyChanged;
        }
    });

    let Some(dataset) = host.dataset() else {
        ui.add_space(20.0);
        ui.label(egui::RichText::new("No dataset open").weak());
        return action;
    };

    ui.separator();
    ui.label(egui::RichText::new(&dataset.name).strong().size(16.0));
    ui.label(format!(
        "{} samples, {} visualizations",
        dataset.samples.len(),
        dataset.brain_methods.len()
    ));

    let all_slices = dataset.slices.clone();
    let all_tags: BTreeSet<String> = dataset.samples.iter().flat_map(|s| s.tags.iter().cloned()).collect();
    let label_fields: Vec<String> = dataset
        .schema
        .iter()
        .filter(|f| f.kind == FieldKind::Detections)
        .map(|f| f.name.clone())
        .collect();

    if !all_slices.is_empty() {
        ui.horizontal_wrapped(|ui| {
            ui.label("Slices:");
            let mut active = host.slices().to_vec();
            let mut changed = false;
            for slice in &all_slices {
                let mut on = active.contains(slice);
                if ui.checkbox(&mut on, slice).changed() {
                    changed = true;
                    if on {
                        active.push(slice.clone());
                    } else {
                        active.retain(|s| s != slice);
                    }
                }
            }
            if changed {
                host.set_slices(active);
            }
        });
    }

    ui.horizontal(|ui| {
        ui.label("Tag:");
        let current = host.filters().get("tags").and_then(Value::as_str).map(str::to_string);
        let mut choice = current.clone();
        egui::ComboBox::from_id_salt("tag_filter")
            .selected_text(current.as_deref().unwrap_or("All"))
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut choice, None, "All");
                for tag in &all_tags {
                    ui.selectable_value(&mut choice, Some(tag.clone()), tag);
                }
            });
        if choice != current {
            host.set_filter("tags", choice.map(|t| json!(t)));
        }
        if ui
            .button("Shuffle Colors")
            .on_hover_text(format!("Color seed {}", host.color_seed()))
            .clicked()
        {
            host.shuffle_colors();
        }
    });

    if !label_fields.is_empty() {
        show_view_switch(ui, host, &label_fields);
    }

    ui.separator();
    show_foreign_selection_controls(ui, host);

    ui.separator();
    ui.label(egui::RichText::new("Selection filter").strong());
    match host.override_stage() {
        None => ui.label(egui::RichText::new("None").weak()),
        Some(StageExpression::Select { sample_ids }) => ui.label(format!("Select {} samples", sample_ids.len())),
        Some(StageExpression::SelectLabels { field, label_ids }) => {
            ui.label(format!("Select {} labels in '{field}'", label_ids.len()))
        }
    };

    ui.separator();
    show_sample_table(ui, host, &label_fields);

    action
}

/// Switch between the sample view and a patches view over one label field.
fn show_view_switch(ui: &mut egui::Ui, host: &mut HostState, label_fields: &[String]) {
    let current = host
        .view()
        .iter()
        .find(|stage| stage.kind == "ToPatches")
        .and_then(|stage| stage.params.get("field").and_then(Value::as_str))
        .map(str::to_string);
    let mut choice = current.clone();
    ui.horizontal(|ui| {
        ui.label("View:");
        let text = match &current {
            Some(field) => format!("Patches: {field}"),
            None => "Samples".to_string(),
        };
        egui::ComboBox::from_id_salt("view_switch")
            .selected_text(text)
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut choice, None, "Samples");
                for field in label_fields {
                    ui.selectable_value(&mut choice, Some(field.clone()), format!("Patches: {field}"));
                }
            });
    });
    if choice != current {
        let view = choice
            .map(|field| vec![ViewStage::new("ToPatches", json!({ "field": field }))])
            .unwrap_or_default();
        host.set_view(view);
    }
}

fn show_foreign_selection_controls(ui: &mut egui::Ui, host: &mut HostState) {
    ui.label(egui::RichText::new("Other panels").strong());
    ui.horizontal_wrapped(|ui| {
        if ui
            .button("Impose selection")
            .on_hover_text("Select the visible samples from another panel")
            .clicked()
        {
            let ids: Vec<String> = host.visible_samples().iter().map(|s| s.id.clone()).collect();
            host.set_extended_selection(Some(ids), FOREIGN_SCOPE);
        }
        if ui
            .button("Impose region")
            .on_hover_text("Simulate a spatial selection made on a map")
            .clicked()
        {
            host.set_spatial_selection(Some(json!({"type": "Polygon", "coordinates": []})), FOREIGN_SCOPE);
        }
        let foreign = host.extended_selection().scope.as_deref() == Some(FOREIGN_SCOPE);
        if foreign && ui.button("Release").clicked() {
            host.reset_extended_selection();
        }
    });
}

fn show_sample_table(ui: &mut egui::Ui, host: &mut HostState, label_fields: &[String]) {
    use egui_extras::{Column, TableBuilder};

    let rows: Vec<SampleRow> = host
        .visible_samples()
        .iter()
        .map(|s| SampleRow {
            id: s.id.clone(),
            tags: s.tags.join(", "),
            slice: s.slice.clone().unwrap_or_default(),
            labels: label_fields
                .iter()
                .flat_map(|field| {
                    s.label_ids(field)
                        .into_iter()
                        .map(move |id| (field.clone(), id.to_string()))
                })
                .collect(),
        })
        .collect();
    let selected = host.selected_samples().to_vec();
    let selected_labels = host.selected_labels().to_vec();

    ui.horizontal(|ui| {
        ui.label(format!("{} visible samples", rows.len()));
        if !selected_labels.is_empty() && ui.small_button("Clear labels").clicked() {
            host.set_selected_labels(Vec::new());
        }
    });

    let mut toggled_sample: Option<String> = None;
    let mut toggled_label: Option<SelectedLabel> = None;

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .column(Column::auto())
        .column(Column::auto().at_least(60.0))
        .column(Column::auto().at_least(60.0))
        .column(Column::auto())
        .column(Column::remainder())
        .min_scrolled_height(200.0)
        .header(20.0, |mut header| {
            for title in ["", "Sample", "Tags", "Slice", "Labels"] {
                header.col(|ui| {
                    ui.strong(title);
                });
            }
        })
        .body(|body| {
            body.rows(20.0, rows.len(), |mut row| {
                let sample = &rows[row.index()];
                row.col(|ui| {
                    let mut on = selected.contains(&sample.id);
                    if ui.checkbox(&mut on, "").changed() {
                        toggled_sample = Some(sample.id.clone());
                    }
                });
                row.col(|ui| {
                    ui.label(&sample.id);
                });
                row.col(|ui| {
                    ui.label(&sample.tags);
                });
                row.col(|ui| {
                    ui.label(&sample.slice);
                });
                row.col(|ui| {
                    for (field, label_id) in &sample.labels {
                        let on = selected_labels
                            .iter()
                            .any(|l| &l.field == field && &l.label_id == label_id);
                        if ui.selectable_label(on, label_id).clicked() {
                            toggled_label = Some(SelectedLabel {
                                field: field.clone(),
                                label_id: label_id.clone(),
                                sample_id: sample.id.clone(),
                            });
                        }
                    }
                });
            });
        });

    if let Some(id) = toggled_sample {
        host.toggle_sample(&id);
    }
    if let Some(label) = toggled_label {
        host.toggle_label(label);
    }
}
