use std::path::{Path, PathBuf};
use std::sync::Arc;
use eframe::egui;
use crate::config::AppConfig;
use crate::data::loader;
use crate::plot3d::scene::PointStyle;
use crate::provider::directory::DirectoryProvider;
use crate::provider::worker::{Completion, JobRunner};
use crate::state::host::HostState;
use crate::sync::EmbeddingsPanel;
use crate::ui::embeddings_panel::{self, PlotView};
use crate::ui::host_panel::{self, HostAction};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The main OxideEmbed application.
pub struct EmbeddingsApp {
    config: AppConfig,
    config_path: PathBuf,
    host: HostState,
    panel: EmbeddingsPanel,
    view: PlotView,
    jobs: JobRunner,
    /// An error message to display until dismissed.
    error_message: Option<String>,
}

impl EmbeddingsApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let config_path = AppConfig::default_path();
        let config = AppConfig::load_or_default(&config_path);

        let ctx = &cc.egui_ctx;
        let mut style = (*ctx.style()).clone();
        style.text_styles.insert(egui::TextStyle::Body, egui::FontId::proportional(15.0));
        style.text_styles.insert(egui::TextStyle::Button, egui::FontId::proportional(14.5));
        style.text_styles.insert(egui::TextStyle::Heading, egui::FontId::proportional(22.0));
        style.spacing.button_padding = egui::vec2(10.0, 5.0);
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        ctx.set_style(style);

        let mut app = Self {
            panel: EmbeddingsPanel::new(config.dimension_policy),
            config,
            config_path,
            host: HostState::new(),
            view: PlotView::default(),
            jobs: JobRunner::new(),
            error_message: None,
        };
        if let Some(dir) = app.config.dataset_dir.clone() {
            app.open_dataset(&dir);
        }
        tracing::info!("OxideEmbed {VERSION} started");
        app
    }

    fn open_dataset(&mut self, path: &Path) {
        match loader::load_dataset(path) {
            Ok(dataset) => {
                self.install_provider(dataset.clone());
                self.host.open_dataset(dataset);
                self.panel.on_dataset_opened(&self.host);
                self.config.dataset_dir = Some(path.to_path_buf());
            }
            Err(e) => {
                tracing::error!("Failed to open dataset {:?}: {e}", path);
                self.error_message = Some(format!("Failed to open dataset: {e}"));
            }
        }
    }

    fn install_provider(&mut self, dataset: loader::Dataset) {
        let provider = DirectoryProvider::new(dataset, self.config.dimension_policy);
        self.jobs.set_provider(Arc::new(provider));
    }

    /// Feed finished provider jobs back into the panel.
    fn apply_completions(&mut self) {
        for completion in self.jobs.poll() {
            match completion {
                Completion::Pushed { seq, visualization_key, payload } => {
                    self.panel.on_push(seq, &visualization_key, payload);
                }
                Completion::Load { seq, result } => {
                    self.panel.on_load(&mut self.host, seq, result);
                }
                Completion::SelectionExported { seq, result } => {
                    self.panel.on_selection_exported(&mut self.host, seq, result);
                }
                Completion::Stage { seq, result } => {
                    self.panel.on_stage(&mut self.host, seq, result);
                }
            }
        }
    }

    fn handle_host_action(&mut self, action: HostAction) {
        match action {
            HostAction::None => {}
            HostAction::OpenDataset(path) => self.open_dataset(&path),
            HostAction::SaveSettings => match self.config.save(&self.config_path) {
                Ok(()) => tracing::info!("Saved settings to {:?}", self.config_path),
                Err(e) => self.error_message = Some(format!("Failed to save settings: {e}")),
            },
            HostAction::DimensionPolicyChanged => {
                self.panel.set_dimension_policy(self.config.dimension_policy);
                if let Some(dataset) = self.host.dataset().cloned() {
                    self.install_provider(dataset);
                }
                self.panel.on_dataset_opened(&self.host);
            }
        }
    }
}

impl eframe::App for EmbeddingsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut vis = self.config.theme.visuals();
        vis.window_corner_radius = egui::CornerRadius::same(8);
        vis.widgets.inactive.corner_radius = egui::CornerRadius::same(6);
        vis.widgets.hovered.corner_radius = egui::CornerRadius::same(6);
        vis.widgets.active.corner_radius = egui::CornerRadius::same(6);
        ctx.set_visuals(vis);

        // ------------------------------------------------------------------
        // 1. Provider replies from background jobs
        // ------------------------------------------------------------------
        self.apply_completions();

        // ------------------------------------------------------------------
        // 2. Host sidebar
        // ------------------------------------------------------------------
        let mut action = HostAction::None;
        egui::SidePanel::left("host_panel")
            .resizable(true)
            .default_width(360.0)
            .show(ctx, |ui| {
                action = host_panel::show_host_panel(ui, &mut self.host, &mut self.config);
            });
        self.handle_host_action(action);

        // ------------------------------------------------------------------
        // 3. Embeddings panel
        // ------------------------------------------------------------------
        let style = PointStyle {
            point_size: self.config.point_size,
            theme: self.config.theme,
        };
        egui::CentralPanel::default().show(ctx, |ui| {
            embeddings_panel::show_embeddings_panel(ui, &mut self.panel, &mut self.view, &mut self.host, style);
        });

        // ------------------------------------------------------------------
        // 4. Reconcile and dispatch new provider work
        // ------------------------------------------------------------------
        for effect in self.panel.tick(&mut self.host) {
            self.jobs.submit(effect);
        }
        if self.jobs.is_busy() {
            ctx.request_repaint();
        }

        // ------------------------------------------------------------------
        // 5. Error window
        // ------------------------------------------------------------------
        if let Some(message) = self.error_message.clone() {
            let mut open = true;
            egui::Window::new("Error")
                .open(&mut open)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    if ui.button("OK").clicked() {
                        self.error_message = None;
                    }
                });
            if !open {
                self.error_message = None;
            }
        }
    }
}
