use egui::{Color32, Visuals};
use serde::{Deserialize, Serialize};
use crate::sync::selection::StyleTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggle(&self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn visuals(&self) -> Visuals {
        match self {
            Theme::Dark => Visuals::dark(),
            Theme::Light => Visuals::light(),
        }
    }

    pub fn plot_bg(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgb(20, 20, 20),
            Theme::Light => Color32::from_rgb(255, 255, 255),
        }
    }

    pub fn grid_color(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgba_premultiplied(100, 100, 100, 60),
            Theme::Light => Color32::from_rgba_premultiplied(180, 180, 180, 80),
        }
    }

    /// Fill for selected points. Host-promoted selections are orange,
    /// plot-local and external ones red.
    pub fn selection_color(&self, style: StyleTag) -> Color32 {
        match style {
            StyleTag::Selected => Color32::from_rgb(0xff, 0x98, 0x00),
            StyleTag::Plot | StyleTag::Extended => Color32::from_rgb(0xff, 0x44, 0x44),
        }
    }

    /// Outline drawn around selected points.
    pub fn selection_outline(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::WHITE,
            Theme::Light => Color32::from_gray(40),
        }
    }

    pub fn lasso_color(&self) -> Color32 {
        match self {
            Theme::Dark => Color32::from_rgb(120, 180, 255),
            Theme::Light => Color32::from_rgb(30, 90, 200),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Theme::Dark => "Dark",
            Theme::Light => "Light",
        }
    }
}
