use eframe::egui;
use glam::{Mat4, Vec3};
use std::f32::consts::PI;
use crate::state::panel_state::DragMode;
use crate::sync::camera_revision::CameraRevisionTracker;

/// Eye position of a freshly created camera, looking at the origin.
pub const DEFAULT_EYE: Vec3 = Vec3::new(1.5, 1.5, 1.5);

/// Orbital camera that revolves around a target point.
///
/// The camera position is derived from spherical coordinates (azimuth,
/// elevation, distance) relative to `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitalCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Rotation around the world Y axis, in radians.
    pub azimuth: f32,
    pub elevation: f32,
    pub fov_y: f32,
}

impl Default for OrbitalCamera {
    fn default() -> Self {
        Self::looking_from(DEFAULT_EYE)
    }
}

const ELEVATION_MIN: f32 = -PI / 2.0 + 0.01;
const ELEVATION_MAX: f32 = PI / 2.0 - 0.01;

const DISTANCE_MIN: f32 = 0.1;
const DISTANCE_MAX: f32 = 50.0;

impl OrbitalCamera {
    /// Camera at `eye` looking at the origin.
    pub fn looking_from(eye: Vec3) -> Self {
        let distance = eye.length().max(DISTANCE_MIN);
        Self {
            target: Vec3::ZERO,
            distance,
            azimuth: eye.x.atan2(eye.z),
            elevation: (eye.y / distance).asin().clamp(ELEVATION_MIN, ELEVATION_MAX),
            fov_y: PI / 3.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        let cos_elev = self.elevation.cos();
        let offset = Vec3::new(
            cos_elev * self.azimuth.sin(),
            self.elevation.sin(),
            cos_elev * self.azimuth.cos(),
        ) * self.distance;
        self.target + offset
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, 0.01, 100.0) * self.view_matrix()
    }

    pub fn rotate(&mut self, delta_azimuth: f32, delta_elevation: f32) {
        self.azimuth += delta_azimuth;
        self.elevation = (self.elevation + delta_elevation).clamp(ELEVATION_MIN, ELEVATION_MAX);
    }

    pub fn zoom(&mut self, factor: f32) {
        self.distance = (self.distance * factor).clamp(DISTANCE_MIN, DISTANCE_MAX);
    }

    /// Pan the target in the camera-local right/up plane, scaled by distance.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let view = self.view_matrix();
        let right = Vec3::new(view.x_axis.x, view.y_axis.x, view.z_axis.x);
        let up = Vec3::new(view.x_axis.y, view.y_axis.y, view.z_axis.y);

        let scale = self.distance * 0.002;
        self.target += right * (-dx * scale) + up * (dy * scale);
    }

    /// Restore the default distance and target; the orbit angles stay.
    pub fn reset_zoom(&mut self) {
        let default = Self::default();
        self.distance = default.distance;
        self.target = default.target;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply pointer input for the active drag mode.
    ///
    /// The primary button orbits or pans; in lasso mode it draws the lasso
    /// and the camera only follows secondary drags. Scroll always zooms.
    pub fn handle_input(&mut self, response: &egui::Response, mode: DragMode) {
        let primary = response.dragged_by(egui::PointerButton::Primary);
        let secondary = response.dragged_by(egui::PointerButton::Secondary);
        let delta = response.drag_delta();

        match mode {
            DragMode::Orbit if primary => self.rotate(delta.x * -0.005, delta.y * -0.005),
            DragMode::Orbit | DragMode::Lasso if secondary => self.pan(delta.x, delta.y),
            DragMode::Pan if primary => self.pan(delta.x, delta.y),
            DragMode::Pan if secondary => self.rotate(delta.x * -0.005, delta.y * -0.005),
            _ => {}
        }

        if response.hovered() {
            let scroll = response.ctx.input(|i| i.smooth_scroll_delta.y);
            if scroll.abs() > 0.0 {
                let factor = (1.0_f32 - scroll * 0.001).clamp(0.5, 2.0);
                self.zoom(factor);
            }
        }
    }
}

/// Projects world positions into a screen rectangle for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    view_proj: Mat4,
    rect: egui::Rect,
}

impl Projector {
    pub fn new(camera: &OrbitalCamera, rect: egui::Rect) -> Self {
        let aspect = rect.width() / rect.height().max(1.0);
        Self { view_proj: camera.view_projection(aspect), rect }
    }

    /// Screen position and clip-space depth; `None` behind the camera.
    pub fn project(&self, p: Vec3) -> Option<(egui::Pos2, f32)> {
        let clip = self.view_proj * p.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let x = self.rect.left() + (ndc.x * 0.5 + 0.5) * self.rect.width();
        let y = self.rect.top() + (-ndc.y * 0.5 + 0.5) * self.rect.height();
        Some((egui::pos2(x, y), ndc.z))
    }

    pub fn project_pos(&self, p: Vec3) -> Option<egui::Pos2> {
        self.project(p).map(|(pos, _)| pos)
    }
}

/// Camera plus the revision counters it has already applied. A new
/// `camera_reset_token` rebuilds the camera; a new `zoom_revision` only
/// resets zoom and pan.
#[derive(Debug, Clone, Default)]
pub struct SyncedCamera {
    pub camera: OrbitalCamera,
    zoom_revision: u64,
    reset_token: u64,
}

impl SyncedCamera {
    pub fn sync(&mut self, revisions: &CameraRevisionTracker) {
        if revisions.camera_reset_token() != self.reset_token {
            self.camera.reset();
            self.reset_token = revisions.camera_reset_token();
            self.zoom_revision = revisions.zoom_revision();
        } else if revisions.zoom_revision() != self.zoom_revision {
            self.camera.reset_zoom();
            self.zoom_revision = revisions.zoom_revision();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn default_camera_sits_at_the_default_eye() {
        assert!(approx(OrbitalCamera::default().position(), DEFAULT_EYE));
    }

    #[test]
    fn reset_zoom_keeps_the_orbit() {
        let mut cam = OrbitalCamera::default();
        cam.rotate(0.5, 0.2);
        cam.zoom(0.5);
        cam.pan(30.0, 10.0);
        let (az, el) = (cam.azimuth, cam.elevation);
        cam.reset_zoom();
        assert_eq!((cam.azimuth, cam.elevation), (az, el));
        assert_eq!(cam.target, Vec3::ZERO);
        assert_eq!(cam.distance, OrbitalCamera::default().distance);
    }

    #[test]
    fn target_projects_to_the_rect_center() {
        let rect = egui::Rect::from_min_size(egui::pos2(10.0, 20.0), egui::vec2(200.0, 100.0));
        let projector = Projector::new(&OrbitalCamera::default(), rect);
        let center = projector.project_pos(Vec3::ZERO).unwrap();
        assert!((center - rect.center()).length() < 1e-3);
        // behind the camera
        assert!(projector.project_pos(DEFAULT_EYE * 2.0).is_none());
    }

    #[test]
    fn revisions_drive_resets() {
        let mut synced = SyncedCamera::default();
        let mut revisions = CameraRevisionTracker::new();

        synced.camera.rotate(1.0, 0.0);
        synced.camera.zoom(0.5);
        synced.sync(&revisions);
        assert_eq!(synced.camera.distance, OrbitalCamera::default().distance * 0.5);

        revisions.reset_zoom();
        synced.sync(&revisions);
        assert_eq!(synced.camera.distance, OrbitalCamera::default().distance);
        assert_ne!(synced.camera.azimuth, OrbitalCamera::default().azimuth);

        revisions.reset_camera();
        synced.sync(&revisions);
        assert_eq!(synced.camera, OrbitalCamera::default());
        // a routine re-render changes nothing
        synced.camera.zoom(2.0);
        synced.sync(&revisions);
        assert_ne!(synced.camera, OrbitalCamera::default());
    }
}
