/// Revision counters that let the renderer tell routine re-renders from
/// explicit camera resets.
///
/// `zoom_revision` changes only on "Reset Zoom" (zoom and pan go back to the
/// defaults, orbit is kept); `camera_reset_token` changes only on "Reset
/// View" (the whole camera is rebuilt). Nothing else touches them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraRevisionTracker {
    zoom_revision: u64,
    camera_reset_token: u64,
}

impl CameraRevisionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zoom_revision(&self) -> u64 {
        self.zoom_revision
    }

    pub fn camera_reset_token(&self) -> u64 {
        self.camera_reset_token
    }

    pub fn reset_zoom(&mut self) {
        self.zoom_revision += 1;
    }

    pub fn reset_camera(&mut self) {
        self.camera_reset_token += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let mut t = CameraRevisionTracker::new();
        t.reset_zoom();
        t.reset_zoom();
        assert_eq!((t.zoom_revision(), t.camera_reset_token()), (2, 0));
        t.reset_camera();
        assert_eq!((t.zoom_revision(), t.camera_reset_token()), (2, 1));
    }
}
