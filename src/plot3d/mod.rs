pub mod camera;
pub mod picking;
pub mod scene;
