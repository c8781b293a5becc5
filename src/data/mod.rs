pub mod colors;
pub mod loader;
pub mod schema;
