pub mod embeddings_panel;
pub mod host_panel;
