pub mod host;
pub mod panel_state;
pub mod plot_data;
pub mod theme;
