pub mod models;
pub mod timeparse;
pub mod week_view;
