pub mod feed;
pub mod file_formats;
pub mod infrastructure;
pub mod models;
pub mod plan;
pub mod scenario;
pub mod stage;
pub mod temperature;
