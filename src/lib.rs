pub mod attach;
pub mod config;
pub mod history;
pub mod relay;
pub mod render;
pub mod speech;
