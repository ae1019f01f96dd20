pub mod clock;
pub mod config;
pub mod cost;
pub mod error;
pub mod formatter;
pub mod models;
