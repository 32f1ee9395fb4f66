pub mod config;
pub mod error;
pub mod models;
pub mod seed;
pub mod settings;
pub mod timer;
