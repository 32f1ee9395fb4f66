pub mod aggregators;
pub mod backend;
pub mod cli;
pub mod settings_store;
