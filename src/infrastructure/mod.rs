pub mod api_client;
pub mod clock;
pub mod config;
pub mod store;
