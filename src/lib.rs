pub mod config;
pub mod fetch_error;
pub mod fetcher;
pub mod importers;
pub mod models;
pub mod period;
pub mod services;
pub mod store;
pub mod utils;
