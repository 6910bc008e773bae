pub mod app;
pub mod cache;
pub mod config;
pub mod fetcher;
pub mod runtime;
pub mod traveltimes;
