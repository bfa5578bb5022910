pub mod catalog;
pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod health;
pub mod http;
pub mod metrics;
pub mod payments;
pub mod services;
pub mod utils;
