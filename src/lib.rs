pub mod auth;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod scrape;
pub mod stage;
pub mod store;
pub mod transform;
pub mod url_builder;
pub mod util;
