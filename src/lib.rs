pub mod app;
pub mod catalog;
pub mod config;
pub mod deploy;
pub mod domain;
pub mod error;
pub mod history;
pub mod jobs;
pub mod output;
pub mod plan;
pub mod resolver;
pub mod scan;
pub mod store;
