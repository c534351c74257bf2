pub mod api;
pub mod config;
pub mod generator;
pub mod humanize;
pub mod manifest;
pub mod observability;
pub mod preview;
pub mod resolver;
