pub mod analysis;
pub mod classifier;
pub mod config;
pub mod db;
pub mod environment;
pub mod errors;
pub mod listing;
pub mod locale;
pub mod normalization;
pub mod orchestrator;
pub mod pagination;
pub mod routes;
