pub mod assets;
pub mod config;
pub mod database;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod normalize;
pub mod sources;
pub mod utils;
pub mod web;
