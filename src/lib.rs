pub mod api_connection;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod extraction;
pub mod ingredient_extractor;
pub mod portion_resolver;
