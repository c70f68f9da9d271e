pub mod cache;
pub mod caricature;
pub mod config;
pub mod error;
pub mod image_processing;
pub mod openai;
pub mod roster;
pub mod search;
pub mod web_api;
