pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod email;
pub mod events;
pub mod global;
pub mod handlers;
pub mod pipeline;
pub mod routing;
pub mod store;
pub mod summarize;
pub mod topology;
pub mod transcription;
