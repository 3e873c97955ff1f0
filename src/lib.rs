pub mod api;
pub mod app;
pub mod audio;
pub mod config;
pub mod db;
pub mod email;
pub mod global;
pub mod pipeline;
pub mod summarization;
pub mod transcription;
