pub mod config;
pub mod redis;
pub mod text;
pub mod types;
