// Re-export modules for external use
pub mod app_state;
pub mod collaborators;
pub mod combat;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod memory_store;
pub mod monsters;
pub mod redis_manager;
pub mod stats;
