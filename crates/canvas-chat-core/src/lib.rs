//! Core types, config, errors, and model catalogue for Canvas Chat.

pub mod config;
pub mod error;
pub mod models;
pub mod types;
