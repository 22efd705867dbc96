//! Core configuration types shared by every backend

pub mod config;

pub use config::{WindowConfig, WsiConfig};
