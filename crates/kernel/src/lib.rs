//! Inkstand CMS Kernel Library
//!
//! Content storage, sanitization and the HTTP API for a small headless CMS.
//! The main entry point for running the server is the `inkstand` binary.

pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod file;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
