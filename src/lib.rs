pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod gmail_api;
pub mod message;
pub mod types;

pub use error::{Error, Result};
