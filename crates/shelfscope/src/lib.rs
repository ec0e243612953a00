#![forbid(unsafe_code)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod filter;
pub mod gateway;
pub mod metrics;
pub mod models;
pub mod packs;
pub mod render;
pub mod utils;

pub use cli::app::{Cli, Command};
