#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod ingest;
pub mod models;
pub mod report;
pub mod sqlite;
pub mod tsv;

pub use cli::app::{Cli, Command};
