//! teleput library
//!
//! Terminal client for put.io: browse, select, delete, rename and download.

pub mod auth;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod logger;
pub mod progress;
pub mod putio;
pub mod tasks;
pub mod tui;
