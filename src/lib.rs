#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod formats;
pub mod gateway;
pub mod logging;
pub mod session;
pub mod status;
