//! preke CLI: scan for, save and select Preke devices from a terminal.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod styles;
