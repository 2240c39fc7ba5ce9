pub mod browser;
pub mod cli;
pub mod config;
pub mod health;
pub mod log;
pub mod paths;
pub mod process;
pub mod protocol;
pub mod server;
pub mod service;
