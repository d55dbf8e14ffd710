pub mod api;
pub mod bot;
pub mod command;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pasta;
