pub mod cli;
pub mod config;
pub mod consolidate;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod export;
pub mod location;
pub mod logging;
pub mod server;
pub mod table;

pub use table::{Table, Value};
