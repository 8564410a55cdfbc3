pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod grid;
pub mod handler;
pub mod report;
pub mod scorer;
pub mod util;
