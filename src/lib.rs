pub mod command;
pub mod config;
pub mod formats;
pub mod lifecycle;
pub mod runner;
pub mod step_result;
pub mod suite;
pub mod utils;
pub mod validation;
