pub mod action_space;
pub mod cli;
pub mod config;
pub mod logging;
pub mod oracle;
pub mod runner;
pub mod safety;
pub mod world_model;
