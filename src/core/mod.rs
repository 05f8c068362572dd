pub mod config;
pub mod relay;
pub mod report;
pub mod state;
pub mod terminal;
