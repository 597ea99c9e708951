pub mod command;
pub mod error;
pub mod led;
pub mod models;
pub mod settings;
