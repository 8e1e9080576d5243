pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, GenerateCommand, ListCommands, ValidateCommand};
