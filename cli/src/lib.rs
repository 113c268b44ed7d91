//! `spectrum` command line interface.

pub mod commands;
mod filter_args;

pub use commands::Cli;
pub use commands::Command;
pub use commands::exit_code;
pub use filter_args::FilterArgs;
