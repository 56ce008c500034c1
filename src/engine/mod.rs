//! Engine module: CLI parsing, command handlers, progress display

pub mod arg_parser;
pub mod cli;
pub mod handlers;
pub mod progress;

pub use arg_parser::{Cli, Commands, CommonArgs};
pub use cli::{build_opts, handle_run};
pub use handlers::{handle_compare, handle_connect, handle_local, handle_serve};
