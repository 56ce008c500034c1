pub mod config;
pub mod env;
pub mod logger;
pub mod pixflow_toml;

pub use config::*;
pub use env::{apply_env_to_opts, load_dotenv};
pub use logger::setup_logging;
