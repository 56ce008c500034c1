//! Environment overrides: `PIXFLOW_HOST` / `PIXFLOW_PORT`, from the process environment or a
//! `.env` file in the working directory.

use log::{debug, warn};
use std::path::Path;

use crate::Opts;
use crate::utils::config::PackagePaths;

fn read_var(key: &str) -> Option<String> {
    let name = PackagePaths::get().env_var(key);
    let s = std::env::var(&name).ok()?;
    let s = s.trim().to_string();
    if s.is_empty() {
        return None;
    }
    debug!("{} set from environment", name);
    Some(s)
}

/// Load `.env` from `dir` if present. Variables already set in the process win.
pub fn load_dotenv(dir: &Path) {
    let env_path = dir.join(".env");
    if env_path.is_file()
        && let Err(e) = dotenvy::from_path(&env_path)
    {
        warn!("{}: {}", env_path.display(), e);
    }
}

/// Apply `PIXFLOW_HOST` / `PIXFLOW_PORT` to `opts`. A port that does not parse is ignored.
pub fn apply_env_to_opts(opts: &mut Opts) {
    if let Some(host) = read_var("host") {
        opts.host = host;
    }
    if let Some(port) = read_var("port") {
        match port.parse::<u16>() {
            Ok(p) => opts.port = p,
            Err(e) => warn!(
                "ignoring {}={:?}: {}",
                PackagePaths::get().env_var("port"),
                port,
                e
            ),
        }
    }
}
