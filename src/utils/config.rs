//! Application configuration constants.
//! Tuning defaults and limits in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                env_prefix: pkg.to_uppercase(),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Settings file looked up in the working directory (e.g. `.pixflow.toml`).
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable name for `key`, e.g. `PIXFLOW_PORT`.
    pub fn env_var(&self, key: &str) -> String {
        format!("{}_{}", self.env_prefix, key.to_uppercase())
    }
}

// ---- Pixels ----

/// Bytes per pixel (RGB).
pub const CHANNELS: usize = 3;

/// Smallest grid side that still has an interior for a 3x3 neighborhood.
pub const MIN_GRID_SIDE: usize = 3;

// ---- Batching / channels ----

/// Pipeline defaults; every value can be overridden by file, env or CLI.
pub struct PipelineDefaults;

impl PipelineDefaults {
    /// Rows per batch packet.
    pub const BATCH_ROWS: usize = 32;
    /// In-process queue capacity (packets).
    pub const CAPACITY: usize = 512;
    /// Sharpen scale factor applied to the detail layer.
    pub const SCALE: u8 = 2;
}

// ---- Framing ----

/// Hard cap on a single packet payload accepted from the wire (bytes). 256 MB.
pub const MAX_PAYLOAD_BYTES: usize = 256 * 1024 * 1024;

// ---- Network ----

/// Socket deployment defaults.
pub struct NetDefaults;

impl NetDefaults {
    pub const HOST: &'static str = "127.0.0.1";
    pub const PORT: u16 = 9090;
    /// Stages run on the upstream host in a split deployment.
    pub const SPLIT: usize = 2;
    /// Connect attempts made by the downstream side before giving up.
    pub const CONNECT_ATTEMPTS: u32 = 20;
    /// Pause between connect attempts (milliseconds).
    pub const CONNECT_RETRY_MS: u64 = 250;
}
