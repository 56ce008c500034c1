//! Load `.pixflow.toml` (CLI only). The lib never reads it; callers pass
//! [`PipelineOpts`](crate::PipelineOpts).

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Opts;
use crate::channel::TransportKind;
use crate::packet::IntegrityAlgo;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct PixflowToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsSection {
    batch_rows: Option<usize>,
    capacity: Option<usize>,
    transport: Option<TransportKind>,
    links: Option<Vec<TransportKind>>,
    sink_transport: Option<TransportKind>,
    integrity: Option<IntegrityAlgo>,
    scale: Option<u8>,
    host: Option<String>,
    port: Option<u16>,
    split: Option<usize>,
    connect_attempts: Option<u32>,
    progress: Option<bool>,
    verbose: Option<bool>,
    report: Option<String>,
}

/// Parse settings from TOML text.
pub fn parse_pixflow_toml(s: &str) -> Result<PixflowToml, toml::de::Error> {
    toml::from_str(s)
}

/// Load `path`, or `.pixflow.toml` in the working directory when `path` is None. A missing
/// default file is not an error; a broken one is logged and ignored.
pub fn load_pixflow_toml(path: Option<&Path>) -> Option<PixflowToml> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(PackagePaths::get().config_filename()),
    };
    let s = std::fs::read_to_string(&path).ok()?;
    parse_pixflow_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $($opts_field:ident).+) => {
        if let Some(v) = $sec.$sec_field.clone() {
            $opts.$($opts_field).+ = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before env and CLI.
pub fn apply_file_to_opts(file: &PixflowToml, opts: &mut Opts) {
    let sec = &file.settings;
    apply_file_opt!(sec, opts, batch_rows => pipeline.batch_rows);
    apply_file_opt!(sec, opts, capacity => pipeline.capacity);
    apply_file_opt!(sec, opts, transport => pipeline.transport);
    apply_file_opt!(sec, opts, links => pipeline.links);
    apply_file_opt!(sec, opts, sink_transport => pipeline.sink_transport);
    apply_file_opt!(sec, opts, integrity => pipeline.integrity);
    apply_file_opt!(sec, opts, scale => pipeline.scale);
    apply_file_opt!(sec, opts, host => host);
    apply_file_opt!(sec, opts, port => port);
    apply_file_opt!(sec, opts, split => split);
    apply_file_opt!(sec, opts, connect_attempts => connect_attempts);
    apply_file_opt!(sec, opts, progress => progress);
    apply_file_opt!(sec, opts, verbose => verbose);
    if let Some(ref p) = sec.report {
        opts.report = Some(PathBuf::from(p));
    }
}
