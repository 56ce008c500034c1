//! CLI entry: layer settings (defaults → `.pixflow.toml` → env → flags) and dispatch.

use anyhow::Result;
use log::debug;
use std::path::Path;

use crate::Opts;
use crate::engine::arg_parser::{Cli, Commands, CommonArgs};
use crate::engine::handlers::{handle_compare, handle_connect, handle_local, handle_serve};
use crate::utils::pixflow_toml::{apply_file_to_opts, load_pixflow_toml};
use crate::utils::{apply_env_to_opts, load_dotenv, setup_logging};

/// Overwrite opts field from CLI when the flag was given.
macro_rules! apply_cli_opt {
    ($args:expr, $opts:expr, $arg_field:ident => $($opts_field:ident).+) => {
        if let Some(v) = $args.$arg_field.clone() {
            $opts.$($opts_field).+ = v;
        }
    };
}

fn apply_cli_to_opts(args: &CommonArgs, opts: &mut Opts) {
    apply_cli_opt!(args, opts, batch_rows => pipeline.batch_rows);
    apply_cli_opt!(args, opts, capacity => pipeline.capacity);
    apply_cli_opt!(args, opts, transport => pipeline.transport);
    apply_cli_opt!(args, opts, sink_transport => pipeline.sink_transport);
    apply_cli_opt!(args, opts, integrity => pipeline.integrity);
    apply_cli_opt!(args, opts, scale => pipeline.scale);
    apply_cli_opt!(args, opts, progress => progress);
    apply_cli_opt!(args, opts, verbose => verbose);
    if !args.links.is_empty() {
        opts.pipeline.links = args.links.clone();
    }
    if let Some(ref p) = args.report {
        opts.report = Some(p.clone());
    }
}

/// Resolve options for a pipeline command and set up logging.
pub fn build_opts(args: &CommonArgs) -> Opts {
    let mut opts = Opts::default();
    if let Some(file) = load_pixflow_toml(args.config.as_deref()) {
        apply_file_to_opts(&file, &mut opts);
    }
    load_dotenv(Path::new("."));
    apply_env_to_opts(&mut opts);
    apply_cli_to_opts(args, &mut opts);
    opts
}

fn setup_opts(args: &CommonArgs) -> Opts {
    let opts = build_opts(args);
    setup_logging(opts.verbose);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    opts
}

/// Run the selected subcommand. Any failure (I/O, connection, config, corruption) is an `Err`.
pub fn handle_run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run {
            input,
            output,
            common,
        } => {
            let opts = setup_opts(common);
            handle_local(input, output, &opts)
        }
        Commands::Serve {
            input,
            port,
            split,
            common,
        } => {
            let mut opts = setup_opts(common);
            opts.port = port.unwrap_or(opts.port);
            opts.split = split.unwrap_or(opts.split);
            handle_serve(input, &opts)
        }
        Commands::Connect {
            input,
            output,
            host,
            port,
            split,
            connect_attempts,
            common,
        } => {
            let mut opts = setup_opts(common);
            if let Some(h) = host {
                opts.host = h.clone();
            }
            opts.port = port.unwrap_or(opts.port);
            opts.split = split.unwrap_or(opts.split);
            opts.connect_attempts = connect_attempts.unwrap_or(opts.connect_attempts);
            handle_connect(input, output, &opts)
        }
        Commands::Compare {
            left,
            right,
            verbose,
        } => {
            setup_logging(verbose.unwrap_or(false));
            handle_compare(left, right)
        }
    }
}
