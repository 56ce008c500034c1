//! Pipeline components: context, stage wiring, sink, split deployment.

pub mod context;
pub mod orchestrator;
pub mod remote;
pub mod sink;

pub use context::PipelineContext;
pub use orchestrator::{
    PipelineRun, join_stages, run_local, run_stages, run_wired, spawn_chain,
};
pub use remote::{handshake_for, run_downstream, run_upstream};
pub use sink::{BatchCallback, collect_into};
