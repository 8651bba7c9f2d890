//! `mtr --raw` collection, parsing and per-hop statistics.

pub mod error;
pub mod parser;
pub mod runner;
pub mod stats;
pub mod trim;

pub use error::ParseError;
pub use parser::{parse_mtr_raw, process_mtr_raw};
pub use runner::{
    mtr_command_args, run_mtr, run_traces, run_traces_with_runner, spawn_trace, trace,
    trace_with_runner, MtrSettings, ProbeRunner, SystemMtrRunner, TraceHandle, TraceJobResult,
};
pub use stats::compile_stats;
pub use trim::trim_trailing_duplicates;
