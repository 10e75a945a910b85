//! Script execution: outcome types and the timed child-process runner.

use std::time::Duration;

pub mod runner;

pub use runner::ScriptRunner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exit code 0; combined stdout and stderr.
    Success { output: String },
    /// Killed after the wall-clock budget; output discarded.
    Timeout { after: Duration },
    /// Non-zero (or signal) exit; captured text usually holds the traceback.
    Failed { code: Option<i32>, output: String },
    /// The script could not be run at all (spawn or I/O failure).
    Error { message: String },
}
