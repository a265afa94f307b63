//! Affinity Verify - checks a driver's view of an affinity mask from a child process
//!
//! The driver only reads the mask at start-up, so each scenario runs a
//! fresh probe process with the mask in its environment and reads back a
//! single `<code>:<count>` status line.

pub mod child;
pub mod protocol;
pub mod runner;
pub mod status;
pub mod verdict;

pub use child::{ChildVerifier, ProbeCommand};
pub use protocol::{read_status, ReadError, StatusReport};
pub use runner::{build_scenarios, run_scenarios, RunReport, Scenario, ScenarioOptions, ScenarioOutcome};
pub use status::{StatusLine, StatusLineError};
pub use verdict::Verdict;
