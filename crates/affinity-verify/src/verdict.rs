//! Classified outcome of a single verification

use serde::{Deserialize, Serialize};

/// Result of checking one scenario against a probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Probe reported the expected device count
    Pass { count: usize },
    /// Probe succeeded but saw a different number of devices
    CountMismatch { expected: usize, observed: usize },
    /// Probe reported failure (status code 1)
    ChildReported { diagnostic: String },
    /// No status line arrived before the read deadline
    Timeout { after_ms: u64 },
    /// Output ended, or a blank line arrived, before a status line
    ReadFailed { reason: String },
    /// Status line matched the shape but could not be parsed
    MalformedStatus { reason: String },
    /// Probe could not be started
    LaunchFailed { reason: String },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass { .. })
    }

    /// Short machine-friendly name of the verdict kind
    pub fn kind(&self) -> &'static str {
        match self {
            Verdict::Pass { .. } => "pass",
            Verdict::CountMismatch { .. } => "count_mismatch",
            Verdict::ChildReported { .. } => "child_reported",
            Verdict::Timeout { .. } => "timeout",
            Verdict::ReadFailed { .. } => "read_failed",
            Verdict::MalformedStatus { .. } => "malformed_status",
            Verdict::LaunchFailed { .. } => "launch_failed",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass { count } => write!(f, "pass ({} devices)", count),
            Verdict::CountMismatch { expected, observed } => {
                write!(f, "expected {} devices, probe saw {}", expected, observed)
            }
            Verdict::ChildReported { diagnostic } => {
                write!(f, "probe failed getting driver devices: {}", diagnostic)
            }
            Verdict::Timeout { after_ms } => {
                write!(f, "timed out after {}ms waiting for status line", after_ms)
            }
            Verdict::ReadFailed { reason } => write!(f, "error reading from probe: {}", reason),
            Verdict::MalformedStatus { reason } => write!(f, "malformed status: {}", reason),
            Verdict::LaunchFailed { reason } => write!(f, "failed to launch probe: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_json() {
        let json = serde_json::to_value(Verdict::CountMismatch {
            expected: 3,
            observed: 2,
        })
        .unwrap();
        assert_eq!(json["verdict"], "count_mismatch");
        assert_eq!(json["expected"], 3);

        let verdict: Verdict =
            serde_json::from_str(r#"{"verdict":"timeout","after_ms":5000}"#).unwrap();
        assert_eq!(verdict, Verdict::Timeout { after_ms: 5000 });
        assert_eq!(verdict.kind(), "timeout");
        assert!(!verdict.is_pass());
    }
}
