//! Probe status line: `<code>:<count>`
//!
//! `code` is `0` when the probe enumerated the topology and `1` when it
//! failed; `count` is the number of devices it observed. A failing probe
//! follows the status line with one line of diagnostic text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static STATUS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-1]:[0-9]+$").expect("status line pattern is valid"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusLineError {
    #[error("Line {0:?} is not of the form <code>:<count>")]
    BadShape(String),
    #[error("Device count in {0:?} is out of range")]
    CountOutOfRange(String),
}

/// Parsed status reported by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLine {
    pub code: u8,
    pub count: usize,
}

impl StatusLine {
    pub const SUCCESS: u8 = 0;
    pub const FAILURE: u8 = 1;

    pub fn success(count: usize) -> Self {
        Self {
            code: Self::SUCCESS,
            count,
        }
    }

    pub fn failure() -> Self {
        Self {
            code: Self::FAILURE,
            count: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }

    /// Whether `line` has the status line shape (trailing whitespace must already be trimmed)
    pub fn matches(line: &str) -> bool {
        STATUS_LINE.is_match(line)
    }

    pub fn parse(line: &str) -> Result<Self, StatusLineError> {
        if !Self::matches(line) {
            return Err(StatusLineError::BadShape(line.to_string()));
        }
        let (code, count) = line
            .split_once(':')
            .ok_or_else(|| StatusLineError::BadShape(line.to_string()))?;
        let code = code
            .parse::<u8>()
            .map_err(|_| StatusLineError::BadShape(line.to_string()))?;
        let count = count
            .parse::<usize>()
            .map_err(|_| StatusLineError::CountOutOfRange(line.to_string()))?;
        Ok(Self { code, count })
    }
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.code, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape() {
        assert!(StatusLine::matches("0:3"));
        assert!(StatusLine::matches("1:0"));
        assert!(StatusLine::matches("0:128"));
        assert!(!StatusLine::matches("2:3"));
        assert!(!StatusLine::matches("0:"));
        assert!(!StatusLine::matches(":3"));
        assert!(!StatusLine::matches("0:3 devices"));
        assert!(!StatusLine::matches("[info] 0:3"));
        assert!(!StatusLine::matches(""));
    }

    #[test]
    fn test_parse() {
        assert_eq!(StatusLine::parse("0:3").unwrap(), StatusLine::success(3));
        assert_eq!(StatusLine::parse("1:0").unwrap(), StatusLine::failure());
        assert_eq!(StatusLine::success(12).to_string(), "0:12");
        assert!(matches!(
            StatusLine::parse("zeInit failed"),
            Err(StatusLineError::BadShape(_))
        ));
        assert!(matches!(
            StatusLine::parse("0:99999999999999999999999999"),
            Err(StatusLineError::CountOutOfRange(_))
        ));
    }
}
