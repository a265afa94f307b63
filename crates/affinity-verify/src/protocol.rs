//! Line protocol for reading a probe's status from its output stream

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::status::{StatusLine, StatusLineError};

/// Deadline for each line read from a probe
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Timed out after {0:?} waiting for a status line")]
    Timeout(Duration),
    #[error("Probe output ended before a status line was read")]
    Empty,
    #[error("IO error reading probe output: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed status line: {0}")]
    Malformed(#[from] StatusLineError),
}

/// Status line plus the diagnostic a failing probe prints after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: StatusLine,
    pub diagnostic: Option<String>,
}

/// Read one line under `deadline`, with trailing whitespace removed
async fn read_trimmed<R>(reader: &mut R, deadline: Duration) -> Result<String, ReadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    timeout(deadline, reader.read_line(&mut line))
        .await
        .map_err(|_| ReadError::Timeout(deadline))??;
    line.truncate(line.trim_end().len());
    Ok(line)
}

/// Read lines until one has the `<code>:<count>` shape
///
/// Lines of other output are skipped. Every read is bounded by `deadline`;
/// once past the first line an empty line or end of output fails the read.
/// For a non-zero code the following line is returned as the diagnostic.
pub async fn read_status<R>(reader: &mut R, deadline: Duration) -> Result<StatusReport, ReadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = read_trimmed(reader, deadline).await?;
    while !StatusLine::matches(&line) {
        debug!(line = %line, "Skipping probe output");
        line = read_trimmed(reader, deadline).await?;
        if line.is_empty() {
            return Err(ReadError::Empty);
        }
    }

    trace!(status = %line, "Read probe status");
    let status = StatusLine::parse(&line)?;

    let diagnostic = if status.is_success() {
        None
    } else {
        match read_trimmed(reader, deadline).await {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(error = %e, "Probe reported failure without a diagnostic");
                None
            }
        }
    };

    Ok(StatusReport { status, diagnostic })
}
