use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::models::counter_snapshot::{CounterSnapshot, SnapshotParseError};

/// This service separates reading the kernel counter table from the
/// business logic so the monitor loop can be tested without a real
/// `/proc/net/dev`.
pub trait CounterSource: Send + Sync {
    /// Take one snapshot of every interface's counters.
    fn snapshot(&self) -> Result<CounterSnapshot, CounterSourceError>;
}

impl<T: CounterSource + ?Sized> CounterSource for Box<T> {
    fn snapshot(&self) -> Result<CounterSnapshot, CounterSourceError> {
        (**self).snapshot()
    }
}

#[derive(Error, Debug)]
pub enum CounterSourceError {
    /// The counter table could not be read.
    #[error("Failed to read counter table '{}'. Error: {source}", .path.display())]
    FailedToRead { path: PathBuf, source: io::Error },

    /// The counter table was read but is not well formed.
    #[error("Failed to parse counter table. Error: {0}")]
    FailedToParse(#[from] SnapshotParseError),
}

/// Reads the line oriented kernel counter table, `/proc/net/dev` by default.
pub struct ProcNetDevService {
    path: PathBuf,
}

impl ProcNetDevService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CounterSource for ProcNetDevService {
    /// The whole table is read in a single call so every interface comes
    /// from the same instant.
    fn snapshot(&self) -> Result<CounterSnapshot, CounterSourceError> {
        let text = fs::read_to_string(&self.path).map_err(|source| {
            CounterSourceError::FailedToRead {
                path: self.path.clone(),
                source,
            }
        })?;
        let snapshot: CounterSnapshot = text.parse()?;
        trace!("Read counters for {} interfaces.", snapshot.len());
        Ok(snapshot)
    }
}

/// Stand-in for platforms without a kernel counter table. Always reports
/// no interfaces.
pub struct NullCounterSource;

impl CounterSource for NullCounterSource {
    fn snapshot(&self) -> Result<CounterSnapshot, CounterSourceError> {
        Ok(CounterSnapshot::default())
    }
}

/// Pick the real counter table if it exists, otherwise the inert source.
pub fn detect_counter_source(path: &Path) -> Box<dyn CounterSource> {
    if path.is_file() {
        debug!("Using counter table at '{}'.", path.display());
        Box::new(ProcNetDevService::new(path))
    } else {
        warn!(
            "No counter table at '{}'. No interfaces will be reported.",
            path.display()
        );
        Box::new(NullCounterSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::counter_snapshot::tests::PROC_NET_DEV;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "stream_monitor_counters_{}_{}",
            std::process::id(),
            name
        ))
    }

    #[test]
    fn test_read_counter_table() {
        let path = scratch_file("read");
        fs::write(&path, PROC_NET_DEV).expect("Failed to write fixture.");

        let snapshot = ProcNetDevService::new(&path)
            .snapshot()
            .expect("Failed to read snapshot.");
        assert_eq!(snapshot.get("eth0").map(|c| c.tx.bytes), Some(1234567));

        fs::remove_file(&path).expect("Failed to remove fixture.");
    }

    #[test]
    fn test_missing_table_is_read_error() {
        let path = scratch_file("missing");
        let result = ProcNetDevService::new(&path).snapshot();
        assert!(matches!(result, Err(CounterSourceError::FailedToRead { .. })));
    }

    #[test]
    fn test_malformed_table_is_parse_error() {
        let path = scratch_file("malformed");
        fs::write(&path, "h1\nh2\neth0: 1 2 3\n").expect("Failed to write fixture.");

        let result = ProcNetDevService::new(&path).snapshot();
        assert!(matches!(result, Err(CounterSourceError::FailedToParse(_))));

        fs::remove_file(&path).expect("Failed to remove fixture.");
    }

    #[test]
    fn test_detect_falls_back_to_null_source() {
        let source = detect_counter_source(&scratch_file("absent"));
        let snapshot = source.snapshot().expect("Failed to read snapshot.");
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_detect_uses_table_when_present() {
        let path = scratch_file("detect");
        fs::write(&path, PROC_NET_DEV).expect("Failed to write fixture.");

        let snapshot = detect_counter_source(&path)
            .snapshot()
            .expect("Failed to read snapshot.");
        assert_eq!(snapshot.len(), 3);

        fs::remove_file(&path).expect("Failed to remove fixture.");
    }
}
