use std::{collections::HashMap, num::ParseIntError, str::FromStr};

use thiserror::Error;

/// Number of header lines at the top of the kernel counter table.
const HEADER_LINES: usize = 2;

/// Number of counters per direction (receive or transmit).
const COUNTERS_PER_DIRECTION: usize = 8;

/// One direction worth of interface statistics as reported by the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionCounters {
    pub bytes: u64,
    pub packets: u64,
    pub errs: u64,
    pub drop: u64,
    pub fifo: u64,
    pub frame: u64,
    pub compressed: u64,
    pub multicast: u64,
}

impl From<[u64; COUNTERS_PER_DIRECTION]> for DirectionCounters {
    fn from(value: [u64; COUNTERS_PER_DIRECTION]) -> Self {
        let [bytes, packets, errs, drop, fifo, frame, compressed, multicast] = value;
        Self {
            bytes,
            packets,
            errs,
            drop,
            fifo,
            frame,
            compressed,
            multicast,
        }
    }
}

/// Receive and transmit statistics for a single interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub rx: DirectionCounters,
    pub tx: DirectionCounters,
}

/// Represents errors in parsing a kernel counter table.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SnapshotParseError {
    /// The line has no `iface:` prefix.
    #[error("Line {line}: missing interface separator.")]
    MissingSeparator { line: usize },

    /// The line does not carry exactly 16 counters.
    #[error("Line {line}: expected 16 counters, found {found}.")]
    WrongFieldCount { line: usize, found: usize },

    /// One of the counters is not an unsigned integer.
    #[error("Line {line}: invalid counter '{field}'. Error: {source}")]
    InvalidCounter {
        line: usize,
        field: String,
        source: ParseIntError,
    },
}

/// All interfaces' counters as read from the kernel at one instant.
/// A snapshot is never mutated after it is parsed.
///
/// ```
/// use stream_monitor::models::counter_snapshot::CounterSnapshot;
/// let text = "Inter-|   Receive\n face |bytes\n  eth0: 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16\n";
/// let snapshot: CounterSnapshot = text.parse().expect("Failed to parse counter table.");
/// assert_eq!(snapshot.get("eth0").map(|c| c.tx.bytes), Some(9));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    interfaces: HashMap<String, InterfaceCounters>,
}

impl CounterSnapshot {
    /// Look up the counters for an interface by name.
    pub fn get(&self, interface: &str) -> Option<&InterfaceCounters> {
        self.interfaces.get(interface)
    }

    /// Names of every interface present in the snapshot.
    pub fn interface_names(&self) -> impl Iterator<Item = &str> {
        self.interfaces.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

impl FromIterator<(String, InterfaceCounters)> for CounterSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, InterfaceCounters)>>(iter: T) -> Self {
        Self {
            interfaces: iter.into_iter().collect(),
        }
    }
}

impl FromStr for CounterSnapshot {
    type Err = SnapshotParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.lines()
            .enumerate()
            .skip(HEADER_LINES)
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| parse_interface_line(index + 1, line))
            .collect()
    }
}

/// Parse a single `iface: <8 rx counters> <8 tx counters>` line.
/// The kernel drops the space after the colon once the rx byte counter is
/// wide enough, so the name is split off at the colon rather than on
/// whitespace.
fn parse_interface_line(
    line: usize,
    text: &str,
) -> Result<(String, InterfaceCounters), SnapshotParseError> {
    let (name, counters) = text
        .split_once(':')
        .ok_or(SnapshotParseError::MissingSeparator { line })?;

    let values = counters
        .split_whitespace()
        .map(|field| {
            field
                .parse::<u64>()
                .map_err(|source| SnapshotParseError::InvalidCounter {
                    line,
                    field: field.to_string(),
                    source,
                })
        })
        .collect::<Result<Vec<u64>, _>>()?;

    if values.len() != 2 * COUNTERS_PER_DIRECTION {
        return Err(SnapshotParseError::WrongFieldCount {
            line,
            found: values.len(),
        });
    }

    let mut rx = [0u64; COUNTERS_PER_DIRECTION];
    let mut tx = [0u64; COUNTERS_PER_DIRECTION];
    rx.copy_from_slice(&values[..COUNTERS_PER_DIRECTION]);
    tx.copy_from_slice(&values[COUNTERS_PER_DIRECTION..]);

    Ok((
        name.trim().to_string(),
        InterfaceCounters {
            rx: rx.into(),
            tx: tx.into(),
        },
    ))
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub const PROC_NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:   12345     100    0    0    0     0          0         0    12345     100    0    0    0     0       0          0
  eth0: 9876543    7654    1    2    3     4          5         6  1234567    4321    7    8    9    10      11         12
 wlan0:       0       0    0    0    0     0          0         0        0       0    0    0    0     0       0          0
";

    #[test]
    fn test_parse_proc_net_dev() {
        let snapshot: CounterSnapshot = PROC_NET_DEV.parse().expect("Failed to parse table.");

        assert_eq!(snapshot.len(), 3);

        let eth0 = snapshot.get("eth0").expect("Missing eth0.");
        assert_eq!(
            eth0.rx,
            DirectionCounters::from([9876543, 7654, 1, 2, 3, 4, 5, 6])
        );
        assert_eq!(
            eth0.tx,
            DirectionCounters::from([1234567, 4321, 7, 8, 9, 10, 11, 12])
        );

        assert_eq!(snapshot.get("lo").map(|c| c.tx.bytes), Some(12345));
        assert_eq!(snapshot.get("wlan0"), Some(&InterfaceCounters::default()));
        assert_eq!(snapshot.get("wlan1"), None);
    }

    #[test]
    fn test_parse_without_space_after_colon() {
        let text = "h1\nh2\neth0:4294967296 1 0 0 0 0 0 0 77 1 0 0 0 0 0 0\n";
        let snapshot: CounterSnapshot = text.parse().expect("Failed to parse table.");

        let eth0 = snapshot.get("eth0").expect("Missing eth0.");
        assert_eq!(eth0.rx.bytes, 4294967296);
        assert_eq!(eth0.tx.bytes, 77);
    }

    #[test]
    fn test_headers_only_is_empty() {
        let text = "h1\nh2\n\n";
        let snapshot: CounterSnapshot = text.parse().expect("Failed to parse table.");
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_missing_field_is_error() {
        let text = "h1\nh2\neth0: 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15\n";
        let result = text.parse::<CounterSnapshot>();
        assert_eq!(
            result,
            Err(SnapshotParseError::WrongFieldCount { line: 3, found: 15 })
        );
    }

    #[test]
    fn test_missing_separator_is_error() {
        let text = "h1\nh2\neth0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16\n";
        let result = text.parse::<CounterSnapshot>();
        assert_eq!(result, Err(SnapshotParseError::MissingSeparator { line: 3 }));
    }

    #[test]
    fn test_non_numeric_counter_is_error() {
        let text = "h1\nh2\neth0: 1 2 3 4 5 6 7 8 x 10 11 12 13 14 15 16\n";
        let result = text.parse::<CounterSnapshot>();
        assert!(matches!(
            result,
            Err(SnapshotParseError::InvalidCounter { line: 3, ref field, .. }) if field == "x"
        ));
    }
}
