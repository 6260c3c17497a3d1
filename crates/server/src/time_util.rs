// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp helpers shared across ingress, the evaluator, and audit log.

use chrono::{DateTime, Utc};

/// Current time. Centralized so tests can reason about it; the control
/// plane always uses wall-clock time (no virtual clock, unlike the sharded
/// evaluator's windows which are relative durations).
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds since the Unix epoch, matching the wire format used for
/// cached timestamps throughout the system.
pub fn epoch_ms() -> u64 {
    now().timestamp_millis().max(0) as u64
}

/// Parse an RFC3339 timestamp, the wire format for all sample/heartbeat
/// timestamps.
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_rfc3339("2026-07-28T12:00:00Z").expect("valid rfc3339");
        assert_eq!(parsed.timestamp(), 1785240000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_rfc3339("not-a-date").is_err());
    }
}
