use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::time::Duration;

/// Supported controller families. The kind selects the ISO TSAP pair and the
/// string prefix widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum PlcKind {
    S200 = 0x00,
    S200Smart = 0x01,
    S300 = 0x02,
    S400 = 0x03,
    S1200 = 0x04,
    S1500 = 0x05,
    Sinumerik828d = 0x06,
}

pub const DEFAULT_PORT: u16 = 102;
pub const DEFAULT_PDU_LENGTH: u16 = 480;

/// Connection options for a [`Client`](crate::Client).
///
/// All intervals double on each attempt up to their backoff cap; a maximum of
/// `-1` retries/reconnects means unbounded attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientOptions {
    pub plc: PlcKind,
    pub host: String,
    pub port: u16,
    /// CPU rack, used for the 300/400/1200/1500 TSAP
    pub rack: u8,
    /// CPU slot, used for the 300/400/1200/1500 TSAP
    pub slot: u8,
    /// Proposed maximum PDU length, bounded by negotiation
    pub pdu_length: u16,
    /// Connect and per-request timeout
    pub timeout: Duration,
    /// Retry the initial connect on failure
    pub connect_retry: bool,
    pub retry_interval: Duration,
    pub max_retries: i32,
    pub max_retry_backoff: Duration,
    /// Reconnect when an established connection is lost
    pub auto_reconnect: bool,
    pub reconnect_interval: Duration,
    pub max_reconnect_times: i32,
    pub max_reconnect_backoff: Duration,
}

impl ClientOptions {
    pub fn new(plc: PlcKind, host: impl Into<String>) -> Self {
        ClientOptions {
            host: host.into(),
            ..Self::localhost(plc)
        }
    }

    fn localhost(plc: PlcKind) -> Self {
        ClientOptions {
            plc,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            rack: 0,
            slot: 0,
            pdu_length: DEFAULT_PDU_LENGTH,
            timeout: Duration::from_secs(5),
            connect_retry: false,
            retry_interval: Duration::from_secs(10),
            max_retries: 5,
            max_retry_backoff: Duration::from_secs(300),
            auto_reconnect: false,
            reconnect_interval: Duration::from_secs(10),
            max_reconnect_times: 5,
            max_reconnect_backoff: Duration::from_secs(300),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::localhost(PlcKind::S1500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let opts = ClientOptions::default();
        assert_eq!(opts.host, "127.0.0.1");
        assert_eq!(opts.port, 102);
        assert_eq!(opts.pdu_length, 480);
        assert_eq!(opts.timeout, Duration::from_secs(5));
        assert!(!opts.connect_retry);
        assert_eq!(opts.retry_interval, Duration::from_secs(10));
        assert_eq!(opts.max_retries, 5);
        assert_eq!(opts.max_retry_backoff, Duration::from_secs(300));
        assert!(!opts.auto_reconnect);
        assert_eq!(opts.max_reconnect_times, 5);
    }
}
