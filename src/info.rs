//! Diagnostic structures decoded from SZL answers and block queries.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Module order code and firmware version (SZL 0x0011).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub order_code: String,
    pub version: String,
}

/// Module identification (SZL 0x001C).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub module_type_name: String,
    pub serial_number: String,
    pub as_name: String,
    pub copyright: String,
    pub module_name: String,
}

/// Communication capabilities (SZL 0x0131).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationInfo {
    pub max_pdu_length: u16,
    pub max_connections: u16,
    pub max_mpi_rate: u16,
    pub max_bus_rate: u16,
}

/// Protection configuration (SZL 0x0232 index 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionInfo {
    pub level: u16,
    pub parameter_level: ParameterProtectionLevel,
    pub cpu_level: CpuProtectionLevel,
    pub selector_setting: SelectorSetting,
    pub startup_switch: StartupSwitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterProtectionLevel {
    NoPassword,
    SelectorPassword,
    WritePassword,
    ReadWritePassword,
    Unknown(u16),
}

impl From<u16> for ParameterProtectionLevel {
    fn from(v: u16) -> Self {
        match v {
            0x0000 => Self::NoPassword,
            0x0001 => Self::SelectorPassword,
            0x0002 => Self::WritePassword,
            0x0003 => Self::ReadWritePassword,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuProtectionLevel {
    AccessGrant,
    ReadOnly,
    ReadWritePassword,
    Unknown(u16),
}

impl From<u16> for CpuProtectionLevel {
    fn from(v: u16) -> Self {
        match v {
            0x0001 => Self::AccessGrant,
            0x0002 => Self::ReadOnly,
            0x0003 => Self::ReadWritePassword,
            other => Self::Unknown(other),
        }
    }
}

/// Position of the physical mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorSetting {
    Run,
    RunP,
    Stop,
    Mres,
    Unknown(u16),
}

impl From<u16> for SelectorSetting {
    fn from(v: u16) -> Self {
        match v {
            0x0001 => Self::Run,
            0x0002 => Self::RunP,
            0x0003 => Self::Stop,
            0x0004 => Self::Mres,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupSwitch {
    ColdRestart,
    WarmRestart,
    Unknown(u16),
}

impl From<u16> for StartupSwitch {
    fn from(v: u16) -> Self {
        match v {
            0x0001 => Self::ColdRestart,
            0x0002 => Self::WarmRestart,
            other => Self::Unknown(other),
        }
    }
}

/// Run state reported by SZL 0x0024.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlcStatus {
    Unknown,
    Run,
    Stop,
}

impl From<u8> for PlcStatus {
    fn from(v: u8) -> Self {
        match v {
            0x08 => PlcStatus::Run,
            0x04 => PlcStatus::Stop,
            _ => PlcStatus::Unknown,
        }
    }
}

/// Managed block information decoded from a block info acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub block_type: u16,
    pub block_number: u16,
    pub language: u8,
    pub flags: u8,
    pub mc7_code_length: u16,
    pub length_load_memory: u32,
    pub local_data_length: u16,
    pub ssb_length: u16,
    pub checksum: u16,
    pub version: u8,
    pub code_date: NaiveDateTime,
    pub interface_date: NaiveDateTime,
    pub author: String,
    pub family: String,
    pub header: String,
}

/// Siemens block timestamps count days from 1984-01-01 UTC.
pub(crate) fn siemens_timestamp(encoded_date: i64) -> NaiveDateTime {
    let base = NaiveDate::from_ymd_opt(1984, 1, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default();
    encoded_date
        .checked_mul(86_400)
        .and_then(Duration::try_seconds)
        .and_then(|d| base.checked_add_signed(d))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siemens_timestamp_counts_days_from_1984() {
        let t = siemens_timestamp(1);
        assert_eq!(t.date(), NaiveDate::from_ymd_opt(1984, 1, 2).unwrap());
        // garbage encodings fall back to the epoch instead of overflowing
        let t = siemens_timestamp(i64::MAX);
        assert_eq!(t.date(), NaiveDate::from_ymd_opt(1984, 1, 1).unwrap());
    }

    #[test]
    fn plc_status_from_szl_byte() {
        assert_eq!(PlcStatus::from(0x08), PlcStatus::Run);
        assert_eq!(PlcStatus::from(0x04), PlcStatus::Stop);
        assert_eq!(PlcStatus::from(0x42), PlcStatus::Unknown);
    }
}
