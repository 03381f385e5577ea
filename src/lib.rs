//! Client for the Siemens S7 communication protocol over ISO-on-TCP
//! (RFC1006), targeting the S7-200/300/400/1200/1500 families and the
//! Sinumerik 828D.
//!
//! The crate is layered the way the protocol is: a binary frame codec
//! (TPKT / COTP / S7 header / parameter / datum), an async session that
//! multiplexes requests over one TCP connection by PDU reference, a
//! segmentation planner that keeps every request under the negotiated PDU
//! length, and a [`Client`] exposing tag reads and writes, block transfer,
//! diagnostics, clock and session-password operations.
//!
//! ```no_run
//! use s7_client::{Client, ClientOptions, PlcKind, Value};
//!
//! # async fn demo() -> s7_client::Result<()> {
//! let client = Client::new(ClientOptions::new(PlcKind::S1500, "192.168.0.1"));
//! client.connect().await?;
//! let value = client.read_parsed("DB1.X0.0").await?;
//! assert!(matches!(value, Value::Bit(_)));
//! client.write_raw("DB1.I4", Value::Int(-88).to_bytes(PlcKind::S1500, client.pdu_length())).await?;
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod info;
pub mod protocol;
mod value;

pub use client::{Client, ConnectedHook, DisconnectedHook, Hooks};
pub use config::{ClientOptions, PlcKind, DEFAULT_PDU_LENGTH, DEFAULT_PORT};
pub use info::{
    BlockInfo, Catalog, CommunicationInfo, CpuProtectionLevel, ParameterProtectionLevel, PlcStatus,
    ProtectionInfo, SelectorSetting, StartupSwitch, UnitInfo,
};
pub use protocol::error::{Error, Result};
pub use protocol::frame::{
    parse_address, Area, BlockType, DestinationFileSystem, ListBlockInfo, ListBlockTypeInfo,
    ReadSzlAckDatum, ReturnCode, StandardItem, VariableType,
};
pub use protocol::session::Status;
pub use value::{RawValue, Value};
