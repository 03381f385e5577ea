pub mod addr;
pub mod cotp;
pub mod datum;
pub mod header;
pub mod item;
pub mod param;
pub mod pdu;
pub mod tpkt;
pub mod tsap;
pub mod types;

use super::error::Result;
use bytes::{BufMut, Bytes, BytesMut};

/// Wire encoding contract shared by every record of the layered codec.
///
/// `encoded_len` must report exactly the number of bytes `encode_to` will
/// append; the PDU self-check recomputes header length fields from it.
pub trait WireEncode {
    fn encoded_len(&self) -> usize;
    fn encode_to<B: BufMut>(&self, dst: &mut B);

    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_to(&mut buf);
        buf.freeze()
    }
}

/// Wire decoding for records whose layout is self-describing.
///
/// Records whose parse depends on outer context (message type, function code,
/// function group) expose inherent `parse` functions taking that context
/// instead.
pub trait WireDecode: Sized {
    fn parse(input: &[u8]) -> Result<Self>;
}

pub use addr::parse_address;
pub use cotp::{Cotp, CotpConnection, CotpData};
pub use datum::{
    BlockInfoAckDatum, BlockInfoRequestDatum, BlockListAckDatum, BlockListTypeAckDatum,
    BlockListTypeDatum, ClockDatum, DataItem, Datum, ListBlockInfo, ListBlockTypeInfo,
    ReadSzlAckDatum, ReadSzlDatum, ReadWriteDatum, ResponseItem, ReturnItem, SetPasswordDatum,
    UpDownloadDatum, UserdataDatum,
};
pub use header::{AckHeader, Header, RequestHeader};
pub use item::{NckItem, RequestItem, StandardItem};
pub use param::{
    DownloadParameter, EndDownloadParameter, EndUploadParameter, Parameter, PlcControlAckParameter,
    PlcControlParameter, PlcStopParameter, ReadWriteParameter, SetupComParameter,
    StandardParameter, StartDownloadParameter, StartUploadAckParameter, StartUploadParameter,
    UploadAckParameter, UploadParameter, UserdataAckParameter, UserdataParameter,
};
pub use pdu::Pdu;
pub use tpkt::Tpkt;
pub use tsap::default_tsap_pair;
pub use types::{
    Area, BlockSubFunction, BlockType, CotpType, CpuSubFunction, DataVariableType,
    DestinationFileSystem, FunctionCode, FunctionGroup, MessageType, Method, ReturnCode,
    SecuritySubFunction, SyntaxId, TimeSubFunction, VariableType,
};
