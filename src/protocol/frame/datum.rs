use super::{
    super::error::{Error, Result},
    types::{
        BlockSubFunction, BlockType, CpuSubFunction, DataVariableType, DestinationFileSystem,
        FunctionCode, FunctionGroup, MessageType, ReturnCode, SecuritySubFunction, TimeSubFunction,
    },
    WireDecode, WireEncode,
};
use bytes::{BufMut, Bytes};
use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::value::{decode_bcd, encode_bcd};

pub const DATA_ITEM_MIN_LEN: usize = 4;
pub const RETURN_ITEM_LEN: usize = 1;
pub const UP_DOWNLOAD_DATUM_MIN_LEN: usize = 4;
pub const USERDATA_DATUM_LEN: usize = 4;
pub const SET_PASSWORD_DATUM_LEN: usize = 12;
pub const CLOCK_DATUM_LEN: usize = 14;
pub const READ_SZL_DATUM_LEN: usize = 8;
pub const READ_SZL_ACK_DATUM_MIN_LEN: usize = 12;
pub const BLOCK_ACK_DATUM_MIN_LEN: usize = 4;
pub const BLOCK_LIST_TYPE_DATUM_LEN: usize = 6;
pub const BLOCK_INFO_REQUEST_DATUM_LEN: usize = 12;

/// Datum (data section) of an S7 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    ReadWrite(ReadWriteDatum),
    UpDownload(UpDownloadDatum),
    Userdata(UserdataDatum),
    SetPassword(SetPasswordDatum),
    Clock(ClockDatum),
    ReadSzl(ReadSzlDatum),
    ReadSzlAck(ReadSzlAckDatum),
    BlockListType(BlockListTypeDatum),
    BlockInfoRequest(BlockInfoRequestDatum),
    BlockListAck(BlockListAckDatum),
    BlockListTypeAck(BlockListTypeAckDatum),
    BlockInfoAck(BlockInfoAckDatum),
}

impl Datum {
    /// Parse the data section. The variant is selected by the userdata
    /// function group and sub-function for UserData messages, and by the
    /// function code otherwise.
    pub fn parse(
        input: &[u8],
        message_type: MessageType,
        function_code: Option<FunctionCode>,
        function_group: Option<FunctionGroup>,
        sub_function: u8,
    ) -> Result<Self> {
        if message_type == MessageType::UserData {
            let group = function_group.ok_or(Error::ResponseInvalid)?;
            return match group {
                FunctionGroup::ResponseCpuFunction if sub_function == CpuSubFunction::ReadSzl as u8 => {
                    Ok(Datum::ReadSzlAck(ReadSzlAckDatum::parse(input)?))
                }
                FunctionGroup::ResponseBlockFunction => match sub_function {
                    x if x == BlockSubFunction::ListBlocks as u8 => {
                        Ok(Datum::BlockListAck(BlockListAckDatum::parse(input)?))
                    }
                    x if x == BlockSubFunction::ListBlocksOfType as u8 => {
                        Ok(Datum::BlockListTypeAck(BlockListTypeAckDatum::parse(input)?))
                    }
                    x if x == BlockSubFunction::BlockInfo as u8 => {
                        Ok(Datum::BlockInfoAck(BlockInfoAckDatum::parse(input)?))
                    }
                    other => Err(Error::TypeNotResolved {
                        what: "sub function",
                        actual: other,
                    }),
                },
                FunctionGroup::ResponseTimeFunction => match sub_function {
                    x if x == TimeSubFunction::ReadClock as u8 => {
                        Ok(Datum::Clock(ClockDatum::parse(input)?))
                    }
                    x if x == TimeSubFunction::SetClock as u8 => {
                        Ok(Datum::Userdata(UserdataDatum::parse(input)?))
                    }
                    other => Err(Error::TypeNotResolved {
                        what: "sub function",
                        actual: other,
                    }),
                },
                FunctionGroup::ResponseSecurity => Ok(Datum::Userdata(UserdataDatum::parse(input)?)),
                // Request-side layouts, needed to re-parse our own frames
                FunctionGroup::RequestCpuFunction if sub_function == CpuSubFunction::ReadSzl as u8 => {
                    Ok(Datum::ReadSzl(ReadSzlDatum::parse(input)?))
                }
                FunctionGroup::RequestBlockFunction => match sub_function {
                    x if x == BlockSubFunction::ListBlocks as u8 => {
                        Ok(Datum::Userdata(UserdataDatum::parse(input)?))
                    }
                    x if x == BlockSubFunction::ListBlocksOfType as u8 => {
                        Ok(Datum::BlockListType(BlockListTypeDatum::parse(input)?))
                    }
                    x if x == BlockSubFunction::BlockInfo as u8 => Ok(Datum::BlockInfoRequest(
                        BlockInfoRequestDatum::parse(input)?,
                    )),
                    other => Err(Error::TypeNotResolved {
                        what: "sub function",
                        actual: other,
                    }),
                },
                FunctionGroup::RequestTimeFunction => match sub_function {
                    x if x == TimeSubFunction::ReadClock as u8 => {
                        Ok(Datum::Userdata(UserdataDatum::parse(input)?))
                    }
                    x if x == TimeSubFunction::SetClock as u8 => {
                        Ok(Datum::Clock(ClockDatum::parse(input)?))
                    }
                    other => Err(Error::TypeNotResolved {
                        what: "sub function",
                        actual: other,
                    }),
                },
                FunctionGroup::RequestSecurity => match sub_function {
                    x if x == SecuritySubFunction::SetPassword as u8 => {
                        Ok(Datum::SetPassword(SetPasswordDatum::parse(input)?))
                    }
                    x if x == SecuritySubFunction::ClearPassword as u8 => {
                        Ok(Datum::Userdata(UserdataDatum::parse(input)?))
                    }
                    other => Err(Error::TypeNotResolved {
                        what: "sub function",
                        actual: other,
                    }),
                },
                _ => Err(Error::TypeNotResolved {
                    what: "function group",
                    actual: group as u8,
                }),
            };
        }

        match function_code {
            Some(fc @ (FunctionCode::Read | FunctionCode::Write)) => Ok(Datum::ReadWrite(
                ReadWriteDatum::parse(input, message_type, fc)?,
            )),
            Some(FunctionCode::Download | FunctionCode::Upload) => {
                Ok(Datum::UpDownload(UpDownloadDatum::parse(input)?))
            }
            _ => Err(Error::ResponseInvalid),
        }
    }
}

impl WireEncode for Datum {
    fn encoded_len(&self) -> usize {
        match self {
            Datum::ReadWrite(d) => d.encoded_len(),
            Datum::UpDownload(d) => d.encoded_len(),
            Datum::Userdata(d) => d.encoded_len(),
            Datum::SetPassword(d) => d.encoded_len(),
            Datum::Clock(d) => d.encoded_len(),
            Datum::ReadSzl(d) => d.encoded_len(),
            Datum::ReadSzlAck(d) => d.encoded_len(),
            Datum::BlockListType(d) => d.encoded_len(),
            Datum::BlockInfoRequest(d) => d.encoded_len(),
            Datum::BlockListAck(d) => d.encoded_len(),
            Datum::BlockListTypeAck(d) => d.encoded_len(),
            Datum::BlockInfoAck(d) => d.encoded_len(),
        }
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        match self {
            Datum::ReadWrite(d) => d.encode_to(dst),
            Datum::UpDownload(d) => d.encode_to(dst),
            Datum::Userdata(d) => d.encode_to(dst),
            Datum::SetPassword(d) => d.encode_to(dst),
            Datum::Clock(d) => d.encode_to(dst),
            Datum::ReadSzl(d) => d.encode_to(dst),
            Datum::ReadSzlAck(d) => d.encode_to(dst),
            Datum::BlockListType(d) => d.encode_to(dst),
            Datum::BlockInfoRequest(d) => d.encode_to(dst),
            Datum::BlockListAck(d) => d.encode_to(dst),
            Datum::BlockListTypeAck(d) => d.encode_to(dst),
            Datum::BlockInfoAck(d) => d.encode_to(dst),
        }
    }
}

/// Response item of a read/write datum; write acks degrade to a single
/// return-code byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseItem {
    Data(DataItem),
    Return(ReturnItem),
}

impl ResponseItem {
    pub fn return_code(&self) -> ReturnCode {
        match self {
            ResponseItem::Data(i) => i.return_code,
            ResponseItem::Return(i) => i.return_code,
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            ResponseItem::Data(i) => &i.data,
            ResponseItem::Return(_) => &[],
        }
    }
}

impl WireEncode for ResponseItem {
    fn encoded_len(&self) -> usize {
        match self {
            ResponseItem::Data(i) => i.encoded_len(),
            ResponseItem::Return(i) => i.encoded_len(),
        }
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        match self {
            ResponseItem::Data(i) => i.encode_to(dst),
            ResponseItem::Return(i) => i.encode_to(dst),
        }
    }
}

/// Data item: return code, transport size, length and payload.
///
/// For Null/ByteWordDword/Int transport sizes the on-wire length field is in
/// bits; for Bit/DInt/Real/OctetString it is in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    pub return_code: ReturnCode,
    pub variable_type: DataVariableType,
    pub data: Bytes,
}

impl DataItem {
    /// Item carried by a write request; the return code is always reserved.
    pub fn request(data: Bytes, variable_type: DataVariableType) -> Self {
        DataItem {
            return_code: ReturnCode::Reserved,
            variable_type,
            data,
        }
    }

    /// Item carried by a read response.
    pub fn response(data: Bytes, variable_type: DataVariableType) -> Self {
        DataItem {
            return_code: ReturnCode::Success,
            variable_type,
            data,
        }
    }
}

impl WireEncode for DataItem {
    fn encoded_len(&self) -> usize {
        DATA_ITEM_MIN_LEN + self.data.len()
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.return_code as u8);
        dst.put_u8(self.variable_type as u8);
        let count = self.data.len() as u16;
        if self.variable_type.counts_in_bits() {
            dst.put_u16(count * 8);
        } else {
            dst.put_u16(count);
        }
        dst.put_slice(&self.data);
    }
}

impl WireDecode for DataItem {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < DATA_ITEM_MIN_LEN {
            return Err(Error::ModelFromBytes {
                what: "DataItem",
                min: DATA_ITEM_MIN_LEN,
            });
        }
        let return_code = ReturnCode::try_from(input[0])?;
        let variable_type = DataVariableType::try_from(input[1])?;
        let raw_count = u16::from_be_bytes([input[2], input[3]]) as usize;
        let count = if variable_type.counts_in_bits() {
            raw_count / 8
        } else {
            raw_count
        };
        let data = if variable_type == DataVariableType::Null {
            Bytes::new()
        } else {
            if input.len() < DATA_ITEM_MIN_LEN + count {
                return Err(Error::ModelFromBytes {
                    what: "DataItem",
                    min: DATA_ITEM_MIN_LEN + count,
                });
            }
            Bytes::copy_from_slice(&input[4..4 + count])
        };
        Ok(DataItem {
            return_code,
            variable_type,
            data,
        })
    }
}

/// Single-byte return item of a write acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnItem {
    pub return_code: ReturnCode,
}

impl WireEncode for ReturnItem {
    fn encoded_len(&self) -> usize {
        RETURN_ITEM_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.return_code as u8);
    }
}

impl WireDecode for ReturnItem {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::ModelFromBytes {
                what: "ReturnItem",
                min: RETURN_ITEM_LEN,
            });
        }
        Ok(ReturnItem {
            return_code: ReturnCode::try_from(input[0])?,
        })
    }
}

/// Read/write datum: a sequence of response items. After every data item
/// except the last, an odd encoded length is padded with one 0x00 byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadWriteDatum {
    pub items: Vec<ResponseItem>,
}

impl ReadWriteDatum {
    pub fn new(items: Vec<ResponseItem>) -> Self {
        ReadWriteDatum { items }
    }

    pub fn parse(
        input: &[u8],
        message_type: MessageType,
        function_code: FunctionCode,
    ) -> Result<Self> {
        let mut items = Vec::new();
        if input.is_empty() {
            return Ok(ReadWriteDatum { items });
        }
        let write_ack =
            message_type == MessageType::AckData && function_code == FunctionCode::Write;
        let mut offset = 0;
        loop {
            if write_ack {
                let item = ReturnItem::parse(&input[offset..])?;
                offset += item.encoded_len();
                items.push(ResponseItem::Return(item));
            } else {
                let item = DataItem::parse(&input[offset..])?;
                offset += item.encoded_len();
                // pad byte keeping items even-aligned
                if item.encoded_len() % 2 == 1 {
                    offset += 1;
                }
                items.push(ResponseItem::Data(item));
            }
            if offset >= input.len() {
                break;
            }
        }
        Ok(ReadWriteDatum { items })
    }
}

impl WireEncode for ReadWriteDatum {
    fn encoded_len(&self) -> usize {
        let mut sum = 0;
        for (i, item) in self.items.iter().enumerate() {
            let len = item.encoded_len();
            sum += len;
            if i != self.items.len() - 1 && len % 2 == 1 && matches!(item, ResponseItem::Data(_)) {
                sum += 1;
            }
        }
        sum
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        for (i, item) in self.items.iter().enumerate() {
            let len = item.encoded_len();
            item.encode_to(dst);
            if i != self.items.len() - 1 && len % 2 == 1 && matches!(item, ResponseItem::Data(_)) {
                dst.put_u8(0x00);
            }
        }
    }
}

/// Upload/download datum: u16 length prefix, two constant bytes, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpDownloadDatum {
    pub unknown_bytes: [u8; 2],
    pub data: Bytes,
}

impl UpDownloadDatum {
    pub fn new(data: Bytes) -> Self {
        UpDownloadDatum {
            unknown_bytes: [0x00, 0xFB],
            data,
        }
    }
}

impl WireEncode for UpDownloadDatum {
    fn encoded_len(&self) -> usize {
        UP_DOWNLOAD_DATUM_MIN_LEN + self.data.len()
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u16(self.data.len() as u16);
        dst.put_slice(&self.unknown_bytes);
        dst.put_slice(&self.data);
    }
}

impl WireDecode for UpDownloadDatum {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < UP_DOWNLOAD_DATUM_MIN_LEN {
            return Err(Error::ModelFromBytes {
                what: "UpDownloadDatum",
                min: UP_DOWNLOAD_DATUM_MIN_LEN,
            });
        }
        let len = u16::from_be_bytes([input[0], input[1]]) as usize;
        if input.len() < 4 + len {
            return Err(Error::ModelFromBytes {
                what: "UpDownloadDatum",
                min: 4 + len,
            });
        }
        Ok(UpDownloadDatum {
            unknown_bytes: [input[2], input[3]],
            data: Bytes::copy_from_slice(&input[4..4 + len]),
        })
    }
}

/// Four-byte userdata datum header without a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserdataDatum {
    pub return_code: ReturnCode,
    pub variable_type: DataVariableType,
    pub length: u16,
}

impl UserdataDatum {
    pub fn new() -> Self {
        UserdataDatum {
            return_code: ReturnCode::Success,
            variable_type: DataVariableType::OctetString,
            length: 0,
        }
    }
}

impl Default for UserdataDatum {
    fn default() -> Self {
        Self::new()
    }
}

impl WireEncode for UserdataDatum {
    fn encoded_len(&self) -> usize {
        USERDATA_DATUM_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.return_code as u8);
        dst.put_u8(self.variable_type as u8);
        dst.put_u16(self.length);
    }
}

impl WireDecode for UserdataDatum {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < USERDATA_DATUM_LEN {
            return Err(Error::ModelFromBytes {
                what: "UserdataDatum",
                min: USERDATA_DATUM_LEN,
            });
        }
        Ok(UserdataDatum {
            return_code: ReturnCode::try_from(input[0])?,
            variable_type: DataVariableType::try_from(input[1])?,
            length: u16::from_be_bytes([input[2], input[3]]),
        })
    }
}

/// Session password datum: 8 obfuscated ASCII bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPasswordDatum {
    pub password: [u8; 8],
}

impl SetPasswordDatum {
    /// Pad the password with `'0'` to 8 characters and XOR-obfuscate it:
    /// the first two bytes with 0x55, each later byte additionally with the
    /// obfuscated byte two positions back.
    pub fn new(password: &str) -> Self {
        let mut padded = [b'0'; 8];
        padded[..password.len().min(8)]
            .copy_from_slice(&password.as_bytes()[..password.len().min(8)]);
        let mut out = [0u8; 8];
        for i in 0..8 {
            out[i] = if i < 2 {
                padded[i] ^ 0x55
            } else {
                padded[i] ^ 0x55 ^ out[i - 2]
            };
        }
        SetPasswordDatum { password: out }
    }
}

impl WireEncode for SetPasswordDatum {
    fn encoded_len(&self) -> usize {
        SET_PASSWORD_DATUM_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(ReturnCode::Success as u8);
        dst.put_u8(DataVariableType::OctetString as u8);
        dst.put_u16(8);
        dst.put_slice(&self.password);
    }
}

impl WireDecode for SetPasswordDatum {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < SET_PASSWORD_DATUM_LEN {
            return Err(Error::ModelFromBytes {
                what: "SetPasswordDatum",
                min: SET_PASSWORD_DATUM_LEN,
            });
        }
        let mut password = [0u8; 8];
        password.copy_from_slice(&input[4..12]);
        Ok(SetPasswordDatum { password })
    }
}

/// Clock datum shared by the set request and the read acknowledgement:
/// BCD year-hi/year-lo/month/day/hour/minute/second plus binary milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDatum {
    pub return_code: ReturnCode,
    pub variable_type: DataVariableType,
    pub length: u16,
    pub reserved: u8,
    pub year_hi: u8,
    pub year_lo: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

impl ClockDatum {
    pub fn from_datetime(t: NaiveDateTime) -> Self {
        let year = t.year();
        ClockDatum {
            return_code: ReturnCode::Success,
            variable_type: DataVariableType::OctetString,
            length: 10,
            reserved: 0,
            year_hi: encode_bcd((year / 100) as u8),
            year_lo: encode_bcd((year % 100) as u8),
            month: encode_bcd(t.month() as u8),
            day: encode_bcd(t.day() as u8),
            hour: encode_bcd(t.hour() as u8),
            minute: encode_bcd(t.minute() as u8),
            second: encode_bcd(t.second() as u8),
            millisecond: (t.nanosecond() / 1_000_000) as u16,
        }
    }

    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        let year = decode_bcd(self.year_hi) as i32 * 100 + decode_bcd(self.year_lo) as i32;
        chrono::NaiveDate::from_ymd_opt(
            year,
            decode_bcd(self.month) as u32,
            decode_bcd(self.day) as u32,
        )?
        .and_hms_milli_opt(
            decode_bcd(self.hour) as u32,
            decode_bcd(self.minute) as u32,
            decode_bcd(self.second) as u32,
            self.millisecond as u32,
        )
    }
}

impl WireEncode for ClockDatum {
    fn encoded_len(&self) -> usize {
        CLOCK_DATUM_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.return_code as u8);
        dst.put_u8(self.variable_type as u8);
        dst.put_u16(self.length);
        dst.put_u8(self.reserved);
        dst.put_u8(self.year_hi);
        dst.put_u8(self.year_lo);
        dst.put_u8(self.month);
        dst.put_u8(self.day);
        dst.put_u8(self.hour);
        dst.put_u8(self.minute);
        dst.put_u8(self.second);
        dst.put_u16(self.millisecond);
    }
}

impl WireDecode for ClockDatum {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < CLOCK_DATUM_LEN {
            return Err(Error::ModelFromBytes {
                what: "ClockDatum",
                min: CLOCK_DATUM_LEN,
            });
        }
        Ok(ClockDatum {
            return_code: ReturnCode::try_from(input[0])?,
            variable_type: DataVariableType::try_from(input[1])?,
            length: u16::from_be_bytes([input[2], input[3]]),
            reserved: input[4],
            year_hi: input[5],
            year_lo: input[6],
            month: input[7],
            day: input[8],
            hour: input[9],
            minute: input[10],
            second: input[11],
            millisecond: u16::from_be_bytes([input[12], input[13]]),
        })
    }
}

/// SZL read request datum: id and index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSzlDatum {
    pub id: u16,
    pub index: u16,
}

impl ReadSzlDatum {
    pub fn new(id: u16, index: u16) -> Self {
        ReadSzlDatum { id, index }
    }
}

impl WireEncode for ReadSzlDatum {
    fn encoded_len(&self) -> usize {
        READ_SZL_DATUM_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(ReturnCode::Success as u8);
        dst.put_u8(DataVariableType::OctetString as u8);
        dst.put_u16(4);
        dst.put_u16(self.id);
        dst.put_u16(self.index);
    }
}

impl WireDecode for ReadSzlDatum {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < READ_SZL_DATUM_LEN {
            return Err(Error::ModelFromBytes {
                what: "ReadSzlDatum",
                min: READ_SZL_DATUM_LEN,
            });
        }
        Ok(ReadSzlDatum {
            id: u16::from_be_bytes([input[4], input[5]]),
            index: u16::from_be_bytes([input[6], input[7]]),
        })
    }
}

/// SZL read acknowledgement: id, index and `part_count` chunks of
/// `part_length` bytes each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSzlAckDatum {
    pub return_code: ReturnCode,
    pub variable_type: DataVariableType,
    pub length: u16,
    pub id: u16,
    pub index: u16,
    pub part_length: u16,
    pub part_count: u16,
    pub parts: Vec<Bytes>,
}

impl WireEncode for ReadSzlAckDatum {
    fn encoded_len(&self) -> usize {
        let mut len = BLOCK_ACK_DATUM_MIN_LEN;
        if self.length > 0 {
            len += 8;
            for part in &self.parts {
                len += part.len();
            }
        }
        len
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.return_code as u8);
        dst.put_u8(self.variable_type as u8);
        dst.put_u16(self.length);
        if self.length > 0 {
            dst.put_u16(self.id);
            dst.put_u16(self.index);
            dst.put_u16(self.part_length);
            dst.put_u16(self.part_count);
            for part in &self.parts {
                dst.put_slice(part);
            }
        }
    }
}

impl WireDecode for ReadSzlAckDatum {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < BLOCK_ACK_DATUM_MIN_LEN {
            return Err(Error::ModelFromBytes {
                what: "ReadSzlAckDatum",
                min: BLOCK_ACK_DATUM_MIN_LEN,
            });
        }
        let length = u16::from_be_bytes([input[2], input[3]]);
        let mut datum = ReadSzlAckDatum {
            return_code: ReturnCode::try_from(input[0])?,
            variable_type: DataVariableType::try_from(input[1])?,
            length,
            id: 0,
            index: 0,
            part_length: 0,
            part_count: 0,
            parts: Vec::new(),
        };
        if length == 0 {
            return Ok(datum);
        }
        if input.len() < READ_SZL_ACK_DATUM_MIN_LEN {
            return Err(Error::ModelFromBytes {
                what: "ReadSzlAckDatum",
                min: READ_SZL_ACK_DATUM_MIN_LEN,
            });
        }
        datum.id = u16::from_be_bytes([input[4], input[5]]);
        datum.index = u16::from_be_bytes([input[6], input[7]]);
        datum.part_length = u16::from_be_bytes([input[8], input[9]]);
        datum.part_count = u16::from_be_bytes([input[10], input[11]]);
        let mut offset = READ_SZL_ACK_DATUM_MIN_LEN;
        for _ in 0..datum.part_count {
            if input.len() < offset + datum.part_length as usize {
                return Err(Error::SzlPartsInvalid);
            }
            datum
                .parts
                .push(Bytes::copy_from_slice(
                    &input[offset..offset + datum.part_length as usize],
                ));
            offset += datum.part_length as usize;
        }
        Ok(datum)
    }
}

/// Block-list-of-type request datum: the queried block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockListTypeDatum {
    pub block_type: BlockType,
}

impl BlockListTypeDatum {
    pub fn new(block_type: BlockType) -> Self {
        BlockListTypeDatum { block_type }
    }
}

impl WireEncode for BlockListTypeDatum {
    fn encoded_len(&self) -> usize {
        BLOCK_LIST_TYPE_DATUM_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(ReturnCode::Success as u8);
        dst.put_u8(DataVariableType::OctetString as u8);
        dst.put_u16(2);
        dst.put_u16(self.block_type as u16);
    }
}

impl WireDecode for BlockListTypeDatum {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < BLOCK_LIST_TYPE_DATUM_LEN {
            return Err(Error::ModelFromBytes {
                what: "BlockListTypeDatum",
                min: BLOCK_LIST_TYPE_DATUM_LEN,
            });
        }
        Ok(BlockListTypeDatum {
            block_type: BlockType::try_from(u16::from_be_bytes([input[4], input[5]]))?,
        })
    }
}

/// Block info request datum naming the queried block file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfoRequestDatum {
    pub block_type: BlockType,
    pub block_number: u32,
    pub file_system: DestinationFileSystem,
}

impl BlockInfoRequestDatum {
    pub fn new(
        block_type: BlockType,
        file_system: DestinationFileSystem,
        block_number: u32,
    ) -> Self {
        BlockInfoRequestDatum {
            block_type,
            block_number,
            file_system,
        }
    }
}

impl WireEncode for BlockInfoRequestDatum {
    fn encoded_len(&self) -> usize {
        BLOCK_INFO_REQUEST_DATUM_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(ReturnCode::Success as u8);
        dst.put_u8(DataVariableType::OctetString as u8);
        dst.put_u16(8);
        dst.put_u16(self.block_type as u16);
        dst.put_slice(format!("{:05}", self.block_number).as_bytes());
        dst.put_u8(self.file_system as u8);
    }
}

impl WireDecode for BlockInfoRequestDatum {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < BLOCK_INFO_REQUEST_DATUM_LEN {
            return Err(Error::ModelFromBytes {
                what: "BlockInfoRequestDatum",
                min: BLOCK_INFO_REQUEST_DATUM_LEN,
            });
        }
        let number = std::str::from_utf8(&input[6..11])
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .ok_or(Error::ResponseInvalid)?;
        Ok(BlockInfoRequestDatum {
            block_type: BlockType::try_from(u16::from_be_bytes([input[4], input[5]]))?,
            block_number: number,
            file_system: DestinationFileSystem::try_from(input[11])?,
        })
    }
}

/// One entry of a block list acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListBlockInfo {
    pub block_type: BlockType,
    pub count: u16,
}

/// Block list acknowledgement: per-type block counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockListAckDatum {
    pub return_code: ReturnCode,
    pub variable_type: DataVariableType,
    pub blocks: Vec<ListBlockInfo>,
}

impl WireEncode for BlockListAckDatum {
    fn encoded_len(&self) -> usize {
        BLOCK_ACK_DATUM_MIN_LEN + self.blocks.len() * 4
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.return_code as u8);
        dst.put_u8(self.variable_type as u8);
        dst.put_u16((self.blocks.len() * 4) as u16);
        for block in &self.blocks {
            dst.put_u16(block.block_type as u16);
            dst.put_u16(block.count);
        }
    }
}

impl WireDecode for BlockListAckDatum {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < BLOCK_ACK_DATUM_MIN_LEN {
            return Err(Error::ModelFromBytes {
                what: "BlockListAckDatum",
                min: BLOCK_ACK_DATUM_MIN_LEN,
            });
        }
        let length = u16::from_be_bytes([input[2], input[3]]) as usize;
        if input.len() < BLOCK_ACK_DATUM_MIN_LEN + length {
            return Err(Error::ModelFromBytes {
                what: "BlockListAckDatum",
                min: BLOCK_ACK_DATUM_MIN_LEN + length,
            });
        }
        let mut blocks = Vec::with_capacity(length / 4);
        let mut offset = 4;
        while offset + 4 <= 4 + length {
            blocks.push(ListBlockInfo {
                block_type: BlockType::try_from(u16::from_be_bytes([
                    input[offset],
                    input[offset + 1],
                ]))?,
                count: u16::from_be_bytes([input[offset + 2], input[offset + 3]]),
            });
            offset += 4;
        }
        Ok(BlockListAckDatum {
            return_code: ReturnCode::try_from(input[0])?,
            variable_type: DataVariableType::try_from(input[1])?,
            blocks,
        })
    }
}

/// One entry of a block-list-of-type acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListBlockTypeInfo {
    pub number: u16,
    pub flags: u8,
    pub language: u8,
}

/// Block-list-of-type acknowledgement: block numbers with their flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockListTypeAckDatum {
    pub return_code: ReturnCode,
    pub variable_type: DataVariableType,
    pub types: Vec<ListBlockTypeInfo>,
}

impl WireEncode for BlockListTypeAckDatum {
    fn encoded_len(&self) -> usize {
        BLOCK_ACK_DATUM_MIN_LEN + self.types.len() * 4
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.return_code as u8);
        dst.put_u8(self.variable_type as u8);
        dst.put_u16((self.types.len() * 4) as u16);
        for t in &self.types {
            dst.put_u16(t.number);
            dst.put_u8(t.flags);
            dst.put_u8(t.language);
        }
    }
}

impl WireDecode for BlockListTypeAckDatum {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < BLOCK_ACK_DATUM_MIN_LEN {
            return Err(Error::ModelFromBytes {
                what: "BlockListTypeAckDatum",
                min: BLOCK_ACK_DATUM_MIN_LEN,
            });
        }
        let length = u16::from_be_bytes([input[2], input[3]]) as usize;
        if input.len() < BLOCK_ACK_DATUM_MIN_LEN + length {
            return Err(Error::ModelFromBytes {
                what: "BlockListTypeAckDatum",
                min: BLOCK_ACK_DATUM_MIN_LEN + length,
            });
        }
        let mut types = Vec::with_capacity(length / 4);
        let mut offset = 4;
        while offset + 4 <= 4 + length {
            types.push(ListBlockTypeInfo {
                number: u16::from_be_bytes([input[offset], input[offset + 1]]),
                flags: input[offset + 2],
                language: input[offset + 3],
            });
            offset += 4;
        }
        Ok(BlockListTypeAckDatum {
            return_code: ReturnCode::try_from(input[0])?,
            variable_type: DataVariableType::try_from(input[1])?,
            types,
        })
    }
}

pub const BLOCK_INFO_ACK_BODY_LEN: u16 = 78;

/// Block info acknowledgement; the 78-byte body is present only when the
/// length field says so.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfoAckDatum {
    pub return_code: ReturnCode,
    pub variable_type: DataVariableType,
    pub length: u16,
    pub block_type: u16,
    pub length_of_info: u16,
    pub reserved1: [u8; 2],
    pub constant: [u8; 2],
    pub reserved2: u8,
    pub flags: u8,
    pub language: u8,
    pub sub_blk_type: u8,
    pub block_number: u16,
    pub length_load_memory: u32,
    pub block_security: u32,
    pub code_timestamp: [u8; 6],
    pub interface_timestamp: [u8; 6],
    pub ssb_length: u16,
    pub add_length: u16,
    pub local_data_length: u16,
    pub mc7_code_length: u16,
    pub author: [u8; 8],
    pub family: [u8; 8],
    pub header: [u8; 8],
    pub version: u8,
    pub reserved3: u8,
    pub checksum: u16,
    pub reserved4: [u8; 4],
    pub reserved5: [u8; 4],
}

impl WireEncode for BlockInfoAckDatum {
    fn encoded_len(&self) -> usize {
        if self.length == BLOCK_INFO_ACK_BODY_LEN {
            BLOCK_ACK_DATUM_MIN_LEN + BLOCK_INFO_ACK_BODY_LEN as usize
        } else {
            BLOCK_ACK_DATUM_MIN_LEN
        }
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.return_code as u8);
        dst.put_u8(self.variable_type as u8);
        dst.put_u16(self.length);
        if self.length != BLOCK_INFO_ACK_BODY_LEN {
            return;
        }
        dst.put_u16(self.block_type);
        dst.put_u16(self.length_of_info);
        dst.put_slice(&self.reserved1);
        dst.put_slice(&self.constant);
        dst.put_u8(self.reserved2);
        dst.put_u8(self.flags);
        dst.put_u8(self.language);
        dst.put_u8(self.sub_blk_type);
        dst.put_u16(self.block_number);
        dst.put_u32(self.length_load_memory);
        dst.put_u32(self.block_security);
        dst.put_slice(&self.code_timestamp);
        dst.put_slice(&self.interface_timestamp);
        dst.put_u16(self.ssb_length);
        dst.put_u16(self.add_length);
        dst.put_u16(self.local_data_length);
        dst.put_u16(self.mc7_code_length);
        dst.put_slice(&self.author);
        dst.put_slice(&self.family);
        dst.put_slice(&self.header);
        dst.put_u8(self.version);
        dst.put_u8(self.reserved3);
        dst.put_u16(self.checksum);
        dst.put_slice(&self.reserved4);
        dst.put_slice(&self.reserved5);
    }
}

impl WireDecode for BlockInfoAckDatum {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < BLOCK_ACK_DATUM_MIN_LEN {
            return Err(Error::ModelFromBytes {
                what: "BlockInfoAckDatum",
                min: BLOCK_ACK_DATUM_MIN_LEN,
            });
        }
        let mut datum = BlockInfoAckDatum {
            return_code: ReturnCode::try_from(input[0])?,
            variable_type: DataVariableType::try_from(input[1])?,
            length: u16::from_be_bytes([input[2], input[3]]),
            block_type: 0,
            length_of_info: 0,
            reserved1: [0; 2],
            constant: [0; 2],
            reserved2: 0,
            flags: 0,
            language: 0,
            sub_blk_type: 0,
            block_number: 0,
            length_load_memory: 0,
            block_security: 0,
            code_timestamp: [0; 6],
            interface_timestamp: [0; 6],
            ssb_length: 0,
            add_length: 0,
            local_data_length: 0,
            mc7_code_length: 0,
            author: [0; 8],
            family: [0; 8],
            header: [0; 8],
            version: 0,
            reserved3: 0,
            checksum: 0,
            reserved4: [0; 4],
            reserved5: [0; 4],
        };
        if datum.length != BLOCK_INFO_ACK_BODY_LEN {
            return Ok(datum);
        }
        if input.len() < BLOCK_ACK_DATUM_MIN_LEN + BLOCK_INFO_ACK_BODY_LEN as usize {
            return Err(Error::ModelFromBytes {
                what: "BlockInfoAckDatum",
                min: BLOCK_ACK_DATUM_MIN_LEN + BLOCK_INFO_ACK_BODY_LEN as usize,
            });
        }
        datum.block_type = u16::from_be_bytes([input[4], input[5]]);
        datum.length_of_info = u16::from_be_bytes([input[6], input[7]]);
        datum.reserved1.copy_from_slice(&input[8..10]);
        datum.constant.copy_from_slice(&input[10..12]);
        datum.reserved2 = input[12];
        datum.flags = input[13];
        datum.language = input[14];
        datum.sub_blk_type = input[15];
        datum.block_number = u16::from_be_bytes([input[16], input[17]]);
        datum.length_load_memory =
            u32::from_be_bytes([input[18], input[19], input[20], input[21]]);
        datum.block_security = u32::from_be_bytes([input[22], input[23], input[24], input[25]]);
        datum.code_timestamp.copy_from_slice(&input[26..32]);
        datum.interface_timestamp.copy_from_slice(&input[32..38]);
        datum.ssb_length = u16::from_be_bytes([input[38], input[39]]);
        datum.add_length = u16::from_be_bytes([input[40], input[41]]);
        datum.local_data_length = u16::from_be_bytes([input[42], input[43]]);
        datum.mc7_code_length = u16::from_be_bytes([input[44], input[45]]);
        datum.author.copy_from_slice(&input[46..54]);
        datum.family.copy_from_slice(&input[54..62]);
        datum.header.copy_from_slice(&input[62..70]);
        datum.version = input[70];
        datum.reserved3 = input[71];
        datum.checksum = u16::from_be_bytes([input[72], input[73]]);
        datum.reserved4.copy_from_slice(&input[74..78]);
        datum.reserved5.copy_from_slice(&input[78..82]);
        Ok(datum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_item_count_is_in_bits_for_byte_access() {
        let item = DataItem::response(Bytes::from_static(&[0xFF, 0xA8]), DataVariableType::ByteWordDword);
        let bs = item.to_bytes();
        assert_eq!(bs.as_ref(), &[0xFF, 0x04, 0x00, 0x10, 0xFF, 0xA8]);
        assert_eq!(DataItem::parse(&bs).unwrap(), item);
    }

    #[test]
    fn data_item_count_is_in_bytes_for_octet_string() {
        let item = DataItem::response(Bytes::from_static(&[0x01, 0x02, 0x03]), DataVariableType::OctetString);
        let bs = item.to_bytes();
        assert_eq!(&bs[2..4], &[0x00, 0x03]);
        assert_eq!(DataItem::parse(&bs).unwrap(), item);
    }

    #[test]
    fn read_write_datum_pads_odd_items_between_entries() {
        let datum = ReadWriteDatum::new(vec![
            ResponseItem::Data(DataItem::response(
                Bytes::from_static(&[0x01]),
                DataVariableType::Bit,
            )),
            ResponseItem::Data(DataItem::response(
                Bytes::from_static(&[0x02, 0x03]),
                DataVariableType::ByteWordDword,
            )),
        ]);
        let bs = datum.to_bytes();
        // first item is 5 bytes, padded to 6, second item 6 bytes
        assert_eq!(bs.len(), 12);
        assert_eq!(bs[5], 0x00);
        let parsed = ReadWriteDatum::parse(&bs, MessageType::AckData, FunctionCode::Read).unwrap();
        assert_eq!(parsed, datum);
    }

    #[test]
    fn write_ack_items_are_single_return_codes() {
        let bs = [0xFF, 0xFF, 0x05];
        let parsed = ReadWriteDatum::parse(&bs, MessageType::AckData, FunctionCode::Write).unwrap();
        assert_eq!(parsed.items.len(), 3);
        assert_eq!(parsed.items[2].return_code(), ReturnCode::AddressOutOfRange);
    }

    #[test]
    fn password_obfuscation_matches_the_xor_chain() {
        let datum = SetPasswordDatum::new("abc");
        let expected0 = b'a' ^ 0x55;
        let expected1 = b'b' ^ 0x55;
        let expected2 = b'c' ^ 0x55 ^ expected0;
        let expected3 = b'0' ^ 0x55 ^ expected1;
        assert_eq!(datum.password[0], expected0);
        assert_eq!(datum.password[1], expected1);
        assert_eq!(datum.password[2], expected2);
        assert_eq!(datum.password[3], expected3);
        let bs = datum.to_bytes();
        assert_eq!(bs[0], 0xFF);
        assert_eq!(bs[1], 0x09);
        assert_eq!(&bs[2..4], &[0x00, 0x08]);
    }

    #[test]
    fn clock_datum_round_trips_bcd_fields() {
        let t = chrono::NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_milli_opt(12, 34, 56, 789)
            .unwrap();
        let datum = ClockDatum::from_datetime(t);
        assert_eq!(datum.year_hi, 0x20);
        assert_eq!(datum.year_lo, 0x24);
        assert_eq!(datum.month, 0x06);
        assert_eq!(datum.second, 0x56);
        assert_eq!(datum.millisecond, 789);
        let parsed = ClockDatum::parse(&datum.to_bytes()).unwrap();
        assert_eq!(parsed.to_datetime().unwrap(), t);
    }

    #[test]
    fn szl_ack_splits_parts() {
        let mut bs = vec![0xFF, 0x09, 0x00, 0x0C, 0x00, 0x11, 0x00, 0x00, 0x00, 0x02, 0x00, 0x02];
        bs.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        let parsed = ReadSzlAckDatum::parse(&bs).unwrap();
        assert_eq!(parsed.id, 0x0011);
        assert_eq!(parsed.part_length, 2);
        assert_eq!(parsed.part_count, 2);
        assert_eq!(parsed.parts[0].as_ref(), &[0xAA, 0xBB]);
        assert_eq!(parsed.parts[1].as_ref(), &[0xCC, 0xDD]);
        assert_eq!(parsed.to_bytes().as_ref(), bs.as_slice());
    }

    #[test]
    fn szl_ack_rejects_truncated_parts() {
        let bs = [0xFF, 0x09, 0x00, 0x0C, 0x00, 0x11, 0x00, 0x00, 0x00, 0x04, 0x00, 0x02, 0xAA];
        assert!(matches!(
            ReadSzlAckDatum::parse(&bs),
            Err(Error::SzlPartsInvalid)
        ));
    }

    #[test]
    fn up_download_datum_length_prefix() {
        let datum = UpDownloadDatum::new(Bytes::from_static(&[1, 2, 3, 4, 5]));
        let bs = datum.to_bytes();
        assert_eq!(&bs[0..2], &[0x00, 0x05]);
        assert_eq!(&bs[2..4], &[0x00, 0xFB]);
        assert_eq!(UpDownloadDatum::parse(&bs).unwrap(), datum);
    }
}
