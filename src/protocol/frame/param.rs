use super::{
    super::error::{Error, Result},
    item::RequestItem,
    types::{
        BlockSubFunction, BlockType, CpuSubFunction, DestinationFileSystem, FunctionCode,
        FunctionGroup, MessageType, Method, SecuritySubFunction, TimeSubFunction,
    },
    WireDecode, WireEncode,
};
use bytes::{BufMut, Bytes};

pub const STANDARD_PARAMETER_LEN: usize = 1;
pub const READ_WRITE_PARAMETER_MIN_LEN: usize = 2;
pub const SETUP_COM_PARAMETER_LEN: usize = 8;
pub const PLC_STOP_PARAMETER_MIN_LEN: usize = 7;
pub const PLC_CONTROL_PARAMETER_MIN_LEN: usize = 11;
pub const PLC_CONTROL_ACK_PARAMETER_LEN: usize = 2;
pub const DOWNLOAD_PARAMETER_LEN: usize = 18;
pub const START_DOWNLOAD_PARAMETER_LEN: usize = 32;
pub const END_DOWNLOAD_PARAMETER_LEN: usize = 18;
pub const START_UPLOAD_PARAMETER_LEN: usize = 18;
pub const START_UPLOAD_ACK_PARAMETER_LEN: usize = 16;
pub const UPLOAD_PARAMETER_LEN: usize = 8;
pub const UPLOAD_ACK_PARAMETER_LEN: usize = 2;
pub const END_UPLOAD_PARAMETER_LEN: usize = 8;
pub const USERDATA_PARAMETER_LEN: usize = 8;
pub const USERDATA_ACK_PARAMETER_LEN: usize = 12;

/// Parameter section of an S7 message, tagged by the function code in byte 0
/// (userdata parameters carry the fixed 0x000112 prefix instead).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    Standard(StandardParameter),
    SetupCom(SetupComParameter),
    ReadWrite(ReadWriteParameter),
    PlcStop(PlcStopParameter),
    PlcControl(PlcControlParameter),
    PlcControlAck(PlcControlAckParameter),
    StartDownload(StartDownloadParameter),
    Download(DownloadParameter),
    EndDownload(EndDownloadParameter),
    StartUpload(StartUploadParameter),
    StartUploadAck(StartUploadAckParameter),
    Upload(UploadParameter),
    UploadAck(UploadAckParameter),
    EndUpload(EndUploadParameter),
    Userdata(UserdataParameter),
    UserdataAck(UserdataAckParameter),
}

impl Parameter {
    /// Job/AckData function code, when the variant carries one.
    pub fn function_code(&self) -> Option<FunctionCode> {
        match self {
            Parameter::Standard(p) => Some(p.function_code),
            Parameter::SetupCom(_) => Some(FunctionCode::SetupCom),
            Parameter::ReadWrite(p) => Some(p.function_code),
            Parameter::PlcStop(_) => Some(FunctionCode::Stop),
            Parameter::PlcControl(_) | Parameter::PlcControlAck(_) => Some(FunctionCode::Control),
            Parameter::StartDownload(_) => Some(FunctionCode::StartDownload),
            Parameter::Download(_) => Some(FunctionCode::Download),
            Parameter::EndDownload(_) => Some(FunctionCode::EndDownload),
            Parameter::StartUpload(_) | Parameter::StartUploadAck(_) => {
                Some(FunctionCode::StartUpload)
            }
            Parameter::Upload(_) | Parameter::UploadAck(_) => Some(FunctionCode::Upload),
            Parameter::EndUpload(_) => Some(FunctionCode::EndUpload),
            Parameter::Userdata(_) | Parameter::UserdataAck(_) => None,
        }
    }

    /// Parse the parameter section. `input` is exactly
    /// `header.parameter_length` bytes; the variant is selected by the
    /// message type and the function code in byte 0. Userdata parameters are
    /// distinguished request/response by their method byte.
    pub fn parse(input: &[u8], message_type: MessageType) -> Result<Self> {
        if message_type == MessageType::UserData {
            if input.len() < 5 {
                return Err(Error::ModelFromBytes {
                    what: "UserdataParameter",
                    min: 5,
                });
            }
            return match Method::try_from(input[4])? {
                Method::Request => Ok(Parameter::Userdata(UserdataParameter::parse(input)?)),
                Method::Response => Ok(Parameter::UserdataAck(UserdataAckParameter::parse(
                    input,
                )?)),
            };
        }

        if input.is_empty() {
            return Err(Error::ModelFromBytes {
                what: "Parameter",
                min: 1,
            });
        }
        let fc = FunctionCode::try_from(input[0])?;
        let acked = message_type == MessageType::AckData;
        Ok(match fc {
            FunctionCode::CpuService => Parameter::Standard(StandardParameter::new(fc)),
            FunctionCode::Read | FunctionCode::Write => {
                Parameter::ReadWrite(ReadWriteParameter::parse(input)?)
            }
            FunctionCode::SetupCom => Parameter::SetupCom(SetupComParameter::parse(input)?),
            FunctionCode::StartDownload if acked => Parameter::Standard(StandardParameter::new(fc)),
            FunctionCode::StartDownload => {
                Parameter::StartDownload(StartDownloadParameter::parse(input)?)
            }
            FunctionCode::Download if acked => Parameter::Standard(StandardParameter::new(fc)),
            FunctionCode::Download => Parameter::Download(DownloadParameter::parse(input)?),
            FunctionCode::EndDownload if acked => Parameter::Standard(StandardParameter::new(fc)),
            FunctionCode::EndDownload => Parameter::EndDownload(EndDownloadParameter::parse(input)?),
            FunctionCode::StartUpload if acked => {
                Parameter::StartUploadAck(StartUploadAckParameter::parse(input)?)
            }
            FunctionCode::StartUpload => Parameter::StartUpload(StartUploadParameter::parse(input)?),
            FunctionCode::Upload if acked => Parameter::UploadAck(UploadAckParameter::parse(input)?),
            FunctionCode::Upload => Parameter::Upload(UploadParameter::parse(input)?),
            FunctionCode::EndUpload if acked => Parameter::Standard(StandardParameter::new(fc)),
            FunctionCode::EndUpload => Parameter::EndUpload(EndUploadParameter::parse(input)?),
            FunctionCode::Control if message_type == MessageType::Ack => {
                Parameter::PlcControlAck(PlcControlAckParameter::parse(input)?)
            }
            FunctionCode::Control if acked => Parameter::Standard(StandardParameter::new(fc)),
            FunctionCode::Control => Parameter::PlcControl(PlcControlParameter::parse(input)?),
            FunctionCode::Stop if acked => Parameter::Standard(StandardParameter::new(fc)),
            FunctionCode::Stop => Parameter::PlcStop(PlcStopParameter::parse(input)?),
        })
    }
}

impl WireEncode for Parameter {
    fn encoded_len(&self) -> usize {
        match self {
            Parameter::Standard(p) => p.encoded_len(),
            Parameter::SetupCom(p) => p.encoded_len(),
            Parameter::ReadWrite(p) => p.encoded_len(),
            Parameter::PlcStop(p) => p.encoded_len(),
            Parameter::PlcControl(p) => p.encoded_len(),
            Parameter::PlcControlAck(p) => p.encoded_len(),
            Parameter::StartDownload(p) => p.encoded_len(),
            Parameter::Download(p) => p.encoded_len(),
            Parameter::EndDownload(p) => p.encoded_len(),
            Parameter::StartUpload(p) => p.encoded_len(),
            Parameter::StartUploadAck(p) => p.encoded_len(),
            Parameter::Upload(p) => p.encoded_len(),
            Parameter::UploadAck(p) => p.encoded_len(),
            Parameter::EndUpload(p) => p.encoded_len(),
            Parameter::Userdata(p) => p.encoded_len(),
            Parameter::UserdataAck(p) => p.encoded_len(),
        }
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        match self {
            Parameter::Standard(p) => p.encode_to(dst),
            Parameter::SetupCom(p) => p.encode_to(dst),
            Parameter::ReadWrite(p) => p.encode_to(dst),
            Parameter::PlcStop(p) => p.encode_to(dst),
            Parameter::PlcControl(p) => p.encode_to(dst),
            Parameter::PlcControlAck(p) => p.encode_to(dst),
            Parameter::StartDownload(p) => p.encode_to(dst),
            Parameter::Download(p) => p.encode_to(dst),
            Parameter::EndDownload(p) => p.encode_to(dst),
            Parameter::StartUpload(p) => p.encode_to(dst),
            Parameter::StartUploadAck(p) => p.encode_to(dst),
            Parameter::Upload(p) => p.encode_to(dst),
            Parameter::UploadAck(p) => p.encode_to(dst),
            Parameter::EndUpload(p) => p.encode_to(dst),
            Parameter::Userdata(p) => p.encode_to(dst),
            Parameter::UserdataAck(p) => p.encode_to(dst),
        }
    }
}

/// One-byte parameter used by plain acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardParameter {
    pub function_code: FunctionCode,
}

impl StandardParameter {
    pub fn new(function_code: FunctionCode) -> Self {
        StandardParameter { function_code }
    }
}

impl WireEncode for StandardParameter {
    fn encoded_len(&self) -> usize {
        STANDARD_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.function_code as u8);
    }
}

/// PDU negotiation parameter, function code 0xF0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupComParameter {
    pub reserved: u8,
    /// Ack queue size towards the caller, big-endian
    pub max_amq_caller: u16,
    /// Ack queue size towards the callee, big-endian
    pub max_amq_callee: u16,
    /// Proposed (request) or granted (ack) PDU length
    pub pdu_length: u16,
}

impl SetupComParameter {
    pub fn new(pdu_length: u16) -> Self {
        SetupComParameter {
            reserved: 0x00,
            max_amq_caller: 1,
            max_amq_callee: 1,
            pdu_length,
        }
    }
}

impl WireEncode for SetupComParameter {
    fn encoded_len(&self) -> usize {
        SETUP_COM_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::SetupCom as u8);
        dst.put_u8(self.reserved);
        dst.put_u16(self.max_amq_caller);
        dst.put_u16(self.max_amq_callee);
        dst.put_u16(self.pdu_length);
    }
}

impl WireDecode for SetupComParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < SETUP_COM_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "SetupComParameter",
                min: SETUP_COM_PARAMETER_LEN,
            });
        }
        Ok(SetupComParameter {
            reserved: input[1],
            max_amq_caller: u16::from_be_bytes([input[2], input[3]]),
            max_amq_callee: u16::from_be_bytes([input[4], input[5]]),
            pdu_length: u16::from_be_bytes([input[6], input[7]]),
        })
    }
}

/// Read (0x04) / write (0x05) parameter: item count followed by the items.
/// The AckData form carries the count alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWriteParameter {
    pub function_code: FunctionCode,
    pub item_count: u8,
    pub items: Vec<RequestItem>,
}

impl ReadWriteParameter {
    pub fn read(items: Vec<RequestItem>) -> Self {
        ReadWriteParameter {
            function_code: FunctionCode::Read,
            item_count: items.len() as u8,
            items,
        }
    }

    pub fn write(items: Vec<RequestItem>) -> Self {
        ReadWriteParameter {
            function_code: FunctionCode::Write,
            item_count: items.len() as u8,
            items,
        }
    }

    pub fn ack(function_code: FunctionCode, item_count: u8) -> Self {
        ReadWriteParameter {
            function_code,
            item_count,
            items: Vec::new(),
        }
    }
}

impl WireEncode for ReadWriteParameter {
    fn encoded_len(&self) -> usize {
        READ_WRITE_PARAMETER_MIN_LEN
            + self
                .items
                .iter()
                .map(WireEncode::encoded_len)
                .sum::<usize>()
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.function_code as u8);
        dst.put_u8(self.item_count);
        for item in &self.items {
            item.encode_to(dst);
        }
    }
}

impl WireDecode for ReadWriteParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < READ_WRITE_PARAMETER_MIN_LEN {
            return Err(Error::ModelFromBytes {
                what: "ReadWriteParameter",
                min: READ_WRITE_PARAMETER_MIN_LEN,
            });
        }
        let function_code = FunctionCode::try_from(input[0])?;
        let item_count = input[1];
        let mut items = Vec::with_capacity(item_count as usize);
        let mut offset = 2;
        // The parameter of an AckData carries the count only
        if item_count > 0 && input.len() > 2 {
            for _ in 0..item_count {
                let item = RequestItem::parse_at(input, offset)?;
                offset += item.encoded_len();
                items.push(item);
            }
        }
        Ok(ReadWriteParameter {
            function_code,
            item_count,
            items,
        })
    }
}

/// PLC stop parameter (0x29), PI service `P_PROGRAM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlcStopParameter {
    pub unknown_bytes: [u8; 5],
    pub pi_service: String,
}

impl PlcStopParameter {
    pub fn new() -> Self {
        PlcStopParameter {
            unknown_bytes: [0x00; 5],
            pi_service: "P_PROGRAM".to_string(),
        }
    }
}

impl Default for PlcStopParameter {
    fn default() -> Self {
        Self::new()
    }
}

impl WireEncode for PlcStopParameter {
    fn encoded_len(&self) -> usize {
        PLC_STOP_PARAMETER_MIN_LEN + self.pi_service.len()
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::Stop as u8);
        dst.put_slice(&self.unknown_bytes);
        dst.put_u8(self.pi_service.len() as u8);
        dst.put_slice(self.pi_service.as_bytes());
    }
}

impl WireDecode for PlcStopParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < PLC_STOP_PARAMETER_MIN_LEN {
            return Err(Error::ModelFromBytes {
                what: "PlcStopParameter",
                min: PLC_STOP_PARAMETER_MIN_LEN,
            });
        }
        let mut unknown_bytes = [0u8; 5];
        unknown_bytes.copy_from_slice(&input[1..6]);
        let length_part = input[6] as usize;
        let pi_service = if length_part == 0 {
            String::new()
        } else {
            if input.len() < 7 + length_part {
                return Err(Error::ModelFromBytes {
                    what: "PlcStopParameter",
                    min: 7 + length_part,
                });
            }
            String::from_utf8_lossy(&input[7..7 + length_part]).into_owned()
        };
        Ok(PlcStopParameter {
            unknown_bytes,
            pi_service,
        })
    }
}

/// PLC control parameter (0x28): parameter block plus PI service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlcControlParameter {
    pub unknown_bytes: [u8; 7],
    pub parameter_block: Bytes,
    pub pi_service: String,
}

const PLC_CONTROL_UNKNOWN: [u8; 7] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFD];

impl PlcControlParameter {
    fn with_block(parameter_block: Bytes, pi_service: &str) -> Self {
        PlcControlParameter {
            unknown_bytes: PLC_CONTROL_UNKNOWN,
            parameter_block,
            pi_service: pi_service.to_string(),
        }
    }

    pub fn hot_restart() -> Self {
        Self::with_block(Bytes::new(), "P_PROGRAM")
    }

    pub fn cold_restart() -> Self {
        Self::with_block(Bytes::from_static(b"C "), "P_PROGRAM")
    }

    pub fn copy_ram_to_rom() -> Self {
        Self::with_block(Bytes::new(), "_GARB")
    }

    pub fn compress() -> Self {
        Self::with_block(Bytes::from_static(b"EP"), "_MODU")
    }

    /// Insert the named block file into the PLC file system; the parameter
    /// block is a count byte followed by `{block type}{5-digit number}{fs}`.
    pub fn insert(
        block_type: BlockType,
        block_number: u32,
        file_system: DestinationFileSystem,
    ) -> Self {
        let mut block = Vec::with_capacity(9);
        block.push(0x01);
        block.extend_from_slice(&(block_type as u16).to_be_bytes());
        block.extend_from_slice(format!("{block_number:05}").as_bytes());
        block.push(file_system as u8);
        Self::with_block(Bytes::from(block), "_INSE")
    }
}

impl WireEncode for PlcControlParameter {
    fn encoded_len(&self) -> usize {
        PLC_CONTROL_PARAMETER_MIN_LEN + self.parameter_block.len() + self.pi_service.len()
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::Control as u8);
        dst.put_slice(&self.unknown_bytes);
        dst.put_u16(self.parameter_block.len() as u16);
        dst.put_slice(&self.parameter_block);
        dst.put_u8(self.pi_service.len() as u8);
        dst.put_slice(self.pi_service.as_bytes());
    }
}

impl WireDecode for PlcControlParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < PLC_CONTROL_PARAMETER_MIN_LEN {
            return Err(Error::ModelFromBytes {
                what: "PlcControlParameter",
                min: PLC_CONTROL_PARAMETER_MIN_LEN,
            });
        }
        let mut unknown_bytes = [0u8; 7];
        unknown_bytes.copy_from_slice(&input[1..8]);
        let block_len = u16::from_be_bytes([input[8], input[9]]) as usize;
        if input.len() < 11 + block_len {
            return Err(Error::ModelFromBytes {
                what: "PlcControlParameter",
                min: 11 + block_len,
            });
        }
        let parameter_block = Bytes::copy_from_slice(&input[10..10 + block_len]);
        let length_part = input[10 + block_len] as usize;
        let pi_service = if length_part == 0 {
            String::new()
        } else {
            let start = 11 + block_len;
            if input.len() < start + length_part {
                return Err(Error::ModelFromBytes {
                    what: "PlcControlParameter",
                    min: start + length_part,
                });
            }
            String::from_utf8_lossy(&input[start..start + length_part]).into_owned()
        };
        Ok(PlcControlParameter {
            unknown_bytes,
            parameter_block,
            pi_service,
        })
    }
}

/// Two-byte Ack parameter of a PLC control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlcControlAckParameter {
    pub unknown_byte: u8,
}

impl WireEncode for PlcControlAckParameter {
    fn encoded_len(&self) -> usize {
        PLC_CONTROL_ACK_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::Control as u8);
        dst.put_u8(self.unknown_byte);
    }
}

impl WireDecode for PlcControlAckParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < PLC_CONTROL_ACK_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "PlcControlAckParameter",
                min: PLC_CONTROL_ACK_PARAMETER_LEN,
            });
        }
        Ok(PlcControlAckParameter {
            unknown_byte: input[1],
        })
    }
}

/// Shared flags byte of the up/download family: more-data-following in bit 0,
/// error-status in bit 1.
fn flags_byte(more_data_following: bool, error_status: bool) -> u8 {
    (more_data_following as u8) | ((error_status as u8) << 1)
}

fn put_block_file<B: BufMut>(
    dst: &mut B,
    block_type: BlockType,
    block_number: u32,
    file_system: DestinationFileSystem,
) {
    dst.put_u8(9); // file name length
    dst.put_u8(b'_'); // file id
    dst.put_u16(block_type as u16);
    dst.put_slice(format!("{block_number:05}").as_bytes());
    dst.put_u8(file_system as u8);
}

fn parse_block_file(input: &[u8]) -> Result<(u8, u8, BlockType, u32, DestinationFileSystem)> {
    let block_type = BlockType::try_from(u16::from_be_bytes([input[2], input[3]]))?;
    let number = ascii_number(&input[4..9])?;
    let file_system = DestinationFileSystem::try_from(input[9])?;
    Ok((input[0], input[1], block_type, number, file_system))
}

fn ascii_number(digits: &[u8]) -> Result<u32> {
    let s = std::str::from_utf8(digits).map_err(|_| Error::ResponseInvalid)?;
    s.trim().parse::<u32>().map_err(|_| Error::ResponseInvalid)
}

/// Start download request (0xFA) carrying load memory and MC7 lengths as
/// 6-digit ASCII.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartDownloadParameter {
    pub more_data_following: bool,
    pub error_status: bool,
    pub error_code: [u8; 2],
    pub id: u32,
    pub file_name_length: u8,
    pub file_id: u8,
    pub block_type: BlockType,
    pub block_number: u32,
    pub file_system: DestinationFileSystem,
    pub part2_length: u8,
    pub unknown_char: u8,
    pub load_memory_length: u32,
    pub mc7_code_length: u32,
}

impl StartDownloadParameter {
    pub fn new(
        block_type: BlockType,
        file_system: DestinationFileSystem,
        block_number: u32,
        load_memory_length: u32,
        mc7_code_length: u32,
    ) -> Self {
        StartDownloadParameter {
            more_data_following: false,
            error_status: false,
            error_code: [0x01, 0x00],
            id: 0,
            file_name_length: 9,
            file_id: b'_',
            block_type,
            block_number,
            file_system,
            part2_length: 13,
            unknown_char: b'1',
            load_memory_length,
            mc7_code_length,
        }
    }
}

impl WireEncode for StartDownloadParameter {
    fn encoded_len(&self) -> usize {
        START_DOWNLOAD_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::StartDownload as u8);
        dst.put_u8(flags_byte(self.more_data_following, self.error_status));
        dst.put_slice(&self.error_code);
        dst.put_u32(self.id);
        put_block_file(dst, self.block_type, self.block_number, self.file_system);
        dst.put_u8(self.part2_length);
        dst.put_u8(self.unknown_char);
        dst.put_slice(format!("{:06}", self.load_memory_length).as_bytes());
        dst.put_slice(format!("{:06}", self.mc7_code_length).as_bytes());
    }
}

impl WireDecode for StartDownloadParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < START_DOWNLOAD_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "StartDownloadParameter",
                min: START_DOWNLOAD_PARAMETER_LEN,
            });
        }
        let (file_name_length, file_id, block_type, block_number, file_system) =
            parse_block_file(&input[8..18])?;
        Ok(StartDownloadParameter {
            more_data_following: input[1] & 0x01 != 0,
            error_status: input[1] & 0x02 != 0,
            error_code: [input[2], input[3]],
            id: u32::from_be_bytes([input[4], input[5], input[6], input[7]]),
            file_name_length,
            file_id,
            block_type,
            block_number,
            file_system,
            part2_length: input[18],
            unknown_char: input[19],
            load_memory_length: ascii_number(&input[20..26])?,
            mc7_code_length: ascii_number(&input[26..32])?,
        })
    }
}

/// Download request (0xFB) identifying the block file being transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadParameter {
    pub more_data_following: bool,
    pub error_status: bool,
    pub error_code: [u8; 2],
    pub id: u32,
    pub file_name_length: u8,
    pub file_id: u8,
    pub block_type: BlockType,
    pub block_number: u32,
    pub file_system: DestinationFileSystem,
}

impl DownloadParameter {
    pub fn new(
        block_type: BlockType,
        file_system: DestinationFileSystem,
        block_number: u32,
        more_data_following: bool,
    ) -> Self {
        DownloadParameter {
            more_data_following,
            error_status: false,
            error_code: [0x01, 0x00],
            id: 0,
            file_name_length: 9,
            file_id: b'_',
            block_type,
            block_number,
            file_system,
        }
    }
}

impl WireEncode for DownloadParameter {
    fn encoded_len(&self) -> usize {
        DOWNLOAD_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::Download as u8);
        dst.put_u8(flags_byte(self.more_data_following, self.error_status));
        dst.put_slice(&self.error_code);
        dst.put_u32(self.id);
        put_block_file(dst, self.block_type, self.block_number, self.file_system);
    }
}

impl WireDecode for DownloadParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < DOWNLOAD_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "DownloadParameter",
                min: DOWNLOAD_PARAMETER_LEN,
            });
        }
        let (file_name_length, file_id, block_type, block_number, file_system) =
            parse_block_file(&input[8..18])?;
        Ok(DownloadParameter {
            more_data_following: input[1] & 0x01 != 0,
            error_status: input[1] & 0x02 != 0,
            error_code: [input[2], input[3]],
            id: u32::from_be_bytes([input[4], input[5], input[6], input[7]]),
            file_name_length,
            file_id,
            block_type,
            block_number,
            file_system,
        })
    }
}

/// End download request (0xFC); same layout as the download parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndDownloadParameter {
    pub more_data_following: bool,
    pub error_status: bool,
    pub error_code: [u8; 2],
    pub id: u32,
    pub file_name_length: u8,
    pub file_id: u8,
    pub block_type: BlockType,
    pub block_number: u32,
    pub file_system: DestinationFileSystem,
}

impl EndDownloadParameter {
    pub fn new(
        block_type: BlockType,
        file_system: DestinationFileSystem,
        block_number: u32,
    ) -> Self {
        EndDownloadParameter {
            more_data_following: false,
            error_status: false,
            error_code: [0x01, 0x00],
            id: 0,
            file_name_length: 9,
            file_id: b'_',
            block_type,
            block_number,
            file_system,
        }
    }
}

impl WireEncode for EndDownloadParameter {
    fn encoded_len(&self) -> usize {
        END_DOWNLOAD_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::EndDownload as u8);
        dst.put_u8(flags_byte(self.more_data_following, self.error_status));
        dst.put_slice(&self.error_code);
        dst.put_u32(self.id);
        put_block_file(dst, self.block_type, self.block_number, self.file_system);
    }
}

impl WireDecode for EndDownloadParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < END_DOWNLOAD_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "EndDownloadParameter",
                min: END_DOWNLOAD_PARAMETER_LEN,
            });
        }
        let (file_name_length, file_id, block_type, block_number, file_system) =
            parse_block_file(&input[8..18])?;
        Ok(EndDownloadParameter {
            more_data_following: input[1] & 0x01 != 0,
            error_status: input[1] & 0x02 != 0,
            error_code: [input[2], input[3]],
            id: u32::from_be_bytes([input[4], input[5], input[6], input[7]]),
            file_name_length,
            file_id,
            block_type,
            block_number,
            file_system,
        })
    }
}

/// Start upload request (0x1D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartUploadParameter {
    pub more_data_following: bool,
    pub error_status: bool,
    pub error_code: [u8; 2],
    pub id: u32,
    pub file_name_length: u8,
    pub file_id: u8,
    pub block_type: BlockType,
    pub block_number: u32,
    pub file_system: DestinationFileSystem,
}

impl StartUploadParameter {
    pub fn new(
        block_type: BlockType,
        file_system: DestinationFileSystem,
        block_number: u32,
    ) -> Self {
        StartUploadParameter {
            more_data_following: false,
            error_status: false,
            error_code: [0x01, 0x00],
            id: 0,
            file_name_length: 9,
            file_id: b'_',
            block_type,
            block_number,
            file_system,
        }
    }
}

impl WireEncode for StartUploadParameter {
    fn encoded_len(&self) -> usize {
        START_UPLOAD_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::StartUpload as u8);
        dst.put_u8(flags_byte(self.more_data_following, self.error_status));
        dst.put_slice(&self.error_code);
        dst.put_u32(self.id);
        put_block_file(dst, self.block_type, self.block_number, self.file_system);
    }
}

impl WireDecode for StartUploadParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < START_UPLOAD_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "StartUploadParameter",
                min: START_UPLOAD_PARAMETER_LEN,
            });
        }
        let (file_name_length, file_id, block_type, block_number, file_system) =
            parse_block_file(&input[8..18])?;
        Ok(StartUploadParameter {
            more_data_following: input[1] & 0x01 != 0,
            error_status: input[1] & 0x02 != 0,
            error_code: [input[2], input[3]],
            id: u32::from_be_bytes([input[4], input[5], input[6], input[7]]),
            file_name_length,
            file_id,
            block_type,
            block_number,
            file_system,
        })
    }
}

/// Ack of a start upload: transfer id plus the full block length as 7-digit
/// ASCII.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartUploadAckParameter {
    pub more_data_following: bool,
    pub error_status: bool,
    pub error_code: [u8; 2],
    pub id: u32,
    pub block_length_string_length: u8,
    pub block_length: u32,
}

impl WireEncode for StartUploadAckParameter {
    fn encoded_len(&self) -> usize {
        START_UPLOAD_ACK_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::StartUpload as u8);
        dst.put_u8(flags_byte(self.more_data_following, self.error_status));
        dst.put_slice(&self.error_code);
        dst.put_u32(self.id);
        dst.put_u8(self.block_length_string_length);
        dst.put_slice(format!("{:07}", self.block_length).as_bytes());
    }
}

impl WireDecode for StartUploadAckParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < START_UPLOAD_ACK_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "StartUploadAckParameter",
                min: START_UPLOAD_ACK_PARAMETER_LEN,
            });
        }
        Ok(StartUploadAckParameter {
            more_data_following: input[1] & 0x01 != 0,
            error_status: input[1] & 0x02 != 0,
            error_code: [input[2], input[3]],
            id: u32::from_be_bytes([input[4], input[5], input[6], input[7]]),
            block_length_string_length: input[8],
            block_length: ascii_number(&input[9..16])?,
        })
    }
}

/// Upload request (0x1E) continuing a transfer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadParameter {
    pub more_data_following: bool,
    pub error_status: bool,
    pub error_code: [u8; 2],
    pub id: u32,
}

impl UploadParameter {
    pub fn new(id: u32) -> Self {
        UploadParameter {
            more_data_following: false,
            error_status: false,
            error_code: [0x00, 0x00],
            id,
        }
    }
}

impl WireEncode for UploadParameter {
    fn encoded_len(&self) -> usize {
        UPLOAD_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::Upload as u8);
        dst.put_u8(flags_byte(self.more_data_following, self.error_status));
        dst.put_slice(&self.error_code);
        dst.put_u32(self.id);
    }
}

impl WireDecode for UploadParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < UPLOAD_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "UploadParameter",
                min: UPLOAD_PARAMETER_LEN,
            });
        }
        Ok(UploadParameter {
            more_data_following: input[1] & 0x01 != 0,
            error_status: input[1] & 0x02 != 0,
            error_code: [input[2], input[3]],
            id: u32::from_be_bytes([input[4], input[5], input[6], input[7]]),
        })
    }
}

/// Two-byte upload ack carrying the continuation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadAckParameter {
    pub more_data_following: bool,
    pub error_status: bool,
}

impl WireEncode for UploadAckParameter {
    fn encoded_len(&self) -> usize {
        UPLOAD_ACK_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::Upload as u8);
        dst.put_u8(flags_byte(self.more_data_following, self.error_status));
    }
}

impl WireDecode for UploadAckParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < UPLOAD_ACK_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "UploadAckParameter",
                min: UPLOAD_ACK_PARAMETER_LEN,
            });
        }
        Ok(UploadAckParameter {
            more_data_following: input[1] & 0x01 != 0,
            error_status: input[1] & 0x02 != 0,
        })
    }
}

/// End upload request (0x1F) releasing the transfer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndUploadParameter {
    pub more_data_following: bool,
    pub error_status: bool,
    pub error_code: [u8; 2],
    pub id: u32,
}

impl EndUploadParameter {
    pub fn new(id: u32) -> Self {
        EndUploadParameter {
            more_data_following: false,
            error_status: false,
            error_code: [0x00, 0x00],
            id,
        }
    }
}

impl WireEncode for EndUploadParameter {
    fn encoded_len(&self) -> usize {
        END_UPLOAD_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(FunctionCode::EndUpload as u8);
        dst.put_u8(flags_byte(self.more_data_following, self.error_status));
        dst.put_slice(&self.error_code);
        dst.put_u32(self.id);
    }
}

impl WireDecode for EndUploadParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < END_UPLOAD_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "EndUploadParameter",
                min: END_UPLOAD_PARAMETER_LEN,
            });
        }
        Ok(EndUploadParameter {
            more_data_following: input[1] & 0x01 != 0,
            error_status: input[1] & 0x02 != 0,
            error_code: [input[2], input[3]],
            id: u32::from_be_bytes([input[4], input[5], input[6], input[7]]),
        })
    }
}

/// Userdata request parameter: fixed 0x000112 prefix, method 0x11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserdataParameter {
    /// Length of the parameter after this field, 4 for requests
    pub parameter_length: u8,
    pub method: Method,
    pub function_group: FunctionGroup,
    pub sub_function: u8,
    pub sequence: u8,
}

const USERDATA_PREFIX: [u8; 3] = [0x00, 0x01, 0x12];

impl UserdataParameter {
    fn request(function_group: FunctionGroup, sub_function: u8) -> Self {
        UserdataParameter {
            parameter_length: 4,
            method: Method::Request,
            function_group,
            sub_function,
            sequence: 0,
        }
    }

    pub fn cpu(function: CpuSubFunction) -> Self {
        Self::request(FunctionGroup::RequestCpuFunction, function as u8)
    }

    pub fn block(function: BlockSubFunction) -> Self {
        Self::request(FunctionGroup::RequestBlockFunction, function as u8)
    }

    pub fn clock(function: TimeSubFunction) -> Self {
        Self::request(FunctionGroup::RequestTimeFunction, function as u8)
    }

    pub fn security(function: SecuritySubFunction) -> Self {
        Self::request(FunctionGroup::RequestSecurity, function as u8)
    }
}

impl WireEncode for UserdataParameter {
    fn encoded_len(&self) -> usize {
        USERDATA_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(&USERDATA_PREFIX);
        dst.put_u8(self.parameter_length);
        dst.put_u8(self.method as u8);
        dst.put_u8(self.function_group as u8);
        dst.put_u8(self.sub_function);
        dst.put_u8(self.sequence);
    }
}

impl WireDecode for UserdataParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < USERDATA_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "UserdataParameter",
                min: USERDATA_PARAMETER_LEN,
            });
        }
        Ok(UserdataParameter {
            parameter_length: input[3],
            method: Method::try_from(input[4])?,
            function_group: FunctionGroup::try_from(input[5])?,
            sub_function: input[6],
            sequence: input[7],
        })
    }
}

/// Userdata response parameter, method 0x12: adds a TPDU number, a
/// last-data-unit flag and the error class/code pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserdataAckParameter {
    pub parameter_length: u8,
    pub method: Method,
    pub function_group: FunctionGroup,
    pub sub_function: u8,
    pub sequence: u8,
    pub tpdu_number: u8,
    pub last_data_unit: u8,
    pub error_class: u8,
    pub error_code: u8,
}

impl UserdataAckParameter {
    pub fn combined_error_code(&self) -> u16 {
        ((self.error_class as u16) << 8) | self.error_code as u16
    }
}

impl WireEncode for UserdataAckParameter {
    fn encoded_len(&self) -> usize {
        USERDATA_ACK_PARAMETER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_slice(&USERDATA_PREFIX);
        dst.put_u8(self.parameter_length);
        dst.put_u8(self.method as u8);
        dst.put_u8(self.function_group as u8);
        dst.put_u8(self.sub_function);
        dst.put_u8(self.sequence);
        dst.put_u8(self.tpdu_number);
        dst.put_u8(self.last_data_unit);
        dst.put_u8(self.error_class);
        dst.put_u8(self.error_code);
    }
}

impl WireDecode for UserdataAckParameter {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < USERDATA_ACK_PARAMETER_LEN {
            return Err(Error::ModelFromBytes {
                what: "UserdataAckParameter",
                min: USERDATA_ACK_PARAMETER_LEN,
            });
        }
        Ok(UserdataAckParameter {
            parameter_length: input[3],
            method: Method::try_from(input[4])?,
            function_group: FunctionGroup::try_from(input[5])?,
            sub_function: input[6],
            sequence: input[7],
            tpdu_number: input[8] & 0x7F,
            last_data_unit: input[9],
            error_class: input[10],
            error_code: input[11],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::{
        item::StandardItem,
        types::{Area, VariableType},
    };
    use super::*;

    #[test]
    fn setup_com_round_trip() {
        let p = SetupComParameter::new(480);
        let bs = p.to_bytes();
        assert_eq!(bs.as_ref(), &[0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, 0x01, 0xE0]);
        match Parameter::parse(&bs, MessageType::AckData).unwrap() {
            Parameter::SetupCom(parsed) => assert_eq!(parsed, p),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn read_parameter_round_trip() {
        let item = StandardItem::new(Area::DataBlocks, 1, VariableType::Bit, 260, 0, 1);
        let p = ReadWriteParameter::read(vec![RequestItem::Standard(item)]);
        let bs = p.to_bytes();
        assert_eq!(bs[0], 0x04);
        assert_eq!(bs[1], 1);
        match Parameter::parse(&bs, MessageType::Job).unwrap() {
            Parameter::ReadWrite(parsed) => assert_eq!(parsed, p),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn plc_control_variants_encode_pi_service() {
        let p = PlcControlParameter::compress();
        let bs = p.to_bytes();
        assert_eq!(bs[0], 0x28);
        assert_eq!(&bs[bs.len() - 5..], b"_MODU");
        match Parameter::parse(&bs, MessageType::Job).unwrap() {
            Parameter::PlcControl(parsed) => assert_eq!(parsed, p),
            other => panic!("unexpected {other:?}"),
        }

        let hot = PlcControlParameter::hot_restart().to_bytes();
        assert_eq!(hot[7], 0xFD);
        assert_eq!(&hot[8..10], &[0x00, 0x00]); // empty parameter block
    }

    #[test]
    fn insert_parameter_block_layout() {
        let p = PlcControlParameter::insert(BlockType::Db, 5, DestinationFileSystem::P);
        assert_eq!(p.parameter_block.len(), 9);
        assert_eq!(&p.parameter_block[1..3], &[0x30, 0x41]);
        assert_eq!(&p.parameter_block[3..8], b"00005");
        assert_eq!(p.parameter_block[8], 0x50);
    }

    #[test]
    fn upload_family_round_trip() {
        let start = StartUploadParameter::new(BlockType::Db, DestinationFileSystem::A, 1);
        let bs = start.to_bytes();
        assert_eq!(bs.len(), START_UPLOAD_PARAMETER_LEN);
        match Parameter::parse(&bs, MessageType::Job).unwrap() {
            Parameter::StartUpload(parsed) => assert_eq!(parsed, start),
            other => panic!("unexpected {other:?}"),
        }

        let ack = StartUploadAckParameter {
            more_data_following: false,
            error_status: false,
            error_code: [0x00, 0x00],
            id: 7,
            block_length_string_length: 7,
            block_length: 1234,
        };
        let bs = ack.to_bytes();
        match Parameter::parse(&bs, MessageType::AckData).unwrap() {
            Parameter::StartUploadAck(parsed) => assert_eq!(parsed, ack),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn start_download_round_trip() {
        let p = StartDownloadParameter::new(BlockType::Db, DestinationFileSystem::P, 42, 300, 264);
        let bs = p.to_bytes();
        assert_eq!(bs.len(), START_DOWNLOAD_PARAMETER_LEN);
        assert_eq!(&bs[20..26], b"000300");
        assert_eq!(&bs[26..32], b"000264");
        match Parameter::parse(&bs, MessageType::Job).unwrap() {
            Parameter::StartDownload(parsed) => assert_eq!(parsed, p),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn userdata_request_and_ack_dispatch_on_method() {
        let req = UserdataParameter::cpu(CpuSubFunction::ReadSzl);
        let bs = req.to_bytes();
        assert_eq!(bs.as_ref(), &[0x00, 0x01, 0x12, 0x04, 0x11, 0x44, 0x01, 0x00]);
        match Parameter::parse(&bs, MessageType::UserData).unwrap() {
            Parameter::Userdata(parsed) => assert_eq!(parsed, req),
            other => panic!("unexpected {other:?}"),
        }

        let ack_bytes = [
            0x00, 0x01, 0x12, 0x08, 0x12, 0x84, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00,
        ];
        match Parameter::parse(&ack_bytes, MessageType::UserData).unwrap() {
            Parameter::UserdataAck(parsed) => {
                assert_eq!(parsed.function_group, FunctionGroup::ResponseCpuFunction);
                assert_eq!(parsed.combined_error_code(), 0x0000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
