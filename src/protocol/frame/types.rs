use super::super::error::Error;

/// General message kind of an S7 header (sometimes called the ROSCTR type).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Master orders the slave to do work; read or write is decided by the parameter
    Job = 0x01,
    /// Acknowledgement without data field
    Ack = 0x02,
    /// Slave answer to a Job
    AckData = 0x03,
    /// Protocol extension for programming, SZL reads, security and time services
    UserData = 0x07,
}

impl TryFrom<u8> for MessageType {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0x01 => Ok(MessageType::Job),
            0x02 => Ok(MessageType::Ack),
            0x03 => Ok(MessageType::AckData),
            0x07 => Ok(MessageType::UserData),
            other => Err(Error::TypeNotResolved {
                what: "message type",
                actual: other,
            }),
        }
    }
}

/// Job/AckData function codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    CpuService = 0x00,
    Read = 0x04,
    Write = 0x05,
    StartUpload = 0x1D,
    Upload = 0x1E,
    EndUpload = 0x1F,
    Control = 0x28,
    Stop = 0x29,
    SetupCom = 0xF0,
    StartDownload = 0xFA,
    Download = 0xFB,
    EndDownload = 0xFC,
}

impl TryFrom<u8> for FunctionCode {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use FunctionCode::*;
        Ok(match v {
            0x00 => CpuService,
            0x04 => Read,
            0x05 => Write,
            0x1D => StartUpload,
            0x1E => Upload,
            0x1F => EndUpload,
            0x28 => Control,
            0x29 => Stop,
            0xF0 => SetupCom,
            0xFA => StartDownload,
            0xFB => Download,
            0xFC => EndDownload,
            other => {
                return Err(Error::TypeNotResolved {
                    what: "function code",
                    actual: other,
                })
            }
        })
    }
}

/// COTP TPDU types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CotpType {
    ConnectRequest = 0xE0,
    ConnectConfirm = 0xD0,
    DisconnectRequest = 0x80,
    DisconnectConfirm = 0xC0,
    Reject = 0x50,
    Data = 0xF0,
}

impl TryFrom<u8> for CotpType {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0xE0 => Ok(CotpType::ConnectRequest),
            0xD0 => Ok(CotpType::ConnectConfirm),
            0x80 => Ok(CotpType::DisconnectRequest),
            0xC0 => Ok(CotpType::DisconnectConfirm),
            0x50 => Ok(CotpType::Reject),
            0xF0 => Ok(CotpType::Data),
            other => Err(Error::TypeNotResolved {
                what: "pdu type",
                actual: other,
            }),
        }
    }
}

/// Addressing mode of a request item
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxId {
    /// S7-Any pointer-like addressing (DB1.DBX10.2)
    Any = 0x10,
    /// R_ID for PBC
    PbcRId = 0x13,
    /// Alarm lock/free dataset
    AlarmLockFree = 0x15,
    /// Alarm indication dataset
    AlarmInd = 0x16,
    /// Alarm acknowledge message dataset
    AlarmAck = 0x19,
    /// Alarm query request dataset
    AlarmQueryReq = 0x1A,
    /// Notify indication dataset
    NotifyInd = 0x1C,
    /// Sinumerik NCK HMI access
    Nck = 0x82,
    /// DRIVEESANY, seen on Drive ES Starter with routing over S7
    DriveEsAny = 0xA2,
    /// Kind of DB block read, seen only on an S7-400
    DbRead = 0xB0,
    /// Symbolic byte-address mode of the S7-1200
    Sym1200 = 0xB2,
}

impl TryFrom<u8> for SyntaxId {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use SyntaxId::*;
        Ok(match v {
            0x10 => Any,
            0x13 => PbcRId,
            0x15 => AlarmLockFree,
            0x16 => AlarmInd,
            0x19 => AlarmAck,
            0x1A => AlarmQueryReq,
            0x1C => NotifyInd,
            0x82 => Nck,
            0xA2 => DriveEsAny,
            0xB0 => DbRead,
            0xB2 => Sym1200,
            other => {
                return Err(Error::TypeNotResolved {
                    what: "syntax id",
                    actual: other,
                })
            }
        })
    }
}

/// S7 memory areas
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    /// System info of the 200 family
    SystemInfo = 0x03,
    /// System flags of the 200 family
    SystemFlags = 0x05,
    /// Analog inputs of the 200 family
    AnalogInputs = 0x06,
    /// Analog outputs of the 200 family
    AnalogOutputs = 0x07,
    /// Direct peripheral access
    DirectPeripheral = 0x80,
    /// Inputs (I)
    Inputs = 0x81,
    /// Outputs (Q)
    Outputs = 0x82,
    /// Internal flags / merkers (M)
    Flags = 0x83,
    /// Data blocks (DB)
    DataBlocks = 0x84,
    /// Instance data blocks (DI)
    InstanceDataBlocks = 0x85,
    /// Local data (L)
    LocalData = 0x86,
    /// V memory (200 family global variables)
    VMemory = 0x87,
    /// S7 counters (C)
    Counters = 0x1C,
    /// S7 timers (T)
    Timers = 0x1D,
    /// IEC counters of the 200 family
    IecCounters = 0x1E,
    /// IEC timers of the 200 family
    IecTimers = 0x1F,
}

impl TryFrom<u8> for Area {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use Area::*;
        Ok(match v {
            0x03 => SystemInfo,
            0x05 => SystemFlags,
            0x06 => AnalogInputs,
            0x07 => AnalogOutputs,
            0x80 => DirectPeripheral,
            0x81 => Inputs,
            0x82 => Outputs,
            0x83 => Flags,
            0x84 => DataBlocks,
            0x85 => InstanceDataBlocks,
            0x86 => LocalData,
            0x87 => VMemory,
            0x1C => Counters,
            0x1D => Timers,
            0x1E => IecCounters,
            0x1F => IecTimers,
            other => {
                return Err(Error::TypeNotResolved {
                    what: "area",
                    actual: other,
                })
            }
        })
    }
}

/// Transport size (variable type) carried in request items
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    String = 0x00,
    Bit = 0x01,
    Byte = 0x02,
    Char = 0x03,
    Word = 0x04,
    Int = 0x05,
    DWord = 0x06,
    DInt = 0x07,
    Real = 0x08,
    Date = 0x09,
    TimeOfDay = 0x0A,
    Time = 0x0B,
    S5Time = 0x0C,
    DateTime = 0x0F,
    DateTimeLong = 0x10,
    Counter = 0x1C,
    Timer = 0x1D,
    WString = 0xFF,
}

impl TryFrom<u8> for VariableType {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use VariableType::*;
        Ok(match v {
            0x00 => String,
            0x01 => Bit,
            0x02 => Byte,
            0x03 => Char,
            0x04 => Word,
            0x05 => Int,
            0x06 => DWord,
            0x07 => DInt,
            0x08 => Real,
            0x09 => Date,
            0x0A => TimeOfDay,
            0x0B => Time,
            0x0C => S5Time,
            0x0F => DateTime,
            0x10 => DateTimeLong,
            0x1C => Counter,
            0x1D => Timer,
            0xFF => WString,
            other => return Err(Error::VariableTypeUnrecognized(other)),
        })
    }
}

impl VariableType {
    /// Width of one element in bytes. Strings report 0; their size is carried
    /// by the count field after the client converts them to byte access.
    pub fn size(self) -> u16 {
        use VariableType::*;
        match self {
            Bit | Byte | Char => 1,
            Word | Int | Date | S5Time | Counter | Timer => 2,
            DWord | DInt | Real | TimeOfDay | Time => 4,
            DateTime => 8,
            DateTimeLong => 12,
            String | WString => 0,
        }
    }

    /// The transport size used for the paired data item of a write request.
    pub fn data_variable_type(self) -> DataVariableType {
        match self {
            VariableType::Bit => DataVariableType::Bit,
            VariableType::Counter | VariableType::Timer => DataVariableType::OctetString,
            _ => DataVariableType::ByteWordDword,
        }
    }
}

/// Transport size of a data item in the datum section
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataVariableType {
    /// No data
    Null = 0x00,
    /// Bit access, length is in bytes
    Bit = 0x03,
    /// Byte/word/dword access, length is in bits
    ByteWordDword = 0x04,
    /// Integer access, length is in bits
    Int = 0x05,
    /// Double integer access, length is in bytes
    DInt = 0x06,
    /// Real access, length is in bytes
    Real = 0x07,
    /// Octet string, length is in bytes
    OctetString = 0x09,
}

impl TryFrom<u8> for DataVariableType {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use DataVariableType::*;
        Ok(match v {
            0x00 => Null,
            0x03 => Bit,
            0x04 => ByteWordDword,
            0x05 => Int,
            0x06 => DInt,
            0x07 => Real,
            0x09 => OctetString,
            other => return Err(Error::VariableTypeUnrecognized(other)),
        })
    }
}

impl DataVariableType {
    /// Whether the on-wire count field of a data item is expressed in bits.
    pub fn counts_in_bits(self) -> bool {
        matches!(
            self,
            DataVariableType::Null | DataVariableType::ByteWordDword | DataVariableType::Int
        )
    }
}

/// Return code of a response item; 0xFF signals success. In write request
/// messages the field is always zero.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Reserved = 0x00,
    HardwareFault = 0x01,
    AccessDenied = 0x03,
    AddressOutOfRange = 0x05,
    DataTypeNotSupported = 0x06,
    DataTypeInconsistent = 0x07,
    ObjectDoesNotExist = 0x0A,
    Success = 0xFF,
}

impl TryFrom<u8> for ReturnCode {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use ReturnCode::*;
        Ok(match v {
            0x00 => Reserved,
            0x01 => HardwareFault,
            0x03 => AccessDenied,
            0x05 => AddressOutOfRange,
            0x06 => DataTypeNotSupported,
            0x07 => DataTypeInconsistent,
            0x0A => ObjectDoesNotExist,
            0xFF => Success,
            other => {
                return Err(Error::TypeNotResolved {
                    what: "return code",
                    actual: other,
                })
            }
        })
    }
}

impl ReturnCode {
    pub fn describe(self) -> &'static str {
        use ReturnCode::*;
        match self {
            Reserved => "reserved",
            HardwareFault => "hardware fault",
            AccessDenied => "accessing the object is not allowed",
            AddressOutOfRange => "invalid address, beyond the limits of this PLC",
            DataTypeNotSupported => "data type not supported",
            DataTypeInconsistent => "data type inconsistent",
            ObjectDoesNotExist => "object does not exist",
            Success => "success",
        }
    }
}

/// Block types used by the file transfer and block query subprotocols
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Ob = 0x3038,
    Db = 0x3041,
    Sdb = 0x3042,
    Fc = 0x3043,
    Sfc = 0x3044,
    Fb = 0x3045,
    Sfb = 0x3046,
}

impl TryFrom<u16> for BlockType {
    type Error = Error;
    fn try_from(v: u16) -> Result<Self, Self::Error> {
        use BlockType::*;
        Ok(match v {
            0x3038 => Ob,
            0x3041 => Db,
            0x3042 => Sdb,
            0x3043 => Fc,
            0x3044 => Sfc,
            0x3045 => Fb,
            0x3046 => Sfb,
            _ => {
                return Err(Error::TypeNotResolved {
                    what: "block type",
                    actual: (v & 0xFF) as u8,
                })
            }
        })
    }
}

/// Destination file system of a block transfer
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationFileSystem {
    /// Passive (copied, but not chained) module
    P = 0x50,
    /// Active embedded module
    A = 0x41,
    /// Active as well as passive module
    B = 0x42,
}

impl TryFrom<u8> for DestinationFileSystem {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0x50 => Ok(DestinationFileSystem::P),
            0x41 => Ok(DestinationFileSystem::A),
            0x42 => Ok(DestinationFileSystem::B),
            other => Err(Error::TypeNotResolved {
                what: "destination file system",
                actual: other,
            }),
        }
    }
}

/// Userdata parameter method
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Request = 0x11,
    Response = 0x12,
}

impl TryFrom<u8> for Method {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0x11 => Ok(Method::Request),
            0x12 => Ok(Method::Response),
            other => Err(Error::TypeNotResolved {
                what: "method",
                actual: other,
            }),
        }
    }
}

/// Userdata function groups; requests use 0x4n, responses 0x8n
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionGroup {
    RequestModeTransition = 0x40,
    RequestProgrammerCmd = 0x41,
    RequestCyclicData = 0x42,
    RequestBlockFunction = 0x43,
    RequestCpuFunction = 0x44,
    RequestSecurity = 0x45,
    RequestTimeFunction = 0x47,
    ResponseModeTransition = 0x80,
    ResponseProgrammerCmd = 0x81,
    ResponseCyclicData = 0x82,
    ResponseBlockFunction = 0x83,
    ResponseCpuFunction = 0x84,
    ResponseSecurity = 0x85,
    ResponseTimeFunction = 0x87,
}

impl TryFrom<u8> for FunctionGroup {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use FunctionGroup::*;
        Ok(match v {
            0x40 => RequestModeTransition,
            0x41 => RequestProgrammerCmd,
            0x42 => RequestCyclicData,
            0x43 => RequestBlockFunction,
            0x44 => RequestCpuFunction,
            0x45 => RequestSecurity,
            0x47 => RequestTimeFunction,
            0x80 => ResponseModeTransition,
            0x81 => ResponseProgrammerCmd,
            0x82 => ResponseCyclicData,
            0x83 => ResponseBlockFunction,
            0x84 => ResponseCpuFunction,
            0x85 => ResponseSecurity,
            0x87 => ResponseTimeFunction,
            other => {
                return Err(Error::TypeNotResolved {
                    what: "function group",
                    actual: other,
                })
            }
        })
    }
}

/// CPU function group sub-functions
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuSubFunction {
    ReadSzl = 0x01,
    MessageService = 0x02,
    DiagnosticMessage = 0x03,
    DisplayAlarm = 0x05,
    DisplayNotify = 0x06,
    LockAlarm = 0x07,
    LockNotify = 0x08,
    DisplayScan = 0x09,
}

/// Block function group sub-functions
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSubFunction {
    ListBlocks = 0x01,
    ListBlocksOfType = 0x02,
    BlockInfo = 0x03,
}

/// Time function group sub-functions
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSubFunction {
    ReadClock = 0x01,
    SetClock = 0x02,
}

/// Security function group sub-functions
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecuritySubFunction {
    SetPassword = 0x01,
    ClearPassword = 0x02,
}
