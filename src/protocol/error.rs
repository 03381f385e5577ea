use std::result::Result as StdResult;
use thiserror::Error as ThisError;

/// Unified result type for the crate
pub type Result<T> = StdResult<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ---- address parsing ----
    #[error("request address is empty")]
    AddressEmpty,

    #[error("request address is invalid: {0}")]
    AddressInvalid(String),

    // ---- client usage ----
    #[error("password length must be at most {max}")]
    PasswordLengthInvalid { max: usize },

    #[error("request data is empty")]
    RequestDataEmpty,

    #[error("request data length is different from addresses")]
    RequestDataDifferent,

    #[error("request item invalid")]
    RequestItemInvalid,

    // ---- wire encoding ----
    /// Input slice is shorter than the fixed minimum of the record being parsed
    #[error("[{what}] needs at least {min} bytes")]
    ModelFromBytes { what: &'static str, min: usize },

    /// A discriminator byte did not match any known variant
    #[error("cannot resolve {what}: {actual:#04x}")]
    TypeNotResolved { what: &'static str, actual: u8 },

    #[error("variable type is unrecognized: {0:#04x}")]
    VariableTypeUnrecognized(u8),

    // ---- connection ----
    #[error("connection for [{0}] is nil")]
    ConnectionNil(String),

    #[error("connection for [{0}] is inactive")]
    ConnectionInactive(String),

    #[error("connection for [{0}] is connecting")]
    ConnectionConnecting(String),

    #[error("connection for [{0}] is not nil")]
    ConnectionNotNil(String),

    // ---- transport ----
    #[error("tcp connection with error: {0}")]
    TcpConnect(#[source] std::io::Error),

    #[error("failed to connect to [{endpoint}] after [{attempts}] attempts")]
    TcpConnectWithAttempts { endpoint: String, attempts: i32 },

    #[error("request for [{0}] is already processing")]
    RequestProcessing(u16),

    #[error("request timeout")]
    RequestTimeout,

    #[error("request rejected")]
    RequestRejected,

    #[error("empty response")]
    ResponseEmpty,

    // ---- protocol ----
    #[error("invalid response")]
    ResponseInvalid,

    #[error("response exceptional, class: [{class}], reason: [{reason}]")]
    ResponseExceptional {
        class: &'static str,
        reason: &'static str,
    },

    #[error("pdu reference mismatch")]
    PduReferenceMismatch,

    #[error("response data does not match the length of request data")]
    ResponseLengthMismatch,

    #[error("szl parts invalid")]
    SzlPartsInvalid,

    #[error("upload failed from response status")]
    UploadFailed,

    // ---- connection state machine ----
    #[error("disconnect called whilst connection attempt in progress")]
    AbortConnection,

    #[error("status is already connected or reconnecting")]
    AlreadyConnectedOrReconnecting,

    #[error("status can only transition to connecting from disconnected")]
    StatusMustBeDisconnected,

    #[error("status is already disconnected")]
    AlreadyDisconnected,

    #[error("disconnection was requested whilst the action was in progress")]
    DisconnectionRequested,

    #[error("disconnection already in progress")]
    DisconnectionInProgress,
}

/// Human-readable description for the S7 header error class byte.
pub fn error_class_desc(class: u8) -> &'static str {
    match class {
        0x00 => "no error",
        0x81 => "application relationship",
        0x82 => "object definition",
        0x83 => "no resources available",
        0x84 => "error on service processing",
        0x85 => "error on supplies",
        0x87 => "access error",
        0xD2 => "download error",
        _ => "unknown",
    }
}

/// Human-readable description for the combined 16-bit header error code
/// (error class in the high byte, error code proper in the low byte).
pub fn error_code_desc(code: u16) -> &'static str {
    match code {
        0x0000 => "no error",
        0x0110 => "invalid block number",
        0x0111 => "invalid request length",
        0x0112 => "invalid parameter",
        0x0113 => "invalid block type",
        0x0114 => "block not found",
        0x0115 => "block already exists",
        0x0116 => "block is write-protected",
        0x0117 => "block/operating system update too large",
        0x0118 => "invalid block number",
        0x0119 => "incorrect password entered",
        0x011A => "PG resource error",
        0x011B => "PLC resource error",
        0x011C => "protocol error",
        0x011D => "too many blocks (module-related restriction)",
        0x011E => "no longer connected to database, or S7DOS handle is invalid",
        0x011F => "result buffer too small",
        0x0120 => "end of block list",
        0x0140 => "insufficient memory available",
        0x0141 => "job cannot be processed because of a lack of resources",
        0x8001 => "the requested service cannot be performed while the block is in the current status",
        0x8003 => "S7 protocol error: error occurred while transferring the block",
        0x8100 => "application, general error: service unknown to remote module",
        0x8104 => "this service is not implemented on the module or a frame error was reported",
        0x8204 => "the type specification for the object is inconsistent",
        0x8205 => "a copied block already exists and is not linked",
        0x8301 => "insufficient memory space or work memory on the module, or specified storage medium is not accessible",
        0x8302 => "too few resources available or the processor resources are not available",
        0x8304 => "no further parallel upload possible; there is a resource bottleneck",
        0x8305 => "function not available",
        0x8306 => "insufficient work memory (for copying, linking, loading AWP)",
        0x8307 => "not enough retentive work memory (for copying, linking, loading AWP)",
        0x8401 => "S7 protocol error: invalid service sequence (for example, loading or uploading a block)",
        0x8402 => "service cannot execute owing to status of the addressed object",
        0x8404 => "S7 protocol: the function cannot be performed",
        0x8405 => "remote block is in DISABLE state (CFB); the function cannot be performed",
        0x8500 => "S7 protocol error: wrong frames",
        0x8503 => "alarm from the module: service canceled prematurely",
        0x8701 => "error addressing the object on the communication partner (for example, area length error)",
        0x8702 => "the requested service is not supported by the module",
        0x8703 => "access to object refused",
        0x8704 => "access error: object damaged",
        0xD001 => "protocol error: illegal job number",
        0xD002 => "parameter error: illegal job variant",
        0xD003 => "parameter error: debugging function not supported by module",
        0xD004 => "parameter error: illegal job status",
        0xD005 => "parameter error: illegal job termination",
        0xD006 => "parameter error: illegal link disconnection ID",
        0xD007 => "parameter error: illegal number of buffer elements",
        0xD008 => "parameter error: illegal scan rate",
        0xD009 => "parameter error: illegal number of executions",
        0xD00A => "parameter error: illegal trigger event",
        0xD00B => "parameter error: illegal trigger condition",
        0xD011 => "parameter error in path of the call environment: block does not exist",
        0xD012 => "parameter error: wrong address in block",
        0xD014 => "parameter error: block being deleted/overwritten",
        0xD015 => "parameter error: illegal tag address",
        0xD016 => "parameter error: test jobs not possible because of user program error",
        0xD017 => "parameter error: illegal trigger number",
        0xD025 => "parameter error: invalid path",
        0xD026 => "parameter error: illegal access type",
        0xD027 => "parameter error: this number of data blocks is not permitted",
        0xD031 => "internal protocol error",
        0xD032 => "parameter error: wrong result buffer length",
        0xD033 => "protocol error: wrong job length",
        0xD03F => "coding error: error in parameter section (for example, reserved bytes not equal to 0)",
        0xD041 => "data error: illegal status list ID",
        0xD042 => "data error: illegal tag address",
        0xD043 => "data error: referenced job not found, check job data",
        0xD044 => "data error: illegal tag value, check job data",
        0xD045 => "data error: exiting the ODIS control is not allowed in HOLD",
        0xD046 => "data error: illegal measuring stage during run-time measurement",
        0xD047 => "data error: illegal hierarchy in 'read job list'",
        0xD048 => "data error: illegal deletion ID in 'delete job'",
        0xD049 => "invalid substitute ID in 'replace job'",
        0xD04A => "error executing 'program status'",
        0xD05F => "coding error: error in data section (for example, reserved bytes not equal to 0)",
        0xD061 => "resource error: no memory space for job",
        0xD062 => "resource error: job list full",
        0xD063 => "resource error: trigger event occupied",
        0xD064 => "resource error: not enough memory space for one result buffer element",
        0xD065 => "resource error: not enough memory space for several result buffer elements",
        0xD066 => "resource error: the timer available for run-time measurement is occupied by another job",
        0xD067 => "resource error: too many 'modify tag' jobs active",
        0xD081 => "function not permitted in current mode",
        0xD082 => "mode error: cannot exit HOLD mode",
        0xD0A1 => "function not permitted in current protection level",
        0xD0A2 => "function not possible at present, because a function that modifies memory is running",
        0xD0A3 => "too many 'modify tag' jobs active on the I/O",
        0xD0A4 => "'forcing' has already been established",
        0xD0A5 => "referenced job not found",
        0xD0A6 => "job cannot be disabled/enabled",
        0xD0A7 => "job cannot be deleted, for example because it is currently being read",
        0xD0A8 => "job cannot be replaced, for example because it is currently being read or deleted",
        0xD0A9 => "job cannot be read, for example because it is currently being deleted",
        0xD0AA => "time limit exceeded in processing operation",
        0xD0AB => "invalid job parameters in process operation",
        0xD0AC => "invalid job data in process operation",
        0xD0AD => "operating mode already set",
        0xD0AE => "the job was set up over a different connection and can only be handled over that connection",
        0xD0C1 => "at least one error was detected while accessing the tags",
        0xD0C2 => "change to STOP/HOLD mode",
        0xD0C3 => "at least one error was detected while accessing the tags; mode changed to STOP/HOLD",
        0xD0C4 => "timeout during run-time measurement",
        0xD0C5 => "display of block stack inconsistent, because blocks were deleted/reloaded",
        0xD0C6 => "job was automatically deleted as the jobs it referenced have been deleted",
        0xD0C7 => "the job was automatically deleted because STOP mode was exited",
        0xD0C8 => "'block status' aborted because of inconsistencies between test job and running program",
        0xD0C9 => "exit the status area by resetting OB90",
        0xD0CA => "exiting the status range by resetting OB90 and access error reading tags before exiting",
        0xD0CB => "the output disable for the peripheral outputs has been activated again",
        0xD0CC => "the amount of data for the debugging functions is restricted by the time limit",
        0xD201 => "syntax error in block name",
        0xD202 => "syntax error in function parameter",
        0xD205 => "linked block already exists in RAM: conditional copying is not possible",
        0xD206 => "linked block already exists in EPROM: conditional copying is not possible",
        0xD208 => "maximum number of copied (not linked) blocks on module exceeded",
        0xD209 => "(at least) one of the given blocks not found on the module",
        0xD20A => "the maximum number of blocks that can be linked with one job was exceeded",
        0xD20B => "the maximum number of blocks that can be deleted with one job was exceeded",
        0xD20C => "OB cannot be copied because the associated priority class does not exist",
        0xD20D => "SDB cannot be interpreted (for example, unknown number)",
        0xD20E => "no (further) block available",
        0xD20F => "module-specific maximum block size exceeded",
        0xD210 => "invalid block number",
        0xD212 => "incorrect header attribute (run-time relevant)",
        0xD213 => "too many SDBs; note the restrictions on the module being used",
        0xD216 => "invalid user program - reset the module",
        0xD217 => "protection level specified in module properties not permitted",
        0xD218 => "incorrect attribute (active/passive)",
        0xD219 => "incorrect block length (for example, incorrect length of first section or of the whole block)",
        0xD21A => "incorrect local data length or write-protection error",
        0xD21B => "module cannot compress or compression was interrupted early",
        0xD21D => "the volume of dynamic project data transferred is illegal",
        0xD21E => "unable to assign parameters to a module; the system data could not be linked",
        0xD220 => "invalid programming language; note the restrictions on the module being used",
        0xD221 => "invalid system data for connections or routing",
        0xD222 => "system data for global data definition contain invalid parameters",
        0xD223 => "error in instance data block for communication function block or maximum number of instance DBs exceeded",
        0xD224 => "SCAN system data block contains invalid parameters",
        0xD225 => "DP system data block contains invalid parameters",
        0xD226 => "structural error in a block",
        0xD230 => "structural error in a block",
        0xD231 => "at least one loaded OB cannot be copied because the associated priority class does not exist",
        0xD232 => "at least one block number of a loaded block is illegal",
        0xD234 => "block exists twice in the specified memory medium or in the job",
        0xD235 => "the block contains an incorrect checksum",
        0xD236 => "the block does not contain a checksum",
        0xD237 => "you are about to load the block twice; a block with the same time stamp already exists on the CPU",
        0xD238 => "at least one of the blocks specified is not a DB",
        0xD239 => "at least one of the DBs specified is not available as a linked variant in the load memory",
        0xD23A => "at least one of the specified DBs differs considerably from the copied and linked variant",
        0xD240 => "coordination rules violated",
        0xD241 => "the function is not permitted in the current protection level",
        0xD242 => "protection violation while processing F blocks",
        0xD250 => "update and module ID or version do not match",
        0xD251 => "incorrect sequence of operating system components",
        0xD252 => "checksum error",
        0xD253 => "no executable loader available; update only possible using a memory card",
        0xD254 => "storage error in operating system",
        0xD280 => "error compiling block in S7-300 CPU",
        0xD2A1 => "another block function or a trigger on the block is active",
        0xD2A2 => "a trigger is active on the block; complete the debugging function first",
        0xD2A3 => "the block is not activated (linked), the block is occupied or the block is currently marked for deletion",
        0xD2A4 => "the block is already being processed by another block function",
        0xD2A6 => "it is not possible to save and change the user program simultaneously",
        0xD2A7 => "the block has the attribute 'unlinked' or is not processed",
        0xD2A8 => "an active debugging function is preventing parameters from being assigned to the CPU",
        0xD2A9 => "new parameters are being assigned to the CPU",
        0xD2AA => "new parameters are currently being assigned to the modules",
        0xD2AB => "the dynamic configuration limits are currently being changed",
        0xD2AC => "a running active or deactivate assignment (SFC 12) is temporarily blocking the R-KiR process",
        0xD2B0 => "an error occurred while configuring in RUN (CiR)",
        0xD2C0 => "the maximum number of technological objects has been exceeded",
        0xD2C1 => "the same technology data block already exists on the module",
        0xD2C2 => "downloading the user program or downloading the hardware configuration is not possible",
        0xD401 => "information function unavailable",
        0xD402 => "information function unavailable",
        0xD403 => "service has already been logged on/off (diagnostics/PMC)",
        0xD404 => "maximum number of nodes reached; no more logons possible for diagnostics/PMC",
        0xD405 => "service not supported or syntax error in function parameters",
        0xD406 => "required information currently unavailable",
        0xD407 => "diagnostics error occurred",
        0xD408 => "update aborted",
        0xD409 => "error on DP bus",
        0xD601 => "syntax error in function parameters",
        0xD602 => "incorrect password entered",
        0xD603 => "the connection has already been legitimized",
        0xD604 => "the connection has already been enabled",
        0xD605 => "legitimization not possible because password does not exist",
        0xD801 => "at least one tag address is invalid",
        0xD802 => "specified job does not exist",
        0xD803 => "illegal job status",
        0xD804 => "illegal cycle time (illegal time base or multiple)",
        0xD805 => "no more cyclic read jobs can be set up",
        0xD806 => "the referenced job is in a state in which the requested function cannot be performed",
        0xD807 => "function aborted because of overload; the read cycle takes longer than the set scan cycle time",
        0xDC01 => "date and/or time invalid",
        0xE201 => "CPU is already the master",
        0xE202 => "connect and update not possible because of different user program in flash module",
        0xE203 => "connect and update not possible because of different firmware",
        0xE204 => "connect and update not possible because of different memory configuration",
        0xE205 => "connect/update aborted because of synchronization error",
        0xE206 => "connect/update denied because of coordination violation",
        0xEF01 => "S7 protocol error: error at ID2; only 00H is permitted in a job",
        0xEF02 => "S7 protocol error: error at ID2; set of resources does not exist",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_and_code_lookups_fall_back_to_unknown() {
        assert_eq!(error_class_desc(0x85), "error on supplies");
        assert_eq!(error_class_desc(0x42), "unknown");
        assert_eq!(error_code_desc(0x8500), "S7 protocol error: wrong frames");
        assert_eq!(error_code_desc(0xBEEF), "unknown");
    }
}
