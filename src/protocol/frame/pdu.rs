use super::{
    super::error::{Error, Result},
    cotp::{Cotp, CotpConnection, CotpData},
    datum::{
        BlockInfoRequestDatum, BlockListTypeDatum, ClockDatum, Datum, ReadSzlDatum, ReadWriteDatum,
        ResponseItem, SetPasswordDatum, UpDownloadDatum, UserdataDatum,
    },
    header::{Header, RequestHeader},
    item::RequestItem,
    param::{
        DownloadParameter, EndDownloadParameter, EndUploadParameter, Parameter,
        PlcControlParameter, PlcStopParameter, ReadWriteParameter, SetupComParameter,
        StartDownloadParameter, StartUploadParameter, UploadParameter, UserdataParameter,
    },
    tpkt::{Tpkt, TPKT_LEN},
    types::{
        BlockSubFunction, BlockType, CpuSubFunction, DestinationFileSystem, FunctionGroup,
        SecuritySubFunction, TimeSubFunction,
    },
    WireDecode, WireEncode,
};
use bytes::{BufMut, Bytes};
use chrono::NaiveDateTime;

/// Top-level protocol data unit: TPKT framing, COTP transport, and the
/// optional S7 header/parameter/datum layers.
///
/// `self_check` keeps the nested length fields consistent; every constructor
/// runs it, and it must be re-run after mutating any layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub tpkt: Option<Tpkt>,
    pub cotp: Option<Cotp>,
    pub header: Option<Header>,
    pub parameter: Option<Parameter>,
    pub datum: Option<Datum>,
}

impl Pdu {
    fn job(pdu_reference: u16, parameter: Parameter) -> Self {
        let mut pdu = Pdu {
            tpkt: Some(Tpkt::new()),
            cotp: Some(Cotp::Data(CotpData::new())),
            header: Some(Header::Request(RequestHeader::job(pdu_reference))),
            parameter: Some(parameter),
            datum: None,
        };
        pdu.self_check();
        pdu
    }

    fn job_with_datum(pdu_reference: u16, parameter: Parameter, datum: Datum) -> Self {
        let mut pdu = Pdu {
            tpkt: Some(Tpkt::new()),
            cotp: Some(Cotp::Data(CotpData::new())),
            header: Some(Header::Request(RequestHeader::job(pdu_reference))),
            parameter: Some(parameter),
            datum: Some(datum),
        };
        pdu.self_check();
        pdu
    }

    fn user_data(pdu_reference: u16, parameter: UserdataParameter, datum: Datum) -> Self {
        let mut pdu = Pdu {
            tpkt: Some(Tpkt::new()),
            cotp: Some(Cotp::Data(CotpData::new())),
            header: Some(Header::Request(RequestHeader::user_data(pdu_reference))),
            parameter: Some(Parameter::Userdata(parameter)),
            datum: Some(datum),
        };
        pdu.self_check();
        pdu
    }

    /// ISO connection request carrying local and remote TSAPs.
    pub fn connect_request(local_tsap: u16, remote_tsap: u16) -> Self {
        let mut pdu = Pdu {
            tpkt: Some(Tpkt::new()),
            cotp: Some(Cotp::Connection(CotpConnection::connect_request(
                local_tsap,
                remote_tsap,
            ))),
            header: None,
            parameter: None,
            datum: None,
        };
        pdu.self_check();
        pdu
    }

    /// ISO disconnect request.
    pub fn disconnect_request(local_tsap: u16, remote_tsap: u16) -> Self {
        let mut pdu = Pdu {
            tpkt: Some(Tpkt::new()),
            cotp: Some(Cotp::Connection(CotpConnection::disconnect_request(
                local_tsap,
                remote_tsap,
            ))),
            header: None,
            parameter: None,
            datum: None,
        };
        pdu.self_check();
        pdu
    }

    /// S7 session setup proposing a PDU length.
    pub fn setup_request(pdu_length: u16, pdu_reference: u16) -> Self {
        Self::job(
            pdu_reference,
            Parameter::SetupCom(SetupComParameter::new(pdu_length)),
        )
    }

    pub fn read_request(items: Vec<RequestItem>, pdu_reference: u16) -> Self {
        Self::job(
            pdu_reference,
            Parameter::ReadWrite(ReadWriteParameter::read(items)),
        )
    }

    pub fn write_request(
        items: Vec<RequestItem>,
        data_items: Vec<ResponseItem>,
        pdu_reference: u16,
    ) -> Self {
        Self::job_with_datum(
            pdu_reference,
            Parameter::ReadWrite(ReadWriteParameter::write(items)),
            Datum::ReadWrite(ReadWriteDatum::new(data_items)),
        )
    }

    pub fn hot_restart(pdu_reference: u16) -> Self {
        Self::job(
            pdu_reference,
            Parameter::PlcControl(PlcControlParameter::hot_restart()),
        )
    }

    pub fn cold_restart(pdu_reference: u16) -> Self {
        Self::job(
            pdu_reference,
            Parameter::PlcControl(PlcControlParameter::cold_restart()),
        )
    }

    pub fn stop_plc(pdu_reference: u16) -> Self {
        Self::job(pdu_reference, Parameter::PlcStop(PlcStopParameter::new()))
    }

    pub fn copy_ram_to_rom(pdu_reference: u16) -> Self {
        Self::job(
            pdu_reference,
            Parameter::PlcControl(PlcControlParameter::copy_ram_to_rom()),
        )
    }

    pub fn compress(pdu_reference: u16) -> Self {
        Self::job(
            pdu_reference,
            Parameter::PlcControl(PlcControlParameter::compress()),
        )
    }

    pub fn insert(
        block_type: BlockType,
        file_system: DestinationFileSystem,
        block_number: u32,
        pdu_reference: u16,
    ) -> Self {
        Self::job(
            pdu_reference,
            Parameter::PlcControl(PlcControlParameter::insert(
                block_type,
                block_number,
                file_system,
            )),
        )
    }

    pub fn start_download(
        block_type: BlockType,
        file_system: DestinationFileSystem,
        block_number: u32,
        load_memory_length: u32,
        mc7_code_length: u32,
        pdu_reference: u16,
    ) -> Self {
        Self::job(
            pdu_reference,
            Parameter::StartDownload(StartDownloadParameter::new(
                block_type,
                file_system,
                block_number,
                load_memory_length,
                mc7_code_length,
            )),
        )
    }

    pub fn download(
        block_type: BlockType,
        file_system: DestinationFileSystem,
        block_number: u32,
        more_data_following: bool,
        data: Bytes,
        pdu_reference: u16,
    ) -> Self {
        Self::job_with_datum(
            pdu_reference,
            Parameter::Download(DownloadParameter::new(
                block_type,
                file_system,
                block_number,
                more_data_following,
            )),
            Datum::UpDownload(UpDownloadDatum::new(data)),
        )
    }

    pub fn end_download(
        block_type: BlockType,
        file_system: DestinationFileSystem,
        block_number: u32,
        pdu_reference: u16,
    ) -> Self {
        Self::job(
            pdu_reference,
            Parameter::EndDownload(EndDownloadParameter::new(
                block_type,
                file_system,
                block_number,
            )),
        )
    }

    pub fn start_upload(
        block_type: BlockType,
        file_system: DestinationFileSystem,
        block_number: u32,
        pdu_reference: u16,
    ) -> Self {
        Self::job(
            pdu_reference,
            Parameter::StartUpload(StartUploadParameter::new(
                block_type,
                file_system,
                block_number,
            )),
        )
    }

    pub fn upload(id: u32, pdu_reference: u16) -> Self {
        Self::job(pdu_reference, Parameter::Upload(UploadParameter::new(id)))
    }

    pub fn end_upload(id: u32, pdu_reference: u16) -> Self {
        Self::job(
            pdu_reference,
            Parameter::EndUpload(EndUploadParameter::new(id)),
        )
    }

    pub fn read_szl(szl_id: u16, szl_index: u16, pdu_reference: u16) -> Self {
        Self::user_data(
            pdu_reference,
            UserdataParameter::cpu(CpuSubFunction::ReadSzl),
            Datum::ReadSzl(ReadSzlDatum::new(szl_id, szl_index)),
        )
    }

    pub fn block_list(pdu_reference: u16) -> Self {
        Self::user_data(
            pdu_reference,
            UserdataParameter::block(BlockSubFunction::ListBlocks),
            Datum::Userdata(UserdataDatum::new()),
        )
    }

    pub fn block_list_type(block_type: BlockType, pdu_reference: u16) -> Self {
        Self::user_data(
            pdu_reference,
            UserdataParameter::block(BlockSubFunction::ListBlocksOfType),
            Datum::BlockListType(BlockListTypeDatum::new(block_type)),
        )
    }

    pub fn block_info(
        block_type: BlockType,
        file_system: DestinationFileSystem,
        block_number: u32,
        pdu_reference: u16,
    ) -> Self {
        Self::user_data(
            pdu_reference,
            UserdataParameter::block(BlockSubFunction::BlockInfo),
            Datum::BlockInfoRequest(BlockInfoRequestDatum::new(
                block_type,
                file_system,
                block_number,
            )),
        )
    }

    pub fn clock_read(pdu_reference: u16) -> Self {
        Self::user_data(
            pdu_reference,
            UserdataParameter::clock(TimeSubFunction::ReadClock),
            Datum::Userdata(UserdataDatum::new()),
        )
    }

    pub fn clock_set(t: NaiveDateTime, pdu_reference: u16) -> Self {
        Self::user_data(
            pdu_reference,
            UserdataParameter::clock(TimeSubFunction::SetClock),
            Datum::Clock(ClockDatum::from_datetime(t)),
        )
    }

    pub fn set_password(password: &str, pdu_reference: u16) -> Self {
        Self::user_data(
            pdu_reference,
            UserdataParameter::security(SecuritySubFunction::SetPassword),
            Datum::SetPassword(SetPasswordDatum::new(password)),
        )
    }

    pub fn clear_password(pdu_reference: u16) -> Self {
        Self::user_data(
            pdu_reference,
            UserdataParameter::security(SecuritySubFunction::ClearPassword),
            Datum::Userdata(UserdataDatum::new()),
        )
    }

    /// Recompute `header.parameter_length`, `header.data_length` and
    /// `tpkt.length` from the encoded sizes of the nested layers.
    pub fn self_check(&mut self) {
        let parameter_len = self.parameter.as_ref().map_or(0, WireEncode::encoded_len);
        let data_len = self.datum.as_ref().map_or(0, WireEncode::encoded_len);
        if let Some(header) = self.header.as_mut() {
            header.set_parameter_length(parameter_len as u16);
            header.set_data_length(data_len as u16);
        }
        let total = self.encoded_len();
        if let Some(tpkt) = self.tpkt.as_mut() {
            tpkt.length = total as u16;
        }
    }

    pub fn pdu_reference(&self) -> Option<u16> {
        self.header.as_ref().map(Header::pdu_reference)
    }

    /// Parse a complete TPKT frame into a PDU.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let tpkt = Tpkt::parse(input)?;
        let remain = &input[TPKT_LEN..];
        let cotp = Cotp::parse(remain)?;
        let cotp_len = cotp.encoded_len();

        let mut pdu = Pdu {
            tpkt: Some(tpkt),
            cotp: Some(cotp),
            header: None,
            parameter: None,
            datum: None,
        };
        if remain.len() == cotp_len {
            return Ok(pdu);
        }

        let remain = &remain[cotp_len..];
        let header = Header::parse(remain)?;
        let header_len = header.encoded_len();
        let message_type = header.message_type();
        let parameter_len = header.parameter_length() as usize;
        let data_len = header.data_length() as usize;
        pdu.header = Some(header);

        let mut function_code = None;
        let mut function_group = None;
        let mut sub_function = 0xFF;
        if parameter_len > 0 {
            if remain.len() < header_len + parameter_len {
                return Err(Error::ModelFromBytes {
                    what: "Parameter",
                    min: header_len + parameter_len,
                });
            }
            let parameter_bytes = &remain[header_len..header_len + parameter_len];
            // Userdata function group and sub-function live at fixed offsets
            if parameter_bytes.len() >= 7 {
                function_group = FunctionGroup::try_from(parameter_bytes[5]).ok();
                sub_function = parameter_bytes[6];
            }
            let parameter = Parameter::parse(parameter_bytes, message_type)?;
            function_code = parameter.function_code();
            pdu.parameter = Some(parameter);
        }

        if data_len > 0 {
            let data_start = header_len + parameter_len;
            if remain.len() < data_start {
                return Err(Error::ModelFromBytes {
                    what: "Datum",
                    min: data_start,
                });
            }
            let datum = Datum::parse(
                &remain[data_start..],
                message_type,
                function_code,
                function_group,
                sub_function,
            )?;
            pdu.datum = Some(datum);
        }
        Ok(pdu)
    }
}

impl WireEncode for Pdu {
    fn encoded_len(&self) -> usize {
        self.tpkt.as_ref().map_or(0, WireEncode::encoded_len)
            + self.cotp.as_ref().map_or(0, WireEncode::encoded_len)
            + self.header.as_ref().map_or(0, WireEncode::encoded_len)
            + self.parameter.as_ref().map_or(0, WireEncode::encoded_len)
            + self.datum.as_ref().map_or(0, WireEncode::encoded_len)
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        if let Some(tpkt) = &self.tpkt {
            tpkt.encode_to(dst);
        }
        if let Some(cotp) = &self.cotp {
            cotp.encode_to(dst);
        }
        if let Some(header) = &self.header {
            header.encode_to(dst);
        }
        if let Some(parameter) = &self.parameter {
            parameter.encode_to(dst);
        }
        if let Some(datum) = &self.datum {
            datum.encode_to(dst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{
        item::StandardItem,
        types::{Area, CotpType, MessageType, VariableType},
    };
    use super::*;

    fn round_trip(pdu: &Pdu) {
        let bs = pdu.to_bytes();
        let parsed = Pdu::parse(&bs).unwrap();
        assert_eq!(&parsed, pdu);
        assert_eq!(parsed.to_bytes(), bs);
    }

    #[test]
    fn self_check_propagates_lengths() {
        let item = StandardItem::new(Area::DataBlocks, 1, VariableType::Bit, 0, 0, 1);
        let pdu = Pdu::read_request(vec![RequestItem::Standard(item)], 0x0001);
        let header = pdu.header.as_ref().unwrap();
        assert_eq!(header.parameter_length(), 14);
        assert_eq!(header.data_length(), 0);
        // TPKT(4) + COTP(3) + header(10) + parameter(14)
        assert_eq!(pdu.tpkt.as_ref().unwrap().length, 31);
    }

    #[test]
    fn connect_request_round_trip() {
        let pdu = Pdu::connect_request(0x0100, 0x0302);
        assert_eq!(pdu.tpkt.as_ref().unwrap().length, 22);
        round_trip(&pdu);
    }

    #[test]
    fn job_and_userdata_round_trips() {
        let item = StandardItem::new(Area::Inputs, 0, VariableType::Byte, 10, 0, 4);
        round_trip(&Pdu::read_request(vec![RequestItem::Standard(item)], 7));
        round_trip(&Pdu::setup_request(480, 1));
        round_trip(&Pdu::hot_restart(2));
        round_trip(&Pdu::cold_restart(3));
        round_trip(&Pdu::stop_plc(4));
        round_trip(&Pdu::copy_ram_to_rom(5));
        round_trip(&Pdu::compress(6));
        round_trip(&Pdu::insert(BlockType::Db, DestinationFileSystem::P, 1, 8));
        round_trip(&Pdu::read_szl(0x0011, 0x0000, 9));
        round_trip(&Pdu::block_list(10));
        round_trip(&Pdu::block_list_type(BlockType::Db, 11));
        round_trip(&Pdu::block_info(BlockType::Db, DestinationFileSystem::A, 1, 12));
        round_trip(&Pdu::clock_read(13));
        round_trip(&Pdu::set_password("abc", 14));
        round_trip(&Pdu::clear_password(15));
        round_trip(&Pdu::start_upload(BlockType::Db, DestinationFileSystem::A, 1, 16));
        round_trip(&Pdu::upload(7, 17));
        round_trip(&Pdu::end_upload(7, 18));
        round_trip(&Pdu::start_download(
            BlockType::Db,
            DestinationFileSystem::P,
            1,
            300,
            264,
            19,
        ));
        round_trip(&Pdu::end_download(BlockType::Db, DestinationFileSystem::P, 1, 20));
        let t = chrono::NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_milli_opt(12, 34, 56, 789)
            .unwrap();
        round_trip(&Pdu::clock_set(t, 21));
    }

    #[test]
    fn write_request_round_trip_with_datum() {
        use super::super::datum::DataItem;
        use super::super::types::DataVariableType;

        let item = StandardItem::new(Area::DataBlocks, 1, VariableType::Byte, 4, 0, 2);
        let data = ResponseItem::Data(DataItem::request(
            Bytes::from_static(&[0xFF, 0xA8]),
            DataVariableType::ByteWordDword,
        ));
        let pdu = Pdu::write_request(vec![RequestItem::Standard(item)], vec![data], 42);
        let header = pdu.header.as_ref().unwrap();
        assert_eq!(header.data_length(), 6);
        round_trip(&pdu);
    }

    #[test]
    fn parses_handshake_connect_confirm() {
        let bs = [
            0x03, 0x00, 0x00, 0x16, 0x11, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00, 0xC0, 0x01, 0x0A,
            0xC1, 0x02, 0x01, 0x00, 0xC2, 0x02, 0x01, 0x02, 0x00, 0x00,
        ];
        // The TPKT length claims 0x16 = 22 bytes; the trailing bytes are ignored
        let pdu = Pdu::parse(&bs[..22]).unwrap();
        assert_eq!(pdu.cotp.as_ref().unwrap().pdu_type(), CotpType::ConnectConfirm);
        assert!(pdu.header.is_none());
    }

    #[test]
    fn parses_setup_ack_data() {
        // AckData with negotiated PDU length 240
        let mut ack = Pdu {
            tpkt: Some(Tpkt::new()),
            cotp: Some(Cotp::Data(CotpData::new())),
            header: Some(Header::Ack(super::super::header::AckHeader {
                protocol_id: 0x32,
                message_type: MessageType::AckData,
                reserved: 0,
                pdu_reference: 1,
                parameter_length: 0,
                data_length: 0,
                error_class: 0,
                error_code: 0,
            })),
            parameter: Some(Parameter::SetupCom(SetupComParameter::new(240))),
            datum: None,
        };
        ack.self_check();
        let parsed = Pdu::parse(&ack.to_bytes()).unwrap();
        match parsed.parameter {
            Some(Parameter::SetupCom(p)) => assert_eq!(p.pdu_length, 240),
            other => panic!("unexpected {other:?}"),
        }
    }
}
