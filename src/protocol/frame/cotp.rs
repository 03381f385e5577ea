use super::{
    super::error::{Error, Result},
    types::CotpType,
    WireDecode, WireEncode,
};
use bytes::BufMut;

pub const COTP_DATA_LEN: usize = 3;
pub const COTP_CONNECTION_LEN: usize = 18;

/// COTP TPDU; either the 18-byte connection form (CR/CC/DR/DC/Reject) or the
/// 3-byte data form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cotp {
    Connection(CotpConnection),
    Data(CotpData),
}

impl Cotp {
    pub fn pdu_type(&self) -> CotpType {
        match self {
            Cotp::Connection(c) => c.pdu_type,
            Cotp::Data(_) => CotpType::Data,
        }
    }
}

impl WireEncode for Cotp {
    fn encoded_len(&self) -> usize {
        match self {
            Cotp::Connection(c) => c.encoded_len(),
            Cotp::Data(d) => d.encoded_len(),
        }
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        match self {
            Cotp::Connection(c) => c.encode_to(dst),
            Cotp::Data(d) => d.encode_to(dst),
        }
    }
}

impl WireDecode for Cotp {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < 2 {
            return Err(Error::ModelFromBytes {
                what: "COTP",
                min: 2,
            });
        }
        match CotpType::try_from(input[1])? {
            CotpType::Data => Ok(Cotp::Data(CotpData::parse(input)?)),
            // The reject message structure is undocumented; it is parsed with
            // the connection layout like the other fixed forms.
            _ => Ok(Cotp::Connection(CotpConnection::parse(input)?)),
        }
    }
}

/// Data TPDU: length, type 0xF0, TPDU number plus last-data-unit flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CotpData {
    /// Header length excluding this byte
    pub length: u8,
    /// TPDU number, low 7 bits of byte 2
    pub tpdu_number: u8,
    /// End-of-transmission flag, high bit of byte 2
    pub last_data_unit: bool,
}

impl CotpData {
    pub fn new() -> Self {
        CotpData {
            length: 0x02,
            tpdu_number: 0x00,
            last_data_unit: true,
        }
    }
}

impl Default for CotpData {
    fn default() -> Self {
        Self::new()
    }
}

impl WireEncode for CotpData {
    fn encoded_len(&self) -> usize {
        COTP_DATA_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.length);
        dst.put_u8(CotpType::Data as u8);
        let eot = if self.last_data_unit { 0x80 } else { 0x00 };
        dst.put_u8(eot | (self.tpdu_number & 0x7F));
    }
}

impl WireDecode for CotpData {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < COTP_DATA_LEN {
            return Err(Error::ModelFromBytes {
                what: "COTPData",
                min: COTP_DATA_LEN,
            });
        }
        Ok(CotpData {
            length: input[0],
            tpdu_number: input[2] & 0x7F,
            last_data_unit: input[2] & 0x80 != 0,
        })
    }
}

/// Connection-class TPDU used by CR/CC/DR/DC and Reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CotpConnection {
    /// Header length excluding this byte
    pub length: u8,
    pub pdu_type: CotpType,
    /// Destination reference, identifies the target uniquely
    pub dst_ref: u16,
    pub src_ref: u16,
    /// Class / extended-format / flow-control flags
    pub flags: u8,
    /// Parameter code for TPDU size, 0xC0
    pub param_code_tpdu_size: u8,
    pub param_len_tpdu_size: u8,
    /// TPDU size exponent (0x0A means 2^10 = 1024 bytes)
    pub tpdu_size: u8,
    /// Parameter code SRC-TSAP, 0xC1
    pub param_code_src_tsap: u8,
    pub param_len_src_tsap: u8,
    pub src_tsap: u16,
    /// Parameter code DST-TSAP, 0xC2
    pub param_code_dst_tsap: u8,
    pub param_len_dst_tsap: u8,
    pub dst_tsap: u16,
}

impl CotpConnection {
    /// Connection request carrying local and remote TSAPs.
    pub fn connect_request(local_tsap: u16, remote_tsap: u16) -> Self {
        CotpConnection {
            length: 0x11,
            pdu_type: CotpType::ConnectRequest,
            dst_ref: 0x0000,
            src_ref: 0x0001,
            flags: 0x00,
            param_code_tpdu_size: 0xC0,
            param_len_tpdu_size: 0x01,
            tpdu_size: 0x0A,
            param_code_src_tsap: 0xC1,
            param_len_src_tsap: 0x02,
            src_tsap: local_tsap,
            param_code_dst_tsap: 0xC2,
            param_len_dst_tsap: 0x02,
            dst_tsap: remote_tsap,
        }
    }

    pub fn disconnect_request(local_tsap: u16, remote_tsap: u16) -> Self {
        CotpConnection {
            pdu_type: CotpType::DisconnectRequest,
            ..Self::connect_request(local_tsap, remote_tsap)
        }
    }
}

impl WireEncode for CotpConnection {
    fn encoded_len(&self) -> usize {
        COTP_CONNECTION_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.length);
        dst.put_u8(self.pdu_type as u8);
        dst.put_u16(self.dst_ref);
        dst.put_u16(self.src_ref);
        dst.put_u8(self.flags);
        dst.put_u8(self.param_code_tpdu_size);
        dst.put_u8(self.param_len_tpdu_size);
        dst.put_u8(self.tpdu_size);
        dst.put_u8(self.param_code_src_tsap);
        dst.put_u8(self.param_len_src_tsap);
        dst.put_u16(self.src_tsap);
        dst.put_u8(self.param_code_dst_tsap);
        dst.put_u8(self.param_len_dst_tsap);
        dst.put_u16(self.dst_tsap);
    }
}

impl WireDecode for CotpConnection {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < COTP_CONNECTION_LEN {
            return Err(Error::ModelFromBytes {
                what: "COTPConnection",
                min: COTP_CONNECTION_LEN,
            });
        }
        Ok(CotpConnection {
            length: input[0],
            pdu_type: CotpType::try_from(input[1])?,
            dst_ref: u16::from_be_bytes([input[2], input[3]]),
            src_ref: u16::from_be_bytes([input[4], input[5]]),
            flags: input[6],
            param_code_tpdu_size: input[7],
            param_len_tpdu_size: input[8],
            tpdu_size: input[9],
            param_code_src_tsap: input[10],
            param_len_src_tsap: input[11],
            src_tsap: u16::from_be_bytes([input[12], input[13]]),
            param_code_dst_tsap: input[14],
            param_len_dst_tsap: input[15],
            dst_tsap: u16::from_be_bytes([input[16], input[17]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_round_trip() {
        let d = CotpData::new();
        let bs = d.to_bytes();
        assert_eq!(bs.as_ref(), &[0x02, 0xF0, 0x80]);
        match Cotp::parse(&bs).unwrap() {
            Cotp::Data(parsed) => assert_eq!(parsed, d),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn connect_request_round_trip() {
        let cr = CotpConnection::connect_request(0x0100, 0x0302);
        let bs = cr.to_bytes();
        assert_eq!(bs.len(), COTP_CONNECTION_LEN);
        assert_eq!(bs[0], 0x11);
        assert_eq!(bs[1], 0xE0);
        assert_eq!(&bs[12..14], &[0x01, 0x00]);
        assert_eq!(&bs[16..18], &[0x03, 0x02]);
        match Cotp::parse(&bs).unwrap() {
            Cotp::Connection(parsed) => assert_eq!(parsed, cr),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn connect_confirm_from_wire() {
        // CC payload of the handshake sample frame (without TPKT)
        let bs = [
            0x11, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00, 0xC0, 0x01, 0x0A, 0xC1, 0x02, 0x01, 0x00,
            0xC2, 0x02, 0x01, 0x02,
        ];
        let parsed = Cotp::parse(&bs).unwrap();
        assert_eq!(parsed.pdu_type(), CotpType::ConnectConfirm);
    }
}
