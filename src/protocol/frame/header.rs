use super::{
    super::error::{Error, Result},
    types::MessageType,
    WireDecode, WireEncode,
};
use bytes::BufMut;

pub const REQUEST_HEADER_LEN: usize = 10;
pub const ACK_HEADER_LEN: usize = 12;

/// S7 header; Job and UserData use the 10-byte request form, Ack and AckData
/// the 12-byte form with an error class and code appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    Request(RequestHeader),
    Ack(AckHeader),
}

impl Header {
    pub fn message_type(&self) -> MessageType {
        match self {
            Header::Request(h) => h.message_type,
            Header::Ack(h) => h.message_type,
        }
    }

    pub fn pdu_reference(&self) -> u16 {
        match self {
            Header::Request(h) => h.pdu_reference,
            Header::Ack(h) => h.pdu_reference,
        }
    }

    pub fn parameter_length(&self) -> u16 {
        match self {
            Header::Request(h) => h.parameter_length,
            Header::Ack(h) => h.parameter_length,
        }
    }

    pub fn data_length(&self) -> u16 {
        match self {
            Header::Request(h) => h.data_length,
            Header::Ack(h) => h.data_length,
        }
    }

    pub fn set_parameter_length(&mut self, len: u16) {
        match self {
            Header::Request(h) => h.parameter_length = len,
            Header::Ack(h) => h.parameter_length = len,
        }
    }

    pub fn set_data_length(&mut self, len: u16) {
        match self {
            Header::Request(h) => h.data_length = len,
            Header::Ack(h) => h.data_length = len,
        }
    }
}

impl WireEncode for Header {
    fn encoded_len(&self) -> usize {
        match self {
            Header::Request(h) => h.encoded_len(),
            Header::Ack(h) => h.encoded_len(),
        }
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        match self {
            Header::Request(h) => h.encode_to(dst),
            Header::Ack(h) => h.encode_to(dst),
        }
    }
}

impl WireDecode for Header {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < 2 {
            return Err(Error::ModelFromBytes {
                what: "Header",
                min: 2,
            });
        }
        match MessageType::try_from(input[1])? {
            MessageType::Job | MessageType::UserData => {
                Ok(Header::Request(RequestHeader::parse(input)?))
            }
            MessageType::Ack | MessageType::AckData => Ok(Header::Ack(AckHeader::parse(input)?)),
        }
    }
}

/// 10-byte header of Job and UserData messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Always 0x32
    pub protocol_id: u8,
    pub message_type: MessageType,
    pub reserved: u16,
    /// Generated by the master, incremented per transmission, big-endian
    pub pdu_reference: u16,
    pub parameter_length: u16,
    pub data_length: u16,
}

impl RequestHeader {
    pub fn job(pdu_reference: u16) -> Self {
        RequestHeader {
            protocol_id: 0x32,
            message_type: MessageType::Job,
            reserved: 0x0000,
            pdu_reference,
            parameter_length: 0,
            data_length: 0,
        }
    }

    pub fn user_data(pdu_reference: u16) -> Self {
        RequestHeader {
            message_type: MessageType::UserData,
            ..Self::job(pdu_reference)
        }
    }
}

impl WireEncode for RequestHeader {
    fn encoded_len(&self) -> usize {
        REQUEST_HEADER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.protocol_id);
        dst.put_u8(self.message_type as u8);
        dst.put_u16(self.reserved);
        dst.put_u16(self.pdu_reference);
        dst.put_u16(self.parameter_length);
        dst.put_u16(self.data_length);
    }
}

impl WireDecode for RequestHeader {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < REQUEST_HEADER_LEN {
            return Err(Error::ModelFromBytes {
                what: "RequestHeader",
                min: REQUEST_HEADER_LEN,
            });
        }
        Ok(RequestHeader {
            protocol_id: input[0],
            message_type: MessageType::try_from(input[1])?,
            reserved: u16::from_be_bytes([input[2], input[3]]),
            pdu_reference: u16::from_be_bytes([input[4], input[5]]),
            parameter_length: u16::from_be_bytes([input[6], input[7]]),
            data_length: u16::from_be_bytes([input[8], input[9]]),
        })
    }
}

/// 12-byte header of Ack and AckData messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckHeader {
    pub protocol_id: u8,
    pub message_type: MessageType,
    pub reserved: u16,
    pub pdu_reference: u16,
    pub parameter_length: u16,
    pub data_length: u16,
    pub error_class: u8,
    pub error_code: u8,
}

impl AckHeader {
    /// The effective 16-bit error code is the class byte followed by the code
    /// byte; the description tables are keyed on this combination.
    pub fn combined_error_code(&self) -> u16 {
        ((self.error_class as u16) << 8) | self.error_code as u16
    }
}

impl WireEncode for AckHeader {
    fn encoded_len(&self) -> usize {
        ACK_HEADER_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.protocol_id);
        dst.put_u8(self.message_type as u8);
        dst.put_u16(self.reserved);
        dst.put_u16(self.pdu_reference);
        dst.put_u16(self.parameter_length);
        dst.put_u16(self.data_length);
        dst.put_u8(self.error_class);
        dst.put_u8(self.error_code);
    }
}

impl WireDecode for AckHeader {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < ACK_HEADER_LEN {
            return Err(Error::ModelFromBytes {
                what: "AckHeader",
                min: ACK_HEADER_LEN,
            });
        }
        Ok(AckHeader {
            protocol_id: input[0],
            message_type: MessageType::try_from(input[1])?,
            reserved: u16::from_be_bytes([input[2], input[3]]),
            pdu_reference: u16::from_be_bytes([input[4], input[5]]),
            parameter_length: u16::from_be_bytes([input[6], input[7]]),
            data_length: u16::from_be_bytes([input[8], input[9]]),
            error_class: input[10],
            error_code: input[11],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_header_round_trip() {
        let mut h = RequestHeader::job(0x0102);
        h.parameter_length = 14;
        let bs = h.to_bytes();
        assert_eq!(
            bs.as_ref(),
            &[0x32, 0x01, 0x00, 0x00, 0x01, 0x02, 0x00, 0x0E, 0x00, 0x00]
        );
        match Header::parse(&bs).unwrap() {
            Header::Request(parsed) => assert_eq!(parsed, h),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ack_header_carries_combined_error_code() {
        let bs = [
            0x32, 0x03, 0x00, 0x00, 0x00, 0x05, 0x00, 0x02, 0x00, 0x00, 0x85, 0x00,
        ];
        match Header::parse(&bs).unwrap() {
            Header::Ack(h) => {
                assert_eq!(h.error_class, 0x85);
                assert_eq!(h.combined_error_code(), 0x8500);
                assert_eq!(h.to_bytes().as_ref(), &bs);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
