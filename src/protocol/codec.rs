use super::frame::{Pdu, WireEncode};
use bytes::BytesMut;
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Framed codec for TPKT-delimited S7 PDUs.
///
/// The decoder waits for a complete TPKT frame before parsing; a frame that
/// cannot be parsed poisons the stream and surfaces as an IO error, which the
/// session treats as a lost transport.
#[derive(Debug, Default, Clone)]
pub struct Codec;

impl Decoder for Codec {
    type Item = Pdu;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }
        if src[0] != 0x03 || src[1] != 0x00 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid TPKT header",
            ));
        }
        let length = u16::from_be_bytes([src[2], src[3]]) as usize;
        if length < 7 {
            // shorter than TPKT + the smallest COTP TPDU
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid TPKT length",
            ));
        }
        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }
        let frame = src.split_to(length);
        let pdu = Pdu::parse(&frame)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        Ok(Some(pdu))
    }
}

impl Encoder<Pdu> for Codec {
    type Error = io::Error;

    fn encode(&mut self, item: Pdu, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.encoded_len());
        item.encode_to(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::frame::CotpType;
    use super::*;

    #[test]
    fn decodes_only_complete_frames() {
        let mut codec = Codec;
        let pdu = Pdu::connect_request(0x0100, 0x0300);
        let mut wire = BytesMut::new();
        codec.encode(pdu.clone(), &mut wire).unwrap();

        // feed in two halves
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&wire[..10]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&wire[10..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            decoded.cotp.as_ref().unwrap().pdu_type(),
            CotpType::ConnectRequest
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_non_tpkt_bytes() {
        let mut codec = Codec;
        let mut buf = BytesMut::from(&[0x47, 0x45, 0x54, 0x20][..]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
