use super::{
    super::error::{Error, Result},
    WireDecode, WireEncode,
};
use bytes::BufMut;

/// TPKT (RFC1006) header, always 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tpkt {
    /// Always 0x03 for RFC1006
    pub version: u8,
    /// Reserved, always 0x00
    pub reserved: u8,
    /// Total frame length including this 4-byte header
    pub length: u16,
}

pub const TPKT_LEN: usize = 4;

impl Tpkt {
    pub fn new() -> Self {
        Tpkt {
            version: 0x03,
            reserved: 0x00,
            length: 0,
        }
    }
}

impl Default for Tpkt {
    fn default() -> Self {
        Self::new()
    }
}

impl WireEncode for Tpkt {
    fn encoded_len(&self) -> usize {
        TPKT_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.version);
        dst.put_u8(self.reserved);
        dst.put_u16(self.length);
    }
}

impl WireDecode for Tpkt {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < TPKT_LEN {
            return Err(Error::ModelFromBytes {
                what: "TPKT",
                min: TPKT_LEN,
            });
        }
        if input[0] != 0x03 {
            return Err(Error::TypeNotResolved {
                what: "tpkt version",
                actual: input[0],
            });
        }
        Ok(Tpkt {
            version: input[0],
            reserved: input[1],
            length: u16::from_be_bytes([input[2], input[3]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut t = Tpkt::new();
        t.length = 0x0116;
        let bs = t.to_bytes();
        assert_eq!(bs.as_ref(), &[0x03, 0x00, 0x01, 0x16]);
        assert_eq!(Tpkt::parse(&bs).unwrap(), t);
    }

    #[test]
    fn rejects_wrong_version() {
        assert!(Tpkt::parse(&[0x02, 0x00, 0x00, 0x04]).is_err());
        assert!(Tpkt::parse(&[0x03, 0x00, 0x00]).is_err());
    }
}
