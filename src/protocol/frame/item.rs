use super::{
    super::error::{Error, Result},
    types::{Area, SyntaxId, VariableType},
    WireDecode, WireEncode,
};
use bytes::BufMut;

pub const STANDARD_ITEM_LEN: usize = 12;
pub const NCK_ITEM_LEN: usize = 10;

/// Request item of a read/write parameter, distinguished by the syntax id at
/// offset 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestItem {
    Standard(StandardItem),
    Nck(NckItem),
}

impl RequestItem {
    pub(crate) fn parse_at(input: &[u8], offset: usize) -> Result<Self> {
        if input.len() < offset + 3 {
            return Err(Error::RequestItemInvalid);
        }
        match SyntaxId::try_from(input[offset + 2]) {
            Ok(SyntaxId::Any) => Ok(RequestItem::Standard(StandardItem::parse(
                &input[offset..],
            )?)),
            Ok(SyntaxId::Nck) => Ok(RequestItem::Nck(NckItem::parse(&input[offset..])?)),
            _ => Err(Error::RequestItemInvalid),
        }
    }
}

impl WireEncode for RequestItem {
    fn encoded_len(&self) -> usize {
        match self {
            RequestItem::Standard(i) => i.encoded_len(),
            RequestItem::Nck(i) => i.encoded_len(),
        }
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        match self {
            RequestItem::Standard(i) => i.encode_to(dst),
            RequestItem::Nck(i) => i.encode_to(dst),
        }
    }
}

/// Any-syntax (0x10) request item addressing a span of PLC memory.
///
/// The last three bytes pack the byte address in the upper 21 bits and the
/// bit address in the lower 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardItem {
    /// Always 0x12 for read/write messages
    pub specification_type: u8,
    /// Length of the rest of the item, 0x0A
    pub length_of_following: u8,
    pub variable_type: VariableType,
    /// Element count
    pub count: u16,
    /// 0 unless the area is a data block
    pub db_number: u16,
    pub area: Area,
    pub byte_address: u32,
    pub bit_address: u8,
}

impl StandardItem {
    pub fn new(
        area: Area,
        db_number: u16,
        variable_type: VariableType,
        byte_address: u32,
        bit_address: u8,
        count: u16,
    ) -> Self {
        StandardItem {
            specification_type: 0x12,
            length_of_following: 0x0A,
            variable_type,
            count,
            db_number,
            area,
            byte_address,
            bit_address,
        }
    }
}

impl WireEncode for StandardItem {
    fn encoded_len(&self) -> usize {
        STANDARD_ITEM_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.specification_type);
        dst.put_u8(self.length_of_following);
        dst.put_u8(SyntaxId::Any as u8);
        dst.put_u8(self.variable_type as u8);
        dst.put_u16(self.count);
        dst.put_u16(self.db_number);
        dst.put_u8(self.area as u8);
        let packed = (self.byte_address << 3) | (self.bit_address as u32 & 0x07);
        dst.put_u8(((packed >> 16) & 0xFF) as u8);
        dst.put_u8(((packed >> 8) & 0xFF) as u8);
        dst.put_u8((packed & 0xFF) as u8);
    }
}

impl WireDecode for StandardItem {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < STANDARD_ITEM_LEN {
            return Err(Error::ModelFromBytes {
                what: "StandardItem",
                min: STANDARD_ITEM_LEN,
            });
        }
        let packed = u32::from_be_bytes([0x00, input[9], input[10], input[11]]);
        Ok(StandardItem {
            specification_type: input[0],
            length_of_following: input[1],
            variable_type: VariableType::try_from(input[3])?,
            count: u16::from_be_bytes([input[4], input[5]]),
            db_number: u16::from_be_bytes([input[6], input[7]]),
            area: Area::try_from(input[8])?,
            byte_address: packed >> 3,
            bit_address: (packed & 0x07) as u8,
        })
    }
}

/// Sinumerik NCK request item (syntax id 0x82).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NckItem {
    pub specification_type: u8,
    pub length_of_following: u8,
    /// NCK area, high 3 bits of byte 3
    pub area: u8,
    /// Channel unit, low 5 bits of byte 3
    pub unit: u8,
    pub column: u16,
    pub line: u16,
    /// NCK module selector
    pub module: u8,
    pub line_count: u8,
}

impl NckItem {
    pub fn new(area: u8, unit: u8, column: u16, line: u16, module: u8, line_count: u8) -> Self {
        NckItem {
            specification_type: 0x12,
            length_of_following: 0x08,
            area,
            unit,
            column,
            line,
            module,
            line_count,
        }
    }
}

impl WireEncode for NckItem {
    fn encoded_len(&self) -> usize {
        NCK_ITEM_LEN
    }

    fn encode_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.specification_type);
        dst.put_u8(self.length_of_following);
        dst.put_u8(SyntaxId::Nck as u8);
        dst.put_u8(((self.area << 5) & 0xE0) | (self.unit & 0x1F));
        dst.put_u16(self.column);
        dst.put_u16(self.line);
        dst.put_u8(self.module);
        dst.put_u8(self.line_count);
    }
}

impl WireDecode for NckItem {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < NCK_ITEM_LEN {
            return Err(Error::ModelFromBytes {
                what: "NckItem",
                min: NCK_ITEM_LEN,
            });
        }
        Ok(NckItem {
            specification_type: input[0],
            length_of_following: input[1],
            area: (input[3] & 0xE0) >> 5,
            unit: input[3] & 0x1F,
            column: u16::from_be_bytes([input[4], input[5]]),
            line: u16::from_be_bytes([input[6], input[7]]),
            module: input[8],
            line_count: input[9],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_item_packs_bit_address() {
        // DB1.X0.0 as in a read-bit request: area 0x84, db 1, bit, count 1
        let item = StandardItem::new(Area::DataBlocks, 1, VariableType::Bit, 0, 0, 1);
        let bs = item.to_bytes();
        assert_eq!(
            bs.as_ref(),
            &[0x12, 0x0A, 0x10, 0x01, 0x00, 0x01, 0x00, 0x01, 0x84, 0x00, 0x00, 0x00]
        );

        // byte 4 bit 0 packs to 0x000020
        let item = StandardItem::new(Area::DataBlocks, 1, VariableType::Byte, 4, 0, 2);
        let bs = item.to_bytes();
        assert_eq!(&bs[9..12], &[0x00, 0x00, 0x20]);
        assert_eq!(StandardItem::parse(&bs).unwrap(), item);
    }

    #[test]
    fn standard_item_round_trips_high_addresses() {
        let item = StandardItem::new(Area::Flags, 0, VariableType::Bit, 2_097_151, 7, 1);
        assert_eq!(StandardItem::parse(&item.to_bytes()).unwrap(), item);
    }

    #[test]
    fn nck_item_round_trip() {
        let item = NckItem::new(0x02, 0x01, 0x0001, 0x0002, 0x7F, 1);
        let bs = item.to_bytes();
        assert_eq!(bs.len(), NCK_ITEM_LEN);
        assert_eq!(bs[2], 0x82);
        match RequestItem::parse_at(&bs, 0).unwrap() {
            RequestItem::Nck(parsed) => assert_eq!(parsed, item),
            other => panic!("unexpected {other:?}"),
        }
    }
}
