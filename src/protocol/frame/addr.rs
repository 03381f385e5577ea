use super::{
    super::error::{Error, Result},
    item::StandardItem,
    types::{Area, VariableType},
};

// Longest-first to avoid prefix shadowing (e.g. DI vs D, DATETIME vs DATE vs DT)
const TOKENS: &[(&str, VariableType)] = &[
    ("DATETIMELONG", VariableType::DateTimeLong),
    ("DATETIME", VariableType::DateTime),
    ("WSTRING", VariableType::WString),
    ("STRING", VariableType::String),
    ("STIME", VariableType::S5Time),
    ("DWORD", VariableType::DWord),
    ("DINT", VariableType::DInt),
    ("CHAR", VariableType::Char),
    ("BYTE", VariableType::Byte),
    ("WORD", VariableType::Word),
    ("TIME", VariableType::Time),
    ("DATE", VariableType::Date),
    ("REAL", VariableType::Real),
    ("TOD", VariableType::TimeOfDay),
    ("BIT", VariableType::Bit),
    ("DTL", VariableType::DateTimeLong),
    ("INT", VariableType::Int),
    ("DW", VariableType::DWord),
    ("DT", VariableType::DateTime),
    ("DI", VariableType::DInt),
    ("ST", VariableType::S5Time),
    ("WS", VariableType::WString),
    ("B", VariableType::Byte),
    ("C", VariableType::Char),
    ("D", VariableType::Date),
    ("I", VariableType::Int),
    ("R", VariableType::Real),
    ("S", VariableType::String),
    ("T", VariableType::Time),
    ("W", VariableType::Word),
    ("X", VariableType::Bit),
];

/// Parse a textual tag address into a standard request item with `count = 1`.
///
/// Grammar: the first character selects the area (`I`, `Q`, `M`, `V`, `T`,
/// `C`, or `DB<n>`), then a type token with the byte offset appended, and a
/// trailing `.bit` segment which is valid only for bit access:
/// `DB1.X260.0`, `DB1.WS308`, `I0.3`, `MW10`, `C0`, `T0`.
pub fn parse_address(address: &str) -> Result<StandardItem> {
    if address.is_empty() {
        return Err(Error::AddressEmpty);
    }
    let normalized: String = address
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if normalized.is_empty() {
        return Err(Error::AddressEmpty);
    }

    let invalid = || Error::AddressInvalid(address.to_string());

    if let Some(rest) = normalized.strip_prefix("DB") {
        let (db_text, tail) = rest.split_once('.').ok_or_else(invalid)?;
        let db_number = db_text.parse::<u16>().map_err(|_| invalid())?;
        let (variable_type, byte_address, bit_address) = parse_tail(tail).ok_or_else(invalid)?;
        return Ok(StandardItem::new(
            Area::DataBlocks,
            db_number,
            variable_type,
            byte_address,
            bit_address,
            1,
        ));
    }

    let mut chars = normalized.chars();
    let first = chars.next().ok_or(Error::AddressEmpty)?;
    let rest = chars.as_str();
    match first {
        // Timers and counters address the whole field
        'T' if rest.chars().all(|c| c.is_ascii_digit()) && !rest.is_empty() => {
            let index = rest.parse::<u32>().map_err(|_| invalid())?;
            Ok(StandardItem::new(
                Area::Timers,
                0,
                VariableType::Timer,
                index,
                0,
                1,
            ))
        }
        'C' if rest.chars().all(|c| c.is_ascii_digit()) && !rest.is_empty() => {
            let index = rest.parse::<u32>().map_err(|_| invalid())?;
            Ok(StandardItem::new(
                Area::Counters,
                0,
                VariableType::Counter,
                index,
                0,
                1,
            ))
        }
        'I' | 'Q' | 'M' | 'V' => {
            let area = match first {
                'I' => Area::Inputs,
                'Q' => Area::Outputs,
                'M' => Area::Flags,
                _ => Area::DataBlocks,
            };
            let db_number = if first == 'V' { 1 } else { 0 };
            let (variable_type, byte_address, bit_address) = parse_tail(rest).ok_or_else(invalid)?;
            Ok(StandardItem::new(
                area,
                db_number,
                variable_type,
                byte_address,
                bit_address,
                1,
            ))
        }
        _ => Err(invalid()),
    }
}

/// Parse `<type><byte>[.<bit>]`. Without a type token, `byte.bit` is bit
/// access and a plain number is byte access. The bit segment is accepted only
/// when the variable type is Bit.
fn parse_tail(tail: &str) -> Option<(VariableType, u32, u8)> {
    let (head, bit_part) = match tail.split_once('.') {
        Some((head, bit)) => (head, Some(bit)),
        None => (tail, None),
    };

    let (variable_type, digits) = match match_type_token(head) {
        Some((vt, digits)) => (vt, digits),
        None => {
            let vt = if bit_part.is_some() {
                VariableType::Bit
            } else {
                VariableType::Byte
            };
            (vt, head)
        }
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let byte_address = digits.parse::<u32>().ok()?;

    match bit_part {
        Some(bit) if variable_type == VariableType::Bit => {
            let bit_address = bit.parse::<u8>().ok()?;
            if bit_address > 7 {
                return None;
            }
            Some((variable_type, byte_address, bit_address))
        }
        // a trailing segment on a non-bit type is malformed
        Some(_) => None,
        None if variable_type == VariableType::Bit => None,
        None => Some((variable_type, byte_address, 0)),
    }
}

fn match_type_token(s: &str) -> Option<(VariableType, &str)> {
    for (token, vt) in TOKENS {
        if let Some(rest) = s.strip_prefix(token) {
            return Some((*vt, rest));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(input: &str) -> StandardItem {
        match parse_address(input) {
            Ok(item) => item,
            Err(e) => panic!("parse_address failed for '{input}': {e:?}"),
        }
    }

    #[test]
    fn parses_db_addresses() {
        let assert_addr = |s: &str, vt: VariableType, db: u16, byte: u32, bit: u8| {
            let a = addr(s);
            assert_eq!(a.area, Area::DataBlocks, "area for {s}");
            assert_eq!(a.variable_type, vt, "type for {s}");
            assert_eq!(a.db_number, db, "db for {s}");
            assert_eq!(a.byte_address, byte, "byte for {s}");
            assert_eq!(a.bit_address, bit, "bit for {s}");
            assert_eq!(a.count, 1, "count for {s}");
        };

        assert_addr("DB1.X0.0", VariableType::Bit, 1, 0, 0);
        assert_addr("DB1.X260.0", VariableType::Bit, 1, 260, 0);
        assert_addr("DB1.BIT260.3", VariableType::Bit, 1, 260, 3);
        assert_addr("DB1.B1", VariableType::Byte, 1, 1, 0);
        assert_addr("DB1.BYTE1", VariableType::Byte, 1, 1, 0);
        assert_addr("DB2.C8", VariableType::Char, 2, 8, 0);
        assert_addr("DB1.W2", VariableType::Word, 1, 2, 0);
        assert_addr("DB1.DW4", VariableType::DWord, 1, 4, 0);
        assert_addr("DB1.I4", VariableType::Int, 1, 4, 0);
        assert_addr("DB1.DI8", VariableType::DInt, 1, 8, 0);
        assert_addr("DB1.R16", VariableType::Real, 1, 16, 0);
        assert_addr("DB1.D20", VariableType::Date, 1, 20, 0);
        assert_addr("DB1.DT24", VariableType::DateTime, 1, 24, 0);
        assert_addr("DB1.DTL32", VariableType::DateTimeLong, 1, 32, 0);
        assert_addr("DB1.T44", VariableType::Time, 1, 44, 0);
        assert_addr("DB1.ST48", VariableType::S5Time, 1, 48, 0);
        assert_addr("DB1.TOD52", VariableType::TimeOfDay, 1, 52, 0);
        assert_addr("DB1.S100", VariableType::String, 1, 100, 0);
        assert_addr("DB1.WS308", VariableType::WString, 1, 308, 0);
        assert_addr("DB1.WSTRING308", VariableType::WString, 1, 308, 0);
        assert_addr("db1.x0.1", VariableType::Bit, 1, 0, 1);
        assert_addr(" DB1 . B1 ", VariableType::Byte, 1, 1, 0);
    }

    #[test]
    fn parses_short_areas() {
        let a = addr("I0.3");
        assert_eq!(a.area, Area::Inputs);
        assert_eq!(a.variable_type, VariableType::Bit);
        assert_eq!(a.byte_address, 0);
        assert_eq!(a.bit_address, 3);

        let a = addr("Q1.7");
        assert_eq!(a.area, Area::Outputs);
        assert_eq!(a.bit_address, 7);

        let a = addr("MW10");
        assert_eq!(a.area, Area::Flags);
        assert_eq!(a.variable_type, VariableType::Word);
        assert_eq!(a.byte_address, 10);

        let a = addr("M5");
        assert_eq!(a.variable_type, VariableType::Byte);
        assert_eq!(a.byte_address, 5);

        let a = addr("VW100");
        assert_eq!(a.area, Area::DataBlocks);
        assert_eq!(a.db_number, 1);
        assert_eq!(a.variable_type, VariableType::Word);
        assert_eq!(a.byte_address, 100);
    }

    #[test]
    fn parses_timers_and_counters() {
        let a = addr("C0");
        assert_eq!(a.area, Area::Counters);
        assert_eq!(a.variable_type, VariableType::Counter);
        assert_eq!(a.byte_address, 0);

        let a = addr("T3");
        assert_eq!(a.area, Area::Timers);
        assert_eq!(a.variable_type, VariableType::Timer);
        assert_eq!(a.byte_address, 3);
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(matches!(parse_address(""), Err(Error::AddressEmpty)));
        assert!(matches!(parse_address("   "), Err(Error::AddressEmpty)));
        assert!(parse_address("Z0").is_err());
        assert!(parse_address("DB1").is_err());
        assert!(parse_address("DB1.").is_err());
        assert!(parse_address("DB1.X0").is_err()); // bit access needs a bit segment
        assert!(parse_address("DB1.I0.1").is_err()); // bit segment on a non-bit type
        assert!(parse_address("I0.8").is_err()); // bit out of range
        assert!(parse_address("DBX.B1").is_err());
    }
}
