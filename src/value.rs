use crate::config::PlcKind;
use crate::protocol::error::{Error, Result};
use crate::protocol::frame::VariableType;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// A typed S7 value. All multi-byte encodings are big-endian on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bit(bool),
    Byte(u8),
    Char(i8),
    Word(u16),
    Int(i16),
    DWord(u32),
    DInt(i32),
    Real(f32),
    /// IEC TIME, signed milliseconds
    Time(Duration),
    /// Days since 1990-01-01
    Date(NaiveDate),
    /// Milliseconds since midnight
    TimeOfDay(NaiveTime),
    /// DATE_AND_TIME, 8 bytes BCD
    DateTime(NaiveDateTime),
    /// DTL, 12 bytes
    DateTimeLong(NaiveDateTime),
    /// 2-byte BCD with a 2-bit time base
    S5Time(Duration),
    Counter(u16),
    /// Same wire layout as S5Time
    Timer(Duration),
    /// Latin-1 string with declared-max/actual-length prefixes
    String(String),
    /// UTF-16BE string with u16 prefixes
    WString(String),
}

impl Value {
    /// Decode raw item bytes according to the request's variable type.
    ///
    /// The slice is expected to be exactly what a read of that type returns,
    /// including string length prefixes. The PLC kind selects the string
    /// prefix width.
    pub fn from_bytes(variable_type: VariableType, bytes: &[u8], plc: PlcKind) -> Result<Value> {
        let need = |min: usize, what: &'static str| -> Result<()> {
            if bytes.len() < min {
                Err(Error::ModelFromBytes { what, min })
            } else {
                Ok(())
            }
        };
        Ok(match variable_type {
            VariableType::Bit => {
                need(1, "Bit")?;
                Value::Bit(bytes[0] & 0x01 != 0)
            }
            VariableType::Byte => {
                need(1, "Byte")?;
                Value::Byte(bytes[0])
            }
            VariableType::Char => {
                need(1, "Char")?;
                Value::Char(bytes[0] as i8)
            }
            VariableType::Word => {
                need(2, "Word")?;
                Value::Word(u16::from_be_bytes([bytes[0], bytes[1]]))
            }
            VariableType::Int => {
                need(2, "Int")?;
                Value::Int(i16::from_be_bytes([bytes[0], bytes[1]]))
            }
            VariableType::DWord => {
                need(4, "DWord")?;
                Value::DWord(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            VariableType::DInt => {
                need(4, "DInt")?;
                Value::DInt(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            VariableType::Real => {
                need(4, "Real")?;
                Value::Real(f32::from_bits(u32::from_be_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ])))
            }
            VariableType::Time => {
                need(4, "Time")?;
                let ms = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                Value::Time(Duration::milliseconds(ms as i64))
            }
            VariableType::Date => {
                need(2, "Date")?;
                let days = u16::from_be_bytes([bytes[0], bytes[1]]);
                let base = NaiveDate::from_ymd_opt(1990, 1, 1).ok_or(Error::ResponseInvalid)?;
                Value::Date(
                    base.checked_add_signed(Duration::days(days as i64))
                        .ok_or(Error::ResponseInvalid)?,
                )
            }
            VariableType::TimeOfDay => {
                need(4, "TimeOfDay")?;
                let ms = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                Value::TimeOfDay(
                    NaiveTime::from_num_seconds_from_midnight_opt(
                        ms / 1000,
                        (ms % 1000) * 1_000_000,
                    )
                    .ok_or(Error::ResponseInvalid)?,
                )
            }
            VariableType::DateTime => {
                need(8, "DateTime")?;
                let year = decode_bcd(bytes[0]) as i32;
                let year = if year < 90 { 2000 + year } else { 1900 + year };
                let date = NaiveDate::from_ymd_opt(
                    year,
                    decode_bcd(bytes[1]) as u32,
                    decode_bcd(bytes[2]) as u32,
                )
                .ok_or(Error::ResponseInvalid)?;
                Value::DateTime(
                    date.and_hms_opt(
                        decode_bcd(bytes[3]) as u32,
                        decode_bcd(bytes[4]) as u32,
                        decode_bcd(bytes[5]) as u32,
                    )
                    .ok_or(Error::ResponseInvalid)?,
                )
            }
            VariableType::DateTimeLong => {
                need(12, "DateTimeLong")?;
                let year = u16::from_be_bytes([bytes[0], bytes[1]]) as i32;
                let date =
                    NaiveDate::from_ymd_opt(year, bytes[2] as u32, bytes[3] as u32)
                        .ok_or(Error::ResponseInvalid)?;
                let nanos = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
                Value::DateTimeLong(
                    date.and_hms_nano_opt(
                        bytes[5] as u32,
                        bytes[6] as u32,
                        bytes[7] as u32,
                        nanos,
                    )
                    .ok_or(Error::ResponseInvalid)?,
                )
            }
            VariableType::S5Time => {
                need(2, "S5Time")?;
                Value::S5Time(s5time_to_duration(u16::from_be_bytes([bytes[0], bytes[1]])))
            }
            VariableType::Counter => {
                need(2, "Counter")?;
                Value::Counter(u16::from_be_bytes([bytes[0], bytes[1]]))
            }
            VariableType::Timer => {
                need(2, "Timer")?;
                Value::Timer(s5time_to_duration(u16::from_be_bytes([bytes[0], bytes[1]])))
            }
            VariableType::String => {
                let prefix = string_prefix_len(plc);
                need(prefix, "String")?;
                Value::String(latin1_to_string(&bytes[prefix..]))
            }
            VariableType::WString => {
                let prefix = wstring_prefix_len(plc);
                need(prefix, "WString")?;
                let units = match plc {
                    PlcKind::S200Smart => bytes[1] as usize,
                    _ => u16::from_be_bytes([bytes[2], bytes[3]]) as usize,
                };
                need(prefix + units * 2, "WString")?;
                let mut code_units = Vec::with_capacity(units);
                for i in 0..units {
                    code_units.push(u16::from_be_bytes([
                        bytes[prefix + i * 2],
                        bytes[prefix + i * 2 + 1],
                    ]));
                }
                Value::WString(String::from_utf16_lossy(&code_units))
            }
        })
    }

    /// Encode the value into the raw bytes a write expects. The PLC kind and
    /// negotiated PDU length only influence the string prefixes.
    pub fn to_bytes(&self, plc: PlcKind, pdu_length: u16) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Value::Bit(v) => buf.put_u8(*v as u8),
            Value::Byte(v) => buf.put_u8(*v),
            Value::Char(v) => buf.put_u8(*v as u8),
            Value::Word(v) => buf.put_u16(*v),
            Value::Int(v) => buf.put_i16(*v),
            Value::DWord(v) => buf.put_u32(*v),
            Value::DInt(v) => buf.put_i32(*v),
            Value::Real(v) => buf.put_u32(v.to_bits()),
            Value::Time(d) => buf.put_i32(d.num_milliseconds() as i32),
            Value::Date(d) => {
                let base = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or(NaiveDate::MIN);
                buf.put_u16((*d - base).num_days().clamp(0, u16::MAX as i64) as u16);
            }
            Value::TimeOfDay(t) => {
                let ms = t.num_seconds_from_midnight() * 1000 + t.nanosecond() / 1_000_000;
                buf.put_u32(ms);
            }
            Value::DateTime(t) => {
                let year = t.year();
                let yy = if year < 2000 { year - 1900 } else { year - 2000 };
                buf.put_u8(encode_bcd(yy as u8));
                buf.put_u8(encode_bcd(t.month() as u8));
                buf.put_u8(encode_bcd(t.day() as u8));
                buf.put_u8(encode_bcd(t.hour() as u8));
                buf.put_u8(encode_bcd(t.minute() as u8));
                buf.put_u8(encode_bcd(t.second() as u8));
                buf.put_u8(0x00);
                buf.put_u8(0x00);
            }
            Value::DateTimeLong(t) => {
                buf.put_u16(t.year() as u16);
                buf.put_u8(t.month() as u8);
                buf.put_u8(t.day() as u8);
                buf.put_u8(t.weekday().number_from_sunday() as u8);
                buf.put_u8(t.hour() as u8);
                buf.put_u8(t.minute() as u8);
                buf.put_u8(t.second() as u8);
                buf.put_u32(t.nanosecond());
            }
            Value::S5Time(d) | Value::Timer(d) => buf.put_u16(s5time_from_duration(*d)),
            Value::Counter(v) => buf.put_u16(*v),
            Value::String(s) => {
                let max = string_max_length(pdu_length);
                let len = s.len().min(max as usize);
                if plc != PlcKind::S200Smart {
                    buf.put_u8(max);
                }
                buf.put_u8(len as u8);
                for c in s.chars().take(len) {
                    buf.put_u8(c as u8);
                }
            }
            Value::WString(s) => {
                let max = string_max_length(pdu_length);
                let units: Vec<u16> = s.encode_utf16().collect();
                let len = units.len().min(max as usize);
                if plc == PlcKind::S200Smart {
                    buf.put_u8(max);
                    buf.put_u8(len as u8);
                } else {
                    buf.put_u16(max as u16);
                    buf.put_u16(len as u16);
                }
                for unit in units.into_iter().take(len) {
                    buf.put_u16(unit);
                }
            }
        }
        buf.freeze()
    }
}

/// Raw bytes read from the PLC, still tagged with the requested type.
#[derive(Debug, Clone)]
pub struct RawValue {
    pub data: Bytes,
    pub variable_type: VariableType,
    pub(crate) plc: PlcKind,
}

impl RawValue {
    pub fn parse(&self) -> Result<Value> {
        Value::from_bytes(self.variable_type, &self.data, self.plc)
    }
}

/// Length prefix bytes in front of a String payload.
pub(crate) fn string_prefix_len(plc: PlcKind) -> usize {
    match plc {
        PlcKind::S200Smart => 1,
        _ => 2,
    }
}

/// Length prefix bytes in front of a WString payload.
pub(crate) fn wstring_prefix_len(plc: PlcKind) -> usize {
    match plc {
        PlcKind::S200Smart => 2,
        _ => 4,
    }
}

/// Declared maximum string length for the negotiated PDU size.
pub(crate) fn string_max_length(pdu_length: u16) -> u8 {
    if pdu_length >= 480 {
        254
    } else {
        210
    }
}

pub(crate) fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub(crate) fn encode_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

pub(crate) fn decode_bcd(b: u8) -> u8 {
    (b >> 4) * 10 + (b & 0x0F)
}

/// Decode the 2-byte S5TIME layout: 2-bit time base in bits 12-13 and three
/// BCD digits of count.
pub(crate) fn s5time_to_duration(raw: u16) -> Duration {
    let count = decode_bcd(((raw >> 8) & 0x0F) as u8) as i64 * 100 + decode_bcd((raw & 0xFF) as u8) as i64;
    let base_ms = match (raw >> 12) & 0x03 {
        0 => 10,
        1 => 100,
        2 => 1000,
        _ => 10000,
    };
    Duration::milliseconds(count * base_ms)
}

/// Encode a duration into S5TIME using the smallest time base that keeps the
/// count below 1000.
pub(crate) fn s5time_from_duration(d: Duration) -> u16 {
    let total_ms = d.num_milliseconds().max(0) as u64;
    const BASES: &[(u16, u64)] = &[(0, 10), (1, 100), (2, 1000), (3, 10_000)];
    let mut selected = BASES[BASES.len() - 1];
    for &(code, step) in BASES {
        if total_ms / step <= 999 {
            selected = (code, step);
            break;
        }
    }
    let count = (total_ms / selected.1).min(999) as u16;
    let bcd = (encode_bcd((count / 100) as u8) as u16) << 8 | encode_bcd((count % 100) as u8) as u16;
    (selected.0 << 12) | (bcd & 0x0FFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLC: PlcKind = PlcKind::S1500;

    fn round_trip(value: Value, variable_type: VariableType) {
        let bytes = value.to_bytes(PLC, 480);
        let decoded = Value::from_bytes(variable_type, &bytes, PLC).unwrap();
        assert_eq!(decoded, value, "round trip for {variable_type:?}");
    }

    #[test]
    fn scalar_round_trips() {
        round_trip(Value::Bit(true), VariableType::Bit);
        round_trip(Value::Bit(false), VariableType::Bit);
        round_trip(Value::Byte(0xA5), VariableType::Byte);
        round_trip(Value::Char(-3), VariableType::Char);
        round_trip(Value::Word(0xBEEF), VariableType::Word);
        round_trip(Value::Int(-88), VariableType::Int);
        round_trip(Value::DWord(0xDEAD_BEEF), VariableType::DWord);
        round_trip(Value::DInt(-123_456), VariableType::DInt);
        round_trip(Value::Real(3.125), VariableType::Real);
        round_trip(Value::Counter(42), VariableType::Counter);
        round_trip(Value::Time(Duration::milliseconds(-1500)), VariableType::Time);
    }

    #[test]
    fn int_encoding_matches_reference_bytes() {
        assert_eq!(Value::Int(-88).to_bytes(PLC, 480).as_ref(), &[0xFF, 0xA8]);
        assert_eq!(
            Value::from_bytes(VariableType::Bit, &[0x01], PLC).unwrap(),
            Value::Bit(true)
        );
    }

    #[test]
    fn date_is_days_since_1990() {
        let date = NaiveDate::from_ymd_opt(1990, 1, 11).unwrap();
        assert_eq!(Value::Date(date).to_bytes(PLC, 480).as_ref(), &[0x00, 0x0A]);
        round_trip(Value::Date(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), VariableType::Date);
    }

    #[test]
    fn time_of_day_is_millis_since_midnight() {
        let t = NaiveTime::from_hms_milli_opt(0, 0, 1, 500).unwrap();
        assert_eq!(
            Value::TimeOfDay(t).to_bytes(PLC, 480).as_ref(),
            &1500u32.to_be_bytes()
        );
        round_trip(
            Value::TimeOfDay(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap()),
            VariableType::TimeOfDay,
        );
    }

    #[test]
    fn datetime_uses_bcd_with_century_split() {
        let t = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 34, 56)
            .unwrap();
        let bytes = Value::DateTime(t).to_bytes(PLC, 480);
        assert_eq!(
            bytes.as_ref(),
            &[0x24, 0x06, 0x15, 0x12, 0x34, 0x56, 0x00, 0x00]
        );
        round_trip(Value::DateTime(t), VariableType::DateTime);

        let old = NaiveDate::from_ymd_opt(1995, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        round_trip(Value::DateTime(old), VariableType::DateTime);
    }

    #[test]
    fn dtl_layout() {
        let t = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_nano_opt(12, 34, 56, 789_000_000)
            .unwrap();
        let bytes = Value::DateTimeLong(t).to_bytes(PLC, 480);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..2], &2024u16.to_be_bytes());
        assert_eq!(bytes[2], 6);
        assert_eq!(bytes[3], 15);
        assert_eq!(&bytes[8..12], &789_000_000u32.to_be_bytes());
        round_trip(Value::DateTimeLong(t), VariableType::DateTimeLong);
    }

    #[test]
    fn s5time_bases() {
        // 990 ms fits the 10 ms base: count 99
        let raw = s5time_from_duration(Duration::milliseconds(990));
        assert_eq!(raw >> 12, 0);
        assert_eq!(s5time_to_duration(raw), Duration::milliseconds(990));

        // 12.3 s needs the 100 ms base
        let raw = s5time_from_duration(Duration::milliseconds(12_300));
        assert_eq!(raw >> 12, 1);
        assert_eq!(s5time_to_duration(raw), Duration::milliseconds(12_300));

        round_trip(Value::S5Time(Duration::milliseconds(500)), VariableType::S5Time);
        round_trip(Value::Timer(Duration::seconds(30)), VariableType::Timer);
    }

    #[test]
    fn string_prefixes_per_plc_kind() {
        let bytes = Value::String("abc".into()).to_bytes(PLC, 480);
        assert_eq!(bytes.as_ref(), &[254, 3, b'a', b'b', b'c']);
        assert_eq!(
            Value::from_bytes(VariableType::String, &bytes, PLC).unwrap(),
            Value::String("abc".into())
        );

        // below 480 bytes of PDU the declared max drops to 210
        let bytes = Value::String("x".into()).to_bytes(PLC, 240);
        assert_eq!(bytes[0], 210);

        let bytes = Value::String("ab".into()).to_bytes(PlcKind::S200Smart, 480);
        assert_eq!(bytes.as_ref(), &[2, b'a', b'b']);
        assert_eq!(
            Value::from_bytes(VariableType::String, &bytes, PlcKind::S200Smart).unwrap(),
            Value::String("ab".into())
        );
    }

    #[test]
    fn wstring_utf16_round_trip() {
        let value = Value::WString("héllo".into());
        let bytes = value.to_bytes(PLC, 480);
        assert_eq!(&bytes[0..2], &254u16.to_be_bytes());
        assert_eq!(&bytes[2..4], &5u16.to_be_bytes());
        assert_eq!(
            Value::from_bytes(VariableType::WString, &bytes, PLC).unwrap(),
            value
        );

        let bytes = value.to_bytes(PlcKind::S200Smart, 480);
        assert_eq!(bytes[1], 5);
        assert_eq!(
            Value::from_bytes(VariableType::WString, &bytes, PlcKind::S200Smart).unwrap(),
            value
        );
    }

    #[test]
    fn short_input_reports_needed_bytes() {
        match Value::from_bytes(VariableType::DInt, &[0x00, 0x01], PLC) {
            Err(Error::ModelFromBytes { what, min }) => {
                assert_eq!(what, "DInt");
                assert_eq!(min, 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
