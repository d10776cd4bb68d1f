//! # Binary Codec
//!
//! Tag byte followed by a little-endian payload, recursively for lists
//! and maps. The reader validates everything: bad tags, truncated
//! payloads and invalid UTF-8 all become [`WireError`], never a panic.
//!
//! ## Layout
//!
//! ```text
//! value   := tag payload
//! tag     := 00 null | 01 bool | 02 i64 | 03 f64 | 04 str | 05 list | 06 map
//! str     := u32 len, utf8 bytes
//! list    := u32 count, value*
//! map     := u32 count, (str value)*
//! packet  := kind u8, tick u64, timestamp f64, value
//! ```

use thiserror::Error;

use super::value::Value;

/// Decoding failure; the packet is dropped.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WireError {
    /// Input ended inside a value.
    #[error("unexpected end of packet at offset {0}")]
    UnexpectedEof(usize),

    /// Unknown value tag.
    #[error("unknown value tag {0:#04x} at offset {1}")]
    BadTag(u8, usize),

    /// String payload was not valid UTF-8.
    #[error("invalid utf-8 in string at offset {0}")]
    BadUtf8(usize),

    /// Unknown snapshot kind byte.
    #[error("unknown snapshot kind {0:#04x}")]
    BadKind(u8),

    /// Bytes left over after the value.
    #[error("{0} trailing bytes after packet")]
    TrailingBytes(usize),
}

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_I64: u8 = 0x02;
const TAG_F64: u8 = 0x03;
const TAG_STR: u8 = 0x04;
const TAG_LIST: u8 = 0x05;
const TAG_MAP: u8 = 0x06;

/// Whether a snapshot carries full state or a delta against the last one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Complete state; baseline for later deltas.
    Full,
    /// Changed fields only, relative to the previous snapshot.
    Delta,
}

/// A decoded snapshot envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotPacket {
    /// Full or delta.
    pub kind: SnapshotKind,
    /// Server tick that produced this snapshot.
    pub tick: u64,
    /// Server send time, milliseconds.
    pub timestamp: f64,
    /// Snapshot payload.
    pub payload: Value,
}

/// Encodes a snapshot packet.
#[must_use]
pub fn encode_packet(packet: &SnapshotPacket) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.push(match packet.kind {
        SnapshotKind::Full => 0,
        SnapshotKind::Delta => 1,
    });
    out.extend_from_slice(&packet.tick.to_le_bytes());
    out.extend_from_slice(&packet.timestamp.to_le_bytes());
    encode_value(&packet.payload, &mut out);
    out
}

/// Decodes a snapshot packet, rejecting trailing garbage.
///
/// # Errors
///
/// Any structural problem in the input returns a [`WireError`].
pub fn decode_packet(bytes: &[u8]) -> Result<SnapshotPacket, WireError> {
    let mut reader = Reader { bytes, offset: 0 };
    let kind = match reader.read_u8()? {
        0 => SnapshotKind::Full,
        1 => SnapshotKind::Delta,
        other => return Err(WireError::BadKind(other)),
    };
    let tick = reader.read_u64()?;
    let timestamp = reader.read_f64()?;
    let payload = reader.read_value()?;
    if reader.offset != bytes.len() {
        return Err(WireError::TrailingBytes(bytes.len() - reader.offset));
    }
    Ok(SnapshotPacket {
        kind,
        tick,
        timestamp,
        payload,
    })
}

fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(v) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*v));
        }
        Value::I64(v) => {
            out.push(TAG_I64);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::F64(v) => {
            out.push(TAG_F64);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::Str(s) => {
            out.push(TAG_STR);
            encode_str(s, out);
        }
        Value::List(items) => {
            out.push(TAG_LIST);
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                encode_value(item, out);
            }
        }
        Value::Map(entries) => {
            out.push(TAG_MAP);
            out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
            for (key, entry) in entries {
                encode_str(key, out);
                encode_value(entry, out);
            }
        }
    }
}

fn encode_str(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl Reader<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], WireError> {
        let end = self
            .offset
            .checked_add(n)
            .ok_or(WireError::UnexpectedEof(self.offset))?;
        if end > self.bytes.len() {
            return Err(WireError::UnexpectedEof(self.offset));
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, WireError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, WireError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().map_err(|_| {
            WireError::UnexpectedEof(self.offset)
        })?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn read_i64(&mut self) -> Result<i64, WireError> {
        Ok(self.read_u64()? as i64)
    }

    fn read_f64(&mut self) -> Result<f64, WireError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    fn read_str(&mut self) -> Result<String, WireError> {
        let len = self.read_u32()? as usize;
        let start = self.offset;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::BadUtf8(start))
    }

    fn read_value(&mut self) -> Result<Value, WireError> {
        let tag_offset = self.offset;
        let tag = self.read_u8()?;
        match tag {
            TAG_NULL => Ok(Value::Null),
            TAG_BOOL => Ok(Value::Bool(self.read_u8()? != 0)),
            TAG_I64 => Ok(Value::I64(self.read_i64()?)),
            TAG_F64 => Ok(Value::F64(self.read_f64()?)),
            TAG_STR => Ok(Value::Str(self.read_str()?)),
            TAG_LIST => {
                let count = self.read_u32()? as usize;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(self.read_value()?);
                }
                Ok(Value::List(items))
            }
            TAG_MAP => {
                let count = self.read_u32()? as usize;
                let mut entries = std::collections::BTreeMap::new();
                for _ in 0..count {
                    let key = self.read_str()?;
                    let entry = self.read_value()?;
                    entries.insert(key, entry);
                }
                Ok(Value::Map(entries))
            }
            other => Err(WireError::BadTag(other, tag_offset)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SnapshotPacket {
        SnapshotPacket {
            kind: SnapshotKind::Full,
            tick: 42,
            timestamp: 1234.5,
            payload: Value::map([
                (
                    "1".to_owned(),
                    Value::map([
                        (
                            "position".to_owned(),
                            Value::map([
                                ("x".to_owned(), Value::F64(10.0)),
                                ("y".to_owned(), Value::F64(0.0)),
                                ("z".to_owned(), Value::F64(-3.5)),
                            ]),
                        ),
                        ("name".to_owned(), Value::Str("outpost".to_owned())),
                    ]),
                ),
                ("members".to_owned(), Value::List(vec![Value::I64(7)])),
                ("gone".to_owned(), Value::Null),
                ("active".to_owned(), Value::Bool(true)),
            ]),
        }
    }

    #[test]
    fn test_packet_round_trip() {
        let packet = sample();
        let decoded = decode_packet(&encode_packet(&packet)).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_truncated_packet_is_error() {
        let bytes = encode_packet(&sample());
        for cut in [0, 1, 5, bytes.len() / 2, bytes.len() - 1] {
            assert!(decode_packet(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn test_bad_tag_rejected() {
        let mut bytes = encode_packet(&SnapshotPacket {
            kind: SnapshotKind::Delta,
            tick: 0,
            timestamp: 0.0,
            payload: Value::Null,
        });
        let last = bytes.len() - 1;
        bytes[last] = 0xff;
        assert!(matches!(
            decode_packet(&bytes),
            Err(WireError::BadTag(0xff, _))
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode_packet(&sample());
        bytes.push(0);
        assert_eq!(decode_packet(&bytes), Err(WireError::TrailingBytes(1)));
    }

    #[test]
    fn test_bad_kind_rejected() {
        let mut bytes = encode_packet(&sample());
        bytes[0] = 9;
        assert_eq!(decode_packet(&bytes), Err(WireError::BadKind(9)));
    }
}
