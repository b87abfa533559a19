//! Minimal protobuf encoding/decoding for the peer cache messages.
//!
//! Implements just enough of the protobuf wire format to encode and
//! decode `GetRequest` and `GetReply` without pulling in prost or code
//! generation. Unknown fields are skipped, so the format can grow
//! without breaking older peers.

use bytes::Bytes;

/// Wire type for varint (int32, int64, uint32, uint64, bool, enum).
const WIRE_TYPE_VARINT: u8 = 0;
/// Wire type for length-delimited (string, bytes, embedded messages).
const WIRE_TYPE_LEN: u8 = 2;

/// Encode a varint.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a varint from a buffer.
pub fn decode_varint(buf: &mut &[u8]) -> Option<u64> {
    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        let (&byte, rest) = buf.split_first()?;
        *buf = rest;

        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
        if shift >= 64 {
            return None; // overflow
        }
    }
}

/// Encode a field tag.
pub fn encode_tag(field_number: u32, wire_type: u8, buf: &mut Vec<u8>) {
    encode_varint(((field_number as u64) << 3) | (wire_type as u64), buf);
}

/// Decode a field tag, returning `(field_number, wire_type)`.
pub fn decode_tag(buf: &mut &[u8]) -> Option<(u32, u8)> {
    let tag = decode_varint(buf)?;
    Some(((tag >> 3) as u32, (tag & 0x07) as u8))
}

/// Encode a bytes field.
pub fn encode_bytes(field_number: u32, data: &[u8], buf: &mut Vec<u8>) {
    encode_tag(field_number, WIRE_TYPE_LEN, buf);
    encode_varint(data.len() as u64, buf);
    buf.extend_from_slice(data);
}

/// Encode a string field (same wire shape as bytes).
pub fn encode_string(field_number: u32, s: &str, buf: &mut Vec<u8>) {
    encode_bytes(field_number, s.as_bytes(), buf);
}

/// Decode a length-delimited field, returning the raw bytes.
pub fn decode_length_delimited<'a>(buf: &mut &'a [u8]) -> Option<&'a [u8]> {
    let len = decode_varint(buf)? as usize;
    if buf.len() < len {
        return None;
    }
    let (data, rest) = buf.split_at(len);
    *buf = rest;
    Some(data)
}

/// Skip a field based on its wire type.
pub fn skip_field(wire_type: u8, buf: &mut &[u8]) -> Option<()> {
    match wire_type {
        WIRE_TYPE_VARINT => {
            decode_varint(buf)?;
        }
        WIRE_TYPE_LEN => {
            decode_length_delimited(buf)?;
        }
        1 => {
            // 64-bit fixed
            if buf.len() < 8 {
                return None;
            }
            *buf = &buf[8..];
        }
        5 => {
            // 32-bit fixed
            if buf.len() < 4 {
                return None;
            }
            *buf = &buf[4..];
        }
        _ => return None,
    }
    Some(())
}

/// Request for one key in one group.
///
/// Fields: `group: string = 1`, `key: string = 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub group: String,
    pub key: String,
}

impl GetRequest {
    /// Encode the request message.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        encode_string(1, &self.group, &mut buf);
        encode_string(2, &self.key, &mut buf);
        buf
    }

    /// Decode a request message from bytes.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let mut buf = data;
        let mut group: Option<&[u8]> = None;
        let mut key: Option<&[u8]> = None;

        while !buf.is_empty() {
            let (field_number, wire_type) = decode_tag(&mut buf)?;
            match field_number {
                1 => group = Some(decode_length_delimited(&mut buf)?),
                2 => key = Some(decode_length_delimited(&mut buf)?),
                _ => skip_field(wire_type, &mut buf)?,
            }
        }

        Some(Self {
            group: String::from_utf8_lossy(group.unwrap_or(&[])).into_owned(),
            key: String::from_utf8_lossy(key.unwrap_or(&[])).into_owned(),
        })
    }
}

/// Reply to a [`GetRequest`].
///
/// Fields: `value: bytes = 1`, `error: string = 2`. A reply carrying
/// field 2 is a protocol error with a human-readable description; any
/// other reply is a success whose value is field 1 (possibly empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetReply {
    /// The cached or loaded value.
    Value(Bytes),
    /// Error description from the serving peer.
    Error(String),
}

impl GetReply {
    /// Encode the reply message.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        match self {
            GetReply::Value(value) => encode_bytes(1, value, &mut buf),
            GetReply::Error(message) => encode_string(2, message, &mut buf),
        }
        buf
    }

    /// Decode a reply message from bytes.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let mut buf = data;
        let mut value: Option<&[u8]> = None;
        let mut error: Option<&[u8]> = None;

        while !buf.is_empty() {
            let (field_number, wire_type) = decode_tag(&mut buf)?;
            match field_number {
                1 => value = Some(decode_length_delimited(&mut buf)?),
                2 => error = Some(decode_length_delimited(&mut buf)?),
                _ => skip_field(wire_type, &mut buf)?,
            }
        }

        match error {
            Some(message) => Some(GetReply::Error(
                String::from_utf8_lossy(message).into_owned(),
            )),
            None => Some(GetReply::Value(Bytes::copy_from_slice(
                value.unwrap_or(&[]),
            ))),
        }
    }
}
