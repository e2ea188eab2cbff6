//! Protobuf wire format: keys, varints, fixed-width scalars and
//! length-delimited payloads.

use crate::error::{Error, Result};
use crate::proto::Message;

/// Largest field number protobuf allows (2^29 - 1).
pub const MAX_FIELD_NUMBER: u64 = (1 << 29) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    fn from_bits(bits: u64, offset: usize) -> Result<Self> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            3 | 4 => Err(Error::decode(offset, "groups are not supported")),
            5 => Ok(WireType::Fixed32),
            other => Err(Error::decode(offset, format!("invalid wire type {other}"))),
        }
    }

    fn bits(self) -> u64 {
        match self {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::LengthDelimited => 2,
            WireType::Fixed32 => 5,
        }
    }
}

/// Bounds-checked reader over an encoded message.
///
/// Nested readers remember their absolute position in the outermost buffer
/// so decode errors point at the right byte of the file.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::decode(
                self.offset(),
                format!(
                    "unexpected end of input: need {len} bytes, {} left",
                    self.remaining()
                ),
            ));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let start = self.offset();
        let mut value = 0u64;
        for i in 0..10 {
            let byte = self.take(1)?[0];
            // The tenth byte may only carry the top bit of a u64.
            if i == 9 && byte > 1 {
                return Err(Error::decode(start, "varint overflows 64 bits"));
            }
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::decode(start, "varint overflows 64 bits"))
    }

    pub fn read_key(&mut self) -> Result<(u32, WireType)> {
        let offset = self.offset();
        let key = self.read_varint()?;
        let field = key >> 3;
        if field == 0 || field > MAX_FIELD_NUMBER {
            return Err(Error::decode(offset, format!("invalid field number {field}")));
        }
        let wire = WireType::from_bits(key & 0x7, offset)?;
        Ok((field as u32, wire))
    }

    fn expect(&self, wire: WireType, expected: WireType) -> Result<()> {
        if wire != expected {
            return Err(Error::decode(
                self.offset(),
                format!("expected wire type {expected:?}, found {wire:?}"),
            ));
        }
        Ok(())
    }

    pub fn read_fixed32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_fixed64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_bytes(&mut self, wire: WireType) -> Result<&'a [u8]> {
        self.expect(wire, WireType::LengthDelimited)?;
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .map_err(|_| Error::decode(self.offset(), "length does not fit in memory"))?;
        self.take(len)
    }

    pub fn read_string(&mut self, wire: WireType) -> Result<String> {
        let offset = self.offset();
        let bytes = self.read_bytes(wire)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::decode(offset, format!("invalid UTF-8 string: {e}")))
    }

    /// Reader over the payload of a length-delimited field.
    pub fn read_nested(&mut self, wire: WireType) -> Result<Reader<'a>> {
        let bytes = self.read_bytes(wire)?;
        Ok(Reader {
            data: bytes,
            pos: 0,
            base: self.offset() - bytes.len(),
        })
    }

    pub fn read_message<M: Message>(&mut self, wire: WireType) -> Result<M> {
        let mut nested = self.read_nested(wire)?;
        M::decode_from(&mut nested)
    }

    pub fn read_int64(&mut self, wire: WireType) -> Result<i64> {
        self.expect(wire, WireType::Varint)?;
        Ok(self.read_varint()? as i64)
    }

    pub fn read_int32(&mut self, wire: WireType) -> Result<i32> {
        // Negative int32 values are sign-extended to ten bytes on the wire.
        Ok(self.read_int64(wire)? as i32)
    }

    pub fn read_float(&mut self, wire: WireType) -> Result<f32> {
        self.expect(wire, WireType::Fixed32)?;
        Ok(f32::from_bits(self.read_fixed32()?))
    }

    pub fn read_double(&mut self, wire: WireType) -> Result<f64> {
        self.expect(wire, WireType::Fixed64)?;
        Ok(f64::from_bits(self.read_fixed64()?))
    }

    /// Repeated int64 field, packed or unpacked.
    pub fn read_repeated_int64(&mut self, wire: WireType, out: &mut Vec<i64>) -> Result<()> {
        if wire == WireType::LengthDelimited {
            let mut packed = self.read_nested(wire)?;
            while !packed.is_empty() {
                out.push(packed.read_varint()? as i64);
            }
            return Ok(());
        }
        out.push(self.read_int64(wire)?);
        Ok(())
    }

    pub fn read_repeated_int32(&mut self, wire: WireType, out: &mut Vec<i32>) -> Result<()> {
        if wire == WireType::LengthDelimited {
            let mut packed = self.read_nested(wire)?;
            while !packed.is_empty() {
                out.push(packed.read_varint()? as i64 as i32);
            }
            return Ok(());
        }
        out.push(self.read_int32(wire)?);
        Ok(())
    }

    pub fn read_repeated_float(&mut self, wire: WireType, out: &mut Vec<f32>) -> Result<()> {
        if wire == WireType::LengthDelimited {
            let mut packed = self.read_nested(wire)?;
            while !packed.is_empty() {
                out.push(f32::from_bits(packed.read_fixed32()?));
            }
            return Ok(());
        }
        out.push(self.read_float(wire)?);
        Ok(())
    }

    pub fn read_repeated_double(&mut self, wire: WireType, out: &mut Vec<f64>) -> Result<()> {
        if wire == WireType::LengthDelimited {
            let mut packed = self.read_nested(wire)?;
            while !packed.is_empty() {
                out.push(f64::from_bits(packed.read_fixed64()?));
            }
            return Ok(());
        }
        out.push(self.read_double(wire)?);
        Ok(())
    }

    pub fn skip(&mut self, wire: WireType) -> Result<()> {
        match wire {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.take(8)?;
            }
            WireType::LengthDelimited => {
                self.read_bytes(wire)?;
            }
            WireType::Fixed32 => {
                self.take(4)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn put_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    fn put_key(&mut self, field: u32, wire: WireType) {
        self.put_varint((u64::from(field) << 3) | wire.bits());
    }

    pub fn int64(&mut self, field: u32, value: i64) {
        self.put_key(field, WireType::Varint);
        self.put_varint(value as u64);
    }

    pub fn int32(&mut self, field: u32, value: i32) {
        self.int64(field, i64::from(value));
    }

    pub fn float(&mut self, field: u32, value: f32) {
        self.put_key(field, WireType::Fixed32);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn bytes(&mut self, field: u32, value: &[u8]) {
        self.put_key(field, WireType::LengthDelimited);
        self.put_varint(value.len() as u64);
        self.buf.extend_from_slice(value);
    }

    pub fn string(&mut self, field: u32, value: &str) {
        self.bytes(field, value.as_bytes());
    }

    pub fn message<M: Message>(&mut self, field: u32, message: &M) {
        self.bytes(field, &message.encode_to_vec());
    }

    /// Unpacked repeated int64, one key per element.
    pub fn int64s(&mut self, field: u32, values: &[i64]) {
        for &value in values {
            self.int64(field, value);
        }
    }

    pub fn floats(&mut self, field: u32, values: &[f32]) {
        for &value in values {
            self.float(field, value);
        }
    }

    pub fn packed_int64(&mut self, field: u32, values: &[i64]) {
        if values.is_empty() {
            return;
        }
        let mut inner = Writer::new();
        for &value in values {
            inner.put_varint(value as u64);
        }
        self.bytes(field, &inner.buf);
    }

    pub fn packed_int32(&mut self, field: u32, values: &[i32]) {
        if values.is_empty() {
            return;
        }
        let mut inner = Writer::new();
        for &value in values {
            inner.put_varint(i64::from(value) as u64);
        }
        self.bytes(field, &inner.buf);
    }

    pub fn packed_float(&mut self, field: u32, values: &[f32]) {
        if values.is_empty() {
            return;
        }
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.bytes(field, &bytes);
    }

    pub fn packed_double(&mut self, field: u32, values: &[f64]) {
        if values.is_empty() {
            return;
        }
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.bytes(field, &bytes);
    }
}
