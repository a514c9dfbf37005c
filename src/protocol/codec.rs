//! Primitive cursor operations over the server's binary records.
//!
//! The wire format is length-implicit: a record is a single type-tag byte
//! followed by a variant-specific payload. Strings carry a u16 length prefix,
//! nested structures a u32 length prefix, integers are big-endian. The codec
//! knows nothing about command variants, it only moves a cursor.

use bytes::{BufMut, BytesMut};

/// Upper bound for a nested-structure length prefix. A prefix above this is
/// treated as a corrupt record instead of an instruction to wait for 4GiB.
const MAX_BLOB_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CodecError {
    /// The buffer ends before the record does. With a length-implicit
    /// encoding this is indistinguishable from "more bytes are on the way",
    /// so callers accumulating a stream treat it as "read again", while
    /// callers decoding a complete record treat it as corruption.
    #[error("record truncated")]
    Truncated,
    #[error("string field is not valid utf-8")]
    Utf8,
    #[error("invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: u64 },
}

/// Read cursor over a single raw record.
pub struct BufferReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BufferReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far. A stream accumulator uses this to advance
    /// past a fully decoded record.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() - self.pos < n {
            return Err(CodecError::Truncated);
        }
        let chunk = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(chunk)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(CodecError::InvalidValue {
                field: "bool",
                value: value as u64,
            }),
        }
    }

    /// Length-prefixed UTF-8 string (u16 length).
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_u16()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::Utf8)
    }

    /// Length-prefixed opaque byte string (u32 length), used for nested
    /// structures. The returned slice is decoded with its own reader.
    pub fn read_blob(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_u32()?;
        if len > MAX_BLOB_LEN {
            return Err(CodecError::InvalidValue {
                field: "blob length",
                value: len as u64,
            });
        }
        self.take(len as usize)
    }
}

/// Write cursor producing a single raw record.
#[derive(Default)]
pub struct BufferWriter {
    buf: BytesMut,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.put_u8(v as u8);
    }

    /// A string over the u16 prefix range must fail here: writing a wrapped
    /// prefix followed by the full payload would desync every later field.
    pub fn write_string(&mut self, s: &str) -> Result<(), CodecError> {
        if s.len() > u16::MAX as usize {
            return Err(CodecError::InvalidValue {
                field: "string length",
                value: s.len() as u64,
            });
        }
        self.buf.put_u16(s.len() as u16);
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    pub fn write_blob(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        if bytes.len() > MAX_BLOB_LEN as usize {
            return Err(CodecError::InvalidValue {
                field: "blob length",
                value: bytes.len() as u64,
            });
        }
        self.buf.put_u32(bytes.len() as u32);
        self.buf.put_slice(bytes);
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_primitives_round_trip() {
        let mut w = BufferWriter::new();
        w.write_u8(0x2a);
        w.write_u16(777);
        w.write_i32(-12);
        w.write_bool(true);
        w.write_string("sandbox").unwrap();
        w.write_blob(&[1, 2, 3]).unwrap();
        let bytes = w.into_bytes();

        let mut r = BufferReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0x2a);
        assert_eq!(r.read_u16().unwrap(), 777);
        assert_eq!(r.read_i32().unwrap(), -12);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_string().unwrap(), "sandbox");
        assert_eq!(r.read_blob().unwrap(), &[1, 2, 3]);
        assert_eq!(r.position(), bytes.len());
    }

    #[test]
    fn test_truncated_reads() {
        struct TestCase {
            bytes: &'static [u8],
            read: fn(&mut BufferReader) -> Result<(), CodecError>,
        }
        let test_cases = [
            TestCase {
                bytes: &[],
                read: |r| r.read_u8().map(drop),
            },
            TestCase {
                bytes: &[0x01],
                read: |r| r.read_u16().map(drop),
            },
            TestCase {
                // String length prefix claims 5 bytes, only 2 present.
                bytes: &[0x00, 0x05, b'a', b'b'],
                read: |r| r.read_string().map(drop),
            },
            TestCase {
                // Blob length prefix claims 10 bytes, none present.
                bytes: &[0x00, 0x00, 0x00, 0x0a],
                read: |r| r.read_blob().map(drop),
            },
        ];

        for tc in test_cases {
            let mut r = BufferReader::new(tc.bytes);
            assert_eq!((tc.read)(&mut r), Err(CodecError::Truncated));
        }
    }

    #[test]
    fn test_malformed_fields() {
        let mut r = BufferReader::new(&[0x02]);
        assert!(matches!(
            r.read_bool(),
            Err(CodecError::InvalidValue { field: "bool", .. })
        ));

        // Invalid utf-8 in a string field.
        let mut r = BufferReader::new(&[0x00, 0x02, 0xff, 0xfe]);
        assert_eq!(r.read_string(), Err(CodecError::Utf8));

        // Blob length over the sanity cap.
        let mut r = BufferReader::new(&[0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(
            r.read_blob(),
            Err(CodecError::InvalidValue { .. })
        ));

        // Write side mirrors the read-side bounds: a string longer than the
        // u16 prefix range must fail instead of wrapping the prefix.
        let mut w = BufferWriter::new();
        let long = "x".repeat(70_000);
        assert!(matches!(
            w.write_string(&long),
            Err(CodecError::InvalidValue {
                field: "string length",
                value: 70_000,
            })
        ));

        let mut w = BufferWriter::new();
        let blob = vec![0u8; MAX_BLOB_LEN as usize + 1];
        assert!(matches!(
            w.write_blob(&blob),
            Err(CodecError::InvalidValue {
                field: "blob length",
                ..
            })
        ));
    }
}
