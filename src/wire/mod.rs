// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounds-checked little-endian cursors and the fixed 16-byte sample
//! header codec: `timetag: i64 @ 0`, `id: u32 @ 8`, `length: u32 @ 12`,
//! payload following at offset 16.

use crate::config::SAMPLE_HEADER_LEN;
use crate::error::Error;
use crate::sample::SampleId;

/// Generate bounds-checked little-endian write methods.
macro_rules! impl_write_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self, value: $type) -> Result<(), Error> {
            if self.offset + $size > self.buffer.len() {
                return Err(Error::Parse(format!(
                    "write past end of buffer at offset {}",
                    self.offset
                )));
            }
            let bytes = value.to_le_bytes();
            self.buffer[self.offset..self.offset + $size].copy_from_slice(&bytes);
            self.offset += $size;
            Ok(())
        }
    };
}

/// Generate bounds-checked little-endian read methods.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> Result<$type, Error> {
            if self.offset + $size > self.buffer.len() {
                return Err(Error::Parse(format!(
                    "read past end of buffer at offset {}",
                    self.offset
                )));
            }
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(&self.buffer[self.offset..self.offset + $size]);
            self.offset += $size;
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Bounds-checked mutable write cursor over a caller-owned buffer.
pub struct CursorMut<'a> {
    buffer: &'a mut [u8],
    offset: usize,
}

impl<'a> CursorMut<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        CursorMut { buffer, offset: 0 }
    }

    impl_write_le!(write_u8, u8, 1);
    impl_write_le!(write_u32_le, u32, 4);
    impl_write_le!(write_i64_le, i64, 8);

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.offset + data.len() > self.buffer.len() {
            return Err(Error::Parse(format!(
                "write past end of buffer at offset {}",
                self.offset
            )));
        }
        self.buffer[self.offset..self.offset + data.len()].copy_from_slice(data);
        self.offset += data.len();
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Bounds-checked read cursor over a caller-owned buffer.
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Cursor { buffer, offset: 0 }
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_u32_le, u32, 4);
    impl_read_le!(read_i64_le, i64, 8);

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.offset + len > self.buffer.len() {
            return Err(Error::Parse(format!(
                "read past end of buffer at offset {}",
                self.offset
            )));
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }
}

/// The fixed-size portion of a sample on the wire, validated on
/// construction so a malformed header never reaches a consumer as a
/// half-initialized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleHeader {
    pub timetag_us: i64,
    pub id: SampleId,
    pub length: u32,
}

impl SampleHeader {
    pub const WIRE_LEN: usize = SAMPLE_HEADER_LEN;

    pub fn encode(&self, out: &mut [u8]) -> Result<(), Error> {
        let mut cur = CursorMut::new(out);
        cur.write_i64_le(self.timetag_us)?;
        cur.write_u32_le(self.id.raw())?;
        cur.write_u32_le(self.length)?;
        Ok(())
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < Self::WIRE_LEN {
            return Err(Error::Parse(format!(
                "sample header needs {} bytes, got {}",
                Self::WIRE_LEN,
                buf.len()
            )));
        }
        let mut cur = Cursor::new(buf);
        let timetag_us = cur.read_i64_le()?;
        let id = SampleId::from_raw(cur.read_u32_le()?);
        let length = cur.read_u32_le()?;
        Ok(SampleHeader { timetag_us, id, length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = SampleHeader {
            timetag_us: 1_700_000_000_123_456,
            id: SampleId::new(5, 100, 42),
            length: 17,
        };
        let mut buf = [0u8; SampleHeader::WIRE_LEN];
        header.encode(&mut buf).unwrap();
        let decoded = SampleHeader::decode(&buf).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn header_fields_land_at_documented_offsets() {
        let header = SampleHeader {
            timetag_us: -1,
            id: SampleId::from_raw(0xDEAD_BEEF),
            length: 0xCAFE_BABE,
        };
        let mut buf = [0u8; SampleHeader::WIRE_LEN];
        header.encode(&mut buf).unwrap();
        assert_eq!(i64::from_le_bytes(buf[0..8].try_into().unwrap()), -1);
        assert_eq!(u32::from_le_bytes(buf[8..12].try_into().unwrap()), 0xDEAD_BEEF);
        assert_eq!(u32::from_le_bytes(buf[12..16].try_into().unwrap()), 0xCAFE_BABE);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let buf = [0u8; 10];
        assert!(SampleHeader::decode(&buf).is_err());
    }

    #[test]
    fn cursor_rejects_write_past_end() {
        let mut buf = [0u8; 3];
        let mut cur = CursorMut::new(&mut buf);
        assert!(cur.write_u32_le(1).is_err());
    }

    #[test]
    fn cursor_rejects_read_past_end() {
        let buf = [0u8; 3];
        let mut cur = Cursor::new(&buf);
        assert!(cur.read_u32_le().is_err());
    }

    #[test]
    fn cursor_tracks_offset_and_remaining() {
        let buf = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut cur = Cursor::new(&buf);
        assert_eq!(cur.remaining(), 8);
        let _ = cur.read_u32_le().unwrap();
        assert_eq!(cur.offset(), 4);
        assert_eq!(cur.remaining(), 4);
    }
}
