// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The text handshake header written once at the start of an archive
//! stream: a magic line, zero or more `tag: value` lines, then a literal
//! `end header` line. An unrecognized tag ends parsing and is pushed back
//! for the caller to resynchronize on (§4.7, §6).

use crate::error::Error;

pub const MAGIC: &str = "NCAR ADS3";
pub const END_MARKER: &str = "end header";

/// Parsed archive header tags, in the order they appeared on the wire —
/// recovering tag order is part of the round-trip contract (§5
/// "Header round-trip").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveHeader {
    pub tags: Vec<(String, String)>,
}

impl ArchiveHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Render the magic line, each `tag: value` line, and the end marker,
    /// each terminated by `\n`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("{MAGIC}\n");
        for (key, value) in &self.tags {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push_str(END_MARKER);
        out.push('\n');
        out.into_bytes()
    }

    /// Parse a header from `input`, a full byte buffer containing at least
    /// the header and possibly trailing sample bytes. Returns the parsed
    /// header and the byte offset where the first sample begins.
    pub fn decode(input: &[u8]) -> Result<(Self, usize), Error> {
        let text = std::str::from_utf8(input).map_err(|_| Error::Parse("header is not valid UTF-8".into()))?;
        let mut offset = 0;
        let mut lines = text.split_inclusive('\n');

        let magic_line = lines.next().ok_or_else(|| Error::Parse("empty header".into()))?;
        if magic_line.trim_end() != MAGIC {
            return Err(Error::Parse(format!("bad magic line: {:?}", magic_line.trim_end())));
        }
        offset += magic_line.len();

        let mut header = ArchiveHeader::new();
        for line in lines {
            let trimmed = line.trim_end_matches('\n');
            if trimmed == END_MARKER {
                offset += line.len();
                return Ok((header, offset));
            }
            match trimmed.split_once(':') {
                Some((key, value)) => {
                    header.tags.push((key.trim().to_string(), value.trim().to_string()));
                    offset += line.len();
                }
                None => {
                    // Unknown/malformed tag: stop here, don't consume it.
                    return Ok((header, offset));
                }
            }
        }
        Err(Error::Parse("header never terminated by 'end header'".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips_tag_order() {
        let header = ArchiveHeader::new()
            .with_tag("archive version", "1")
            .with_tag("project name", "TEST")
            .with_tag("site name", "ISFS");
        let bytes = header.encode();
        let (decoded, offset) = ArchiveHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(offset, bytes.len());
    }

    #[test]
    fn project_name_tag_is_recoverable() {
        let header = ArchiveHeader::new().with_tag("project name", "TEST");
        let bytes = header.encode();
        let (decoded, _) = ArchiveHeader::decode(&bytes).unwrap();
        assert_eq!(decoded.get("project name"), Some("TEST"));
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = b"NOT THE MAGIC\nend header\n";
        assert!(ArchiveHeader::decode(bytes).is_err());
    }

    #[test]
    fn unknown_tag_stops_parsing_and_is_pushed_back() {
        let mut bytes = format!("{MAGIC}\n").into_bytes();
        bytes.extend_from_slice(b"project name: TEST\n");
        bytes.extend_from_slice(b"binary garbage that is not a tag line");
        let (header, offset) = ArchiveHeader::decode(&bytes).unwrap();
        assert_eq!(header.get("project name"), Some("TEST"));
        assert!(offset < bytes.len());
    }
}
