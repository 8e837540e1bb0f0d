//! Tagged object-file container: either raw bytecode or bytecode plus
//! embedded debug metadata (source text, per-byte line table).
//!
//! `0xBC` selects the raw layout, `0xDB` the debug layout. All multi-byte
//! fields are big-endian on the wire; an unrecognized tag byte falls back
//! to treating the whole stream as raw bytecode with the first byte as
//! its length (legacy recovery).

use std::fmt;
use std::io::{self, Write};

pub const TAG_RAW: u8 = 0xBC;
pub const TAG_DEBUG: u8 = 0xDB;

pub const MAX_SOURCE_LEN: usize = 4096;
pub const MAX_BYTECODE_LEN: usize = 255;

#[derive(Debug)]
pub enum Error {
    ShortRead,
    BytecodeTooLarge(usize),
    SourceTooLarge(usize),
    InvalidSourceUtf8,
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ShortRead => write!(f, "object file is truncated"),
            Error::BytecodeTooLarge(n) => {
                write!(f, "bytecode length {n} exceeds the {MAX_BYTECODE_LEN}-byte cap")
            }
            Error::SourceTooLarge(n) => {
                write!(f, "source length {n} exceeds the {MAX_SOURCE_LEN}-byte cap")
            }
            Error::InvalidSourceUtf8 => write!(f, "embedded source is not valid UTF-8"),
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// An object file as read back from disk: bytecode always present, debug
/// metadata present only when the file carried the `0xDB` tag.
pub struct ObjectFile {
    pub bytecode: Vec<u8>,
    pub source: Option<String>,
    pub line_table: Option<Vec<u16>>,
}

pub fn write_raw<W: Write>(w: &mut W, bytecode: &[u8]) -> Result<(), Error> {
    if bytecode.len() > MAX_BYTECODE_LEN {
        return Err(Error::BytecodeTooLarge(bytecode.len()));
    }
    w.write_all(&[TAG_RAW])?;
    w.write_all(&[bytecode.len() as u8])?;
    w.write_all(bytecode)?;
    Ok(())
}

pub fn write_debug<W: Write>(
    w: &mut W,
    source: &str,
    bytecode: &[u8],
    line_table: &[u16],
) -> Result<(), Error> {
    if source.len() > MAX_SOURCE_LEN {
        return Err(Error::SourceTooLarge(source.len()));
    }
    if bytecode.len() > MAX_BYTECODE_LEN {
        return Err(Error::BytecodeTooLarge(bytecode.len()));
    }
    w.write_all(&[TAG_DEBUG])?;
    w.write_all(&(source.len() as u16).to_be_bytes())?;
    w.write_all(source.as_bytes())?;
    w.write_all(&[bytecode.len() as u8])?;
    w.write_all(bytecode)?;
    for &line in line_table {
        w.write_all(&line.to_be_bytes())?;
    }
    Ok(())
}

pub fn read(bytes: &[u8]) -> Result<ObjectFile, Error> {
    let Some(&tag) = bytes.first() else {
        return Err(Error::ShortRead);
    };

    match tag {
        TAG_RAW => {
            let len = *bytes.get(1).ok_or(Error::ShortRead)? as usize;
            let start = 2;
            let end = start + len;
            let bytecode = bytes.get(start..end).ok_or(Error::ShortRead)?.to_vec();
            Ok(ObjectFile {
                bytecode,
                source: None,
                line_table: None,
            })
        }
        TAG_DEBUG => {
            let source_len = u16::from_be_bytes(
                bytes
                    .get(1..3)
                    .ok_or(Error::ShortRead)?
                    .try_into()
                    .unwrap(),
            ) as usize;
            let source_start = 3;
            let source_end = source_start + source_len;
            let source_bytes = bytes.get(source_start..source_end).ok_or(Error::ShortRead)?;
            let source = String::from_utf8(source_bytes.to_vec()).map_err(|_| Error::InvalidSourceUtf8)?;

            let bc_len = *bytes.get(source_end).ok_or(Error::ShortRead)? as usize;
            let bc_start = source_end + 1;
            let bc_end = bc_start + bc_len;
            let bytecode = bytes.get(bc_start..bc_end).ok_or(Error::ShortRead)?.to_vec();

            let mut line_table = Vec::with_capacity(bc_len);
            let mut pos = bc_end;
            for _ in 0..bc_len {
                let entry = u16::from_be_bytes(
                    bytes.get(pos..pos + 2).ok_or(Error::ShortRead)?.try_into().unwrap(),
                );
                line_table.push(entry);
                pos += 2;
            }

            Ok(ObjectFile {
                bytecode,
                source: Some(source),
                line_table: Some(line_table),
            })
        }
        _ => {
            // Legacy recovery: reinterpret the whole stream as raw
            // bytecode, first byte as length.
            let len = tag as usize;
            let start = 1;
            let end = start + len;
            let bytecode = bytes.get(start..end).ok_or(Error::ShortRead)?.to_vec();
            Ok(ObjectFile {
                bytecode,
                source: None,
                line_table: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip() {
        let mut buf = Vec::new();
        write_raw(&mut buf, &[1, 2, 3]).unwrap();
        assert_eq!(buf[0], TAG_RAW);
        let obj = read(&buf).unwrap();
        assert_eq!(obj.bytecode, vec![1, 2, 3]);
        assert!(obj.source.is_none());
    }

    #[test]
    fn debug_round_trip() {
        let mut buf = Vec::new();
        write_debug(&mut buf, "nop", &[0x00], &[1]).unwrap();
        let obj = read(&buf).unwrap();
        assert_eq!(obj.bytecode, vec![0x00]);
        assert_eq!(obj.source.as_deref(), Some("nop"));
        assert_eq!(obj.line_table, Some(vec![1]));
    }

    #[test]
    fn unknown_tag_falls_back_to_raw() {
        let buf = vec![2, 0xAA, 0xBB];
        let obj = read(&buf).unwrap();
        assert_eq!(obj.bytecode, vec![0xAA, 0xBB]);
    }

    #[test]
    fn short_read_is_an_error() {
        let buf = vec![TAG_RAW, 5, 1, 2];
        assert!(matches!(read(&buf), Err(Error::ShortRead)));
    }

    #[test]
    fn bytecode_too_large_is_rejected_on_write() {
        let big = vec![0u8; 256];
        let mut buf = Vec::new();
        assert!(matches!(
            write_raw(&mut buf, &big),
            Err(Error::BytecodeTooLarge(256))
        ));
    }
}
