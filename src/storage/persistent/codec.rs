//! Record framing for the snapshot journal.
//!
//! Every record is:
//! - JSON payload (reuses the serde derives of the stored types)
//! - Length-prefixed for framing
//! - CRC32-checked for corruption detection
//! - Version-tagged for forward compatibility

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use crc32fast::Hasher;
use serde::{de::DeserializeOwned, Serialize};

/// Current codec version.
pub const CODEC_VERSION: u8 = 1;

/// Magic bytes at the head of every journal file.
pub const MAGIC: [u8; 4] = *b"CLPW";

/// Largest JSON payload a frame may carry. Enforced on both sides so nothing
/// is ever written that replay would reject.
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Serializes a record with its frame.
///
/// # Errors
/// - `InvalidInput` if the payload exceeds `MAX_RECORD_SIZE`
///
/// Format:
/// ```text
/// [version: 1 byte][length: 4 bytes LE][data: N bytes JSON][crc32: 4 bytes LE]
/// ```
pub fn encode<T: Serialize>(value: &T) -> IoResult<Vec<u8>> {
    let data = serde_json::to_vec(value)
        .map_err(|e| IoError::new(ErrorKind::InvalidData, format!("serialization failed: {e}")))?;

    if data.len() > MAX_RECORD_SIZE {
        return Err(IoError::new(
            ErrorKind::InvalidInput,
            format!("record size {} exceeds maximum {MAX_RECORD_SIZE}", data.len()),
        ));
    }

    let len = u32::try_from(data.len()).map_err(|_| {
        IoError::new(
            ErrorKind::InvalidInput,
            format!("record of {} bytes does not fit a u32 length prefix", data.len()),
        )
    })?;

    let mut out = Vec::with_capacity(1 + 4 + data.len() + 4);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&checksum(&data).to_le_bytes());

    Ok(out)
}

/// Reads one framed record, verifying its checksum.
///
/// # Errors
/// - `UnexpectedEof` if the frame is cut short (torn write)
/// - `InvalidData` on version, size, checksum, or JSON failures
pub fn decode<T: DeserializeOwned>(reader: &mut impl Read) -> IoResult<T> {
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != CODEC_VERSION {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("unsupported codec version: {} (expected {CODEC_VERSION})", version[0]),
        ));
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_RECORD_SIZE {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("record size {len} exceeds maximum {MAX_RECORD_SIZE}"),
        ));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored = u32::from_le_bytes(crc_bytes);
    let computed = checksum(&data);
    if stored != computed {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("CRC mismatch: stored={stored:08x}, computed={computed:08x}"),
        ));
    }

    serde_json::from_slice(&data)
        .map_err(|e| IoError::new(ErrorKind::InvalidData, format!("deserialization failed: {e}")))
}

/// Write the file header (magic + version).
pub fn write_header(writer: &mut impl Write) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[CODEC_VERSION])
}

/// Read and validate the file header, returning its version.
pub fn read_header(reader: &mut impl Read) -> IoResult<u8> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("invalid magic bytes: expected {MAGIC:?}, got {magic:?}"),
        ));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    Ok(version[0])
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_frame_layout() {
        let encoded = encode(&"clip".to_string()).unwrap();
        assert_eq!(encoded[0], CODEC_VERSION);
        let len = u32::from_le_bytes([encoded[1], encoded[2], encoded[3], encoded[4]]) as usize;
        assert_eq!(len, "\"clip\"".len());
        assert_eq!(encoded.len(), 1 + 4 + len + 4);

        let decoded: String = decode(&mut Cursor::new(encoded)).unwrap();
        assert_eq!(decoded, "clip");
    }

    #[test]
    fn test_detects_corruption() {
        let mut encoded = encode(&"copied text".to_string()).unwrap();
        encoded[7] ^= 0xFF;

        let err = decode::<String>(&mut Cursor::new(encoded)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_torn_frame_is_unexpected_eof() {
        let encoded = encode(&"copied text".to_string()).unwrap();
        let torn = encoded[..encoded.len() - 3].to_vec();

        let err = decode::<String>(&mut Cursor::new(torn)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_rejects_oversized_record() {
        let mut bad = vec![CODEC_VERSION];
        bad.extend_from_slice(&(200_000_000u32).to_le_bytes());

        let err = decode::<String>(&mut Cursor::new(bad)).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_size_cap_is_symmetric() {
        // A JSON string adds two quote bytes.
        let at_cap = "x".repeat(MAX_RECORD_SIZE - 2);
        let encoded = encode(&at_cap).unwrap();
        let decoded: String = decode(&mut Cursor::new(encoded)).unwrap();
        assert_eq!(decoded.len(), at_cap.len());

        let over_cap = "x".repeat(MAX_RECORD_SIZE - 1);
        let err = encode(&over_cap).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_rejects_foreign_header() {
        let err = read_header(&mut Cursor::new(b"KYRO\x01".to_vec())).unwrap_err();
        assert!(err.to_string().contains("invalid magic"));

        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        assert_eq!(read_header(&mut Cursor::new(buf)).unwrap(), CODEC_VERSION);
    }
}
