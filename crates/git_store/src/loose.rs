//! Loose objects: `objects/xx/yyyy…`, zlib-compressed with a
//! `<kind> <size>\0` header.

use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;

use crate::error::{Error, Result};
use crate::object::{ObjectKind, RawObject};
use crate::oid::ObjectId;

pub(crate) fn read_loose(objects_dir: &Path, id: &ObjectId) -> Result<Option<RawObject>> {
    let hex = id.to_hex();
    let path = objects_dir.join(&hex[..2]).join(&hex[2..]);
    let compressed = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut inflated = Vec::new();
    ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut inflated)?;

    let nul = inflated
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| invalid(*id, "missing header terminator"))?;
    let header = &inflated[..nul];
    let space = header
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| invalid(*id, "missing kind separator"))?;
    let kind = ObjectKind::from_header(&header[..space])
        .ok_or_else(|| invalid(*id, "unknown object kind"))?;
    let size: usize = std::str::from_utf8(&header[space + 1..])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid(*id, "bad size field"))?;

    let data = inflated[nul + 1..].to_vec();
    if data.len() != size {
        return Err(invalid(*id, "size mismatch"));
    }
    Ok(Some(RawObject { kind, data }))
}

/// Enumerates every loose object id, optionally restricted to a hex prefix.
pub(crate) fn loose_ids(objects_dir: &Path, prefix: &str) -> Result<Vec<ObjectId>> {
    let prefix = prefix.to_ascii_lowercase();
    let mut ids = Vec::new();
    let fanout_dirs = match std::fs::read_dir(objects_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
        Err(e) => return Err(e.into()),
    };
    for dir in fanout_dirs {
        let dir = dir?;
        let Some(fanout) = dir.file_name().to_str().map(str::to_ascii_lowercase) else {
            continue;
        };
        if fanout.len() != 2 || !fanout.bytes().all(|b| b.is_ascii_hexdigit()) {
            continue;
        }
        // The fanout directory holds the first two hex digits.
        if prefix.len() >= 2 {
            if fanout != prefix[..2] {
                continue;
            }
        } else if !fanout.starts_with(&prefix) {
            continue;
        }
        for file in std::fs::read_dir(dir.path())? {
            let file = file?;
            let Some(rest) = file.file_name().to_str().map(str::to_ascii_lowercase) else {
                continue;
            };
            let hex = format!("{fanout}{rest}");
            if let Some(id) = ObjectId::from_hex(&hex) {
                if id.matches_prefix(&prefix) {
                    ids.push(id);
                }
            }
        }
    }
    Ok(ids)
}

fn invalid(id: ObjectId, reason: &str) -> Error {
    Error::InvalidObject {
        kind: "loose",
        id,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    use super::*;

    fn write_loose(objects_dir: &Path, id: &ObjectId, kind: &str, data: &[u8]) {
        let mut payload = format!("{kind} {}\0", data.len()).into_bytes();
        payload.extend_from_slice(data);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let hex = id.to_hex();
        let dir = objects_dir.join(&hex[..2]);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(&hex[2..]), compressed).unwrap();
    }

    #[test]
    fn reads_a_written_blob() {
        let tmp = tempfile::tempdir().unwrap();
        let id = ObjectId::from_bytes([0xab; 20]);
        write_loose(tmp.path(), &id, "blob", b"hello world");

        let obj = read_loose(tmp.path(), &id).unwrap().unwrap();
        assert_eq!(obj.kind, ObjectKind::Blob);
        assert_eq!(obj.data, b"hello world");
    }

    #[test]
    fn absent_object_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let id = ObjectId::from_bytes([0xab; 20]);
        assert!(read_loose(tmp.path(), &id).unwrap().is_none());
    }

    #[test]
    fn size_mismatch_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let id = ObjectId::from_bytes([0xcd; 20]);
        let mut payload = b"blob 99\0hi".to_vec();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        payload = encoder.finish().unwrap();
        let hex = id.to_hex();
        std::fs::create_dir_all(tmp.path().join(&hex[..2])).unwrap();
        std::fs::write(tmp.path().join(&hex[..2]).join(&hex[2..]), payload).unwrap();

        assert!(read_loose(tmp.path(), &id).is_err());
    }

    #[test]
    fn prefix_enumeration_finds_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let a = ObjectId::from_hex("9f3c456789abcdef0123456789abcdef01234567").unwrap();
        let b = ObjectId::from_hex("9f00456789abcdef0123456789abcdef01234567").unwrap();
        write_loose(tmp.path(), &a, "blob", b"a");
        write_loose(tmp.path(), &b, "blob", b"b");

        let hits = loose_ids(tmp.path(), "9f3c").unwrap();
        assert_eq!(hits, vec![a]);
        let all = loose_ids(tmp.path(), "9f").unwrap();
        assert_eq!(all.len(), 2);
    }
}
