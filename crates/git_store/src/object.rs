//! Typed views over raw object bytes.
//!
//! The loose and pack layers hand this module fully inflated buffers; parsing
//! here never touches the filesystem.

use crate::error::{Error, Result};
use crate::oid::ObjectId;

/// The four object kinds stored in a git object database.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    pub fn from_header(name: &[u8]) -> Option<Self> {
        match name {
            b"commit" => Some(Self::Commit),
            b"tree" => Some(Self::Tree),
            b"blob" => Some(Self::Blob),
            b"tag" => Some(Self::Tag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
        }
    }
}

/// An inflated object: kind plus payload bytes (header stripped).
#[derive(Debug)]
pub struct RawObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

/// A parsed commit. Immutable once created.
#[derive(Clone, Debug)]
pub struct Commit {
    pub id: ObjectId,
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author_time: i64,
}

impl Commit {
    pub fn parse(id: ObjectId, data: &[u8]) -> Result<Self> {
        let mut tree = None;
        let mut parents = Vec::new();
        let mut author_time = 0;

        for line in data.split(|&b| b == b'\n') {
            if line.is_empty() {
                // end of headers; the message follows
                break;
            }
            if let Some(rest) = line.strip_prefix(b"tree ") {
                tree = parse_hex_field(rest);
            } else if let Some(rest) = line.strip_prefix(b"parent ") {
                parents.push(parse_hex_field(rest).ok_or_else(|| Error::InvalidObject {
                    kind: "commit",
                    id,
                    reason: "bad parent id".to_string(),
                })?);
            } else if let Some(rest) = line.strip_prefix(b"author ") {
                author_time = parse_identity_time(rest);
            }
        }

        let tree = tree.ok_or_else(|| Error::InvalidObject {
            kind: "commit",
            id,
            reason: "missing tree header".to_string(),
        })?;
        Ok(Self {
            id,
            tree,
            parents,
            author_time,
        })
    }
}

/// A parsed annotated tag, kept only as far as peeling needs.
#[derive(Clone, Debug)]
pub struct Tag {
    pub target: ObjectId,
    pub target_kind: ObjectKind,
}

impl Tag {
    pub fn parse(id: ObjectId, data: &[u8]) -> Result<Self> {
        let mut target = None;
        let mut target_kind = None;
        for line in data.split(|&b| b == b'\n') {
            if line.is_empty() {
                break;
            }
            if let Some(rest) = line.strip_prefix(b"object ") {
                target = parse_hex_field(rest);
            } else if let Some(rest) = line.strip_prefix(b"type ") {
                target_kind = ObjectKind::from_header(rest);
            }
        }
        match (target, target_kind) {
            (Some(target), Some(target_kind)) => Ok(Self {
                target,
                target_kind,
            }),
            _ => Err(Error::InvalidObject {
                kind: "tag",
                id,
                reason: "missing object or type header".to_string(),
            }),
        }
    }
}

/// What a tree entry points at, derived from its mode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntryKind {
    Blob,
    Tree,
    Link,
    /// A gitlink. Compared by id like a blob; never recursed into.
    Submodule,
}

#[derive(Clone, Debug)]
pub struct TreeEntry {
    pub mode: u32,
    pub name: Vec<u8>,
    pub id: ObjectId,
    pub kind: EntryKind,
}

/// A parsed tree: entries in git's on-disk order.
#[derive(Clone, Debug)]
pub struct Tree {
    pub id: ObjectId,
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn parse(id: ObjectId, data: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| invalid_tree(id, "missing mode terminator"))?;
            let mode = std::str::from_utf8(&rest[..space])
                .ok()
                .and_then(|s| u32::from_str_radix(s, 8).ok())
                .ok_or_else(|| invalid_tree(id, "bad mode"))?;
            rest = &rest[space + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| invalid_tree(id, "missing name terminator"))?;
            let name = rest[..nul].to_vec();
            rest = &rest[nul + 1..];

            if rest.len() < 20 {
                return Err(invalid_tree(id, "truncated entry id"));
            }
            let mut raw = [0u8; 20];
            raw.copy_from_slice(&rest[..20]);
            rest = &rest[20..];

            let kind = match mode & 0o170000 {
                0o040000 => EntryKind::Tree,
                0o120000 => EntryKind::Link,
                0o160000 => EntryKind::Submodule,
                _ => EntryKind::Blob,
            };
            entries.push(TreeEntry {
                mode,
                name,
                id: ObjectId::from_bytes(raw),
                kind,
            });
        }
        Ok(Self { id, entries })
    }

    pub fn entry(&self, name: &[u8]) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

fn invalid_tree(id: ObjectId, reason: &str) -> Error {
    Error::InvalidObject {
        kind: "tree",
        id,
        reason: reason.to_string(),
    }
}

fn parse_hex_field(field: &[u8]) -> Option<ObjectId> {
    let hex = std::str::from_utf8(field.get(..40)?).ok()?;
    ObjectId::from_hex(hex)
}

/// Extracts the timestamp from `Name <email> <secs> <tz>`.
fn parse_identity_time(line: &[u8]) -> i64 {
    let text = String::from_utf8_lossy(line);
    let mut fields = text.rsplitn(3, ' ');
    let _tz = fields.next();
    fields
        .next()
        .and_then(|secs| secs.parse().ok())
        .unwrap_or(0)
}
