use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A 20-byte SHA-1 object id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parses a full 40-character hex id, case-insensitively.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 40 {
            return None;
        }
        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(40);
        for b in &self.0 {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }

    /// True when this id's hex form starts with `prefix` (ASCII
    /// case-insensitive).
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        let hex = self.to_hex();
        prefix.len() <= 40 && hex[..prefix.len()].eq_ignore_ascii_case(prefix)
    }

    /// The first two id bytes as a big-endian unsigned 16-bit value.
    ///
    /// This is the fragment embedded in the fourth component of stamped
    /// versions.
    pub fn first_two_bytes(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| Error::BadCommittish(s.to_string()))
    }
}

/// True when `s` looks like a (possibly abbreviated) hex object id.
///
/// Git accepts abbreviations of 4 characters and up.
pub fn is_hex_id(s: &str) -> bool {
    (4..=40).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let id = ObjectId::from_hex(hex).unwrap();
        assert_eq!(id.to_hex(), hex);
    }

    #[test]
    fn hex_is_case_insensitive() {
        let lower = ObjectId::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap();
        let upper = ObjectId::from_hex("0123456789ABCDEF0123456789ABCDEF01234567").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn rejects_wrong_length_and_non_hex() {
        assert!(ObjectId::from_hex("abc").is_none());
        assert!(ObjectId::from_hex(&"g".repeat(40)).is_none());
    }

    #[test]
    fn prefix_matching_ignores_case() {
        let id = ObjectId::from_hex("9f3c456789abcdef0123456789abcdef01234567").unwrap();
        assert!(id.matches_prefix("9F3C"));
        assert!(id.matches_prefix("9f3c45"));
        assert!(!id.matches_prefix("9f3d"));
    }

    #[test]
    fn first_two_bytes_are_big_endian() {
        let id = ObjectId::from_hex("9f3c456789abcdef0123456789abcdef01234567").unwrap();
        assert_eq!(id.first_two_bytes(), 0x9f3c);
    }

    #[test]
    fn hex_id_detection() {
        assert!(is_hex_id("abcd"));
        assert!(is_hex_id("9F3C12"));
        assert!(!is_hex_id("abc"));
        assert!(!is_hex_id("main"));
        assert!(!is_hex_id(&"a".repeat(41)));
    }
}
