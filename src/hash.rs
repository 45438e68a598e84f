//! The 40-character hex object identifier.
//!
//! Mostly used as a path fragment, so it is kept as validated ASCII bytes
//! rather than round-tripping through raw `u8` arrays on every use.

use std::fmt;
use std::path::PathBuf;

use crate::error::Error;

/// A full, validated 40-character lowercase hex object identifier.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObjectId(Box<[u8; 40]>);

impl ObjectId {
    /// Splits the id into its fan-out directory name and remaining filename.
    pub fn split_fanout(&self) -> (&str, &str) {
        self.as_str().split_at(2)
    }

    /// Returns the path of this object under `objects/`, relative to the
    /// repository's metadata directory.
    pub fn relative_object_path(&self) -> PathBuf {
        let (dir, rest) = self.split_fanout();
        PathBuf::from("objects").join(dir).join(rest)
    }

    /// Borrows the identifier as a `str`.
    pub fn as_str(&self) -> &str {
        // SAFETY: construction only ever stores validated ASCII hex digits.
        unsafe { std::str::from_utf8_unchecked(self.0.as_slice()) }
    }

    /// Builds an identifier from the SHA-1 digest's 20 raw bytes.
    pub fn from_raw20(raw: &[u8; 20]) -> Self {
        let mut hex = [0u8; 40];
        base16ct::lower::encode(raw, &mut hex).expect("40-byte buffer fits a 20-byte hex encode");
        ObjectId(Box::new(hex))
    }

    /// Decodes this identifier back into its 20 raw bytes, as used by the
    /// tree codec.
    pub fn to_raw20(&self) -> [u8; 20] {
        let mut raw = [0u8; 20];
        base16ct::lower::decode(self.0.as_slice(), &mut raw)
            .expect("a validated ObjectId is always exactly 40 hex digits");
        raw
    }
}

/// Returns `true` if `s` is a valid short identifier: a hex string of
/// length 4 through 40 inclusive.
pub fn is_short_identifier(s: &str) -> bool {
    (4..=40).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Returns `true` if `s` is exactly 40 lowercase hex digits.
pub fn is_full_hex(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

impl TryFrom<&str> for ObjectId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if !is_full_hex(value) {
            return Err(Error::InvalidArgument(format!(
                "{value:?} is not a 40-character lowercase hex object id"
            )));
        }
        let hex: Box<[u8; 40]> = value
            .as_bytes()
            .to_vec()
            .into_boxed_slice()
            .try_into()
            .expect("length already checked above");
        Ok(ObjectId(hex))
    }
}

impl TryFrom<String> for ObjectId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ObjectId::try_from(value.as_str())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.as_str())
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
