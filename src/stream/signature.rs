// Frame signatures and the leftmost-match scanner.
//
// A signature is the fixed magic that opens every encoded frame (for PNG,
// the 8-byte `89 50 4E 47 0D 0A 1A 0A`). Signatures are short and the
// lookahead window is bounded, so a naive sliding comparison is enough.

use std::fmt;
use std::str::FromStr;

/// PNG file signature (RFC 2083, section 3.1).
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Longest signature accepted by [`Signature::new`].
pub const MAX_SIGNATURE_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature must not be empty")]
    Empty,
    #[error("signature is {len} bytes, maximum is {MAX_SIGNATURE_LEN}")]
    TooLong { len: usize },
    #[error("invalid hex signature '{input}': {reason}")]
    InvalidHex { input: String, reason: String },
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Immutable byte sequence marking the start of one encoded frame.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    bytes: Box<[u8]>,
}

impl Signature {
    /// Create a signature from raw bytes.
    pub fn new(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.is_empty() {
            return Err(SignatureError::Empty);
        }
        if bytes.len() > MAX_SIGNATURE_LEN {
            return Err(SignatureError::TooLong { len: bytes.len() });
        }
        Ok(Self {
            bytes: bytes.into(),
        })
    }

    /// The PNG magic.
    pub fn png() -> Self {
        Self {
            bytes: PNG_SIGNATURE.into(),
        }
    }

    /// Parse a hex string such as `"89504e47"` or `"89 50 4E 47"`.
    ///
    /// Whitespace and `:` separators are ignored.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let digits: Vec<u8> = s
            .bytes()
            .filter(|b| !b.is_ascii_whitespace() && *b != b':')
            .collect();
        let invalid = |reason: &str| SignatureError::InvalidHex {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        if digits.len() % 2 != 0 {
            return Err(invalid("odd number of hex digits"));
        }
        let bytes = digits
            .chunks_exact(2)
            .map(|pair| {
                let hi = (pair[0] as char).to_digit(16);
                let lo = (pair[1] as char).to_digit(16);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                    _ => Err(invalid("non-hex character")),
                }
            })
            .collect::<Result<Vec<u8>, _>>()?;
        Self::new(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false: empty signatures are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Leftmost match in `buf` at or after `from`. See [`find_signature`].
    #[inline]
    pub fn find_in(&self, buf: &[u8], from: usize) -> Option<usize> {
        find_signature(buf, &self.bytes, from)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::png()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.bytes.iter() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Find the smallest `i` in `[from, buf.len() - sig.len()]` such that
/// `buf[i..i + sig.len()] == sig`.
///
/// Never matches a signature that would run past the end of `buf`, and
/// always prefers the earliest match over a later one.
pub fn find_signature(buf: &[u8], sig: &[u8], from: usize) -> Option<usize> {
    if sig.is_empty() || buf.len() < sig.len() || from > buf.len() - sig.len() {
        return None;
    }
    let first = sig[0];
    let last_start = buf.len() - sig.len();
    (from..=last_start).find(|&i| buf[i] == first && &buf[i..i + sig.len()] == sig)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
