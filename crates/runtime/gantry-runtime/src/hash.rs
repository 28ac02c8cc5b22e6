//! Order-independent fingerprint of a resource's connection settings.
//!
//! Every string (the connection string, then each parameter key and value) is
//! read as a big-endian two's-complement integer over its UTF-8 bytes, and the
//! integers are folded together with XOR. XOR commutes, so the parameter map's
//! iteration order never changes the result. Declared features are not part of
//! the fingerprint.

use std::fmt;

/// Arbitrary-width two's-complement integer, big-endian, minimally encoded.
/// Zero is the empty byte string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConfigurationHash(Vec<u8>);

impl ConfigurationHash {
    /// Fingerprint of a connection string and its parameters
    pub fn compute<'a, I>(connection_string: &str, parameters: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        parameters
            .into_iter()
            .fold(Self::of_str(connection_string), |acc, (key, value)| {
                acc.xor(&Self::of_str(key)).xor(&Self::of_str(value))
            })
    }

    /// The integer read from the UTF-8 bytes of `s`
    pub fn of_str(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// The integer read from big-endian two's-complement bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(normalize(bytes.to_vec()))
    }

    /// Minimal big-endian two's-complement encoding
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the value is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the value is negative
    pub fn is_negative(&self) -> bool {
        self.0.first().is_some_and(|b| b & 0x80 != 0)
    }

    /// Bitwise XOR of two integers of any width
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        let width = self.0.len().max(other.0.len());
        let a = self.extended(width);
        let b = other.extended(width);
        Self(normalize(a.iter().zip(&b).map(|(x, y)| x ^ y).collect()))
    }

    fn sign_byte(&self) -> u8 {
        if self.is_negative() {
            0xFF
        } else {
            0x00
        }
    }

    fn extended(&self, width: usize) -> Vec<u8> {
        let mut bytes = vec![self.sign_byte(); width - self.0.len()];
        bytes.extend_from_slice(&self.0);
        bytes
    }
}

/// Strip sign-extension bytes that do not change the value
fn normalize(mut bytes: Vec<u8>) -> Vec<u8> {
    let redundant = bytes
        .windows(2)
        .take_while(|pair| matches!((pair[0], pair[1] & 0x80), (0x00, 0) | (0xFF, 0x80)))
        .count();
    bytes.drain(..redundant);
    if bytes == [0x00] {
        bytes.clear();
    }
    bytes
}

impl fmt::Display for ConfigurationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            f.write_str("0")
        } else {
            f.write_str(&hex::encode(&self.0))
        }
    }
}
