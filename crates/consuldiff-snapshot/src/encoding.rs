//! Value encodings for persisted snapshots.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt::Debug;

/// How a KV value's bytes are rendered as snapshot text.
pub trait Encoding: Debug + Clone + Copy + Default + Send + Sync + 'static {
    /// Short name used in log fields.
    const NAME: &'static str;

    /// Render raw value bytes as text.
    fn encode(bytes: &[u8]) -> String;
}

/// Values as text. Invalid UTF-8 sequences become U+FFFD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Raw;

impl Encoding for Raw {
    const NAME: &'static str = "raw";

    fn encode(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Values as standard padded base64, byte-exact for binary data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Base64;

impl Base64 {
    /// Decode a value previously produced by [`Base64::encode`].
    pub fn decode(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(value)
    }
}

impl Encoding for Base64 {
    const NAME: &'static str = "base64";

    fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }
}
