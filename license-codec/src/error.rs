//! Error types for license key encode/decode.

use thiserror::Error;

/// Failure modes for [`crate::decode`]. All are non-fatal: callers surface
/// them to the user/log rather than panicking.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LicenseCodecError {
    /// The key does not match the `LK-<version>-...` structure, is not
    /// printable ASCII, exceeds the wire length bound, or its body fails to
    /// base64url-decode, decompress, or JSON-parse.
    #[error("malformed license key: {0}")]
    MalformedKey(String),

    /// The recomputed signature does not match the one embedded in the key.
    #[error("license key signature invalid")]
    InvalidSignature,

    /// The key's version prefix is not `1` or `2`.
    #[error("unsupported license key version: {0}")]
    UnsupportedVersion(u8),
}

pub type LicenseCodecResult<T> = Result<T, LicenseCodecError>;
