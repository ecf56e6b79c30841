//! Signed, self-describing license key encode/decode.
//!
//! A key is either a legacy `LK-1-<TIER>-<RANDOM>-<CKSUM4>` string (decode
//! only) or a `LK-2-<body>-<SIG8>` string whose body is a gzip-compressed,
//! base64url-encoded, HMAC-SHA256-signed JSON payload.

mod codec;
mod error;
mod payload;

pub use codec::{decode, encode};
pub use error::{LicenseCodecError, LicenseCodecResult};
pub use payload::{DecodedLicense, LicensePayloadV2, Tier};
