//! Encode/decode of `LK-<version>-...` license keys.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use subtle::ConstantTimeEq;

use crate::error::{LicenseCodecError, LicenseCodecResult};
use crate::payload::{DecodedLicense, LicensePayloadV2, Tier};

type HmacSha256 = Hmac<Sha256>;

/// Maximum wire length for a license key (§6: bounded at 512 bytes).
const MAX_KEY_LEN: usize = 512;

/// Encode a V2 payload into `LK-2-<b64url>-<SIG8>`.
pub fn encode(payload: &LicensePayloadV2, installation_secret: &[u8]) -> LicenseCodecResult<String> {
    let json = serde_json::to_vec(payload)
        .map_err(|e| LicenseCodecError::MalformedKey(format!("payload serialization: {e}")))?;

    let compressed = gzip_compress(&json)
        .map_err(|e| LicenseCodecError::MalformedKey(format!("compression: {e}")))?;

    let body = URL_SAFE_NO_PAD.encode(compressed);
    let sig = sign(body.as_bytes(), installation_secret);

    Ok(format!("LK-2-{body}-{sig}"))
}

/// Decode a `LK-1-...` or `LK-2-...` key.
///
/// V1 keys are accepted for backward-compatible *validation* of pre-existing
/// rows; whether they may be used for new activations is a policy decision
/// left to the License Service (see DESIGN.md).
pub fn decode(key: &str, installation_secret: &[u8]) -> LicenseCodecResult<DecodedLicense> {
    let key = key.trim();

    if key.is_empty() || !key.is_ascii() || key.len() > MAX_KEY_LEN {
        return Err(LicenseCodecError::MalformedKey(
            "key must be non-empty, printable ASCII, and at most 512 bytes".to_string(),
        ));
    }

    let rest = key
        .strip_prefix("LK-")
        .ok_or_else(|| LicenseCodecError::MalformedKey("missing LK- prefix".to_string()))?;

    let (version_str, rest) = rest
        .split_once('-')
        .ok_or_else(|| LicenseCodecError::MalformedKey("missing version segment".to_string()))?;

    let version: u8 = version_str
        .parse()
        .map_err(|_| LicenseCodecError::MalformedKey(format!("invalid version: {version_str}")))?;

    match version {
        1 => decode_v1(rest),
        2 => decode_v2(rest, installation_secret),
        other => Err(LicenseCodecError::UnsupportedVersion(other)),
    }
}

fn decode_v2(rest: &str, installation_secret: &[u8]) -> LicenseCodecResult<DecodedLicense> {
    // The base64url body itself may contain '-' (it is part of the URL-safe
    // alphabet), so the signature — a fixed 8 hex characters with no
    // dashes — is peeled off the tail rather than split positionally.
    let (body, sig) = rest
        .rsplit_once('-')
        .ok_or_else(|| LicenseCodecError::MalformedKey("missing signature segment".to_string()))?;

    if sig.len() != 8 || !sig.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(LicenseCodecError::MalformedKey(
            "signature must be 8 hex characters".to_string(),
        ));
    }

    let expected = sign(body.as_bytes(), installation_secret);
    if expected.as_bytes().ct_eq(sig.as_bytes().to_ascii_uppercase().as_slice()).unwrap_u8() == 0 {
        return Err(LicenseCodecError::InvalidSignature);
    }

    let compressed = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|e| LicenseCodecError::MalformedKey(format!("invalid base64url body: {e}")))?;

    let json = gzip_decompress(&compressed)
        .map_err(|e| LicenseCodecError::MalformedKey(format!("decompression failed: {e}")))?;

    let payload: LicensePayloadV2 = serde_json::from_slice(&json)
        .map_err(|e| LicenseCodecError::MalformedKey(format!("invalid payload JSON: {e}")))?;

    if payload.v != 2 {
        return Err(LicenseCodecError::UnsupportedVersion(payload.v));
    }

    Ok(DecodedLicense::V2(payload))
}

fn decode_v1(rest: &str) -> LicenseCodecResult<DecodedLicense> {
    // `<TIER>-<RANDOM>-<CKSUM4>`. TIER itself may contain a dash (`PRO-10`),
    // so the two trailing segments are peeled from the right and whatever
    // remains on the left is the tier string.
    let mut parts = rest.rsplitn(3, '-');
    let cksum4 = parts
        .next()
        .ok_or_else(|| LicenseCodecError::MalformedKey("missing checksum segment".to_string()))?;
    let random = parts
        .next()
        .ok_or_else(|| LicenseCodecError::MalformedKey("missing random segment".to_string()))?;
    let tier_str = parts
        .next()
        .ok_or_else(|| LicenseCodecError::MalformedKey("missing tier segment".to_string()))?;

    if cksum4.len() != 4 || !cksum4.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(LicenseCodecError::MalformedKey(
            "checksum must be 4 hex characters".to_string(),
        ));
    }

    let expected_cksum = v1_checksum(tier_str, random);
    if !expected_cksum.eq_ignore_ascii_case(cksum4) {
        return Err(LicenseCodecError::MalformedKey(
            "V1 checksum mismatch".to_string(),
        ));
    }

    let tier = Tier::parse(tier_str)?;
    Ok(DecodedLicense::V1 { tier })
}

fn v1_checksum(tier: &str, random: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tier.as_bytes());
    hasher.update(b"-");
    hasher.update(random.as_bytes());
    let digest = hasher.finalize();
    hex::encode_upper(&digest[..2])
}

fn sign(body: &[u8], installation_secret: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(installation_secret).expect("HMAC accepts any key length");
    mac.update(body);
    let tag = mac.finalize().into_bytes();
    hex::encode_upper(&tag[..4])
}

fn gzip_compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gzip_decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::read::GzDecoder;

    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SECRET: &[u8] = b"installation-secret-test-key";

    fn sample_payload() -> LicensePayloadV2 {
        LicensePayloadV2::new(Tier::Pro(10), 10, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
    }

    #[test]
    fn round_trips_v2() {
        let payload = sample_payload();
        let key = encode(&payload, SECRET).unwrap();
        assert!(key.starts_with("LK-2-"));

        let decoded = decode(&key, SECRET).unwrap();
        match decoded {
            DecodedLicense::V2(p) => assert_eq!(p, payload),
            DecodedLicense::V1 { .. } => panic!("expected V2"),
        }
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let key = encode(&sample_payload(), SECRET).unwrap();
        let err = decode(&key, b"a-different-secret").unwrap_err();
        assert_eq!(err, LicenseCodecError::InvalidSignature);
    }

    #[test]
    fn single_bit_flip_is_invalid_signature() {
        let mut key = encode(&sample_payload(), SECRET).unwrap();
        // Flip one character in the base64url body (not in the LK-2- prefix
        // or the trailing signature) to simulate a single corrupted byte.
        let flip_at = key.find('-').unwrap() + 3;
        let mut bytes = key.into_bytes();
        bytes[flip_at] ^= 0x01;
        // Keep it ASCII/valid-ish so we exercise signature mismatch, not
        // base64 decode failure, where possible.
        key = String::from_utf8(bytes).unwrap();
        let err = decode(&key, SECRET);
        assert!(matches!(
            err,
            Err(LicenseCodecError::InvalidSignature) | Err(LicenseCodecError::MalformedKey(_))
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = decode("LK-9-abc-DEADBEEF", SECRET).unwrap_err();
        assert_eq!(err, LicenseCodecError::UnsupportedVersion(9));
    }

    #[test]
    fn rejects_malformed_structure() {
        assert!(matches!(
            decode("not-a-license-key", SECRET),
            Err(LicenseCodecError::MalformedKey(_))
        ));
        assert!(matches!(
            decode("LK-2-onlyonepart", SECRET),
            Err(LicenseCodecError::MalformedKey(_))
        ));
    }

    #[test]
    fn decodes_v1_free_tier() {
        let tier = "FREE";
        let random = "A1B2C3D4";
        let cksum = v1_checksum(tier, random);
        let key = format!("LK-1-{tier}-{random}-{cksum}");

        let decoded = decode(&key, SECRET).unwrap();
        assert_eq!(decoded, DecodedLicense::V1 { tier: Tier::Free });
    }

    #[test]
    fn decodes_v1_pro_tier_with_embedded_dash() {
        let tier = "PRO-25";
        let random = "FEEDFACE";
        let cksum = v1_checksum(tier, random);
        let key = format!("LK-1-{tier}-{random}-{cksum}");

        let decoded = decode(&key, SECRET).unwrap();
        assert_eq!(decoded, DecodedLicense::V1 { tier: Tier::Pro(25) });
    }

    #[test]
    fn v1_checksum_mismatch_is_malformed() {
        let key = "LK-1-FREE-A1B2C3D4-0000";
        assert!(matches!(
            decode(key, SECRET),
            Err(LicenseCodecError::MalformedKey(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_payloads_round_trip(max_devices in 0u32..10_000, days_offset in 0i64..3650) {
            let issued = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(days_offset);
            let payload = LicensePayloadV2::new(Tier::Pro(max_devices), max_devices, issued);
            let key = encode(&payload, SECRET).unwrap();
            let decoded = decode(&key, SECRET).unwrap();
            match decoded {
                DecodedLicense::V2(p) => assert_eq!(p, payload),
                DecodedLicense::V1 { .. } => panic!("expected V2"),
            }
        }
    }
}
