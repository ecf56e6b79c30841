//! License payload types: the V2 signed envelope and the decoded result
//! shape shared by both V1 and V2 keys.

use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::LicenseCodecError;

/// License tier, either the free tier or a pro tier with an embedded device
/// count (`PRO-N`). Serializes to/from the wire string form used in both V1
/// tier strings and the V2 `t` payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Free,
    Pro(u32),
}

impl Tier {
    pub fn as_wire_string(&self) -> String {
        match self {
            Tier::Free => "FREE".to_string(),
            Tier::Pro(n) => format!("PRO-{n}"),
        }
    }

    pub fn parse(s: &str) -> Result<Self, LicenseCodecError> {
        if s.eq_ignore_ascii_case("free") {
            return Ok(Tier::Free);
        }
        let Some(n) = s.strip_prefix("PRO-").or_else(|| s.strip_prefix("pro-")) else {
            return Err(LicenseCodecError::MalformedKey(format!(
                "unrecognized tier string: {s}"
            )));
        };
        let n: u32 = n
            .parse()
            .map_err(|_| LicenseCodecError::MalformedKey(format!("invalid tier device count: {n}")))?;
        Ok(Tier::Pro(n))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_wire_string())
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_wire_string())
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Tier::parse(&s).map_err(de::Error::custom)
    }
}

/// The V2 payload embedded (compressed, signed) in an `LK-2-...` key.
///
/// Field names are kept short (`t`, `d`, `c`, `e`, `i`) because they are
/// serialized into the signed, size-bounded wire body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicensePayloadV2 {
    /// Format version, always `2`.
    pub v: u8,
    /// Tier.
    pub t: Tier,
    /// Device cap (`maxDevices`).
    pub d: u32,
    /// Company name, if embedded.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub c: Option<String>,
    /// Expiry date, if the license is time-bounded.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub e: Option<NaiveDate>,
    /// Issue date.
    pub i: NaiveDate,
}

impl LicensePayloadV2 {
    pub fn new(tier: Tier, max_devices: u32, issued_at: NaiveDate) -> Self {
        Self {
            v: 2,
            t: tier,
            d: max_devices,
            c: None,
            e: None,
            i: issued_at,
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.c = Some(company.into());
        self
    }

    pub fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.e = Some(expiry);
        self
    }
}

/// Result of a successful [`crate::decode`] call. V1 keys carry only a tier;
/// resolving `maxDevices` for V1 is the License Service's job (it falls back
/// to the stored row / tier-derived default), not the codec's.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedLicense {
    V1 { tier: Tier },
    V2(LicensePayloadV2),
}

impl PartialEq for LicensePayloadV2 {
    fn eq(&self, other: &Self) -> bool {
        self.v == other.v
            && self.t == other.t
            && self.d == other.d
            && self.c == other.c
            && self.e == other.e
            && self.i == other.i
    }
}
