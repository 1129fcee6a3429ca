//! Serialize `u128` fields as `0x`-prefixed hex strings.
//!
//! CBOR integers stop at 64 bits, so wide keys travel as text in journals
//! and trace documents.

use serde::{Deserialize, Deserializer, Serializer, de::Error};

pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{value:#034x}"))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| D::Error::custom(format!("u128 '{text}' missing 0x prefix")))?;
    u128::from_str_radix(digits, 16).map_err(D::Error::custom)
}
