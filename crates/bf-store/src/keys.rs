use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

use crate::{StoreError, StoreResult};

/// Fixed low word mixed into every digest key the fixture builds.
pub const DIGEST_SUFFIX: u128 = 0xFFAABB00DDEE1122_0033445500FFAA22;

/// Key domain an index is declared over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDomain {
    U64,
    U128,
    F64,
    ExtFloat,
    Digest256,
}

impl fmt::Display for KeyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            KeyDomain::U64 => "u64",
            KeyDomain::U128 => "u128",
            KeyDomain::F64 => "f64",
            KeyDomain::ExtFloat => "ext_float",
            KeyDomain::Digest256 => "digest256",
        };
        f.write_str(text)
    }
}

/// A validated secondary key. All keys stored in one index share a domain,
/// so the derived cross-variant order never comes into play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecondaryKey {
    U64(u64),
    U128(u128),
    F64(F64Key),
    ExtFloat(ExtFloat),
    Digest256(Digest256),
}

impl fmt::Display for SecondaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecondaryKey::U64(v) => write!(f, "{v}"),
            SecondaryKey::U128(v) => write!(f, "{v:#x}"),
            SecondaryKey::F64(v) => write!(f, "{}", v.get()),
            SecondaryKey::ExtFloat(v) => write!(f, "{v}"),
            SecondaryKey::Digest256(v) => write!(f, "{v}"),
        }
    }
}

/// Values usable as secondary keys.
pub trait IndexKey: Copy {
    const DOMAIN: KeyDomain;

    fn to_secondary(self) -> StoreResult<SecondaryKey>;
}

impl IndexKey for u64 {
    const DOMAIN: KeyDomain = KeyDomain::U64;

    fn to_secondary(self) -> StoreResult<SecondaryKey> {
        Ok(SecondaryKey::U64(self))
    }
}

impl IndexKey for u128 {
    const DOMAIN: KeyDomain = KeyDomain::U128;

    fn to_secondary(self) -> StoreResult<SecondaryKey> {
        Ok(SecondaryKey::U128(self))
    }
}

impl IndexKey for f64 {
    const DOMAIN: KeyDomain = KeyDomain::F64;

    fn to_secondary(self) -> StoreResult<SecondaryKey> {
        F64Key::new(self).map(SecondaryKey::F64)
    }
}

impl IndexKey for ExtFloat {
    const DOMAIN: KeyDomain = KeyDomain::ExtFloat;

    fn to_secondary(self) -> StoreResult<SecondaryKey> {
        if self.is_nan() {
            return Err(StoreError::InvalidKey(
                "NaN is not a valid ext_float key".into(),
            ));
        }
        Ok(SecondaryKey::ExtFloat(self))
    }
}

impl IndexKey for Digest256 {
    const DOMAIN: KeyDomain = KeyDomain::Digest256;

    fn to_secondary(self) -> StoreResult<SecondaryKey> {
        Ok(SecondaryKey::Digest256(self))
    }
}

/// Non-NaN `f64` with `-0.0` folded into `0.0`.
#[derive(Debug, Clone, Copy)]
pub struct F64Key(f64);

impl F64Key {
    pub fn new(value: f64) -> StoreResult<Self> {
        if value.is_nan() {
            return Err(StoreError::InvalidKey("NaN is not a valid f64 key".into()));
        }
        Ok(F64Key(value + 0.0))
    }

    pub fn get(&self) -> f64 {
        self.0
    }
}

impl PartialEq for F64Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for F64Key {}

impl PartialOrd for F64Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for F64Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for F64Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Extended-precision float stored as an unevaluated sum `hi + lo` of two
/// doubles (106 significand bits).
///
/// Values are kept normalized: `hi == hi + lo` in double arithmetic, which
/// makes the representation unique and lets ordering compare `hi` then `lo`.
/// A non-finite value carries `lo == 0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "ExtFloatParts")]
pub struct ExtFloat {
    hi: f64,
    lo: f64,
}

impl ExtFloat {
    pub const ZERO: ExtFloat = ExtFloat { hi: 0.0, lo: 0.0 };

    pub fn from_f64(value: f64) -> Self {
        ExtFloat { hi: value + 0.0, lo: 0.0 }
    }

    /// Exact conversion: every `u64` fits in 106 bits.
    pub fn from_u64(value: u64) -> Self {
        let hi = value as f64;
        let lo = (value as i128 - hi as i128) as f64;
        Self::normalized(hi, lo)
    }

    pub fn add_f64(self, rhs: f64) -> Self {
        let (s, e) = two_sum(self.hi, rhs);
        if !s.is_finite() {
            return ExtFloat { hi: s, lo: 0.0 };
        }
        Self::normalized(s, e + self.lo)
    }

    pub fn add(self, rhs: ExtFloat) -> Self {
        let (s, e) = two_sum(self.hi, rhs.hi);
        if !s.is_finite() {
            return ExtFloat { hi: s, lo: 0.0 };
        }
        let (t, f) = two_sum(self.lo, rhs.lo);
        let (s, e) = quick_two_sum(s, e + t);
        Self::normalized(s, e + f)
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    /// Nearest double.
    pub fn to_f64(&self) -> f64 {
        self.hi
    }

    pub fn is_nan(&self) -> bool {
        self.hi.is_nan() || self.lo.is_nan()
    }

    fn normalized(hi: f64, lo: f64) -> Self {
        let (hi, lo) = quick_two_sum(hi, lo);
        ExtFloat {
            hi: hi + 0.0,
            lo: lo + 0.0,
        }
    }
}

/// Wire form of [`ExtFloat`], checked on the way in.
#[derive(Deserialize)]
struct ExtFloatParts {
    hi: f64,
    lo: f64,
}

impl TryFrom<ExtFloatParts> for ExtFloat {
    type Error = StoreError;

    fn try_from(ExtFloatParts { hi, lo }: ExtFloatParts) -> StoreResult<Self> {
        if hi.is_nan() || lo.is_nan() {
            return Err(StoreError::InvalidKey("extended float is NaN".into()));
        }
        let normalized = if hi.is_finite() { hi + lo == hi } else { lo == 0.0 };
        if !normalized {
            return Err(StoreError::InvalidKey(format!(
                "extended float ({hi}, {lo}) is not normalized"
            )));
        }
        Ok(ExtFloat {
            hi: hi + 0.0,
            lo: lo + 0.0,
        })
    }
}

fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    let err = (a - (s - bb)) + (b - bb);
    (s, err)
}

fn quick_two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let err = b - (s - a);
    (s, err)
}

impl PartialEq for ExtFloat {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ExtFloat {}

impl PartialOrd for ExtFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExtFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hi
            .total_cmp(&other.hi)
            .then_with(|| self.lo.total_cmp(&other.lo))
    }
}

impl Hash for ExtFloat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hi.to_bits().hash(state);
        self.lo.to_bits().hash(state);
    }
}

impl fmt::Display for ExtFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lo == 0.0 {
            write!(f, "{}", self.hi)
        } else {
            write!(f, "{}{:+e}", self.hi, self.lo)
        }
    }
}

/// 256-bit digest ordered as an unsigned big-endian integer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Digest256([u8; 32]);

impl Digest256 {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Digest256(bytes)
    }

    /// Build from two 128-bit words, most significant first.
    pub fn from_words(words: [u128; 2]) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&words[0].to_be_bytes());
        bytes[16..].copy_from_slice(&words[1].to_be_bytes());
        Digest256(bytes)
    }

    pub fn words(&self) -> [u128; 2] {
        let mut hi = [0u8; 16];
        let mut lo = [0u8; 16];
        hi.copy_from_slice(&self.0[..16]);
        lo.copy_from_slice(&self.0[16..]);
        [u128::from_be_bytes(hi), u128::from_be_bytes(lo)]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Digest256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Digest256").field(&hex::encode(self.0)).finish()
    }
}

impl fmt::Display for Digest256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for Digest256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Digest256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&text, &mut bytes).map_err(D::Error::custom)?;
        Ok(Digest256(bytes))
    }
}
