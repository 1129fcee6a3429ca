//! 64-bit account names: up to twelve base-32 characters plus a thirteenth
//! 4-bit one, the encoding the `byaccount` index orders by.

use std::fmt;
use std::str::FromStr;

use bf_kernel::{KernelError, Name};
use bf_store::StoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use thiserror::Error;

const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("account name '{0}' is longer than 13 characters")]
    TooLong(String),
    #[error("account name '{name}' contains invalid character {ch:?}")]
    InvalidChar { name: String, ch: char },
    #[error("account name '{0}' has a 13th character outside [.1-5a-j]")]
    BadLastChar(String),
}

impl From<NameError> for KernelError {
    fn from(err: NameError) -> Self {
        KernelError::Store(StoreError::InvalidKey(err.to_string()))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountName(u64);

impl AccountName {
    pub const fn from_value(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn to_name(&self) -> Name {
        Name::new(self.to_string())
    }
}

fn symbol(ch: u8) -> Option<u64> {
    match ch {
        b'a'..=b'z' => Some(u64::from(ch - b'a') + 6),
        b'1'..=b'5' => Some(u64::from(ch - b'1') + 1),
        b'.' => Some(0),
        _ => None,
    }
}

impl FromStr for AccountName {
    type Err = NameError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bytes = text.as_bytes();
        if bytes.len() > 13 {
            return Err(NameError::TooLong(text.to_string()));
        }
        let mut value = 0u64;
        for (ix, &ch) in bytes.iter().enumerate() {
            let sym = symbol(ch).ok_or_else(|| NameError::InvalidChar {
                name: text.to_string(),
                ch: ch as char,
            })?;
            if ix < 12 {
                value |= (sym & 0x1f) << (64 - 5 * (ix + 1));
            } else {
                if sym > 0x0f {
                    return Err(NameError::BadLastChar(text.to_string()));
                }
                value |= sym;
            }
        }
        Ok(Self(value))
    }
}

impl TryFrom<&Name> for AccountName {
    type Error = NameError;

    fn try_from(name: &Name) -> Result<Self, Self::Error> {
        name.as_str().parse()
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = [b'.'; 13];
        let mut rest = self.0;
        for ix in 0..13 {
            let (mask, shift) = if ix == 0 { (0x0f, 4) } else { (0x1f, 5) };
            out[12 - ix] = CHARMAP[(rest & mask) as usize];
            rest >>= shift;
        }
        let end = out.iter().rposition(|&ch| ch != b'.').map_or(0, |pos| pos + 1);
        let text: String = out[..end].iter().map(|&ch| ch as char).collect();
        f.write_str(&text)
    }
}

impl fmt::Debug for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountName({self})")
    }
}

impl Serialize for AccountName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}
