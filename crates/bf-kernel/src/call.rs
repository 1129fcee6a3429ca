use std::fmt;

use bf_cbor::{Hash, from_cbor, to_canonical_cbor};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::KernelError;

/// Account or action identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    pub fn new(value: impl Into<String>) -> Self {
        Name(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name(value.to_string())
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Name(value)
    }
}

impl From<&Name> for Name {
    fn from(value: &Name) -> Self {
        value.clone()
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// One call: the action `action` on contract `account`, with canonical CBOR
/// call data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub account: Name,
    pub action: Name,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorization: Vec<Name>,
    #[serde(with = "hex_data")]
    pub data: Vec<u8>,
}

impl Call {
    pub fn new<T: Serialize>(
        account: impl Into<Name>,
        action: impl Into<Name>,
        payload: &T,
    ) -> Result<Self, KernelError> {
        let data =
            to_canonical_cbor(payload).map_err(|err| KernelError::PayloadEncode(err.to_string()))?;
        Ok(Self {
            account: account.into(),
            action: action.into(),
            authorization: Vec::new(),
            data,
        })
    }

    /// A call with empty data.
    pub fn bare(account: impl Into<Name>, action: impl Into<Name>) -> Self {
        Self {
            account: account.into(),
            action: action.into(),
            authorization: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn authorized_by(mut self, actor: impl Into<Name>) -> Self {
        self.authorization.push(actor.into());
        self
    }

    /// Context-free calls carry no authority.
    pub fn without_authorization(mut self) -> Self {
        self.authorization.clear();
        self
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, KernelError> {
        from_cbor(&self.data).map_err(|err| KernelError::PayloadDecode {
            account: self.account.clone(),
            action: self.action.clone(),
            reason: err.to_string(),
        })
    }

    pub fn data_hash(&self) -> Hash {
        Hash::of_bytes(&self.data)
    }
}

mod hex_data {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(D::Error::custom)
    }
}
