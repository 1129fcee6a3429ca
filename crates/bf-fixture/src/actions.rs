//! Call payloads of the battlefield actions.

use serde::{Deserialize, Serialize};

use crate::account::AccountName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountArg {
    pub account: AccountName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoRows {
    pub account: AccountName,
    pub first: u64,
    pub second: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dtrx {
    pub account: AccountName,
    pub fail_now: bool,
    pub fail_later: bool,
    pub fail_later_nested: bool,
    pub delay_sec: u32,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtrxExec {
    pub account: AccountName,
    pub fail: bool,
    pub fail_nested: bool,
    pub nonce: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailArg {
    pub fail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreaOrder {
    pub n1: AccountName,
    pub n2: AccountName,
    pub n3: AccountName,
    pub n4: AccountName,
    pub n5: AccountName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineEmpty {
    pub tag: String,
    pub fail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineDeep {
    pub tag: String,
    pub n4: AccountName,
    pub n5: AccountName,
    pub nested_inline_tag: String,
    pub nested_inline_fail: bool,
    pub nested_cfa_inline_tag: String,
}

/// Payload of `varianttest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VariantArg {
    Uint16(u16),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceRows {
    pub row_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkTest {
    pub action: String,
}

impl SkTest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }
}
