use std::collections::BTreeMap;

use bf_cbor::Hash;
use bf_kernel::Name;
use bf_store::{Digest256, ExtFloat, Row, Table, TableSchema, TaggedLog, TaggedRow};
use serde::{Deserialize, Serialize};

use crate::FixtureError;
use crate::account::AccountName;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRow {
    pub id: u64,
    pub account: AccountName,
    pub memo: String,
    /// Seconds of logical time at insert.
    pub created_at: u32,
}

impl Row for MemberRow {
    fn primary_key(&self) -> u64 {
        self.id
    }
}

/// One row shape shared by every secondary-key table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkRow {
    pub id: u64,
    pub i64: u64,
    #[serde(with = "bf_store::serde_u128")]
    pub i128: u128,
    pub d64: f64,
    pub d128: ExtFloat,
    pub c256: Digest256,
    pub unrelated: u64,
}

impl SkRow {
    pub fn empty(id: u64) -> Self {
        Self {
            id,
            i64: 0,
            i128: 0,
            d64: 0.0,
            d128: ExtFloat::ZERO,
            c256: Digest256::default(),
            unrelated: 0,
        }
    }
}

impl Row for SkRow {
    fn primary_key(&self) -> u64 {
        self.id
    }
}

fn sk_multi() -> Table<SkRow> {
    let mut schema = TableSchema::new("sk.multi");
    for n in 1..=3 {
        schema = schema
            .index(format!("i.{n}"), |row: &SkRow| row.i64)
            .index(format!("ii.{n}"), |row: &SkRow| row.i128)
            .index(format!("d.{n}"), |row: &SkRow| row.d64)
            .index(format!("dd.{n}"), |row: &SkRow| row.d128)
            .index(format!("c.{n}"), |row: &SkRow| row.c256);
    }
    schema.index("i.4", |row: &SkRow| row.i64).build()
}

/// Tables of one contract account.
#[derive(Debug, Clone)]
pub struct BattlefieldTables {
    pub members: Table<MemberRow>,
    pub variants: TaggedLog,
    pub sk_i64: Table<SkRow>,
    pub sk_i128: Table<SkRow>,
    pub sk_d64: Table<SkRow>,
    pub sk_d128: Table<SkRow>,
    pub sk_c256: Table<SkRow>,
    pub sk_multi: Table<SkRow>,
}

impl Default for BattlefieldTables {
    fn default() -> Self {
        Self::new()
    }
}

impl BattlefieldTables {
    pub fn new() -> Self {
        Self {
            members: TableSchema::new("member")
                .index("byaccount", |row: &MemberRow| row.account.value())
                .build(),
            variants: TaggedLog::new("variant"),
            sk_i64: TableSchema::new("sk.i")
                .index("i", |row: &SkRow| row.i64)
                .build(),
            sk_i128: TableSchema::new("sk.ii")
                .index("ii", |row: &SkRow| row.i128)
                .build(),
            sk_d64: TableSchema::new("sk.d")
                .index("d", |row: &SkRow| row.d64)
                .build(),
            sk_d128: TableSchema::new("sk.dd")
                .index("dd", |row: &SkRow| row.d128)
                .build(),
            sk_c256: TableSchema::new("sk.c")
                .index("c", |row: &SkRow| row.c256)
                .build(),
            sk_multi: sk_multi(),
        }
    }

    pub fn witness(&self) -> ScopeWitness {
        ScopeWitness {
            members: self.members.iter().cloned().collect(),
            variant: self.variants.iter().cloned().collect(),
            sk_i64: self.sk_i64.iter().cloned().collect(),
            sk_i128: self.sk_i128.iter().cloned().collect(),
            sk_d64: self.sk_d64.iter().cloned().collect(),
            sk_d128: self.sk_d128.iter().cloned().collect(),
            sk_c256: self.sk_c256.iter().cloned().collect(),
            sk_multi: self.sk_multi.iter().cloned().collect(),
        }
    }
}

/// Contract state of every account, keyed by the account owning the tables.
#[derive(Debug, Clone, Default)]
pub struct ChainState {
    scopes: BTreeMap<Name, BattlefieldTables>,
}

impl ChainState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&self, account: &Name) -> Option<&BattlefieldTables> {
        self.scopes.get(account)
    }

    pub fn scope_mut(&mut self, account: &Name) -> &mut BattlefieldTables {
        self.scopes.entry(account.clone()).or_default()
    }

    pub fn witness(&self) -> StateWitness {
        StateWitness {
            scopes: self
                .scopes
                .iter()
                .map(|(account, tables)| (account.to_string(), tables.witness()))
                .filter(|(_, witness)| !witness.is_empty())
                .collect(),
        }
    }
}

/// Rows of every table in primary-key order; empty tables are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeWitness {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variant: Vec<TaggedRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sk_i64: Vec<SkRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sk_i128: Vec<SkRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sk_d64: Vec<SkRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sk_d128: Vec<SkRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sk_c256: Vec<SkRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sk_multi: Vec<SkRow>,
}

impl ScopeWitness {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
            && self.variant.is_empty()
            && self.sk_i64.is_empty()
            && self.sk_i128.is_empty()
            && self.sk_d64.is_empty()
            && self.sk_d128.is_empty()
            && self.sk_c256.is_empty()
            && self.sk_multi.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateWitness {
    pub scopes: BTreeMap<String, ScopeWitness>,
}

impl StateWitness {
    pub fn hash(&self) -> Result<Hash, FixtureError> {
        Hash::of_cbor(self).map_err(|err| FixtureError::Witness(err.to_string()))
    }
}
