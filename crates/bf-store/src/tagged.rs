use serde::{Deserialize, Serialize};

use crate::table::{Row, Table, TableSchema};
use crate::{StoreResult, violation};

/// Most rows one `bulk_append` call may produce.
pub const MAX_BULK_ROWS: u64 = 1 << 16;

/// Closed set of numeric alternatives a tagged row may hold.
///
/// The active alternative is kept as-is; values are never widened into a
/// common representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VariantValue {
    Int8(i8),
    Uint16(u16),
    Uint32(u32),
    Int32(i32),
}

impl VariantValue {
    /// Zero-based position of the active alternative.
    pub fn index(&self) -> usize {
        match self {
            VariantValue::Int8(_) => 0,
            VariantValue::Uint16(_) => 1,
            VariantValue::Uint32(_) => 2,
            VariantValue::Int32(_) => 3,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            VariantValue::Int8(_) => "int8",
            VariantValue::Uint16(_) => "uint16",
            VariantValue::Uint32(_) => "uint32",
            VariantValue::Int32(_) => "int32",
        }
    }
}

/// A default-constructed variant holds its first alternative.
impl Default for VariantValue {
    fn default() -> Self {
        VariantValue::Int8(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedRow {
    pub id: u64,
    pub variant: VariantValue,
    /// Caller-supplied ordering tag; unrelated to `id`.
    pub sequence: u64,
}

impl Row for TaggedRow {
    fn primary_key(&self) -> u64 {
        self.id
    }
}

/// Append-only log of tagged rows on top of a plain [`Table`].
#[derive(Debug, Clone)]
pub struct TaggedLog {
    table: Table<TaggedRow>,
}

impl TaggedLog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: TableSchema::new(name).build(),
        }
    }

    pub fn append(&mut self, sequence: u64, variant: VariantValue) -> StoreResult<TaggedRow> {
        self.table.insert(|id| TaggedRow {
            id,
            variant,
            sequence,
        })
    }

    /// Append `count` rows; row `i` gets sequence `i` and the alternative
    /// chosen by `generate(i)`. Returns the assigned ids.
    ///
    /// Fails with `ConstraintViolation` when `count` exceeds [`MAX_BULK_ROWS`].
    pub fn bulk_append(
        &mut self,
        count: u64,
        mut generate: impl FnMut(u64) -> VariantValue,
    ) -> StoreResult<Vec<u64>> {
        if count > MAX_BULK_ROWS {
            return Err(violation(
                self.table.name(),
                format!("bulk append of {count} rows exceeds {MAX_BULK_ROWS}"),
            ));
        }
        let mut ids = Vec::new();
        for i in 0..count {
            let row = self.append(i, generate(i))?;
            ids.push(row.id);
        }
        Ok(ids)
    }

    pub fn get(&self, id: u64) -> Option<&TaggedRow> {
        self.table.find_by_primary(id)
    }

    pub fn require(&self, id: u64) -> StoreResult<&TaggedRow> {
        self.table.require_by_primary(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaggedRow> {
        self.table.iter()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

}
