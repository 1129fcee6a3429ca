use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use crate::keys::{IndexKey, KeyDomain, SecondaryKey};
use crate::{StoreError, StoreResult, not_found, violation};

/// A record stored in a [`Table`].
pub trait Row: Clone {
    fn primary_key(&self) -> u64;
}

type Extractor<R> = Arc<dyn Fn(&R) -> StoreResult<SecondaryKey> + Send + Sync>;

struct IndexDef<R> {
    name: String,
    domain: KeyDomain,
    unique: bool,
    extract: Extractor<R>,
}

impl<R> Clone for IndexDef<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            domain: self.domain,
            unique: self.unique,
            extract: self.extract.clone(),
        }
    }
}

/// Table name plus its secondary index declarations.
///
/// ```ignore
/// let schema = TableSchema::new("sk.multi")
///     .index("i.1", |row: &SkRow| row.i64)
///     .index("d.1", |row: &SkRow| row.d64);
/// ```
pub struct TableSchema<R> {
    name: String,
    indexes: Vec<IndexDef<R>>,
}

impl<R: Row + 'static> TableSchema<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    /// Declare an index that tolerates duplicate keys across rows.
    pub fn index<K: IndexKey + 'static>(self, name: impl Into<String>, getter: fn(&R) -> K) -> Self {
        self.push_index(name.into(), false, getter)
    }

    /// Declare an index whose keys must be unique across rows.
    pub fn unique_index<K: IndexKey + 'static>(
        self,
        name: impl Into<String>,
        getter: fn(&R) -> K,
    ) -> Self {
        self.push_index(name.into(), true, getter)
    }

    fn push_index<K: IndexKey + 'static>(mut self, name: String, unique: bool, getter: fn(&R) -> K) -> Self {
        self.indexes.push(IndexDef {
            name,
            domain: K::DOMAIN,
            unique,
            extract: Arc::new(move |row: &R| getter(row).to_secondary()),
        });
        self
    }

    pub fn build(self) -> Table<R> {
        Table::new(self)
    }
}

struct SecondaryIndex<R> {
    def: IndexDef<R>,
    /// Ordered by `(key, primary)`, mirroring the host's secondary iteration order.
    entries: BTreeSet<(SecondaryKey, u64)>,
    by_primary: BTreeMap<u64, SecondaryKey>,
}

impl<R> Clone for SecondaryIndex<R> {
    fn clone(&self) -> Self {
        Self {
            def: self.def.clone(),
            entries: self.entries.clone(),
            by_primary: self.by_primary.clone(),
        }
    }
}

impl<R> SecondaryIndex<R> {
    fn matches(&self, key: SecondaryKey) -> impl Iterator<Item = u64> + '_ {
        self.entries
            .range((Bound::Included((key, 0u64)), Bound::Included((key, u64::MAX))))
            .map(|(_, id)| *id)
    }

    fn has_other(&self, key: SecondaryKey, id: u64) -> bool {
        self.matches(key).any(|other| other != id)
    }
}

/// Multi-index table: rows by primary key plus any number of secondary indexes.
///
/// Every mutation computes and validates all index keys before touching any
/// structure, so a failed call leaves the table exactly as it was.
pub struct Table<R> {
    name: String,
    rows: BTreeMap<u64, R>,
    next_primary_key: u64,
    indexes: Vec<SecondaryIndex<R>>,
}

impl<R: Clone> Clone for Table<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            rows: self.rows.clone(),
            next_primary_key: self.next_primary_key,
            indexes: self.indexes.clone(),
        }
    }
}

impl<R> fmt::Debug for Table<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("rows", &self.rows.len())
            .field("next_primary_key", &self.next_primary_key)
            .field(
                "indexes",
                &self.indexes.iter().map(|ix| ix.def.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<R: Row> Table<R> {
    pub fn new(schema: TableSchema<R>) -> Self {
        Self {
            name: schema.name,
            rows: BTreeMap::new(),
            next_primary_key: 0,
            indexes: schema
                .indexes
                .into_iter()
                .map(|def| SecondaryIndex {
                    def,
                    entries: BTreeSet::new(),
                    by_primary: BTreeMap::new(),
                })
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Smallest primary key never handed out in this table's lifetime.
    pub fn next_key(&self) -> u64 {
        self.next_primary_key
    }

    /// Insert a row under the next available primary key.
    ///
    /// `build` receives the assigned id and must return a row carrying it.
    pub fn insert(&mut self, build: impl FnOnce(u64) -> R) -> StoreResult<R> {
        let id = self.next_primary_key;
        self.insert_with_id(id, build)
    }

    /// Insert a row under a caller-chosen primary key.
    pub fn insert_with_id(&mut self, id: u64, build: impl FnOnce(u64) -> R) -> StoreResult<R> {
        let row = build(id);
        if row.primary_key() != id {
            return Err(violation(
                &self.name,
                format!("row built for id {id} reports primary key {}", row.primary_key()),
            ));
        }
        if self.rows.contains_key(&id) {
            return Err(violation(&self.name, format!("primary key {id} already exists")));
        }
        let next = id.checked_add(1).ok_or_else(|| {
            violation(&self.name, "next primary key is at the autoincrement limit")
        })?;
        let keys = self.compute_keys(&row, None)?;

        for (index, key) in self.indexes.iter_mut().zip(keys) {
            index.entries.insert((key, id));
            index.by_primary.insert(id, key);
        }
        self.rows.insert(id, row.clone());
        self.next_primary_key = self.next_primary_key.max(next);
        log::debug!("table '{}': inserted row {id}", self.name);
        Ok(row)
    }

    pub fn find_by_primary(&self, id: u64) -> Option<&R> {
        self.rows.get(&id)
    }

    pub fn require_by_primary(&self, id: u64) -> StoreResult<&R> {
        self.rows
            .get(&id)
            .ok_or_else(|| not_found(&self.name, format!("primary key {id}")))
    }

    /// First row (lowest primary key) whose `index` key equals `key`.
    pub fn find_by_secondary<K: IndexKey>(&self, index: &str, key: K) -> StoreResult<Option<&R>> {
        let (ix, key) = self.lookup(index, key)?;
        Ok(self.indexes[ix].matches(key).next().and_then(|id| self.rows.get(&id)))
    }

    /// The single row whose `index` key equals `key`.
    pub fn require_by_secondary<K: IndexKey>(&self, index: &str, key: K) -> StoreResult<&R> {
        let (ix, secondary) = self.lookup(index, key)?;
        let mut matches = self.indexes[ix].matches(secondary);
        let Some(id) = matches.next() else {
            return Err(not_found(&self.name, format!("{index} = {secondary}")));
        };
        if matches.next().is_some() {
            return Err(violation(
                &self.name,
                format!("{index} = {secondary} matches more than one row"),
            ));
        }
        self.require_by_primary(id)
    }

    /// First row in `(key, primary)` order whose `index` key is `>= key`.
    pub fn lower_bound<K: IndexKey>(&self, index: &str, key: K) -> StoreResult<Option<&R>> {
        let (ix, key) = self.lookup(index, key)?;
        Ok(self.indexes[ix]
            .entries
            .range((key, 0u64)..)
            .next()
            .and_then(|(_, id)| self.rows.get(id)))
    }

    /// Apply `mutator` to row `id`, re-indexing any secondary key it changed.
    pub fn modify(&mut self, id: u64, mutator: impl FnOnce(&mut R)) -> StoreResult<R> {
        let current = self.require_by_primary(id)?;
        let mut updated = current.clone();
        mutator(&mut updated);
        if updated.primary_key() != id {
            return Err(violation(
                &self.name,
                format!("modify of row {id} attempted to change its primary key"),
            ));
        }
        let keys = self.compute_keys(&updated, Some(id))?;

        for (index, key) in self.indexes.iter_mut().zip(keys) {
            let previous = index.by_primary.insert(id, key);
            if previous != Some(key) {
                if let Some(old) = previous {
                    index.entries.remove(&(old, id));
                }
                index.entries.insert((key, id));
            }
        }
        self.rows.insert(id, updated.clone());
        log::debug!("table '{}': modified row {id}", self.name);
        Ok(updated)
    }

    /// Remove row `id` and every index entry pointing at it.
    pub fn erase(&mut self, id: u64) -> StoreResult<R> {
        let row = self
            .rows
            .remove(&id)
            .ok_or_else(|| not_found(&self.name, format!("primary key {id}")))?;
        for index in &mut self.indexes {
            if let Some(key) = index.by_primary.remove(&id) {
                index.entries.remove(&(key, id));
            }
        }
        log::debug!("table '{}': erased row {id}", self.name);
        Ok(row)
    }

    /// Rows in primary key order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    /// Recompute every index from the stored rows and compare against the
    /// maintained entries.
    pub fn verify_indexes(&self) -> StoreResult<()> {
        for index in &self.indexes {
            if index.entries.len() != self.rows.len() || index.by_primary.len() != self.rows.len() {
                return Err(violation(
                    &self.name,
                    format!(
                        "index '{}' holds {} entries for {} rows",
                        index.def.name,
                        index.entries.len(),
                        self.rows.len()
                    ),
                ));
            }
            for (id, row) in &self.rows {
                let key = (index.def.extract)(row)?;
                if index.by_primary.get(id) != Some(&key) || !index.entries.contains(&(key, *id)) {
                    return Err(violation(
                        &self.name,
                        format!("index '{}' is stale for row {id}", index.def.name),
                    ));
                }
            }
        }
        Ok(())
    }

    fn lookup<K: IndexKey>(&self, index: &str, key: K) -> StoreResult<(usize, SecondaryKey)> {
        let ix = self
            .indexes
            .iter()
            .position(|candidate| candidate.def.name == index)
            .ok_or_else(|| StoreError::UnknownIndex {
                table: self.name.clone(),
                index: index.to_string(),
            })?;
        let domain = self.indexes[ix].def.domain;
        if K::DOMAIN != domain {
            return Err(StoreError::InvalidKey(format!(
                "index '{index}' of table '{}' expects {domain} keys, got {}",
                self.name,
                K::DOMAIN
            )));
        }
        Ok((ix, key.to_secondary()?))
    }

    /// Extract and validate the keys of `row` for every index. `existing` names
    /// the row being replaced, which does not count against uniqueness.
    fn compute_keys(&self, row: &R, existing: Option<u64>) -> StoreResult<Vec<SecondaryKey>> {
        let id = row.primary_key();
        let mut keys = Vec::with_capacity(self.indexes.len());
        for index in &self.indexes {
            let key = (index.def.extract)(row)?;
            if index.def.unique {
                let clash = match existing {
                    Some(own) => index.has_other(key, own),
                    None => index.matches(key).next().is_some(),
                };
                if clash {
                    return Err(violation(
                        &self.name,
                        format!("duplicate key {key} in unique index '{}' for row {id}", index.def.name),
                    ));
                }
            }
            keys.push(key);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Digest256, ExtFloat};

    #[derive(Debug, Clone, PartialEq)]
    struct Account {
        id: u64,
        owner: u64,
        weight: f64,
        memo: String,
    }

    impl Row for Account {
        fn primary_key(&self) -> u64 {
            self.id
        }
    }

    fn accounts() -> Table<Account> {
        TableSchema::new("accounts")
            .unique_index("byowner", |row: &Account| row.owner)
            .index("byweight", |row: &Account| row.weight)
            .build()
    }

    fn account(id: u64, owner: u64) -> Account {
        Account {
            id,
            owner,
            weight: 1.0,
            memo: String::new(),
        }
    }

    #[test]
    fn insert_assigns_monotonic_keys() {
        let mut table = accounts();
        assert_eq!(table.next_key(), 0);
        let first = table.insert(|id| account(id, 10)).unwrap();
        let second = table.insert(|id| account(id, 11)).unwrap();
        assert_eq!((first.id, second.id), (0, 1));

        table.erase(1).unwrap();
        assert_eq!(table.next_key(), 2, "erased keys are never handed out again");
        let third = table.insert(|id| account(id, 12)).unwrap();
        assert_eq!(third.id, 2);
    }

    #[test]
    fn explicit_ids_bump_the_high_water_mark() {
        let mut table = accounts();
        table.insert_with_id(7, |id| account(id, 1)).unwrap();
        assert_eq!(table.next_key(), 8);
        let err = table.insert_with_id(7, |id| account(id, 2)).unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
        table.insert_with_id(3, |id| account(id, 3)).unwrap();
        assert_eq!(table.next_key(), 8);
    }

    #[test]
    fn unique_collision_leaves_table_untouched() {
        let mut table = accounts();
        table.insert(|id| account(id, 10)).unwrap();
        let err = table.insert(|id| account(id, 10)).unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
        assert_eq!(table.len(), 1);
        assert_eq!(table.next_key(), 1);
        table.verify_indexes().unwrap();
    }

    #[test]
    fn modify_reindexes_changed_keys_only() {
        let mut table = accounts();
        table.insert(|id| account(id, 10)).unwrap();
        table.insert(|id| account(id, 11)).unwrap();

        table.modify(0, |row| row.memo = "memo only".into()).unwrap();
        assert_eq!(table.require_by_secondary("byowner", 10u64).unwrap().memo, "memo only");

        table.modify(0, |row| row.owner = 20).unwrap();
        assert!(table.find_by_secondary("byowner", 10u64).unwrap().is_none());
        assert_eq!(table.require_by_secondary("byowner", 20u64).unwrap().id, 0);

        let err = table.modify(0, |row| row.owner = 11).unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
        assert_eq!(table.require_by_primary(0).unwrap().owner, 20);
        table.verify_indexes().unwrap();
    }

    #[test]
    fn modify_cannot_move_primary_key() {
        let mut table = accounts();
        table.insert(|id| account(id, 10)).unwrap();
        let err = table.modify(0, |row| row.id = 5).unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
        assert!(table.find_by_primary(5).is_none());
    }

    #[test]
    fn nan_keys_are_rejected_atomically() {
        let mut table = accounts();
        table.insert(|id| account(id, 10)).unwrap();
        let err = table
            .insert(|id| Account {
                weight: f64::NAN,
                ..account(id, 11)
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        let err = table.modify(0, |row| row.weight = f64::NAN).unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        assert_eq!(table.require_by_secondary("byweight", 1.0).unwrap().id, 0);
        assert!(matches!(
            table.find_by_secondary("byweight", f64::NAN),
            Err(StoreError::InvalidKey(_))
        ));
        table.verify_indexes().unwrap();
    }

    #[test]
    fn duplicate_keys_resolve_to_lowest_primary() {
        let mut table = accounts();
        for owner in [1, 2, 3] {
            table.insert(|id| account(id, owner)).unwrap();
        }
        assert_eq!(table.find_by_secondary("byweight", 1.0).unwrap().unwrap().id, 0);
        let err = table.require_by_secondary("byweight", 1.0).unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
    }

    #[test]
    fn missing_rows_and_indexes_are_faults() {
        let mut table = accounts();
        assert!(matches!(table.erase(4), Err(StoreError::NotFound { .. })));
        assert!(matches!(table.modify(4, |_| {}), Err(StoreError::NotFound { .. })));
        assert!(matches!(
            table.require_by_secondary("byowner", 9u64),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            table.find_by_secondary("nope", 9u64),
            Err(StoreError::UnknownIndex { .. })
        ));
        assert!(matches!(
            table.find_by_secondary("byowner", 9u128),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn lower_bound_walks_key_order() {
        let mut table = accounts();
        for owner in [30, 10, 20] {
            table.insert(|id| account(id, owner)).unwrap();
        }
        assert_eq!(table.lower_bound("byowner", 15u64).unwrap().unwrap().owner, 20);
        assert_eq!(table.lower_bound("byowner", 0u64).unwrap().unwrap().owner, 10);
        assert!(table.lower_bound("byowner", 31u64).unwrap().is_none());
    }

    #[derive(Debug, Clone)]
    struct Wide {
        id: u64,
        digest: Digest256,
        ext: ExtFloat,
    }

    impl Row for Wide {
        fn primary_key(&self) -> u64 {
            self.id
        }
    }

    #[test]
    fn wide_domains_index_like_the_narrow_ones() {
        let mut table = TableSchema::new("wide")
            .index("c", |row: &Wide| row.digest)
            .index("dd", |row: &Wide| row.ext)
            .build();
        for _ in 0..3 {
            table
                .insert(|id| Wide {
                    id,
                    digest: Digest256::from_words([id as u128, 7]),
                    ext: ExtFloat::from_u64(id).add_f64(4.6),
                })
                .unwrap();
        }
        let again = ExtFloat::from_u64(2).add_f64(4.6);
        assert_eq!(table.require_by_secondary("dd", again).unwrap().id, 2);
        assert_eq!(
            table
                .require_by_secondary("c", Digest256::from_words([1, 7]))
                .unwrap()
                .id,
            1
        );
        let clone = table.clone();
        table.erase(1).unwrap();
        assert_eq!(clone.len(), 3);
        clone.verify_indexes().unwrap();
        table.verify_indexes().unwrap();
    }
}
