//! The `sktest` sequence over the secondary-key tables.
//!
//! Steps are expected in the order `insert`, `update.sk`, `update.ot`,
//! `remove`; every lookup targets the row the previous step left behind.

use bf_kernel::{KernelError, check};
use bf_store::{DIGEST_SUFFIX, Digest256, ExtFloat, Table};

use crate::tables::{BattlefieldTables, SkRow};

fn digest(word: u64) -> Digest256 {
    Digest256::from_words([u128::from(word), DIGEST_SUFFIX])
}

/// Primary key of the most recently inserted row.
fn last(table: &Table<SkRow>) -> u64 {
    table.next_key().wrapping_sub(1)
}

pub fn run(tables: &mut BattlefieldTables, action: &str) -> Result<(), KernelError> {
    match action {
        "insert" => insert(tables),
        "update.sk" => update_keys(tables),
        "update.ot" => update_others(tables),
        "remove" => remove(tables),
        _ => check(
            false,
            "The action must be one of insert, update.ot, update.sk or remove",
        ),
    }
}

fn insert(tables: &mut BattlefieldTables) -> Result<(), KernelError> {
    tables.sk_i64.insert(|id| SkRow {
        i64: id.wrapping_add(1),
        ..SkRow::empty(id)
    })?;
    tables.sk_i128.insert(|id| SkRow {
        i128: u128::from(id) + 2,
        ..SkRow::empty(id)
    })?;
    tables.sk_d64.insert(|id| SkRow {
        d64: id as f64 + 3.1,
        ..SkRow::empty(id)
    })?;
    tables.sk_d128.insert(|id| SkRow {
        d128: ExtFloat::from_u64(id).add_f64(4.6),
        ..SkRow::empty(id)
    })?;
    tables.sk_c256.insert(|id| SkRow {
        c256: digest(id.wrapping_add(5)),
        ..SkRow::empty(id)
    })?;
    // c256 stays zeroed on every multi row, so its digest indexes hold duplicates.
    tables.sk_multi.insert(|id| SkRow {
        i64: id.wrapping_add(1),
        i128: u128::from(id) + 2,
        d64: id as f64 + 3.1,
        d128: ExtFloat::from_u64(id).add_f64(4.6),
        ..SkRow::empty(id)
    })?;
    Ok(())
}

fn update_keys(tables: &mut BattlefieldTables) -> Result<(), KernelError> {
    let key = last(&tables.sk_i64).wrapping_add(1);
    let id = tables.sk_i64.require_by_secondary("i", key)?.id;
    tables.sk_i64.modify(id, |row| row.i64 = row.i64.wrapping_add(1))?;

    let key = u128::from(last(&tables.sk_i128)) + 2;
    let id = tables.sk_i128.require_by_secondary("ii", key)?.id;
    tables.sk_i128.modify(id, |row| row.i128 += 2)?;

    let key = last(&tables.sk_d64) as f64 + 3.1;
    let id = tables.sk_d64.require_by_secondary("d", key)?.id;
    tables.sk_d64.modify(id, |row| row.d64 += 3.2)?;

    let key = ExtFloat::from_u64(last(&tables.sk_d128)).add_f64(4.6);
    let id = tables.sk_d128.require_by_secondary("dd", key)?.id;
    tables.sk_d128.modify(id, |row| row.d128 = row.d128.add_f64(4.7))?;

    let key = digest(last(&tables.sk_c256).wrapping_add(5));
    let id = tables.sk_c256.require_by_secondary("c", key)?.id;
    tables
        .sk_c256
        .modify(id, |row| row.c256 = digest(row.id.wrapping_add(10)))?;

    let id = tables.sk_multi.require_by_primary(last(&tables.sk_multi))?.id;
    tables.sk_multi.modify(id, |row| {
        row.i64 = row.i64.wrapping_add(1);
        row.i128 += 2;
        row.d64 += 3.2;
        row.d128 = row.d128.add_f64(4.7);
    })?;
    Ok(())
}

/// Ids of the rows `update.sk` moved, looked up through each table's index.
struct Updated {
    i64: u64,
    i128: u64,
    d64: u64,
    d128: u64,
    c256: u64,
    multi: u64,
}

fn find_updated(tables: &BattlefieldTables) -> Result<Updated, KernelError> {
    let i64 = tables
        .sk_i64
        .require_by_secondary("i", last(&tables.sk_i64).wrapping_add(2))?
        .id;
    let i128 = tables
        .sk_i128
        .require_by_secondary("ii", u128::from(last(&tables.sk_i128)) + 4)?
        .id;
    let d64 = tables
        .sk_d64
        .require_by_secondary("d", last(&tables.sk_d64) as f64 + 3.1 + 3.2)?
        .id;
    let d128_key = ExtFloat::from_u64(last(&tables.sk_d128))
        .add_f64(4.6)
        .add_f64(4.7);
    let d128 = tables.sk_d128.require_by_secondary("dd", d128_key)?.id;
    let c256 = tables
        .sk_c256
        .require_by_secondary("c", digest(last(&tables.sk_c256).wrapping_add(10)))?
        .id;
    let multi = tables.sk_multi.require_by_primary(last(&tables.sk_multi))?.id;
    Ok(Updated {
        i64,
        i128,
        d64,
        d128,
        c256,
        multi,
    })
}

fn update_others(tables: &mut BattlefieldTables) -> Result<(), KernelError> {
    let ids = find_updated(tables)?;
    tables
        .sk_i64
        .modify(ids.i64, |row| row.unrelated = row.id.wrapping_add(1))?;
    tables
        .sk_i128
        .modify(ids.i128, |row| row.unrelated = row.id.wrapping_add(2))?;
    tables
        .sk_d64
        .modify(ids.d64, |row| row.unrelated = row.id.wrapping_add(3))?;
    tables
        .sk_d128
        .modify(ids.d128, |row| row.unrelated = row.id.wrapping_add(4))?;
    tables
        .sk_c256
        .modify(ids.c256, |row| row.unrelated = row.id.wrapping_add(5))?;
    tables
        .sk_multi
        .modify(ids.multi, |row| row.unrelated = row.id.wrapping_add(6))?;
    Ok(())
}

fn remove(tables: &mut BattlefieldTables) -> Result<(), KernelError> {
    let ids = find_updated(tables)?;
    tables.sk_i64.erase(ids.i64)?;
    tables.sk_i128.erase(ids.i128)?;
    tables.sk_d64.erase(ids.d64)?;
    tables.sk_d128.erase(ids.d128)?;
    tables.sk_c256.erase(ids.c256)?;
    tables.sk_multi.erase(ids.multi)?;
    Ok(())
}
