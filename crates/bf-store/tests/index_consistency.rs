use anyhow::Result;
use bf_store::{DIGEST_SUFFIX, Digest256, ExtFloat, Row, StoreError, Table, TableSchema};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
struct Sk {
    id: u64,
    i64: u64,
    i128: u128,
    d64: f64,
    d128: ExtFloat,
    c256: Digest256,
    unrelated: u64,
}

impl Row for Sk {
    fn primary_key(&self) -> u64 {
        self.id
    }
}

fn multi() -> Table<Sk> {
    let mut schema = TableSchema::new("sk.multi");
    for n in 1..=3 {
        schema = schema
            .index(format!("i.{n}"), |row: &Sk| row.i64)
            .index(format!("ii.{n}"), |row: &Sk| row.i128)
            .index(format!("d.{n}"), |row: &Sk| row.d64)
            .index(format!("dd.{n}"), |row: &Sk| row.d128)
            .index(format!("c.{n}"), |row: &Sk| row.c256);
    }
    schema.index("i.4", |row: &Sk| row.i64).build()
}

fn seeded(id: u64) -> Sk {
    Sk {
        id,
        i64: id + 1,
        i128: id as u128 + 2,
        d64: id as f64 + 3.1,
        d128: ExtFloat::from_u64(id).add_f64(4.6),
        c256: Digest256::from_words([id as u128 + 5, DIGEST_SUFFIX]),
        unrelated: 0,
    }
}

/// Every live row must be reachable through every index under its current
/// key, and every index must hold exactly one entry per row.
fn assert_consistent(table: &Table<Sk>) -> Result<()> {
    table.verify_indexes()?;
    for row in table.iter() {
        for n in 1..=3 {
            let by_i = table.find_by_secondary(&format!("i.{n}"), row.i64)?;
            assert_eq!(by_i.map(|r| r.id), Some(row.id));
            let by_ii = table.find_by_secondary(&format!("ii.{n}"), row.i128)?;
            assert_eq!(by_ii.map(|r| r.id), Some(row.id));
            let by_d = table.find_by_secondary(&format!("d.{n}"), row.d64)?;
            assert_eq!(by_d.map(|r| r.id), Some(row.id));
            let by_dd = table.find_by_secondary(&format!("dd.{n}"), row.d128)?;
            assert_eq!(by_dd.map(|r| r.id), Some(row.id));
            let by_c = table.find_by_secondary(&format!("c.{n}"), row.c256)?;
            assert_eq!(by_c.map(|r| r.id), Some(row.id));
        }
        assert_eq!(table.require_by_secondary("i.4", row.i64)?.id, row.id);
    }
    Ok(())
}

#[test]
fn mixed_operation_sequence_keeps_every_index_in_sync() -> Result<()> {
    let mut table = multi();
    let mut handed_out = Vec::new();
    let mut rng = StdRng::seed_from_u64(0x2545_F491_4F6C_DD1D);

    for step in 0..200u64 {
        let live: Vec<u64> = table.iter().map(|row| row.id).collect();
        match rng.gen_range(0..4) {
            0 | 1 => {
                let key = table.next_key();
                assert!(!handed_out.contains(&key), "key {key} reused at step {step}");
                let row = table.insert(seeded)?;
                handed_out.push(row.id);
            }
            2 if !live.is_empty() => {
                let id = live[rng.gen_range(0..live.len())];
                table.modify(id, |row| {
                    row.i64 += 1_000;
                    row.i128 += 2_000;
                    row.d64 += 1_000.5;
                    row.d128 = row.d128.add_f64(1_000.5);
                    row.c256 = Digest256::from_words([row.id as u128, 10_000 + step as u128]);
                })?;
            }
            3 if !live.is_empty() => {
                let id = live[rng.gen_range(0..live.len())];
                let removed = table.erase(id)?;
                assert!(table.find_by_secondary("i.1", removed.i64)?.is_none());
                assert!(table.find_by_secondary("c.2", removed.c256)?.is_none());
            }
            _ => {}
        }
        assert_consistent(&table)?;
    }
    Ok(())
}

#[test]
fn non_indexed_change_leaves_keys_alone() -> Result<()> {
    let mut table = multi();
    table.insert(seeded)?;
    table.modify(0, |row| row.unrelated = row.id + 6)?;
    let row = table.require_by_secondary("dd.2", ExtFloat::from_u64(0).add_f64(4.6))?;
    assert_eq!(row.unrelated, 6);
    assert_consistent(&table)
}

#[test]
fn failed_modify_keeps_previous_keys() -> Result<()> {
    let mut table = multi();
    table.insert(seeded)?;
    let err = table
        .modify(0, |row| {
            row.i64 = 99;
            row.d64 = f64::NAN;
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidKey(_)));
    assert!(table.find_by_secondary("i.1", 99u64)?.is_none());
    assert_eq!(table.require_by_secondary("i.4", 1u64)?.id, 0);
    assert_consistent(&table)
}
