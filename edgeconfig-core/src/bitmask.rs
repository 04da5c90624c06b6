//! Bitmask tables
//!
//! Rows of `flags`, `hydraflags` and `snwgroup` name bit positions in a
//! 64-bit column of a wide table: row id `n` is bit `n - 1`.

use log::info;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::table::{BitmaskTarget, TableDescriptor};
use crate::validate::ValidationErrors;

/// Number of bits in a mask column, and so the most rows a bitmask table holds
pub const MAX_BITS: i64 = 64;

/// The single-bit mask for a 1-based row id, `None` outside 1..=64
pub fn bit_for_id(id: i64) -> Option<i64> {
    if (1..=MAX_BITS).contains(&id) {
        Some(1i64 << (id - 1))
    } else {
        None
    }
}

/// Row ids whose bits are set in `mask`, ascending
pub fn ids_in_mask(mask: i64) -> Vec<i64> {
    (1..=MAX_BITS)
        .filter(|id| mask & (1i64 << (id - 1)) != 0)
        .collect()
}

/// Rejects adding another row once the highest id has reached the last bit
pub fn check_capacity(table: &TableDescriptor, max_id: i64, errors: &mut ValidationErrors) {
    if table.is_bitmask() && max_id >= MAX_BITS {
        errors.push(
            table.key_column(),
            format!(
                "Bitmap capacity exhausted: {} already uses id {} and at most {} bits fit in the mask",
                table.name, max_id, MAX_BITS
            ),
        );
    }
}

fn target_of(table: &TableDescriptor) -> Result<BitmaskTarget> {
    table
        .bitmask
        .ok_or_else(|| Error::NotBitmask(table.name.to_string()))
}

fn mask_for(table: &TableDescriptor, id: i64) -> Result<i64> {
    bit_for_id(id).ok_or_else(|| {
        Error::Config(format!(
            "{} id {} does not map to a bit (1-{})",
            table.name, id, MAX_BITS
        ))
    })
}

/// Clears the bit of row `id` in every row of the target table with a single
/// UPDATE. Returns the number of rows that actually changed.
pub fn clear_bit_in_all(db: &Database, table: &TableDescriptor, id: i64) -> Result<usize> {
    let target = target_of(table)?;
    let mask = mask_for(table, id)?;
    let sql = format!(
        "UPDATE {t} SET {c} = {c} & ?1 WHERE ({c} & ?2) != 0",
        t = target.table,
        c = target.column
    );
    let changed = db.lock().execute(&sql, [!mask, mask])?;
    info!(
        "Cleared bit {} of {}.{} in {} row(s)",
        id - 1,
        target.table,
        target.column,
        changed
    );
    Ok(changed)
}

/// How many rows of the target table currently have the bit of row `id` set
pub fn count_bit_users(db: &Database, table: &TableDescriptor, id: i64) -> Result<usize> {
    let target = target_of(table)?;
    let mask = mask_for(table, id)?;
    let sql = format!(
        "SELECT COUNT(*) FROM {t} WHERE ({c} & ?1) != 0",
        t = target.table,
        c = target.column
    );
    let n: i64 = db.lock().query_row(&sql, [mask], |row| row.get(0))?;
    Ok(n as usize)
}
