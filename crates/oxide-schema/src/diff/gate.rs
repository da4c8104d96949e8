//! Platform capability gating.
//!
//! Rewrites an ordered operation sequence so every step can be expressed
//! on the target platform:
//!
//! - no foreign keys at all: FK operations and inline FKs are removed;
//! - no inline FKs: `CreateTable` FKs move to trailing `AddForeignKey`;
//! - no FK changes on existing tables: FK operations on tables created or
//!   dropped in the same sequence are folded into those operations, the
//!   rest turn the table into a `RecreateTable`;
//! - `Platform::requires_recreate` and primary key membership changes
//!   also rebuild the table.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::error::{Result, SchemaError};
use crate::operation::Operation;
use crate::platform::Platform;
use crate::schema::{ForeignKeySpec, SchemaSpec};

/// Gates `ops` for `platform` and restores bucket order.
pub(crate) fn gate(
    mut ops: Vec<Operation>,
    platform: Option<&dyn Platform>,
    current: &SchemaSpec,
    desired: &SchemaSpec,
) -> Result<Vec<Operation>> {
    let mut recreate = BTreeSet::new();

    if let Some(platform) = platform {
        if platform.supports_foreign_keys() {
            if !platform.supports_inline_foreign_keys() {
                ops = split_inline_foreign_keys(ops, platform)?;
            }
            if !platform.supports_add_foreign_key() || !platform.supports_drop_foreign_key() {
                ops = fold_foreign_keys(ops, platform, &mut recreate)?;
            }
        } else {
            ops = strip_foreign_keys(ops, platform);
        }
    }

    for op in &ops {
        if needs_recreate(op, platform) {
            recreate.insert(op.table().to_string());
        }
    }
    if !recreate.is_empty() {
        let keep_foreign_keys = platform.map_or(true, |p| p.supports_foreign_keys());
        ops = recreate_tables(ops, &recreate, current, desired, keep_foreign_keys);
    }

    ops.sort_by_key(Operation::kind);
    Ok(ops)
}

fn strip_foreign_keys(ops: Vec<Operation>, platform: &dyn Platform) -> Vec<Operation> {
    let mut stripped = 0usize;
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        match op {
            Operation::AddForeignKey { .. } | Operation::DropForeignKey { .. } => stripped += 1,
            Operation::CreateTable(table) => {
                stripped += table.foreign_keys.len();
                out.push(Operation::CreateTable(table.without_foreign_keys()));
            }
            Operation::DropTable(table) => {
                stripped += table.foreign_keys.len();
                out.push(Operation::DropTable(table.without_foreign_keys()));
            }
            other => out.push(other),
        }
    }
    if stripped > 0 {
        warn!(
            platform = platform.name(),
            foreign_keys = stripped,
            "Platform has no foreign keys, skipping"
        );
    }
    out
}

fn split_inline_foreign_keys(ops: Vec<Operation>, platform: &dyn Platform) -> Result<Vec<Operation>> {
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        match op {
            Operation::CreateTable(mut table) if !table.foreign_keys.is_empty() => {
                if !platform.supports_add_foreign_key() {
                    return Err(SchemaError::ConfigurationError(format!(
                        "{} supports neither inline nor added foreign keys (table {})",
                        platform.name(),
                        table.name
                    )));
                }
                let foreign_keys = std::mem::take(&mut table.foreign_keys);
                let name = table.name.clone();
                out.push(Operation::CreateTable(table));
                out.extend(
                    foreign_keys
                        .into_iter()
                        .map(|fk| Operation::add_foreign_key(&name, fk)),
                );
            }
            Operation::DropTable(mut table)
                if !table.foreign_keys.is_empty() && platform.supports_drop_foreign_key() =>
            {
                let foreign_keys = std::mem::take(&mut table.foreign_keys);
                out.extend(
                    foreign_keys
                        .into_iter()
                        .map(|fk| Operation::drop_foreign_key(&table.name, fk)),
                );
                out.push(Operation::DropTable(table));
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn fold_foreign_keys(
    ops: Vec<Operation>,
    platform: &dyn Platform,
    recreate: &mut BTreeSet<String>,
) -> Result<Vec<Operation>> {
    let created: BTreeSet<String> = ops
        .iter()
        .filter_map(|op| match op {
            Operation::CreateTable(t) => Some(t.name.clone()),
            _ => None,
        })
        .collect();
    let dropped: BTreeSet<String> = ops
        .iter()
        .filter_map(|op| match op {
            Operation::DropTable(t) => Some(t.name.clone()),
            _ => None,
        })
        .collect();

    let mut folded: BTreeMap<String, Vec<ForeignKeySpec>> = BTreeMap::new();
    let mut absorbed: BTreeMap<String, Vec<ForeignKeySpec>> = BTreeMap::new();
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        match op {
            Operation::AddForeignKey { table, foreign_key } if !platform.supports_add_foreign_key() => {
                if created.contains(&table) {
                    if !platform.supports_inline_foreign_keys() {
                        return Err(SchemaError::ConfigurationError(format!(
                            "{} cannot add foreign key {} to {table}",
                            platform.name(),
                            foreign_key.name
                        )));
                    }
                    folded.entry(table).or_default().push(foreign_key);
                } else {
                    recreate.insert(table.clone());
                    out.push(Operation::AddForeignKey { table, foreign_key });
                }
            }
            Operation::DropForeignKey { table, foreign_key } if !platform.supports_drop_foreign_key() => {
                if dropped.contains(&table) {
                    absorbed.entry(table).or_default().push(foreign_key);
                } else {
                    recreate.insert(table.clone());
                    out.push(Operation::DropForeignKey { table, foreign_key });
                }
            }
            other => out.push(other),
        }
    }

    for op in &mut out {
        match op {
            Operation::CreateTable(table) => {
                if let Some(fks) = folded.remove(&table.name) {
                    debug!(table = %table.name, foreign_keys = fks.len(), "Folding foreign keys into CREATE TABLE");
                    table.foreign_keys.extend(fks);
                }
            }
            Operation::DropTable(table) => {
                if let Some(fks) = absorbed.remove(&table.name) {
                    table.foreign_keys.extend(fks);
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

fn changes_primary_key(op: &Operation) -> bool {
    match op {
        Operation::ModifyColumn { old, new, .. } => old.primary_key != new.primary_key,
        Operation::AddColumn { column, .. } | Operation::DropColumn { column, .. } => {
            column.primary_key
        }
        _ => false,
    }
}

/// Both directions are checked so the inverse sequence stays expressible.
fn needs_recreate(op: &Operation, platform: Option<&dyn Platform>) -> bool {
    match op {
        Operation::CreateTable(_) | Operation::DropTable(_) | Operation::RecreateTable { .. } => {
            false
        }
        _ => {
            changes_primary_key(op)
                || platform.is_some_and(|p| {
                    p.requires_recreate(op) || p.requires_recreate(&op.inverse())
                })
        }
    }
}

fn recreate_tables(
    ops: Vec<Operation>,
    tables: &BTreeSet<String>,
    current: &SchemaSpec,
    desired: &SchemaSpec,
    keep_foreign_keys: bool,
) -> Vec<Operation> {
    let mut out: Vec<Operation> = ops
        .into_iter()
        .filter(|op| !tables.contains(op.table()))
        .collect();
    for name in tables {
        let (Some(old), Some(new)) = (current.table(name), desired.table(name)) else {
            continue;
        };
        debug!(table = %name, "Recreating table");
        let (old, new) = if keep_foreign_keys {
            (old.clone(), new.clone())
        } else {
            (old.without_foreign_keys(), new.without_foreign_keys())
        };
        out.push(Operation::RecreateTable { old, new });
    }
    out
}
