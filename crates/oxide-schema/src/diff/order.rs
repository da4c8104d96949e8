//! Dependency ordering of created and dropped tables.
//!
//! Tables are nodes and foreign keys edges from the referenced table to
//! the referencing one. Strongly connected components with more than one
//! table are reference cycles; the foreign keys inside a cycle are split
//! off so the remaining graph is acyclic and can be sorted with Kahn's
//! algorithm. Self-references never form an edge.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::schema::{ForeignKeySpec, TableSpec};

/// Foreign keys split off a table to break a reference cycle.
pub(crate) type SplitForeignKeys = Vec<(String, ForeignKeySpec)>;

/// Orders new tables so every referenced table comes first. Returns the
/// ordered tables (with intra-cycle foreign keys removed) and the removed
/// foreign keys, to be added once every table exists.
pub(crate) fn order_creates(tables: Vec<TableSpec>) -> (Vec<TableSpec>, SplitForeignKeys) {
    let (tables, split) = break_cycles(tables);
    (topological_sort(tables), split)
}

/// Orders dropped tables so referencing tables go first. Returns the
/// ordered tables (with intra-cycle foreign keys removed) and the removed
/// foreign keys, to be dropped before any table.
pub(crate) fn order_drops(tables: Vec<TableSpec>) -> (Vec<TableSpec>, SplitForeignKeys) {
    let (tables, split) = break_cycles(tables);
    let mut sorted = topological_sort(tables);
    sorted.reverse();
    (sorted, split)
}

/// Table names grouped by reference cycle, keyed by member.
fn cycle_members(tables: &[TableSpec]) -> BTreeMap<&str, usize> {
    let names: BTreeSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in &names {
        graph.add_node(*name);
    }
    for table in tables {
        for referenced in table.referenced_tables() {
            if names.contains(referenced) {
                graph.add_edge(referenced, table.name.as_str(), ());
            }
        }
    }

    let mut members = BTreeMap::new();
    for (component, scc) in tarjan_scc(&graph).into_iter().enumerate() {
        if scc.len() > 1 {
            for name in scc {
                members.insert(name, component);
            }
        }
    }
    members
}

fn break_cycles(mut tables: Vec<TableSpec>) -> (Vec<TableSpec>, SplitForeignKeys) {
    let cycles: BTreeMap<String, usize> = cycle_members(&tables)
        .into_iter()
        .map(|(name, component)| (name.to_string(), component))
        .collect();
    if cycles.is_empty() {
        return (tables, Vec::new());
    }

    let mut split = Vec::new();
    for table in &mut tables {
        let Some(component) = cycles.get(&table.name) else {
            continue;
        };
        let (inside, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut table.foreign_keys)
                .into_iter()
                .partition(|fk| {
                    fk.referenced_table != table.name
                        && cycles.get(&fk.referenced_table) == Some(component)
                });
        table.foreign_keys = kept;
        split.extend(inside.into_iter().map(|fk| (table.name.clone(), fk)));
    }
    split.sort_by(|a, b| (&a.0, &a.1.name).cmp(&(&b.0, &b.1.name)));
    (tables, split)
}

/// Kahn's algorithm; ties are broken by table name.
fn topological_sort(tables: Vec<TableSpec>) -> Vec<TableSpec> {
    let mut by_name: BTreeMap<String, TableSpec> =
        tables.into_iter().map(|t| (t.name.clone(), t)).collect();

    let mut in_degree: BTreeMap<String, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, table) in &by_name {
        let deps: Vec<&str> = table
            .referenced_tables()
            .into_iter()
            .filter(|r| by_name.contains_key(*r))
            .collect();
        in_degree.insert(name.clone(), deps.len());
        for dep in deps {
            dependents.entry(dep.to_string()).or_default().push(name.clone());
        }
    }

    let mut ready: BTreeSet<String> = in_degree
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(name, _)| name.clone())
        .collect();

    let mut sorted = Vec::with_capacity(by_name.len());
    while let Some(name) = ready.pop_first() {
        if let Some(children) = dependents.get(&name) {
            for child in children {
                if let Some(count) = in_degree.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(child.clone());
                    }
                }
            }
        }
        if let Some(table) = by_name.remove(&name) {
            sorted.push(table);
        }
    }
    // Only reachable with cycles that were not broken.
    sorted.extend(by_name.into_values());
    sorted
}
