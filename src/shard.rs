//! Orderer / Sharder
//!
//! Collapses SCCs into units, sorts the units dependencies first and, for
//! large graphs, packs the sorted units into contiguous shards. A unit is
//! never split across shards.

use crate::config::ShardingConfig;
use crate::graph::{BindingGraph, NodeId};
use crate::key::TypeKey;
use crate::topology;
use serde::Serialize;

/// A contiguous run of initialization units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shard {
    pub index: usize,
    pub bindings: Vec<TypeKey>,
    pub unit_count: usize,
}

impl Shard {
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Initialization order of one graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitializationOrder {
    /// Collapsed SCC units, dependencies first
    pub units: Vec<Vec<TypeKey>>,
    /// Empty unless the graph exceeded the shard threshold
    pub shards: Vec<Shard>,
}

impl InitializationOrder {
    /// Flattened binding order
    pub fn order(&self) -> Vec<&TypeKey> {
        self.units.iter().flatten().collect()
    }

    pub fn len(&self) -> usize {
        self.units.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn is_sharded(&self) -> bool {
        !self.shards.is_empty()
    }

    /// Units with more than one member (cycles broken by a deferred edge)
    pub fn cyclic_units(&self) -> usize {
        self.units.iter().filter(|u| u.len() > 1).count()
    }
}

pub struct Sharder {
    config: ShardingConfig,
}

impl Sharder {
    pub fn new(config: ShardingConfig) -> Self {
        Self { config }
    }

    pub fn order(&self, graph: &BindingGraph) -> InitializationOrder {
        // Absent optionals and parent-owned bindings are not initialized here
        let included: Vec<bool> = graph
            .bindings()
            .map(|b| !b.is_absent() && !b.provenance.is_inherited())
            .collect();
        let adjacency = graph.adjacency(|_| true);
        let direct = graph.adjacency(|edge| !edge.is_deferrable());
        let condensation = topology::condense(&adjacency, &direct, &included);

        let key_of = |n: &usize| graph.node(NodeId(*n as u32)).key.clone();
        let units: Vec<Vec<TypeKey>> = condensation
            .units
            .iter()
            .map(|unit| unit.iter().map(key_of).collect())
            .collect();

        let orderable = condensation.node_count();
        let shards = if self.config.enabled && orderable > self.config.keys_per_shard {
            let sizes: Vec<usize> = units.iter().map(Vec::len).collect();
            let groups = partition(&sizes, self.config.keys_per_shard, self.config.rebalance_target);
            tracing::debug!(
                "{}: {} orderable binding(s) split into {} shard(s)",
                graph.name(),
                orderable,
                groups.len()
            );
            groups
                .into_iter()
                .enumerate()
                .map(|(index, range)| Shard {
                    index,
                    bindings: units[range.clone()].iter().flatten().cloned().collect(),
                    unit_count: range.len(),
                })
                .collect()
        } else {
            Vec::new()
        };

        InitializationOrder { units, shards }
    }
}

/// Pack unit sizes into contiguous index ranges.
///
/// Greedy up to `limit`; a unit bigger than `limit` gets a range of its own.
/// Ranges smaller than `rebalance_target` then merge into the previous range,
/// or into the next one for the first range.
pub fn partition(sizes: &[usize], limit: usize, rebalance_target: usize) -> Vec<std::ops::Range<usize>> {
    let limit = limit.max(1);
    let mut groups: Vec<std::ops::Range<usize>> = Vec::new();
    let mut start = 0;
    let mut current = 0;

    for (i, size) in sizes.iter().enumerate() {
        if i > start && current + size > limit {
            groups.push(start..i);
            start = i;
            current = 0;
        }
        current += size;
    }
    if start < sizes.len() {
        groups.push(start..sizes.len());
    }

    let weight = |range: &std::ops::Range<usize>| sizes[range.clone()].iter().sum::<usize>();
    let mut merged: Vec<std::ops::Range<usize>> = Vec::with_capacity(groups.len());
    for group in groups {
        match merged.last_mut() {
            Some(previous) if weight(&group) < rebalance_target => {
                tracing::debug!("Merging undersized shard {:?} into {:?}", group, previous);
                previous.end = group.end;
            }
            _ => merged.push(group),
        }
    }
    if merged.len() > 1 && weight(&merged[0]) < rebalance_target {
        let first = merged.remove(0);
        merged[0].start = first.start;
    }
    merged
}
