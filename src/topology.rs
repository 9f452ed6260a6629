//! Topology - SCCs and deterministic ordering over index arrays
//!
//! Edges point from a consumer to its dependency, so "dependencies first"
//! is the initialization order. All functions take plain successor arrays
//! (`adjacency[node] = successors`) produced by `BindingGraph::adjacency`.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, VecDeque};

const UNVISITED: usize = usize::MAX;

/// Tarjan's algorithm, iterative so deep graphs cannot overflow the stack.
///
/// Each component is sorted by node index. Components come out sinks first.
pub fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut components = Vec::new();
    let mut next = 0usize;
    // (node, position of the next successor to visit)
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if index[start] != UNVISITED {
            continue;
        }
        index[start] = next;
        lowlink[start] = next;
        next += 1;
        stack.push(start);
        on_stack[start] = true;
        frames.push((start, 0));

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if let Some(&w) = adjacency[v].get(frame.1) {
                frame.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = next;
                    lowlink[w] = next;
                    next += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                components.push(component);
            }
        }
    }

    components
}

/// Whether a component forms a cycle: more than one member, or a self-loop.
pub fn is_cyclic(adjacency: &[Vec<usize>], component: &[usize]) -> bool {
    match component {
        [single] => adjacency[*single].contains(single),
        _ => component.len() > 1,
    }
}

/// Shortest cycle through `start` using only nodes of `component`.
///
/// Returns `[start, .., start]`, or `None` when `start` is on no cycle.
pub fn cycle_through(adjacency: &[Vec<usize>], component: &[usize], start: usize) -> Option<Vec<usize>> {
    let members: BTreeSet<usize> = component.iter().copied().collect();
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for &next in &adjacency[node] {
            if !members.contains(&next) {
                continue;
            }
            if next == start {
                let mut path = vec![node];
                let mut current = node;
                while let Some(previous) = parent.get(&current) {
                    current = *previous;
                    path.push(current);
                }
                path.reverse();
                path.push(start);
                return Some(path);
            }
            if !parent.contains_key(&next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    None
}

/// Collapsed SCCs in initialization order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condensation {
    /// Units in order; members of each unit in their own construction order
    pub units: Vec<Vec<usize>>,
}

impl Condensation {
    pub fn node_count(&self) -> usize {
        self.units.iter().map(Vec::len).sum()
    }

    /// Flattened node order
    pub fn order(&self) -> Vec<usize> {
        self.units.iter().flatten().copied().collect()
    }
}

/// Collapse SCCs of `adjacency` into units and sort them dependencies first.
///
/// Ties among independent units go to the unit holding the lowest node
/// index. Inside a unit, members are ordered along `direct` edges only, so
/// the value reached through a deferred edge is instantiated last.
pub fn condense(adjacency: &[Vec<usize>], direct: &[Vec<usize>], included: &[bool]) -> Condensation {
    let restricted: Vec<Vec<usize>> = adjacency
        .iter()
        .enumerate()
        .map(|(node, succ)| {
            if !included[node] {
                return Vec::new();
            }
            succ.iter().copied().filter(|s| included[*s]).collect()
        })
        .collect();

    let components: Vec<Vec<usize>> = strongly_connected_components(&restricted)
        .into_iter()
        .filter(|c| c.iter().all(|n| included[*n]))
        .collect();

    let mut unit_of = vec![UNVISITED; adjacency.len()];
    for (unit, members) in components.iter().enumerate() {
        for node in members {
            unit_of[*node] = unit;
        }
    }

    // pending[u] = distinct dependency units of u not yet emitted
    let mut pending = vec![0usize; components.len()];
    let mut consumers: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
    for (unit, members) in components.iter().enumerate() {
        let deps: BTreeSet<usize> = members
            .iter()
            .flat_map(|n| restricted[*n].iter())
            .map(|s| unit_of[*s])
            .filter(|u| *u != unit)
            .collect();
        pending[unit] = deps.len();
        for dep in deps {
            consumers[dep].insert(unit);
        }
    }

    let mut ready: BinaryHeap<Reverse<(usize, usize)>> = components
        .iter()
        .enumerate()
        .filter(|(unit, _)| pending[*unit] == 0)
        .map(|(unit, members)| Reverse((members[0], unit)))
        .collect();

    let mut units = Vec::with_capacity(components.len());
    while let Some(Reverse((_, unit))) = ready.pop() {
        units.push(order_within(&components[unit], direct));
        for consumer in &consumers[unit] {
            pending[*consumer] -= 1;
            if pending[*consumer] == 0 {
                ready.push(Reverse((components[*consumer][0], *consumer)));
            }
        }
    }

    Condensation { units }
}

/// Order the members of one unit along `direct` edges, lowest index first
/// among ready members.
fn order_within(members: &[usize], direct: &[Vec<usize>]) -> Vec<usize> {
    if members.len() == 1 {
        return members.to_vec();
    }
    let member_set: BTreeSet<usize> = members.iter().copied().collect();
    let mut remaining: BTreeSet<usize> = member_set.clone();
    let mut ordered = Vec::with_capacity(members.len());

    while !remaining.is_empty() {
        let next = remaining
            .iter()
            .copied()
            .find(|node| {
                direct[*node]
                    .iter()
                    .all(|dep| *dep == *node || !member_set.contains(dep) || !remaining.contains(dep))
            })
            // Only reachable if a direct cycle slipped past validation
            .or_else(|| remaining.iter().next().copied());

        match next {
            Some(node) => {
                remaining.remove(&node);
                ordered.push(node);
            }
            None => break,
        }
    }
    ordered
}
