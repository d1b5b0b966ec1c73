//! Trait Graph
//!
//! Flattens a list of traits, and the traits they are built from, into one
//! dependency-ordered sequence.
//!
//! # Algorithm
//!
//! 1. Walk every trait depth-first, dependencies before the trait itself,
//!    recording each trait once (keyed by nonce) in discovery order.
//! 2. Count, for each trait, its direct dependencies inside the set.
//! 3. Kahn's algorithm, always taking the ready trait that was discovered
//!    first. Dependencies therefore come before dependents, and independent
//!    traits keep their declaration order.
//!
//! Diamonds (two traits sharing a dependency) come out with the shared
//! dependency exactly once.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use super::Prototype;

/// Every trait reachable from `traits`, dependencies first.
pub fn linearize(traits: &[Arc<Prototype>]) -> Vec<Arc<Prototype>> {
    let mut discovered: Vec<Arc<Prototype>> = Vec::new();
    let mut index: HashMap<u64, usize> = HashMap::new();
    for t in traits {
        discover(t, &mut discovered, &mut index);
    }

    // dependents[i]: positions of traits that list discovered[i] directly
    let mut in_degree = vec![0usize; discovered.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); discovered.len()];
    for (position, t) in discovered.iter().enumerate() {
        for dependency in t.traits() {
            if let Some(&dep) = index.get(&dependency.nonce()) {
                in_degree[position] += 1;
                dependents[dep].push(position);
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(position, _)| Reverse(position))
        .collect();
    let mut ordered = Vec::with_capacity(discovered.len());
    while let Some(Reverse(position)) = ready.pop() {
        ordered.push(discovered[position].clone());
        for &dependent in &dependents[position] {
            in_degree[dependent] = in_degree[dependent].saturating_sub(1);
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }
    ordered
}

fn discover(t: &Arc<Prototype>, discovered: &mut Vec<Arc<Prototype>>, index: &mut HashMap<u64, usize>) {
    if index.contains_key(&t.nonce()) {
        return;
    }
    for dependency in t.traits() {
        discover(dependency, discovered, index);
    }
    index.insert(t.nonce(), discovered.len());
    discovered.push(t.clone());
}
