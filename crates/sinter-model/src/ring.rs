//! Ring traversal and integrity checks.
//!
//! A ring is the cyclic sequence of nodes outlining one particle,
//! counter-clockwise. Neighbours are stored as identities, so a ring is
//! only usable after [`check_ring`] confirmed that the links form one
//! closed, consistent cycle.

use std::collections::HashMap;

use sinter_types::{NodeId, SinterError, SinterResult};

use crate::node::{Node, NodeKind};
use crate::particle::Particle;

/// Minimum number of nodes of a ring.
pub const MIN_RING_SIZE: usize = 3;

/// Checks ring integrity and returns the node indices in traversal order,
/// starting at index 0 and following `upper` links.
///
/// Fails with [`SinterError::MalformedRing`] when:
/// - the ring has fewer than [`MIN_RING_SIZE`] nodes or duplicate ids
/// - a `lower`/`upper` link points outside the ring
/// - `upper(lower(n)) != n` or `lower(upper(n)) != n`
/// - following `upper` does not visit every node exactly once
pub fn check_ring(nodes: &[Node]) -> SinterResult<Vec<usize>> {
    if nodes.len() < MIN_RING_SIZE {
        return Err(SinterError::MalformedRing(format!(
            "ring has {} nodes, at least {} required",
            nodes.len(),
            MIN_RING_SIZE
        )));
    }

    let mut index: HashMap<NodeId, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if index.insert(node.id, i).is_some() {
            return Err(SinterError::MalformedRing(format!(
                "duplicate node id {}",
                node.id
            )));
        }
    }

    let lookup = |id: NodeId, from: NodeId| {
        index.get(&id).copied().ok_or_else(|| {
            SinterError::MalformedRing(format!("{from} links to {id}, which is not on the ring"))
        })
    };

    for node in nodes {
        let lower = &nodes[lookup(node.lower, node.id)?];
        let upper = &nodes[lookup(node.upper, node.id)?];
        if lower.upper != node.id {
            return Err(SinterError::MalformedRing(format!(
                "upper of {} is {}, expected {}",
                lower.id, lower.upper, node.id
            )));
        }
        if upper.lower != node.id {
            return Err(SinterError::MalformedRing(format!(
                "lower of {} is {}, expected {}",
                upper.id, upper.lower, node.id
            )));
        }
    }

    let mut order = Vec::with_capacity(nodes.len());
    let mut visited = vec![false; nodes.len()];
    let mut current = 0;
    while !visited[current] {
        visited[current] = true;
        order.push(current);
        current = lookup(nodes[current].upper, nodes[current].id)?;
    }
    if current != 0 || order.len() != nodes.len() {
        return Err(SinterError::MalformedRing(format!(
            "ring starting at {} closes after {} of {} nodes",
            nodes[0].id,
            order.len(),
            nodes.len()
        )));
    }

    Ok(order)
}

/// Index of the clockwise neighbour of ring position `i`.
#[inline]
pub fn lower_index(len: usize, i: usize) -> usize {
    (i + len - 1) % len
}

/// Index of the counter-clockwise neighbour of ring position `i`.
#[inline]
pub fn upper_index(len: usize, i: usize) -> usize {
    (i + 1) % len
}

/// A maximal run of free-surface nodes bounded by two neck nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceRun {
    /// Ring index of the neck opening the run.
    pub start_neck: usize,
    /// Ring index of the neck closing the run.
    pub end_neck: usize,
    /// Ring indices of the surface nodes in between, in traversal order.
    pub nodes: Vec<usize>,
}

impl SurfaceRun {
    /// Polyline length from the opening neck through the run to the closing neck.
    pub fn length(&self, particle: &Particle) -> f64 {
        let mut points = Vec::with_capacity(self.nodes.len() + 2);
        points.push(particle.node_position_at(self.start_neck));
        points.extend(self.nodes.iter().map(|&i| particle.node_position_at(i)));
        points.push(particle.node_position_at(self.end_neck));
        points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

/// Collects the surface runs of a particle ring that start and end at a neck.
///
/// Rings without necks (free particles) have no runs.
pub fn surface_runs(particle: &Particle) -> Vec<SurfaceRun> {
    let nodes = particle.nodes();
    let len = nodes.len();
    let mut runs = Vec::new();

    for start in 0..len {
        if nodes[start].kind != NodeKind::Neck {
            continue;
        }
        let first = upper_index(len, start);
        if nodes[first].kind != NodeKind::Surface {
            continue;
        }
        let mut members = Vec::new();
        let mut cursor = first;
        while nodes[cursor].kind == NodeKind::Surface && members.len() < len {
            members.push(cursor);
            cursor = upper_index(len, cursor);
        }
        if nodes[cursor].kind == NodeKind::Neck {
            runs.push(SurfaceRun {
                start_neck: start,
                end_neck: cursor,
                nodes: members,
            });
        }
    }
    runs
}

/// Ring indices `(from, to)` of the two necks bounding each grain boundary
/// of a particle, where the grain-boundary nodes run upward from `from`.
///
/// Two adjacent necks with no grain-boundary node between them also form a
/// span.
pub fn grain_boundary_spans(particle: &Particle) -> Vec<(usize, usize)> {
    let nodes = particle.nodes();
    let len = nodes.len();
    let mut spans = Vec::new();

    for start in 0..len {
        if nodes[start].kind != NodeKind::Neck {
            continue;
        }
        let mut cursor = upper_index(len, start);
        let mut steps = 0;
        while nodes[cursor].kind == NodeKind::GrainBoundary && steps < len {
            cursor = upper_index(len, cursor);
            steps += 1;
        }
        if cursor != start && nodes[cursor].kind == NodeKind::Neck {
            spans.push((start, cursor));
        }
    }
    spans
}

/// Straight-line distance between the two necks of every grain boundary of
/// a particle, keyed by the opening neck's id.
pub fn neck_widths(particle: &Particle) -> Vec<(NodeId, f64)> {
    grain_boundary_spans(particle)
        .into_iter()
        .map(|(from, to)| {
            let width = particle
                .node_position_at(from)
                .distance(particle.node_position_at(to));
            (particle.nodes()[from].id, width)
        })
        .collect()
}
