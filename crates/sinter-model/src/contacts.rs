//! Contact pairs between particles.
//!
//! Contacts are either given explicitly through [`Node::contact`]
//! references or discovered by coordinate coincidence.
//!
//! [`Node::contact`]: crate::node::Node::contact

use serde::{Deserialize, Serialize};
use sinter_types::NodeId;

use crate::node::NodeKind;
use crate::particle::Particle;
use crate::state::SystemState;

/// Kind of a contact pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactKind {
    /// Two coincident neck nodes.
    Neck,
    /// Two facing grain-boundary nodes.
    GrainBoundary,
}

/// A pair of contacting nodes on two particles.
///
/// The primary node is the one with the lower id; it carries the
/// compatibility constraint of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPair {
    pub primary: NodeId,
    pub secondary: NodeId,
    pub kind: ContactKind,
}

/// All contact pairs of a state, ordered by primary id.
pub fn contact_pairs(state: &SystemState) -> Vec<ContactPair> {
    let mut pairs: Vec<ContactPair> = state
        .particles()
        .iter()
        .flat_map(|p| p.nodes())
        .filter_map(|node| {
            let partner = node.contact?;
            if node.id >= partner {
                return None;
            }
            let kind = match node.kind {
                NodeKind::Neck => ContactKind::Neck,
                NodeKind::GrainBoundary => ContactKind::GrainBoundary,
                NodeKind::Surface => return None,
            };
            Some(ContactPair {
                primary: node.id,
                secondary: partner,
                kind,
            })
        })
        .collect();
    pairs.sort_by_key(|p| p.primary);
    pairs
}

/// Pairs up unreferenced neck and grain-boundary nodes lying within
/// `tolerance` of a node of the same kind on another particle.
///
/// Existing references are kept. Returns the number of pairs created.
pub fn discover_contacts(particles: &mut [Particle], tolerance: f64) -> usize {
    let mut candidates = Vec::new();
    for (p, particle) in particles.iter().enumerate() {
        for (i, node) in particle.nodes().iter().enumerate() {
            if node.kind.needs_contact() && node.contact.is_none() {
                candidates.push((p, i, node.kind, node.id, particle.node_position_at(i)));
            }
        }
    }

    let mut taken = vec![false; candidates.len()];
    let mut links = Vec::new();
    for a in 0..candidates.len() {
        if taken[a] {
            continue;
        }
        let (pa, _, kind_a, _, pos_a) = candidates[a];
        let best = (a + 1..candidates.len())
            .filter(|&b| !taken[b])
            .filter(|&b| candidates[b].0 != pa && candidates[b].2 == kind_a)
            .map(|b| (b, candidates[b].4.distance(pos_a)))
            .filter(|&(_, d)| d <= tolerance)
            .min_by(|x, y| x.1.total_cmp(&y.1));
        if let Some((b, _)) = best {
            taken[a] = true;
            taken[b] = true;
            links.push((a, b));
        }
    }

    for &(a, b) in &links {
        let (pa, ia, _, ida, _) = candidates[a];
        let (pb, ib, _, idb, _) = candidates[b];
        particles[pa].set_contact(ia, Some(idb));
        particles[pb].set_contact(ib, Some(ida));
    }
    links.len()
}
