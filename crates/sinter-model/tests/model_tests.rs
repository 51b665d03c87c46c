//! Integration tests for sinter-model.

use std::f64::consts::PI;

use approx::assert_relative_eq;
use sinter_math::{DVec2, PolarCoordinates};
use sinter_model::generators::{
    circle_cluster, circle_particle, three_particle_pore, two_particle_neck, ClusterResolution,
};
use sinter_model::ring::{check_ring, surface_runs};
use sinter_model::{
    contact_pairs, discover_contacts, ContactKind, InMemoryStore, Node, NodeKind, Particle,
    StateStore, SystemState,
};
use sinter_types::{MaterialId, NodeId, ParticleId, SinterError};

fn square_ring(first_id: u32) -> Vec<Node> {
    let ids: Vec<NodeId> = (first_id..first_id + 4).map(NodeId).collect();
    (0..4)
        .map(|k| {
            Node::new(
                ids[k],
                NodeKind::Surface,
                PolarCoordinates::new(1.0, PI / 2.0 * k as f64),
                ids[(k + 3) % 4],
                ids[(k + 1) % 4],
            )
        })
        .collect()
}

fn square_particle(id: u32, first_node: u32, x: f64) -> Particle {
    Particle::new(
        ParticleId(id),
        MaterialId(0),
        PolarCoordinates::from_cartesian(DVec2::new(x, 0.0)),
        0.0,
        square_ring(first_node),
    )
    .unwrap()
}

fn resolution() -> ClusterResolution {
    ClusterResolution::for_radius(1.0, 40).with_grain_boundary_nodes(3)
}

// ─── Ring Tests ───────────────────────────────────────────────

#[test]
fn valid_ring_traverses_all_nodes() {
    let order = check_ring(&square_ring(0)).unwrap();
    assert_eq!(order, vec![0, 1, 2, 3]);
}

#[test]
fn broken_back_link_is_rejected() {
    let mut ring = square_ring(0);
    ring[2].lower = NodeId(0);
    let err = check_ring(&ring).unwrap_err();
    assert!(matches!(err, SinterError::MalformedRing(_)));
}

#[test]
fn dangling_link_is_rejected() {
    let mut ring = square_ring(0);
    ring[1].upper = NodeId(99);
    assert!(check_ring(&ring).is_err());
}

#[test]
fn two_cycles_are_rejected() {
    // Two 2-cycles {0,1} and {2,3} satisfy the local back-link test.
    let mut ring = square_ring(0);
    ring[0].lower = NodeId(1);
    ring[1].upper = NodeId(0);
    ring[2].lower = NodeId(3);
    ring[3].upper = NodeId(2);
    let err = check_ring(&ring).unwrap_err();
    assert!(err.to_string().contains("closes after"));
}

#[test]
fn too_small_ring_is_rejected() {
    let ring: Vec<Node> = square_ring(0).into_iter().take(2).collect();
    assert!(check_ring(&ring).is_err());
}

// ─── Particle Tests ───────────────────────────────────────────

#[test]
fn particle_stores_nodes_in_ring_order() {
    let mut ring = square_ring(0);
    ring.swap(1, 3);
    let particle =
        Particle::new(ParticleId(0), MaterialId(0), PolarCoordinates::ORIGIN, 0.0, ring).unwrap();
    let ids: Vec<u32> = particle.nodes().iter().map(|n| n.id.0).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(particle.ring_index(NodeId(2)), Some(2));
    assert_eq!(particle.upper_of(3).id, NodeId(0));
    assert_eq!(particle.lower_of(0).id, NodeId(3));
}

#[test]
fn particle_geometry() {
    let particle = square_particle(0, 0, 2.0);
    assert_relative_eq!(particle.area(), 2.0, epsilon = 1e-12);
    assert_relative_eq!(particle.mean_node_radius(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(particle.min_segment_length(), 2f64.sqrt(), epsilon = 1e-12);
    let p = particle.node_position_at(1);
    assert_relative_eq!(p.x, 2.0, epsilon = 1e-12);
    assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
}

#[test]
fn rotation_turns_node_offsets() {
    let mut particle = square_particle(0, 0, 0.0);
    particle.rotation = PI / 2.0;
    let p = particle.node_position_at(0);
    assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
    assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
}

#[test]
fn moved_keeps_topology() {
    let particle = square_particle(0, 0, 0.0);
    let coords = vec![PolarCoordinates::new(2.0, 0.0); 4];
    let moved = particle
        .moved(PolarCoordinates::new(1.0, 0.0), 0.3, &coords)
        .unwrap();
    assert_eq!(moved.nodes()[2].id, particle.nodes()[2].id);
    assert_eq!(moved.rotation, 0.3);
    assert!(particle.moved(particle.center, 0.0, &coords[..3]).is_err());
}

// ─── State Tests ──────────────────────────────────────────────

#[test]
fn duplicate_node_ids_across_particles_are_rejected() {
    let a = square_particle(0, 0, 0.0);
    let b = square_particle(1, 0, 3.0);
    let err = SystemState::new(0.0, vec![a, b]).unwrap_err();
    assert!(err.is_structural());
}

#[test]
fn one_sided_contact_is_rejected() {
    let mut ring = square_ring(0);
    ring[0].kind = NodeKind::Neck;
    ring[0].contact = Some(NodeId(4));
    let a = Particle::new(ParticleId(0), MaterialId(0), PolarCoordinates::ORIGIN, 0.0, ring)
        .unwrap();
    let mut other = square_ring(4);
    other[0].kind = NodeKind::Neck;
    let b = Particle::new(
        ParticleId(1),
        MaterialId(0),
        PolarCoordinates::new(2.0, 0.0),
        0.0,
        other,
    )
    .unwrap();
    let err = SystemState::new(0.0, vec![a, b]).unwrap_err();
    assert!(matches!(err, SinterError::InvalidContact(_)));
}

#[test]
fn missing_contacts_are_reported() {
    let mut ring = square_ring(0);
    ring[0].kind = NodeKind::GrainBoundary;
    let a = Particle::new(ParticleId(0), MaterialId(0), PolarCoordinates::ORIGIN, 0.0, ring)
        .unwrap();
    let state = SystemState::new(0.0, vec![a]).unwrap();
    assert!(state.require_contacts().is_err());
}

#[test]
fn state_locates_nodes() {
    let state = SystemState::new(
        1.5,
        vec![square_particle(0, 0, 0.0), square_particle(1, 4, 3.0)],
    )
    .unwrap();
    assert_eq!(state.node_count(), 8);
    let (particle, node) = state.locate(NodeId(6)).unwrap();
    assert_eq!(particle.id, ParticleId(1));
    assert_eq!(node.id, NodeId(6));
    let p = state.node_position(NodeId(6)).unwrap();
    assert_relative_eq!(p.x, 2.0, epsilon = 1e-12);
    assert_eq!(state.time(), 1.5);
}

#[test]
fn state_serde_round_trip_rebuilds_index() {
    let state = two_particle_neck(1.0, 1.8, resolution(), MaterialId(0)).unwrap();
    let json = serde_json::to_string(&state).unwrap();
    let back: SystemState = serde_json::from_str(&json).unwrap();
    assert_eq!(back.node_count(), state.node_count());
    assert!(back.same_population(&state));
    assert!(back.locate(NodeId(5)).is_some());
}

#[test]
fn malformed_json_state_fails_fast() {
    let state = circle_particle(1.0, 12, MaterialId(0)).unwrap();
    let mut value = serde_json::to_value(&state).unwrap();
    value["particles"][0]["nodes"][3]["upper"] = serde_json::json!(0);
    let result: Result<SystemState, _> = serde_json::from_value(value);
    assert!(result.is_err());
}

// ─── Generator Tests ──────────────────────────────────────────

#[test]
fn free_circle_has_only_surface_nodes() {
    let state = circle_particle(2.0, 24, MaterialId(0)).unwrap();
    let particle = &state.particles()[0];
    assert_eq!(particle.node_count(), 24);
    assert!(particle.nodes().iter().all(|n| n.kind == NodeKind::Surface));
    assert_relative_eq!(particle.mean_node_radius(), 2.0, epsilon = 1e-12);
    assert!(particle.area() > 0.0);
}

#[test]
fn two_particles_share_a_grain_boundary() {
    let state = two_particle_neck(1.0, 1.8, resolution(), MaterialId(0)).unwrap();
    state.require_contacts().unwrap();

    let pairs = contact_pairs(&state);
    let necks = pairs.iter().filter(|p| p.kind == ContactKind::Neck).count();
    let boundary = pairs
        .iter()
        .filter(|p| p.kind == ContactKind::GrainBoundary)
        .count();
    assert_eq!(necks, 2);
    assert_eq!(boundary, 3);

    for pair in &pairs {
        assert!(pair.primary < pair.secondary);
        let a = state.node_position(pair.primary).unwrap();
        let b = state.node_position(pair.secondary).unwrap();
        assert!(a.distance(b) < 1e-12);
        assert_relative_eq!(a.x, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn neck_sits_on_circle_intersection() {
    let state = two_particle_neck(1.0, 1.6, resolution(), MaterialId(0)).unwrap();
    let height = (1.0f64 - 0.64).sqrt();
    let neck_heights: Vec<f64> = state.particles()[0]
        .nodes()
        .iter()
        .filter(|n| n.kind == NodeKind::Neck)
        .map(|n| state.node_position(n.id).unwrap().y.abs())
        .collect();
    assert_eq!(neck_heights.len(), 2);
    for h in neck_heights {
        assert_relative_eq!(h, height, epsilon = 1e-12);
    }
}

#[test]
fn generated_rings_are_counter_clockwise() {
    let state = three_particle_pore(1.0, 1.8, resolution(), MaterialId(0)).unwrap();
    for particle in state.particles() {
        assert!(particle.area() > 0.0);
    }
}

#[test]
fn three_particles_have_two_surface_runs_each() {
    let state = three_particle_pore(1.0, 1.8, resolution(), MaterialId(0)).unwrap();
    assert_eq!(contact_pairs(&state).len(), 3 * 5);
    for particle in state.particles() {
        let runs = surface_runs(particle);
        assert_eq!(runs.len(), 2);
        for run in &runs {
            assert!(run.length(particle) > 0.0);
        }
    }
}

#[test]
fn coincident_centers_are_rejected() {
    let centers = [DVec2::ZERO, DVec2::ZERO];
    assert!(circle_cluster(&centers, 1.0, resolution(), MaterialId(0)).is_err());
}

#[test]
fn separated_circles_have_no_contacts() {
    let state = two_particle_neck(1.0, 2.5, resolution(), MaterialId(0)).unwrap();
    assert!(contact_pairs(&state).is_empty());
    assert!(surface_runs(&state.particles()[0]).is_empty());
}

// ─── Contact Discovery Tests ──────────────────────────────────

#[test]
fn discovery_restores_stripped_references() {
    let state = two_particle_neck(1.0, 1.8, resolution(), MaterialId(0)).unwrap();
    let expected = contact_pairs(&state);

    let mut particles: Vec<Particle> = state
        .particles()
        .iter()
        .map(|p| {
            let nodes = p
                .nodes()
                .iter()
                .map(|n| Node {
                    contact: None,
                    ..n.clone()
                })
                .collect();
            Particle::new(p.id, p.material, p.center, p.rotation, nodes).unwrap()
        })
        .collect();

    let linked = discover_contacts(&mut particles, 1e-9);
    assert_eq!(linked, expected.len());
    let rebuilt = SystemState::new(0.0, particles).unwrap();
    assert_eq!(contact_pairs(&rebuilt), expected);
}

// ─── Store Tests ──────────────────────────────────────────────

#[test]
fn in_memory_store_clones_share_buffer() {
    let store = InMemoryStore::new();
    let mut handle = store.clone();
    let state = circle_particle(1.0, 8, MaterialId(0)).unwrap();
    handle.store_state(&state);
    handle.store_state(&state.with_time(1.0));
    assert_eq!(store.state_count(), 2);
    assert_eq!(store.states()[1].time(), 1.0);
    assert_eq!(store.step_count(), 0);
}
