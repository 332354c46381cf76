//! End-to-end behavior of the chain merge engine and query surface.

use vereda::{
    CompressedEdgeContainer, EdgeId, GeometryError, NodeId, Segment, Waypoint, Weight,
};

fn segment(id: u32, weight: i32) -> Segment {
    Segment::new(EdgeId(id), Weight(weight))
}

fn waypoint(node: u32, forward: Weight, reverse: Weight) -> Waypoint {
    Waypoint {
        node: NodeId(node),
        forward_weight: forward,
        reverse_weight: reverse,
    }
}

/// Eliminates node 2 of the path 1-2-3. Edge ids: 10 = 1→2, 11 = 2→3,
/// 20 = 3→2, 21 = 2→1; forward weights 5 and 7, reverse weights 7 and 5.
fn eliminate_middle_of_1_2_3(container: &mut CompressedEdgeContainer) {
    container
        .compress_edge(
            segment(10, 5),
            segment(11, 7),
            segment(20, 7),
            segment(21, 5),
            NodeId(1),
            NodeId(2),
            NodeId(3),
        )
        .expect("merge of two atomic segments");
}

#[test]
fn single_merge_produces_three_waypoint_chain() {
    let mut container = CompressedEdgeContainer::new();
    eliminate_middle_of_1_2_3(&mut container);

    assert!(container.has_entry(EdgeId(10)));
    assert!(!container.has_entry(EdgeId(11)));
    assert!(container.has_entry(EdgeId(20)));
    assert!(!container.has_entry(EdgeId(21)));

    let expected = [
        waypoint(1, Weight::INVALID, Weight(5)),
        waypoint(2, Weight(5), Weight(7)),
        waypoint(3, Weight(7), Weight::INVALID),
    ];
    assert_eq!(container.bucket(EdgeId(10)).unwrap(), expected);

    assert!(!container.is_trivial(EdgeId(10)).unwrap());
    assert_eq!(container.first_node(EdgeId(10)).unwrap(), NodeId(1));
    assert_eq!(container.last_node(EdgeId(10)).unwrap(), NodeId(3));
    assert_eq!(container.second_to_last_node(EdgeId(10)).unwrap(), NodeId(2));
}

#[test]
fn forward_and_reverse_keys_share_one_chain() {
    let mut container = CompressedEdgeContainer::new();
    eliminate_middle_of_1_2_3(&mut container);

    assert_eq!(
        container.slot_of(EdgeId(10)).unwrap(),
        container.slot_of(EdgeId(20)).unwrap()
    );
    assert_eq!(
        container.bucket(EdgeId(10)).unwrap(),
        container.bucket(EdgeId(20)).unwrap()
    );
}

#[test]
fn chains_concatenate_and_donor_slot_is_recycled() {
    let mut container = CompressedEdgeContainer::new();
    // First chain: 1-2-3 keyed by 10 (forward) and 20 (reverse).
    eliminate_middle_of_1_2_3(&mut container);
    // Second chain: 3-4-5 keyed by 12 (forward) and 22 (reverse).
    container
        .compress_edge(
            segment(12, 11),
            segment(13, 13),
            segment(22, 13),
            segment(23, 11),
            NodeId(3),
            NodeId(4),
            NodeId(5),
        )
        .expect("merge building the right-hand chain");
    let donor_slot = container.slot_of(EdgeId(12)).unwrap();

    // Eliminating node 3 joins both chains; the aggregate weights are the
    // per-side sums the contraction pass would supply.
    container
        .compress_edge(
            segment(10, 12),
            segment(12, 24),
            segment(22, 24),
            segment(20, 12),
            NodeId(1),
            NodeId(3),
            NodeId(5),
        )
        .expect("merge splicing the right-hand chain");

    let expected = [
        waypoint(1, Weight::INVALID, Weight(5)),
        waypoint(2, Weight(5), Weight(7)),
        waypoint(3, Weight(7), Weight(11)),
        waypoint(4, Weight(11), Weight(13)),
        waypoint(5, Weight(13), Weight::INVALID),
    ];
    // Three plus three waypoints, shared node stored once.
    assert_eq!(container.bucket(EdgeId(10)).unwrap(), expected);
    assert_eq!(
        container.slot_of(EdgeId(22)).unwrap(),
        container.slot_of(EdgeId(10)).unwrap()
    );

    for retired in [11, 13, 12, 20, 21, 23] {
        assert!(!container.has_entry(EdgeId(retired)), "edge {retired}");
    }

    // The donor slot went back onto the free list and is handed out to the
    // next registration.
    container
        .add_uncompressed_edge(EdgeId(30), NodeId(9), Weight(2))
        .unwrap();
    assert_eq!(container.slot_of(EdgeId(30)).unwrap(), donor_slot);
}

#[test]
fn uncompressed_registration_is_idempotent() {
    let mut container = CompressedEdgeContainer::new();
    container
        .add_uncompressed_edge(EdgeId(7), NodeId(4), Weight(9))
        .unwrap();
    container
        .add_uncompressed_edge(EdgeId(7), NodeId(4), Weight(9))
        .unwrap();

    let bucket = container.bucket(EdgeId(7)).unwrap();
    assert_eq!(bucket, [waypoint(4, Weight(9), Weight::INVALID)]);
    assert!(container.is_trivial(EdgeId(7)).unwrap());
    assert_eq!(container.last_node(EdgeId(7)).unwrap(), NodeId(4));
}

#[test]
fn second_to_last_node_needs_two_waypoints() {
    let mut container = CompressedEdgeContainer::new();
    container
        .add_uncompressed_edge(EdgeId(7), NodeId(4), Weight(9))
        .unwrap();
    assert!(matches!(
        container.second_to_last_node(EdgeId(7)),
        Err(GeometryError::StructuralInconsistency(_))
    ));
}

#[test]
fn reverse_weight_sum_mismatch_is_fatal() {
    let mut container = CompressedEdgeContainer::new();
    eliminate_middle_of_1_2_3(&mut container);
    container
        .compress_edge(
            segment(12, 11),
            segment(13, 13),
            segment(22, 13),
            segment(23, 11),
            NodeId(3),
            NodeId(4),
            NodeId(5),
        )
        .unwrap();

    // The right chain's true reverse cost is 24; an upstream bug handing in
    // 23 must be caught by the always-on cross-check.
    let err = container
        .compress_edge(
            segment(10, 12),
            segment(12, 24),
            segment(22, 23),
            segment(20, 12),
            NodeId(1),
            NodeId(3),
            NodeId(5),
        )
        .unwrap_err();
    assert!(matches!(err, GeometryError::StructuralInconsistency(_)));
}

#[test]
fn adjoining_node_mismatch_is_fatal() {
    let mut container = CompressedEdgeContainer::new();
    eliminate_middle_of_1_2_3(&mut container);
    // A second chain starting at node 6 cannot adjoin a chain ending at 3.
    container
        .compress_edge(
            segment(12, 11),
            segment(13, 13),
            segment(22, 13),
            segment(23, 11),
            NodeId(6),
            NodeId(4),
            NodeId(5),
        )
        .unwrap();

    let err = container
        .compress_edge(
            segment(10, 12),
            segment(12, 24),
            segment(22, 24),
            segment(20, 12),
            NodeId(1),
            NodeId(3),
            NodeId(5),
        )
        .unwrap_err();
    assert!(matches!(err, GeometryError::StructuralInconsistency(_)));
}

#[test]
fn extending_a_chain_checks_its_endpoints() {
    let mut container = CompressedEdgeContainer::new();
    eliminate_middle_of_1_2_3(&mut container);

    // Reusing chain 10/20 with a source that does not match its front node
    // is a structural inconsistency, not a silent overwrite.
    let err = container
        .compress_edge(
            segment(10, 12),
            segment(14, 4),
            segment(24, 4),
            segment(20, 12),
            NodeId(8),
            NodeId(3),
            NodeId(5),
        )
        .unwrap_err();
    assert!(matches!(err, GeometryError::StructuralInconsistency(_)));
}
