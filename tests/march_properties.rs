//! Property tests for point and column geometry

use marchline::campaign::{
    ColumnPosition, DecisionPoint, PointPosition, RoadNetwork, StrongholdType,
};
use marchline::core::{NodeId, PolityId};
use proptest::prelude::*;

const EPS: f64 = 1e-9;

/// A small map with a loop: A-B 4, B-C 2, C-D 2, C-E 1, D-E 1.5, A-E 6.
/// D is a walled town.
fn looped() -> (RoadNetwork, Vec<NodeId>, Vec<(usize, usize)>) {
    let mut net = RoadNetwork::new();
    let ids: Vec<NodeId> = ["A", "B", "C", "D", "E"]
        .iter()
        .map(|&name| match name {
            "D" => net
                .add_stronghold(name, StrongholdType::Town, Some(PolityId(2)))
                .unwrap(),
            _ => net.add_crossroads(name).unwrap(),
        })
        .collect();
    let roads = vec![(0, 1), (1, 2), (2, 3), (2, 4), (3, 4), (0, 4)];
    let lengths = [4.0, 2.0, 2.0, 1.0, 1.5, 6.0];
    for (&(x, y), &length) in roads.iter().zip(lengths.iter()) {
        net.add_road(ids[x], ids[y], length).unwrap();
    }
    (net, ids, roads)
}

/// Six crossroads in a line, 2 leagues apart
fn line() -> (RoadNetwork, Vec<NodeId>) {
    let mut net = RoadNetwork::new();
    let ids: Vec<NodeId> = (0..6)
        .map(|i| net.add_crossroads(&format!("Stage {}", i)).unwrap())
        .collect();
    for pair in ids.windows(2) {
        net.add_road(pair[0], pair[1], 2.0).unwrap();
    }
    (net, ids)
}

/// Either a node (`road` of None) or a point `fraction` of the way along a road
fn point_on(
    net: &RoadNetwork,
    ids: &[NodeId],
    roads: &[(usize, usize)],
    node: usize,
    road: Option<usize>,
    fraction: f64,
    forward: bool,
) -> PointPosition {
    match road {
        None => PointPosition::at_node(ids[node % ids.len()]),
        Some(r) => {
            let (x, y) = roads[r % roads.len()];
            let (from, toward) = if forward { (x, y) } else { (y, x) };
            let length = net.edge_length(ids[from], ids[toward]).unwrap();
            PointPosition::on_edge(ids[from], ids[toward], length * fraction, net).unwrap()
        }
    }
}

fn same_point(a: &PointPosition, b: &PointPosition) -> bool {
    let dtd = match (a.distance_to_destination(), b.distance_to_destination()) {
        (Some(x), Some(y)) => (x - y).abs() < EPS,
        (None, None) => true,
        _ => false,
    };
    a.location() == b.location() && a.orientation() == b.orientation() && dtd
}

/// March a column down the line, leg by leg, returning it after every move
fn marched(net: &RoadNetwork, ids: &[NodeId], extent: f64, moves: &[f64]) -> Vec<ColumnPosition> {
    let mut column = ColumnPosition::at_node(ids[0], extent, net).unwrap();
    let last = ids[ids.len() - 1];
    let mut history = Vec::new();
    for &distance in moves {
        if let Some(here) = column.lead().node() {
            if here != last {
                let next = ids[ids.iter().position(|&n| n == here).unwrap() + 1];
                column.set_orientation(next, net).unwrap();
            }
        }
        column.advance(distance, false, net).unwrap();
        history.push(column.clone());
    }
    history
}

/// One instruction to a column wandering the looped map
#[derive(Debug, Clone)]
enum Order {
    Face(usize),
    Advance(f64, bool),
    Bypass(usize),
}

fn order() -> impl Strategy<Value = Order> {
    prop_oneof![
        (0usize..5).prop_map(Order::Face),
        (0.01f64..2.5, any::<bool>()).prop_map(|(d, gather)| Order::Advance(d, gather)),
        (0usize..3).prop_map(Order::Bypass),
    ]
}

/// Carry out `order`, checking that refused turns leave the column alone
fn obey(column: &mut ColumnPosition, order: &Order, net: &RoadNetwork, ids: &[NodeId]) {
    match *order {
        Order::Face(i) => {
            let before = column.clone();
            if let Err(e) = column.set_orientation(ids[i], net) {
                assert!(e.is_invalid_action(), "unexpected error {}", e);
                assert_eq!(*column, before);
            }
        }
        Order::Advance(distance, gather) => {
            column.advance(distance, gather, net).unwrap();
        }
        Order::Bypass(i) => {
            if let Ok(bypasses) = column.valid_bypasses(net) {
                if !bypasses.is_empty() {
                    column.bypass_to(bypasses[i % bypasses.len()], net).unwrap();
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn prop_distance_is_symmetric(
        a_node in 0usize..5,
        a_road in prop::option::of(0usize..6),
        a_frac in 0.0f64..=1.0,
        a_fwd in any::<bool>(),
        b_node in 0usize..5,
        b_road in prop::option::of(0usize..6),
        b_frac in 0.0f64..=1.0,
        b_fwd in any::<bool>(),
    ) {
        let (net, ids, roads) = looped();
        let a = point_on(&net, &ids, &roads, a_node, a_road, a_frac, a_fwd);
        let b = point_on(&net, &ids, &roads, b_node, b_road, b_frac, b_fwd);

        let there = a.distance_to(&b, &net).unwrap();
        let back = b.distance_to(&a, &net).unwrap();
        prop_assert!((there - back).abs() < EPS, "{} vs {}", there, back);
        prop_assert!(there >= 0.0);
        prop_assert!(a.distance_to(&a, &net).unwrap().abs() < EPS);
    }

    #[test]
    fn prop_extent_never_exceeds_maximum(
        extent in 0.05f64..3.0,
        moves in prop::collection::vec(0.01f64..2.5, 1..25),
    ) {
        let (net, ids) = line();
        for column in marched(&net, &ids, extent, &moves) {
            prop_assert!(column.current_extent(&net).unwrap() <= extent + EPS);
            prop_assert!(column.validate(&net).is_ok());
        }
    }

    #[test]
    fn prop_reversing_twice_restores_column(
        extent in 0.05f64..3.0,
        moves in prop::collection::vec(0.01f64..2.5, 1..25),
    ) {
        let (net, ids) = line();
        for column in marched(&net, &ids, extent, &moves) {
            let mut turned = column.clone();
            turned.reverse_course(&net).unwrap();
            turned.reverse_course(&net).unwrap();
            prop_assert!(same_point(turned.lead(), column.lead()));
            prop_assert!(same_point(turned.trail(), column.trail()));
            prop_assert_eq!(turned.waypoints(), column.waypoints());
        }
    }

    #[test]
    fn prop_wandering_column_keeps_its_shape(
        start in 0usize..5,
        extent in 0.05f64..3.0,
        orders in prop::collection::vec(order(), 1..40),
    ) {
        let (net, ids, _) = looped();
        let mut column = ColumnPosition::at_node(ids[start], extent, &net).unwrap();
        for order in &orders {
            obey(&mut column, order, &net, &ids);
            prop_assert!(column.validate(&net).is_ok(), "{:?} broke {}", order, column);
            prop_assert!(column.current_extent(&net).unwrap() <= extent + EPS);

            let mut turned = column.clone();
            turned.reverse_course(&net).unwrap();
            turned.reverse_course(&net).unwrap();
            // A lead waiting on a node comes back without its departure order
            let lead = match column.lead().node() {
                Some(node) => PointPosition::at_node(node),
                None => column.lead().clone(),
            };
            prop_assert!(same_point(turned.lead(), &lead), "{} vs {}", turned, column);
            prop_assert!(same_point(turned.trail(), column.trail()), "{} vs {}", turned, column);
            prop_assert_eq!(turned.waypoints(), column.waypoints());
        }
    }

    #[test]
    fn prop_approach_is_monotonic(
        length in 0.5f64..6.0,
        stride in 0.05f64..1.0,
    ) {
        let mut net = RoadNetwork::new();
        let from = net.add_crossroads("Start").unwrap();
        let to = net.add_crossroads("Goal").unwrap();
        net.add_road(from, to, length).unwrap();

        let mut point = PointPosition::on_edge(from, to, length, &net).unwrap();
        let mut last = length;
        let mut arrivals = 0;
        for _ in 0..200 {
            match point.advance(stride, None, &net).unwrap() {
                Some(DecisionPoint::CrossroadsReached { node, remaining_movement, .. }) => {
                    prop_assert_eq!(node, to);
                    prop_assert!(remaining_movement >= 0.0 && remaining_movement < stride + EPS);
                    arrivals += 1;
                    break;
                }
                Some(other) => prop_assert!(false, "unexpected event {:?}", other),
                None => {
                    let now = point.distance_to_destination().unwrap();
                    prop_assert!(now < last);
                    last = now;
                }
            }
        }
        prop_assert_eq!(arrivals, 1);
        prop_assert_eq!(point.node(), Some(to));
    }
}
