use meshroute::pipeline::{AutoroutingPipeline, PipelinePhase};
use meshroute::srj::types::{
    Bounds, Connection, ConnectionPoint, Obstacle, RouteSegment, SimpleRouteJson,
};
use meshroute::Solver;

fn point(x: f64, y: f64, id: &str) -> ConnectionPoint {
    ConnectionPoint {
        x,
        y,
        layer: Some("top".to_string()),
        point_id: Some(id.to_string()),
        ..Default::default()
    }
}

fn pad(x: f64, y: f64, id: &str, net: &str) -> Obstacle {
    Obstacle {
        obstacle_id: Some(id.to_string()),
        center: meshroute::model::primitive::pt(x, y),
        width: 1.0,
        height: 1.0,
        connected_to: vec![net.to_string()],
        ..Default::default()
    }
}

fn wire_points(pipeline: &AutoroutingPipeline) -> Vec<(String, f64, f64)> {
    pipeline
        .traces
        .iter()
        .flatten()
        .flat_map(|t| {
            t.route.iter().filter_map(move |s| match s {
                RouteSegment::Wire { x, y, .. } => Some((t.connection_name.clone(), *x, *y)),
                _ => None,
            })
        })
        .collect()
}

fn has_point_near(points: &[(String, f64, f64)], x: f64, y: f64, tol: f64) -> bool {
    points.iter().any(|(_, px, py)| (px - x).abs() <= tol && (py - y).abs() <= tol)
}

// Two pads on one net across an otherwise empty board: a single trace, no
// vias.
#[test]
fn test_two_pad_direct_one_layer() {
    let srj = SimpleRouteJson {
        layer_count: 2,
        min_trace_width: 0.2,
        bounds: Bounds { min_x: -8.0, max_x: 8.0, min_y: -4.0, max_y: 4.0 },
        obstacles: vec![pad(-4.0, 0.0, "left", "left_pad"), pad(4.0, 0.0, "right", "right_pad")],
        connections: vec![Connection {
            name: "net1".into(),
            points_to_connect: vec![point(-4.0, 0.0, "left_pad"), point(4.0, 0.0, "right_pad")],
            ..Default::default()
        }],
        ..Default::default()
    };
    let mut pipeline = AutoroutingPipeline::port_point_pathing(srj);
    pipeline.solve();
    assert!(pipeline.solved(), "{:?}", pipeline.error());
    assert!(pipeline.failed_solvers.is_empty());

    let traces = pipeline.traces.as_ref().unwrap();
    assert_eq!(traces.len(), 1);
    let points = wire_points(&pipeline);
    assert!(has_point_near(&points, -4.0, 0.0, 1e-6));
    assert!(has_point_near(&points, 4.0, 0.0, 1e-6));
    let vias = traces[0].route.iter().filter(|s| matches!(s, RouteSegment::Via { .. })).count();
    assert_eq!(vias, 0, "direct route should not need vias");
}

// Two assignable via pads tied by an off-board net, with a wall between
// them: the route must go through both pads and the zero-cost edge.
#[test]
fn test_assignable_via_off_board_pair() {
    let assignable = |x: f64, id: &str| Obstacle {
        obstacle_id: Some(id.to_string()),
        center: meshroute::model::primitive::pt(x, 0.0),
        width: 1.0,
        height: 1.0,
        net_is_assignable: Some(true),
        off_board_connects_to: Some(vec!["BC_NET".to_string()]),
        ..Default::default()
    };
    let wall = Obstacle {
        obstacle_id: Some("wall".into()),
        center: meshroute::model::primitive::pt(0.0, 0.0),
        width: 0.5,
        height: 8.0,
        ..Default::default()
    };
    let srj = SimpleRouteJson {
        layer_count: 2,
        min_trace_width: 0.2,
        bounds: Bounds { min_x: -8.0, max_x: 8.0, min_y: -4.0, max_y: 4.0 },
        obstacles: vec![assignable(-2.0, "via_a"), assignable(2.0, "via_b"), wall],
        connections: vec![Connection {
            name: "net1".into(),
            points_to_connect: vec![point(-6.0, 0.0, "pA"), point(6.0, 0.0, "pB")],
            ..Default::default()
        }],
        ..Default::default()
    };
    let mut pipeline = AutoroutingPipeline::assignable(srj);
    pipeline.solve();
    assert!(pipeline.solved(), "{:?}", pipeline.error());

    let points = wire_points(&pipeline);
    assert!(has_point_near(&points, -6.0, 0.0, 1e-6));
    assert!(has_point_near(&points, 6.0, 0.0, 1e-6));
    // The only way across the wall is the off-board pair, so the trace must
    // visit both assignable pads.
    assert!(has_point_near(&points, -2.0, 0.0, 0.6), "trace misses the left via pad");
    assert!(has_point_near(&points, 2.0, 0.0, 0.6), "trace misses the right via pad");
}

fn routed_ids(pipeline: &AutoroutingPipeline) -> Vec<Vec<String>> {
    let enriched = pipeline.srj_with_point_pairs().expect("port points not reached");
    enriched
        .connections
        .iter()
        .map(|c| {
            let mut ids: Vec<String> =
                c.points_to_connect.iter().filter_map(|p| p.point_id.clone()).collect();
            ids.sort_unstable();
            ids
        })
        .collect()
}

// C is tied to B by external wiring and sits far closer to A, so the routed
// pair is rewritten to (A, C).
#[test]
fn test_off_board_substitution_basic() {
    let srj = SimpleRouteJson {
        layer_count: 2,
        min_trace_width: 0.2,
        bounds: Bounds { min_x: -10.0, max_x: 12.0, min_y: -7.0, max_y: 5.0 },
        connections: vec![
            Connection {
                name: "main".into(),
                points_to_connect: vec![point(-7.0, 2.0, "pointA"), point(10.0, -5.0, "pointB")],
                ..Default::default()
            },
            Connection {
                name: "external".into(),
                is_off_board: Some(true),
                points_to_connect: vec![point(-7.0, -5.0, "pointC"), point(10.0, -5.0, "pointB2")],
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    let mut pipeline = AutoroutingPipeline::port_point_pathing(srj);
    pipeline.solve_until_phase(PipelinePhase::PortPoints);
    assert!(!pipeline.failed(), "{:?}", pipeline.error());
    assert_eq!(routed_ids(&pipeline), vec![vec!["pointA".to_string(), "pointC".into()]]);
}

// Off-board equivalence is transitive: A~B and B~C puts C in A's class.
#[test]
fn test_off_board_substitution_transitivity() {
    let srj = SimpleRouteJson {
        layer_count: 2,
        min_trace_width: 0.2,
        bounds: Bounds { min_x: -1.0, max_x: 21.0, min_y: -1.0, max_y: 21.0 },
        connections: vec![
            Connection {
                name: "main".into(),
                points_to_connect: vec![point(0.0, 0.0, "pointX"), point(10.0, 10.0, "pointA")],
                ..Default::default()
            },
            Connection {
                name: "ext1".into(),
                is_off_board: Some(true),
                points_to_connect: vec![point(10.0, 10.0, "pointA2"), point(20.0, 20.0, "pointB")],
                ..Default::default()
            },
            Connection {
                name: "ext2".into(),
                is_off_board: Some(true),
                points_to_connect: vec![point(20.0, 20.0, "pointB2"), point(1.0, 1.0, "pointC")],
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    let mut pipeline = AutoroutingPipeline::port_point_pathing(srj);
    pipeline.solve_until_phase(PipelinePhase::PortPoints);
    assert!(!pipeline.failed(), "{:?}", pipeline.error());
    assert_eq!(routed_ids(&pipeline), vec![vec!["pointC".to_string(), "pointX".into()]]);
}

// Multi-point net ordered by MST: the off-board twin close to the centre
// replaces B in both MST pairs.
#[test]
fn test_off_board_substitution_multi_point_mst() {
    let srj = SimpleRouteJson {
        layer_count: 2,
        min_trace_width: 0.2,
        bounds: Bounds { min_x: -1.0, max_x: 11.0, min_y: -1.0, max_y: 9.0 },
        connections: vec![
            Connection {
                name: "main".into(),
                points_to_connect: vec![
                    point(0.0, 0.0, "pointA"),
                    point(5.0, 8.0, "pointB"),
                    point(10.0, 0.0, "pointC"),
                ],
                ..Default::default()
            },
            Connection {
                name: "external".into(),
                is_off_board: Some(true),
                points_to_connect: vec![point(5.0, 8.0, "pointBtwin"), point(5.0, 1.0, "pointB2")],
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    let mut pipeline = AutoroutingPipeline::port_point_pathing(srj);
    pipeline.solve_until_phase(PipelinePhase::PortPoints);
    assert!(!pipeline.failed(), "{:?}", pipeline.error());
    let ids = routed_ids(&pipeline);
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&vec!["pointA".to_string(), "pointB2".into()]));
    assert!(ids.contains(&vec!["pointB2".to_string(), "pointC".into()]));
}

// A fully walled cell where only a jumper can cross.
#[test]
fn test_jumper_insertion_in_blocked_cell() {
    use meshroute::model::layer::LayerSet;
    use meshroute::model::primitive::{pt3, rt};
    use meshroute::route::highdensity::{
        CellObstacleRect, CellProblem, IntraNodeSolverWithJumpers, PortPair,
    };

    let problem = CellProblem {
        rt: rt(0.0, 0.0, 8.0, 8.0),
        layers: LayerSet::from_zs(&[0, 1]),
        trace_width: 0.2,
        spacing: 0.2,
        via_diameter: 0.4,
        allow_jumpers: true,
        obstacles: vec![CellObstacleRect {
            rt: rt(3.8, 0.0, 0.4, 8.0),
            layers: LayerSet::from_zs(&[0, 1]),
            nets: vec![],
        }],
        pairs: vec![
            PortPair { connection_name: "netA".into(), a: pt3(0.0, 2.0, 0), b: pt3(8.0, 2.0, 0) },
            PortPair { connection_name: "netB".into(), a: pt3(0.0, 6.0, 0), b: pt3(8.0, 6.0, 0) },
        ],
    };
    let mut solver = IntraNodeSolverWithJumpers::new(problem);
    solver.solve();
    assert!(solver.solved(), "{:?}", solver.error());
    let with_jumper = solver
        .routes()
        .iter()
        .find(|r| !r.jumpers.is_empty())
        .expect("at least one route crosses via a jumper");
    for jumper in &with_jumper.jumpers {
        let consecutive = with_jumper.vertices.windows(2).any(|w| {
            (w[0].pt() == jumper.start && w[1].pt() == jumper.end)
                || (w[0].pt() == jumper.end && w[1].pt() == jumper.start)
        });
        assert!(consecutive, "jumper endpoints must be consecutive in the route");
    }
}
