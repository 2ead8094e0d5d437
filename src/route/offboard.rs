use std::collections::HashMap;

use eyre::Result;
use log::debug;
use petgraph::algo::min_spanning_tree;
use petgraph::data::FromElements;
use petgraph::graphmap::GraphMap;
use petgraph::Undirected;

use crate::conn::ConnectivityMap;
use crate::model::geom::math::f64_lt;
use crate::model::layer::LayerSet;
use crate::model::primitive::point::Pt;
use crate::srj::types::{Connection, ConnectionPoint, SimpleRouteJson};

// A concrete endpoint the pather can start or finish at.
#[must_use]
#[derive(Debug, Clone)]
pub struct PointInfo {
    pub id: String,
    pub pt: Pt,
    pub layers: LayerSet,
}

// One net to route: ordered endpoint pairs after MST ordering and off-board
// substitution.
#[must_use]
#[derive(Debug, Clone)]
pub struct RouteNet {
    pub connection_name: String,
    pub nominal_trace_width: Option<f64>,
    pub pairs: Vec<(PointInfo, PointInfo)>,
}

// All points across every connection, including off-board ones, keyed by id.
// Insertion order is preserved so substitution is deterministic.
#[must_use]
#[derive(Debug, Default, Clone)]
pub struct PointRegistry {
    by_id: HashMap<String, PointInfo>,
    order: Vec<String>,
}

impl PointRegistry {
    pub fn from_srj(srj: &SimpleRouteJson) -> Result<Self> {
        let mut registry = Self::default();
        for connection in &srj.connections {
            for (ix, point) in connection.points_to_connect.iter().enumerate() {
                let id = point.id_or(&connection.name, ix);
                let info = PointInfo {
                    id: id.clone(),
                    pt: point.pt(),
                    layers: point.layer_set(srj.layer_count)?,
                };
                if registry.by_id.insert(id.clone(), info).is_none() {
                    registry.order.push(id);
                }
            }
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&PointInfo> {
        self.by_id.get(id)
    }

    // Points substitutable for |id| under external wiring, in insertion order.
    pub fn off_board_class(&self, conn: &ConnectivityMap, id: &str) -> Vec<&PointInfo> {
        self.order
            .iter()
            .filter(|other| conn.off_board.connected(id, other))
            .filter_map(|other| self.by_id.get(other))
            .collect()
    }
}

// For an endpoint pair, consider every (source class x target class) product
// and keep the shortest. A substitution must strictly improve on the original
// pair to be taken.
fn substitute_pair(
    conn: &ConnectivityMap,
    registry: &PointRegistry,
    u: &PointInfo,
    v: &PointInfo,
) -> Option<(PointInfo, PointInfo)> {
    let u_class = registry.off_board_class(conn, &u.id);
    let v_class = registry.off_board_class(conn, &v.id);
    // Both endpoints already equivalent under external wiring: no copper
    // needed for this pair at all.
    if conn.off_board.connected(&u.id, &v.id) {
        return None;
    }
    let mut best = (u.clone(), v.clone());
    let mut best_dist = u.pt.dist(v.pt);
    for cu in &u_class {
        for cv in &v_class {
            let d = cu.pt.dist(cv.pt);
            if f64_lt(d, best_dist) {
                best_dist = d;
                best = ((*cu).clone(), (*cv).clone());
            }
        }
    }
    Some(best)
}

// MST ordering for nets with more than two points: deterministic edge order
// by weight then endpoint index.
fn mst_pairs(points: &[PointInfo]) -> Vec<(usize, usize)> {
    if points.len() == 2 {
        return vec![(0, 1)];
    }
    let mut graph: GraphMap<usize, f64, Undirected> = GraphMap::new();
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            graph.add_edge(i, j, points[i].pt.dist(points[j].pt));
        }
    }
    let mst: GraphMap<usize, f64, Undirected> = GraphMap::from_elements(min_spanning_tree(&graph));
    let mut pairs: Vec<(usize, usize)> =
        mst.all_edges().map(|(a, b, _)| if a < b { (a, b) } else { (b, a) }).collect();
    pairs.sort_unstable();
    pairs
}

// Rewrites the netlist against off-board equivalence. Returns the nets to
// route and the rewritten connection list exposed to callers.
pub fn substitute_connections(
    srj: &SimpleRouteJson,
    conn: &ConnectivityMap,
) -> Result<(Vec<RouteNet>, Vec<Connection>)> {
    let registry = PointRegistry::from_srj(srj)?;
    let mut nets = vec![];
    let mut new_connections = vec![];

    for connection in srj.connections.iter().filter(|c| !c.off_board()) {
        let points: Vec<PointInfo> = connection
            .points_to_connect
            .iter()
            .enumerate()
            .filter_map(|(ix, p)| registry.get(&p.id_or(&connection.name, ix)).cloned())
            .collect();
        if points.len() < 2 {
            continue;
        }

        let mut pairs = vec![];
        for (i, j) in mst_pairs(&points) {
            match substitute_pair(conn, &registry, &points[i], &points[j]) {
                Some((u, v)) => {
                    if u.id != points[i].id || v.id != points[j].id {
                        debug!(
                            "{}: substituted ({}, {}) for ({}, {})",
                            connection.name, u.id, v.id, points[i].id, points[j].id
                        );
                    }
                    pairs.push((u, v));
                }
                None => debug!(
                    "{}: ({}, {}) already joined by external wiring",
                    connection.name, points[i].id, points[j].id
                ),
            }
        }

        for (ix, (u, v)) in pairs.iter().enumerate() {
            let name = if pairs.len() == 1 {
                connection.name.clone()
            } else {
                format!("{}_mst{}", connection.name, ix)
            };
            new_connections.push(Connection {
                name,
                root_connection_name: Some(connection.name.clone()),
                nominal_trace_width: connection.nominal_trace_width,
                points_to_connect: vec![
                    point_json(u, srj.layer_count),
                    point_json(v, srj.layer_count),
                ],
                ..Default::default()
            });
        }
        if !pairs.is_empty() {
            nets.push(RouteNet {
                connection_name: connection.name.clone(),
                nominal_trace_width: connection.nominal_trace_width,
                pairs,
            });
        }
    }
    Ok((nets, new_connections))
}

fn point_json(info: &PointInfo, layer_count: usize) -> ConnectionPoint {
    ConnectionPoint {
        x: info.pt.x,
        y: info.pt.y,
        layers: Some(
            info.layers.iter().map(|z| crate::model::layer::z_to_layer_name(z, layer_count)).collect(),
        ),
        point_id: Some(info.id.clone()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srj::types::Bounds;

    fn point(x: f64, y: f64, id: &str) -> ConnectionPoint {
        ConnectionPoint {
            x,
            y,
            layer: Some("top".to_string()),
            point_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn srj(connections: Vec<Connection>) -> SimpleRouteJson {
        SimpleRouteJson {
            layer_count: 2,
            min_trace_width: 0.2,
            bounds: Bounds { min_x: -20.0, max_x: 25.0, min_y: -20.0, max_y: 25.0 },
            connections,
            ..Default::default()
        }
    }

    fn routed_ids(connections: &[Connection]) -> Vec<Vec<String>> {
        connections
            .iter()
            .map(|c| {
                let mut ids: Vec<String> =
                    c.points_to_connect.iter().filter_map(|p| p.point_id.clone()).collect();
                ids.sort_unstable();
                ids
            })
            .collect()
    }

    #[test]
    fn test_substitution_basic() {
        // A connects to B; C is tied to B by external wiring and is much
        // closer to A, so the routed pair becomes (A, C).
        let srj = srj(vec![
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
        ]);
        let conn = ConnectivityMap::from_srj(&srj);
        let (nets, new_connections) = substitute_connections(&srj, &conn).unwrap();
        assert_eq!(nets.len(), 1);
        assert_eq!(routed_ids(&new_connections), vec![vec!["pointA".to_string(), "pointC".into()]]);
    }

    #[test]
    fn test_no_better_path_keeps_original(){
        // The off-board alternative is further away; the original pair stays.
        let srj = srj(vec![
            Connection {
                name: "main".into(),
                points_to_connect: vec![point(0.0, 0.0, "pX"), point(2.0, 0.0, "pA")],
                ..Default::default()
            },
            Connection {
                name: "external".into(),
                is_off_board: Some(true),
                points_to_connect: vec![point(2.0, 0.0, "pA2"), point(15.0, 15.0, "pFar")],
                ..Default::default()
            },
        ]);
        let conn = ConnectivityMap::from_srj(&srj);
        let (_, new_connections) = substitute_connections(&srj, &conn).unwrap();
        assert_eq!(routed_ids(&new_connections), vec![vec!["pA".to_string(), "pX".into()]]);
    }

    #[test]
    fn test_transitivity() {
        // X routes to A; A~B and B~C externally; C is nearest to X.
        let srj = srj(vec![
            Connection {
                name: "main".into(),
                points_to_connect: vec![point(0.0, 0.0, "pX"), point(10.0, 10.0, "pA")],
                ..Default::default()
            },
            Connection {
                name: "ext1".into(),
                is_off_board: Some(true),
                points_to_connect: vec![point(10.0, 10.0, "pA2"), point(20.0, 20.0, "pB")],
                ..Default::default()
            },
            Connection {
                name: "ext2".into(),
                is_off_board: Some(true),
                points_to_connect: vec![point(20.0, 20.0, "pB2"), point(1.0, 1.0, "pC")],
                ..Default::default()
            },
        ]);
        let conn = ConnectivityMap::from_srj(&srj);
        let (_, new_connections) = substitute_connections(&srj, &conn).unwrap();
        assert_eq!(routed_ids(&new_connections), vec![vec!["pC".to_string(), "pX".into()]]);
    }

    #[test]
    fn test_both_points_equivalent_needs_no_copper() {
        let srj = srj(vec![
            Connection {
                name: "main".into(),
                points_to_connect: vec![point(0.0, 0.0, "pU"), point(9.0, 0.0, "pV")],
                ..Default::default()
            },
            Connection {
                name: "external".into(),
                is_off_board: Some(true),
                points_to_connect: vec![point(0.0, 0.0, "pU2"), point(9.0, 0.0, "pV2")],
                ..Default::default()
            },
        ]);
        let conn = ConnectivityMap::from_srj(&srj);
        let (nets, new_connections) = substitute_connections(&srj, &conn).unwrap();
        assert!(nets.is_empty());
        assert!(new_connections.is_empty());
    }

    #[test]
    fn test_multi_point_mst() {
        // Net {A, B, C}; B has an external twin B2 close to the centre, so
        // both MST pairs land on B2.
        let srj = srj(vec![
            Connection {
                name: "main".into(),
                points_to_connect: vec![
                    point(0.0, 0.0, "pA"),
                    point(5.0, 8.0, "pB"),
                    point(10.0, 0.0, "pC"),
                ],
                ..Default::default()
            },
            Connection {
                name: "external".into(),
                is_off_board: Some(true),
                points_to_connect: vec![point(5.0, 8.0, "pBtwin"), point(5.0, 1.0, "pB2")],
                ..Default::default()
            },
        ]);
        let conn = ConnectivityMap::from_srj(&srj);
        let (nets, new_connections) = substitute_connections(&srj, &conn).unwrap();
        assert_eq!(nets[0].pairs.len(), 2);
        let ids = routed_ids(&new_connections);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&vec!["pA".to_string(), "pB2".into()]));
        assert!(ids.contains(&vec!["pB2".to_string(), "pC".into()]));
    }
}
