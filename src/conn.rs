use std::collections::HashMap;

use crate::model::layer::LayerSet;
use crate::srj::types::SimpleRouteJson;

// Disjoint-set over interned string ids, path compression on union, plain
// parent walk on read-only queries.
#[must_use]
#[derive(Debug, Default, Clone)]
pub struct Dsu {
    ids: HashMap<String, usize>,
    keys: Vec<String>,
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl Dsu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, key: &str) -> usize {
        if let Some(&ix) = self.ids.get(key) {
            return ix;
        }
        let ix = self.parent.len();
        self.ids.insert(key.to_string(), ix);
        self.keys.push(key.to_string());
        self.parent.push(ix);
        self.rank.push(0);
        ix
    }

    fn find_mut(&mut self, mut ix: usize) -> usize {
        while self.parent[ix] != ix {
            self.parent[ix] = self.parent[self.parent[ix]];
            ix = self.parent[ix];
        }
        ix
    }

    #[must_use]
    fn find(&self, mut ix: usize) -> usize {
        while self.parent[ix] != ix {
            ix = self.parent[ix];
        }
        ix
    }

    pub fn union(&mut self, a: &str, b: &str) {
        let (a, b) = (self.intern(a), self.intern(b));
        let (ra, rb) = (self.find_mut(a), self.find_mut(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    #[must_use]
    pub fn connected(&self, a: &str, b: &str) -> bool {
        match (self.ids.get(a), self.ids.get(b)) {
            (Some(&a), Some(&b)) => self.find(a) == self.find(b),
            _ => false,
        }
    }

    // Representative key for |key|'s class, if the key is known.
    pub fn canonical(&self, key: &str) -> Option<&str> {
        self.ids.get(key).map(|&ix| self.keys[self.find(ix)].as_str())
    }

    pub fn class_members(&self, key: &str) -> Vec<&str> {
        match self.ids.get(key) {
            None => vec![],
            Some(&ix) => {
                let root = self.find(ix);
                self.keys
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| self.find(i) == root)
                    .map(|(_, k)| k.as_str())
                    .collect()
            }
        }
    }
}

// Key for geometrically coincident points: centi-unit rounded coordinates
// plus the sorted layer list.
pub fn coord_key(x: f64, y: f64, layers: &LayerSet) -> String {
    let zs: Vec<String> = layers.iter().map(|z| z.to_string()).collect();
    format!("{},{}:{}", (x * 100.0).round() as i64, (y * 100.0).round() as i64, zs.join("-"))
}

// Electrical equivalence over every id in the input: connection names, point
// ids, obstacle ids, and coordinate keys. |off_board| additionally merges
// endpoints tied by external wiring (isOffBoard connections and obstacles
// sharing an offBoardConnectsTo net), and deliberately does NOT merge the
// endpoints of routable connections with each other.
#[must_use]
#[derive(Debug, Default, Clone)]
pub struct ConnectivityMap {
    pub copper: Dsu,
    pub off_board: Dsu,
}

impl ConnectivityMap {
    pub fn from_srj(srj: &SimpleRouteJson) -> Self {
        let mut copper = Dsu::new();
        let mut off_board = Dsu::new();

        for connection in &srj.connections {
            copper.intern(&connection.name);
            if let Some(root) = &connection.root_connection_name {
                copper.union(&connection.name, root);
            }
            for merged in connection.merged_connection_names.iter().flatten() {
                copper.union(&connection.name, merged);
            }
            for (ix, point) in connection.points_to_connect.iter().enumerate() {
                let id = point.id_or(&connection.name, ix);
                copper.union(&connection.name, &id);
                if let Ok(layers) = point.layer_set(srj.layer_count) {
                    copper.union(&id, &coord_key(point.x, point.y, &layers));
                    off_board.union(&id, &coord_key(point.x, point.y, &layers));
                }
                if connection.off_board() {
                    // External wiring: all points of an off-board connection
                    // are one node for substitution purposes.
                    off_board.union(&connection.name, &id);
                }
            }
        }

        for (ix, obstacle) in srj.obstacles.iter().enumerate() {
            let id = obstacle.id_or(ix);
            copper.intern(&id);
            off_board.intern(&id);
            for net in &obstacle.connected_to {
                copper.union(&id, net);
                off_board.union(&id, net);
            }
            for net in obstacle.off_board_connects_to.iter().flatten() {
                copper.union(&id, &format!("offboard:{net}"));
                off_board.union(&id, &format!("offboard:{net}"));
            }
        }

        Self { copper, off_board }
    }

    #[must_use]
    pub fn are_connected(&self, a: &str, b: &str) -> bool {
        self.copper.connected(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srj::types::{Bounds, Connection, ConnectionPoint, Obstacle};

    fn point(x: f64, y: f64, id: &str) -> ConnectionPoint {
        ConnectionPoint {
            x,
            y,
            layer: Some("top".to_string()),
            point_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn srj_with(connections: Vec<Connection>, obstacles: Vec<Obstacle>) -> SimpleRouteJson {
        SimpleRouteJson {
            layer_count: 2,
            min_trace_width: 0.2,
            bounds: Bounds { min_x: -10.0, max_x: 10.0, min_y: -10.0, max_y: 10.0 },
            obstacles,
            connections,
            ..Default::default()
        }
    }

    #[test]
    fn test_dsu_basic() {
        let mut dsu = Dsu::new();
        dsu.union("a", "b");
        dsu.union("b", "c");
        assert!(dsu.connected("a", "c"));
        assert!(!dsu.connected("a", "d"));
        let mut members = dsu.class_members("a");
        members.sort_unstable();
        assert_eq!(members, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_points_join_their_connection() {
        let srj = srj_with(
            vec![Connection {
                name: "net1".into(),
                points_to_connect: vec![point(0.0, 0.0, "pA"), point(1.0, 0.0, "pB")],
                ..Default::default()
            }],
            vec![],
        );
        let conn = ConnectivityMap::from_srj(&srj);
        assert!(conn.are_connected("pA", "net1"));
        assert!(conn.are_connected("pA", "pB"));
        // The copper map ties net endpoints; the off-board map must not.
        assert!(!conn.off_board.connected("pA", "pB"));
    }

    #[test]
    fn test_coincident_points_collapse() {
        let srj = srj_with(
            vec![
                Connection {
                    name: "net1".into(),
                    points_to_connect: vec![point(0.0, 0.0, "pA")],
                    ..Default::default()
                },
                Connection {
                    name: "net2".into(),
                    points_to_connect: vec![point(0.0, 0.0, "pB")],
                    ..Default::default()
                },
            ],
            vec![],
        );
        let conn = ConnectivityMap::from_srj(&srj);
        assert!(conn.are_connected("net1", "net2"));
    }

    #[test]
    fn test_obstacle_ties_and_offboard_net() {
        let obstacle_a = Obstacle {
            obstacle_id: Some("oA".into()),
            center: crate::model::primitive::pt(-2.0, 0.0),
            width: 1.0,
            height: 1.0,
            connected_to: vec!["netA".into()],
            off_board_connects_to: Some(vec!["BC_NET".into()]),
            ..Default::default()
        };
        let obstacle_b = Obstacle {
            obstacle_id: Some("oB".into()),
            center: crate::model::primitive::pt(2.0, 0.0),
            width: 1.0,
            height: 1.0,
            connected_to: vec!["netB".into()],
            off_board_connects_to: Some(vec!["BC_NET".into()]),
            ..Default::default()
        };
        let srj = srj_with(vec![], vec![obstacle_a, obstacle_b]);
        let conn = ConnectivityMap::from_srj(&srj);
        assert!(conn.are_connected("netA", "netB"));
        assert!(conn.off_board.connected("oA", "oB"));
    }

    #[test]
    fn test_off_board_connection_merges_points() {
        let srj = srj_with(
            vec![
                Connection {
                    name: "main".into(),
                    points_to_connect: vec![point(-7.0, 2.0, "pA"), point(10.0, -5.0, "pB")],
                    ..Default::default()
                },
                Connection {
                    name: "external".into(),
                    is_off_board: Some(true),
                    points_to_connect: vec![point(-7.0, -5.0, "pC"), point(10.0, -5.0, "pB2")],
                    ..Default::default()
                },
            ],
            vec![],
        );
        let conn = ConnectivityMap::from_srj(&srj);
        // pB2 is coincident with pB; the off-board connection merges pC with
        // pB2, so pC and pB are substitutable for each other.
        assert!(conn.off_board.connected("pC", "pB"));
        assert!(!conn.off_board.connected("pC", "pA"));
    }
}
