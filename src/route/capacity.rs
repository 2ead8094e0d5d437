use std::cmp::Reverse;
use std::collections::HashMap;

use log::debug;
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;

use crate::conn::ConnectivityMap;
use crate::mesh::{CapacityMesh, NodeIx};
use crate::route::offboard::{PointInfo, RouteNet};
use crate::solver::{GraphicsObject, Progress, Solver};

#[must_use]
#[derive(Debug, Clone)]
pub struct CapacityPathingHyperParameters {
    // Added when entering an assignable-via cell.
    pub via_penalty: f64,
    // Floor for remaining capacity in the cost divisor, so congested cells
    // become expensive instead of unreachable.
    pub capacity_floor: f64,
}

impl Default for CapacityPathingHyperParameters {
    fn default() -> Self {
        Self { via_penalty: 1.0, capacity_floor: 0.25 }
    }
}

// A coarse node path for one endpoint pair of a net.
#[must_use]
#[derive(Debug, Clone)]
pub struct NetPath {
    pub connection_name: String,
    pub nominal_trace_width: Option<f64>,
    pub start: PointInfo,
    pub goal: PointInfo,
    pub nodes: Vec<NodeIx>,
}

type QueueKey = Reverse<(OrderedFloat<f64>, OrderedFloat<f64>, usize)>;

#[derive(Debug)]
struct AStarState {
    open: PriorityQueue<NodeIx, QueueKey>,
    g: HashMap<NodeIx, f64>,
    came_from: HashMap<NodeIx, NodeIx>,
    goal: NodeIx,
    counter: usize,
}

// Per-net A* over the capacity mesh, expanding one node per step. Cost is
// centre-to-centre distance divided by the destination cell's remaining
// capacity, which biases nets away from congested cells. Earlier nets
// decrement capacity seen by later ones.
#[must_use]
#[derive(Debug)]
pub struct CapacityPathingSolver {
    progress: Progress,
    mesh: CapacityMesh,
    conn: ConnectivityMap,
    nets: Vec<RouteNet>,
    params: CapacityPathingHyperParameters,
    remaining: Vec<f64>,
    assigned: Vec<usize>,
    net_cursor: usize,
    pair_cursor: usize,
    search: Option<AStarState>,
    pub paths: Vec<NetPath>,
}

impl CapacityPathingSolver {
    pub fn new(
        mesh: CapacityMesh,
        conn: ConnectivityMap,
        nets: Vec<RouteNet>,
        params: CapacityPathingHyperParameters,
    ) -> Self {
        let pair_count: usize = nets.iter().map(|n| n.pairs.len()).sum();
        let max_iterations = pair_count.max(1) * (mesh.nodes.len() + mesh.edges.len() + 8) + 16;
        let remaining: Vec<f64> = mesh.nodes.iter().map(|n| n.total_capacity).collect();
        let assigned = vec![0; mesh.nodes.len()];
        Self {
            progress: Progress::with_max(max_iterations),
            mesh,
            conn,
            nets,
            params,
            remaining,
            assigned,
            net_cursor: 0,
            pair_cursor: 0,
            search: None,
            paths: vec![],
        }
    }

    pub fn into_outputs(self) -> (CapacityMesh, ConnectivityMap, Vec<NetPath>) {
        (self.mesh, self.conn, self.paths)
    }

    pub fn mesh(&self) -> &CapacityMesh {
        &self.mesh
    }

    fn current_pair(&self) -> Option<(&RouteNet, &PointInfo, &PointInfo)> {
        let net = self.nets.get(self.net_cursor)?;
        let (u, v) = net.pairs.get(self.pair_cursor)?;
        Some((net, u, v))
    }

    fn advance_pair(&mut self) {
        self.search = None;
        self.pair_cursor += 1;
        while let Some(net) = self.nets.get(self.net_cursor) {
            if self.pair_cursor < net.pairs.len() {
                break;
            }
            self.net_cursor += 1;
            self.pair_cursor = 0;
        }
    }

    // May the net enter this node at all?
    fn enterable(&self, ix: NodeIx, connection_name: &str) -> bool {
        let node = &self.mesh.nodes[ix];
        if node.removed {
            return false;
        }
        match &node.net {
            // Netted cells (pads, claimed assignable vias) only admit their
            // own net.
            Some(net) => self.conn.are_connected(net, connection_name),
            None => true,
        }
    }

    fn begin_search(&mut self) {
        let Some((net, u, v)) = self.current_pair() else {
            self.finish_pathing();
            return;
        };
        let connection_name = net.connection_name.clone();
        let (start, goal) =
            (self.mesh.containing_node(u.pt, &u.layers), self.mesh.containing_node(v.pt, &v.layers));
        let (Some(start), Some(goal)) = (start, goal) else {
            let msg = format!("net {connection_name}: endpoint outside the capacity mesh");
            self.progress.fail(msg);
            return;
        };
        if start == goal {
            self.record_path(vec![start]);
            return;
        }
        let mut state = AStarState {
            open: PriorityQueue::new(),
            g: HashMap::new(),
            came_from: HashMap::new(),
            goal,
            counter: 0,
        };
        let h = self.mesh.nodes[start].rt.center().dist(self.mesh.nodes[goal].rt.center());
        state.g.insert(start, 0.0);
        state.open.push(start, Reverse((OrderedFloat(h), OrderedFloat(h), 0)));
        self.search = Some(state);
    }

    fn record_path(&mut self, nodes: Vec<NodeIx>) {
        let (net, u, v) = self.current_pair().expect("path recorded without an active pair");
        let path = NetPath {
            connection_name: net.connection_name.clone(),
            nominal_trace_width: net.nominal_trace_width,
            start: u.clone(),
            goal: v.clone(),
            nodes,
        };
        for &ix in &path.nodes {
            self.remaining[ix] = (self.remaining[ix] - 1.0).max(0.0);
            self.assigned[ix] += 1;
            // Routing through an assignable-via cell claims its obstacle for
            // this net.
            if self.mesh.nodes[ix].assigned_obstacle.is_some() && self.mesh.nodes[ix].net.is_none()
            {
                self.mesh.nodes[ix].net = Some(path.connection_name.clone());
            }
        }
        debug!("{}: coarse path over {} cells", path.connection_name, path.nodes.len());
        self.paths.push(path);
        self.advance_pair();
    }

    fn finish_pathing(&mut self) {
        // Capacity overflow after the fact fails the phase; the pipeline
        // reacts with a dead-end pass and a retry.
        for (ix, node) in self.mesh.nodes.iter().enumerate() {
            if self.assigned[ix] as f64 > node.total_capacity {
                let msg = format!(
                    "cell {} over capacity: {} assigned, {} available",
                    node.id, self.assigned[ix], node.total_capacity
                );
                self.progress.fail(msg);
                return;
            }
        }
        self.progress.finish();
    }

    // One A* pop.
    fn search_step(&mut self) {
        let connection_name = match self.current_pair() {
            Some((net, ..)) => net.connection_name.clone(),
            None => return,
        };
        let Some(mut state) = self.search.take() else { return };
        let Some((current, _)) = state.open.pop() else {
            let msg = format!("net {connection_name}: no path through the capacity mesh");
            self.progress.fail(msg);
            return;
        };
        if current == state.goal {
            let mut nodes = vec![current];
            let mut at = current;
            while let Some(&prev) = state.came_from.get(&at) {
                nodes.push(prev);
                at = prev;
            }
            nodes.reverse();
            self.record_path(nodes);
            return;
        }

        let goal_center = self.mesh.nodes[state.goal].rt.center();
        let current_g = state.g[&current];
        let current_center = self.mesh.nodes[current].rt.center();
        for (edge_ix, nbr) in self.mesh.neighbors(current) {
            let edge = &self.mesh.edges[edge_ix];
            if edge.is_offboard_edge {
                // Off-board edges carry their own virtual net; an assignable
                // cell pair whose net is still open may adopt it.
                let matches = edge.offboard_net_name.as_deref().map_or(false, |net| {
                    self.conn.copper.connected(&connection_name, &format!("offboard:{net}"))
                });
                let adoptable = self.mesh.nodes[current].assigned_obstacle.is_some()
                    && self.mesh.nodes[nbr].assigned_obstacle.is_some()
                    && self.mesh.nodes[nbr].net.is_none();
                if !matches && !adoptable {
                    continue;
                }
            }
            if !self.enterable(nbr, &connection_name) {
                continue;
            }
            let node = &self.mesh.nodes[nbr];
            let dist =
                if edge.is_offboard_edge { 0.0 } else { current_center.dist(node.rt.center()) };
            let mut cost = dist / self.remaining[nbr].max(self.params.capacity_floor);
            if node.assigned_obstacle.is_some() {
                cost += self.params.via_penalty;
            }
            let tentative = current_g + cost;
            if state.g.get(&nbr).map_or(true, |&g| tentative < g) {
                state.g.insert(nbr, tentative);
                state.came_from.insert(nbr, current);
                let h = node.rt.center().dist(goal_center);
                state.counter += 1;
                let key = Reverse((OrderedFloat(tentative + h), OrderedFloat(h), state.counter));
                state.open.push(nbr, key);
            }
        }
        self.search = Some(state);
    }
}

impl Solver for CapacityPathingSolver {
    fn name(&self) -> &'static str {
        "capacity_pathing"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        if self.current_pair().is_none() {
            self.finish_pathing();
            return;
        }
        if self.search.is_none() {
            self.begin_search();
            return;
        }
        self.search_step();
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        for path in &self.paths {
            let points = path.nodes.iter().map(|&ix| self.mesh.nodes[ix].rt.center()).collect();
            g.line(points, None, Some(path.connection_name.clone()), step);
        }
        g
    }
}

// The nodes containing routed endpoints; these survive dead-end pruning.
pub fn required_nodes(mesh: &CapacityMesh, nets: &[RouteNet]) -> Vec<NodeIx> {
    let mut required = vec![];
    for net in nets {
        for (u, v) in &net.pairs {
            for info in [u, v] {
                if let Some(ix) = mesh.containing_node(info.pt, &info.layers) {
                    required.push(ix);
                }
            }
        }
    }
    required.sort_unstable();
    required.dedup();
    required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::CapacityMeshSolver;
    use crate::model::layer::LayerSet;
    use crate::route::offboard::substitute_connections;
    use crate::srj::types::{Bounds, Connection, ConnectionPoint, SimpleRouteJson};

    fn two_net_srj() -> SimpleRouteJson {
        let point = |x: f64, y: f64, id: &str| ConnectionPoint {
            x,
            y,
            layer: Some("top".to_string()),
            point_id: Some(id.to_string()),
            ..Default::default()
        };
        SimpleRouteJson {
            layer_count: 2,
            min_trace_width: 0.2,
            bounds: Bounds { min_x: -8.0, max_x: 8.0, min_y: -4.0, max_y: 4.0 },
            connections: vec![
                Connection {
                    name: "net1".into(),
                    points_to_connect: vec![point(-6.0, -2.0, "a1"), point(6.0, -2.0, "a2")],
                    ..Default::default()
                },
                Connection {
                    name: "net2".into(),
                    points_to_connect: vec![point(-6.0, 2.0, "b1"), point(6.0, 2.0, "b2")],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    fn solve_paths(srj: &SimpleRouteJson) -> CapacityPathingSolver {
        let conn = crate::conn::ConnectivityMap::from_srj(srj);
        let mut mesh_solver = CapacityMeshSolver::new(srj).unwrap();
        mesh_solver.solve();
        assert!(mesh_solver.solved(), "{:?}", mesh_solver.error());
        let mesh = mesh_solver.into_mesh();
        let (nets, _) = substitute_connections(srj, &conn).unwrap();
        let mut solver =
            CapacityPathingSolver::new(mesh, conn, nets, CapacityPathingHyperParameters::default());
        solver.solve();
        solver
    }

    #[test]
    fn test_paths_found_for_every_net() {
        let solver = solve_paths(&two_net_srj());
        assert!(solver.solved(), "{:?}", solver.error());
        assert_eq!(solver.paths.len(), 2);
        for path in &solver.paths {
            assert!(!path.nodes.is_empty());
        }
    }

    #[test]
    fn test_paths_start_and_end_at_endpoints() {
        let solver = solve_paths(&two_net_srj());
        let top = LayerSet::single(0);
        for path in &solver.paths {
            let first = path.nodes[0];
            let last = *path.nodes.last().unwrap();
            assert_eq!(solver.mesh.containing_node(path.start.pt, &top), Some(first));
            assert!(solver.mesh.nodes[last].rt.contains(path.goal.pt));
        }
    }

    #[test]
    fn test_path_nodes_are_adjacent() {
        let solver = solve_paths(&two_net_srj());
        for path in &solver.paths {
            for window in path.nodes.windows(2) {
                let adjacent = solver.mesh.neighbors(window[0]).any(|(_, n)| n == window[1]);
                assert!(adjacent, "non-adjacent hop in {}", path.connection_name);
            }
        }
    }

    #[test]
    fn test_capacity_decrements() {
        let solver = solve_paths(&two_net_srj());
        let used: usize = solver.assigned.iter().sum();
        assert!(used > 0);
        for (ix, node) in solver.mesh.nodes.iter().enumerate() {
            assert!(solver.assigned[ix] as f64 <= node.total_capacity);
        }
    }
}
