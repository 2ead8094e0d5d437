use std::collections::VecDeque;

use eyre::Result;
use log::debug;

use crate::mesh::{CapacityMesh, CapacityMeshNode, MAX_CELL_CAPACITY};
use crate::model::geom::math::{f64_cmp, EP};
use crate::model::layer::LayerSet;
use crate::model::primitive::point::Pt;
use crate::model::primitive::rect::Rt;
use crate::solver::{GraphicsObject, Progress, Solver};
use crate::srj::types::SimpleRouteJson;

// Obstacle pre-digested for mesh construction. The rect is inflated by the
// board's obstacle margin.
#[must_use]
#[derive(Debug, Clone)]
pub struct MeshObstacle {
    pub rt: Rt,
    pub layers: LayerSet,
    pub net: Option<String>,
    pub assignable: bool,
    pub offboard_nets: Vec<String>,
    pub srj_ix: usize,
}

impl MeshObstacle {
    pub fn from_srj(srj: &SimpleRouteJson) -> Result<Vec<MeshObstacle>> {
        let margin = srj.default_obstacle_margin.unwrap_or(0.0);
        srj.obstacles
            .iter()
            .enumerate()
            .map(|(ix, o)| {
                Ok(MeshObstacle {
                    rt: o.rt().expand(margin),
                    layers: o.layer_set(srj.layer_count)?,
                    net: o.connected_to.first().cloned(),
                    assignable: o.assignable(),
                    offboard_nets: o.off_board_connects_to.clone().unwrap_or_default(),
                    srj_ix: ix,
                })
            })
            .collect()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum BuildPhase {
    Subdivide,
    Link,
}

// Recursively subdivides the board into capacity-tagged cells and links
// face-adjacent cells on compatible layers. One frontier pop or one cell
// linked per step.
#[must_use]
#[derive(Debug)]
pub struct CapacityMeshSolver {
    progress: Progress,
    obstacles: Vec<MeshObstacle>,
    // Endpoints that must land in a leaf, checked when the build finishes.
    endpoints: Vec<(String, Pt, LayerSet)>,
    trace_width: f64,
    spacing: f64,
    min_cell_size: f64,
    layer_count: usize,
    frontier: VecDeque<Rt>,
    phase: BuildPhase,
    link_cursor: usize,
    mesh: CapacityMesh,
}

impl CapacityMeshSolver {
    pub fn new(srj: &SimpleRouteJson) -> Result<Self> {
        let obstacles = MeshObstacle::from_srj(srj)?;
        let mut endpoints = vec![];
        for connection in srj.connections.iter().filter(|c| !c.off_board()) {
            for (ix, point) in connection.points_to_connect.iter().enumerate() {
                endpoints.push((
                    point.id_or(&connection.name, ix),
                    point.pt(),
                    point.layer_set(srj.layer_count)?,
                ));
            }
        }

        let bounds = srj.bounds_rt();
        let trace_width = srj.min_trace_width;
        let spacing = srj.spacing();
        let min_cell_size = 2.0 * (trace_width + spacing);
        let est_cells = ((bounds.w() / min_cell_size).ceil() * (bounds.h() / min_cell_size).ceil())
            .max(1.0) as usize;
        let max_iterations =
            est_cells * 8 * srj.layer_count.max(1) + obstacles.len() * 256 + 512;

        let mut frontier = VecDeque::new();
        frontier.push_back(bounds);
        Ok(Self {
            progress: Progress::with_max(max_iterations),
            obstacles,
            endpoints,
            trace_width,
            spacing,
            min_cell_size,
            layer_count: srj.layer_count,
            frontier,
            phase: BuildPhase::Subdivide,
            link_cursor: 0,
            mesh: CapacityMesh { layer_count: srj.layer_count, ..Default::default() },
        })
    }

    pub fn into_mesh(self) -> CapacityMesh {
        self.mesh
    }

    fn capacity(&self, rt: &Rt, layers: &LayerSet) -> f64 {
        let per_layer = (rt.shorter_side() / (self.trace_width + self.spacing)).floor();
        (per_layer * layers.len() as f64).min(MAX_CELL_CAPACITY).max(1.0)
    }

    // Emits leaf nodes for |rt|: one per containing obstacle (on that
    // obstacle's layers), and one free node for the remaining layers.
    fn emit_leaf(&mut self, rt: Rt) {
        let mut free_layers = LayerSet::all(self.layer_count);
        let containing: Vec<usize> = (0..self.obstacles.len())
            .filter(|&ix| self.obstacles[ix].rt.contains_rt(&rt))
            .collect();
        for ix in containing {
            let layers = self.obstacles[ix].layers.intersection(&free_layers);
            if layers.is_empty() {
                continue;
            }
            for z in layers.iter() {
                free_layers.remove(z);
            }
            let obstacle = &self.obstacles[ix];
            if obstacle.net.is_none() && !obstacle.assignable {
                // Plain keepout: no node, traces cannot enter.
                continue;
            }
            let total_capacity = self.capacity(&rt, &layers);
            self.mesh.add_node(CapacityMeshNode {
                id: String::new(),
                rt,
                layers,
                total_capacity,
                net: obstacle.net.clone(),
                assigned_obstacle: obstacle.assignable.then_some(obstacle.srj_ix),
                removed: false,
            });
        }
        if !free_layers.is_empty() {
            let total_capacity = self.capacity(&rt, &free_layers);
            self.mesh.add_node(CapacityMeshNode {
                id: String::new(),
                rt,
                layers: free_layers,
                total_capacity,
                net: None,
                assigned_obstacle: None,
                removed: false,
            });
        }
    }

    // Split position: the median obstacle edge strictly inside the cell, so
    // cells converge onto obstacle boundaries; midline when no edge remains.
    fn split_cell(&self, rt: &Rt, hits: &[usize]) -> Option<(Rt, Rt)> {
        let margin = EP * 10.0;
        let x_first = rt.w() >= rt.h();
        for split_x in [x_first, !x_first] {
            let mut candidates: Vec<f64> = hits
                .iter()
                .flat_map(|&ix| {
                    let o = &self.obstacles[ix].rt;
                    if split_x { vec![o.l(), o.r()] } else { vec![o.b(), o.t()] }
                })
                .filter(|&c| {
                    if split_x {
                        c > rt.l() + margin && c < rt.r() - margin
                    } else {
                        c > rt.b() + margin && c < rt.t() - margin
                    }
                })
                .collect();
            if !candidates.is_empty() {
                candidates.sort_unstable_by(f64_cmp);
                let at = candidates[candidates.len() / 2];
                return Some(if split_x { rt.split_x_at(at) } else { rt.split_y_at(at) });
            }
        }
        (rt.longer_side() > self.min_cell_size * 2.0).then(|| rt.split2())
    }

    fn subdivide_step(&mut self) {
        let Some(rt) = self.frontier.pop_front() else {
            debug!("mesh subdivision done, {} nodes", self.mesh.nodes.len());
            self.phase = BuildPhase::Link;
            return;
        };
        // Edge contact does not count; only positive-area overlap matters.
        let hits: Vec<usize> = (0..self.obstacles.len())
            .filter(|&ix| {
                let o = &self.obstacles[ix].rt;
                o.l().max(rt.l()) + EP < o.r().min(rt.r())
                    && o.b().max(rt.b()) + EP < o.t().min(rt.t())
            })
            .collect();
        let mixed = hits.iter().any(|&ix| !self.obstacles[ix].rt.contains_rt(&rt));
        if hits.is_empty() || !mixed {
            self.emit_leaf(rt);
            return;
        }
        match self.split_cell(&rt, &hits) {
            Some((a, b)) => {
                self.frontier.push_back(a);
                self.frontier.push_back(b);
            }
            None => self.emit_leaf(rt),
        }
    }

    fn link_step(&mut self) {
        let i = self.link_cursor;
        if i >= self.mesh.nodes.len() {
            self.finish_build();
            return;
        }
        self.link_cursor += 1;
        for j in 0..i {
            let (a, b) = (&self.mesh.nodes[i], &self.mesh.nodes[j]);
            if a.rt == b.rt {
                // Stacked cells over the same footprint: connect when layer
                // sets contain adjacent z values (a via can transition).
                let stacked_adjacent = a
                    .layers
                    .iter()
                    .any(|za| (za > 0 && b.layers.contains(za - 1)) || b.layers.contains(za + 1));
                if stacked_adjacent {
                    self.mesh.add_edge(i, j, false, None);
                }
            } else if a.layers.intersects(&b.layers) && a.rt.shared_face(&b.rt).is_some() {
                self.mesh.add_edge(i, j, false, None);
            }
        }
    }

    fn finish_build(&mut self) {
        for (id, p, layers) in &self.endpoints {
            if self.mesh.containing_node(*p, layers).is_none() {
                let msg = format!("connection point {id} at {p} is not inside any mesh cell");
                self.progress.fail(msg);
                return;
            }
        }
        self.progress.finish();
    }
}

impl Solver for CapacityMeshSolver {
    fn name(&self) -> &'static str {
        "capacity_mesh"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        match self.phase {
            BuildPhase::Subdivide => self.subdivide_step(),
            BuildPhase::Link => self.link_step(),
        }
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        for node in &self.mesh.nodes {
            let label = format!("{} cap {:.0}", node.id, node.total_capacity);
            g.rect(&node.rt, Some(label), step);
        }
        for edge in &self.mesh.edges {
            let a = self.mesh.nodes[edge.nodes[0]].rt.center();
            let b = self.mesh.nodes[edge.nodes[1]].rt.center();
            g.line(vec![a, b], None, Some(edge.id.clone()), step);
        }
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srj::types::{Bounds, Connection, ConnectionPoint, Obstacle};

    fn srj_two_pads() -> SimpleRouteJson {
        let pad = |x: f64, id: &str, net: &str| Obstacle {
            obstacle_id: Some(id.to_string()),
            center: crate::model::primitive::pt(x, 0.0),
            width: 1.0,
            height: 1.0,
            connected_to: vec![net.to_string()],
            ..Default::default()
        };
        SimpleRouteJson {
            layer_count: 2,
            min_trace_width: 0.2,
            bounds: Bounds { min_x: -8.0, max_x: 8.0, min_y: -4.0, max_y: 4.0 },
            obstacles: vec![pad(-4.0, "left", "net1"), pad(4.0, "right", "net1")],
            connections: vec![Connection {
                name: "net1".into(),
                points_to_connect: vec![
                    ConnectionPoint {
                        x: -4.0,
                        y: 0.0,
                        layer: Some("top".into()),
                        point_id: Some("pA".into()),
                        ..Default::default()
                    },
                    ConnectionPoint {
                        x: 4.0,
                        y: 0.0,
                        layer: Some("top".into()),
                        point_id: Some("pB".into()),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_build_two_pad_mesh() {
        let mut solver = CapacityMeshSolver::new(&srj_two_pads()).unwrap();
        solver.solve();
        assert!(solver.solved(), "{:?}", solver.error());
        let mesh = solver.into_mesh();
        assert!(!mesh.nodes.is_empty());
        assert!(!mesh.edges.is_empty());
        // Both endpoints land in a cell.
        let top = LayerSet::single(0);
        assert!(mesh.containing_node(crate::model::primitive::pt(-4.0, 0.0), &top).is_some());
        assert!(mesh.containing_node(crate::model::primitive::pt(4.0, 0.0), &top).is_some());
    }

    #[test]
    fn test_edges_are_symmetric() {
        let mut solver = CapacityMeshSolver::new(&srj_two_pads()).unwrap();
        solver.solve();
        let mesh = solver.into_mesh();
        for (ix, edge) in mesh.edges.iter().enumerate() {
            let [a, b] = edge.nodes;
            assert!(mesh.adjacency[a].contains(&ix));
            assert!(mesh.adjacency[b].contains(&ix));
        }
    }

    #[test]
    fn test_capacity_positive_and_capped() {
        let mut solver = CapacityMeshSolver::new(&srj_two_pads()).unwrap();
        solver.solve();
        let mesh = solver.into_mesh();
        for node in &mesh.nodes {
            assert!(node.total_capacity >= 1.0);
            assert!(node.total_capacity <= MAX_CELL_CAPACITY);
        }
    }
}
