use std::collections::{BTreeMap, HashMap, HashSet};

use itertools::Itertools;
use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::mesh::{CapacityMesh, EdgeIx, NodeIx};
use crate::model::geom::intersects::seg_intersects_seg;
use crate::model::geom::math::f64_lt;
use crate::model::layer::LayerSet;
use crate::model::primitive::point::{Pt, Pt3};
use crate::model::primitive::rect::Rt;
use crate::model::primitive::seg;
use crate::model::primitive::segment::Segment;
use crate::route::capacity::NetPath;
use crate::solver::{GraphicsObject, Progress, Solver};

// How contested sections are re-drawn: seeded shuffling of random sections,
// or exhaustive re-ordering of the worst section (the legacy approach).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum SectionStrategy {
    #[default]
    MultiSectionShuffle,
    Unravel,
}

#[must_use]
#[derive(Debug, Clone)]
pub struct PortPointHyperParameters {
    pub strategy: SectionStrategy,
    pub shuffle_seed: u64,
    // Penalty per trace over a cell's capacity.
    pub node_pf_factor: f64,
    // Fraction of optimizer moves that target faces of assignable-via cells.
    pub force_off_board_frequency: f64,
    pub center_offset_dist_penalty_factor: f64,
    pub force_center_first: bool,
    // Early-out: stop optimizing once the score reaches this level.
    pub min_allowed_board_score: f64,
    pub optimizer_budget: usize,
    // Stop after this many consecutive non-improving moves.
    pub plateau_window: usize,
}

impl Default for PortPointHyperParameters {
    fn default() -> Self {
        Self {
            strategy: SectionStrategy::default(),
            shuffle_seed: 1,
            node_pf_factor: 1.0,
            force_off_board_frequency: 0.1,
            center_offset_dist_penalty_factor: 0.05,
            force_center_first: false,
            min_allowed_board_score: -0.25,
            optimizer_budget: 400,
            plateau_window: 60,
        }
    }
}

// A concrete crossing point on the face between two cells.
#[must_use]
#[derive(Debug, Clone)]
pub struct PortPoint {
    pub connection_name: String,
    pub pt3: Pt3,
}

#[must_use]
#[derive(Debug, Clone)]
pub struct NodeWithPortPoints {
    pub node_ix: NodeIx,
    pub rt: Rt,
    pub layers: LayerSet,
    pub port_points: Vec<PortPoint>,
}

// Per coarse path: the exact points the trace passes through, endpoint to
// endpoint, plus the cells it traverses.
#[must_use]
#[derive(Debug, Clone)]
pub struct PathPortPoints {
    pub connection_name: String,
    pub nominal_trace_width: Option<f64>,
    pub nodes: Vec<NodeIx>,
    pub points: Vec<Pt3>,
}

#[must_use]
#[derive(Debug, Default, Clone)]
pub struct PortPointOutput {
    pub nodes_with_port_points: Vec<NodeWithPortPoints>,
    pub path_port_points: Vec<PathPortPoints>,
}

#[must_use]
#[derive(Debug, Default, Clone, Copy)]
pub struct OptimizerStats {
    pub current_board_score: f64,
    pub accepted: usize,
    pub rejected: usize,
}

// One path hop across one face.
#[derive(Debug, Clone)]
struct Traversal {
    path_ix: usize,
    hop_ix: usize,
    desired_t: f64,
}

#[derive(Debug, Clone)]
struct FaceCrossings {
    face: Segment,
    // Layer crossings happen on; lowest layer common to both cells, else the
    // target cell's lowest layer (a via inside the cell bridges the rest).
    z: usize,
    offboard_adjacent: bool,
    traversals: Vec<Traversal>,
    // Permutation of traversal indices; rank determines position on the face.
    order: Vec<usize>,
    // Extra jitter applied to the uniform spacing, in face parameter units.
    jitter: Vec<f64>,
}

impl FaceCrossings {
    fn t_of_rank(&self, rank: usize) -> f64 {
        let k = self.order.len() as f64;
        ((rank + 1) as f64 / (k + 1.0) + self.jitter[rank]).clamp(0.05, 0.95)
    }

    fn position_of(&self, traversal_ix: usize) -> Pt {
        let rank = self.order.iter().position(|&t| t == traversal_ix).unwrap_or(0);
        self.face.lerp(self.t_of_rank(rank))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PortPhase {
    Collect,
    Assign,
    Optimize,
    Emit,
}

// Chooses exact crossing coordinates on every shared cell face carrying
// traffic, then locally optimizes contested sections against the board
// score. One path collected, one face assigned, or one optimizer move per
// step.
#[must_use]
#[derive(Debug)]
pub struct PortPointPathingSolver {
    progress: Progress,
    mesh: CapacityMesh,
    paths: Vec<NetPath>,
    trace_width: f64,
    spacing: f64,
    params: PortPointHyperParameters,
    phase: PortPhase,
    path_cursor: usize,
    face_cursor: usize,
    faces: Vec<FaceCrossings>,
    face_by_edge: HashMap<EdgeIx, usize>,
    // (path_ix, hop_ix) -> (face_ix, traversal_ix)
    hop_to_face: HashMap<(usize, usize), (usize, usize)>,
    // Off-board hops leave copper: exit pad in the source cell, entry pad in
    // the target cell; the span between them is external wiring.
    offboard_hops: HashMap<(usize, usize), (Pt3, Pt3)>,
    rng: SmallRng,
    stats: OptimizerStats,
    plateau: usize,
    unraveled: HashSet<usize>,
    output: Option<PortPointOutput>,
}

impl PortPointPathingSolver {
    pub fn new(
        mesh: CapacityMesh,
        paths: Vec<NetPath>,
        trace_width: f64,
        spacing: f64,
        params: PortPointHyperParameters,
    ) -> Self {
        let hops: usize = paths.iter().map(|p| p.nodes.len().saturating_sub(1)).sum();
        let max_iterations = paths.len() + hops * 2 + params.optimizer_budget + 16;
        let rng = SmallRng::seed_from_u64(params.shuffle_seed);
        Self {
            progress: Progress::with_max(max_iterations),
            mesh,
            paths,
            trace_width,
            spacing,
            params,
            phase: PortPhase::Collect,
            path_cursor: 0,
            face_cursor: 0,
            faces: vec![],
            face_by_edge: HashMap::new(),
            hop_to_face: HashMap::new(),
            offboard_hops: HashMap::new(),
            rng,
            stats: OptimizerStats::default(),
            plateau: 0,
            unraveled: HashSet::new(),
            output: None,
        }
    }

    #[must_use]
    pub fn stats(&self) -> OptimizerStats {
        self.stats
    }

    pub fn into_outputs(self) -> (CapacityMesh, Vec<NetPath>, PortPointOutput) {
        let output = self.output.unwrap_or_default();
        (self.mesh, self.paths, output)
    }

    fn crossing_z(&self, a: NodeIx, b: NodeIx) -> usize {
        let common = self.mesh.nodes[a].layers.intersection(&self.mesh.nodes[b].layers);
        let z = common.iter().next().or_else(|| self.mesh.nodes[b].layers.iter().next()).unwrap_or(0);
        z
    }

    // Register every hop of one path with its face.
    fn collect_step(&mut self) {
        let path_ix = self.path_cursor;
        if path_ix >= self.paths.len() {
            self.phase = PortPhase::Assign;
            return;
        }
        self.path_cursor += 1;
        let path = self.paths[path_ix].clone();
        let mut prev_pt = path.start.pt;
        for hop_ix in 0..path.nodes.len().saturating_sub(1) {
            let (a, b) = (path.nodes[hop_ix], path.nodes[hop_ix + 1]);
            let Some((edge_ix, _)) = self.mesh.neighbors(a).find(|&(_, n)| n == b) else {
                self.progress.fail(format!("{}: path hop without an edge", path.connection_name));
                return;
            };
            if self.mesh.edges[edge_ix].is_offboard_edge {
                let za = self.mesh.nodes[a].layers.iter().next().unwrap_or(0);
                let zb = self.mesh.nodes[b].layers.iter().next().unwrap_or(0);
                let (ca, cb) = (self.mesh.nodes[a].rt.center(), self.mesh.nodes[b].rt.center());
                self.offboard_hops.insert(
                    (path_ix, hop_ix),
                    (Pt3::new(ca.x, ca.y, za), Pt3::new(cb.x, cb.y, zb)),
                );
                prev_pt = cb;
                continue;
            }
            let face = match self.mesh.nodes[a].rt.shared_face(&self.mesh.nodes[b].rt) {
                Some(face) => face,
                // Stacked cells: the "face" is the shared footprint centre.
                None => {
                    let c = self.mesh.nodes[b].rt.center();
                    seg(c, c)
                }
            };
            let z = self.crossing_z(a, b);
            let offboard_adjacent = self.mesh.nodes[a].assigned_obstacle.is_some()
                || self.mesh.nodes[b].assigned_obstacle.is_some();
            let face_ix = *self.face_by_edge.entry(edge_ix).or_insert_with(|| {
                self.faces.push(FaceCrossings {
                    face,
                    z,
                    offboard_adjacent,
                    traversals: vec![],
                    order: vec![],
                    jitter: vec![],
                });
                self.faces.len() - 1
            });
            // Order along the face implied by the incoming geometry: project
            // the midpoint of the chord onto the face.
            let target = self.mesh.nodes[b].rt.center();
            let chord_mid = (prev_pt + target) / 2.0;
            let fc = &mut self.faces[face_ix];
            let desired_t = if fc.face.is_empty() { 0.5 } else { fc.face.project_t(chord_mid).clamp(0.0, 1.0) };
            fc.traversals.push(Traversal { path_ix, hop_ix, desired_t });
            self.hop_to_face.insert((path_ix, hop_ix), (face_ix, fc.traversals.len() - 1));
            prev_pt = fc.face.project(chord_mid);
        }
    }

    // Order-preserving uniform distribution for one face.
    fn assign_step(&mut self) {
        let face_ix = self.face_cursor;
        if face_ix >= self.faces.len() {
            self.stats.current_board_score = self.board_score();
            self.phase = PortPhase::Optimize;
            return;
        }
        self.face_cursor += 1;
        let fc = &mut self.faces[face_ix];
        let mut order: Vec<usize> = (0..fc.traversals.len()).collect();
        order.sort_by(|&i, &j| {
            fc.traversals[i]
                .desired_t
                .partial_cmp(&fc.traversals[j].desired_t)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(i.cmp(&j))
        });
        fc.jitter = vec![0.0; order.len()];
        fc.order = order;
    }

    // Point the path passes through at hop |hop_ix|.
    fn crossing_pt3(&self, path_ix: usize, hop_ix: usize) -> Pt3 {
        let (face_ix, traversal_ix) = self.hop_to_face[&(path_ix, hop_ix)];
        let fc = &self.faces[face_ix];
        let p = fc.position_of(traversal_ix);
        Pt3::new(p.x, p.y, fc.z)
    }

    // Per traversed cell: (node, entry point, exit point), endpoints
    // included. Off-board hops break the copper between exit and entry pads.
    fn cell_points(&self, path_ix: usize) -> Vec<(NodeIx, Pt3, Pt3)> {
        let path = &self.paths[path_ix];
        let start_z = self.endpoint_z(path.nodes[0], &path.start.layers);
        let mut current_entry = Pt3::new(path.start.pt.x, path.start.pt.y, start_z);
        let mut cells = vec![];
        for hop_ix in 0..path.nodes.len().saturating_sub(1) {
            let node = path.nodes[hop_ix];
            let (exit, next_entry) = match self.offboard_hops.get(&(path_ix, hop_ix)) {
                Some(&(exit, entry)) => (exit, entry),
                None => {
                    let c = self.crossing_pt3(path_ix, hop_ix);
                    (c, c)
                }
            };
            cells.push((node, current_entry, exit));
            current_entry = next_entry;
        }
        let goal_node = *path.nodes.last().unwrap_or(&path.nodes[0]);
        let goal_z = self.endpoint_z(goal_node, &path.goal.layers);
        cells.push((goal_node, current_entry, Pt3::new(path.goal.pt.x, path.goal.pt.y, goal_z)));
        cells
    }

    // Full point list for a path, endpoints included.
    fn path_points(&self, path_ix: usize) -> Vec<Pt3> {
        let cells = self.cell_points(path_ix);
        let mut points = vec![cells[0].1];
        for (_, entry, exit) in &cells {
            if points.last() != Some(entry) {
                points.push(*entry);
            }
            if points.last() != Some(exit) {
                points.push(*exit);
            }
        }
        points
    }

    fn endpoint_z(&self, node: NodeIx, layers: &LayerSet) -> usize {
        let common = self.mesh.nodes[node].layers.intersection(layers);
        let z = common.iter().next().or_else(|| layers.iter().next()).unwrap_or(0);
        z
    }

    // Board score: negative overlaps and penalties, higher is better.
    fn board_score(&self) -> f64 {
        let mut score = 0.0;
        // Cross-net chord intersections inside every traversed cell. The map
        // is ordered so the floating point sum is reproducible.
        let mut chords: BTreeMap<NodeIx, Vec<(usize, Segment)>> = BTreeMap::new();
        for path_ix in 0..self.paths.len() {
            for (node, entry, exit) in self.cell_points(path_ix) {
                chords.entry(node).or_default().push((path_ix, seg(entry.pt(), exit.pt())));
            }
        }
        for (_, cell_chords) in &chords {
            for i in 0..cell_chords.len() {
                for j in (i + 1)..cell_chords.len() {
                    let (pi, si) = &cell_chords[i];
                    let (pj, sj) = &cell_chords[j];
                    if self.paths[*pi].connection_name == self.paths[*pj].connection_name {
                        continue;
                    }
                    if seg_intersects_seg(si, sj) {
                        score -= 1.0;
                    }
                }
            }
        }
        // Spacing pressure: adjacent crossings forced closer than the rule.
        let clearance = self.trace_width + self.spacing;
        for fc in &self.faces {
            let k = fc.order.len();
            if k >= 2 && !fc.face.is_empty() {
                for rank in 1..k {
                    let gap = (fc.t_of_rank(rank) - fc.t_of_rank(rank - 1)).abs() * fc.face.len();
                    if f64_lt(gap, clearance) {
                        score -= 1.0;
                    }
                }
            }
            // Distance-from-centre penalty.
            for rank in 0..k {
                let offset = (fc.t_of_rank(rank) - 0.5).abs();
                score -= self.params.center_offset_dist_penalty_factor * offset;
            }
        }
        // Per-cell congestion pressure.
        for (node, cell_chords) in &chords {
            let over = cell_chords.len() as f64 - self.mesh.nodes[*node].total_capacity;
            if over > 0.0 {
                score -= self.params.node_pf_factor * over;
            }
        }
        score
    }

    // One local optimizer move: pick a contested face, shuffle its section,
    // keep the change only when the board score improves.
    fn optimize_step(&mut self) {
        let budget_spent = self.stats.accepted + self.stats.rejected;
        let plateaued = self.plateau >= self.params.plateau_window;
        let good_enough = self.stats.current_board_score >= self.params.min_allowed_board_score;
        if budget_spent >= self.params.optimizer_budget || plateaued || good_enough {
            debug!(
                "port point optimizer done: score {:.3}, {} accepted / {} rejected",
                self.stats.current_board_score, self.stats.accepted, self.stats.rejected
            );
            self.phase = PortPhase::Emit;
            return;
        }
        if self.params.strategy == SectionStrategy::Unravel {
            self.unravel_step();
            return;
        }
        // Contested faces carry several traces; faces next to assignable-via
        // cells are additionally visited every 1/frequency moves.
        let offboard_turn = self.params.force_off_board_frequency > 0.0
            && budget_spent
                % ((1.0 / self.params.force_off_board_frequency).round() as usize).max(1)
                == 0;
        let pool: Vec<usize> = self
            .faces
            .iter()
            .enumerate()
            .filter(|(_, fc)| !fc.order.is_empty())
            .filter(|(_, fc)| {
                fc.traversals.len() >= 2 || (offboard_turn && fc.offboard_adjacent)
            })
            .map(|(ix, _)| ix)
            .collect();
        if pool.is_empty() {
            self.phase = PortPhase::Emit;
            return;
        }
        let face_ix = pool[self.rng.gen_range(0..pool.len())];
        let force_center = self.params.force_center_first;
        let fc = &mut self.faces[face_ix];
        let k = fc.order.len();
        if force_center && k == 1 {
            // A lone crossing stays pinned to the face centre.
            self.stats.rejected += 1;
            self.plateau += 1;
            return;
        }
        // Candidate move: swap two ranks, or jitter one crossing.
        let saved_order = fc.order.clone();
        let saved_jitter = fc.jitter.clone();
        if k >= 2 && self.rng.gen_bool(0.5) {
            let i = self.rng.gen_range(0..k);
            let j = self.rng.gen_range(0..k);
            fc.order.swap(i, j);
        } else {
            let i = self.rng.gen_range(0..k);
            let delta = (self.rng.gen::<f64>() - 0.5) * 0.2;
            fc.jitter[i] += delta;
        }
        let candidate = self.board_score();
        if candidate > self.stats.current_board_score {
            self.stats.current_board_score = candidate;
            self.stats.accepted += 1;
            self.plateau = 0;
        } else {
            let fc = &mut self.faces[face_ix];
            fc.order = saved_order;
            fc.jitter = saved_jitter;
            self.stats.rejected += 1;
            self.plateau += 1;
        }
    }

    // Legacy section search: exhaustively re-order the most contested face
    // not yet visited and keep the best permutation.
    fn unravel_step(&mut self) {
        let next = self
            .faces
            .iter()
            .enumerate()
            .filter(|(ix, fc)| !self.unraveled.contains(ix) && fc.traversals.len() >= 2)
            .max_by_key(|(_, fc)| fc.traversals.len())
            .map(|(ix, _)| ix);
        let Some(face_ix) = next else {
            self.phase = PortPhase::Emit;
            return;
        };
        self.unraveled.insert(face_ix);
        let k = self.faces[face_ix].order.len();
        if k > 5 {
            // Too many permutations; leave the order-preserving assignment.
            self.stats.rejected += 1;
            return;
        }
        let base: Vec<usize> = self.faces[face_ix].order.clone();
        let mut best = (self.board_score(), base.clone());
        for perm in base.iter().copied().permutations(k) {
            self.faces[face_ix].order = perm.clone();
            let score = self.board_score();
            if score > best.0 {
                best = (score, perm);
            }
        }
        self.faces[face_ix].order = best.1;
        if best.0 > self.stats.current_board_score {
            self.stats.accepted += 1;
        } else {
            self.stats.rejected += 1;
        }
        self.stats.current_board_score = best.0;
    }

    fn emit(&mut self) {
        let mut per_node: HashMap<NodeIx, Vec<PortPoint>> = HashMap::new();
        let mut path_port_points = vec![];
        for path_ix in 0..self.paths.len() {
            let path = &self.paths[path_ix];
            for (node, entry, exit) in self.cell_points(path_ix) {
                for pt3 in [entry, exit] {
                    let z = self.clamp_z_to_cell(node, pt3.z);
                    per_node.entry(node).or_default().push(PortPoint {
                        connection_name: path.connection_name.clone(),
                        pt3: Pt3::new(pt3.x, pt3.y, z),
                    });
                }
            }
            path_port_points.push(PathPortPoints {
                connection_name: path.connection_name.clone(),
                nominal_trace_width: path.nominal_trace_width,
                nodes: path.nodes.clone(),
                points: self.path_points(path_ix),
            });
        }
        let mut nodes_with_port_points: Vec<NodeWithPortPoints> = per_node
            .into_iter()
            .map(|(node_ix, port_points)| NodeWithPortPoints {
                node_ix,
                rt: self.mesh.nodes[node_ix].rt,
                layers: self.mesh.nodes[node_ix].layers,
                port_points,
            })
            .collect();
        nodes_with_port_points.sort_by_key(|n| n.node_ix);
        self.output = Some(PortPointOutput { nodes_with_port_points, path_port_points });
        self.progress.finish();
    }

    fn clamp_z_to_cell(&self, node: NodeIx, z: usize) -> usize {
        let layers = &self.mesh.nodes[node].layers;
        if layers.contains(z) {
            return z;
        }
        layers.iter().min_by_key(|&l| l.abs_diff(z)).unwrap_or(z)
    }
}

impl Solver for PortPointPathingSolver {
    fn name(&self) -> &'static str {
        "port_point_pathing"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        match self.phase {
            PortPhase::Collect => self.collect_step(),
            PortPhase::Assign => self.assign_step(),
            PortPhase::Optimize => self.optimize_step(),
            PortPhase::Emit => self.emit(),
        }
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        for fc in &self.faces {
            for (rank, &t_ix) in fc.order.iter().enumerate() {
                let p = fc.face.lerp(fc.t_of_rank(rank));
                let label = format!("p{}h{}", fc.traversals[t_ix].path_ix, fc.traversals[t_ix].hop_ix);
                g.point(p, Some(label), step);
            }
        }
        if let Some(output) = &self.output {
            for path in &output.path_port_points {
                let points = path.points.iter().map(Pt3::pt).collect();
                g.line(points, None, Some(path.connection_name.clone()), step);
            }
        }
        g
    }
}
