pub mod crossing;
pub mod grid;
pub mod polyline;

pub use crossing::{SingleTransitionCrossingRouteSolver, TwoCrossingRoutesHighDensitySolver};
pub use grid::{SingleHighDensityRouteSolver, SingleHighDensityRouteWithJumpersSolver};
pub use polyline::{MultiHeadPolyLineIntraNodeSolver, ViaPossibilitiesSolver};

use std::collections::HashMap;

use crate::model::geom::distance::{circ_seg_dist, rt_seg_dist, seg_seg_dist};
use crate::model::geom::math::is_collinear;
use crate::model::layer::LayerSet;
use crate::model::primitive::circle::Circle;
use crate::model::primitive::point::{Pt, Pt3};
use crate::model::primitive::rect::Rt;
use crate::model::primitive::seg;
use crate::model::primitive::segment::Segment;
use crate::route::portpoint::NodeWithPortPoints;
use crate::solver::{GraphicsObject, HyperSolver, Progress, Solver};
use crate::srj::types::JumperFootprint;

// A via drawn by an intra-node solver.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub struct HdVia {
    pub pt: Pt,
    pub from_z: usize,
    pub to_z: usize,
}

#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub struct HdJumper {
    pub start: Pt,
    pub end: Pt,
    pub z: usize,
    pub footprint: JumperFootprint,
}

// Polyline drawn for one net inside one cell. A z change between consecutive
// vertices implies the via recorded at that coordinate. Jumper start/end
// points appear consecutively in |vertices|.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub struct HdRoute {
    pub connection_name: String,
    pub vertices: Vec<Pt3>,
    pub vias: Vec<HdVia>,
    pub jumpers: Vec<HdJumper>,
}

impl HdRoute {
    pub fn segments(&self) -> impl Iterator<Item = (Segment, usize)> + '_ {
        self.vertices.windows(2).filter(|w| w[0].z == w[1].z).map(|w| {
            (seg(w[0].pt(), w[1].pt()), w[0].z)
        })
    }
}

// One entry/exit pair to join inside a cell.
#[must_use]
#[derive(Debug, Clone)]
pub struct PortPair {
    pub connection_name: String,
    pub a: Pt3,
    pub b: Pt3,
}

#[must_use]
#[derive(Debug, Default, Clone)]
pub struct CellObstacleRect {
    pub rt: Rt,
    pub layers: LayerSet,
    pub nets: Vec<String>,
}

impl CellObstacleRect {
    #[must_use]
    pub fn blocks(&self, net: &str) -> bool {
        !self.nets.iter().any(|n| n == net)
    }
}

// Everything an intra-node solver needs to know about one cell.
#[must_use]
#[derive(Debug, Clone)]
pub struct CellProblem {
    pub rt: Rt,
    pub layers: LayerSet,
    pub trace_width: f64,
    pub spacing: f64,
    pub via_diameter: f64,
    pub allow_jumpers: bool,
    pub obstacles: Vec<CellObstacleRect>,
    pub pairs: Vec<PortPair>,
}

impl CellProblem {
    #[must_use]
    pub fn clearance(&self) -> f64 {
        self.trace_width + self.spacing
    }

    #[must_use]
    pub fn via_radius(&self) -> f64 {
        self.via_diameter / 2.0
    }
}

// Completed geometry acts as an obstacle for traces routed later.
#[must_use]
#[derive(Debug, Default, Clone)]
pub struct DynamicObstacles {
    pub segments: Vec<(Segment, usize, String)>,
    pub vias: Vec<(Circle, usize, usize, String)>,
    pub pads: Vec<(Rt, usize, String)>,
}

impl DynamicObstacles {
    pub fn absorb(&mut self, route: &HdRoute, via_radius: f64, pad_half: f64) {
        for (segment, z) in route.segments() {
            self.segments.push((segment, z, route.connection_name.clone()));
        }
        for via in &route.vias {
            let (lo, hi) = (via.from_z.min(via.to_z), via.from_z.max(via.to_z));
            self.vias.push((Circle::new(via.pt, via_radius), lo, hi, route.connection_name.clone()));
        }
        for jumper in &route.jumpers {
            for pad in [jumper.start, jumper.end] {
                let rt = Rt::from_center(pad, pad_half * 2.0, pad_half * 2.0);
                self.pads.push((rt, jumper.z, route.connection_name.clone()));
            }
        }
    }

    // Smallest clearance between a candidate trace segment on |z| and any
    // foreign geometry; INFINITY when nothing is nearby.
    #[must_use]
    pub fn clearance_to(&self, candidate: &Segment, z: usize, net: &str) -> f64 {
        let mut best = f64::INFINITY;
        for (segment, sz, snet) in &self.segments {
            if *sz == z && snet != net {
                best = best.min(seg_seg_dist(segment, candidate));
            }
        }
        for (circle, lo, hi, vnet) in &self.vias {
            if *lo <= z && z <= *hi && vnet != net {
                best = best.min(circ_seg_dist(circle, candidate));
            }
        }
        for (rt, pz, pnet) in &self.pads {
            if *pz == z && pnet != net {
                best = best.min(rt_seg_dist(rt, candidate));
            }
        }
        best
    }
}

// Deterministic ranking of the pairs inside a cell: layer-changing pairs
// first, then by a stable hash of the connection name, ties by insertion.
pub fn rank_pairs(pairs: &mut Vec<PortPair>) {
    let keyed: Vec<(bool, u64, usize)> = pairs
        .iter()
        .enumerate()
        .map(|(ix, p)| (p.a.z == p.b.z, fnv1a(p.connection_name.as_bytes()), ix))
        .collect();
    let mut order: Vec<usize> = (0..pairs.len()).collect();
    order.sort_by_key(|&ix| keyed[ix]);
    let reordered: Vec<PortPair> = order.into_iter().map(|ix| pairs[ix].clone()).collect();
    *pairs = reordered;
}

#[must_use]
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

// Groups a cell's port points into entry/exit pairs per connection, ranked
// deterministically.
pub fn build_cell_problem(
    node: &NodeWithPortPoints,
    trace_width: f64,
    spacing: f64,
    via_diameter: f64,
    allow_jumpers: bool,
    obstacles: Vec<CellObstacleRect>,
) -> CellProblem {
    let mut grouped: HashMap<&str, Vec<Pt3>> = HashMap::new();
    let mut names: Vec<&str> = vec![];
    for pp in &node.port_points {
        let entry = grouped.entry(pp.connection_name.as_str()).or_default();
        if entry.is_empty() {
            names.push(pp.connection_name.as_str());
        }
        entry.push(pp.pt3);
    }
    let mut pairs = vec![];
    for name in names {
        let points = &grouped[name];
        for chunk in points.chunks(2) {
            if let [a, b] = chunk {
                pairs.push(PortPair { connection_name: name.to_string(), a: *a, b: *b });
            }
        }
    }
    rank_pairs(&mut pairs);
    CellProblem {
        rt: node.rt,
        layers: node.layers,
        trace_width,
        spacing,
        via_diameter,
        allow_jumpers,
        obstacles,
        pairs,
    }
}

// Collinear merging must never drop a jumper pad, so runs between jumper
// endpoints are simplified piecewise.
pub fn simplify_jumper_aware(vertices: Vec<Pt3>, jumpers: &[HdJumper]) -> Vec<Pt3> {
    if jumpers.is_empty() {
        return simplify_vertices(vertices);
    }
    let is_pad = |v: &Pt3| {
        jumpers.iter().any(|j| (j.start == v.pt() || j.end == v.pt()) && j.z == v.z)
    };
    let mut out: Vec<Pt3> = vec![];
    let mut run: Vec<Pt3> = vec![];
    for v in vertices {
        run.push(v);
        if is_pad(&v) {
            let simplified = simplify_vertices(run.clone());
            extend_dedup(&mut out, simplified);
            run = vec![v];
        }
    }
    extend_dedup(&mut out, simplify_vertices(run));
    out
}

fn extend_dedup(out: &mut Vec<Pt3>, mut chunk: Vec<Pt3>) {
    if out.last().is_some() && !chunk.is_empty() && out.last() == chunk.first() {
        chunk.remove(0);
    }
    out.extend(chunk);
}

// Drops interior vertices that neither bend the polyline nor change layer.
pub fn simplify_vertices(vertices: Vec<Pt3>) -> Vec<Pt3> {
    let mut out: Vec<Pt3> = vec![];
    for v in vertices {
        while out.len() >= 2 {
            let a = out[out.len() - 2];
            let b = out[out.len() - 1];
            if a.z == b.z && b.z == v.z && is_collinear(a.pt(), b.pt(), v.pt()) {
                out.pop();
            } else {
                break;
            }
        }
        if out.last() != Some(&v) {
            out.push(v);
        }
    }
    out
}

// Routes every pair in a cell with grid search, each finished trace becoming
// an obstacle for the next. The active single-trace solver is stepped as a
// sub-solver.
#[must_use]
#[derive(Debug)]
pub struct IntraNodeRouteSolver {
    progress: Progress,
    problem: CellProblem,
    with_jumpers: bool,
    pair_cursor: usize,
    dynamic: DynamicObstacles,
    active: Option<SingleHighDensityRouteWithJumpersSolver>,
    pub routes: Vec<HdRoute>,
}

impl IntraNodeRouteSolver {
    pub fn new(problem: CellProblem) -> Self {
        Self::with_jumper_mode(problem, false)
    }

    fn with_jumper_mode(problem: CellProblem, with_jumpers: bool) -> Self {
        let per_pair = grid::grid_budget(&problem) + 4;
        let max_iterations = problem.pairs.len().max(1) * per_pair * 2 + 8;
        Self {
            progress: Progress::with_max(max_iterations),
            problem,
            with_jumpers,
            pair_cursor: 0,
            dynamic: DynamicObstacles::default(),
            active: None,
            routes: vec![],
        }
    }

    pub fn into_routes(self) -> Vec<HdRoute> {
        self.routes
    }

    pub fn problem(&self) -> &CellProblem {
        &self.problem
    }
}

impl Solver for IntraNodeRouteSolver {
    fn name(&self) -> &'static str {
        "intra_node_route"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        if self.active.is_none() {
            let Some(pair) = self.problem.pairs.get(self.pair_cursor) else {
                self.progress.finish();
                return;
            };
            let allow_jumpers = self.with_jumpers && self.problem.allow_jumpers;
            self.active = Some(SingleHighDensityRouteWithJumpersSolver::new(
                &self.problem,
                pair.clone(),
                self.dynamic.clone(),
                allow_jumpers,
            ));
            return;
        }
        let Some(child) = self.active.as_mut() else { return };
        child.step();
        if child.failed() {
            let msg = child.error().unwrap_or("pair unroutable").to_string();
            self.progress.fail(msg);
            return;
        }
        if child.solved() {
            let Some(route) = self.active.take().and_then(|c| c.into_route()) else {
                self.progress.fail("sub-solver solved without a route");
                return;
            };
            self.dynamic.absorb(
                &route,
                self.problem.via_radius(),
                self.problem.trace_width.max(self.problem.spacing),
            );
            self.routes.push(route);
            self.pair_cursor += 1;
        }
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        g.rect(&self.problem.rt, Some("cell".to_string()), step);
        for route in &self.routes {
            let points = route.vertices.iter().map(Pt3::pt).collect();
            g.line(points, None, Some(route.connection_name.clone()), step);
            for via in &route.vias {
                g.circle(via.pt, self.problem.via_radius(), None, step);
            }
        }
        g
    }
}

// Same machinery with jumpers enabled on the fallback path.
#[must_use]
#[derive(Debug)]
pub struct IntraNodeSolverWithJumpers {
    inner: IntraNodeRouteSolver,
}

impl IntraNodeSolverWithJumpers {
    pub fn new(problem: CellProblem) -> Self {
        Self { inner: IntraNodeRouteSolver::with_jumper_mode(problem, true) }
    }

    pub fn into_routes(self) -> Vec<HdRoute> {
        self.inner.into_routes()
    }

    pub fn routes(&self) -> &[HdRoute] {
        &self.inner.routes
    }
}

impl Solver for IntraNodeSolverWithJumpers {
    fn name(&self) -> &'static str {
        "intra_node_with_jumpers"
    }

    fn progress(&self) -> &Progress {
        self.inner.progress()
    }

    fn step(&mut self) {
        self.inner.step();
    }

    fn visualize(&self) -> GraphicsObject {
        self.inner.visualize()
    }
}

// Candidate solvers for one cell, simplest first, raced by the hyper solver.
#[must_use]
#[derive(Debug)]
pub enum IntraNodeCandidate {
    TwoCrossing(TwoCrossingRoutesHighDensitySolver),
    Transition(SingleTransitionCrossingRouteSolver),
    Grid(IntraNodeRouteSolver),
    Poly(MultiHeadPolyLineIntraNodeSolver),
    Jumpers(IntraNodeSolverWithJumpers),
}

impl IntraNodeCandidate {
    pub fn routes(&self) -> Vec<HdRoute> {
        match self {
            IntraNodeCandidate::TwoCrossing(s) => s.routes().to_vec(),
            IntraNodeCandidate::Transition(s) => s.routes().to_vec(),
            IntraNodeCandidate::Grid(s) => s.routes.clone(),
            IntraNodeCandidate::Poly(s) => s.routes().to_vec(),
            IntraNodeCandidate::Jumpers(s) => s.routes().to_vec(),
        }
    }
}

impl Solver for IntraNodeCandidate {
    fn name(&self) -> &'static str {
        match self {
            IntraNodeCandidate::TwoCrossing(s) => s.name(),
            IntraNodeCandidate::Transition(s) => s.name(),
            IntraNodeCandidate::Grid(s) => s.name(),
            IntraNodeCandidate::Poly(s) => s.name(),
            IntraNodeCandidate::Jumpers(s) => s.name(),
        }
    }

    fn progress(&self) -> &Progress {
        match self {
            IntraNodeCandidate::TwoCrossing(s) => s.progress(),
            IntraNodeCandidate::Transition(s) => s.progress(),
            IntraNodeCandidate::Grid(s) => s.progress(),
            IntraNodeCandidate::Poly(s) => s.progress(),
            IntraNodeCandidate::Jumpers(s) => s.progress(),
        }
    }

    fn step(&mut self) {
        match self {
            IntraNodeCandidate::TwoCrossing(s) => s.step(),
            IntraNodeCandidate::Transition(s) => s.step(),
            IntraNodeCandidate::Grid(s) => s.step(),
            IntraNodeCandidate::Poly(s) => s.step(),
            IntraNodeCandidate::Jumpers(s) => s.step(),
        }
    }

    fn visualize(&self) -> GraphicsObject {
        match self {
            IntraNodeCandidate::TwoCrossing(s) => s.visualize(),
            IntraNodeCandidate::Transition(s) => s.visualize(),
            IntraNodeCandidate::Grid(s) => s.visualize(),
            IntraNodeCandidate::Poly(s) => s.visualize(),
            IntraNodeCandidate::Jumpers(s) => s.visualize(),
        }
    }
}

pub type HyperIntraNodeSolver = HyperSolver<IntraNodeCandidate>;

// Builds the race for one cell: closed forms when the pair pattern allows,
// then grid search, then polyline search, then jumpers as a last resort.
pub fn hyper_intra_node_solver(problem: &CellProblem) -> HyperIntraNodeSolver {
    let mut candidates = vec![];
    if let Some(s) = TwoCrossingRoutesHighDensitySolver::try_new(problem.clone()) {
        candidates.push(IntraNodeCandidate::TwoCrossing(s));
    }
    if let Some(s) = SingleTransitionCrossingRouteSolver::try_new(problem.clone()) {
        candidates.push(IntraNodeCandidate::Transition(s));
    }
    candidates.push(IntraNodeCandidate::Grid(IntraNodeRouteSolver::new(problem.clone())));
    for variant in [1, 2, 3] {
        candidates.push(IntraNodeCandidate::Poly(MultiHeadPolyLineIntraNodeSolver::new(
            problem.clone(),
            variant,
        )));
    }
    if problem.allow_jumpers {
        candidates.push(IntraNodeCandidate::Jumpers(IntraNodeSolverWithJumpers::new(
            problem.clone(),
        )));
    }
    HyperSolver::new("hyper_intra_node", candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::primitive::pt3;

    #[test]
    fn test_rank_pairs_layer_changers_first() {
        let mut pairs = vec![
            PortPair { connection_name: "planar".into(), a: pt3(0.0, 0.0, 0), b: pt3(1.0, 0.0, 0) },
            PortPair { connection_name: "zchange".into(), a: pt3(0.0, 1.0, 0), b: pt3(1.0, 1.0, 1) },
        ];
        rank_pairs(&mut pairs);
        assert_eq!(pairs[0].connection_name, "zchange");
    }

    #[test]
    fn test_simplify_vertices_merges_collinear() {
        let vertices = vec![
            pt3(0.0, 0.0, 0),
            pt3(1.0, 0.0, 0),
            pt3(2.0, 0.0, 0),
            pt3(2.0, 1.0, 0),
        ];
        let simplified = simplify_vertices(vertices);
        assert_eq!(simplified, vec![pt3(0.0, 0.0, 0), pt3(2.0, 0.0, 0), pt3(2.0, 1.0, 0)]);
    }

    #[test]
    fn test_simplify_keeps_layer_changes() {
        let vertices = vec![pt3(0.0, 0.0, 0), pt3(1.0, 0.0, 0), pt3(1.0, 0.0, 1), pt3(2.0, 0.0, 1)];
        let simplified = simplify_vertices(vertices);
        assert_eq!(simplified.len(), 4);
    }
}
