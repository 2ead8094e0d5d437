use std::cmp::Reverse;
use std::collections::HashMap;

use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;

use crate::model::geom::distance::{pt_rt_dist, rt_seg_dist};
use crate::model::geom::math::{f64_ge, f64_lt};
use crate::model::primitive::point::{Pt, Pt3};
use crate::model::primitive::rect::Rt;
use crate::model::primitive::seg;
use crate::route::highdensity::{
    simplify_jumper_aware, CellProblem, DynamicObstacles, HdJumper, HdRoute, HdVia, PortPair,
};
use crate::solver::{GraphicsObject, Progress, Solver};
use crate::srj::types::JumperFootprint;

// Iteration budget for one grid search over a cell.
pub fn grid_budget(problem: &CellProblem) -> usize {
    let (cols, rows) = grid_dims(problem);
    (cols as usize + 1) * (rows as usize + 1) * problem.layers.len().max(1) * 8 + 32
}

fn grid_dims(problem: &CellProblem) -> (i32, i32) {
    let step = problem.clearance().max(1e-3);
    let cols = ((problem.rt.w() / step).round() as i32).clamp(2, 64);
    let rows = ((problem.rt.h() / step).round() as i32).clamp(2, 64);
    (cols, rows)
}

type GridIx = (i32, i32, usize);
type QueueKey = Reverse<(OrderedFloat<f64>, OrderedFloat<f64>, usize)>;

// A move between grid nodes; jumps record the jumper hop they realize.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Move {
    Walk,
    Via,
    Jump,
}

// One trace inside one cell: A* over a uniform lattice, 8-neighbour walks,
// via moves between adjacent layers, optional jumper hops. Dynamic obstacles
// are the traces and vias already drawn in this cell.
#[must_use]
#[derive(Debug)]
pub struct SingleHighDensityRouteSolver {
    progress: Progress,
    problem: CellProblem,
    pair: PortPair,
    dynamic: DynamicObstacles,
    allow_jumpers: bool,
    cols: i32,
    rows: i32,
    open: PriorityQueue<GridIx, QueueKey>,
    g: HashMap<GridIx, f64>,
    came: HashMap<GridIx, (GridIx, Move)>,
    counter: usize,
    goal_ix: GridIx,
    route: Option<HdRoute>,
}

impl SingleHighDensityRouteSolver {
    pub fn new(problem: &CellProblem, pair: PortPair, dynamic: DynamicObstacles) -> Self {
        Self::with_jumpers(problem, pair, dynamic, false)
    }

    pub fn with_jumpers(
        problem: &CellProblem,
        pair: PortPair,
        dynamic: DynamicObstacles,
        allow_jumpers: bool,
    ) -> Self {
        let (cols, rows) = grid_dims(problem);
        let progress = Progress::with_max(grid_budget(problem));
        let mut solver = Self {
            progress,
            problem: problem.clone(),
            pair,
            dynamic,
            allow_jumpers,
            cols,
            rows,
            open: PriorityQueue::new(),
            g: HashMap::new(),
            came: HashMap::new(),
            counter: 0,
            goal_ix: (0, 0, 0),
            route: None,
        };
        solver.seed();
        solver
    }

    pub fn into_route(self) -> Option<HdRoute> {
        self.route
    }

    pub fn route(&self) -> Option<&HdRoute> {
        self.route.as_ref()
    }

    fn pos(&self, ix: GridIx) -> Pt {
        let rt = &self.problem.rt;
        Pt::new(
            rt.l() + rt.w() * f64::from(ix.0) / f64::from(self.cols),
            rt.b() + rt.h() * f64::from(ix.1) / f64::from(self.rows),
        )
    }

    fn snap(&self, p: Pt3) -> GridIx {
        let rt = &self.problem.rt;
        let x = ((p.x - rt.l()) / rt.w() * f64::from(self.cols)).round() as i32;
        let y = ((p.y - rt.b()) / rt.h() * f64::from(self.rows)).round() as i32;
        (x.clamp(0, self.cols), y.clamp(0, self.rows), p.z)
    }

    fn seed(&mut self) {
        let start = self.snap(self.pair.a);
        self.goal_ix = self.snap(self.pair.b);
        let h = self.pos(start).dist(self.pos(self.goal_ix));
        self.g.insert(start, 0.0);
        self.open.push(start, Reverse((OrderedFloat(h), OrderedFloat(h), 0)));
    }

    // Clearance of a candidate trace segment on |z| against static obstacles
    // and previously drawn geometry.
    fn walk_allowed(&self, a: Pt, b: Pt, z: usize) -> bool {
        let candidate = seg(a, b);
        let needed = self.problem.trace_width / 2.0 + self.problem.spacing;
        for obstacle in &self.problem.obstacles {
            if obstacle.layers.contains(z)
                && obstacle.blocks(&self.pair.connection_name)
                && f64_lt(rt_seg_dist(&obstacle.rt, &candidate), needed)
            {
                return false;
            }
        }
        let dynamic_needed = self.problem.clearance();
        f64_ge(self.dynamic.clearance_to(&candidate, z, &self.pair.connection_name), dynamic_needed)
    }

    fn via_allowed(&self, p: Pt, from_z: usize, to_z: usize) -> bool {
        let pad = self.problem.via_radius() + self.problem.spacing;
        let probe = seg(p, p);
        for z in from_z.min(to_z)..=from_z.max(to_z) {
            if f64_lt(self.dynamic.clearance_to(&probe, z, &self.pair.connection_name), pad) {
                return false;
            }
            let needed = self.problem.via_radius() + self.problem.spacing;
            for obstacle in &self.problem.obstacles {
                if obstacle.layers.contains(z)
                    && obstacle.blocks(&self.pair.connection_name)
                    && f64_lt(pt_rt_dist(&p, &obstacle.rt), needed)
                {
                    return false;
                }
            }
        }
        true
    }

    // Jumper pads must sit on clear copper even though the hop itself passes
    // over other traces.
    fn jump_allowed(&self, a: Pt, b: Pt, z: usize) -> bool {
        let half = self.problem.trace_width.max(self.problem.spacing);
        for pad_center in [a, b] {
            let pad = Rt::from_center(pad_center, half * 2.0, half * 2.0);
            for obstacle in &self.problem.obstacles {
                if obstacle.layers.contains(z)
                    && obstacle.blocks(&self.pair.connection_name)
                    && obstacle.rt.intersects(&pad)
                {
                    return false;
                }
            }
            let probe = seg(pad_center, pad_center);
            if f64_lt(
                self.dynamic.clearance_to(&probe, z, &self.pair.connection_name),
                half + self.problem.spacing,
            ) {
                return false;
            }
        }
        true
    }

    fn neighbors(&self, ix: GridIx) -> Vec<(GridIx, Move, f64)> {
        let mut out = vec![];
        let p = self.pos(ix);
        const DIRS: [(i32, i32); 8] =
            [(1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (1, -1), (-1, 1), (-1, -1)];
        for (dx, dy) in DIRS {
            let nx = (ix.0 + dx, ix.1 + dy, ix.2);
            if nx.0 < 0 || nx.0 > self.cols || nx.1 < 0 || nx.1 > self.rows {
                continue;
            }
            let q = self.pos(nx);
            if self.walk_allowed(p, q, ix.2) {
                out.push((nx, Move::Walk, p.dist(q)));
            }
        }
        for dz in [-1i32, 1] {
            let z = ix.2 as i32 + dz;
            if z < 0 || !self.problem.layers.contains(z as usize) {
                continue;
            }
            let nx = (ix.0, ix.1, z as usize);
            if self.via_allowed(p, ix.2, z as usize) {
                // A via costs several grid steps so planar detours win when
                // they exist.
                out.push((nx, Move::Via, self.problem.clearance() * 4.0));
            }
        }
        if self.allow_jumpers {
            let span = JumperFootprint::Imperial0603.span();
            let step = self.problem.clearance().max(1e-3);
            let hop = (span / step).ceil() as i32;
            for (dx, dy) in [(hop, 0), (-hop, 0), (0, hop), (0, -hop)] {
                let nx = (ix.0 + dx, ix.1 + dy, ix.2);
                if nx.0 < 0 || nx.0 > self.cols || nx.1 < 0 || nx.1 > self.rows {
                    continue;
                }
                let q = self.pos(nx);
                if self.jump_allowed(p, q, ix.2) {
                    out.push((nx, Move::Jump, p.dist(q) * 10.0));
                }
            }
        }
        out
    }

    fn reconstruct(&mut self, goal: GridIx) {
        let mut chain = vec![(goal, Move::Walk)];
        let mut at = goal;
        while let Some(&(prev, mv)) = self.came.get(&at) {
            chain.push((prev, mv));
            at = prev;
        }
        chain.reverse();
        // After the reverse, chain[i].1 is the move leaving chain[i].
        let mut vertices = vec![self.pair.a];
        let mut vias = vec![];
        let mut jumpers = vec![];
        for window in chain.windows(2) {
            let (from, mv) = window[0];
            let (to, _) = window[1];
            let p = self.pos(from);
            let q = self.pos(to);
            match mv {
                Move::Walk => vertices.push(Pt3::new(q.x, q.y, to.2)),
                Move::Via => {
                    vias.push(HdVia { pt: p, from_z: from.2, to_z: to.2 });
                    vertices.push(Pt3::new(p.x, p.y, to.2));
                }
                Move::Jump => {
                    jumpers.push(HdJumper {
                        start: p,
                        end: q,
                        z: to.2,
                        footprint: JumperFootprint::Imperial0603,
                    });
                    vertices.push(Pt3::new(p.x, p.y, to.2));
                    vertices.push(Pt3::new(q.x, q.y, to.2));
                }
            }
        }
        vertices.push(self.pair.b);
        let vertices = simplify_jumper_aware(vertices, &jumpers);
        self.route = Some(HdRoute {
            connection_name: self.pair.connection_name.clone(),
            vertices,
            vias,
            jumpers,
        });
        self.progress.finish();
    }
}

impl Solver for SingleHighDensityRouteSolver {
    fn name(&self) -> &'static str {
        "single_high_density_route"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        let Some((current, _)) = self.open.pop() else {
            self.progress.fail(format!("{}: no route inside cell", self.pair.connection_name));
            return;
        };
        if current == self.goal_ix {
            self.reconstruct(current);
            return;
        }
        let current_g = self.g[&current];
        let goal_pos = self.pos(self.goal_ix);
        for (nx, mv, cost) in self.neighbors(current) {
            let tentative = current_g + cost;
            if self.g.get(&nx).map_or(true, |&g| tentative < g) {
                self.g.insert(nx, tentative);
                self.came.insert(nx, (current, mv));
                let h = self.pos(nx).dist(goal_pos);
                self.counter += 1;
                let key = Reverse((OrderedFloat(tentative + h), OrderedFloat(h), self.counter));
                self.open.push(nx, key);
            }
        }
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        g.rect(&self.problem.rt, Some("cell".to_string()), step);
        if let Some(route) = &self.route {
            let points = route.vertices.iter().map(Pt3::pt).collect();
            g.line(points, None, Some(route.connection_name.clone()), step);
        }
        g
    }
}

// Plain grid search first; when it fails and jumpers are allowed, a second
// search may hop over blocking copper with an SMT jumper.
#[must_use]
#[derive(Debug)]
pub struct SingleHighDensityRouteWithJumpersSolver {
    progress: Progress,
    problem: CellProblem,
    pair: PortPair,
    dynamic: DynamicObstacles,
    allow_jumpers: bool,
    attempt: SingleHighDensityRouteSolver,
    on_fallback: bool,
}

impl SingleHighDensityRouteWithJumpersSolver {
    pub fn new(
        problem: &CellProblem,
        pair: PortPair,
        dynamic: DynamicObstacles,
        allow_jumpers: bool,
    ) -> Self {
        let attempt = SingleHighDensityRouteSolver::new(problem, pair.clone(), dynamic.clone());
        let budget = grid_budget(problem) * 2 + 8;
        Self {
            progress: Progress::with_max(budget),
            problem: problem.clone(),
            pair,
            dynamic,
            allow_jumpers,
            attempt,
            on_fallback: false,
        }
    }

    pub fn into_route(self) -> Option<HdRoute> {
        self.attempt.into_route()
    }
}

impl Solver for SingleHighDensityRouteWithJumpersSolver {
    fn name(&self) -> &'static str {
        "single_high_density_route_with_jumpers"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        self.attempt.step();
        if self.attempt.solved() {
            self.progress.finish();
            return;
        }
        if self.attempt.failed() {
            if self.allow_jumpers && !self.on_fallback {
                self.attempt = SingleHighDensityRouteSolver::with_jumpers(
                    &self.problem,
                    self.pair.clone(),
                    self.dynamic.clone(),
                    true,
                );
                self.on_fallback = true;
            } else {
                let msg = self.attempt.error().unwrap_or("unroutable pair").to_string();
                self.progress.fail(msg);
            }
        }
    }

    fn visualize(&self) -> GraphicsObject {
        self.attempt.visualize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::layer::LayerSet;
    use crate::model::primitive::{pt3, rt};
    use crate::route::highdensity::CellObstacleRect;

    fn cell(obstacles: Vec<CellObstacleRect>, allow_jumpers: bool) -> CellProblem {
        CellProblem {
            rt: rt(0.0, 0.0, 8.0, 8.0),
            layers: LayerSet::from_zs(&[0, 1]),
            trace_width: 0.2,
            spacing: 0.2,
            via_diameter: 0.4,
            allow_jumpers,
            obstacles,
            pairs: vec![],
        }
    }

    fn pair(a: Pt3, b: Pt3) -> PortPair {
        PortPair { connection_name: "net1".into(), a, b }
    }

    #[test]
    fn test_straight_route() {
        let problem = cell(vec![], false);
        let mut solver = SingleHighDensityRouteSolver::new(
            &problem,
            pair(pt3(0.0, 4.0, 0), pt3(8.0, 4.0, 0)),
            DynamicObstacles::default(),
        );
        solver.solve();
        assert!(solver.solved(), "{:?}", solver.error());
        let route = solver.into_route().unwrap();
        assert_eq!(route.vertices.first().copied(), Some(pt3(0.0, 4.0, 0)));
        assert_eq!(route.vertices.last().copied(), Some(pt3(8.0, 4.0, 0)));
        assert!(route.vias.is_empty());
        assert!(route.jumpers.is_empty());
    }

    #[test]
    fn test_route_detours_around_obstacle() {
        // Wall across the middle on layer 0 with a gap at the top.
        let wall = CellObstacleRect {
            rt: rt(3.8, 0.0, 0.4, 6.0),
            layers: LayerSet::single(0),
            nets: vec![],
        };
        let problem = cell(vec![wall], false);
        let mut solver = SingleHighDensityRouteSolver::new(
            &problem,
            pair(pt3(0.0, 1.0, 0), pt3(8.0, 1.0, 0)),
            DynamicObstacles::default(),
        );
        solver.solve();
        assert!(solver.solved(), "{:?}", solver.error());
        let route = solver.into_route().unwrap();
        // The route must clear the wall: either it climbs above y = 6 or it
        // swaps layers through a via.
        let clears = route.vertices.iter().any(|v| v.y > 6.0) || !route.vias.is_empty();
        assert!(clears, "route does not avoid the wall: {:?}", route.vertices);
    }

    #[test]
    fn test_via_route_when_layer_changes() {
        let problem = cell(vec![], false);
        let mut solver = SingleHighDensityRouteSolver::new(
            &problem,
            pair(pt3(0.0, 4.0, 0), pt3(8.0, 4.0, 1)),
            DynamicObstacles::default(),
        );
        solver.solve();
        assert!(solver.solved(), "{:?}", solver.error());
        let route = solver.into_route().unwrap();
        assert_eq!(route.vias.len(), 1);
    }

    #[test]
    fn test_jumper_fallback_when_fully_walled() {
        // Wall spanning the full cell height on both layers: planar routing
        // and vias are both impossible, a jumper hop is the only way across.
        let wall = CellObstacleRect {
            rt: rt(3.8, 0.0, 0.4, 8.0),
            layers: LayerSet::from_zs(&[0, 1]),
            nets: vec![],
        };
        let problem = cell(vec![wall], true);
        let mut solver = SingleHighDensityRouteWithJumpersSolver::new(
            &problem,
            pair(pt3(0.0, 4.0, 0), pt3(8.0, 4.0, 0)),
            DynamicObstacles::default(),
            true,
        );
        solver.solve();
        assert!(solver.solved(), "{:?}", solver.error());
        let route = solver.into_route().unwrap();
        assert_eq!(route.jumpers.len(), 1);
        // Jumper endpoints are consecutive vertices of the polyline.
        let jumper = &route.jumpers[0];
        let ix = route
            .vertices
            .iter()
            .position(|v| v.pt() == jumper.start && v.z == jumper.z)
            .expect("jumper start on polyline");
        assert_eq!(route.vertices[ix + 1].pt(), jumper.end);
    }
}
