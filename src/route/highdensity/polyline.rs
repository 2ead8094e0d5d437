use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::model::geom::distance::{pt_rt_dist, rt_seg_dist, seg_seg_dist};
use crate::model::geom::math::{f64_ge, f64_lt};
use crate::model::primitive::point::{Pt, Pt3};
use crate::model::primitive::seg;
use crate::route::highdensity::{CellProblem, HdRoute, HdVia};
use crate::solver::{GraphicsObject, Progress, Solver};

pub const SEGMENTS_PER_POLYLINE: usize = 4;

// Scans the cell for sites where a via can land without touching obstacles.
// One lattice row per step.
#[must_use]
#[derive(Debug)]
pub struct ViaPossibilitiesSolver {
    progress: Progress,
    problem: CellProblem,
    rows: i32,
    cols: i32,
    row_cursor: i32,
    pub sites: Vec<Pt>,
}

impl ViaPossibilitiesSolver {
    pub fn new(problem: CellProblem) -> Self {
        let step = (problem.via_diameter + problem.spacing).max(1e-3);
        let cols = ((problem.rt.w() / step).floor() as i32).clamp(1, 48);
        let rows = ((problem.rt.h() / step).floor() as i32).clamp(1, 48);
        Self {
            progress: Progress::with_max(rows as usize + 4),
            problem,
            rows,
            cols,
            row_cursor: 0,
            sites: vec![],
        }
    }
}

impl Solver for ViaPossibilitiesSolver {
    fn name(&self) -> &'static str {
        "via_possibilities"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        if self.row_cursor >= self.rows {
            self.progress.finish();
            return;
        }
        let iy = self.row_cursor;
        self.row_cursor += 1;
        let rt = &self.problem.rt;
        let needed = self.problem.via_radius() + self.problem.spacing;
        let inset = rt.expand(-self.problem.via_radius());
        for ix in 0..=self.cols {
            let p = Pt::new(
                rt.l() + rt.w() * f64::from(ix) / f64::from(self.cols),
                rt.b() + rt.h() * f64::from(iy) / f64::from(self.rows.max(1)),
            );
            if !inset.contains(p) {
                continue;
            }
            let clear = self
                .problem
                .obstacles
                .iter()
                .all(|o| f64_ge(pt_rt_dist(&p, &o.rt), needed));
            if clear {
                self.sites.push(p);
            }
        }
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        for &site in &self.sites {
            g.circle(site, self.problem.via_radius(), Some("via site".to_string()), step);
        }
        g
    }
}

// State of one trace: jointly optimized waypoints, with an optional layer
// split at a via.
#[derive(Debug, Clone)]
struct PolyHead {
    connection_name: String,
    a: Pt3,
    b: Pt3,
    waypoints: Vec<Pt>,
    // Index into waypoints where the trace switches from a.z to b.z.
    via_at: Option<usize>,
}

impl PolyHead {
    fn vertices(&self) -> Vec<Pt3> {
        let mut out = vec![self.a];
        for (ix, w) in self.waypoints.iter().enumerate() {
            let z = match self.via_at {
                Some(v) if ix >= v => self.b.z,
                _ => self.a.z,
            };
            if self.via_at == Some(ix) {
                out.push(Pt3::new(w.x, w.y, self.a.z));
            }
            out.push(Pt3::new(w.x, w.y, z));
        }
        out.push(self.b);
        out
    }
}

// Continuous (non-grid) polyline search: every trace is a fixed number of
// waypoints perturbed jointly by a seeded random walk, accepted when the
// total penalty decreases. Variant 3 first runs the via-possibilities
// sub-solver and snaps layer splits to admissible sites.
#[must_use]
#[derive(Debug)]
pub struct MultiHeadPolyLineIntraNodeSolver {
    progress: Progress,
    problem: CellProblem,
    variant: u8,
    heads: Vec<PolyHead>,
    rng: SmallRng,
    cost: f64,
    via_scan: Option<ViaPossibilitiesSolver>,
    routes: Vec<HdRoute>,
}

impl MultiHeadPolyLineIntraNodeSolver {
    pub fn new(problem: CellProblem, variant: u8) -> Self {
        let waypoint_count = match variant {
            1 => 2,
            _ => SEGMENTS_PER_POLYLINE,
        };
        let heads: Vec<PolyHead> = problem
            .pairs
            .iter()
            .map(|pair| {
                let chord = seg(pair.a.pt(), pair.b.pt());
                let waypoints: Vec<Pt> = (1..=waypoint_count)
                    .map(|i| chord.lerp(i as f64 / (waypoint_count + 1) as f64))
                    .collect();
                let via_at = (pair.a.z != pair.b.z).then_some(waypoint_count / 2);
                PolyHead {
                    connection_name: pair.connection_name.clone(),
                    a: pair.a,
                    b: pair.b,
                    waypoints,
                    via_at,
                }
            })
            .collect();
        let budget = 200 * problem.pairs.len().max(1) + 40;
        let via_scan = (variant >= 3).then(|| ViaPossibilitiesSolver::new(problem.clone()));
        let mut solver = Self {
            progress: Progress::with_max(budget),
            problem,
            variant,
            heads,
            rng: SmallRng::seed_from_u64(0x5eed + u64::from(variant)),
            cost: f64::INFINITY,
            via_scan,
            routes: vec![],
        };
        solver.cost = solver.total_cost();
        solver
    }

    pub fn routes(&self) -> &[HdRoute] {
        &self.routes
    }

    fn violation_cost(&self) -> f64 {
        let mut violations = 0.0;
        let clearance = self.problem.clearance();
        let all: Vec<(usize, Vec<Pt3>)> =
            self.heads.iter().enumerate().map(|(ix, h)| (ix, h.vertices())).collect();
        for (ix, vertices) in &all {
            // Stay inside the cell, clear of static obstacles.
            for window in vertices.windows(2) {
                if window[0].z != window[1].z {
                    continue;
                }
                let s = seg(window[0].pt(), window[1].pt());
                if !self.problem.rt.expand(1e-6).contains(window[1].pt()) {
                    violations += 1.0;
                }
                for o in &self.problem.obstacles {
                    if o.layers.contains(window[0].z)
                        && o.blocks(&self.heads[*ix].connection_name)
                        && f64_lt(rt_seg_dist(&o.rt, &s), self.problem.trace_width / 2.0 + self.problem.spacing)
                    {
                        violations += 1.0;
                    }
                }
            }
        }
        // Cross-head clearance per layer.
        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                if self.heads[i].connection_name == self.heads[j].connection_name {
                    continue;
                }
                for wi in all[i].1.windows(2).filter(|w| w[0].z == w[1].z) {
                    for wj in all[j].1.windows(2).filter(|w| w[0].z == w[1].z) {
                        if wi[0].z != wj[0].z {
                            continue;
                        }
                        let si = seg(wi[0].pt(), wi[1].pt());
                        let sj = seg(wj[0].pt(), wj[1].pt());
                        if f64_lt(seg_seg_dist(&si, &sj), clearance) {
                            violations += 1.0;
                        }
                    }
                }
            }
        }
        violations
    }

    fn total_cost(&self) -> f64 {
        let length: f64 = self
            .heads
            .iter()
            .map(|h| {
                h.vertices().windows(2).map(|w| w[0].pt().dist(w[1].pt())).sum::<f64>()
            })
            .sum();
        self.violation_cost() * 1000.0 + length
    }

    fn emit(&mut self) {
        self.routes = self
            .heads
            .iter()
            .map(|h| {
                let vertices = h.vertices();
                let vias = vertices
                    .windows(2)
                    .filter(|w| w[0].z != w[1].z)
                    .map(|w| HdVia { pt: w[0].pt(), from_z: w[0].z, to_z: w[1].z })
                    .collect();
                HdRoute {
                    connection_name: h.connection_name.clone(),
                    vertices: crate::route::highdensity::simplify_vertices(vertices),
                    vias,
                    jumpers: vec![],
                }
            })
            .collect();
        self.progress.finish();
    }

    fn perturb_step(&mut self) {
        if self.heads.is_empty() {
            self.emit();
            return;
        }
        if self.violation_cost() == 0.0 {
            self.emit();
            return;
        }
        let head_ix = self.rng.gen_range(0..self.heads.len());
        let n = self.heads[head_ix].waypoints.len();
        if n == 0 {
            self.progress.fail("polyline head without waypoints");
            return;
        }
        let w_ix = self.rng.gen_range(0..n);
        let scale = self.problem.rt.shorter_side() * 0.25;
        let delta = Pt::new(
            (self.rng.gen::<f64>() - 0.5) * scale,
            (self.rng.gen::<f64>() - 0.5) * scale,
        );
        let saved = self.heads[head_ix].waypoints[w_ix];
        let mut candidate = saved + delta;
        // Variant 3 snaps via waypoints to precomputed admissible sites.
        if self.variant >= 3 && self.heads[head_ix].via_at == Some(w_ix) {
            if let Some(scan) = &self.via_scan {
                if let Some(&site) = scan
                    .sites
                    .iter()
                    .min_by(|a, b| {
                        let da = a.dist(candidate);
                        let db = b.dist(candidate);
                        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                    })
                {
                    candidate = site;
                }
            }
        }
        self.heads[head_ix].waypoints[w_ix] = candidate;
        let cost = self.total_cost();
        if cost < self.cost {
            self.cost = cost;
        } else {
            self.heads[head_ix].waypoints[w_ix] = saved;
        }
    }
}

impl Solver for MultiHeadPolyLineIntraNodeSolver {
    fn name(&self) -> &'static str {
        match self.variant {
            1 => "multi_head_polyline_1",
            2 => "multi_head_polyline_2",
            _ => "multi_head_polyline_3",
        }
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        // The via scan runs to completion first, as a sub-solver.
        if let Some(scan) = self.via_scan.as_mut() {
            if !scan.progress().done() {
                scan.step();
                return;
            }
            if scan.failed() {
                self.progress.fail("via possibility scan failed");
                return;
            }
        }
        self.perturb_step();
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        g.rect(&self.problem.rt, Some("cell".to_string()), step);
        for head in &self.heads {
            let points = head.vertices().iter().map(Pt3::pt).collect();
            g.line(points, None, Some(head.connection_name.clone()), step);
        }
        g
    }
}
