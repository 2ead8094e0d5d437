use log::debug;

use crate::model::geom::distance::{pt_rt_dist, pt_seg_dist};
use crate::model::geom::math::{f64_lt, EP};
use crate::model::primitive::point::{Pt, Pt3};
use crate::model::primitive::seg;
use crate::route::highdensity::HdRoute;
use crate::route::BoardContext;
use crate::solver::{GraphicsObject, Progress, Solver};

// Sweeps each trace, nudging points that violate clearance away from
// obstacles and foreign copper. Jumper pads and via sites never move, and a
// route must still contain its jumper start and end as consecutive points
// when the sweep finishes.
#[must_use]
#[derive(Debug)]
pub struct TraceKeepoutSolver {
    progress: Progress,
    context: BoardContext,
    routes: Vec<HdRoute>,
    cursor: usize,
}

impl TraceKeepoutSolver {
    pub fn new(context: BoardContext, routes: Vec<HdRoute>) -> Self {
        let progress = Progress::with_max(routes.len() + 2);
        Self { progress, context, routes, cursor: 0 }
    }

    pub fn into_outputs(self) -> (BoardContext, Vec<HdRoute>) {
        (self.context, self.routes)
    }

    pub fn routes(&self) -> &[HdRoute] {
        &self.routes
    }

    // Clearance shrinks near the trace ends so pads remain reachable.
    fn scheduled_clearance(&self, route: &HdRoute, ix: usize) -> f64 {
        let base = self.context.trace_width / 2.0 + self.context.spacing;
        let end_dist = ix.min(route.vertices.len() - 1 - ix);
        if end_dist == 0 {
            0.0
        } else if end_dist == 1 {
            base / 2.0
        } else {
            base
        }
    }

    fn is_pinned(route: &HdRoute, ix: usize) -> bool {
        let v = &route.vertices[ix];
        // Endpoints are pad locations.
        if ix == 0 || ix + 1 == route.vertices.len() {
            return true;
        }
        // Via sites: the layer changes on either side.
        let prev = &route.vertices[ix - 1];
        let next = &route.vertices[ix + 1];
        if prev.z != v.z || next.z != v.z {
            return true;
        }
        route.jumpers.iter().any(|j| (j.start == v.pt() || j.end == v.pt()) && j.z == v.z)
    }

    // Worst clearance violation at |p| on |z| and the direction away from it.
    fn violation(&self, p: Pt, z: usize, net: &str, other_segments: &[(Pt, Pt, usize, String)], needed: f64) -> Option<(f64, Pt)> {
        let mut worst: Option<(f64, Pt)> = None;
        for entry in self.context.index.near(p, needed + self.context.trace_width) {
            if !entry.layers.contains(z) || !self.context.obstacle_blocks(entry.id, net) {
                continue;
            }
            let d = pt_rt_dist(&p, &entry.rt);
            if f64_lt(d, needed) {
                let away = (p - entry.rt.center()).norm();
                let deficit = needed - d;
                if worst.as_ref().map_or(true, |(w, _)| deficit > *w) {
                    worst = Some((deficit, away));
                }
            }
        }
        let trace_needed = needed + self.context.trace_width / 2.0;
        for (a, b, sz, snet) in other_segments {
            if *sz != z || snet == net {
                continue;
            }
            let s = seg(*a, *b);
            let d = pt_seg_dist(&p, &s);
            if f64_lt(d, trace_needed) {
                let away = (p - s.project(p)).norm();
                let deficit = trace_needed - d;
                if worst.as_ref().map_or(true, |(w, _)| deficit > *w) {
                    worst = Some((deficit, away));
                }
            }
        }
        worst
    }

    fn sweep_route(&mut self, route_ix: usize) {
        let other_segments: Vec<(Pt, Pt, usize, String)> = self
            .routes
            .iter()
            .enumerate()
            .filter(|(ix, _)| *ix != route_ix)
            .flat_map(|(_, r)| {
                let name = r.connection_name.clone();
                r.vertices
                    .windows(2)
                    .filter(|w| w[0].z == w[1].z)
                    .map(move |w| (w[0].pt(), w[1].pt(), w[0].z, name.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        let route = self.routes[route_ix].clone();
        let mut nudged = route.clone();
        let mut moved = 0usize;
        for ix in 0..route.vertices.len() {
            if Self::is_pinned(&route, ix) {
                continue;
            }
            let v = route.vertices[ix];
            let needed = self.scheduled_clearance(&route, ix);
            if needed <= 0.0 {
                continue;
            }
            if let Some((deficit, away)) =
                self.violation(v.pt(), v.z, &route.connection_name, &other_segments, needed)
            {
                let away = if away.mag() < EP {
                    // Point sits exactly on the offending geometry; nudge
                    // perpendicular to the trace direction instead.
                    let prev = route.vertices[ix - 1].pt();
                    let next = route.vertices[ix + 1].pt();
                    (next - prev).norm().perp()
                } else {
                    away
                };
                let candidate = v.pt() + away * (deficit + EP);
                let still_bad = self
                    .violation(candidate, v.z, &route.connection_name, &other_segments, needed)
                    .map_or(0.0, |(d, _)| d);
                if still_bad < deficit {
                    nudged.vertices[ix] = Pt3::new(candidate.x, candidate.y, v.z);
                    moved += 1;
                }
            }
        }
        if moved > 0 {
            debug!("{}: keepout nudged {} point(s)", route.connection_name, moved);
        }
        self.routes[route_ix] = nudged;
    }

    fn verify_jumpers(&mut self) {
        for route in &self.routes {
            for jumper in &route.jumpers {
                let consecutive = route.vertices.windows(2).any(|w| {
                    (w[0].pt() == jumper.start && w[1].pt() == jumper.end)
                        || (w[0].pt() == jumper.end && w[1].pt() == jumper.start)
                });
                if !consecutive {
                    let msg = format!(
                        "{}: jumper endpoints are no longer consecutive after keepout",
                        route.connection_name
                    );
                    self.progress.fail(msg);
                    return;
                }
            }
        }
        self.progress.finish();
    }
}

impl Solver for TraceKeepoutSolver {
    fn name(&self) -> &'static str {
        "trace_keepout"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        if self.cursor >= self.routes.len() {
            self.verify_jumpers();
            return;
        }
        let route_ix = self.cursor;
        self.cursor += 1;
        self.sweep_route(route_ix);
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        for route in &self.routes {
            let points = route.vertices.iter().map(Pt3::pt).collect();
            g.line(points, None, Some(route.connection_name.clone()), step);
        }
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::ConnectivityMap;
    use crate::model::primitive::{pt, pt3};
    use crate::srj::types::{Bounds, Obstacle, SimpleRouteJson};

    fn context_with_obstacle() -> BoardContext {
        let srj = SimpleRouteJson {
            layer_count: 2,
            min_trace_width: 0.2,
            bounds: Bounds { min_x: -5.0, max_x: 5.0, min_y: -5.0, max_y: 5.0 },
            obstacles: vec![Obstacle {
                obstacle_id: Some("block".into()),
                center: pt(0.0, 0.5),
                width: 1.0,
                height: 1.0,
                ..Default::default()
            }],
            ..Default::default()
        };
        let conn = ConnectivityMap::from_srj(&srj);
        BoardContext::from_srj(&srj, conn).unwrap()
    }

    #[test]
    fn test_point_nudged_away_from_obstacle() {
        // Interior point grazes the obstacle edge at y = 0; clearance is
        // 0.1 + 0.2, so it must be pushed down.
        let route = HdRoute {
            connection_name: "net1".into(),
            vertices: vec![
                pt3(-4.0, -0.05, 0),
                pt3(-2.0, -0.05, 0),
                pt3(0.0, -0.05, 0),
                pt3(2.0, -0.05, 0),
                pt3(4.0, -0.05, 0),
            ],
            vias: vec![],
            jumpers: vec![],
        };
        let mut solver = TraceKeepoutSolver::new(context_with_obstacle(), vec![route]);
        solver.solve();
        assert!(solver.solved(), "{:?}", solver.error());
        let swept = &solver.routes()[0];
        let mid = swept.vertices[2];
        assert!(mid.y < -0.2, "midpoint not nudged: {mid}");
        // Endpoints stay put.
        assert_eq!(swept.vertices[0], pt3(-4.0, -0.05, 0));
        assert_eq!(swept.vertices[4], pt3(4.0, -0.05, 0));
    }

    #[test]
    fn test_jumper_endpoints_survive() {
        let route = HdRoute {
            connection_name: "net1".into(),
            vertices: vec![
                pt3(-4.0, -3.0, 0),
                pt3(-1.0, -3.0, 0),
                pt3(1.0, -3.0, 0),
                pt3(4.0, -3.0, 0),
            ],
            vias: vec![],
            jumpers: vec![crate::route::highdensity::HdJumper {
                start: pt(-1.0, -3.0),
                end: pt(1.0, -3.0),
                z: 0,
                footprint: crate::srj::types::JumperFootprint::Imperial0603,
            }],
        };
        let mut solver = TraceKeepoutSolver::new(context_with_obstacle(), vec![route]);
        solver.solve();
        assert!(solver.solved(), "{:?}", solver.error());
        let swept = &solver.routes()[0];
        assert_eq!(swept.vertices[1].pt(), pt(-1.0, -3.0));
        assert_eq!(swept.vertices[2].pt(), pt(1.0, -3.0));
    }
}
