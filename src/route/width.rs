use std::collections::HashMap;

use crate::model::geom::distance::{rt_seg_dist, seg_seg_dist};
use crate::model::primitive::point::Pt3;
use crate::model::primitive::seg;
use crate::route::highdensity::HdRoute;
use crate::route::BoardContext;
use crate::solver::{GraphicsObject, Progress, Solver};

// A stitched route with a width chosen per wire segment.
#[must_use]
#[derive(Debug, Clone)]
pub struct TraceWithWidth {
    pub route: HdRoute,
    // One entry per vertex window; layer-change windows keep the minimum.
    pub widths: Vec<f64>,
}

// Widens each segment up to the nominal width while preserving clearance to
// obstacles and foreign traces. One route per step.
#[must_use]
#[derive(Debug)]
pub struct TraceWidthSolver {
    progress: Progress,
    context: BoardContext,
    routes: Vec<HdRoute>,
    // Per-connection nominal width overrides.
    nominal: HashMap<String, f64>,
    cursor: usize,
    pub traces: Vec<TraceWithWidth>,
}

impl TraceWidthSolver {
    pub fn new(
        context: BoardContext,
        routes: Vec<HdRoute>,
        nominal: HashMap<String, f64>,
    ) -> Self {
        let progress = Progress::with_max(routes.len() + 2);
        Self { progress, context, routes, nominal, cursor: 0, traces: vec![] }
    }

    pub fn into_traces(self) -> Vec<TraceWithWidth> {
        self.traces
    }

    fn width_route(&self, route_ix: usize) -> TraceWithWidth {
        let route = &self.routes[route_ix];
        let min_w = self.context.trace_width;
        let nominal = self
            .nominal
            .get(&route.connection_name)
            .copied()
            .unwrap_or(self.context.nominal_width)
            .max(min_w);
        let spacing = self.context.spacing;

        let mut widths = vec![];
        for window in route.vertices.windows(2) {
            if window[0].z != window[1].z {
                widths.push(min_w);
                continue;
            }
            let s = seg(window[0].pt(), window[1].pt());
            let z = window[0].z;
            let mut w = nominal;
            // Obstacles: half width + spacing must fit in the edge distance.
            let probe = s.midpoint();
            for entry in self.context.index.near(probe, s.len() / 2.0 + nominal + spacing) {
                if !entry.layers.contains(z)
                    || !self.context.obstacle_blocks(entry.id, &route.connection_name)
                {
                    continue;
                }
                let d = rt_seg_dist(&entry.rt, &s);
                w = w.min(2.0 * (d - spacing));
            }
            // Foreign traces: assume they stay at minimum width.
            for (ix, other) in self.routes.iter().enumerate() {
                if ix == route_ix || other.connection_name == route.connection_name {
                    continue;
                }
                for ow in other.vertices.windows(2).filter(|w| w[0].z == w[1].z && w[0].z == z) {
                    let os = seg(ow[0].pt(), ow[1].pt());
                    let d = seg_seg_dist(&s, &os);
                    w = w.min(2.0 * (d - spacing - min_w / 2.0));
                }
            }
            widths.push(w.clamp(min_w, nominal));
        }
        TraceWithWidth { route: route.clone(), widths }
    }
}

impl Solver for TraceWidthSolver {
    fn name(&self) -> &'static str {
        "trace_width"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        if self.cursor >= self.routes.len() {
            self.progress.finish();
            return;
        }
        let trace = self.width_route(self.cursor);
        self.cursor += 1;
        self.traces.push(trace);
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        for trace in &self.traces {
            let points = trace.route.vertices.iter().map(Pt3::pt).collect();
            g.line(points, None, Some(trace.route.connection_name.clone()), step);
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

    fn context(nominal: f64) -> BoardContext {
        let srj = SimpleRouteJson {
            layer_count: 2,
            min_trace_width: 0.2,
            nominal_trace_width: Some(nominal),
            bounds: Bounds { min_x: -5.0, max_x: 5.0, min_y: -5.0, max_y: 5.0 },
            obstacles: vec![Obstacle {
                obstacle_id: Some("block".into()),
                center: pt(0.0, 1.0),
                width: 2.0,
                height: 1.0,
                ..Default::default()
            }],
            ..Default::default()
        };
        let conn = ConnectivityMap::from_srj(&srj);
        BoardContext::from_srj(&srj, conn).unwrap()
    }

    fn route(name: &str, y: f64) -> HdRoute {
        HdRoute {
            connection_name: name.into(),
            vertices: vec![pt3(-4.0, y, 0), pt3(4.0, y, 0)],
            vias: vec![],
            jumpers: vec![],
        }
    }

    #[test]
    fn test_open_space_gets_nominal_width() {
        let mut solver = TraceWidthSolver::new(context(0.6), vec![route("net1", -4.0)], HashMap::new());
        solver.solve();
        assert!(solver.solved());
        assert_eq!(solver.traces[0].widths, vec![0.6]);
    }

    #[test]
    fn test_width_shrinks_near_obstacle() {
        // Obstacle bottom edge at y = 0.5; the trace runs at y = 0. With
        // spacing 0.2 the usable width is 2 * (0.5 - 0.2) = 0.6, under the
        // nominal 0.8.
        let mut solver = TraceWidthSolver::new(context(0.8), vec![route("net1", 0.0)], HashMap::new());
        solver.solve();
        let w = solver.traces[0].widths[0];
        assert!((w - 0.6).abs() < 1e-9, "width {w}");
    }

    #[test]
    fn test_per_connection_nominal_override() {
        let nominal: HashMap<String, f64> = [("net1".to_string(), 0.3)].into_iter().collect();
        let mut solver = TraceWidthSolver::new(context(0.8), vec![route("net1", -4.0)], nominal);
        solver.solve();
        assert_eq!(solver.traces[0].widths, vec![0.3]);
    }

    #[test]
    fn test_width_never_below_minimum() {
        let mut solver = TraceWidthSolver::new(context(0.8), vec![route("net1", 0.4)], HashMap::new());
        solver.solve();
        for &w in &solver.traces[0].widths {
            assert!(w >= 0.2);
        }
    }
}
