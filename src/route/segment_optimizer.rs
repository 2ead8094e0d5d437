use log::debug;

use crate::model::geom::distance::rt_seg_dist;
use crate::model::geom::math::f64_lt;
use crate::model::primitive::point::Pt3;
use crate::model::primitive::seg;
use crate::route::highdensity::HdRoute;
use crate::route::BoardContext;
use crate::solver::{GraphicsObject, Progress, Solver};

// Smooths stitched polylines: an interior vertex is dropped when the direct
// segment between its neighbours stays clear of keepouts. Via sites and
// jumper pads are never dropped. One route per step.
#[must_use]
#[derive(Debug)]
pub struct SegmentOptimizer {
    progress: Progress,
    context: BoardContext,
    routes: Vec<HdRoute>,
    cursor: usize,
}

impl SegmentOptimizer {
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

    fn removable(&self, route: &HdRoute, ix: usize) -> bool {
        if ix == 0 || ix + 1 >= route.vertices.len() {
            return false;
        }
        let (prev, v, next) = (route.vertices[ix - 1], route.vertices[ix], route.vertices[ix + 1]);
        if prev.z != v.z || next.z != v.z {
            return false;
        }
        if route.jumpers.iter().any(|j| (j.start == v.pt() || j.end == v.pt()) && j.z == v.z) {
            return false;
        }
        let direct = seg(prev.pt(), next.pt());
        let needed = self.context.trace_width / 2.0 + self.context.spacing;
        let probe = direct.midpoint();
        for entry in self.context.index.near(probe, direct.len() / 2.0 + needed) {
            if entry.layers.contains(v.z)
                && self.context.obstacle_blocks(entry.id, &route.connection_name)
                && f64_lt(rt_seg_dist(&entry.rt, &direct), needed)
            {
                return false;
            }
        }
        true
    }

    fn smooth_route(&mut self, route_ix: usize) {
        let mut route = self.routes[route_ix].clone();
        let before = route.vertices.len();
        let mut ix = 1;
        while ix + 1 < route.vertices.len() {
            if self.removable(&route, ix) {
                route.vertices.remove(ix);
            } else {
                ix += 1;
            }
        }
        if route.vertices.len() < before {
            debug!(
                "{}: smoothed {} -> {} points",
                route.connection_name,
                before,
                route.vertices.len()
            );
        }
        self.routes[route_ix] = route;
    }
}

impl Solver for SegmentOptimizer {
    fn name(&self) -> &'static str {
        "segment_optimizer"
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
        let route_ix = self.cursor;
        self.cursor += 1;
        self.smooth_route(route_ix);
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
