use crate::model::geom::distance::{pt_rt_dist, pt_seg_dist};
use crate::model::geom::intersects::seg_intersects_seg;
use crate::model::geom::math::f64_ge;
use crate::model::primitive::point::{Pt, Pt3};
use crate::model::primitive::seg;
use crate::model::primitive::segment::Segment;
use crate::route::highdensity::{CellProblem, HdRoute, HdVia};
use crate::solver::{GraphicsObject, Progress, Solver};

// Intersection point of two segments treated as infinite lines.
fn line_intersection(a: &Segment, b: &Segment) -> Option<Pt> {
    let (p, r) = (a.st(), a.dir());
    let (q, s) = (b.st(), b.dir());
    let denom = r.cross(s);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = (q - p).cross(s) / denom;
    Some(p + r * t)
}

// Closed form for exactly two planar chords that cross: the first trace runs
// straight, the second dives to another layer around the crossing point and
// resurfaces past it.
#[must_use]
#[derive(Debug)]
pub struct TwoCrossingRoutesHighDensitySolver {
    progress: Progress,
    problem: CellProblem,
    routes: Vec<HdRoute>,
}

impl TwoCrossingRoutesHighDensitySolver {
    // Applicable when the cell holds exactly two same-layer crossing chords
    // and a second layer to dive to.
    pub fn try_new(problem: CellProblem) -> Option<Self> {
        if problem.pairs.len() != 2 || problem.layers.len() < 2 {
            return None;
        }
        let [p0, p1] = [&problem.pairs[0], &problem.pairs[1]];
        if p0.a.z != p0.b.z || p1.a.z != p1.b.z || p0.a.z != p1.a.z {
            return None;
        }
        let chord0 = seg(p0.a.pt(), p0.b.pt());
        let chord1 = seg(p1.a.pt(), p1.b.pt());
        if !seg_intersects_seg(&chord0, &chord1) {
            return None;
        }
        Some(Self { progress: Progress::with_max(4), problem, routes: vec![] })
    }

    pub fn routes(&self) -> &[HdRoute] {
        &self.routes
    }

    fn clear_of_obstacles(&self, p: Pt, z: usize, needed: f64, net: &str) -> bool {
        self.problem.obstacles.iter().all(|o| {
            !o.layers.contains(z) || !o.blocks(net) || f64_ge(pt_rt_dist(&p, &o.rt), needed)
        })
    }

    fn build(&mut self) {
        let straight = self.problem.pairs[0].clone();
        let diver = self.problem.pairs[1].clone();
        let z = straight.a.z;
        let Some(dive_z) = self.problem.layers.iter().find(|&l| l != z) else {
            self.progress.fail("no second layer to dive to");
            return;
        };
        let chord0 = seg(straight.a.pt(), straight.b.pt());
        let chord1 = seg(diver.a.pt(), diver.b.pt());
        let Some(cross) = line_intersection(&chord0, &chord1) else {
            self.progress.fail("chords no longer cross");
            return;
        };
        // Via sites on the diving chord, just before and after the crossing.
        let needed = self.problem.via_radius() + self.problem.trace_width / 2.0 + self.problem.spacing;
        let dir = chord1.dir().norm();
        let mut placed = None;
        for scale in [1.5, 2.0, 3.0] {
            let d = needed * scale;
            let v1 = cross - dir * d;
            let v2 = cross + dir * d;
            let inset = self.problem.rt.expand(-self.problem.via_radius());
            let net = diver.connection_name.as_str();
            let clear = inset.contains(v1)
                && inset.contains(v2)
                && f64_ge(pt_seg_dist(&v1, &chord0), needed)
                && f64_ge(pt_seg_dist(&v2, &chord0), needed)
                && self.clear_of_obstacles(v1, z, needed, net)
                && self.clear_of_obstacles(v2, z, needed, net)
                && self.clear_of_obstacles(v1, dive_z, needed, net)
                && self.clear_of_obstacles(v2, dive_z, needed, net);
            if clear {
                placed = Some((v1, v2));
                break;
            }
        }
        let Some((v1, v2)) = placed else {
            self.progress.fail("no clear via sites around the crossing");
            return;
        };
        self.routes.push(HdRoute {
            connection_name: straight.connection_name.clone(),
            vertices: vec![straight.a, straight.b],
            vias: vec![],
            jumpers: vec![],
        });
        self.routes.push(HdRoute {
            connection_name: diver.connection_name.clone(),
            vertices: vec![
                diver.a,
                Pt3::new(v1.x, v1.y, z),
                Pt3::new(v1.x, v1.y, dive_z),
                Pt3::new(v2.x, v2.y, dive_z),
                Pt3::new(v2.x, v2.y, z),
                diver.b,
            ],
            vias: vec![
                HdVia { pt: v1, from_z: z, to_z: dive_z },
                HdVia { pt: v2, from_z: dive_z, to_z: z },
            ],
            jumpers: vec![],
        });
        self.progress.finish();
    }
}

impl Solver for TwoCrossingRoutesHighDensitySolver {
    fn name(&self) -> &'static str {
        "two_crossing_routes"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        self.build();
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
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

// One pair whose endpoints sit on different layers: a straight run with a
// single via at the first clear site along the chord.
#[must_use]
#[derive(Debug)]
pub struct SingleTransitionCrossingRouteSolver {
    progress: Progress,
    problem: CellProblem,
    routes: Vec<HdRoute>,
}

impl SingleTransitionCrossingRouteSolver {
    pub fn try_new(problem: CellProblem) -> Option<Self> {
        if problem.pairs.len() != 1 {
            return None;
        }
        let pair = &problem.pairs[0];
        if pair.a.z == pair.b.z {
            return None;
        }
        Some(Self { progress: Progress::with_max(4), problem, routes: vec![] })
    }

    pub fn routes(&self) -> &[HdRoute] {
        &self.routes
    }

    fn build(&mut self) {
        let pair = self.problem.pairs[0].clone();
        let chord = seg(pair.a.pt(), pair.b.pt());
        let needed = self.problem.via_radius() + self.problem.spacing;
        let inset = self.problem.rt.expand(-self.problem.via_radius());
        let site = [0.5, 0.4, 0.6, 0.3, 0.7, 0.2, 0.8].into_iter().map(|t| chord.lerp(t)).find(|&v| {
            inset.contains(v)
                && self.problem.obstacles.iter().all(|o| {
                    (!o.layers.contains(pair.a.z) && !o.layers.contains(pair.b.z))
                        || !o.blocks(&pair.connection_name)
                        || f64_ge(pt_rt_dist(&v, &o.rt), needed)
                })
        });
        let Some(v) = site else {
            self.progress.fail("no clear via site along the chord");
            return;
        };
        self.routes.push(HdRoute {
            connection_name: pair.connection_name.clone(),
            vertices: vec![
                pair.a,
                Pt3::new(v.x, v.y, pair.a.z),
                Pt3::new(v.x, v.y, pair.b.z),
                pair.b,
            ],
            vias: vec![HdVia { pt: v, from_z: pair.a.z, to_z: pair.b.z }],
            jumpers: vec![],
        });
        self.progress.finish();
    }
}

impl Solver for SingleTransitionCrossingRouteSolver {
    fn name(&self) -> &'static str {
        "single_transition_crossing"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        self.build();
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
    use crate::model::layer::LayerSet;
    use crate::model::primitive::{pt3, rt};
    use crate::route::highdensity::PortPair;

    fn crossing_problem() -> CellProblem {
        CellProblem {
            rt: rt(0.0, 0.0, 6.0, 6.0),
            layers: LayerSet::from_zs(&[0, 1]),
            trace_width: 0.2,
            spacing: 0.2,
            via_diameter: 0.4,
            allow_jumpers: false,
            obstacles: vec![],
            pairs: vec![
                PortPair {
                    connection_name: "ns".into(),
                    a: pt3(3.0, 0.0, 0),
                    b: pt3(3.0, 6.0, 0),
                },
                PortPair {
                    connection_name: "we".into(),
                    a: pt3(0.0, 3.0, 0),
                    b: pt3(6.0, 3.0, 0),
                },
            ],
        }
    }

    #[test]
    fn test_two_crossing_dives_one_route() {
        let mut solver = TwoCrossingRoutesHighDensitySolver::try_new(crossing_problem()).unwrap();
        solver.solve();
        assert!(solver.solved(), "{:?}", solver.error());
        let routes = solver.routes();
        assert_eq!(routes.len(), 2);
        assert!(routes[0].vias.is_empty());
        assert_eq!(routes[1].vias.len(), 2);
        // The dive happens on the other layer.
        assert!(routes[1].vertices.iter().any(|v| v.z == 1));
    }

    #[test]
    fn test_two_crossing_not_applicable_without_crossing() {
        let mut problem = crossing_problem();
        problem.pairs[1].a = pt3(0.0, 5.0, 0);
        problem.pairs[1].b = pt3(6.0, 5.0, 0);
        assert!(TwoCrossingRoutesHighDensitySolver::try_new(problem).is_none());
    }

    #[test]
    fn test_single_transition_places_one_via() {
        let problem = CellProblem {
            pairs: vec![PortPair {
                connection_name: "net".into(),
                a: pt3(0.0, 3.0, 0),
                b: pt3(6.0, 3.0, 1),
            }],
            ..crossing_problem()
        };
        let mut solver = SingleTransitionCrossingRouteSolver::try_new(problem).unwrap();
        solver.solve();
        assert!(solver.solved(), "{:?}", solver.error());
        let route = &solver.routes()[0];
        assert_eq!(route.vias.len(), 1);
        assert_eq!(route.vertices.first().unwrap().z, 0);
        assert_eq!(route.vertices.last().unwrap().z, 1);
    }
}
