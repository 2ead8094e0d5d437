use crate::mesh::CapacityMesh;
use crate::route::capacity::NetPath;
use crate::route::portpoint::{
    OptimizerStats, PortPointHyperParameters, PortPointOutput, PortPointPathingSolver,
    SectionStrategy,
};
use crate::solver::{GraphicsObject, Progress, Solver};

// Legacy section search: same crossing assignment as the port point pather,
// but contested sections are re-ordered exhaustively, worst face first,
// instead of shuffled at random.
#[must_use]
#[derive(Debug)]
pub struct UnravelSectionSolver {
    inner: PortPointPathingSolver,
}

impl UnravelSectionSolver {
    pub fn new(
        mesh: CapacityMesh,
        paths: Vec<NetPath>,
        trace_width: f64,
        spacing: f64,
        mut params: PortPointHyperParameters,
    ) -> Self {
        params.strategy = SectionStrategy::Unravel;
        Self { inner: PortPointPathingSolver::new(mesh, paths, trace_width, spacing, params) }
    }

    #[must_use]
    pub fn stats(&self) -> OptimizerStats {
        self.inner.stats()
    }

    pub fn into_outputs(self) -> (CapacityMesh, Vec<NetPath>, PortPointOutput) {
        self.inner.into_outputs()
    }
}

impl Solver for UnravelSectionSolver {
    fn name(&self) -> &'static str {
        "unravel_section"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::ConnectivityMap;
    use crate::mesh::CapacityMeshSolver;
    use crate::route::capacity::{CapacityPathingHyperParameters, CapacityPathingSolver};
    use crate::route::offboard::substitute_connections;
    use crate::srj::types::{Bounds, Connection, ConnectionPoint, SimpleRouteJson};

    #[test]
    fn test_unravel_produces_port_points() {
        let point = |x: f64, y: f64, id: &str| ConnectionPoint {
            x,
            y,
            layer: Some("top".to_string()),
            point_id: Some(id.to_string()),
            ..Default::default()
        };
        let srj = SimpleRouteJson {
            layer_count: 2,
            min_trace_width: 0.2,
            bounds: Bounds { min_x: -8.0, max_x: 8.0, min_y: -4.0, max_y: 4.0 },
            connections: vec![Connection {
                name: "net1".into(),
                points_to_connect: vec![point(-6.0, 0.0, "a"), point(6.0, 0.0, "b")],
                ..Default::default()
            }],
            ..Default::default()
        };
        let conn = ConnectivityMap::from_srj(&srj);
        let mut mesh_solver = CapacityMeshSolver::new(&srj).unwrap();
        mesh_solver.solve();
        let (nets, _) = substitute_connections(&srj, &conn).unwrap();
        let mut pathing = CapacityPathingSolver::new(
            mesh_solver.into_mesh(),
            conn,
            nets,
            CapacityPathingHyperParameters::default(),
        );
        pathing.solve();
        let (mesh, _, paths) = pathing.into_outputs();
        let mut solver = UnravelSectionSolver::new(
            mesh,
            paths,
            srj.min_trace_width,
            srj.spacing(),
            PortPointHyperParameters::default(),
        );
        solver.solve();
        assert!(solver.solved(), "{:?}", solver.error());
        let (_, _, output) = solver.into_outputs();
        assert_eq!(output.path_port_points.len(), 1);
    }
}
