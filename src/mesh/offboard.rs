use std::collections::BTreeMap;

use log::debug;

use crate::mesh::builder::MeshObstacle;
use crate::mesh::{CapacityMesh, NodeIx};
use crate::solver::{GraphicsObject, Progress, Solver};

// Augments the mesh with zero-length edges between assignable-via cells
// whose obstacles share an offBoardConnectsTo net. One net group per step.
#[must_use]
#[derive(Debug)]
pub struct OffboardCapacityNodeSolver {
    progress: Progress,
    mesh: CapacityMesh,
    groups: Vec<(String, Vec<NodeIx>)>,
    cursor: usize,
}

impl OffboardCapacityNodeSolver {
    pub fn new(mesh: CapacityMesh, obstacles: &[MeshObstacle]) -> Self {
        let mut by_net: BTreeMap<String, Vec<NodeIx>> = BTreeMap::new();
        for (ix, node) in mesh.nodes.iter().enumerate() {
            let Some(srj_ix) = node.assigned_obstacle else { continue };
            let Some(obstacle) = obstacles.iter().find(|o| o.srj_ix == srj_ix) else { continue };
            for net in &obstacle.offboard_nets {
                by_net.entry(net.clone()).or_default().push(ix);
            }
        }
        let groups: Vec<_> = by_net.into_iter().collect();
        let progress = Progress::with_max(groups.len() + 2);
        Self { progress, mesh, groups, cursor: 0 }
    }

    pub fn into_mesh(self) -> CapacityMesh {
        self.mesh
    }
}

impl Solver for OffboardCapacityNodeSolver {
    fn name(&self) -> &'static str {
        "offboard_capacity_nodes"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        if self.cursor >= self.groups.len() {
            self.progress.finish();
            return;
        }
        let (net, members) = self.groups[self.cursor].clone();
        self.cursor += 1;
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                self.mesh.add_edge(members[i], members[j], true, Some(net.clone()));
            }
        }
        debug!("offboard net {net}: linked {} assignable cells", members.len());
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        for edge in self.mesh.edges.iter().filter(|e| e.is_offboard_edge) {
            let a = self.mesh.nodes[edge.nodes[0]].rt.center();
            let b = self.mesh.nodes[edge.nodes[1]].rt.center();
            g.line(vec![a, b], None, edge.offboard_net_name.clone(), step);
        }
        g
    }
}
