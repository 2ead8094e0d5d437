use std::collections::{HashSet, VecDeque};

use log::debug;

use crate::mesh::{CapacityMesh, NodeIx};
use crate::solver::{GraphicsObject, Progress, Solver};

// Prunes leaf cells unreachable from any required endpoint cell. Removal is
// idempotent: a queued node whose neighbours were already removed is simply
// skipped, never an error.
#[must_use]
#[derive(Debug)]
pub struct DeadEndSolver {
    progress: Progress,
    mesh: CapacityMesh,
    required: HashSet<NodeIx>,
    queue: VecDeque<NodeIx>,
}

impl DeadEndSolver {
    pub fn new(mesh: CapacityMesh, required: Vec<NodeIx>) -> Self {
        let required: HashSet<NodeIx> = required.into_iter().collect();
        let queue: VecDeque<NodeIx> = (0..mesh.nodes.len())
            .filter(|ix| !required.contains(ix) && !mesh.nodes[*ix].removed)
            .filter(|&ix| mesh.live_degree(ix) <= 1)
            .collect();
        let progress = Progress::with_max(mesh.nodes.len() * 2 + mesh.edges.len() + 4);
        Self { progress, mesh, required, queue }
    }

    pub fn into_mesh(self) -> CapacityMesh {
        self.mesh
    }

    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.mesh.nodes.iter().filter(|n| n.removed).count()
    }
}

impl Solver for DeadEndSolver {
    fn name(&self) -> &'static str {
        "dead_end"
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        let Some(ix) = self.queue.pop_front() else {
            debug!("dead end pruning removed {} nodes", self.removed_count());
            self.progress.finish();
            return;
        };
        if self.mesh.nodes[ix].removed || self.required.contains(&ix) {
            return;
        }
        if self.mesh.live_degree(ix) > 1 {
            return;
        }
        self.mesh.nodes[ix].removed = true;
        // Neighbours may have become leaves; queue them (duplicates are fine).
        let neighbors: Vec<NodeIx> =
            self.mesh.neighbors(ix).map(|(_, n)| n).filter(|&n| !self.mesh.nodes[n].removed).collect();
        for n in neighbors {
            if self.mesh.live_degree(n) <= 1 {
                self.queue.push_back(n);
            }
        }
    }

    fn visualize(&self) -> GraphicsObject {
        let mut g = GraphicsObject::default();
        let step = self.progress.iterations;
        for node in self.mesh.nodes.iter().filter(|n| n.removed) {
            g.rect(&node.rt, Some("removed".to_string()), step);
        }
        g
    }
}
