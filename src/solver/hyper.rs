use log::debug;

use crate::solver::{GraphicsObject, Progress, Solver};

// Races children with perturbed hyperparameters. On a single thread the race
// is a round-robin interleave, one step per turn; the first child to report
// solved wins and the rest are dropped. If every child fails, the child with
// the most iterations survives for inspection and the hyper solver fails.
#[must_use]
#[derive(Debug)]
pub struct HyperSolver<S: Solver> {
    name: &'static str,
    progress: Progress,
    children: Vec<S>,
    winner: Option<usize>,
    next: usize,
}

impl<S: Solver> HyperSolver<S> {
    pub fn new(name: &'static str, children: Vec<S>) -> Self {
        let budget: usize =
            children.iter().map(|c| c.max_iterations()).sum::<usize>() + children.len() + 1;
        Self { name, progress: Progress::with_max(budget), children, winner: None, next: 0 }
    }

    pub fn winner(&self) -> Option<&S> {
        self.winner.map(|ix| &self.children[ix])
    }

    pub fn into_winner(mut self) -> Option<S> {
        self.winner.map(|ix| self.children.swap_remove(ix))
    }
}

impl<S: Solver> Solver for HyperSolver<S> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn step(&mut self) {
        if !self.progress.begin_step() {
            return;
        }
        if self.children.is_empty() {
            self.progress.fail("no candidate solvers");
            return;
        }
        // Find the next child still running, in round-robin order.
        let n = self.children.len();
        let Some(active) = (0..n).map(|i| (self.next + i) % n).find(|&i| !self.children[i].progress().done())
        else {
            self.progress.fail("all candidate solvers failed");
            return;
        };
        self.next = (active + 1) % n;

        let child = &mut self.children[active];
        child.step();
        if child.solved() {
            debug!("{}: child {} won after {} iterations", self.name, child.name(), child.iterations());
            self.winner = Some(active);
            self.progress.finish();
        }
    }

    fn visualize(&self) -> GraphicsObject {
        // Show the winner if decided, otherwise the most advanced child.
        let child = self
            .winner()
            .or_else(|| self.children.iter().max_by_key(|c| c.iterations()));
        child.map(Solver::visualize).unwrap_or_default()
    }
}
