pub mod graphics;
pub mod hyper;

pub use graphics::GraphicsObject;
pub use hyper::HyperSolver;

// Shared progress state embedded by every solver. MAX_ITERATIONS is checked
// at the top of every step; exceeding it is fatal for the solver.
#[must_use]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Progress {
    pub iterations: usize,
    pub max_iterations: usize,
    pub solved: bool,
    pub failed: bool,
    pub error: Option<String>,
}

impl Progress {
    pub fn with_max(max_iterations: usize) -> Self {
        Self { max_iterations, ..Default::default() }
    }

    #[must_use]
    pub fn done(&self) -> bool {
        self.solved || self.failed
    }

    // Accounts one step. Returns false when no further work should happen,
    // marking the solver failed if the iteration cap was hit.
    pub fn begin_step(&mut self) -> bool {
        if self.done() {
            return false;
        }
        if self.iterations >= self.max_iterations {
            self.fail(format!("exceeded MAX_ITERATIONS ({})", self.max_iterations));
            return false;
        }
        self.iterations += 1;
        true
    }

    pub fn finish(&mut self) {
        self.solved = true;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.failed = true;
        self.error = Some(error.into());
    }
}

// Contract implemented by every phase. Leaf solvers never panic or return
// errors from step(); failure is recorded in the progress state and observed
// by the parent.
pub trait Solver {
    fn name(&self) -> &'static str;
    fn progress(&self) -> &Progress;

    // Advances at most one unit of progress.
    fn step(&mut self);

    // Pure function of current state.
    fn visualize(&self) -> GraphicsObject;

    fn solved(&self) -> bool {
        self.progress().solved
    }

    fn failed(&self) -> bool {
        self.progress().failed
    }

    fn error(&self) -> Option<&str> {
        self.progress().error.as_deref()
    }

    fn iterations(&self) -> usize {
        self.progress().iterations
    }

    fn max_iterations(&self) -> usize {
        self.progress().max_iterations
    }

    fn solve(&mut self) {
        while !self.progress().done() {
            self.step();
        }
    }
}
